//! MCP wire protocol types
//!
//! JSON-RPC 2.0 framing plus the capability shapes returned by the
//! `tools/*`, `resources/*` and `prompts/*` operations. All schemas
//! declared by the remote are carried through unmodified; validation
//! against them is an advisory front-end concern, never enforced here.

use serde::{Deserialize, Serialize};

/// JSON-RPC request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    /// JSON-RPC version
    pub jsonrpc: String,
    /// Request method
    pub method: String,
    /// Request ID
    pub id: u64,
    /// Request parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl RpcRequest {
    /// Create a new request
    pub fn new(method: impl Into<String>, id: u64) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.into(),
            id,
            params: None,
        }
    }

    /// Add parameters
    #[must_use]
    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = Some(params);
        self
    }
}

/// JSON-RPC notification (no id, no response expected)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcNotification {
    /// JSON-RPC version
    pub jsonrpc: String,
    /// Notification method
    pub method: String,
}

impl RpcNotification {
    /// Create a new notification
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.into(),
        }
    }
}

/// JSON-RPC response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    /// JSON-RPC version
    pub jsonrpc: String,
    /// Response ID (matches request ID)
    pub id: u64,
    /// Result (on success)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Error (on failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// JSON-RPC error object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    /// Error code
    pub code: i32,
    /// Error message
    pub message: String,
    /// Additional data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Result of the `initialize` handshake
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeResult {
    /// Protocol version
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    /// Server capabilities
    #[serde(default)]
    pub capabilities: ServerCapabilities,
    /// Server info
    #[serde(default, rename = "serverInfo")]
    pub server_info: Option<ServerInfo>,
}

/// Capabilities declared by a server at initialize time
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerCapabilities {
    /// Tool support
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<serde_json::Value>,
    /// Resource support
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<serde_json::Value>,
    /// Prompt support
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompts: Option<serde_json::Value>,
}

/// Server identification
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Server name
    pub name: String,
    /// Server version
    #[serde(default)]
    pub version: Option<String>,
}

/// Tool capability as declared by its owning backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    /// Tool name (unqualified)
    pub name: String,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// Input schema (JSON Schema, pass-through)
    #[serde(default = "default_schema", rename = "inputSchema")]
    pub input_schema: serde_json::Value,
}

fn default_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {}
    })
}

/// Resource capability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    /// Resource URI
    pub uri: String,
    /// Resource name
    #[serde(default)]
    pub name: String,
    /// Human-readable description
    #[serde(default)]
    pub description: Option<String>,
    /// MIME type (pass-through)
    #[serde(default, rename = "mimeType")]
    pub mime_type: Option<String>,
}

/// Prompt capability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompt {
    /// Prompt name (unqualified)
    pub name: String,
    /// Human-readable description
    #[serde(default)]
    pub description: Option<String>,
    /// Named arguments
    #[serde(default)]
    pub arguments: Vec<PromptArgument>,
}

/// One named prompt argument
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptArgument {
    /// Argument name
    pub name: String,
    /// Argument description
    #[serde(default)]
    pub description: Option<String>,
    /// Whether the argument is required
    #[serde(default)]
    pub required: bool,
}

/// `tools/list` result body
#[derive(Debug, Clone, Deserialize)]
pub struct ListToolsResult {
    /// Declared tools
    #[serde(default)]
    pub tools: Vec<Tool>,
}

/// `resources/list` result body
#[derive(Debug, Clone, Deserialize)]
pub struct ListResourcesResult {
    /// Declared resources
    #[serde(default)]
    pub resources: Vec<Resource>,
}

/// `prompts/list` result body
#[derive(Debug, Clone, Deserialize)]
pub struct ListPromptsResult {
    /// Declared prompts
    #[serde(default)]
    pub prompts: Vec<Prompt>,
}

/// `tools/call` result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// Typed content blocks
    #[serde(default)]
    pub content: Vec<Content>,
    /// Whether the call resulted in an error
    #[serde(default, rename = "isError")]
    pub is_error: bool,
}

impl ToolCallResult {
    /// Concatenated text of all textual content blocks.
    #[must_use]
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(Content::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Typed content block
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Content {
    /// Text content
    #[serde(rename = "text")]
    Text {
        /// Text payload
        text: String,
    },
    /// Image content
    #[serde(rename = "image")]
    Image {
        /// Base64 encoded image data
        data: String,
        /// MIME type
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    /// Embedded resource content
    #[serde(rename = "resource")]
    Resource {
        /// Resource URI
        uri: String,
        /// Resource text
        #[serde(default)]
        text: Option<String>,
        /// Resource blob (base64)
        #[serde(default)]
        blob: Option<String>,
    },
}

impl Content {
    /// Text representation of this block, if any
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::Resource { text: Some(t), .. } => Some(t),
            _ => None,
        }
    }
}

/// `resources/read` result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResourceResult {
    /// Resource contents (one entry per returned representation)
    #[serde(default)]
    pub contents: Vec<ResourceContents>,
}

/// One representation of a read resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceContents {
    /// Resource URI
    pub uri: String,
    /// MIME type (pass-through)
    #[serde(default, rename = "mimeType")]
    pub mime_type: Option<String>,
    /// Text contents
    #[serde(default)]
    pub text: Option<String>,
    /// Binary contents (base64)
    #[serde(default)]
    pub blob: Option<String>,
}

/// `prompts/get` result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPromptResult {
    /// Prompt description
    #[serde(default)]
    pub description: Option<String>,
    /// Rendered prompt messages
    #[serde(default)]
    pub messages: Vec<PromptMessage>,
}

/// One rendered prompt message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptMessage {
    /// Message role
    pub role: String,
    /// Message content block
    pub content: Content,
}
