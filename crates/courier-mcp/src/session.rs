//! Session-level MCP operations
//!
//! Both transport clients expose the same five remote operations over a
//! request/response session. The operations are provided methods on
//! [`McpSession`]; a transport only supplies `request` (and the
//! handshake that precedes it).

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::protocol::{
    GetPromptResult, ListPromptsResult, ListResourcesResult, ListToolsResult, Prompt,
    ReadResourceResult, Resource, Tool, ToolCallResult,
};

/// Protocol version sent in the initialize handshake.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

fn parse<T: serde::de::DeserializeOwned>(what: &str, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| Error::Protocol(format!("bad {what} result: {e}")))
}

/// One session to one backend, exposing the primitive remote operations.
#[async_trait]
pub trait McpSession: Send + Sync {
    /// Backend id this session belongs to.
    fn server_id(&self) -> &str;

    /// Issue one JSON-RPC request and return the result body, if any.
    ///
    /// A JSON-RPC error response surfaces as [`Error::Server`].
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Option<Value>>;

    /// List tools declared by the backend.
    async fn list_tools(&self) -> Result<Vec<Tool>> {
        match self.request("tools/list", None).await? {
            Some(value) => Ok(parse::<ListToolsResult>("tools/list", value)?.tools),
            None => Ok(Vec::new()),
        }
    }

    /// Call a tool by its unqualified name.
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallResult> {
        let params = serde_json::json!({
            "name": name,
            "arguments": arguments,
        });
        match self.request("tools/call", Some(params)).await? {
            Some(value) => parse("tools/call", value),
            None => Err(Error::Protocol("tools/call returned no result".to_string())),
        }
    }

    /// List resources declared by the backend.
    async fn list_resources(&self) -> Result<Vec<Resource>> {
        match self.request("resources/list", None).await? {
            Some(value) => Ok(parse::<ListResourcesResult>("resources/list", value)?.resources),
            None => Ok(Vec::new()),
        }
    }

    /// Read a resource by URI.
    async fn read_resource(&self, uri: &str) -> Result<ReadResourceResult> {
        let params = serde_json::json!({ "uri": uri });
        match self.request("resources/read", Some(params)).await? {
            Some(value) => parse("resources/read", value),
            None => Err(Error::Protocol(
                "resources/read returned no result".to_string(),
            )),
        }
    }

    /// List prompts declared by the backend.
    async fn list_prompts(&self) -> Result<Vec<Prompt>> {
        match self.request("prompts/list", None).await? {
            Some(value) => Ok(parse::<ListPromptsResult>("prompts/list", value)?.prompts),
            None => Ok(Vec::new()),
        }
    }

    /// Render a prompt by its unqualified name.
    async fn get_prompt(&self, name: &str, arguments: Value) -> Result<GetPromptResult> {
        let params = serde_json::json!({
            "name": name,
            "arguments": arguments,
        });
        match self.request("prompts/get", Some(params)).await? {
            Some(value) => parse("prompts/get", value),
            None => Err(Error::Protocol("prompts/get returned no result".to_string())),
        }
    }
}

/// Parameters for the initialize handshake, shared by both transports.
#[must_use]
pub fn initialize_params() -> Value {
    serde_json::json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {
            "tools": {},
            "resources": {},
            "prompts": {}
        },
        "clientInfo": {
            "name": "courier",
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}
