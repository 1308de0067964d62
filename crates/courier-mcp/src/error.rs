//! Error types for courier-mcp

use thiserror::Error;

/// MCP error type
#[derive(Debug, Error)]
pub enum Error {
    /// Backend descriptor is missing or malformed
    #[error("config error: {0}")]
    Config(String),

    /// Transport error (spawn, pipe I/O, HTTP connection)
    #[error("transport error: {0}")]
    Transport(String),

    /// Protocol error (invalid JSON-RPC, unparseable result)
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Backend returned a JSON-RPC error
    #[error("server error {code}: {message}")]
    Server {
        /// JSON-RPC error code
        code: i32,
        /// Error message
        message: String,
    },

    /// Tool invocation exceeded the execution timeout
    #[error("tool call timed out")]
    Timeout,

    /// Operation attempted on a client with no live session
    #[error("server '{0}' is not connected")]
    NotConnected(String),

    /// No backend registered under this id
    #[error("server '{0}' not found")]
    ServerNotFound(String),

    /// Namespaced tool name absent from the catalog
    #[error("tool '{0}' not found")]
    ToolNotFound(String),

    /// Resource URI absent from the catalog
    #[error("resource '{0}' not found")]
    ResourceNotFound(String),

    /// Namespaced prompt name absent from the catalog
    #[error("prompt '{0}' not found")]
    PromptNotFound(String),
}

impl Error {
    /// Whether this is a catalog lookup miss, raised before any
    /// transport I/O, as opposed to a dispatch failure.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ServerNotFound(_)
                | Self::ToolNotFound(_)
                | Self::ResourceNotFound(_)
                | Self::PromptNotFound(_)
        )
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
