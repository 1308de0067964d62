//! Multi-server MCP client layer
//!
//! Connects to any number of MCP backends over HTTP or stdio, merges
//! their tools, resources, and prompts into one namespaced catalog,
//! and routes invocations to the owning backend.
//!
//! The entry point is [`CapabilityRegistry`]: build it from a
//! [`BackendSet`] parsed out of YAML, `connect()`, then call
//! capabilities by their `backend_id:name` keys.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod http;
pub mod manager;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod transport;

pub use config::{BackendConfig, BackendSet, TransportKind};
pub use error::{Error, Result};
pub use http::HttpClient;
pub use manager::StdioManager;
pub use protocol::{
    Content, GetPromptResult, Prompt, ReadResourceResult, Resource, Tool, ToolCallResult,
};
pub use registry::CapabilityRegistry;
pub use session::McpSession;
pub use transport::{StdioClient, StdioLaunch};
