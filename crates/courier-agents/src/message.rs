//! Agent response values.

use serde::{Deserialize, Serialize};

/// Outcome of an agent handling a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    /// The agent produced a reply
    Success,
    /// A step failed before a reply could be produced
    Error,
}

/// Reply from one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    /// Whether handling succeeded
    pub status: ResponseStatus,
    /// The user-facing reply (or failure description)
    pub message: String,
    /// Identified intent, when a step produced one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
}

impl AgentResponse {
    /// A successful reply.
    #[must_use]
    pub fn success(message: impl Into<String>, intent: Option<String>) -> Self {
        Self {
            status: ResponseStatus::Success,
            message: message.into(),
            intent,
        }
    }

    /// A failure report.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Error,
            message: message.into(),
            intent: None,
        }
    }
}

/// Reply from the agent router, naming the agent that handled the
/// message when one was selected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutedResponse {
    /// Selected agent, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    /// The router's stated reason for the selection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// The reply itself
    pub response: AgentResponse,
}
