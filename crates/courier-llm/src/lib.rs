//! LLM provider abstraction
//!
//! One OpenAI-compatible chat provider, a YAML-configured router over
//! any number of provider instances, and a structured-output helper
//! that retries until a completion parses as the required JSON shape.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod openai;
pub mod provider;
pub mod router;

pub use error::{Error, Result};
pub use openai::{ChatConfig, ChatProvider};
pub use provider::{
    CompletionRequest, CompletionResponse, LlmProvider, Message, MessageRole, TokenUsage,
};
pub use router::MultiLlm;
