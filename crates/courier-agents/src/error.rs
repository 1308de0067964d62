//! Error taxonomy for the agent layer.
//!
//! Steps never return `Err`; they report failure in-band. The only
//! fallible surface here is roster configuration loading.

use thiserror::Error;

/// Agent layer errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Roster configuration could not be read or parsed
    #[error("config error: {0}")]
    Config(String),
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, Error>;
