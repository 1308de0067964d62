//! Persistent user memory
//!
//! SQLite-backed storage for remembered facts (filed by category) and
//! the per-user conversation log.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod category;
pub mod error;
pub mod store;

pub use category::MemoryCategory;
pub use error::{Error, Result};
pub use store::{Memory, MemoryStore, StoredMessage};
