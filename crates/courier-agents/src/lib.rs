//! Agent layer
//!
//! Agents turn a natural-language message into tool invocations and a
//! phrased reply. A [`SequentialAgent`] runs a fixed pipeline of
//! [`AgentStep`]s; the [`AgentRouter`] picks an agent from the roster
//! per message, falling back to a plain reply when none fits.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod message;
pub mod roster;
pub mod router;
pub mod sequential;
pub mod step;
pub mod steps;

pub use error::{Error, Result};
pub use message::{AgentResponse, ResponseStatus, RoutedResponse};
pub use roster::{AgentSpec, Roster};
pub use router::AgentRouter;
pub use sequential::SequentialAgent;
pub use step::{AgentStep, StepContext, StepResult};
pub use steps::{IntentStep, RespondStep, ToolsStep};
