//! Agent step abstraction
//!
//! An agent is a pipeline of named steps. Each step reads the
//! accumulated inputs (a JSON object), does its work against the
//! shared collaborators, and returns a JSON object that is merged into
//! the inputs of the next step. Steps report failure by including an
//! `error` key rather than returning `Err`; the running agent decides
//! what a failure means.

use async_trait::async_trait;
use courier_llm::MultiLlm;
use courier_mcp::CapabilityRegistry;
use serde_json::Value;

/// Shared collaborators available to every step.
pub struct StepContext<'a> {
    /// Capability registry for tool dispatch
    pub registry: &'a CapabilityRegistry,
    /// LLM router
    pub llm: &'a MultiLlm,
    /// Id of the user the message belongs to
    pub user_id: &'a str,
    /// Name of the agent running the step
    pub agent_name: &'a str,
    /// Description of the agent running the step
    pub agent_description: &'a str,
    /// Backend ids the agent is scoped to; empty means every backend
    pub servers: &'a [String],
}

/// Output of one step execution.
#[derive(Debug, Clone)]
pub struct StepResult {
    /// Name of the step that produced this
    pub step_name: String,
    /// JSON object merged into the running inputs
    pub output: Value,
}

impl StepResult {
    /// Wrap a step's output object.
    #[must_use]
    pub fn new(step_name: impl Into<String>, output: Value) -> Self {
        Self {
            step_name: step_name.into(),
            output,
        }
    }

    /// Whether the output reports a failure.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.output.get("error").is_some()
    }
}

/// One step in an agent pipeline.
#[async_trait]
pub trait AgentStep: Send + Sync {
    /// Step name, used in logs and failure reports.
    fn name(&self) -> &str;

    /// What the step does.
    fn description(&self) -> &str;

    /// Run the step against the accumulated inputs.
    async fn execute(&self, inputs: &Value, ctx: &StepContext<'_>) -> StepResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_detection() {
        let ok = StepResult::new("s", serde_json::json!({"intent": "greet"}));
        assert!(!ok.is_error());

        let failed = StepResult::new("s", serde_json::json!({"error": "boom"}));
        assert!(failed.is_error());
    }
}
