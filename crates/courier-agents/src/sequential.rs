//! Sequential agent.

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::message::AgentResponse;
use crate::step::{AgentStep, StepContext};
use crate::steps::{IntentStep, RespondStep, ToolsStep};

/// Agent that runs its steps in a fixed order, feeding each step's
/// output into the inputs of the next. The first step to report an
/// error stops the pipeline.
pub struct SequentialAgent {
    name: String,
    description: String,
    servers: Vec<String>,
    steps: Vec<Box<dyn AgentStep>>,
}

impl SequentialAgent {
    /// Create an agent with an explicit step pipeline.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        servers: Vec<String>,
        steps: Vec<Box<dyn AgentStep>>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            servers,
            steps,
        }
    }

    /// The standard three-step pipeline: identify intent, select and
    /// run tools, phrase the reply. Concrete agents differ only in
    /// name, description, and the backends they care about.
    #[must_use]
    pub fn standard(
        name: impl Into<String>,
        description: impl Into<String>,
        servers: Vec<String>,
    ) -> Self {
        Self::new(
            name,
            description,
            servers,
            vec![
                Box::new(IntentStep),
                Box::new(ToolsStep),
                Box::new(RespondStep),
            ],
        )
    }

    /// Agent name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Agent description, shown to the router's selection prompt.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Backend ids this agent is scoped to.
    #[must_use]
    pub fn servers(&self) -> &[String] {
        &self.servers
    }

    /// Handle one user message by running every step in order.
    pub async fn handle(&self, user_message: &str, ctx: &StepContext<'_>) -> AgentResponse {
        info!(agent = %self.name, steps = self.steps.len(), "Starting sequential execution");

        let mut inputs = json!({ "user_message": user_message });

        for (index, step) in self.steps.iter().enumerate() {
            debug!(
                agent = %self.name,
                step = %step.name(),
                position = index + 1,
                "Executing step"
            );

            let result = step.execute(&inputs, ctx).await;

            if result.is_error() {
                let detail = result.output["error"].as_str().unwrap_or("unknown error");
                warn!(agent = %self.name, step = %step.name(), error = %detail, "Step failed");
                return AgentResponse::error(format!(
                    "step '{}' failed: {detail}",
                    step.name()
                ));
            }

            merge(&mut inputs, result.output);
        }

        let message = inputs["final_response"]
            .as_str()
            .unwrap_or("Task completed successfully")
            .to_string();
        let intent = inputs["intent"].as_str().map(ToString::to_string);

        AgentResponse::success(message, intent)
    }
}

/// Merge an output object's entries into the running inputs object.
fn merge(inputs: &mut Value, output: Value) {
    if let (Some(into), Value::Object(from)) = (inputs.as_object_mut(), output) {
        for (key, value) in from {
            into.insert(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::StepResult;
    use async_trait::async_trait;
    use courier_llm::MultiLlm;
    use courier_mcp::{BackendSet, CapabilityRegistry};

    struct FixedStep {
        name: &'static str,
        output: Value,
    }

    #[async_trait]
    impl AgentStep for FixedStep {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "fixed"
        }

        async fn execute(&self, _inputs: &Value, _ctx: &StepContext<'_>) -> StepResult {
            StepResult::new(self.name, self.output.clone())
        }
    }

    struct EchoInputsStep;

    #[async_trait]
    impl AgentStep for EchoInputsStep {
        fn name(&self) -> &str {
            "echo_inputs"
        }

        fn description(&self) -> &str {
            "copies the accumulated inputs into its output"
        }

        async fn execute(&self, inputs: &Value, _ctx: &StepContext<'_>) -> StepResult {
            StepResult::new(
                "echo_inputs",
                json!({ "final_response": format!("saw intent {}", inputs["intent"]) }),
            )
        }
    }

    fn fixtures() -> (CapabilityRegistry, MultiLlm) {
        (CapabilityRegistry::new(BackendSet::default()), MultiLlm::new())
    }

    fn ctx<'a>(registry: &'a CapabilityRegistry, llm: &'a MultiLlm) -> StepContext<'a> {
        StepContext {
            registry,
            llm,
            user_id: "alice",
            agent_name: "helper",
            agent_description: "a test agent",
            servers: &[],
        }
    }

    #[tokio::test]
    async fn test_outputs_flow_between_steps() {
        let (registry, llm) = fixtures();
        let agent = SequentialAgent::new(
            "helper",
            "a test agent",
            vec![],
            vec![
                Box::new(FixedStep {
                    name: "first",
                    output: json!({"intent": "greet"}),
                }),
                Box::new(EchoInputsStep),
            ],
        );

        let response = agent.handle("hello", &ctx(&registry, &llm)).await;
        assert_eq!(response.status, crate::message::ResponseStatus::Success);
        assert_eq!(response.message, "saw intent \"greet\"");
        assert_eq!(response.intent.as_deref(), Some("greet"));
    }

    #[tokio::test]
    async fn test_step_error_stops_the_pipeline() {
        let (registry, llm) = fixtures();
        let agent = SequentialAgent::new(
            "helper",
            "a test agent",
            vec![],
            vec![
                Box::new(FixedStep {
                    name: "broken",
                    output: json!({"error": "boom"}),
                }),
                Box::new(FixedStep {
                    name: "never_reached",
                    output: json!({"final_response": "should not appear"}),
                }),
            ],
        );

        let response = agent.handle("hello", &ctx(&registry, &llm)).await;
        assert_eq!(response.status, crate::message::ResponseStatus::Error);
        assert!(response.message.contains("broken"));
        assert!(response.message.contains("boom"));
    }

    #[tokio::test]
    async fn test_empty_pipeline_reports_completion() {
        let (registry, llm) = fixtures();
        let agent = SequentialAgent::new("helper", "a test agent", vec![], vec![]);
        let response = agent.handle("hello", &ctx(&registry, &llm)).await;
        assert_eq!(response.message, "Task completed successfully");
    }
}
