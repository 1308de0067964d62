//! Intent identification step.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::{scoped, user_message};
use crate::step::{AgentStep, StepContext, StepResult};

/// Asks the LLM what the user is trying to accomplish, given the
/// agent's description and the tool catalog within its backend scope.
pub struct IntentStep;

const NAME: &str = "identify_intent";

impl IntentStep {
    fn prompt(&self, inputs: &Value, ctx: &StepContext<'_>) -> String {
        let mut tools_description = String::new();
        for (key, _, tool) in scoped(ctx.registry.list_all_tools(), ctx.servers) {
            tools_description.push_str(&format!("- {key}: {}\n", tool.description));
        }
        if tools_description.is_empty() {
            tools_description.push_str("(no tools available)\n");
        }

        format!(
            "You are part of the {agent} agent.\n\
             Agent description: {description}\n\n\
             User message: \"{message}\"\n\n\
             Available tools:\n{tools_description}\n\
             Identify the user's intent: what are they trying to accomplish, \
             what action should the agent take, and which tools might be needed? \
             Be concise and specific.",
            agent = ctx.agent_name,
            description = ctx.agent_description,
            message = user_message(inputs),
        )
    }
}

#[async_trait]
impl AgentStep for IntentStep {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Identifies user intent from the message and agent capabilities"
    }

    async fn execute(&self, inputs: &Value, ctx: &StepContext<'_>) -> StepResult {
        let prompt = self.prompt(inputs, ctx);

        match ctx
            .llm
            .generate_json_response(None, &prompt, &["intent", "confidence", "entities"])
            .await
        {
            Ok(mut value) => {
                debug!(agent = %ctx.agent_name, intent = %value["intent"], "Intent identified");
                if let Some(object) = value.as_object_mut() {
                    object.insert("agent_name".to_string(), json!(ctx.agent_name));
                }
                StepResult::new(NAME, value)
            }
            Err(e) => StepResult::new(
                NAME,
                json!({
                    "error": format!("failed to identify intent: {e}"),
                    "intent": "unknown",
                }),
            ),
        }
    }
}
