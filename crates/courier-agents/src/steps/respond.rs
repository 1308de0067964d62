//! Response generation step.

use async_trait::async_trait;
use courier_llm::{CompletionRequest, Message};
use serde_json::{json, Value};

use super::user_message;
use crate::step::{AgentStep, StepContext, StepResult};

/// Phrases the final user-facing reply from the accumulated outputs of
/// the earlier steps.
pub struct RespondStep;

const NAME: &str = "generate_response";

const APOLOGY: &str =
    "I apologize, but I ran into a problem while preparing your response. Please try again.";

impl RespondStep {
    fn prompt(&self, inputs: &Value) -> String {
        format!(
            "You are a helpful assistant responding to a user's request. \
             The user asked: \"{message}\"\n\n\
             Based on what has been accomplished so far, provide a natural, \
             conversational reply that directly addresses the request. Do not \
             mention any internal or technical details of how the answer was \
             produced, and do not make up information that is not in the \
             step summary.\n\n\
             Step summary: {inputs}",
            message = user_message(inputs),
        )
    }
}

#[async_trait]
impl AgentStep for RespondStep {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Generates the final reply from accumulated step outputs"
    }

    async fn execute(&self, inputs: &Value, ctx: &StepContext<'_>) -> StepResult {
        let prompt = self.prompt(inputs);
        let request = CompletionRequest::new(vec![Message::user(prompt)]);

        match ctx.llm.generate_response(None, request).await {
            Ok(response) => StepResult::new(NAME, json!({ "final_response": response.content })),
            Err(e) => StepResult::new(
                NAME,
                json!({
                    "error": format!("failed to generate response: {e}"),
                    "final_response": APOLOGY,
                }),
            ),
        }
    }
}
