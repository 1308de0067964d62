//! Tool selection and execution step.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::{scoped, user_message};
use crate::step::{AgentStep, StepContext, StepResult};

/// Asks the LLM which tools to run and with what arguments, then
/// executes them in the stated order. Individual tool failures are
/// collected without aborting the batch.
pub struct ToolsStep;

const NAME: &str = "select_and_execute_tools";

impl ToolsStep {
    fn prompt(&self, inputs: &Value, ctx: &StepContext<'_>) -> String {
        let mut tools_description = String::new();
        for (key, _, tool) in scoped(ctx.registry.list_all_tools(), ctx.servers) {
            tools_description.push_str(&format!(
                "- name: {key}\n  description: {}\n  input schema: {}\n",
                tool.description, tool.input_schema
            ));
        }
        if tools_description.is_empty() {
            tools_description.push_str("(no tools available)\n");
        }

        format!(
            "You are part of the {agent} agent.\n\
             Agent description: {description}\n\n\
             Message: \"{message}\"\n\
             User ID: {user_id}\n\n\
             Available tools:\n{tools_description}\n\
             Select the tools needed to accomplish what the user wants, in \
             execution order. Use the tool names exactly as listed. For each \
             selected tool provide its arguments as an object keyed by the \
             parameter names from its input schema; use the User ID above \
             where a tool wants a user id. Select nothing if no tool applies.\n\n\
             Reply with `selected_tools` (list of tool names, in order) and \
             `tool_parameters` (object mapping tool name to its arguments).",
            agent = ctx.agent_name,
            description = ctx.agent_description,
            message = user_message(inputs),
            user_id = ctx.user_id,
        )
    }
}

#[async_trait]
impl AgentStep for ToolsStep {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Selects and executes tools appropriate to the message"
    }

    async fn execute(&self, inputs: &Value, ctx: &StepContext<'_>) -> StepResult {
        let prompt = self.prompt(inputs, ctx);

        let selection = match ctx
            .llm
            .generate_json_response(None, &prompt, &["selected_tools", "tool_parameters"])
            .await
        {
            Ok(value) => value,
            Err(e) => {
                return StepResult::new(
                    NAME,
                    json!({
                        "error": format!("failed to select tools: {e}"),
                        "selected_tools": [],
                        "execution_results": [],
                    }),
                )
            }
        };

        let selected: Vec<String> = selection["selected_tools"]
            .as_array()
            .map(|names| {
                names
                    .iter()
                    .filter_map(Value::as_str)
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let empty = Map::new();
        let parameters = selection["tool_parameters"].as_object().unwrap_or(&empty);

        if selected.is_empty() {
            debug!(agent = %ctx.agent_name, "No tools selected");
            return StepResult::new(
                NAME,
                json!({
                    "selected_tools": [],
                    "executed_tools": [],
                    "execution_results": [],
                    "errors": [],
                }),
            );
        }

        let mut executed = Vec::new();
        let mut results = Vec::new();
        let mut errors = Vec::new();

        for tool_name in &selected {
            let args = parameters
                .get(tool_name)
                .cloned()
                .unwrap_or_else(|| json!({}));

            match ctx.registry.call_tool(tool_name, args.clone()).await {
                Ok(result) => {
                    debug!(tool = %tool_name, "Tool executed");
                    executed.push(tool_name.clone());
                    results.push(json!({
                        "tool_name": tool_name,
                        "status": "success",
                        "result": result.text(),
                        "parameters": args,
                    }));
                }
                Err(e) => {
                    warn!(tool = %tool_name, error = %e, "Tool execution failed");
                    errors.push(format!("failed to execute tool '{tool_name}': {e}"));
                    results.push(json!({
                        "tool_name": tool_name,
                        "status": "failed",
                        "error": e.to_string(),
                        "parameters": args,
                    }));
                }
            }
        }

        StepResult::new(
            NAME,
            json!({
                "selected_tools": selected,
                "executed_tools": executed,
                "execution_results": results,
                "errors": errors,
                "execution_summary": format!(
                    "executed {} of {} tools successfully",
                    executed.len(),
                    selected.len()
                ),
            }),
        )
    }
}
