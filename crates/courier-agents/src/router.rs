//! Agent router.
//!
//! Picks an agent from the roster by asking the LLM, then hands the
//! message to it. Routing never crashes the caller: selection errors
//! and "no suitable agent" both degrade to a plain conversational
//! reply.

use courier_llm::{CompletionRequest, Message};
use tracing::{debug, info, warn};

use crate::message::{AgentResponse, RoutedResponse};
use crate::sequential::SequentialAgent;
use crate::step::StepContext;

const FALLBACK_REPLY: &str =
    "I'm sorry, I couldn't process that message right now. Please try again.";

/// Router over a roster of agents.
#[derive(Default)]
pub struct AgentRouter {
    agents: Vec<SequentialAgent>,
}

impl AgentRouter {
    /// Router with an empty roster; every message gets a plain reply.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an agent to the roster.
    pub fn add_agent(&mut self, agent: SequentialAgent) {
        self.agents.push(agent);
    }

    /// Names of the rostered agents.
    #[must_use]
    pub fn agent_names(&self) -> Vec<&str> {
        self.agents.iter().map(SequentialAgent::name).collect()
    }

    /// Route one message: select an agent, run it, or fall back to a
    /// plain conversational reply.
    pub async fn route(&self, user_message: &str, ctx: &StepContext<'_>) -> RoutedResponse {
        if self.agents.is_empty() {
            debug!("No agents rostered, replying directly");
            return RoutedResponse {
                agent: None,
                reason: None,
                response: self.plain_reply(user_message, ctx).await,
            };
        }

        let (name, reason) = match self.select_agent(user_message, ctx).await {
            Ok(selection) => selection,
            Err(detail) => {
                warn!(error = %detail, "Agent selection failed, replying directly");
                return RoutedResponse {
                    agent: None,
                    reason: None,
                    response: self.plain_reply(user_message, ctx).await,
                };
            }
        };

        if name.eq_ignore_ascii_case("none") {
            info!(reason = %reason, "No agent selected");
            return RoutedResponse {
                agent: None,
                reason: Some(reason),
                response: self.plain_reply(user_message, ctx).await,
            };
        }

        let Some(agent) = self
            .agents
            .iter()
            .find(|agent| agent.name().eq_ignore_ascii_case(&name))
        else {
            warn!(agent = %name, "Selected agent is not on the roster");
            return RoutedResponse {
                agent: None,
                reason: Some(reason),
                response: self.plain_reply(user_message, ctx).await,
            };
        };

        info!(agent = %agent.name(), reason = %reason, "Routing message");
        let agent_ctx = StepContext {
            registry: ctx.registry,
            llm: ctx.llm,
            user_id: ctx.user_id,
            agent_name: agent.name(),
            agent_description: agent.description(),
            servers: agent.servers(),
        };
        let response = agent.handle(user_message, &agent_ctx).await;

        RoutedResponse {
            agent: Some(agent.name().to_string()),
            reason: Some(reason),
            response,
        }
    }

    async fn select_agent(
        &self,
        user_message: &str,
        ctx: &StepContext<'_>,
    ) -> std::result::Result<(String, String), String> {
        let roster: Vec<String> = self
            .agents
            .iter()
            .map(|agent| format!("- {}: {}", agent.name(), agent.description()))
            .collect();

        let prompt = format!(
            "You are a message router. Select the most appropriate agent to \
             handle the user message below. Do not guess: if you are not sure \
             an agent fits, select none.\n\n\
             Available agents:\n{roster}\n\n\
             User message: \"{user_message}\"\n\n\
             Reply with `name` (the agent's name, or \"none\" if no agent is \
             suitable) and `reason` (why you chose it). Always give a reason.",
            roster = roster.join("\n"),
        );

        let selection = ctx
            .llm
            .generate_json_response(None, &prompt, &["name", "reason"])
            .await
            .map_err(|e| e.to_string())?;

        let name = selection["name"]
            .as_str()
            .ok_or_else(|| "selection has no name".to_string())?
            .to_string();
        let reason = selection["reason"]
            .as_str()
            .unwrap_or("no reason given")
            .to_string();

        Ok((name, reason))
    }

    /// Plain conversational reply with no agent involved.
    async fn plain_reply(&self, user_message: &str, ctx: &StepContext<'_>) -> AgentResponse {
        let request = CompletionRequest::new(vec![
            Message::system("You are a helpful, concise assistant."),
            Message::user(user_message),
        ]);

        match ctx.llm.generate_response(None, request).await {
            Ok(response) => AgentResponse::success(response.content, None),
            Err(e) => {
                warn!(error = %e, "Fallback reply failed");
                AgentResponse::success(FALLBACK_REPLY, None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ResponseStatus;
    use crate::step::{AgentStep, StepResult};
    use async_trait::async_trait;
    use courier_llm::{
        CompletionResponse, Error as LlmError, LlmProvider, MultiLlm, Result as LlmResult,
    };
    use courier_mcp::{BackendSet, CapabilityRegistry};
    use serde_json::{json, Value};
    use std::sync::Mutex;

    struct ScriptedProvider {
        responses: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        fn new(responses: &[&str]) -> Self {
            Self {
                responses: Mutex::new(responses.iter().rev().map(|s| (*s).to_string()).collect()),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        fn default_model(&self) -> &str {
            "test-model"
        }

        async fn complete(&self, _request: CompletionRequest) -> LlmResult<CompletionResponse> {
            let content = self
                .responses
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| LlmError::Api("script exhausted".to_string()))?;
            Ok(CompletionResponse {
                content,
                model: "test-model".to_string(),
                usage: None,
            })
        }
    }

    struct FinalStep;

    #[async_trait]
    impl AgentStep for FinalStep {
        fn name(&self) -> &str {
            "final"
        }

        fn description(&self) -> &str {
            "produces the reply"
        }

        async fn execute(&self, _inputs: &Value, _ctx: &StepContext<'_>) -> StepResult {
            StepResult::new("final", json!({"final_response": "handled by helper"}))
        }
    }

    fn router_with_helper() -> AgentRouter {
        let mut router = AgentRouter::new();
        router.add_agent(SequentialAgent::new(
            "helper",
            "handles everything in tests",
            vec![],
            vec![Box::new(FinalStep)],
        ));
        router
    }

    fn llm_with(responses: &[&str]) -> MultiLlm {
        let mut llm = MultiLlm::new();
        llm.add_provider(
            "scripted",
            std::sync::Arc::new(ScriptedProvider::new(responses)),
        );
        llm
    }

    fn ctx<'a>(registry: &'a CapabilityRegistry, llm: &'a MultiLlm) -> StepContext<'a> {
        StepContext {
            registry,
            llm,
            user_id: "alice",
            agent_name: "router",
            agent_description: "routes messages",
            servers: &[],
        }
    }

    #[tokio::test]
    async fn test_routes_to_selected_agent() {
        let registry = CapabilityRegistry::new(BackendSet::default());
        let llm = llm_with(&[r#"{"name": "Helper", "reason": "fits the request"}"#]);
        let router = router_with_helper();

        let routed = router.route("do the thing", &ctx(&registry, &llm)).await;
        assert_eq!(routed.agent.as_deref(), Some("helper"));
        assert_eq!(routed.response.message, "handled by helper");
        assert_eq!(routed.response.status, ResponseStatus::Success);
    }

    struct ScopeEchoStep;

    #[async_trait]
    impl AgentStep for ScopeEchoStep {
        fn name(&self) -> &str {
            "scope_echo"
        }

        fn description(&self) -> &str {
            "replies with the backend scope it was handed"
        }

        async fn execute(&self, _inputs: &Value, ctx: &StepContext<'_>) -> StepResult {
            StepResult::new(
                "scope_echo",
                json!({"final_response": ctx.servers.join(",")}),
            )
        }
    }

    #[tokio::test]
    async fn test_selected_agent_scope_reaches_its_steps() {
        let registry = CapabilityRegistry::new(BackendSet::default());
        let llm = llm_with(&[r#"{"name": "scoped", "reason": "fits"}"#]);
        let mut router = AgentRouter::new();
        router.add_agent(SequentialAgent::new(
            "scoped",
            "only sees two backends",
            vec!["calc".to_string(), "notes".to_string()],
            vec![Box::new(ScopeEchoStep)],
        ));

        let routed = router.route("go", &ctx(&registry, &llm)).await;
        assert_eq!(routed.agent.as_deref(), Some("scoped"));
        assert_eq!(routed.response.message, "calc,notes");
    }

    #[tokio::test]
    async fn test_none_selection_falls_back_to_plain_reply() {
        let registry = CapabilityRegistry::new(BackendSet::default());
        let llm = llm_with(&[
            r#"{"name": "none", "reason": "just small talk"}"#,
            "hello to you too",
        ]);
        let router = router_with_helper();

        let routed = router.route("hi!", &ctx(&registry, &llm)).await;
        assert!(routed.agent.is_none());
        assert_eq!(routed.reason.as_deref(), Some("just small talk"));
        assert_eq!(routed.response.message, "hello to you too");
    }

    #[tokio::test]
    async fn test_unknown_agent_name_falls_back() {
        let registry = CapabilityRegistry::new(BackendSet::default());
        let llm = llm_with(&[
            r#"{"name": "nonexistent", "reason": "confused"}"#,
            "plain reply",
        ]);
        let router = router_with_helper();

        let routed = router.route("hm", &ctx(&registry, &llm)).await;
        assert!(routed.agent.is_none());
        assert_eq!(routed.response.message, "plain reply");
    }

    #[tokio::test]
    async fn test_no_llm_still_replies() {
        let registry = CapabilityRegistry::new(BackendSet::default());
        let llm = MultiLlm::new();
        let router = router_with_helper();

        let routed = router.route("hi", &ctx(&registry, &llm)).await;
        assert_eq!(routed.response.status, ResponseStatus::Success);
        assert_eq!(routed.response.message, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn test_empty_roster_replies_directly() {
        let registry = CapabilityRegistry::new(BackendSet::default());
        let llm = llm_with(&["direct answer"]);
        let router = AgentRouter::new();

        let routed = router.route("question", &ctx(&registry, &llm)).await;
        assert!(routed.agent.is_none());
        assert_eq!(routed.response.message, "direct answer");
    }
}
