//! Webhook front end.
//!
//! Accepts Telegram-style updates on `POST /webhook`, logs the message,
//! runs it through the agent router, and replies through the bot
//! send-message API when a token is configured. Only private chats are
//! processed. Handler failures become a 500 response; the process
//! stays up.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use courier_agents::{AgentRouter, StepContext};
use courier_llm::MultiLlm;
use courier_mcp::CapabilityRegistry;
use courier_memory::MemoryStore;

use crate::chat::{build_llm, build_registry, build_router, categorize_memory};
use crate::config::AppConfig;

/// Run the webhook server until ctrl-c.
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let registry = Arc::new(build_registry(&config).await?);
    let llm = Arc::new(build_llm(&config));
    let store = MemoryStore::from_path(&config.db_path).await?;
    let router = build_router(&config, &registry);

    let state = AppState {
        registry: registry.clone(),
        llm,
        store,
        router: Arc::new(router),
        bot_token: config.bot_token(),
        http: reqwest::Client::new(),
    };

    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    info!(bind = %config.bind, "Webhook server listening");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    if let Ok(mut registry) = Arc::try_unwrap(registry) {
        registry.disconnect_all();
    }
    Ok(())
}

#[derive(Clone)]
struct AppState {
    registry: Arc<CapabilityRegistry>,
    llm: Arc<MultiLlm>,
    store: MemoryStore,
    router: Arc<AgentRouter>,
    bot_token: Option<String>,
    http: reqwest::Client,
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/webhook", post(webhook))
        .route("/", post(webhook))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({"status": "healthy", "service": "courier"}))
}

#[derive(Debug, Deserialize)]
struct Update {
    message: Option<Incoming>,
}

#[derive(Debug, Deserialize)]
struct Incoming {
    chat: Chat,
    from: Option<Sender>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct Sender {
    id: i64,
}

async fn webhook(
    State(state): State<AppState>,
    Json(update): Json<Update>,
) -> Result<Json<Value>, AppError> {
    let ok = Json(json!({"status": "ok"}));

    let Some(message) = update.message else {
        return Ok(ok);
    };
    // Personal assistant: group traffic is none of our business.
    if message.chat.kind != "private" {
        return Ok(ok);
    }
    let Some(text) = message.text.filter(|t| !t.trim().is_empty()) else {
        return Ok(ok);
    };

    let user_id = message
        .from
        .map(|sender| sender.id.to_string())
        .unwrap_or_else(|| message.chat.id.to_string());

    state.store.log_message(&user_id, "user", &text).await?;

    let reply = if let Some(rest) = text.strip_prefix("/listmemory") {
        list_memories(&state, &user_id, rest.trim()).await?
    } else if let Some(rest) = text.strip_prefix("/memory") {
        remember(&state, &user_id, rest.trim()).await?
    } else {
        route_message(&state, &user_id, &text).await
    };

    if let Err(e) = state.store.log_message(&user_id, "assistant", &reply).await {
        warn!(error = %e, "Failed to log reply");
    }
    send_reply(&state, message.chat.id, &reply).await;

    Ok(ok)
}

async fn route_message(state: &AppState, user_id: &str, text: &str) -> String {
    let ctx = StepContext {
        registry: &state.registry,
        llm: &state.llm,
        user_id,
        agent_name: "router",
        agent_description: "routes user messages",
        servers: &[],
    };
    state.router.route(text, &ctx).await.response.message
}

async fn remember(state: &AppState, user_id: &str, content: &str) -> Result<String, AppError> {
    if content.is_empty() {
        return Ok("Usage: /memory <message>".to_string());
    }

    let Some(category) = categorize_memory(&state.llm, content).await else {
        return Ok("I couldn't categorize that right now. Please try again later.".to_string());
    };

    if !category.is_storable() {
        return Ok(format!(
            "Memory: \"{content}\"\nNot stored (not applicable for memory)."
        ));
    }

    state.store.save_memory(user_id, category, content).await?;
    Ok(format!(
        "Memory: \"{content}\"\nStored as: {}\nI'll remember this for our future conversations.",
        category.as_str().to_uppercase()
    ))
}

async fn list_memories(state: &AppState, user_id: &str, filter: &str) -> Result<String, AppError> {
    let category = if filter.is_empty() {
        None
    } else {
        Some(courier_memory::MemoryCategory::parse(filter))
    };

    let memories = state.store.list_memories(user_id, category).await?;
    if memories.is_empty() {
        return Ok("No memories stored yet.".to_string());
    }

    let mut reply = format!("Your memories ({}):\n", memories.len());
    for memory in &memories {
        reply.push_str(&format!("- [{}] {}\n", memory.category, memory.content));
    }
    Ok(reply)
}

async fn send_reply(state: &AppState, chat_id: i64, text: &str) {
    let Some(token) = &state.bot_token else {
        info!(chat = chat_id, "No bot token configured, reply not sent");
        return;
    };

    let url = format!("https://api.telegram.org/bot{token}/sendMessage");
    let result = state
        .http
        .post(&url)
        .json(&json!({"chat_id": chat_id, "text": text}))
        .send()
        .await;

    match result {
        Ok(response) if response.status().is_success() => {}
        Ok(response) => {
            warn!(chat = chat_id, status = %response.status(), "Telegram rejected the reply");
        }
        Err(e) => {
            warn!(chat = chat_id, error = %e, "Failed to send reply");
        }
    }
}

/// Handler-level failure, rendered as a 500 without touching the
/// process.
struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        warn!(error = %self.0, "Webhook handler failed");
        (StatusCode::INTERNAL_SERVER_ERROR, self.0.to_string()).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_mcp::BackendSet;

    async fn test_state() -> AppState {
        AppState {
            registry: Arc::new(CapabilityRegistry::new(BackendSet::default())),
            llm: Arc::new(MultiLlm::new()),
            store: MemoryStore::in_memory().await.unwrap(),
            router: Arc::new(AgentRouter::new()),
            bot_token: None,
            http: reqwest::Client::new(),
        }
    }

    async fn serve(state: AppState) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app(state)).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_health() {
        let base = serve(test_state().await).await;
        let body: Value = reqwest::get(format!("{base}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_private_message_is_logged_and_answered() {
        let state = test_state().await;
        let store = state.store.clone();
        let base = serve(state).await;

        let update = json!({
            "message": {
                "chat": {"id": 7, "type": "private"},
                "from": {"id": 42},
                "text": "hello"
            }
        });
        let response = reqwest::Client::new()
            .post(format!("{base}/webhook"))
            .json(&update)
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success());

        // User message plus the fallback reply are both logged.
        let messages = store.recent_messages("42", 10).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "user");
        assert_eq!(messages[0].content, "hello");
        assert_eq!(messages[1].role, "assistant");
    }

    #[tokio::test]
    async fn test_group_chats_are_ignored() {
        let state = test_state().await;
        let store = state.store.clone();
        let base = serve(state).await;

        let update = json!({
            "message": {
                "chat": {"id": 9, "type": "group"},
                "from": {"id": 42},
                "text": "hello all"
            }
        });
        let body: Value = reqwest::Client::new()
            .post(format!("{base}/webhook"))
            .json(&update)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");
        assert!(store.recent_messages("42", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_without_message_is_ok() {
        let base = serve(test_state().await).await;
        let response = reqwest::Client::new()
            .post(format!("{base}/webhook"))
            .json(&json!({"update_id": 1}))
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success());
    }
}
