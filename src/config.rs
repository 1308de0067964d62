//! Application configuration.

use std::path::PathBuf;

/// Environment variable holding the Telegram bot token.
pub const BOT_TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";

/// Paths and addresses the front ends run with.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Backend descriptor YAML
    pub servers_config: PathBuf,
    /// LLM provider YAML
    pub llm_config: PathBuf,
    /// SQLite database file
    pub db_path: PathBuf,
    /// Webhook bind address
    pub bind: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            servers_config: PathBuf::from("config/servers.yaml"),
            llm_config: PathBuf::from("config/llm.yaml"),
            db_path: PathBuf::from("data/courier.db"),
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

impl AppConfig {
    /// Telegram bot token from the environment, if present.
    #[must_use]
    pub fn bot_token(&self) -> Option<String> {
        std::env::var(BOT_TOKEN_ENV).ok().filter(|t| !t.is_empty())
    }
}
