//! Multi-provider routing
//!
//! Providers are declared in YAML, keyed by id, with API keys pulled
//! from the environment. The first enabled provider whose key is
//! present becomes the default; the rest stay addressable by name.
//! Also home of the structured-output helper that retries until a
//! completion parses as JSON with the required fields.

use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::openai::{ChatConfig, ChatProvider, GROQ_API_BASE, OPENAI_API_BASE};
use crate::provider::{CompletionRequest, CompletionResponse, LlmProvider, Message};

/// Attempts before structured output is declared unobtainable.
const MAX_JSON_ATTEMPTS: u32 = 3;

/// One provider entry in the YAML document.
#[derive(Debug, Clone, Deserialize)]
struct ProviderEntry {
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default)]
    api_key_env: Option<String>,
    #[serde(default)]
    base_url: Option<String>,
    #[serde(default)]
    default_model: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Router over every configured provider.
#[derive(Default)]
pub struct MultiLlm {
    providers: Vec<(String, Arc<dyn LlmProvider>)>,
    default: Option<String>,
}

impl MultiLlm {
    /// Empty router; providers are added from config or by hand.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a YAML document with a top-level `llm.providers`
    /// mapping. Declaration order decides the default: the first
    /// enabled entry with a key in the environment wins. Entries that
    /// cannot be constructed are skipped with a warning.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let doc: serde_yaml::Value = serde_yaml::from_str(yaml)
            .map_err(|e| Error::NotConfigured(format!("invalid llm config: {e}")))?;

        let Some(entries) = doc
            .get("llm")
            .and_then(|llm| llm.get("providers"))
            .and_then(serde_yaml::Value::as_mapping)
        else {
            return Err(Error::NotConfigured(
                "missing 'llm.providers' mapping".to_string(),
            ));
        };

        let mut router = Self::new();
        for (key, value) in entries {
            let Some(id) = key.as_str() else { continue };
            let entry: ProviderEntry = match serde_yaml::from_value(value.clone()) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(provider = %id, error = %e, "Skipping malformed provider entry");
                    continue;
                }
            };

            if !entry.enabled {
                debug!(provider = %id, "Provider disabled");
                continue;
            }

            match build_provider(id, &entry) {
                Ok(provider) => router.add_provider(id, Arc::new(provider)),
                Err(e) => {
                    warn!(provider = %id, error = %e, "Skipping provider");
                }
            }
        }

        if let Some(default) = &router.default {
            info!(default = %default, providers = router.providers.len(), "LLM router ready");
        } else {
            warn!("No LLM provider configured");
        }

        Ok(router)
    }

    /// Load from a YAML file on disk.
    pub fn from_path(path: &std::path::Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| Error::NotConfigured(format!("{}: {e}", path.display())))?;
        Self::from_yaml(&yaml)
    }

    /// Register a provider. The first one registered becomes the
    /// default.
    pub fn add_provider(&mut self, id: impl Into<String>, provider: Arc<dyn LlmProvider>) {
        let id = id.into();
        if self.default.is_none() {
            self.default = Some(id.clone());
        }
        self.providers.push((id, provider));
    }

    /// Whether a provider with this id is registered.
    #[must_use]
    pub fn has_provider(&self, id: &str) -> bool {
        self.providers.iter().any(|(name, _)| name == id)
    }

    /// Registered provider ids in declaration order.
    #[must_use]
    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|(name, _)| name.clone()).collect()
    }

    /// Id of the default provider, if any.
    #[must_use]
    pub fn default_provider(&self) -> Option<&str> {
        self.default.as_deref()
    }

    fn resolve(&self, id: Option<&str>) -> Result<&Arc<dyn LlmProvider>> {
        let id = match id {
            Some(id) => id,
            None => self
                .default
                .as_deref()
                .ok_or_else(|| Error::NotConfigured("no LLM provider available".to_string()))?,
        };
        self.providers
            .iter()
            .find(|(name, _)| name == id)
            .map(|(_, provider)| provider)
            .ok_or_else(|| Error::NotConfigured(format!("unknown provider '{id}'")))
    }

    /// Run a completion on the named provider, or the default.
    pub async fn generate_response(
        &self,
        provider: Option<&str>,
        request: CompletionRequest,
    ) -> Result<CompletionResponse> {
        self.resolve(provider)?.complete(request).await
    }

    /// Run a completion that must come back as a JSON object carrying
    /// all `required_fields`. Non-conforming output is retried up to
    /// three times with an increasingly blunt corrective message; the
    /// final failure is a [`Error::SchemaValidation`].
    pub async fn generate_json_response(
        &self,
        provider: Option<&str>,
        prompt: &str,
        required_fields: &[&str],
    ) -> Result<Value> {
        let resolved = self.resolve(provider)?;

        let mut messages = vec![
            Message::system(
                "Respond with a single JSON object and nothing else. \
                 No prose, no markdown fences.",
            ),
            Message::user(prompt),
        ];

        let mut last_problem = String::new();
        for attempt in 1..=MAX_JSON_ATTEMPTS {
            let response = resolved
                .complete(CompletionRequest::new(messages.clone()).with_temperature(0.0))
                .await?;

            let cleaned = strip_code_fences(&response.content);
            match serde_json::from_str::<Value>(cleaned) {
                Ok(value) if value.is_object() => {
                    let missing = missing_fields(&value, required_fields);
                    if missing.is_empty() {
                        return Ok(value);
                    }
                    last_problem = format!("missing fields: {}", missing.join(", "));
                }
                Ok(_) => {
                    last_problem = "not a JSON object".to_string();
                }
                Err(e) => {
                    last_problem = format!("not valid JSON: {e}");
                }
            }

            debug!(attempt, problem = %last_problem, "Structured output rejected");
            messages.push(Message::assistant(response.content));
            messages.push(Message::user(format!(
                "That response was rejected ({last_problem}). Reply again with \
                 ONLY a JSON object containing the fields: {}.",
                required_fields.join(", ")
            )));
        }

        Err(Error::SchemaValidation(last_problem))
    }
}

fn build_provider(id: &str, entry: &ProviderEntry) -> Result<ChatProvider> {
    let key_env = entry
        .api_key_env
        .clone()
        .unwrap_or_else(|| format!("{}_API_KEY", id.to_uppercase()));
    let api_key = std::env::var(&key_env)
        .map_err(|_| Error::NotConfigured(format!("{key_env} not set")))?;

    let base_url = match (entry.base_url.as_deref(), id) {
        (Some(url), _) => url.to_string(),
        (None, "groq") => GROQ_API_BASE.to_string(),
        (None, "openai") => OPENAI_API_BASE.to_string(),
        (None, _) => {
            return Err(Error::NotConfigured(format!(
                "provider '{id}' needs a base_url"
            )))
        }
    };

    let default_model = match (entry.default_model.as_deref(), id) {
        (Some(model), _) => model.to_string(),
        (None, "groq") => "llama-3.3-70b-versatile".to_string(),
        (None, "openai") => "gpt-4o-mini".to_string(),
        (None, _) => {
            return Err(Error::NotConfigured(format!(
                "provider '{id}' needs a default_model"
            )))
        }
    };

    ChatProvider::new(ChatConfig::new(id, api_key, base_url, default_model))
}

/// Strip a leading/trailing markdown code fence, if present.
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

fn missing_fields<'a>(value: &Value, required: &[&'a str]) -> Vec<&'a str> {
    required
        .iter()
        .filter(|field| value.get(**field).is_none())
        .copied()
        .collect()
}
