//! Agent roster configuration
//!
//! Agents are declared in a YAML document under a top-level `agents:`
//! mapping, keyed by agent name. Document order is the roster order.
//! A document without an `agents` mapping is an empty roster.

use std::path::Path;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::sequential::SequentialAgent;

/// Declared shape of one agent.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentSpec {
    /// What the agent does, shown to the router's selection prompt
    #[serde(default)]
    pub description: String,
    /// Whether the agent joins the roster
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Backend ids the agent is scoped to; empty means every backend
    #[serde(default)]
    pub servers: Vec<String>,
}

fn default_true() -> bool {
    true
}

/// Ordered set of agent declarations, keyed by agent name.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    agents: Vec<(String, AgentSpec)>,
}

impl Roster {
    /// Parse from a YAML document with a top-level `agents:` mapping.
    ///
    /// Entries that fail to deserialize are skipped with a warning; a
    /// malformed declaration is never fatal to the whole roster.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let doc: serde_yaml::Value =
            serde_yaml::from_str(yaml).map_err(|e| Error::Config(format!("invalid yaml: {e}")))?;

        let Some(declared) = doc.get("agents").and_then(serde_yaml::Value::as_mapping) else {
            return Ok(Self::default());
        };

        let mut agents = Vec::new();
        for (key, value) in declared {
            let Some(name) = key.as_str() else {
                warn!("Skipping agent with non-string name: {key:?}");
                continue;
            };
            match serde_yaml::from_value::<AgentSpec>(value.clone()) {
                Ok(spec) => agents.push((name.to_string(), spec)),
                Err(e) => {
                    warn!(agent = %name, error = %e, "Skipping malformed agent declaration");
                }
            }
        }

        Ok(Self { agents })
    }

    /// Load from a YAML file on disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::from_yaml(&yaml)
    }

    /// Iterate declarations in document order.
    pub fn iter(&self) -> impl Iterator<Item = &(String, AgentSpec)> {
        self.agents.iter()
    }

    /// Number of declarations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether no agents are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Build the enabled agents with the standard step pipeline,
    /// warning about scope entries that name no connected backend.
    #[must_use]
    pub fn build(&self, connected: &[String]) -> Vec<SequentialAgent> {
        let mut agents = Vec::new();
        for (name, spec) in &self.agents {
            if !spec.enabled {
                debug!(agent = %name, "Agent disabled, not rostered");
                continue;
            }
            for server in &spec.servers {
                if !connected.iter().any(|id| id == server) {
                    warn!(
                        agent = %name,
                        server = %server,
                        "Agent scoped to a backend that is not connected"
                    );
                }
            }
            agents.push(SequentialAgent::standard(
                name.clone(),
                spec.description.clone(),
                spec.servers.clone(),
            ));
        }
        agents
    }
}
