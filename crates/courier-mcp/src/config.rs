//! Backend descriptor configuration
//!
//! Backends are declared in a YAML document mapping backend id to its
//! descriptor. Document order is preserved: it is the order in which
//! the registry iterates backends during connect and discovery.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::{Error, Result};

/// Transport kind for a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Request/response over a network endpoint
    #[default]
    Http,
    /// Spawned child process, stdin/stdout-framed protocol
    Stdio,
}

/// Descriptor for a single backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Display name
    pub name: String,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// Whether the backend participates in connect()
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Transport kind
    #[serde(default)]
    pub transport: TransportKind,

    // HTTP transport fields
    /// Endpoint URL (http transport)
    #[serde(default)]
    pub url: Option<String>,

    // Stdio transport fields
    /// Executable command (stdio transport)
    #[serde(default)]
    pub command: Option<String>,
    /// Command arguments
    #[serde(default)]
    pub args: Vec<String>,
    /// Environment overrides for the child process
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Working directory for the child process
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

/// Ordered set of backend descriptors, keyed by backend id.
#[derive(Debug, Clone, Default)]
pub struct BackendSet {
    backends: Vec<(String, BackendConfig)>,
}

impl BackendSet {
    /// Parse from a YAML document with a top-level `servers:` mapping.
    ///
    /// Entries that fail to deserialize are skipped with a warning;
    /// a malformed descriptor is never fatal to the whole set.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let doc: serde_yaml::Value =
            serde_yaml::from_str(yaml).map_err(|e| Error::Config(format!("invalid yaml: {e}")))?;

        let servers = doc
            .get("servers")
            .and_then(serde_yaml::Value::as_mapping)
            .ok_or_else(|| Error::Config("missing 'servers' mapping".to_string()))?;

        let mut backends = Vec::new();
        for (key, value) in servers {
            let Some(id) = key.as_str() else {
                warn!("Skipping backend with non-string id: {key:?}");
                continue;
            };
            match serde_yaml::from_value::<BackendConfig>(value.clone()) {
                Ok(config) => backends.push((id.to_string(), config)),
                Err(e) => {
                    warn!(server = %id, error = %e, "Skipping malformed backend descriptor");
                }
            }
        }

        Ok(Self { backends })
    }

    /// Load from a YAML file on disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::from_yaml(&yaml)
    }

    /// Build from an explicit ordered list.
    #[must_use]
    pub fn from_entries(backends: Vec<(String, BackendConfig)>) -> Self {
        Self { backends }
    }

    /// Iterate descriptors in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &(String, BackendConfig)> {
        self.backends.iter()
    }

    /// Look up one descriptor by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&BackendConfig> {
        self.backends
            .iter()
            .find(|(backend_id, _)| backend_id == id)
            .map(|(_, config)| config)
    }

    /// Number of descriptors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
servers:
  math:
    name: Math server
    description: Arithmetic tools
    transport: http
    url: http://localhost:8000/mcp
  local:
    name: Local tools
    transport: stdio
    command: python
    args: ["server.py"]
    env:
      LOG_LEVEL: debug
  flaky:
    name: Broken entry
    transport: stdio
    command: [this, is, not, a, string]
  disabled:
    name: Off
    enabled: false
    url: http://localhost:9000/mcp
"#;

    #[test]
    fn test_parse_preserves_document_order() {
        let set = BackendSet::from_yaml(SAMPLE).unwrap();
        let ids: Vec<&str> = set.iter().map(|(id, _)| id.as_str()).collect();
        // `flaky` is malformed and skipped; the rest keep their order.
        assert_eq!(ids, vec!["math", "local", "disabled"]);
    }

    #[test]
    fn test_parse_fields() {
        let set = BackendSet::from_yaml(SAMPLE).unwrap();

        let math = set.get("math").unwrap();
        assert_eq!(math.transport, TransportKind::Http);
        assert_eq!(math.url.as_deref(), Some("http://localhost:8000/mcp"));
        assert!(math.enabled);

        let local = set.get("local").unwrap();
        assert_eq!(local.transport, TransportKind::Stdio);
        assert_eq!(local.command.as_deref(), Some("python"));
        assert_eq!(local.args, vec!["server.py"]);
        assert_eq!(local.env.get("LOG_LEVEL").unwrap(), "debug");

        assert!(!set.get("disabled").unwrap().enabled);
    }

    #[test]
    fn test_missing_servers_mapping_is_an_error() {
        assert!(BackendSet::from_yaml("other: {}").is_err());
    }
}
