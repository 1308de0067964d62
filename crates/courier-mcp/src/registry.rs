//! Capability registry
//!
//! Aggregates the tool/resource/prompt catalogs of every configured
//! backend, namespaces them, and routes invocations to the owning
//! backend's transport client. Built once per session by `connect()`;
//! the catalog maps are only read afterwards, so callers must not run
//! a second `connect()` while calls are outstanding.
//!
//! Namespacing: tools and prompts are keyed `backend_id:name`; the
//! prefix is a registry-local addressing concept and is stripped
//! before anything goes over the wire. Resources are keyed by their
//! raw URI; two backends exposing the same URI overwrite one another,
//! which the registry detects and logs loudly.

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{BackendSet, TransportKind};
use crate::error::{Error, Result};
use crate::http::HttpClient;
use crate::manager::StdioManager;
use crate::protocol::{GetPromptResult, Prompt, ReadResourceResult, Resource, Tool, ToolCallResult};
use crate::session::McpSession;
use crate::transport::{StdioClient, StdioLaunch};

/// Default execution timeout for a single tool invocation. This is the
/// only client-imposed timeout in the core; discovery and other calls
/// wait as long as the backend takes.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// A backend's transport client, resolved once at registration time.
pub enum BackendClient {
    /// Request/response HTTP endpoint
    Http(HttpClient),
    /// Spawned child process (owned by the stdio manager)
    Stdio(Arc<StdioClient>),
    /// Scripted in-process backend for tests
    #[cfg(test)]
    Mock(Arc<mock::MockBackend>),
}

impl BackendClient {
    fn session(&self) -> &dyn McpSession {
        match self {
            Self::Http(client) => client,
            Self::Stdio(client) => client.as_ref(),
            #[cfg(test)]
            Self::Mock(client) => client.as_ref(),
        }
    }
}

/// Multi-backend capability registry.
pub struct CapabilityRegistry {
    backends: BackendSet,
    clients: HashMap<String, BackendClient>,
    stdio: StdioManager,
    tools: BTreeMap<String, (String, Tool)>,
    resources: BTreeMap<String, (String, Resource)>,
    prompts: BTreeMap<String, (String, Prompt)>,
    call_timeout: Duration,
}

impl CapabilityRegistry {
    /// Create a registry over the given ordered backend descriptors.
    /// Nothing is contacted until `connect()`.
    #[must_use]
    pub fn new(backends: BackendSet) -> Self {
        Self {
            backends,
            clients: HashMap::new(),
            stdio: StdioManager::new(),
            tools: BTreeMap::new(),
            resources: BTreeMap::new(),
            prompts: BTreeMap::new(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Override the tool execution timeout.
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Override the stdio connect retry policy (tests use a
    /// millisecond backoff base).
    #[must_use]
    pub fn with_stdio_retry_policy(mut self, max_attempts: u32, backoff_base: Duration) -> Self {
        self.stdio = StdioManager::new().with_retry_policy(max_attempts, backoff_base);
        self
    }

    /// Bring up a client per enabled backend and run capability
    /// discovery. Never fails outright: unreachable, disabled, or
    /// malformed backends are skipped with a log line and the catalog
    /// reflects the union of whatever was reachable.
    pub async fn connect(&mut self) {
        // Phase 1: construct clients. Http clients need no handshake;
        // stdio backends are queued on the manager.
        for (server_id, config) in self.backends.clone().iter() {
            if !config.enabled {
                info!(server = %server_id, "Skipping disabled server");
                continue;
            }

            match config.transport {
                TransportKind::Http => match &config.url {
                    Some(url) => {
                        info!(server = %server_id, url = %url, "Configured HTTP server");
                        self.clients.insert(
                            server_id.clone(),
                            BackendClient::Http(HttpClient::new(server_id.clone(), url.clone())),
                        );
                    }
                    None => {
                        warn!(server = %server_id, "No URL for HTTP server, skipping");
                    }
                },
                TransportKind::Stdio => match StdioLaunch::from_config(server_id, config) {
                    Ok(launch) => {
                        info!(
                            server = %server_id,
                            command = %launch.command,
                            "Configured stdio server"
                        );
                        self.stdio.add_server(server_id.clone(), launch).await;
                    }
                    Err(e) => {
                        warn!(server = %server_id, error = %e, "Skipping stdio server");
                    }
                },
            }
        }

        // Phase 2: connect all queued stdio backends in parallel.
        self.stdio.connect_all().await;
        for (server_id, client) in self.stdio.iter() {
            if client.is_connected() {
                self.clients
                    .insert(server_id.to_string(), BackendClient::Stdio(client.clone()));
            }
        }

        // Phase 3: discovery, in backend declaration order.
        let order: Vec<String> = self
            .backends
            .iter()
            .map(|(server_id, _)| server_id.clone())
            .collect();
        for server_id in order {
            if self.clients.contains_key(&server_id) {
                self.discover_backend(&server_id).await;
            }
        }

        info!(
            servers = self.clients.len(),
            tools = self.tools.len(),
            resources = self.resources.len(),
            prompts = self.prompts.len(),
            "Capability discovery complete"
        );
    }

    /// Discover one backend's capabilities, tools then resources then
    /// prompts. A failure for one kind yields zero capabilities of
    /// that kind only.
    pub(crate) async fn discover_backend(&mut self, server_id: &str) {
        let Some(client) = self.clients.get(server_id) else {
            return;
        };
        let session = client.session();

        match session.list_tools().await {
            Ok(tools) => {
                for tool in tools {
                    let key = format!("{server_id}:{}", tool.name);
                    debug!(tool = %key, "Discovered tool");
                    self.tools.insert(key, (server_id.to_string(), tool));
                }
            }
            Err(e) => {
                debug!(server = %server_id, error = %e, "Server offers no tools");
            }
        }

        let session = self.clients.get(server_id).map(BackendClient::session);
        let Some(session) = session else { return };
        match session.list_resources().await {
            Ok(resources) => {
                for resource in resources {
                    let uri = resource.uri.clone();
                    debug!(resource = %uri, "Discovered resource");
                    if let Some((previous, _)) = self
                        .resources
                        .insert(uri.clone(), (server_id.to_string(), resource))
                    {
                        if previous != server_id {
                            warn!(
                                uri = %uri,
                                previous = %previous,
                                replaced_by = %server_id,
                                "Resource URI collision, later server wins"
                            );
                        }
                    }
                }
            }
            Err(e) => {
                debug!(server = %server_id, error = %e, "Server offers no resources");
            }
        }

        let session = self.clients.get(server_id).map(BackendClient::session);
        let Some(session) = session else { return };
        match session.list_prompts().await {
            Ok(prompts) => {
                for prompt in prompts {
                    let key = format!("{server_id}:{}", prompt.name);
                    debug!(prompt = %key, "Discovered prompt");
                    self.prompts.insert(key, (server_id.to_string(), prompt));
                }
            }
            Err(e) => {
                debug!(server = %server_id, error = %e, "Server offers no prompts");
            }
        }
    }

    /// All tools as ordered `(namespaced key, backend id, tool)`
    /// triples. Pure projection; safe to call repeatedly.
    #[must_use]
    pub fn list_all_tools(&self) -> Vec<(String, String, Tool)> {
        self.tools
            .iter()
            .map(|(key, (server_id, tool))| (key.clone(), server_id.clone(), tool.clone()))
            .collect()
    }

    /// All resources as ordered `(uri, backend id, resource)` triples.
    #[must_use]
    pub fn list_all_resources(&self) -> Vec<(String, String, Resource)> {
        self.resources
            .iter()
            .map(|(uri, (server_id, res))| (uri.clone(), server_id.clone(), res.clone()))
            .collect()
    }

    /// All prompts as ordered `(namespaced key, backend id, prompt)`
    /// triples.
    #[must_use]
    pub fn list_all_prompts(&self) -> Vec<(String, String, Prompt)> {
        self.prompts
            .iter()
            .map(|(key, (server_id, prompt))| (key.clone(), server_id.clone(), prompt.clone()))
            .collect()
    }

    /// Look up one tool by namespaced key.
    #[must_use]
    pub fn get_tool(&self, namespaced: &str) -> Option<(&str, &Tool)> {
        self.tools
            .get(namespaced)
            .map(|(server_id, tool)| (server_id.as_str(), tool))
    }

    /// Call a tool by its namespaced name. The `backend_id:` prefix is
    /// stripped before dispatch; only the unqualified name goes over
    /// the wire. Transport failures propagate untried; the registry
    /// never retries a dispatch.
    pub async fn call_tool(&self, namespaced: &str, arguments: Value) -> Result<ToolCallResult> {
        let (server_id, _) = self
            .tools
            .get(namespaced)
            .ok_or_else(|| Error::ToolNotFound(namespaced.to_string()))?;

        let client = self
            .clients
            .get(server_id)
            .ok_or_else(|| Error::ServerNotFound(server_id.clone()))?;

        let unqualified = strip_namespace(namespaced);
        tokio::time::timeout(
            self.call_timeout,
            client.session().call_tool(unqualified, arguments),
        )
        .await
        .map_err(|_| Error::Timeout)?
    }

    /// Read a resource by its raw URI (resource keys are unprefixed).
    pub async fn read_resource(&self, uri: &str) -> Result<ReadResourceResult> {
        let (server_id, _) = self
            .resources
            .get(uri)
            .ok_or_else(|| Error::ResourceNotFound(uri.to_string()))?;

        let client = self
            .clients
            .get(server_id)
            .ok_or_else(|| Error::ServerNotFound(server_id.clone()))?;

        client.session().read_resource(uri).await
    }

    /// Render a prompt by its namespaced name.
    pub async fn generate_prompt(
        &self,
        namespaced: &str,
        arguments: Value,
    ) -> Result<GetPromptResult> {
        let (server_id, _) = self
            .prompts
            .get(namespaced)
            .ok_or_else(|| Error::PromptNotFound(namespaced.to_string()))?;

        let client = self
            .clients
            .get(server_id)
            .ok_or_else(|| Error::ServerNotFound(server_id.clone()))?;

        let unqualified = strip_namespace(namespaced);
        client.session().get_prompt(unqualified, arguments).await
    }

    /// Tear down every stdio session and drop the catalog entries
    /// those backends owned, so the catalogs never advertise a
    /// capability that can no longer be dispatched. HTTP backends hold
    /// no session state and stay addressable. Idempotent.
    pub fn disconnect_all(&mut self) {
        self.stdio.disconnect_all();
        self.clients
            .retain(|_, client| !matches!(client, BackendClient::Stdio(_)));

        let live = &self.clients;
        self.tools.retain(|_, (owner, _)| live.contains_key(owner));
        self.resources.retain(|_, (owner, _)| live.contains_key(owner));
        self.prompts.retain(|_, (owner, _)| live.contains_key(owner));

        info!("Disconnected from all MCP servers");
    }

    /// Ids of backends with a live client.
    #[must_use]
    pub fn connected_servers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.clients.keys().cloned().collect();
        ids.sort();
        ids
    }

    #[cfg(test)]
    pub(crate) fn insert_mock(&mut self, server_id: &str, backend: Arc<mock::MockBackend>) {
        self.clients
            .insert(server_id.to_string(), BackendClient::Mock(backend));
    }
}

fn strip_namespace(namespaced: &str) -> &str {
    namespaced
        .split_once(':')
        .map_or(namespaced, |(_, name)| name)
}


#[cfg(test)]
mod tests {
    use super::mock::MockBackend;
    use super::*;

    fn math_backend() -> Arc<MockBackend> {
        Arc::new(
            MockBackend::new("math")
                .with_response(
                    "tools/list",
                    serde_json::json!({
                        "tools": [{
                            "name": "add",
                            "description": "Add two numbers",
                            "inputSchema": {
                                "type": "object",
                                "properties": {
                                    "a": {"type": "number"},
                                    "b": {"type": "number"}
                                },
                                "required": ["a", "b"]
                            }
                        }]
                    }),
                )
                .with_response(
                    "tools/call",
                    serde_json::json!({
                        "content": [{"type": "text", "text": "5"}],
                        "isError": false
                    }),
                )
                .with_response(
                    "resources/list",
                    serde_json::json!({
                        "resources": [{
                            "uri": "info://version",
                            "name": "Version",
                            "mimeType": "text/plain"
                        }]
                    }),
                )
                .with_response(
                    "prompts/list",
                    serde_json::json!({
                        "prompts": [{
                            "name": "explain",
                            "description": "Explain a result",
                            "arguments": [{"name": "topic", "required": true}]
                        }]
                    }),
                )
                .with_response(
                    "prompts/get",
                    serde_json::json!({
                        "messages": [{
                            "role": "user",
                            "content": {"type": "text", "text": "Explain addition"}
                        }]
                    }),
                ),
        )
    }

    async fn registry_with_math() -> (CapabilityRegistry, Arc<MockBackend>) {
        let mut registry = CapabilityRegistry::new(BackendSet::default());
        let backend = math_backend();
        registry.insert_mock("math", backend.clone());
        registry.discover_backend("math").await;
        (registry, backend)
    }

    #[tokio::test]
    async fn test_namespaced_keys_and_metadata() {
        let (registry, _) = registry_with_math().await;

        let tools = registry.list_all_tools();
        assert_eq!(tools.len(), 1);
        let (key, server_id, tool) = &tools[0];
        assert_eq!(key, "math:add");
        assert_eq!(server_id, "math");
        assert_eq!(tool.description, "Add two numbers");

        let (owner, tool) = registry.get_tool("math:add").unwrap();
        assert_eq!(owner, "math");
        assert_eq!(tool.input_schema["required"][0], "a");

        let prompts = registry.list_all_prompts();
        assert_eq!(prompts[0].0, "math:explain");

        let resources = registry.list_all_resources();
        assert_eq!(resources[0].0, "info://version");
        assert_eq!(resources[0].1, "math");
    }

    #[tokio::test]
    async fn test_call_tool_strips_namespace_prefix() {
        let (registry, backend) = registry_with_math().await;

        let result = registry
            .call_tool("math:add", serde_json::json!({"a": 2, "b": 3}))
            .await
            .unwrap();
        assert_eq!(result.text(), "5");

        let call = backend
            .calls()
            .into_iter()
            .find(|(method, _)| method == "tools/call")
            .unwrap();
        let params = call.1.unwrap();
        assert_eq!(params["name"], "add");
        assert_eq!(params["arguments"]["b"], 3);
    }

    #[tokio::test]
    async fn test_unknown_tool_fails_without_transport_io() {
        let (registry, backend) = registry_with_math().await;
        let calls_before = backend.calls().len();

        let err = registry
            .call_tool("math:missing", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ToolNotFound(_)));
        assert!(err.is_not_found());
        assert_eq!(backend.calls().len(), calls_before);
    }

    #[tokio::test]
    async fn test_read_resource_uses_raw_uri() {
        let (mut registry, backend) = registry_with_math().await;
        // Script a read result for the discovered URI.
        let backend2 = Arc::new(
            MockBackend::new("math").with_response(
                "resources/read",
                serde_json::json!({
                    "contents": [{
                        "uri": "info://version",
                        "mimeType": "text/plain",
                        "text": "0.1.0"
                    }]
                }),
            ),
        );
        registry.insert_mock("math", backend2.clone());
        drop(backend);

        let result = registry.read_resource("info://version").await.unwrap();
        assert_eq!(result.contents[0].text.as_deref(), Some("0.1.0"));

        let params = backend2.calls()[0].1.clone().unwrap();
        assert_eq!(params["uri"], "info://version");

        let err = registry.read_resource("info://other").await.unwrap_err();
        assert!(matches!(err, Error::ResourceNotFound(_)));
    }

    #[tokio::test]
    async fn test_generate_prompt_strips_prefix() {
        let (registry, backend) = registry_with_math().await;

        let result = registry
            .generate_prompt("math:explain", serde_json::json!({"topic": "addition"}))
            .await
            .unwrap();
        assert_eq!(result.messages.len(), 1);

        let call = backend
            .calls()
            .into_iter()
            .find(|(method, _)| method == "prompts/get")
            .unwrap();
        assert_eq!(call.1.unwrap()["name"], "explain");

        let err = registry
            .generate_prompt("math:missing", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PromptNotFound(_)));
    }

    #[tokio::test]
    async fn test_discovery_failure_for_one_kind_keeps_others() {
        let mut registry = CapabilityRegistry::new(BackendSet::default());
        let backend = Arc::new(
            MockBackend::new("partial")
                .with_response(
                    "tools/list",
                    serde_json::json!({"tools": [{"name": "only"}]}),
                )
                .with_failure("resources/list")
                .with_response(
                    "prompts/list",
                    serde_json::json!({"prompts": [{"name": "still_here"}]}),
                ),
        );
        registry.insert_mock("partial", backend);
        registry.discover_backend("partial").await;

        assert_eq!(registry.list_all_tools().len(), 1);
        assert!(registry.list_all_resources().is_empty());
        assert_eq!(registry.list_all_prompts().len(), 1);
    }

    #[tokio::test]
    async fn test_resource_uri_collision_last_writer_wins() {
        let mut registry = CapabilityRegistry::new(BackendSet::default());
        for server_id in ["first", "second"] {
            let backend = Arc::new(MockBackend::new(server_id).with_response(
                "resources/list",
                serde_json::json!({
                    "resources": [{"uri": "shared://doc", "name": server_id}]
                }),
            ));
            registry.insert_mock(server_id, backend);
            registry.discover_backend(server_id).await;
        }

        let resources = registry.list_all_resources();
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].1, "second");
    }

    #[tokio::test]
    async fn test_tool_call_timeout() {
        let mut registry = CapabilityRegistry::new(BackendSet::default())
            .with_call_timeout(Duration::from_millis(20));
        let backend = Arc::new(
            MockBackend::new("slow")
                .with_response("tools/list", serde_json::json!({"tools": [{"name": "wait"}]}))
                .with_delay(Duration::from_millis(200)),
        );
        registry.insert_mock("slow", backend);
        registry.discover_backend("slow").await;

        let err = registry
            .call_tool("slow:wait", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout));
    }

    #[tokio::test]
    async fn test_connect_with_unreachable_backends_yields_empty_catalog() {
        let yaml = r#"
servers:
  dead_http:
    name: Dead HTTP
    transport: http
  dead_stdio:
    name: Dead stdio
    transport: stdio
    command: /nonexistent/courier-test-binary
  disabled:
    name: Off
    enabled: false
    url: http://localhost:9/mcp
"#;
        let set = BackendSet::from_yaml(yaml).unwrap();
        let mut registry = CapabilityRegistry::new(set)
            .with_stdio_retry_policy(2, Duration::from_millis(5));

        registry.connect().await;

        assert!(registry.list_all_tools().is_empty());
        assert!(registry.list_all_resources().is_empty());
        assert!(registry.list_all_prompts().is_empty());

        // Still usable: lookups fail with NotFound, not a panic.
        let err = registry
            .call_tool("dead_stdio:x", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_disconnect_all_is_idempotent() {
        let (mut registry, _) = registry_with_math().await;
        registry.disconnect_all();
        registry.disconnect_all();
        // Mock clients are not stdio sessions, so dispatch still works
        // and the catalog is intact after teardown.
        assert_eq!(registry.list_all_tools().len(), 1);
    }

    #[test]
    fn test_strip_namespace() {
        assert_eq!(strip_namespace("math:add"), "add");
        assert_eq!(strip_namespace("a:b:c"), "b:c");
        assert_eq!(strip_namespace("bare"), "bare");
    }
}
