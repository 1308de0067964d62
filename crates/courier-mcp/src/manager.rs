//! Stdio transport manager
//!
//! Owns the set of spawned stdio sessions: queued registration,
//! parallel connect with bounded retry and exponential backoff, and
//! bulk teardown. One backend exhausting its retries never blocks or
//! fails the others.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::transport::{StdioClient, StdioLaunch};

/// Default number of connect attempts per backend.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default backoff base; delays are base, 2*base, 4*base, ...
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Manager for stdio backend sessions.
pub struct StdioManager {
    clients: Vec<(String, Arc<StdioClient>)>,
    initialized: bool,
    max_attempts: u32,
    backoff_base: Duration,
}

impl Default for StdioManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StdioManager {
    /// Create an empty manager with the default retry policy.
    #[must_use]
    pub fn new() -> Self {
        Self {
            clients: Vec::new(),
            initialized: false,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_base: DEFAULT_BACKOFF_BASE,
        }
    }

    /// Override the retry policy. Tests use a millisecond base.
    #[must_use]
    pub fn with_retry_policy(mut self, max_attempts: u32, backoff_base: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.backoff_base = backoff_base;
        self
    }

    /// Register a backend. Before the initial `connect_all` the client
    /// is only queued; afterwards it is connected immediately, so
    /// dynamic additions still work.
    pub async fn add_server(&mut self, server_id: impl Into<String>, launch: StdioLaunch) {
        let server_id = server_id.into();

        if self.get(&server_id).is_some() {
            warn!(server = %server_id, "Server already registered, replacing");
            self.remove_server(&server_id);
        }

        let client = Arc::new(StdioClient::new(server_id.clone(), launch));
        self.clients.push((server_id.clone(), client.clone()));

        if self.initialized {
            connect_with_retry(&server_id, &client, self.max_attempts, self.backoff_base).await;
        }
    }

    /// Connect every registered, not-yet-connected backend
    /// concurrently. Individual failures are logged and tolerated.
    pub async fn connect_all(&mut self) {
        let attempts = self.max_attempts;
        let base = self.backoff_base;

        let tasks = self
            .clients
            .iter()
            .filter(|(_, client)| !client.is_connected())
            .map(|(server_id, client)| {
                let server_id = server_id.clone();
                let client = client.clone();
                async move { connect_with_retry(&server_id, &client, attempts, base).await }
            });

        let results = join_all(tasks).await;
        let connected = results.iter().filter(|ok| **ok).count();
        info!(
            connected,
            total = self.clients.len(),
            "Stdio connect pass complete"
        );

        self.initialized = true;
    }

    /// Disconnect and drop one backend.
    pub fn remove_server(&mut self, server_id: &str) {
        if let Some(index) = self.clients.iter().position(|(id, _)| id == server_id) {
            let (_, client) = self.clients.remove(index);
            client.disconnect();
            info!(server = %server_id, "Removed stdio server");
        }
    }

    /// Tear down every session. Proceeds backend-by-backend and always
    /// clears the live set; safe to call when never connected.
    pub fn disconnect_all(&mut self) {
        for (server_id, client) in self.clients.drain(..) {
            client.disconnect();
            tracing::debug!(server = %server_id, "Disconnected stdio server");
        }
        self.initialized = false;
    }

    /// Look up one client by backend id.
    #[must_use]
    pub fn get(&self, server_id: &str) -> Option<Arc<StdioClient>> {
        self.clients
            .iter()
            .find(|(id, _)| id == server_id)
            .map(|(_, client)| client.clone())
    }

    /// Iterate clients in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<StdioClient>)> {
        self.clients.iter().map(|(id, client)| (id.as_str(), client))
    }

    /// Whether the initial connect pass has completed.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Number of registered backends (connected or not).
    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Whether no backends are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

/// Connect one client with bounded retry; the backoff sleep is a
/// non-blocking suspension so concurrent attempts are not starved.
async fn connect_with_retry(
    server_id: &str,
    client: &StdioClient,
    max_attempts: u32,
    backoff_base: Duration,
) -> bool {
    for attempt in 0..max_attempts {
        match client.connect().await {
            Ok(()) => {
                info!(server = %server_id, attempt = attempt + 1, "Connected to stdio server");
                return true;
            }
            Err(e) => {
                warn!(
                    server = %server_id,
                    attempt = attempt + 1,
                    error = %e,
                    "Stdio connect attempt failed"
                );
                if attempt + 1 < max_attempts {
                    tokio::time::sleep(backoff_base * 2u32.pow(attempt)).await;
                }
            }
        }
    }
    warn!(server = %server_id, attempts = max_attempts, "Giving up on stdio server");
    false
}
