//! Stdio transport client
//!
//! Spawns the backend as a child process and speaks newline-delimited
//! JSON-RPC over its stdin/stdout. One long-lived session per connect;
//! every operation fails fast with `NotConnected` when the session is
//! absent rather than reconnecting implicitly.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::config::BackendConfig;
use crate::error::{Error, Result};
use crate::protocol::{InitializeResult, RpcNotification, RpcRequest, RpcResponse};
use crate::session::{initialize_params, McpSession};

/// Launch parameters for a stdio backend process.
#[derive(Debug, Clone)]
pub struct StdioLaunch {
    /// Executable command
    pub command: String,
    /// Command arguments
    pub args: Vec<String>,
    /// Environment overrides (`${VAR}` values are expanded)
    pub env: HashMap<String, String>,
    /// Working directory
    pub working_dir: Option<PathBuf>,
}

impl StdioLaunch {
    /// Extract launch parameters from a backend descriptor.
    pub fn from_config(id: &str, config: &BackendConfig) -> Result<Self> {
        let command = config
            .command
            .clone()
            .ok_or_else(|| Error::Config(format!("stdio server '{id}' has no command")))?;
        Ok(Self {
            command,
            args: config.args.clone(),
            env: config.env.clone(),
            working_dir: config.working_dir.clone(),
        })
    }
}

struct StdioSession {
    process: Child,
    stdin: Arc<Mutex<ChildStdin>>,
}

/// Client for one stdio backend.
///
/// All methods take `&self`; the live session sits behind a mutex so
/// the transport manager can share the client across connect attempts
/// and the registry's dispatch path.
pub struct StdioClient {
    server_id: String,
    launch: StdioLaunch,
    request_id: AtomicU64,
    pending: Arc<Mutex<HashMap<u64, oneshot::Sender<RpcResponse>>>>,
    session: Mutex<Option<StdioSession>>,
}

impl StdioClient {
    /// Create a client; the process is not spawned until `connect`.
    #[must_use]
    pub fn new(server_id: impl Into<String>, launch: StdioLaunch) -> Self {
        Self {
            server_id: server_id.into(),
            launch,
            request_id: AtomicU64::new(1),
            pending: Arc::new(Mutex::new(HashMap::new())),
            session: Mutex::new(None),
        }
    }

    /// Whether a live session exists.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.session
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Spawn the process, wire the pipes, and run the initialize
    /// handshake. On handshake failure the process is torn down before
    /// the error is returned, so a failed connect never leaks a child.
    pub async fn connect(&self) -> Result<()> {
        if self.is_connected() {
            debug!(server = %self.server_id, "Already connected");
            return Ok(());
        }

        self.spawn_process()?;

        if let Err(e) = self.handshake().await {
            self.disconnect();
            return Err(e);
        }

        Ok(())
    }

    fn spawn_process(&self) -> Result<()> {
        info!(
            server = %self.server_id,
            command = %self.launch.command,
            args = ?self.launch.args,
            "Starting MCP server process"
        );

        let mut cmd = Command::new(&self.launch.command);
        cmd.args(&self.launch.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            // Never read; a full stderr pipe would wedge the child
            .stderr(Stdio::null());

        if let Some(dir) = &self.launch.working_dir {
            cmd.current_dir(dir);
        }

        for (key, value) in &self.launch.env {
            cmd.env(key, expand_env_value(key, value));
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::Transport(format!("failed to spawn '{}': {e}", self.launch.command)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Transport("failed to get stdin handle".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Transport("failed to get stdout handle".to_string()))?;

        let pending = self.pending.clone();
        let server_id = self.server_id.clone();
        std::thread::spawn(move || {
            let reader = BufReader::new(stdout);
            for line in reader.lines() {
                match line {
                    Ok(line) if !line.is_empty() => {
                        debug!(server = %server_id, line = %line, "Received from MCP server");
                        match serde_json::from_str::<RpcResponse>(&line) {
                            Ok(response) => {
                                let mut pending =
                                    pending.lock().unwrap_or_else(|e| e.into_inner());
                                if let Some(sender) = pending.remove(&response.id) {
                                    let _ = sender.send(response);
                                }
                            }
                            Err(e) => {
                                warn!(server = %server_id, error = %e, "Unparseable line from server");
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(server = %server_id, error = %e, "Read error");
                        break;
                    }
                }
            }
            // Fail any callers still waiting once the pipe is gone.
            pending
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clear();
            debug!(server = %server_id, "Reader thread exited");
        });

        let mut session = self.session.lock().unwrap_or_else(|e| e.into_inner());
        *session = Some(StdioSession {
            process: child,
            stdin: Arc::new(Mutex::new(stdin)),
        });

        Ok(())
    }

    async fn handshake(&self) -> Result<()> {
        let result = self.request("initialize", Some(initialize_params())).await?;

        if let Some(value) = result {
            let init: InitializeResult = serde_json::from_value(value)
                .map_err(|e| Error::Protocol(format!("bad initialize result: {e}")))?;
            debug!(
                server = %self.server_id,
                protocol = %init.protocol_version,
                "MCP server initialized"
            );
        }

        self.notify("notifications/initialized")?;
        Ok(())
    }

    fn stdin_handle(&self) -> Result<Arc<Mutex<ChildStdin>>> {
        let session = self.session.lock().unwrap_or_else(|e| e.into_inner());
        session
            .as_ref()
            .map(|s| s.stdin.clone())
            .ok_or_else(|| Error::NotConnected(self.server_id.clone()))
    }

    fn write_line(&self, json: &str) -> Result<()> {
        let stdin = self.stdin_handle()?;
        let mut stdin = stdin.lock().unwrap_or_else(|e| e.into_inner());
        writeln!(stdin, "{json}")
            .and_then(|()| stdin.flush())
            .map_err(|e| Error::Transport(format!("write to server stdin failed: {e}")))
    }

    fn notify(&self, method: &str) -> Result<()> {
        let json = serde_json::to_string(&RpcNotification::new(method))
            .map_err(|e| Error::Protocol(format!("serialize notification: {e}")))?;
        self.write_line(&json)
    }

    /// Tear down the session: kill and reap the child process, close
    /// the pipe, and fail any pending requests. Idempotent.
    pub fn disconnect(&self) {
        let session = {
            let mut guard = self.session.lock().unwrap_or_else(|e| e.into_inner());
            guard.take()
        };

        if let Some(mut session) = session {
            let _ = session.process.kill();
            let _ = session.process.wait();
            info!(server = %self.server_id, "MCP server process stopped");
        }

        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

#[async_trait]
impl McpSession for StdioClient {
    fn server_id(&self) -> &str {
        &self.server_id
    }

    async fn request(&self, method: &str, params: Option<Value>) -> Result<Option<Value>> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let mut request = RpcRequest::new(method, id);
        if let Some(params) = params {
            request = request.with_params(params);
        }

        let json = serde_json::to_string(&request)
            .map_err(|e| Error::Protocol(format!("serialize request: {e}")))?;

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            pending.insert(id, tx);
        }

        debug!(server = %self.server_id, request = %json, "Sending to MCP server");

        if let Err(e) = self.write_line(&json) {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            pending.remove(&id);
            return Err(e);
        }

        let response = rx
            .await
            .map_err(|_| Error::Transport("response channel closed".to_string()))?;

        if let Some(rpc_error) = response.error {
            return Err(Error::Server {
                code: rpc_error.code,
                message: rpc_error.message,
            });
        }

        Ok(response.result)
    }
}

impl Drop for StdioClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Expand `${VAR}` references against the parent environment.
fn expand_env_value(key: &str, value: &str) -> String {
    if let Some(var_name) = value
        .strip_prefix("${")
        .and_then(|rest| rest.strip_suffix('}'))
    {
        match std::env::var(var_name) {
            Ok(expanded) => expanded,
            Err(_) => {
                warn!(var = %var_name, key = %key, "Environment variable not set, using empty string");
                String::new()
            }
        }
    } else {
        value.to_string()
    }
}
