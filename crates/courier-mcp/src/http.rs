//! HTTP transport client
//!
//! Talks to a pre-existing MCP endpoint over request/response HTTP.
//! There is no persistent session: every operation runs its own
//! initialize handshake followed by the single RPC, then drops the
//! connection. Simpler and crash-isolated at the cost of an extra
//! round trip per call.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::protocol::{RpcRequest, RpcResponse};
use crate::session::{initialize_params, McpSession};

/// Session id header used by streamable-HTTP MCP servers.
const SESSION_HEADER: &str = "mcp-session-id";

/// Client for one HTTP backend. Holds only the target URL.
#[derive(Debug, Clone)]
pub struct HttpClient {
    server_id: String,
    url: String,
    client: reqwest::Client,
}

impl HttpClient {
    /// Create a client for the given endpoint. No handshake happens at
    /// construction; the endpoint is first contacted on the first call.
    #[must_use]
    pub fn new(server_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            server_id: server_id.into(),
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Target endpoint URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn post(
        &self,
        body: &RpcRequest,
        session_id: Option<&str>,
    ) -> Result<(RpcResponse, Option<String>)> {
        let mut request = self.client.post(&self.url).json(body);
        if let Some(session_id) = session_id {
            request = request.header(SESSION_HEADER, session_id);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Transport(format!("request to {} failed: {e}", self.url)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Transport(format!(
                "{} returned HTTP {status}",
                self.url
            )));
        }

        let session_id = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string);

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| Error::Protocol(format!("bad response body: {e}")))?;

        Ok((body, session_id))
    }
}

#[async_trait]
impl McpSession for HttpClient {
    fn server_id(&self) -> &str {
        &self.server_id
    }

    async fn request(&self, method: &str, params: Option<Value>) -> Result<Option<Value>> {
        debug!(server = %self.server_id, method = %method, "HTTP MCP call");

        // Fresh handshake per call.
        let init = RpcRequest::new("initialize", 1).with_params(initialize_params());
        let (init_response, session_id) = self.post(&init, None).await?;
        if let Some(rpc_error) = init_response.error {
            return Err(Error::Server {
                code: rpc_error.code,
                message: rpc_error.message,
            });
        }

        let mut request = RpcRequest::new(method, 2);
        if let Some(params) = params {
            request = request.with_params(params);
        }

        let (response, _) = self.post(&request, session_id.as_deref()).await?;
        if let Some(rpc_error) = response.error {
            return Err(Error::Server {
                code: rpc_error.code,
                message: rpc_error.message,
            });
        }

        Ok(response.result)
    }
}
