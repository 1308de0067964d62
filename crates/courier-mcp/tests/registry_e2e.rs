//! End-to-end registry tests against live transports: a scripted
//! shell process speaking newline-delimited JSON-RPC on stdio, and an
//! in-process axum endpoint speaking MCP over HTTP.

use std::collections::HashMap;
use std::time::Duration;

use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use courier_mcp::config::{BackendConfig, BackendSet, TransportKind};
use courier_mcp::registry::CapabilityRegistry;
use courier_mcp::Error;

/// Shell MCP server: answers initialize, declares one `echo` tool, and
/// returns "hi" for every call. Unknown methods get an empty result.
const STDIO_SERVER: &str = r#"
while IFS= read -r line; do
  id=$(printf '%s' "$line" | sed -n 's/.*"id":\([0-9][0-9]*\).*/\1/p')
  [ -z "$id" ] && continue
  case "$line" in
    *'"tools/list"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"tools":[{"name":"echo","description":"Echo text back","inputSchema":{"type":"object","properties":{"text":{"type":"string"}},"required":["text"]}}]}}\n' "$id" ;;
    *'"tools/call"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"content":[{"type":"text","text":"hi"}],"isError":false}}\n' "$id" ;;
    *'"initialize"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"protocolVersion":"2024-11-05","capabilities":{"tools":{}},"serverInfo":{"name":"fake","version":"0.0.1"}}}\n' "$id" ;;
    *)
      printf '{"jsonrpc":"2.0","id":%s,"result":{}}\n' "$id" ;;
  esac
done
"#;

async fn rpc_handler(Json(request): Json<Value>) -> Json<Value> {
    let id = request["id"].clone();
    let result = match request["method"].as_str() {
        Some("initialize") => json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {"tools": {}, "resources": {}, "prompts": {}},
            "serverInfo": {"name": "calc", "version": "0.0.1"}
        }),
        Some("tools/list") => json!({
            "tools": [{
                "name": "add",
                "description": "Add two numbers",
                "inputSchema": {
                    "type": "object",
                    "properties": {"a": {"type": "number"}, "b": {"type": "number"}},
                    "required": ["a", "b"]
                }
            }]
        }),
        Some("tools/call") => {
            let args = &request["params"]["arguments"];
            let sum = args["a"].as_f64().unwrap_or(0.0) + args["b"].as_f64().unwrap_or(0.0);
            json!({
                "content": [{"type": "text", "text": sum.to_string()}],
                "isError": false
            })
        }
        Some("resources/list") => json!({
            "resources": [{"uri": "info://version", "name": "Version", "mimeType": "text/plain"}]
        }),
        Some("resources/read") => json!({
            "contents": [{
                "uri": request["params"]["uri"],
                "mimeType": "text/plain",
                "text": "0.1.0"
            }]
        }),
        Some("prompts/list") => json!({
            "prompts": [{
                "name": "greet",
                "description": "Greet someone",
                "arguments": [{"name": "who", "required": true}]
            }]
        }),
        Some("prompts/get") => json!({
            "messages": [{
                "role": "user",
                "content": {"type": "text", "text": "Say hello"}
            }]
        }),
        _ => json!({}),
    };
    Json(json!({"jsonrpc": "2.0", "id": id, "result": result}))
}

async fn spawn_http_server() -> String {
    let app = Router::new().route("/mcp", post(rpc_handler));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/mcp")
}

fn http_backend(url: &str) -> BackendConfig {
    BackendConfig {
        name: "Calculator".into(),
        description: String::new(),
        enabled: true,
        transport: TransportKind::Http,
        url: Some(url.to_string()),
        command: None,
        args: Vec::new(),
        env: HashMap::new(),
        working_dir: None,
    }
}

fn stdio_backend(command: &str, args: Vec<String>) -> BackendConfig {
    BackendConfig {
        name: "Local".into(),
        description: String::new(),
        enabled: true,
        transport: TransportKind::Stdio,
        url: None,
        command: Some(command.to_string()),
        args,
        env: HashMap::new(),
        working_dir: None,
    }
}

#[cfg(unix)]
#[tokio::test]
async fn test_mixed_transport_catalog_and_dispatch() {
    let url = spawn_http_server().await;

    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("server.sh");
    std::fs::write(&script, STDIO_SERVER).unwrap();

    let backends = BackendSet::from_entries(vec![
        ("calc".to_string(), http_backend(&url)),
        (
            "local".to_string(),
            stdio_backend("sh", vec![script.display().to_string()]),
        ),
        (
            "dead".to_string(),
            stdio_backend("/nonexistent/courier-test-binary", Vec::new()),
        ),
    ]);

    let mut registry = CapabilityRegistry::new(backends)
        .with_stdio_retry_policy(2, Duration::from_millis(10));
    registry.connect().await;

    // Capabilities from both live backends; none from the dead one.
    let keys: Vec<String> = registry
        .list_all_tools()
        .into_iter()
        .map(|(key, _, _)| key)
        .collect();
    assert_eq!(keys, vec!["calc:add", "local:echo"]);

    let result = registry
        .call_tool("calc:add", json!({"a": 2, "b": 3}))
        .await
        .unwrap();
    assert_eq!(result.text(), "5");

    let result = registry
        .call_tool("local:echo", json!({"text": "hi"}))
        .await
        .unwrap();
    assert_eq!(result.text(), "hi");

    let resource = registry.read_resource("info://version").await.unwrap();
    assert_eq!(resource.contents[0].text.as_deref(), Some("0.1.0"));

    let prompt = registry
        .generate_prompt("calc:greet", json!({"who": "world"}))
        .await
        .unwrap();
    assert_eq!(prompt.messages.len(), 1);

    registry.disconnect_all();
    registry.disconnect_all();

    // Teardown purges the stdio backend's catalog entries; the HTTP
    // backend keeps its own and stays callable.
    let keys: Vec<String> = registry
        .list_all_tools()
        .into_iter()
        .map(|(key, _, _)| key)
        .collect();
    assert_eq!(keys, vec!["calc:add"]);

    let err = registry
        .call_tool("local:echo", json!({"text": "hi"}))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ToolNotFound(_)));

    let result = registry
        .call_tool("calc:add", json!({"a": 1, "b": 1}))
        .await
        .unwrap();
    assert_eq!(result.text(), "2");
}

#[tokio::test]
async fn test_http_only_roundtrip() {
    let url = spawn_http_server().await;
    let backends = BackendSet::from_entries(vec![("calc".to_string(), http_backend(&url))]);

    let mut registry = CapabilityRegistry::new(backends);
    registry.connect().await;

    assert_eq!(registry.connected_servers(), vec!["calc"]);
    assert_eq!(registry.list_all_prompts().len(), 1);
    assert_eq!(registry.list_all_resources().len(), 1);

    let result = registry
        .call_tool("calc:add", json!({"a": 40, "b": 2}))
        .await
        .unwrap();
    assert_eq!(result.text(), "42");
}
