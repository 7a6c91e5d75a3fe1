//! Client/server round trips over in-memory pipes.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::io::{duplex, split};

use aria_mcp::{CallToolResult, McpClient, McpError, McpServer, McpServerConfig, ToolHandler, ToolInfo};

#[derive(Default)]
struct Calculator {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl ToolHandler for Calculator {
    fn list_tools(&self) -> Vec<ToolInfo> {
        vec![
            ToolInfo {
                name: "add".to_string(),
                description: Some("Add two numbers".to_string()),
                input_schema: Some(json!({
                    "type": "object",
                    "properties": {
                        "a": {"type": "number"},
                        "b": {"type": "number"}
                    },
                    "required": ["a", "b"]
                })),
            },
            ToolInfo {
                name: "fail".to_string(),
                description: None,
                input_schema: Some(json!({"type": "object", "properties": {}})),
            },
        ]
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> CallToolResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match name {
            "add" => {
                let a = arguments["a"].as_f64().unwrap_or_default();
                let b = arguments["b"].as_f64().unwrap_or_default();
                CallToolResult::success(format!("{}", a + b))
            }
            "fail" => CallToolResult::error("always fails"),
            other => CallToolResult::error(format!("Unknown tool: {}", other)),
        }
    }
}

async fn connected() -> (McpClient, Arc<AtomicUsize>) {
    let handler = Calculator::default();
    let calls = Arc::clone(&handler.calls);
    let (client_io, server_io) = duplex(64 * 1024);

    let server = McpServer::new("calculator", "0.1.0", handler);
    tokio::spawn(async move {
        let (r, w) = split(server_io);
        server.serve(r, w).await
    });

    let (r, w) = split(client_io);
    let mut client = McpClient::connect_streams(McpServerConfig::new("calc", "in-memory"), r, w);
    client.initialize().await.unwrap();
    (client, calls)
}

#[tokio::test]
async fn test_initialize_reports_server_info() {
    let (client, _) = connected().await;
    let info = client.server_info().unwrap();
    assert_eq!(info.name, "calculator");
    assert_eq!(info.version, "0.1.0");
    assert_eq!(client.name(), "calc");
    assert_eq!(client.server_name(), "calculator");
}

#[tokio::test]
async fn test_list_and_call_tools() {
    let (client, calls) = connected().await;

    let tools = client.list_tools().await.unwrap();
    let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["add", "fail"]);

    let result = client
        .call_tool("add", Some(json!({"a": 2, "b": 3.5})))
        .await
        .unwrap();
    assert!(!result.is_error());
    assert_eq!(result.text(), "5.5");

    let result = client.call_tool("fail", None).await.unwrap();
    assert!(result.is_error());
    assert_eq!(result.text(), "always fails");

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_ping() {
    let (client, _) = connected().await;
    client.ping().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_calls_are_serialized() {
    let (client, calls) = connected().await;
    let client = Arc::new(client);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let client = Arc::clone(&client);
            tokio::spawn(async move {
                client
                    .call_tool("add", Some(json!({"a": i, "b": 1})))
                    .await
                    .map(|r| r.text())
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let text = handle.await.unwrap().unwrap();
        assert_eq!(text, format!("{}", i + 1));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 8);
}

#[tokio::test]
async fn test_server_gone_is_reported() {
    let (client_io, server_io) = duplex(1024);
    drop(server_io);

    let (r, w) = split(client_io);
    let mut client = McpClient::connect_streams(McpServerConfig::new("gone", "none"), r, w);
    let err = client.initialize().await.unwrap_err();
    assert!(matches!(err, McpError::ConnectionClosed | McpError::Io(_)));
}
