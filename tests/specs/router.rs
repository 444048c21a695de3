//! MCP router behavior over an in-memory transport.

use cm_mcp::{
    wire, AgentCoordinationBackend, AgentSpawner, JsonRpcRequest, JsonRpcResponse, McpRouter,
    ToolBackend, WorkflowSignalsBackend,
};
use cm_storage::{ActiveServer, ActiveServersStore, StateLayout};
use serde_json::json;
use std::sync::Arc;

struct NoopSpawner;

#[async_trait::async_trait]
impl AgentSpawner for NoopSpawner {
    async fn run_agent(
        &self,
        _name: &str,
        _prompt: &str,
        _working_dir: Option<std::path::PathBuf>,
        _input: Option<cm_mcp::InputQualifier>,
        _timeout_ms: Option<u64>,
    ) -> Result<String, String> {
        Ok("done".to_string())
    }

    fn available_agents(&self) -> Vec<String> {
        vec!["tester".to_string()]
    }
}

fn router_with_builtins(dir: &std::path::Path) -> (McpRouter, ActiveServersStore) {
    let layout = StateLayout::new(dir);
    layout.ensure().unwrap();
    let store = ActiveServersStore::new(layout);

    let (signals, _handle) = WorkflowSignalsBackend::new();
    let coordination = AgentCoordinationBackend::new(Arc::new(NoopSpawner));

    let mut router = McpRouter::new(store.clone());
    router.add_backend(Arc::new(signals) as Arc<dyn ToolBackend>);
    router.add_backend(Arc::new(coordination) as Arc<dyn ToolBackend>);
    (router, store)
}

#[tokio::test]
async fn builtin_backends_aggregate_into_one_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let (router, store) = router_with_builtins(dir.path());
    store
        .write(&[
            ActiveServer::all("workflow-signals"),
            ActiveServer::all("agent-coordination"),
        ])
        .unwrap();

    let names: Vec<String> = router
        .list_tools()
        .await
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(
        names,
        vec![
            "propose_step_completion",
            "approve_step_transition",
            "get_pending_proposal",
            "set_step_directive",
            "run_agents",
            "get_agent_status",
            "list_active_agents",
            "list_available_agents",
        ]
    );
}

#[tokio::test]
async fn target_restriction_flows_through_run_agents() {
    let dir = tempfile::tempdir().unwrap();
    let (router, store) = router_with_builtins(dir.path());
    store
        .write(&[ActiveServer {
            server: "agent-coordination".into(),
            tools: None,
            targets: Some(vec!["tester".into()]),
        }])
        .unwrap();

    // Allowed target runs.
    let result = router
        .call_tool("run_agents", json!({"script": "tester 'go'"}))
        .await;
    assert!(!result.is_error);

    // Unlisted target is rejected before any spawn.
    let result = router
        .call_tool("run_agents", json!({"script": "deployer 'ship'"}))
        .await;
    assert!(result.is_error);
}

#[tokio::test]
async fn serve_speaks_jsonrpc_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let (router, store) = router_with_builtins(dir.path());
    store
        .write(&[ActiveServer::all("workflow-signals")])
        .unwrap();

    let (client, server) = tokio::io::duplex(64 * 1024);
    let (server_read, server_write) = tokio::io::split(server);
    let (client_read, mut client_write) = tokio::io::split(client);
    let serve = tokio::spawn(async move { router.serve(server_read, server_write).await });
    let mut client_reader = tokio::io::BufReader::new(client_read);

    wire::write_message(
        &mut client_write,
        &JsonRpcRequest::new(1, "initialize", json!({"protocolVersion": "2024-11-05"})),
    )
    .await
    .unwrap();
    let response: JsonRpcResponse = wire::read_message(&mut client_reader)
        .await
        .unwrap()
        .unwrap();
    assert!(response.error.is_none());

    wire::write_message(
        &mut client_write,
        &JsonRpcRequest::new(
            2,
            "tools/call",
            json!({
                "name": "propose_step_completion",
                "arguments": {
                    "step_id": "s1",
                    "artifact_path": "out.md",
                    "checklist": ["did the thing"],
                    "confidence": 0.9
                }
            }),
        ),
    )
    .await
    .unwrap();
    let response: JsonRpcResponse = wire::read_message(&mut client_reader)
        .await
        .unwrap()
        .unwrap();
    let result = response.result.unwrap();
    assert_eq!(result.get("isError"), None);

    drop(client_write);
    drop(client_reader);
    serve.await.unwrap().unwrap();
}
