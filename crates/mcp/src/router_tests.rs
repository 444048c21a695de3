// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::backend::ToolBackend;
use async_trait::async_trait;
use parking_lot::Mutex;
use cm_storage::StateLayout;

/// In-process backend with fixed tools; records calls.
struct StubBackend {
    id: String,
    tools: Vec<Tool>,
    calls: Mutex<Vec<(String, Value)>>,
    broken: bool,
}

impl StubBackend {
    fn new(id: &str, tool_names: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            tools: tool_names
                .iter()
                .map(|n| Tool::new(*n, format!("{n} tool"), json!({"type": "object"})))
                .collect(),
            calls: Mutex::new(Vec::new()),
            broken: false,
        }
    }

    fn broken(id: &str) -> Self {
        Self {
            id: id.to_string(),
            tools: Vec::new(),
            calls: Mutex::new(Vec::new()),
            broken: true,
        }
    }
}

#[async_trait]
impl ToolBackend for StubBackend {
    fn id(&self) -> &str {
        &self.id
    }

    async fn tools(&self) -> Result<Vec<Tool>, McpError> {
        if self.broken {
            return Err(McpError::BackendUnavailable(self.id.clone()));
        }
        Ok(self.tools.clone())
    }

    async fn call(&self, tool: &str, args: Value) -> Result<CallToolResult, McpError> {
        if self.broken {
            return Err(McpError::BackendUnavailable(self.id.clone()));
        }
        self.calls.lock().push((tool.to_string(), args));
        Ok(CallToolResult::text(format!("{}:{tool} ok", self.id)))
    }
}

struct Fixture {
    _dir: tempfile::TempDir,
    router: McpRouter,
    store: ActiveServersStore,
    alpha: Arc<StubBackend>,
    beta: Arc<StubBackend>,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let layout = StateLayout::new(dir.path());
    layout.ensure().unwrap();
    let store = ActiveServersStore::new(layout);

    let alpha = Arc::new(StubBackend::new("alpha", &["search", "shared"]));
    let beta = Arc::new(StubBackend::new("beta", &["lookup", "shared"]));

    let mut router = McpRouter::new(store.clone());
    router.add_backend(Arc::clone(&alpha) as Arc<dyn ToolBackend>);
    router.add_backend(Arc::clone(&beta) as Arc<dyn ToolBackend>);

    Fixture {
        _dir: dir,
        router,
        store,
        alpha,
        beta,
    }
}

#[tokio::test]
async fn tools_list_follows_active_record() {
    let f = fixture();

    // Nothing active: no tools.
    assert!(f.router.list_tools().await.is_empty());

    f.store.write(&[ActiveServer::all("alpha")]).unwrap();
    let names: Vec<String> = f
        .router
        .list_tools()
        .await
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(names, vec!["search", "shared"]);
}

#[tokio::test]
async fn collision_renames_later_server() {
    let f = fixture();
    f.store
        .write(&[ActiveServer::all("alpha"), ActiveServer::all("beta")])
        .unwrap();

    let names: Vec<String> = f
        .router
        .list_tools()
        .await
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(names, vec!["search", "shared", "lookup", "beta:shared"]);
}

#[tokio::test]
async fn tool_filter_restricts_advertisement() {
    let f = fixture();
    f.store
        .write(&[ActiveServer {
            server: "alpha".into(),
            tools: Some(vec!["search".into()]),
            targets: None,
        }])
        .unwrap();

    let names: Vec<String> = f
        .router
        .list_tools()
        .await
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(names, vec!["search"]);
}

#[tokio::test]
async fn call_on_inactive_server_is_denied_without_backend_request() {
    let f = fixture();
    f.store.write(&[ActiveServer::all("alpha")]).unwrap();

    let result = f.router.call_tool("lookup", json!({})).await;
    assert!(result.is_error);
    assert!(f.beta.calls.lock().is_empty());
}

#[tokio::test]
async fn call_on_filtered_tool_is_denied() {
    let f = fixture();
    f.store
        .write(&[ActiveServer {
            server: "alpha".into(),
            tools: Some(vec!["search".into()]),
            targets: None,
        }])
        .unwrap();

    let result = f.router.call_tool("shared", json!({})).await;
    assert!(result.is_error);
    assert!(f.alpha.calls.lock().is_empty());
}

#[tokio::test]
async fn call_injects_allowed_targets() {
    let f = fixture();
    f.store
        .write(&[ActiveServer {
            server: "alpha".into(),
            tools: None,
            targets: Some(vec!["tester".into()]),
        }])
        .unwrap();

    let result = f.router.call_tool("search", json!({"q": "x"})).await;
    assert!(!result.is_error);

    let calls = f.alpha.calls.lock().clone();
    assert_eq!(calls.len(), 1);
    let (tool, args) = &calls[0];
    assert_eq!(tool, "search");
    assert_eq!(args["q"], "x");
    assert_eq!(args[ALLOWED_TARGETS_ARG], json!(["tester"]));
}

#[tokio::test]
async fn no_targets_injects_null() {
    let f = fixture();
    f.store.write(&[ActiveServer::all("alpha")]).unwrap();

    f.router.call_tool("search", json!({})).await;
    let calls = f.alpha.calls.lock().clone();
    assert_eq!(calls[0].1[ALLOWED_TARGETS_ARG], Value::Null);
}

#[tokio::test]
async fn renamed_tool_resolves_to_owning_backend() {
    let f = fixture();
    f.store
        .write(&[ActiveServer::all("alpha"), ActiveServer::all("beta")])
        .unwrap();

    let result = f.router.call_tool("beta:shared", json!({})).await;
    assert!(!result.is_error);
    let calls = f.beta.calls.lock().clone();
    // The backend sees its original tool name.
    assert_eq!(calls[0].0, "shared");
}

#[tokio::test]
async fn failed_backend_disappears_from_aggregate() {
    let dir = tempfile::tempdir().unwrap();
    let layout = StateLayout::new(dir.path());
    layout.ensure().unwrap();
    let store = ActiveServersStore::new(layout);
    store
        .write(&[ActiveServer::all("dead"), ActiveServer::all("alive")])
        .unwrap();

    let mut router = McpRouter::new(store);
    router.add_backend(Arc::new(StubBackend::broken("dead")) as Arc<dyn ToolBackend>);
    router.add_backend(Arc::new(StubBackend::new("alive", &["work"])) as Arc<dyn ToolBackend>);

    let names: Vec<String> = router.list_tools().await.into_iter().map(|t| t.name).collect();
    assert_eq!(names, vec!["work"]);

    let result = router.call_tool("anything-from-dead", json!({})).await;
    assert!(result.is_error);
}

#[tokio::test]
async fn serve_handles_initialize_list_and_call() {
    let f = fixture();
    f.store.write(&[ActiveServer::all("alpha")]).unwrap();

    let (client, server) = tokio::io::duplex(64 * 1024);
    let (server_read, server_write) = tokio::io::split(server);
    let (client_read, mut client_write) = tokio::io::split(client);

    let router = f.router;
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
    assert_eq!(
        response.result.unwrap()["serverInfo"]["name"],
        "codemachine-router"
    );

    wire::write_message(&mut client_write, &JsonRpcRequest::new(2, "tools/list", json!({})))
        .await
        .unwrap();
    let response: JsonRpcResponse = wire::read_message(&mut client_reader)
        .await
        .unwrap()
        .unwrap();
    let tools = response.result.unwrap()["tools"].as_array().unwrap().len();
    assert_eq!(tools, 2);

    wire::write_message(
        &mut client_write,
        &JsonRpcRequest::new(3, "tools/call", json!({"name": "search", "arguments": {}})),
    )
    .await
    .unwrap();
    let response: JsonRpcResponse = wire::read_message(&mut client_reader)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        response.result.unwrap()["content"][0]["text"],
        "alpha:search ok"
    );

    // Unknown method
    wire::write_message(&mut client_write, &JsonRpcRequest::new(4, "resources/list", json!({})))
        .await
        .unwrap();
    let response: JsonRpcResponse = wire::read_message(&mut client_reader)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(response.error.unwrap().code, -32601);

    drop(client_write);
    drop(client_reader);
    serve.await.unwrap().unwrap();
}
