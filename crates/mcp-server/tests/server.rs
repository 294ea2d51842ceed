use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use eve_client::wire::{
    FolderListing, InterfacesRecord, LabEntry, LabRecord, LinkRecord, NetworkRecord, NodeRecord,
};
use eve_client::{
    CapResult, CapabilityError, EvengApi, EvengConnector, NewLab, NewNetwork, NewNode, NodeAction,
};
use eve_core::{CallAdapter, EveCore, SessionManager};
use eve_domain::config::EvengConfig;
use eve_mcp::McpServer;

// ── fakes ────────────────────────────────────────────────────────────

fn missing<T>() -> CapResult<T> {
    Err(CapabilityError::Rejected {
        status: 404,
        message: "does not exist".into(),
        payload: None,
    })
}

const DEMO: &str = "/demo.unl";

fn demo_node() -> NodeRecord {
    NodeRecord {
        id: "1".into(),
        name: "R1".into(),
        node_type: "qemu".into(),
        template: "linux".into(),
        status: Some(2),
        console: "telnet".into(),
        ..NodeRecord::default()
    }
}

/// One folder holding `/demo.unl` (node R1 wired to network mgmt);
/// everything else is absent.
struct OneLab;

impl EvengApi for OneLab {
    fn endpoint(&self) -> String {
        "http://eve.local:80".into()
    }
    fn login(&self) -> CapResult<()> {
        Ok(())
    }
    fn logout(&self) -> CapResult<()> {
        Ok(())
    }
    fn status(&self) -> CapResult<Value> {
        Ok(json!({ "version": "5.0.1-19", "qemu_version": "2.4.0" }))
    }
    fn list_folder(&self, _path: &str) -> CapResult<FolderListing> {
        Ok(FolderListing {
            folders: vec![],
            labs: vec![LabEntry {
                file: "demo.unl".into(),
                path: "/demo.unl".into(),
                mtime: "2024-01-01 10:00:00".into(),
                umtime: Some(1_704_103_200),
            }],
        })
    }
    fn get_lab(&self, lab_path: &str) -> CapResult<LabRecord> {
        if lab_path != DEMO {
            return missing();
        }
        Ok(LabRecord {
            name: "demo".into(),
            filename: "demo.unl".into(),
            author: "ops".into(),
            ..LabRecord::default()
        })
    }
    fn create_lab(&self, _lab: &NewLab) -> CapResult<Value> {
        missing()
    }
    fn delete_lab(&self, _lab_path: &str) -> CapResult<Value> {
        missing()
    }
    fn list_nodes(&self, lab_path: &str) -> CapResult<BTreeMap<String, NodeRecord>> {
        if lab_path != DEMO {
            return Ok(BTreeMap::new());
        }
        Ok(BTreeMap::from([("1".to_owned(), demo_node())]))
    }
    fn get_node(&self, lab_path: &str, node_id: &str) -> CapResult<NodeRecord> {
        if lab_path == DEMO && node_id == "1" {
            Ok(demo_node())
        } else {
            missing()
        }
    }
    fn add_node(&self, _lab_path: &str, _node: &NewNode) -> CapResult<Value> {
        missing()
    }
    fn delete_node(&self, _lab_path: &str, _node_id: &str) -> CapResult<Value> {
        missing()
    }
    fn node_action(&self, _lab_path: &str, _node_id: &str, _action: NodeAction) -> CapResult<Value> {
        missing()
    }
    fn all_nodes_action(&self, _lab_path: &str, _action: NodeAction) -> CapResult<Value> {
        missing()
    }
    fn get_node_interfaces(&self, lab_path: &str, node_id: &str) -> CapResult<InterfacesRecord> {
        if lab_path != DEMO || node_id != "1" {
            return missing();
        }
        serde_json::from_value(json!({ "ethernet": [{ "name": "e0", "network_id": 1 }] }))
            .map_err(|e| CapabilityError::Decode(e.to_string()))
    }
    fn set_node_interfaces(
        &self,
        _lab_path: &str,
        _node_id: &str,
        _mapping: &BTreeMap<String, u32>,
    ) -> CapResult<Value> {
        missing()
    }
    fn list_networks(&self, lab_path: &str) -> CapResult<BTreeMap<String, NetworkRecord>> {
        if lab_path != DEMO {
            return Ok(BTreeMap::new());
        }
        let mgmt = NetworkRecord {
            id: "1".into(),
            name: "mgmt".into(),
            network_type: "pnet0".into(),
            visibility: Some(true),
            ..NetworkRecord::default()
        };
        Ok(BTreeMap::from([("1".to_owned(), mgmt)]))
    }
    fn add_network(&self, _lab_path: &str, _network: &NewNetwork) -> CapResult<Value> {
        missing()
    }
    fn delete_network(&self, _lab_path: &str, _network_id: &str) -> CapResult<Value> {
        missing()
    }
    fn list_links(&self, lab_path: &str) -> CapResult<Vec<LinkRecord>> {
        if lab_path != DEMO {
            return Ok(vec![]);
        }
        Ok(vec![LinkRecord {
            medium: "ethernet".into(),
            source: "node1".into(),
            source_type: Some("node".into()),
            source_label: Some("e0".into()),
            destination: "network1".into(),
            destination_type: Some("network".into()),
            network_id: Some(1),
            ..LinkRecord::default()
        }])
    }
    fn list_node_templates(&self) -> CapResult<Value> {
        Ok(json!({ "linux": "Linux" }))
    }
    fn get_node_template(&self, template: &str) -> CapResult<Value> {
        match template {
            "linux" => Ok(json!({ "type": "qemu", "ethernet": 1, "listimages": ["linux-alpine"] })),
            _ => missing(),
        }
    }
    fn list_network_types(&self) -> CapResult<Value> {
        Ok(json!({ "bridge": "bridge" }))
    }
}

struct Connector {
    reachable: bool,
    connects: AtomicUsize,
}

impl EvengConnector for Connector {
    fn connect(&self, _config: &EvengConfig) -> CapResult<Arc<dyn EvengApi>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.reachable {
            Ok(Arc::new(OneLab))
        } else {
            Err(CapabilityError::Transport("connection refused".into()))
        }
    }
}

fn server(reachable: bool) -> (McpServer, Arc<Connector>) {
    let connector = Arc::new(Connector { reachable, connects: AtomicUsize::new(0) });
    let adapter = Arc::new(CallAdapter::new(4, Duration::from_secs(5)));
    let session = Arc::new(SessionManager::new(EvengConfig::default(), connector.clone(), adapter));
    let core = Arc::new(EveCore::with_session(session, 1));
    (McpServer::new(core), connector)
}

async fn rpc(server: &McpServer, msg: Value) -> Value {
    let line = server.handle_line(&msg.to_string()).await.expect("response");
    serde_json::from_str(&line).unwrap()
}

async fn call(server: &McpServer, name: &str, arguments: Value) -> Value {
    rpc(
        server,
        json!({
            "jsonrpc": "2.0",
            "id": 7,
            "method": "tools/call",
            "params": { "name": name, "arguments": arguments },
        }),
    )
    .await
}

fn tool_text(resp: &Value) -> Value {
    let text = resp["result"]["content"][0]["text"].as_str().unwrap();
    serde_json::from_str(text).unwrap()
}

// ── protocol ─────────────────────────────────────────────────────────

#[tokio::test]
async fn initialize_reports_protocol_version() {
    let (srv, _) = server(true);
    let resp = rpc(&srv, json!({ "jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {} })).await;
    assert_eq!(resp["id"], 1);
    assert_eq!(resp["result"]["protocolVersion"], "2024-11-05");
    assert!(resp["result"]["capabilities"]["tools"].is_object());
    assert!(resp["result"]["capabilities"]["resources"].is_object());
}

#[tokio::test]
async fn notifications_get_no_response() {
    let (srv, _) = server(true);
    let out = srv
        .handle_line(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
        .await;
    assert!(out.is_none());
    assert!(srv.handle_line("   ").await.is_none());
}

#[tokio::test]
async fn tools_list_advertises_every_tool() {
    let (srv, _) = server(true);
    let resp = rpc(&srv, json!({ "jsonrpc": "2.0", "id": "a", "method": "tools/list" })).await;
    let tools = resp["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 26);
    assert!(tools.iter().all(|t| t["inputSchema"]["type"] == "object"));
    assert!(tools.iter().any(|t| t["name"] == "get_lab_details"));
}

#[tokio::test]
async fn unknown_method_is_method_not_found() {
    let (srv, _) = server(true);
    let resp = rpc(&srv, json!({ "jsonrpc": "2.0", "id": 2, "method": "prompts/list" })).await;
    assert_eq!(resp["error"]["code"], -32601);
}

#[tokio::test]
async fn garbage_is_parse_error() {
    let (srv, _) = server(true);
    let line = srv.handle_line("{not json").await.unwrap();
    let resp: Value = serde_json::from_str(&line).unwrap();
    assert_eq!(resp["error"]["code"], -32700);
    assert_eq!(resp["id"], Value::Null);
}

#[tokio::test]
async fn unknown_tool_and_bad_arguments_are_invalid_params() {
    let (srv, connector) = server(true);
    let resp = call(&srv, "reboot_universe", json!({})).await;
    assert_eq!(resp["error"]["code"], -32602);

    let resp = call(&srv, "list_nodes", json!({})).await;
    assert_eq!(resp["error"]["code"], -32602);
    assert_eq!(connector.connects.load(Ordering::SeqCst), 0);
}

// ── tools ────────────────────────────────────────────────────────────

#[tokio::test]
async fn upstream_failure_is_tool_error_not_rpc_error() {
    let (srv, _) = server(false);
    let resp = call(&srv, "list_labs", json!({ "path": "/" })).await;
    assert!(resp.get("error").is_none());
    assert_eq!(resp["result"]["isError"], true);
    assert_eq!(tool_text(&resp)["error"], "connection_failure");
}

#[tokio::test]
async fn list_labs_connects_lazily() {
    let (srv, connector) = server(true);
    let resp = call(&srv, "list_labs", json!({})).await;
    assert_eq!(resp["result"]["isError"], false);
    let inv = tool_text(&resp);
    assert_eq!(inv["labs"].as_array().unwrap().len(), 1);
    assert_eq!(inv["labs"][0]["name"], "demo");
    assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn get_lab_details_propagates_missing_lab() {
    let (srv, _) = server(true);
    let resp = call(&srv, "get_lab_details", json!({ "lab_path": "/gone.unl" })).await;
    assert_eq!(resp["result"]["isError"], true);
    assert_eq!(tool_text(&resp)["error"], "not_found");
}

#[tokio::test]
async fn connect_tool_replaces_endpoint() {
    let (srv, connector) = server(true);
    let resp = call(
        &srv,
        "connect_eveng_server",
        json!({ "host": "10.0.0.5", "username": "ops", "password": "pw", "port": 8080 }),
    )
    .await;
    assert_eq!(resp["result"]["isError"], false);
    let body = tool_text(&resp);
    assert_eq!(body["session"]["endpoint"], "http://10.0.0.5:8080");
    assert_eq!(body["session"]["connected"], true);
    assert_eq!(connector.connects.load(Ordering::SeqCst), 1);

    let resp = call(&srv, "disconnect_eveng_server", json!({})).await;
    assert_eq!(tool_text(&resp)["session"]["connected"], false);
}

#[tokio::test]
async fn server_info_reports_version() {
    let (srv, _) = server(true);
    let resp = call(&srv, "get_server_info", Value::Null).await;
    let info = tool_text(&resp);
    assert_eq!(info["version"], "5.0.1-19");
    assert_eq!(info["endpoint"], "http://eve.local:80");
}

// ── resources ────────────────────────────────────────────────────────

async fn read(server: &McpServer, uri: &str) -> Value {
    rpc(
        server,
        json!({
            "jsonrpc": "2.0",
            "id": 9,
            "method": "resources/read",
            "params": { "uri": uri },
        }),
    )
    .await
}

fn resource_body(resp: &Value) -> Value {
    assert_eq!(resp["result"]["contents"][0]["mimeType"], "application/json");
    let text = resp["result"]["contents"][0]["text"].as_str().unwrap();
    serde_json::from_str(text).unwrap()
}

#[tokio::test]
async fn resources_and_templates_are_listed() {
    let (srv, connector) = server(true);
    let resp = rpc(&srv, json!({ "jsonrpc": "2.0", "id": 1, "method": "resources/list" })).await;
    let resources = resp["result"]["resources"].as_array().unwrap();
    assert_eq!(resources.len(), 1);
    assert_eq!(resources[0]["uri"], "eveng://server/status");

    let resp = rpc(
        &srv,
        json!({ "jsonrpc": "2.0", "id": 2, "method": "resources/templates/list" }),
    )
    .await;
    let templates: Vec<&str> = resp["result"]["resourceTemplates"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["uriTemplate"].as_str().unwrap())
        .collect();
    assert!(templates.contains(&"eveng://labs/{lab_name}/topology"));
    assert!(templates.contains(&"eveng://nodes/{lab_name}/{node_name}/config"));
    assert_eq!(templates.len(), 6);
    assert_eq!(connector.connects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn server_status_resource_reports_session() {
    let (srv, _) = server(true);
    let body = resource_body(&read(&srv, "eveng://server/status").await);
    assert_eq!(body["server"]["version"], "5.0.1-19");
    assert_eq!(body["session"]["connected"], true);
}

#[tokio::test]
async fn lab_resource_counts_nodes_and_networks() {
    let (srv, _) = server(true);
    let body = resource_body(&read(&srv, "eveng://labs/demo").await);
    assert_eq!(body["name"], "demo");
    assert_eq!(body["path"], "/demo.unl");
    assert_eq!(body["node_count"], 1);
    assert_eq!(body["network_count"], 1);
    assert_eq!(body["status"], "active");
    assert!(body["warnings"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn lab_sub_resources_read_the_same_lab() {
    let (srv, _) = server(true);

    let topo = resource_body(&read(&srv, "eveng://labs/demo.unl/topology").await);
    assert_eq!(topo["connection_count"], 1);

    let nodes = resource_body(&read(&srv, "eveng://labs/demo/nodes").await);
    assert_eq!(nodes["node_count"], 1);
    assert_eq!(nodes["running_count"], 1);
    assert_eq!(nodes["stopped_count"], 0);
    assert_eq!(nodes["nodes"][0]["name"], "R1");

    let nets = resource_body(&read(&srv, "eveng://labs/demo/networks").await);
    assert_eq!(nets["network_count"], 1);
    assert_eq!(nets["networks"][0]["name"], "mgmt");
}

#[tokio::test]
async fn template_resource_passes_detail_through() {
    let (srv, _) = server(true);
    let body = resource_body(&read(&srv, "eveng://templates/linux").await);
    assert_eq!(body["name"], "linux");
    assert_eq!(body["detail"]["listimages"][0], "linux-alpine");

    let missing = resource_body(&read(&srv, "eveng://templates/nxos9k").await);
    assert_eq!(missing["error"], "not_found");
}

#[tokio::test]
async fn node_config_resource_finds_node_by_name() {
    let (srv, _) = server(true);
    let body = resource_body(&read(&srv, "eveng://nodes/demo/R1/config").await);
    assert_eq!(body["node_id"], "1");
    assert_eq!(body["running"], true);
    assert_eq!(body["node"]["template"], "linux");
    assert_eq!(body["node"]["interfaces"]["value"]["ethernet"][0]["name"], "e0");

    let body = resource_body(&read(&srv, "eveng://nodes/demo/R9/config").await);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn unknown_resource_uri_is_rpc_error() {
    let (srv, connector) = server(true);
    let resp = read(&srv, "eveng://labs/demo/links").await;
    assert_eq!(resp["error"]["code"], -32002);
    assert_eq!(resp["error"]["data"]["uri"], "eveng://labs/demo/links");

    let resp = rpc(&srv, json!({ "jsonrpc": "2.0", "id": 4, "method": "resources/read" })).await;
    assert_eq!(resp["error"]["code"], -32602);
    assert_eq!(connector.connects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unreachable_server_is_reported_in_resource_body() {
    let (srv, _) = server(false);
    let resp = read(&srv, "eveng://labs/demo").await;
    assert!(resp.get("error").is_none());
    assert_eq!(resource_body(&resp)["error"], "connection_failure");
}

// ── HTTP ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn http_health_reports_session() {
    let (srv, _) = server(true);
    let app = eve_mcp::http::router(srv, 8);
    let resp = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), 1 << 20).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["session"]["state"], "disconnected");
}

#[tokio::test]
async fn http_notification_is_accepted() {
    let (srv, _) = server(true);
    let app = eve_mcp::http::router(srv, 8);
    let resp = app
        .oneshot(
            Request::post("/mcp")
                .body(Body::from(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
}

#[tokio::test]
async fn http_ping_round_trips() {
    let (srv, _) = server(true);
    let app = eve_mcp::http::router(srv, 8);
    let resp = app
        .oneshot(
            Request::post("/mcp")
                .body(Body::from(r#"{"jsonrpc":"2.0","id":3,"method":"ping"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), 1 << 20).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["id"], 3);
    assert_eq!(body["result"], json!({}));
}
