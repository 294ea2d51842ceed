//! Tool registry: builds the tool definitions advertised on `tools/list` and
//! dispatches `tools/call` requests to [`EveCore`].
//!
//! Upstream failures come back as `is_error` outputs carrying the error kind
//! and message. Only an unknown tool name or undecodable arguments are
//! reported as [`ToolError`], which the server turns into a JSON-RPC error.

use std::time::Instant;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

use eve_client::{NewNetwork, NewNode};
use eve_core::ops::{LabSpec, NodePort};
use eve_core::EveCore;
use eve_domain::config::Protocol;
use eve_domain::error::Error;
use eve_domain::tool::{ToolCall, ToolDefinition, ToolOutput};
use eve_domain::trace::TraceEvent;

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid {tool} arguments: {message}")]
    InvalidArguments { tool: String, message: String },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool definitions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn def(name: &str, description: &str, parameters: Value) -> ToolDefinition {
    ToolDefinition {
        name: name.into(),
        description: description.into(),
        parameters,
    }
}

fn no_params() -> Value {
    json!({ "type": "object", "properties": {} })
}

fn lab_only() -> Value {
    json!({
        "type": "object",
        "properties": {
            "lab_path": { "type": "string", "description": "Lab file path, e.g. /folder/lab.unl" }
        },
        "required": ["lab_path"]
    })
}

fn lab_and_node() -> Value {
    json!({
        "type": "object",
        "properties": {
            "lab_path": { "type": "string", "description": "Lab file path, e.g. /folder/lab.unl" },
            "node_id": { "type": ["string", "integer"], "description": "Node id within the lab" }
        },
        "required": ["lab_path", "node_id"]
    })
}

/// Every tool the server exposes, in the order `tools/list` reports them.
pub fn build_tool_definitions() -> Vec<ToolDefinition> {
    let mut defs = Vec::new();

    // ── Session ──────────────────────────────────────────────────────
    defs.push(def(
        "connect_eveng_server",
        "Connect to an EVE-NG server and authenticate. Replaces the configured endpoint.",
        json!({
            "type": "object",
            "properties": {
                "host": { "type": "string", "description": "Server hostname or IP" },
                "username": { "type": "string" },
                "password": { "type": "string" },
                "port": { "type": "integer", "default": 80 },
                "protocol": { "type": "string", "enum": ["http", "https"], "default": "http" }
            },
            "required": ["host", "username", "password"]
        }),
    ));
    defs.push(def(
        "disconnect_eveng_server",
        "Log out and drop the current EVE-NG session.",
        no_params(),
    ));
    defs.push(def(
        "test_connection",
        "Check that the EVE-NG server is reachable and the session is valid.",
        no_params(),
    ));
    defs.push(def(
        "get_server_info",
        "EVE-NG server status: version, QEMU version, resource usage.",
        no_params(),
    ));

    // ── Labs ─────────────────────────────────────────────────────────
    defs.push(def(
        "list_labs",
        "List labs below a folder. From the root, first-level subfolders are included.",
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "default": "/", "description": "Folder to list" }
            }
        }),
    ));
    defs.push(def(
        "create_lab",
        "Create a new lab file in a folder.",
        json!({
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "path": { "type": "string", "default": "/", "description": "Folder to create the lab in" },
                "description": { "type": "string", "default": "" },
                "author": { "type": "string", "default": "" },
                "version": { "type": "string", "default": "1" }
            },
            "required": ["name"]
        }),
    ));
    defs.push(def(
        "get_lab_details",
        "Lab metadata, nodes with resolved interfaces, networks and connections. Partial failures are listed under warnings.",
        lab_only(),
    ));
    defs.push(def("delete_lab", "Delete a lab file.", lab_only()));

    // ── Nodes ────────────────────────────────────────────────────────
    defs.push(def(
        "list_node_templates",
        "Node templates available on the server.",
        no_params(),
    ));
    defs.push(def("list_nodes", "Nodes in a lab with their status.", lab_only()));
    defs.push(def(
        "add_node",
        "Add a node to a lab from a template.",
        json!({
            "type": "object",
            "properties": {
                "lab_path": { "type": "string" },
                "template": { "type": "string", "description": "Template name, e.g. vios or linux" },
                "name": { "type": "string", "default": "" },
                "node_type": { "type": "string", "enum": ["qemu", "dynamips", "iol", "docker", "vpcs"], "default": "qemu" },
                "left": { "type": "integer", "default": 50 },
                "top": { "type": "integer", "default": 50 },
                "delay": { "type": "integer", "default": 0 },
                "console": { "type": "string", "enum": ["telnet", "vnc", "rdp"], "default": "telnet" },
                "config": { "type": "string", "default": "Unconfigured" },
                "ethernet": { "type": "integer" },
                "serial": { "type": "integer" },
                "image": { "type": "string" },
                "ram": { "type": "integer", "description": "RAM in MB" },
                "cpu": { "type": "integer" }
            },
            "required": ["lab_path", "template"]
        }),
    ));
    defs.push(def(
        "get_node_details",
        "One node with its ethernet and serial interfaces.",
        lab_and_node(),
    ));
    defs.push(def("start_node", "Start one node.", lab_and_node()));
    defs.push(def("stop_node", "Stop one node.", lab_and_node()));
    defs.push(def("start_all_nodes", "Start every node in a lab.", lab_only()));
    defs.push(def("stop_all_nodes", "Stop every node in a lab.", lab_only()));
    defs.push(def(
        "wipe_node",
        "Reset one node to its startup image. The node must be stopped.",
        lab_and_node(),
    ));
    defs.push(def("wipe_all_nodes", "Wipe every node in a lab.", lab_only()));
    defs.push(def("delete_node", "Remove a node from a lab.", lab_and_node()));

    // ── Networks ─────────────────────────────────────────────────────
    defs.push(def(
        "list_network_types",
        "Network types available on the server (bridge, pnet0..9, ...).",
        no_params(),
    ));
    defs.push(def("list_lab_networks", "Networks defined in a lab.", lab_only()));
    defs.push(def(
        "create_lab_network",
        "Add a network to a lab.",
        json!({
            "type": "object",
            "properties": {
                "lab_path": { "type": "string" },
                "network_type": { "type": "string", "description": "bridge, pnet0, ..." },
                "name": { "type": "string", "default": "" },
                "left": { "type": "integer", "default": 50 },
                "top": { "type": "integer", "default": 50 }
            },
            "required": ["lab_path", "network_type"]
        }),
    ));
    defs.push(def(
        "delete_lab_network",
        "Remove a network from a lab.",
        json!({
            "type": "object",
            "properties": {
                "lab_path": { "type": "string" },
                "network_id": { "type": ["string", "integer"] }
            },
            "required": ["lab_path", "network_id"]
        }),
    ));

    // ── Wiring ───────────────────────────────────────────────────────
    defs.push(def(
        "connect_node_to_network",
        "Attach a node interface (by name, e.g. e0) to a lab network. Use a cloud network for external access.",
        json!({
            "type": "object",
            "properties": {
                "lab_path": { "type": "string" },
                "node_id": { "type": ["string", "integer"] },
                "node_interface": { "type": "string", "description": "Interface name, e.g. e0 or Gi0/0" },
                "network_id": { "type": ["string", "integer"] }
            },
            "required": ["lab_path", "node_id", "node_interface", "network_id"]
        }),
    ));
    defs.push(def(
        "connect_node_to_node",
        "Wire two node interfaces together through a hidden point-to-point bridge.",
        json!({
            "type": "object",
            "properties": {
                "lab_path": { "type": "string" },
                "src_node_id": { "type": ["string", "integer"] },
                "src_interface": { "type": "string" },
                "dst_node_id": { "type": ["string", "integer"] },
                "dst_interface": { "type": "string" }
            },
            "required": ["lab_path", "src_node_id", "src_interface", "dst_node_id", "dst_interface"]
        }),
    ));
    defs.push(def(
        "get_lab_topology",
        "Connections between nodes and networks in a lab.",
        lab_only(),
    ));

    defs
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Arguments
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Accept ids sent either as JSON strings or numbers.
fn de_id<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Num(i64),
    }
    Ok(match Raw::deserialize(d)? {
        Raw::Str(s) => s.trim().to_owned(),
        Raw::Num(n) => n.to_string(),
    })
}

fn d_root() -> String {
    "/".into()
}
fn d_port() -> u16 {
    80
}
fn d_version() -> String {
    "1".into()
}
fn d_node_type() -> String {
    "qemu".into()
}
fn d_50() -> i64 {
    50
}
fn d_console() -> String {
    "telnet".into()
}
fn d_node_config() -> String {
    "Unconfigured".into()
}

#[derive(Debug, Deserialize)]
struct ConnectArgs {
    host: String,
    username: String,
    password: String,
    #[serde(default = "d_port")]
    port: u16,
    #[serde(default)]
    protocol: Protocol,
}

#[derive(Debug, Deserialize)]
struct PathArgs {
    #[serde(default = "d_root")]
    path: String,
}

#[derive(Debug, Deserialize)]
struct CreateLabArgs {
    name: String,
    #[serde(default = "d_root")]
    path: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    author: String,
    #[serde(default = "d_version")]
    version: String,
}

#[derive(Debug, Deserialize)]
struct LabArgs {
    lab_path: String,
}

#[derive(Debug, Deserialize)]
struct NodeArgs {
    lab_path: String,
    #[serde(deserialize_with = "de_id")]
    node_id: String,
}

#[derive(Debug, Deserialize)]
struct AddNodeArgs {
    lab_path: String,
    template: String,
    #[serde(default)]
    name: String,
    #[serde(default = "d_node_type")]
    node_type: String,
    #[serde(default = "d_50")]
    left: i64,
    #[serde(default = "d_50")]
    top: i64,
    #[serde(default)]
    delay: u32,
    #[serde(default = "d_console")]
    console: String,
    #[serde(default = "d_node_config")]
    config: String,
    #[serde(default)]
    ethernet: Option<u32>,
    #[serde(default)]
    serial: Option<u32>,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    ram: Option<u32>,
    #[serde(default)]
    cpu: Option<u32>,
}

impl AddNodeArgs {
    fn into_new_node(self) -> (String, NewNode) {
        let node = NewNode {
            template: self.template,
            node_type: self.node_type,
            name: self.name,
            left: self.left,
            top: self.top,
            delay: self.delay,
            console: self.console,
            config: self.config,
            ethernet: self.ethernet,
            serial: self.serial,
            image: self.image,
            ram: self.ram,
            cpu: self.cpu,
        };
        (self.lab_path, node)
    }
}

#[derive(Debug, Deserialize)]
struct CreateNetworkArgs {
    lab_path: String,
    network_type: String,
    #[serde(default)]
    name: String,
    #[serde(default = "d_50")]
    left: i64,
    #[serde(default = "d_50")]
    top: i64,
}

#[derive(Debug, Deserialize)]
struct NetworkArgs {
    lab_path: String,
    #[serde(deserialize_with = "de_id")]
    network_id: String,
}

#[derive(Debug, Deserialize)]
struct ConnectNetworkArgs {
    lab_path: String,
    #[serde(deserialize_with = "de_id")]
    node_id: String,
    node_interface: String,
    #[serde(deserialize_with = "de_id")]
    network_id: String,
}

#[derive(Debug, Deserialize)]
struct ConnectNodesArgs {
    lab_path: String,
    #[serde(deserialize_with = "de_id")]
    src_node_id: String,
    src_interface: String,
    #[serde(deserialize_with = "de_id")]
    dst_node_id: String,
    dst_interface: String,
}

fn parse<T: DeserializeOwned>(tool: &str, arguments: &Value) -> Result<T, ToolError> {
    // A missing arguments object is the same as an empty one.
    let value = if arguments.is_null() { json!({}) } else { arguments.clone() };
    serde_json::from_value(value).map_err(|e| ToolError::InvalidArguments {
        tool: tool.to_owned(),
        message: e.to_string(),
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Rendering
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Pretty JSON of a successful result.
fn render<T: Serialize>(result: eve_domain::Result<T>) -> ToolOutput {
    match result {
        Ok(val) => match serde_json::to_string_pretty(&val) {
            Ok(text) => ToolOutput::ok(text),
            Err(e) => ToolOutput::error(json!({ "error": "serialization", "message": e.to_string() }).to_string()),
        },
        Err(e) => render_error(&e),
    }
}

/// `{"error": kind, "message": ..., "status"?, "payload"?}`.
pub fn render_error(err: &Error) -> ToolOutput {
    let mut body = json!({
        "error": err.kind(),
        "message": err.to_string(),
    });
    if let Error::Api { status, payload, .. } = err {
        if let Some(status) = status {
            body["status"] = json!(status);
        }
        if let Some(payload) = payload {
            body["payload"] = payload.clone();
        }
    }
    ToolOutput::error(serde_json::to_string_pretty(&body).unwrap_or_else(|_| body.to_string()))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Dispatch
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Run one tool call against `core`.
pub async fn dispatch_tool(core: &EveCore, call: &ToolCall) -> Result<ToolOutput, ToolError> {
    let start = Instant::now();
    let output = run(core, &call.tool_name, &call.arguments).await;

    if let Ok(out) = &output {
        TraceEvent::ToolInvoked {
            tool: call.tool_name.clone(),
            is_error: out.is_error,
            duration_ms: start.elapsed().as_millis() as u64,
        }
        .emit();
    }
    output
}

async fn run(core: &EveCore, tool: &str, args: &Value) -> Result<ToolOutput, ToolError> {
    let out = match tool {
        "connect_eveng_server" => {
            let a: ConnectArgs = parse(tool, args)?;
            connect(core, a).await
        }
        "disconnect_eveng_server" => render(
            core.disconnect()
                .await
                .map(|()| json!({ "message": "disconnected", "session": core.snapshot().to_json() })),
        ),
        "test_connection" => render(core.server_status().await.map(|info| {
            json!({
                "connected": true,
                "endpoint": info.endpoint,
                "version": info.version,
            })
        })),
        "get_server_info" => render(core.server_status().await),

        "list_labs" => {
            let a: PathArgs = parse(tool, args)?;
            render(core.list_labs(&a.path).await)
        }
        "create_lab" => {
            let a: CreateLabArgs = parse(tool, args)?;
            render(
                core.create_lab(LabSpec {
                    name: a.name,
                    folder: a.path,
                    description: a.description,
                    author: a.author,
                    version: a.version,
                })
                .await,
            )
        }
        "get_lab_details" => {
            let a: LabArgs = parse(tool, args)?;
            render(core.get_lab_details(&a.lab_path).await)
        }
        "delete_lab" => {
            let a: LabArgs = parse(tool, args)?;
            render(core.delete_lab(&a.lab_path).await)
        }

        "list_node_templates" => render(core.list_node_templates().await),
        "list_nodes" => {
            let a: LabArgs = parse(tool, args)?;
            render(core.list_nodes(&a.lab_path).await)
        }
        "add_node" => {
            let (lab, node) = parse::<AddNodeArgs>(tool, args)?.into_new_node();
            render(core.add_node(&lab, node).await)
        }
        "get_node_details" => {
            let a: NodeArgs = parse(tool, args)?;
            render(core.get_node(&a.lab_path, &a.node_id).await)
        }
        "start_node" => {
            let a: NodeArgs = parse(tool, args)?;
            render(core.start_node(&a.lab_path, &a.node_id).await)
        }
        "stop_node" => {
            let a: NodeArgs = parse(tool, args)?;
            render(core.stop_node(&a.lab_path, &a.node_id).await)
        }
        "wipe_node" => {
            let a: NodeArgs = parse(tool, args)?;
            render(core.wipe_node(&a.lab_path, &a.node_id).await)
        }
        "delete_node" => {
            let a: NodeArgs = parse(tool, args)?;
            render(core.delete_node(&a.lab_path, &a.node_id).await)
        }
        "start_all_nodes" => {
            let a: LabArgs = parse(tool, args)?;
            render(core.start_all_nodes(&a.lab_path).await)
        }
        "stop_all_nodes" => {
            let a: LabArgs = parse(tool, args)?;
            render(core.stop_all_nodes(&a.lab_path).await)
        }
        "wipe_all_nodes" => {
            let a: LabArgs = parse(tool, args)?;
            render(core.wipe_all_nodes(&a.lab_path).await)
        }

        "list_network_types" => render(core.list_network_types().await),
        "list_lab_networks" => {
            let a: LabArgs = parse(tool, args)?;
            render(core.list_lab_networks(&a.lab_path).await)
        }
        "create_lab_network" => {
            let a: CreateNetworkArgs = parse(tool, args)?;
            let network = NewNetwork {
                network_type: a.network_type,
                name: a.name,
                left: a.left,
                top: a.top,
                visibility: 1,
            };
            render(core.create_network(&a.lab_path, network).await)
        }
        "delete_lab_network" => {
            let a: NetworkArgs = parse(tool, args)?;
            render(core.delete_network(&a.lab_path, &a.network_id).await)
        }

        "connect_node_to_network" => {
            let a: ConnectNetworkArgs = parse(tool, args)?;
            let network_id = a.network_id.parse::<u32>().map_err(|_| ToolError::InvalidArguments {
                tool: tool.to_owned(),
                message: format!("network_id must be a positive integer, got '{}'", a.network_id),
            })?;
            render(
                core.connect_node_to_network(&a.lab_path, &a.node_id, &a.node_interface, network_id)
                    .await,
            )
        }
        "connect_node_to_node" => {
            let a: ConnectNodesArgs = parse(tool, args)?;
            let src = NodePort { node_id: a.src_node_id, interface: a.src_interface };
            let dst = NodePort { node_id: a.dst_node_id, interface: a.dst_interface };
            render(core.connect_node_to_node(&a.lab_path, src, dst).await)
        }
        "get_lab_topology" => {
            let a: LabArgs = parse(tool, args)?;
            render(core.get_lab_topology(&a.lab_path).await)
        }

        other => return Err(ToolError::UnknownTool(other.to_owned())),
    };
    Ok(out)
}

async fn connect(core: &EveCore, a: ConnectArgs) -> ToolOutput {
    let mut config = core.session().config();
    config.host = a.host;
    config.port = a.port;
    config.protocol = a.protocol;
    config.username = a.username;
    config.password = a.password;
    config.password_env = None;

    tracing::info!(endpoint = %config.base_url(), user = %config.username, "connect requested");
    render(core.connect_to(config).await.map(|()| {
        json!({
            "message": "connected",
            "session": core.snapshot().to_json(),
        })
    }))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
