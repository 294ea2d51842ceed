//! Request-scoped views over labs, nodes, networks and their connections.
//!
//! Everything here is a plain value owned by the caller that asked for it.
//! Aggregated views carry an explicit per-category outcome ([`Fetched`]) and
//! a warning list, so "empty because there were none" and "empty because the
//! fetch failed" stay distinguishable.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;
use crate::status::NodeStatus;

/// File suffix of lab definitions on the platform.
pub const LAB_FILE_SUFFIX: &str = ".unl";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Partial results
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Outcome of one category within an aggregated result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Fetched<T> {
    Complete(T),
    Failed { kind: String, error: String },
}

impl<T> Fetched<T> {
    pub fn failed(err: &Error) -> Self {
        Fetched::Failed {
            kind: err.kind().to_owned(),
            error: err.to_string(),
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Fetched::Complete(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Fetched::Complete(v) => Some(v),
            Fetched::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Fetched::Complete(_) => None,
            Fetched::Failed { error, .. } => Some(error),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Fetched<U> {
        match self {
            Fetched::Complete(v) => Fetched::Complete(f(v)),
            Fetched::Failed { kind, error } => Fetched::Failed { kind, error },
        }
    }
}

/// Which part of an aggregate a warning applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Subfolder,
    Nodes,
    Networks,
    Links,
    Interfaces,
}

/// A sub-operation failure that shrank an aggregate without aborting it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    pub category: Category,
    /// Folder path, node id, or lab path the failure belongs to.
    pub subject: String,
    pub kind: String,
    pub error: String,
}

impl Warning {
    pub fn new(category: Category, subject: impl Into<String>, err: &Error) -> Self {
        Self {
            category,
            subject: subject.into(),
            kind: err.kind().to_owned(),
            error: err.to_string(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Inventory
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabSummary {
    /// Lab file name without the `.unl` suffix.
    pub name: String,
    /// Folder the lab was found in.
    pub folder: String,
    /// Absolute path of the lab file.
    pub path: String,
    pub file: String,
    /// Last-modified timestamp exactly as the platform reported it.
    pub mtime: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub umtime: Option<i64>,
}

impl LabSummary {
    pub fn new(
        folder: impl Into<String>,
        file: impl Into<String>,
        path: impl Into<String>,
        mtime: impl Into<String>,
        umtime: Option<i64>,
    ) -> Self {
        let file = file.into();
        Self {
            name: lab_name_from_file(&file),
            folder: folder.into(),
            path: path.into(),
            file,
            mtime: mtime.into(),
            umtime,
        }
    }
}

/// Strip the platform's lab-file suffix from a file name.
pub fn lab_name_from_file(file: &str) -> String {
    file.strip_suffix(LAB_FILE_SUFFIX).unwrap_or(file).to_owned()
}

/// Flattened lab listing produced by the folder walk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabInventory {
    pub root: String,
    pub labs: Vec<LabSummary>,
    #[serde(default)]
    pub warnings: Vec<Warning>,
}

impl LabInventory {
    /// `true` when every folder visited was listed successfully.
    pub fn is_complete(&self) -> bool {
        self.warnings.is_empty()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Lab, node and network views
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabMeta {
    pub id: String,
    pub name: String,
    pub filename: String,
    pub description: String,
    pub author: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_timeout: Option<u64>,
    pub locked: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub left: i64,
    pub top: i64,
}

/// Node as listed by the platform, without interface detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSummary {
    pub id: String,
    pub name: String,
    pub node_type: String,
    pub template: String,
    pub image: String,
    pub status: NodeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ram_mb: Option<u32>,
    pub console: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub console_url: Option<String>,
    pub position: Position,
}

/// Node with its interfaces resolved against the lab's networks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeView {
    #[serde(flatten)]
    pub node: NodeSummary,
    pub interfaces: Fetched<NodeInterfaces>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeInterfaces {
    pub ethernet: Vec<EthernetInterfaceView>,
    pub serial: Vec<SerialInterfaceView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EthernetInterfaceView {
    pub index: u32,
    pub name: String,
    pub link: InterfaceLink,
}

/// Serial interfaces have no network mapping upstream and are never resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerialInterfaceView {
    pub index: u32,
    pub name: String,
}

/// Where an ethernet interface points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum InterfaceLink {
    /// Network id 0: nothing attached.
    Unconnected,
    Connected { network_id: u32, network_name: String },
    /// Attached to a network id that is missing from the lab's network map.
    Unresolved { network_id: u32 },
}

impl InterfaceLink {
    /// Resolve a raw network id against a lab's network map.
    pub fn resolve(network_id: u32, networks: Option<&BTreeMap<String, NetworkView>>) -> Self {
        if network_id == 0 {
            return InterfaceLink::Unconnected;
        }
        match networks.and_then(|nets| nets.get(&network_id.to_string())) {
            Some(net) => InterfaceLink::Connected {
                network_id,
                network_name: net.name.clone(),
            },
            None => InterfaceLink::Unresolved { network_id },
        }
    }

    pub fn is_connected(&self) -> bool {
        !matches!(self, InterfaceLink::Unconnected)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkView {
    pub id: String,
    pub name: String,
    pub network_type: String,
    pub visible: bool,
    pub position: Position,
    /// Number of endpoints attached, as reported upstream.
    pub count: u32,
    pub icon: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Connections
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    Node,
    Network,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub kind: EndpointKind,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkMedium {
    Ethernet,
    Serial,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionView {
    pub medium: LinkMedium,
    pub a: Endpoint,
    pub b: Endpoint,
}

impl ConnectionView {
    /// `true` if either side is the given endpoint.
    pub fn touches(&self, kind: EndpointKind, id: &str) -> bool {
        (self.a.kind == kind && self.a.id == id) || (self.b.kind == kind && self.b.id == id)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Topology
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Full merged view of one lab. Built fresh per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabTopology {
    pub lab_path: String,
    pub lab: LabMeta,
    pub nodes: Fetched<BTreeMap<String, NodeView>>,
    pub networks: Fetched<BTreeMap<String, NetworkView>>,
    pub connections: Fetched<Vec<ConnectionView>>,
    #[serde(default)]
    pub warnings: Vec<Warning>,
}

impl LabTopology {
    /// `true` when no category and no per-node interface fetch failed.
    pub fn is_complete(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Categories whose top-level fetch failed.
    pub fn degraded_categories(&self) -> Vec<Category> {
        let mut out = Vec::new();
        if !self.nodes.is_complete() {
            out.push(Category::Nodes);
        }
        if !self.networks.is_complete() {
            out.push(Category::Networks);
        }
        if !self.connections.is_complete() {
            out.push(Category::Links);
        }
        out
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Operations
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Result of a mutation passed through to the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationOutcome {
    pub operation: String,
    pub message: String,
    #[serde(default)]
    pub data: Value,
}

/// Platform status as reported by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qemu_version: Option<String>,
    #[serde(default)]
    pub details: Value,
}
