//! The synchronous capability surface of an EVE-NG server.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use eve_domain::config::EvengConfig;
use serde::Serialize;
use serde_json::Value;

use crate::error::CapResult;
use crate::wire::{FolderListing, InterfacesRecord, LabRecord, LinkRecord, NetworkRecord, NodeRecord};

/// Blocking access to one authenticated EVE-NG session.
///
/// Every method may block on network I/O and must only be called from a
/// blocking-capable context. Implementations hold their own session
/// (cookies) and are shared behind an `Arc` by the session manager.
pub trait EvengApi: Send + Sync {
    /// `protocol://host:port` this handle talks to.
    fn endpoint(&self) -> String;

    /// Authenticate and establish the upstream session (POST /api/auth/login).
    fn login(&self) -> CapResult<()>;

    /// End the upstream session (GET /api/auth/logout).
    fn logout(&self) -> CapResult<()>;

    /// Platform status: versions, load, running counts (GET /api/status).
    fn status(&self) -> CapResult<Value>;

    /// One folder's labs and immediate subfolders (GET /api/folders/{path}).
    fn list_folder(&self, path: &str) -> CapResult<FolderListing>;

    /// Lab metadata (GET /api/labs/{path}).
    fn get_lab(&self, lab_path: &str) -> CapResult<LabRecord>;

    /// POST /api/labs
    fn create_lab(&self, lab: &NewLab) -> CapResult<Value>;

    /// DELETE /api/labs/{path}
    fn delete_lab(&self, lab_path: &str) -> CapResult<Value>;

    /// Nodes keyed by node id (GET /api/labs/{path}/nodes).
    fn list_nodes(&self, lab_path: &str) -> CapResult<BTreeMap<String, NodeRecord>>;

    fn get_node(&self, lab_path: &str, node_id: &str) -> CapResult<NodeRecord>;

    fn add_node(&self, lab_path: &str, node: &NewNode) -> CapResult<Value>;

    fn delete_node(&self, lab_path: &str, node_id: &str) -> CapResult<Value>;

    /// GET /api/labs/{path}/nodes/{id}/{start|stop|wipe}
    fn node_action(&self, lab_path: &str, node_id: &str, action: NodeAction) -> CapResult<Value>;

    /// GET /api/labs/{path}/nodes/{start|stop|wipe}
    fn all_nodes_action(&self, lab_path: &str, action: NodeAction) -> CapResult<Value>;

    /// GET /api/labs/{path}/nodes/{id}/interfaces
    fn get_node_interfaces(&self, lab_path: &str, node_id: &str) -> CapResult<InterfacesRecord>;

    /// Point interfaces at networks (PUT /api/labs/{path}/nodes/{id}/interfaces).
    /// Keys are interface indexes, values network ids.
    fn set_node_interfaces(
        &self,
        lab_path: &str,
        node_id: &str,
        mapping: &BTreeMap<String, u32>,
    ) -> CapResult<Value>;

    /// Networks keyed by network id (GET /api/labs/{path}/networks).
    fn list_networks(&self, lab_path: &str) -> CapResult<BTreeMap<String, NetworkRecord>>;

    fn add_network(&self, lab_path: &str, network: &NewNetwork) -> CapResult<Value>;

    fn delete_network(&self, lab_path: &str, network_id: &str) -> CapResult<Value>;

    /// Raw links (GET /api/labs/{path}/topology).
    fn list_links(&self, lab_path: &str) -> CapResult<Vec<LinkRecord>>;

    /// Template catalogue (GET /api/list/templates/).
    fn list_node_templates(&self) -> CapResult<Value>;

    /// One template's options and images (GET /api/list/templates/{name}).
    fn get_node_template(&self, template: &str) -> CapResult<Value>;

    /// Network type catalogue (GET /api/list/networks).
    fn list_network_types(&self) -> CapResult<Value>;
}

/// Creates unauthenticated [`EvengApi`] handles from endpoint settings.
///
/// Called from a blocking context; building an HTTP client may block.
pub trait EvengConnector: Send + Sync {
    fn connect(&self, config: &EvengConfig) -> CapResult<Arc<dyn EvengApi>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeAction {
    Start,
    Stop,
    Wipe,
}

impl NodeAction {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeAction::Start => "start",
            NodeAction::Stop => "stop",
            NodeAction::Wipe => "wipe",
        }
    }
}

impl fmt::Display for NodeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of `POST /api/labs`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewLab {
    /// Folder the lab is created in.
    pub path: String,
    pub name: String,
    pub version: String,
    pub author: String,
    pub description: String,
    pub body: String,
}

/// Body of `POST /api/labs/{path}/nodes`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewNode {
    pub template: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub name: String,
    pub left: i64,
    pub top: i64,
    pub delay: u32,
    pub console: String,
    pub config: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ethernet: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ram: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<u32>,
}

/// Body of `POST /api/labs/{path}/networks`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewNetwork {
    #[serde(rename = "type")]
    pub network_type: String,
    pub name: String,
    pub left: i64,
    pub top: i64,
    /// `0` hides the network from the canvas (used for point-to-point bridges).
    pub visibility: u8,
}
