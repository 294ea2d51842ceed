//! Pass-through lab operations.
//!
//! Each operation connects if needed, issues one or a few adapter calls,
//! and returns a plain view or a [`MutationOutcome`].

use std::collections::BTreeMap;

use eve_client::{NewLab, NewNetwork, NewNode, NodeAction};
use eve_domain::error::{Error, Result};
use eve_domain::lab::{
    Fetched, MutationOutcome, NetworkView, NodeSummary, NodeView, ServerInfo, LAB_FILE_SUFFIX,
};
use serde_json::Value;

use crate::adapter::Operation;
use crate::{views, EveCore};

/// Leading slash, no trailing slash. Empty paths are rejected.
pub fn normalize_lab_path(lab_path: &str) -> Result<String> {
    let trimmed = lab_path.trim().trim_matches('/');
    if trimmed.is_empty() {
        return Err(Error::Other("lab_path must name a lab file".into()));
    }
    Ok(format!("/{trimmed}"))
}

fn lab_op(name: &'static str, lab_path: &str) -> Operation {
    Operation::new(name).arg("lab_path", lab_path)
}

fn outcome(operation: &str, message: impl Into<String>, data: Value) -> MutationOutcome {
    MutationOutcome {
        operation: operation.to_owned(),
        message: message.into(),
        data,
    }
}

/// The `id` field of a create response, as a string.
fn created_id(data: &Value) -> Option<String> {
    match data.get("id")? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Parameters for a new lab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabSpec {
    pub name: String,
    /// Folder to create the lab in.
    pub folder: String,
    pub description: String,
    pub author: String,
    pub version: String,
}

/// One side of a node-to-node wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePort {
    pub node_id: String,
    pub interface: String,
}

impl EveCore {
    // ── server ───────────────────────────────────────────────────────

    pub async fn server_status(&self) -> Result<ServerInfo> {
        let details = self
            .session()
            .call(Operation::new("status"), |api| api.status())
            .await?;
        let field = |key: &str| details.get(key).and_then(Value::as_str).map(str::to_owned);
        Ok(ServerInfo {
            endpoint: self.session().endpoint(),
            version: field("version"),
            qemu_version: field("qemu_version"),
            details,
        })
    }

    pub async fn list_node_templates(&self) -> Result<Value> {
        self.session()
            .call(Operation::new("list_node_templates"), |api| api.list_node_templates())
            .await
    }

    /// Options, images and interface counts of one template.
    pub async fn node_template(&self, template: &str) -> Result<Value> {
        let name = template.trim().to_owned();
        if name.is_empty() {
            return Err(Error::Other("template name must not be empty".into()));
        }
        self.session()
            .call(Operation::new("get_node_template").arg("template", &name), move |api| {
                api.get_node_template(&name)
            })
            .await
    }

    pub async fn list_network_types(&self) -> Result<Value> {
        self.session()
            .call(Operation::new("list_network_types"), |api| api.list_network_types())
            .await
    }

    // ── labs ─────────────────────────────────────────────────────────

    pub async fn create_lab(&self, spec: LabSpec) -> Result<MutationOutcome> {
        let folder = crate::inventory::normalize_folder(&spec.folder);
        let name = spec.name.trim().trim_end_matches(LAB_FILE_SUFFIX).to_owned();
        if name.is_empty() {
            return Err(Error::Other("lab name must not be empty".into()));
        }
        let lab_path = if folder == "/" {
            format!("/{name}{LAB_FILE_SUFFIX}")
        } else {
            format!("{folder}/{name}{LAB_FILE_SUFFIX}")
        };
        let body = NewLab {
            path: folder,
            name: name.clone(),
            version: spec.version,
            author: spec.author,
            description: spec.description,
            body: String::new(),
        };
        let data = self
            .session()
            .call(lab_op("create_lab", &lab_path), move |api| api.create_lab(&body))
            .await?;
        tracing::info!(lab_path = %lab_path, "lab created");
        Ok(outcome(
            "create_lab",
            format!("lab '{name}' created at {lab_path}"),
            serde_json::json!({ "lab_path": lab_path, "response": data }),
        ))
    }

    pub async fn delete_lab(&self, lab_path: &str) -> Result<MutationOutcome> {
        let lab = normalize_lab_path(lab_path)?;
        let owned = lab.clone();
        let data = self
            .session()
            .call(lab_op("delete_lab", &lab), move |api| api.delete_lab(&owned))
            .await?;
        tracing::info!(lab_path = %lab, "lab deleted");
        Ok(outcome("delete_lab", format!("lab {lab} deleted"), data))
    }

    // ── nodes ────────────────────────────────────────────────────────

    /// Node list without interface detail.
    pub async fn list_nodes(&self, lab_path: &str) -> Result<BTreeMap<String, NodeSummary>> {
        let lab = normalize_lab_path(lab_path)?;
        let owned = lab.clone();
        let records = self
            .session()
            .call(lab_op("list_nodes", &lab), move |api| api.list_nodes(&owned))
            .await?;
        Ok(views::node_summaries(records))
    }

    /// One node with its interfaces resolved against the lab's networks.
    /// The node itself is mandatory; interfaces and networks degrade.
    pub async fn get_node(&self, lab_path: &str, node_id: &str) -> Result<NodeView> {
        let lab = normalize_lab_path(lab_path)?;
        let (l1, l2, l3) = (lab.clone(), lab.clone(), lab.clone());
        let (n1, n2) = (node_id.to_owned(), node_id.to_owned());
        let session = self.session();

        let (node, interfaces, networks) = tokio::join!(
            session.call(lab_op("get_node", &lab).arg("node_id", node_id), move |api| {
                api.get_node(&l1, &n1)
            }),
            session.call(
                lab_op("get_node_interfaces", &lab).arg("node_id", node_id),
                move |api| api.get_node_interfaces(&l2, &n2)
            ),
            session.call(lab_op("list_networks", &lab), move |api| api.list_networks(&l3)),
        );

        let node = views::node_summary(node_id, node?);
        let networks = networks.ok().map(views::network_views);
        let interfaces = match interfaces {
            Ok(rec) => Fetched::Complete(views::node_interfaces(rec, networks.as_ref())),
            Err(e) => Fetched::failed(&e),
        };
        Ok(NodeView { node, interfaces })
    }

    pub async fn add_node(&self, lab_path: &str, node: NewNode) -> Result<MutationOutcome> {
        let lab = normalize_lab_path(lab_path)?;
        let owned = lab.clone();
        let template = node.template.clone();
        let data = self
            .session()
            .call(
                lab_op("add_node", &lab).arg("template", &template),
                move |api| api.add_node(&owned, &node),
            )
            .await?;
        let message = match created_id(&data) {
            Some(id) => format!("node {id} ({template}) added to {lab}"),
            None => format!("{template} node added to {lab}"),
        };
        Ok(outcome("add_node", message, data))
    }

    pub async fn delete_node(&self, lab_path: &str, node_id: &str) -> Result<MutationOutcome> {
        let lab = normalize_lab_path(lab_path)?;
        let (owned, node) = (lab.clone(), node_id.to_owned());
        let data = self
            .session()
            .call(lab_op("delete_node", &lab).arg("node_id", node_id), move |api| {
                api.delete_node(&owned, &node)
            })
            .await?;
        Ok(outcome("delete_node", format!("node {node_id} deleted from {lab}"), data))
    }

    async fn node_action(&self, lab_path: &str, node_id: &str, action: NodeAction) -> Result<MutationOutcome> {
        let lab = normalize_lab_path(lab_path)?;
        let (owned, node) = (lab.clone(), node_id.to_owned());
        let name = match action {
            NodeAction::Start => "start_node",
            NodeAction::Stop => "stop_node",
            NodeAction::Wipe => "wipe_node",
        };
        let data = self
            .session()
            .call(lab_op(name, &lab).arg("node_id", node_id), move |api| {
                api.node_action(&owned, &node, action)
            })
            .await?;
        tracing::info!(lab_path = %lab, node_id, %action, "node action sent");
        Ok(outcome(name, format!("{action} sent to node {node_id} in {lab}"), data))
    }

    async fn all_nodes_action(&self, lab_path: &str, action: NodeAction) -> Result<MutationOutcome> {
        let lab = normalize_lab_path(lab_path)?;
        let owned = lab.clone();
        let name = match action {
            NodeAction::Start => "start_all_nodes",
            NodeAction::Stop => "stop_all_nodes",
            NodeAction::Wipe => "wipe_all_nodes",
        };
        let data = self
            .session()
            .call(lab_op(name, &lab), move |api| api.all_nodes_action(&owned, action))
            .await?;
        tracing::info!(lab_path = %lab, %action, "bulk node action sent");
        Ok(outcome(name, format!("{action} sent to all nodes in {lab}"), data))
    }

    pub async fn start_node(&self, lab_path: &str, node_id: &str) -> Result<MutationOutcome> {
        self.node_action(lab_path, node_id, NodeAction::Start).await
    }

    pub async fn stop_node(&self, lab_path: &str, node_id: &str) -> Result<MutationOutcome> {
        self.node_action(lab_path, node_id, NodeAction::Stop).await
    }

    pub async fn wipe_node(&self, lab_path: &str, node_id: &str) -> Result<MutationOutcome> {
        self.node_action(lab_path, node_id, NodeAction::Wipe).await
    }

    pub async fn start_all_nodes(&self, lab_path: &str) -> Result<MutationOutcome> {
        self.all_nodes_action(lab_path, NodeAction::Start).await
    }

    pub async fn stop_all_nodes(&self, lab_path: &str) -> Result<MutationOutcome> {
        self.all_nodes_action(lab_path, NodeAction::Stop).await
    }

    pub async fn wipe_all_nodes(&self, lab_path: &str) -> Result<MutationOutcome> {
        self.all_nodes_action(lab_path, NodeAction::Wipe).await
    }

    // ── networks ─────────────────────────────────────────────────────

    pub async fn list_lab_networks(&self, lab_path: &str) -> Result<BTreeMap<String, NetworkView>> {
        let lab = normalize_lab_path(lab_path)?;
        let owned = lab.clone();
        let records = self
            .session()
            .call(lab_op("list_networks", &lab), move |api| api.list_networks(&owned))
            .await?;
        Ok(views::network_views(records))
    }

    pub async fn create_network(&self, lab_path: &str, network: NewNetwork) -> Result<MutationOutcome> {
        let lab = normalize_lab_path(lab_path)?;
        let owned = lab.clone();
        let kind = network.network_type.clone();
        let data = self
            .session()
            .call(lab_op("add_network", &lab).arg("type", &kind), move |api| {
                api.add_network(&owned, &network)
            })
            .await?;
        let message = match created_id(&data) {
            Some(id) => format!("{kind} network {id} created in {lab}"),
            None => format!("{kind} network created in {lab}"),
        };
        Ok(outcome("create_network", message, data))
    }

    pub async fn delete_network(&self, lab_path: &str, network_id: &str) -> Result<MutationOutcome> {
        let lab = normalize_lab_path(lab_path)?;
        let (owned, net) = (lab.clone(), network_id.to_owned());
        let data = self
            .session()
            .call(lab_op("delete_network", &lab).arg("network_id", network_id), move |api| {
                api.delete_network(&owned, &net)
            })
            .await?;
        Ok(outcome("delete_network", format!("network {network_id} deleted from {lab}"), data))
    }

    // ── wiring ───────────────────────────────────────────────────────

    /// Point a node's ethernet interface (by name) at a network. Wiring to
    /// a cloud is this call with a cloud-type network.
    pub async fn connect_node_to_network(
        &self,
        lab_path: &str,
        node_id: &str,
        interface: &str,
        network_id: u32,
    ) -> Result<MutationOutcome> {
        let lab = normalize_lab_path(lab_path)?;
        self.attach_interface(&lab, node_id, interface, network_id).await?;
        tracing::info!(lab_path = %lab, node_id, interface, network_id, "interface attached");
        Ok(outcome(
            "connect_node_to_network",
            format!("node {node_id} {interface} attached to network {network_id}"),
            serde_json::json!({
                "node_id": node_id,
                "interface": interface,
                "network_id": network_id,
            }),
        ))
    }

    /// Wire two node interfaces through a new hidden bridge network.
    /// Both interfaces are resolved before the bridge is created. If
    /// wiring fails after that, the bridge is deleted again (best effort).
    pub async fn connect_node_to_node(
        &self,
        lab_path: &str,
        src: NodePort,
        dst: NodePort,
    ) -> Result<MutationOutcome> {
        let lab = normalize_lab_path(lab_path)?;
        let src_index = self.resolve_interface(&lab, &src.node_id, &src.interface).await?;
        let dst_index = self.resolve_interface(&lab, &dst.node_id, &dst.interface).await?;

        let bridge = NewNetwork {
            network_type: "bridge".into(),
            name: format!("{}_{}--{}_{}", src.node_id, src.interface, dst.node_id, dst.interface),
            left: 0,
            top: 0,
            visibility: 0,
        };
        let created = self.create_network(&lab, bridge).await?;
        let network_id = created_id(&created.data)
            .and_then(|id| id.parse::<u32>().ok())
            .ok_or_else(|| Error::Api {
                operation: "connect_node_to_node".into(),
                status: None,
                message: "bridge network created without a numeric id".into(),
                payload: Some(created.data.clone()),
            })?;

        let wired = async {
            self.set_interface(&lab, &src.node_id, src_index, network_id).await?;
            self.set_interface(&lab, &dst.node_id, dst_index, network_id).await
        }
        .await;
        if let Err(e) = wired {
            if let Err(cleanup) = self.delete_network(&lab, &network_id.to_string()).await {
                tracing::warn!(
                    lab_path = %lab,
                    network_id,
                    error = %cleanup,
                    "failed to remove bridge after wiring error"
                );
            }
            return Err(e);
        }

        tracing::info!(
            lab_path = %lab,
            network_id,
            src = %src.node_id,
            dst = %dst.node_id,
            "nodes wired through bridge"
        );
        Ok(outcome(
            "connect_node_to_node",
            format!(
                "node {} {} wired to node {} {} via network {network_id}",
                src.node_id, src.interface, dst.node_id, dst.interface
            ),
            serde_json::json!({ "network_id": network_id }),
        ))
    }

    async fn attach_interface(&self, lab: &str, node_id: &str, interface: &str, network_id: u32) -> Result<()> {
        let index = self.resolve_interface(lab, node_id, interface).await?;
        self.set_interface(lab, node_id, index, network_id).await
    }

    /// Index of the named ethernet interface on a node.
    async fn resolve_interface(&self, lab: &str, node_id: &str, interface: &str) -> Result<u32> {
        let (l1, n1) = (lab.to_owned(), node_id.to_owned());
        let interfaces = self
            .session()
            .call(lab_op("get_node_interfaces", lab).arg("node_id", node_id), move |api| {
                api.get_node_interfaces(&l1, &n1)
            })
            .await?;
        interfaces.ethernet_index(interface).ok_or_else(|| {
            Error::NotFound(format!("node {node_id} in {lab} has no ethernet interface '{interface}'"))
        })
    }

    async fn set_interface(&self, lab: &str, node_id: &str, index: u32, network_id: u32) -> Result<()> {
        let mapping = BTreeMap::from([(index.to_string(), network_id)]);
        let (l2, n2) = (lab.to_owned(), node_id.to_owned());
        self.session()
            .call(
                lab_op("set_node_interfaces", lab)
                    .arg("node_id", node_id)
                    .arg("interface", index),
                move |api| api.set_node_interfaces(&l2, &n2, &mapping),
            )
            .await?;
        Ok(())
    }
}
