//! Read-only MCP resources addressed by `eveng://` URIs.
//!
//! Every read is a fresh upstream fetch. Upstream failures are returned as
//! the resource body (`{"error": kind, "message": ...}`); only a URI that
//! matches no resource is a JSON-RPC error.

use serde::Serialize;
use serde_json::{json, Value};

use eve_core::EveCore;
use eve_domain::error::{Error, Result};
use eve_domain::lab::LAB_FILE_SUFFIX;
use eve_domain::NodeStatus;

use crate::protocol::{
    JsonRpcError, McpResource, McpResourceTemplate, ReadResourceResult, ResourceContents,
};
use crate::tools::render_error;

pub const SCHEME: &str = "eveng://";
const MIME_JSON: &str = "application/json";

/// A parsed resource URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceUri {
    ServerStatus,
    Lab(String),
    LabTopology(String),
    LabNodes(String),
    LabNetworks(String),
    Template(String),
    NodeConfig { lab: String, node: String },
}

impl ResourceUri {
    /// `None` when the URI names no resource.
    pub fn parse(uri: &str) -> Option<Self> {
        let rest = uri.strip_prefix(SCHEME)?;
        let segments: Vec<&str> = rest.split('/').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return None;
        }
        let parsed = match segments.as_slice() {
            ["server", "status"] => ResourceUri::ServerStatus,
            ["labs", lab] => ResourceUri::Lab((*lab).to_owned()),
            ["labs", lab, "topology"] => ResourceUri::LabTopology((*lab).to_owned()),
            ["labs", lab, "nodes"] => ResourceUri::LabNodes((*lab).to_owned()),
            ["labs", lab, "networks"] => ResourceUri::LabNetworks((*lab).to_owned()),
            ["templates", name] => ResourceUri::Template((*name).to_owned()),
            ["nodes", lab, node, "config"] => ResourceUri::NodeConfig {
                lab: (*lab).to_owned(),
                node: (*node).to_owned(),
            },
            _ => return None,
        };
        Some(parsed)
    }
}

/// Lab names in URIs may omit the `.unl` suffix.
pub fn lab_path(lab_name: &str) -> String {
    if lab_name.ends_with(LAB_FILE_SUFFIX) {
        format!("/{lab_name}")
    } else {
        format!("/{lab_name}{LAB_FILE_SUFFIX}")
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Listing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn list_resources() -> Vec<McpResource> {
    vec![McpResource {
        uri: format!("{SCHEME}server/status"),
        name: "server_status".into(),
        description: "Live EVE-NG server status and session state.".into(),
        mime_type: MIME_JSON.into(),
    }]
}

pub fn list_templates() -> Vec<McpResourceTemplate> {
    let template = |uri: &str, name: &str, description: &str| McpResourceTemplate {
        uri_template: format!("{SCHEME}{uri}"),
        name: name.into(),
        description: description.into(),
        mime_type: MIME_JSON.into(),
    };
    vec![
        template("labs/{lab_name}", "lab", "Lab metadata with node and network counts."),
        template("labs/{lab_name}/topology", "lab_topology", "Connections between nodes and networks."),
        template("labs/{lab_name}/nodes", "lab_nodes", "Node inventory with run-state counts."),
        template("labs/{lab_name}/networks", "lab_networks", "Networks defined in the lab."),
        template("templates/{template_name}", "node_template", "Options and images of a node template."),
        template(
            "nodes/{lab_name}/{node_name}/config",
            "node_config",
            "One node's settings and interfaces, looked up by name or id.",
        ),
    ]
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Reading
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn read(core: &EveCore, uri: &str) -> std::result::Result<ReadResourceResult, JsonRpcError> {
    let resource = ResourceUri::parse(uri).ok_or_else(|| JsonRpcError::resource_not_found(uri))?;
    let text = match fetch(core, &resource).await.and_then(|body| pretty(&body)) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(uri, error = %e, "resource read failed");
            render_error(&e).text
        }
    };
    Ok(ReadResourceResult {
        contents: vec![ResourceContents {
            uri: uri.to_owned(),
            mime_type: MIME_JSON.into(),
            text,
        }],
    })
}

fn pretty<T: Serialize>(body: &T) -> Result<String> {
    serde_json::to_string_pretty(body).map_err(|e| Error::Other(format!("serialization: {e}")))
}

async fn fetch(core: &EveCore, resource: &ResourceUri) -> Result<Value> {
    match resource {
        ResourceUri::ServerStatus => {
            let info = core.server_status().await?;
            Ok(json!({
                "session": core.snapshot().to_json(),
                "server": info,
            }))
        }

        ResourceUri::Lab(name) => {
            let path = lab_path(name);
            let topo = core.get_lab_details(&path).await?;
            let node_count = topo.nodes.value().map(|n| n.len());
            let network_count = topo.networks.value().map(|n| n.len());
            let status = if node_count.unwrap_or(0) > 0 { "active" } else { "empty" };
            Ok(json!({
                "name": topo.lab.name,
                "path": topo.lab_path,
                "description": topo.lab.description,
                "author": topo.lab.author,
                "version": topo.lab.version,
                "locked": topo.lab.locked,
                "node_count": node_count,
                "network_count": network_count,
                "status": status,
                "warnings": topo.warnings,
            }))
        }

        ResourceUri::LabTopology(name) => {
            let connections = core.get_lab_topology(&lab_path(name)).await?;
            Ok(json!({
                "lab": name,
                "connection_count": connections.len(),
                "connections": connections,
            }))
        }

        ResourceUri::LabNodes(name) => {
            let nodes = core.list_nodes(&lab_path(name)).await?;
            let count = |status: NodeStatus| nodes.values().filter(|n| n.status == status).count();
            Ok(json!({
                "lab": name,
                "node_count": nodes.len(),
                "running_count": count(NodeStatus::Running),
                "stopped_count": count(NodeStatus::Stopped),
                "nodes": nodes.values().collect::<Vec<_>>(),
            }))
        }

        ResourceUri::LabNetworks(name) => {
            let networks = core.list_lab_networks(&lab_path(name)).await?;
            Ok(json!({
                "lab": name,
                "network_count": networks.len(),
                "networks": networks.values().collect::<Vec<_>>(),
            }))
        }

        ResourceUri::Template(name) => {
            let detail = core.node_template(name).await?;
            Ok(json!({ "name": name, "detail": detail }))
        }

        ResourceUri::NodeConfig { lab, node } => {
            let path = lab_path(lab);
            let nodes = core.list_nodes(&path).await?;
            let node_id = nodes
                .values()
                .find(|n| n.name == *node)
                .or_else(|| nodes.get(node.as_str()))
                .map(|n| n.id.clone())
                .ok_or_else(|| Error::NotFound(format!("node {node} not found in {path}")))?;
            let view = core.get_node(&path, &node_id).await?;
            Ok(json!({
                "lab_name": lab,
                "lab_path": path,
                "node_id": node_id,
                "node_name": view.node.name,
                "running": view.node.status.is_running(),
                "node": view,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_resource_shape() {
        assert_eq!(ResourceUri::parse("eveng://server/status"), Some(ResourceUri::ServerStatus));
        assert_eq!(ResourceUri::parse("eveng://labs/core"), Some(ResourceUri::Lab("core".into())));
        assert_eq!(
            ResourceUri::parse("eveng://labs/core.unl/networks"),
            Some(ResourceUri::LabNetworks("core.unl".into()))
        );
        assert_eq!(
            ResourceUri::parse("eveng://nodes/core/R1/config"),
            Some(ResourceUri::NodeConfig { lab: "core".into(), node: "R1".into() })
        );
    }

    #[test]
    fn rejects_foreign_and_partial_uris() {
        assert_eq!(ResourceUri::parse("file:///etc/passwd"), None);
        assert_eq!(ResourceUri::parse("eveng://labs/"), None);
        assert_eq!(ResourceUri::parse("eveng://labs/core/links"), None);
        assert_eq!(ResourceUri::parse("eveng://nodes/core/R1"), None);
    }

    #[test]
    fn lab_names_gain_the_lab_suffix_once() {
        assert_eq!(lab_path("core"), "/core.unl");
        assert_eq!(lab_path("core.unl"), "/core.unl");
    }

    #[test]
    fn every_template_uses_the_scheme() {
        let templates = list_templates();
        assert_eq!(templates.len(), 6);
        assert!(templates.iter().all(|t| t.uri_template.starts_with(SCHEME)));
        assert_eq!(list_resources()[0].uri, "eveng://server/status");
    }
}
