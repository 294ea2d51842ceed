//! Conversions from wire records to the request-scoped views.

use std::collections::BTreeMap;

use eve_client::wire::{InterfacesRecord, LabRecord, LinkRecord, NetworkRecord, NodeRecord};
use eve_domain::lab::{
    ConnectionView, Endpoint, EndpointKind, EthernetInterfaceView, InterfaceLink, LabMeta,
    LinkMedium, NetworkView, NodeInterfaces, NodeSummary, Position, SerialInterfaceView,
};
use eve_domain::NodeStatus;

pub fn lab_meta(rec: LabRecord) -> LabMeta {
    LabMeta {
        id: rec.id,
        name: rec.name,
        filename: rec.filename,
        description: rec.description,
        author: rec.author,
        version: rec.version,
        script_timeout: rec.scripttimeout.and_then(|t| u64::try_from(t).ok()),
        locked: rec.lock,
    }
}

/// `key` is the map key the record was listed under; it wins when the
/// record carries no id of its own.
pub fn node_summary(key: &str, rec: NodeRecord) -> NodeSummary {
    let id = if rec.id.is_empty() { key.to_owned() } else { rec.id };
    NodeSummary {
        id,
        name: rec.name,
        node_type: rec.node_type,
        template: rec.template,
        image: rec.image,
        status: NodeStatus::from_code(rec.status.unwrap_or(0)),
        cpu: rec.cpu,
        ram_mb: rec.ram,
        console: rec.console,
        console_url: rec.url.filter(|u| !u.is_empty()),
        position: Position {
            left: rec.left.unwrap_or(0),
            top: rec.top.unwrap_or(0),
        },
    }
}

pub fn node_summaries(records: BTreeMap<String, NodeRecord>) -> BTreeMap<String, NodeSummary> {
    records
        .into_iter()
        .map(|(key, rec)| {
            let node = node_summary(&key, rec);
            (key, node)
        })
        .collect()
}

pub fn network_view(key: &str, rec: NetworkRecord) -> NetworkView {
    let id = if rec.id.is_empty() { key.to_owned() } else { rec.id };
    NetworkView {
        id,
        name: rec.name,
        network_type: rec.network_type,
        visible: rec.visibility.unwrap_or(true),
        position: Position {
            left: rec.left.unwrap_or(0),
            top: rec.top.unwrap_or(0),
        },
        count: rec.count.unwrap_or(0),
        icon: rec.icon,
    }
}

pub fn network_views(records: BTreeMap<String, NetworkRecord>) -> BTreeMap<String, NetworkView> {
    records
        .into_iter()
        .map(|(key, rec)| {
            let net = network_view(&key, rec);
            (key, net)
        })
        .collect()
}

/// Resolve ethernet interfaces against the lab's networks. Serial
/// interfaces are listed as-is.
pub fn node_interfaces(
    rec: InterfacesRecord,
    networks: Option<&BTreeMap<String, NetworkView>>,
) -> NodeInterfaces {
    NodeInterfaces {
        ethernet: rec
            .ethernet
            .into_iter()
            .map(|eth| EthernetInterfaceView {
                index: eth.index,
                link: InterfaceLink::resolve(eth.network_id.unwrap_or(0), networks),
                name: eth.name,
            })
            .collect(),
        serial: rec
            .serial
            .into_iter()
            .map(|s| SerialInterfaceView { index: s.index, name: s.name })
            .collect(),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Links
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Classify one side of a link.
///
/// The declared `*_type` field wins. Without it the identifier prefix
/// (`node3`, `network7`) decides, and anything else is taken as a network.
fn endpoint(raw_id: &str, declared: Option<&str>, label: Option<&str>) -> Endpoint {
    let declared = declared.map(str::to_ascii_lowercase);
    let kind = match declared.as_deref() {
        Some("node") => EndpointKind::Node,
        Some("network") => EndpointKind::Network,
        _ if raw_id.starts_with("node") => EndpointKind::Node,
        _ => EndpointKind::Network,
    };
    let prefix = match kind {
        EndpointKind::Node => "node",
        EndpointKind::Network => "network",
    };
    let id = raw_id.strip_prefix(prefix).unwrap_or(raw_id).to_owned();
    Endpoint {
        kind,
        id,
        interface: label.filter(|l| !l.is_empty()).map(str::to_owned),
    }
}

pub fn connection(rec: &LinkRecord) -> ConnectionView {
    let medium = if rec.medium.eq_ignore_ascii_case("serial") {
        LinkMedium::Serial
    } else {
        LinkMedium::Ethernet
    };
    ConnectionView {
        medium,
        a: endpoint(&rec.source, rec.source_type.as_deref(), rec.source_label.as_deref()),
        b: endpoint(
            &rec.destination,
            rec.destination_type.as_deref(),
            rec.destination_label.as_deref(),
        ),
    }
}

pub fn connections(records: &[LinkRecord]) -> Vec<ConnectionView> {
    records.iter().map(connection).collect()
}
