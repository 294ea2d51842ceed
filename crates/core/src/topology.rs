//! Topology aggregator.
//!
//! [`lab_details`] merges four independent upstream calls (lab metadata,
//! nodes, networks, links) plus one interface call per node into a single
//! [`LabTopology`]. Lab metadata is mandatory; every other category
//! degrades to [`Fetched::Failed`] with a warning instead of failing the
//! whole view.

use std::collections::BTreeMap;

use eve_client::wire::{InterfacesRecord, NodeRecord};
use eve_domain::error::Result;
use eve_domain::lab::{
    Category, ConnectionView, Fetched, LabTopology, NetworkView, NodeInterfaces, NodeView, Warning,
};
use eve_domain::trace::TraceEvent;
use futures_util::future::join_all;

use crate::adapter::Operation;
use crate::session::SessionManager;
use crate::views;

fn op(name: &'static str, lab_path: &str) -> Operation {
    Operation::new(name).arg("lab_path", lab_path)
}

async fn fetch_interfaces(
    session: &SessionManager,
    lab_path: &str,
    node_id: &str,
) -> Result<InterfacesRecord> {
    let (lab, node) = (lab_path.to_owned(), node_id.to_owned());
    session
        .call(op("get_node_interfaces", lab_path).arg("node_id", node_id), move |api| {
            api.get_node_interfaces(&lab, &node)
        })
        .await
}

/// Full merged view of one lab.
pub async fn lab_details(session: &SessionManager, lab_path: &str) -> Result<LabTopology> {
    let (l1, l2, l3, l4) = (
        lab_path.to_owned(),
        lab_path.to_owned(),
        lab_path.to_owned(),
        lab_path.to_owned(),
    );
    let (meta, nodes, networks, links) = tokio::join!(
        session.call(op("get_lab", lab_path), move |api| api.get_lab(&l1)),
        session.call(op("list_nodes", lab_path), move |api| api.list_nodes(&l2)),
        session.call(op("list_networks", lab_path), move |api| api.list_networks(&l3)),
        session.call(op("list_links", lab_path), move |api| api.list_links(&l4)),
    );

    let lab = views::lab_meta(meta?);
    let mut warnings = Vec::new();

    let networks: Fetched<BTreeMap<String, NetworkView>> = match networks {
        Ok(records) => Fetched::Complete(views::network_views(records)),
        Err(e) => {
            tracing::warn!(lab_path, error = %e, "network list unavailable");
            warnings.push(Warning::new(Category::Networks, lab_path, &e));
            Fetched::failed(&e)
        }
    };

    let nodes = match nodes {
        Ok(records) => {
            let by_id = node_views(session, lab_path, records, networks.value(), &mut warnings).await;
            Fetched::Complete(by_id)
        }
        Err(e) => {
            tracing::warn!(lab_path, error = %e, "node list unavailable");
            warnings.push(Warning::new(Category::Nodes, lab_path, &e));
            Fetched::failed(&e)
        }
    };

    let connections: Fetched<Vec<ConnectionView>> = match links {
        Ok(records) => Fetched::Complete(views::connections(&records)),
        Err(e) => {
            tracing::warn!(lab_path, error = %e, "link list unavailable");
            warnings.push(Warning::new(Category::Links, lab_path, &e));
            Fetched::failed(&e)
        }
    };

    if !warnings.is_empty() {
        TraceEvent::AggregationDegraded {
            operation: "get_lab_details".into(),
            subject: lab_path.to_owned(),
            warnings: warnings.len(),
        }
        .emit();
    }

    Ok(LabTopology {
        lab_path: lab_path.to_owned(),
        lab,
        nodes,
        networks,
        connections,
        warnings,
    })
}

/// Fetch every node's interfaces concurrently and resolve them. A failed
/// fetch marks only that node's interfaces.
async fn node_views(
    session: &SessionManager,
    lab_path: &str,
    records: BTreeMap<String, NodeRecord>,
    networks: Option<&BTreeMap<String, NetworkView>>,
    warnings: &mut Vec<Warning>,
) -> BTreeMap<String, NodeView> {
    let summaries = views::node_summaries(records);
    let fetched = join_all(
        summaries
            .values()
            .map(|node| fetch_interfaces(session, lab_path, &node.id)),
    )
    .await;

    summaries
        .into_iter()
        .zip(fetched)
        .map(|((key, node), result)| {
            let interfaces: Fetched<NodeInterfaces> = match result {
                Ok(rec) => Fetched::Complete(views::node_interfaces(rec, networks)),
                Err(e) => {
                    tracing::warn!(lab_path, node_id = %node.id, error = %e, "interfaces unavailable");
                    warnings.push(Warning::new(Category::Interfaces, node.id.clone(), &e));
                    Fetched::failed(&e)
                }
            };
            (key, NodeView { node, interfaces })
        })
        .collect()
}

/// Connections only: one link fetch, endpoints classified, no interface
/// resolution.
pub async fn lab_connections(session: &SessionManager, lab_path: &str) -> Result<Vec<ConnectionView>> {
    let lab = lab_path.to_owned();
    let records = session
        .call(op("list_links", lab_path), move |api| api.list_links(&lab))
        .await?;
    Ok(views::connections(&records))
}
