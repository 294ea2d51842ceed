//! Scripted in-memory EVE-NG for the core integration tests.
//!
//! Each capability method bumps a per-operation counter, then either
//! returns an injected failure (keyed `"<op>:<arg>"` or just `"<op>"`) or
//! answers from the scripted lab data.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use eve_client::wire::{
    EthernetRecord, FolderEntry, FolderListing, InterfacesRecord, LabEntry, LabRecord, LinkRecord,
    NetworkRecord, NodeRecord, SerialRecord,
};
use eve_client::{
    CapResult, CapabilityError, EvengApi, EvengConnector, NewLab, NewNetwork, NewNode, NodeAction,
};
use eve_core::{CallAdapter, EveCore, SessionManager};
use eve_domain::config::EvengConfig;
use parking_lot::Mutex;
use serde_json::{json, Value};

#[derive(Default)]
pub struct MockEveng {
    calls: Mutex<HashMap<String, usize>>,
    failures: Mutex<HashMap<String, CapabilityError>>,
    pub folders: Mutex<HashMap<String, FolderListing>>,
    pub lab: Mutex<LabRecord>,
    pub nodes: Mutex<BTreeMap<String, NodeRecord>>,
    pub interfaces: Mutex<HashMap<String, InterfacesRecord>>,
    pub networks: Mutex<BTreeMap<String, NetworkRecord>>,
    pub links: Mutex<Vec<LinkRecord>>,
    /// Interface writes as `(node_id, mapping)`.
    pub interface_writes: Mutex<Vec<(String, BTreeMap<String, u32>)>>,
    pub next_network_id: Mutex<u32>,
    /// Applied to every call.
    pub delay: Mutex<Option<Duration>>,
    /// Applied to calls matching a key (`"op"` or `"op:arg"`).
    delays: Mutex<HashMap<String, Duration>>,
}

impl MockEveng {
    pub fn new() -> Arc<Self> {
        let mock = Self::default();
        *mock.lab.lock() = LabRecord {
            id: "lab-1".into(),
            name: "core".into(),
            filename: "core.unl".into(),
            version: "1".into(),
            ..LabRecord::default()
        };
        *mock.next_network_id.lock() = 100;
        Arc::new(mock)
    }

    pub fn calls(&self, op: &str) -> usize {
        self.calls.lock().get(op).copied().unwrap_or(0)
    }

    /// Fail calls to `key` (`"op"` or `"op:arg"`) from now on.
    pub fn fail(&self, key: &str, err: CapabilityError) {
        self.failures.lock().insert(key.to_owned(), err);
    }

    pub fn clear_failure(&self, key: &str) {
        self.failures.lock().remove(key);
    }

    /// Sleep before answering calls to `key` (`"op"` or `"op:arg"`).
    pub fn delay_op(&self, key: &str, delay: Duration) {
        self.delays.lock().insert(key.to_owned(), delay);
    }

    fn enter(&self, op: &str, arg: Option<&str>) -> CapResult<()> {
        *self.calls.lock().entry(op.to_owned()).or_insert(0) += 1;
        if let Some(arg) = arg {
            *self.calls.lock().entry(format!("{op}:{arg}")).or_insert(0) += 1;
        }
        if let Some(delay) = *self.delay.lock() {
            std::thread::sleep(delay);
        }
        let scoped = {
            let delays = self.delays.lock();
            arg.and_then(|a| delays.get(&format!("{op}:{a}")).copied())
                .or_else(|| delays.get(op).copied())
        };
        if let Some(delay) = scoped {
            std::thread::sleep(delay);
        }
        let failures = self.failures.lock();
        if let Some(arg) = arg {
            if let Some(err) = failures.get(&format!("{op}:{arg}")) {
                return Err(err.clone());
            }
        }
        match failures.get(op) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    // ── scripting helpers ────────────────────────────────────────────

    pub fn script_folder(&self, path: &str, subfolders: &[&str], labs: &[&str]) {
        let mut folders = vec![FolderEntry { name: "..".into(), path: "/".into() }];
        folders.extend(subfolders.iter().map(|p| FolderEntry {
            name: p.rsplit('/').next().unwrap_or(p).to_owned(),
            path: (*p).to_owned(),
        }));
        let labs = labs
            .iter()
            .map(|file| LabEntry {
                file: (*file).to_owned(),
                path: if path == "/" { format!("/{file}") } else { format!("{path}/{file}") },
                mtime: "01 Jan 2024 10:00".into(),
                umtime: Some(1_704_103_200),
            })
            .collect();
        self.folders
            .lock()
            .insert(path.to_owned(), FolderListing { folders, labs });
    }

    pub fn script_node(&self, id: &str, template: &str, status: i64) {
        self.nodes.lock().insert(
            id.to_owned(),
            NodeRecord {
                id: id.to_owned(),
                name: format!("{template}-{id}"),
                node_type: "qemu".into(),
                template: template.to_owned(),
                image: format!("{template}-image"),
                status: Some(status),
                cpu: Some(1),
                ram: Some(1024),
                console: "telnet".into(),
                url: None,
                left: Some(10),
                top: Some(20),
            },
        );
    }

    /// Ethernet interfaces for a node as `(name, network_id)`, in index order.
    pub fn script_interfaces(&self, node_id: &str, ethernet: &[(&str, u32)]) {
        let ethernet = ethernet
            .iter()
            .enumerate()
            .map(|(i, (name, net))| EthernetRecord {
                index: i as u32,
                name: (*name).to_owned(),
                network_id: Some(*net),
            })
            .collect();
        self.interfaces.lock().insert(
            node_id.to_owned(),
            InterfacesRecord {
                ethernet,
                serial: vec![SerialRecord { index: 0, name: "s0/0".into(), ..SerialRecord::default() }],
            },
        );
    }

    pub fn script_network(&self, id: &str, name: &str) {
        self.networks.lock().insert(
            id.to_owned(),
            NetworkRecord {
                id: id.to_owned(),
                name: name.to_owned(),
                network_type: "bridge".into(),
                visibility: Some(true),
                count: Some(1),
                ..NetworkRecord::default()
            },
        );
    }

    pub fn script_link(&self, source: &str, destination: &str, label: &str) {
        self.links.lock().push(LinkRecord {
            medium: "ethernet".into(),
            source: source.to_owned(),
            source_type: Some("node".into()),
            source_label: Some(label.to_owned()),
            destination: destination.to_owned(),
            destination_type: Some("network".into()),
            destination_label: None,
            network_id: None,
        });
    }
}

impl EvengApi for MockEveng {
    fn endpoint(&self) -> String {
        "http://mock.eve".into()
    }

    fn login(&self) -> CapResult<()> {
        self.enter("login", None)
    }

    fn logout(&self) -> CapResult<()> {
        self.enter("logout", None)
    }

    fn status(&self) -> CapResult<Value> {
        self.enter("status", None)?;
        Ok(json!({ "version": "5.0.1-24", "qemu_version": "4.1.0" }))
    }

    fn list_folder(&self, path: &str) -> CapResult<FolderListing> {
        self.enter("list_folder", Some(path))?;
        self.folders.lock().get(path).cloned().ok_or(CapabilityError::Rejected {
            status: 404,
            message: format!("folder {path} does not exist"),
            payload: None,
        })
    }

    fn get_lab(&self, lab_path: &str) -> CapResult<LabRecord> {
        self.enter("get_lab", Some(lab_path))?;
        Ok(self.lab.lock().clone())
    }

    fn create_lab(&self, lab: &NewLab) -> CapResult<Value> {
        self.enter("create_lab", Some(&lab.name))?;
        Ok(Value::Null)
    }

    fn delete_lab(&self, lab_path: &str) -> CapResult<Value> {
        self.enter("delete_lab", Some(lab_path))?;
        Ok(Value::Null)
    }

    fn list_nodes(&self, lab_path: &str) -> CapResult<BTreeMap<String, NodeRecord>> {
        self.enter("list_nodes", Some(lab_path))?;
        Ok(self.nodes.lock().clone())
    }

    fn get_node(&self, lab_path: &str, node_id: &str) -> CapResult<NodeRecord> {
        self.enter("get_node", Some(node_id))?;
        self.nodes.lock().get(node_id).cloned().ok_or(CapabilityError::Rejected {
            status: 404,
            message: format!("node {node_id} not found in {lab_path}"),
            payload: None,
        })
    }

    fn add_node(&self, _lab_path: &str, node: &NewNode) -> CapResult<Value> {
        self.enter("add_node", Some(&node.template))?;
        let id = self.nodes.lock().len() + 1;
        self.script_node(&id.to_string(), &node.template, 0);
        Ok(json!({ "id": id }))
    }

    fn delete_node(&self, _lab_path: &str, node_id: &str) -> CapResult<Value> {
        self.enter("delete_node", Some(node_id))?;
        self.nodes.lock().remove(node_id);
        Ok(Value::Null)
    }

    fn node_action(&self, _lab_path: &str, node_id: &str, action: NodeAction) -> CapResult<Value> {
        self.enter(&format!("{action}_node"), Some(node_id))?;
        Ok(Value::Null)
    }

    fn all_nodes_action(&self, lab_path: &str, action: NodeAction) -> CapResult<Value> {
        self.enter(&format!("{action}_all_nodes"), Some(lab_path))?;
        Ok(Value::Null)
    }

    fn get_node_interfaces(&self, _lab_path: &str, node_id: &str) -> CapResult<InterfacesRecord> {
        self.enter("get_node_interfaces", Some(node_id))?;
        Ok(self.interfaces.lock().get(node_id).cloned().unwrap_or_default())
    }

    fn set_node_interfaces(
        &self,
        _lab_path: &str,
        node_id: &str,
        mapping: &BTreeMap<String, u32>,
    ) -> CapResult<Value> {
        self.enter("set_node_interfaces", Some(node_id))?;
        self.interface_writes
            .lock()
            .push((node_id.to_owned(), mapping.clone()));
        Ok(Value::Null)
    }

    fn list_networks(&self, lab_path: &str) -> CapResult<BTreeMap<String, NetworkRecord>> {
        self.enter("list_networks", Some(lab_path))?;
        Ok(self.networks.lock().clone())
    }

    fn add_network(&self, _lab_path: &str, network: &NewNetwork) -> CapResult<Value> {
        self.enter("add_network", Some(&network.network_type))?;
        let id = {
            let mut next = self.next_network_id.lock();
            *next += 1;
            *next
        };
        self.script_network(&id.to_string(), &network.name);
        Ok(json!({ "id": id }))
    }

    fn delete_network(&self, _lab_path: &str, network_id: &str) -> CapResult<Value> {
        self.enter("delete_network", Some(network_id))?;
        self.networks.lock().remove(network_id);
        Ok(Value::Null)
    }

    fn list_links(&self, lab_path: &str) -> CapResult<Vec<LinkRecord>> {
        self.enter("list_links", Some(lab_path))?;
        Ok(self.links.lock().clone())
    }

    fn list_node_templates(&self) -> CapResult<Value> {
        self.enter("list_node_templates", None)?;
        Ok(json!({ "linux": "Linux", "vios": "Cisco vIOS Router" }))
    }

    fn get_node_template(&self, template: &str) -> CapResult<Value> {
        self.enter("get_node_template", Some(template))?;
        match template {
            "linux" => Ok(json!({ "type": "qemu", "description": "Linux", "ethernet": 1 })),
            other => Err(rejected(404, &format!("template {other} not found"))),
        }
    }

    fn list_network_types(&self) -> CapResult<Value> {
        self.enter("list_network_types", None)?;
        Ok(json!({ "bridge": "bridge", "pnet0": "Management(Cloud0)" }))
    }
}

/// Hands out the shared mock as every new session's handle.
pub struct MockConnector {
    pub mock: Arc<MockEveng>,
    pub connects: Mutex<usize>,
    pub last_config: Mutex<Option<EvengConfig>>,
}

impl EvengConnector for MockConnector {
    fn connect(&self, config: &EvengConfig) -> CapResult<Arc<dyn EvengApi>> {
        *self.connects.lock() += 1;
        *self.last_config.lock() = Some(config.clone());
        Ok(self.mock.clone())
    }
}

pub struct Harness {
    pub mock: Arc<MockEveng>,
    pub connector: Arc<MockConnector>,
    pub core: EveCore,
}

pub fn harness_with(folder_depth: usize, timeout: Duration) -> Harness {
    let mock = MockEveng::new();
    let connector = Arc::new(MockConnector {
        mock: mock.clone(),
        connects: Mutex::new(0),
        last_config: Mutex::new(None),
    });
    let adapter = Arc::new(CallAdapter::new(4, timeout));
    let session = Arc::new(SessionManager::new(
        EvengConfig::default(),
        connector.clone(),
        adapter,
    ));
    Harness {
        mock,
        connector,
        core: EveCore::with_session(session, folder_depth),
    }
}

pub fn harness() -> Harness {
    harness_with(1, Duration::from_secs(5))
}

pub fn rejected(status: u16, message: &str) -> CapabilityError {
    CapabilityError::Rejected {
        status,
        message: message.to_owned(),
        payload: Some(json!({ "code": status, "status": "fail", "message": message })),
    }
}
