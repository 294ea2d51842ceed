//! `eve-core`: session and aggregation layer over an EVE-NG server.
//!
//! [`EveCore`] is the facade the tool server talks to. It owns one
//! [`SessionManager`] (and through it the [`CallAdapter`]) and exposes the
//! folder walk, the topology aggregation and the pass-through lab
//! operations as plain async methods returning `eve_domain` views. No
//! wire type from `eve-client` crosses this boundary.
//!
//! There is no process-global session: build an `EveCore` (or several)
//! and share it behind an `Arc`.

pub mod adapter;
pub mod inventory;
pub mod ops;
pub mod session;
pub mod topology;
pub mod views;

use std::sync::Arc;

use eve_client::EvengConnector;
use eve_domain::config::{Config, EvengConfig};
use eve_domain::error::Result;
use eve_domain::lab::{ConnectionView, LabInventory, LabTopology};

pub use adapter::{CallAdapter, Operation};
pub use session::{SessionManager, SessionSnapshot, SessionState};

pub struct EveCore {
    session: Arc<SessionManager>,
    folder_depth: usize,
}

impl EveCore {
    pub fn new(config: &Config, connector: Arc<dyn EvengConnector>) -> Self {
        let adapter = Arc::new(CallAdapter::new(
            config.limits.max_concurrent_connections,
            config.eveng.timeout(),
        ));
        let session = Arc::new(SessionManager::new(config.eveng.clone(), connector, adapter));
        Self::with_session(session, config.limits.folder_depth)
    }

    pub fn with_session(session: Arc<SessionManager>, folder_depth: usize) -> Self {
        Self { session, folder_depth }
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    // ── session ──────────────────────────────────────────────────────

    pub async fn connect(&self) -> Result<()> {
        self.session.connect().await
    }

    /// Replace the endpoint settings and connect with them.
    pub async fn connect_to(&self, config: EvengConfig) -> Result<()> {
        self.session.reconfigure(config).await;
        self.session.connect().await
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.session.disconnect().await
    }

    pub async fn ensure_connected(&self) -> Result<()> {
        self.session.ensure_connected().await.map(|_| ())
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    // ── aggregation ──────────────────────────────────────────────────

    /// Flattened lab inventory below `root_path`.
    pub async fn list_labs(&self, root_path: &str) -> Result<LabInventory> {
        inventory::list_labs(&self.session, root_path, self.folder_depth).await
    }

    /// Metadata, nodes with resolved interfaces, networks and connections.
    pub async fn get_lab_details(&self, lab_path: &str) -> Result<LabTopology> {
        topology::lab_details(&self.session, &ops::normalize_lab_path(lab_path)?).await
    }

    /// Connections only.
    pub async fn get_lab_topology(&self, lab_path: &str) -> Result<Vec<ConnectionView>> {
        topology::lab_connections(&self.session, &ops::normalize_lab_path(lab_path)?).await
    }
}
