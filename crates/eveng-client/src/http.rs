//! Blocking REST implementation of [`EvengApi`].
//!
//! `HttpEvengClient` wraps a `reqwest::blocking::Client` with a cookie
//! store, so the session cookie set by `login` rides along on every later
//! call. It must be built and used from a blocking context; the core only
//! touches it from inside `spawn_blocking`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use eve_domain::config::{Credentials, EvengConfig};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::{Method, Url};
use serde_json::{json, Value};

use crate::api::{EvengApi, EvengConnector, NewLab, NewNetwork, NewNode, NodeAction};
use crate::error::{from_reqwest, CapResult, CapabilityError};
use crate::wire::{
    decode_data, decode_envelope, decode_list, decode_map, FolderListing, InterfacesRecord,
    LabRecord, LinkRecord, NetworkRecord, NodeRecord,
};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct HttpEvengClient {
    http: Client,
    base: Url,
    credentials: Credentials,
}

impl std::fmt::Debug for HttpEvengClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEvengClient")
            .field("base", &self.base.as_str())
            .field("credentials", &self.credentials)
            .finish()
    }
}

impl HttpEvengClient {
    /// Build a client for the configured endpoint. Does not authenticate.
    pub fn new(cfg: &EvengConfig) -> CapResult<Self> {
        let base = Url::parse(&cfg.base_url())
            .map_err(|e| CapabilityError::Transport(format!("invalid endpoint: {e}")))?;
        let http = Client::builder()
            .cookie_store(true)
            .danger_accept_invalid_certs(!cfg.ssl_verify)
            .timeout(cfg.timeout())
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            http,
            base,
            credentials: cfg.credentials(),
        })
    }

    // ── request helpers ──────────────────────────────────────────────

    /// Build `/api/<segments...>` with every segment percent-encoded.
    /// Lab and folder paths are split on `/` so each component is encoded
    /// on its own.
    fn url<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> CapResult<Url> {
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| CapabilityError::Transport("endpoint cannot be a base URL".into()))?;
            path.clear().push("api");
            for seg in segments {
                path.extend(seg.split('/').filter(|s| !s.is_empty()));
            }
        }
        Ok(url)
    }

    fn lab_url<'a>(&self, lab_path: &'a str, rest: &[&'a str]) -> CapResult<Url> {
        self.url(std::iter::once("labs").chain(std::iter::once(lab_path)).chain(rest.iter().copied()))
    }

    /// Send a request and unwrap the envelope.
    fn execute(&self, endpoint: &str, rb: RequestBuilder) -> CapResult<Value> {
        let start = Instant::now();
        let result = rb.send();
        let duration_ms = start.elapsed().as_millis() as u64;

        let resp = match result {
            Ok(resp) => resp,
            Err(e) => {
                tracing::debug!(endpoint, duration_ms, error = %e, "eve-ng request failed");
                return Err(from_reqwest(e));
            }
        };

        let status = resp.status().as_u16();
        tracing::debug!(endpoint, status, duration_ms, "eve-ng response");
        let body = resp.text().map_err(from_reqwest)?;
        decode_envelope(status, &body)
    }

    fn send(&self, method: Method, endpoint: &str, url: Url, body: Option<Value>) -> CapResult<Value> {
        let mut rb = self.http.request(method, url);
        if let Some(body) = body {
            rb = rb.json(&body);
        }
        self.execute(endpoint, rb)
    }

    fn get(&self, endpoint: &str, url: Url) -> CapResult<Value> {
        self.send(Method::GET, endpoint, url, None)
    }
}

fn to_body<T: serde::Serialize>(value: &T) -> CapResult<Value> {
    serde_json::to_value(value).map_err(|e| CapabilityError::Decode(e.to_string()))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

impl EvengApi for HttpEvengClient {
    fn endpoint(&self) -> String {
        self.base.as_str().trim_end_matches('/').to_owned()
    }

    fn login(&self) -> CapResult<()> {
        let url = self.url(["auth", "login"])?;
        let body = json!({
            "username": self.credentials.username,
            "password": self.credentials.password,
            "html5": "-1",
        });
        match self.send(Method::POST, "POST /api/auth/login", url, Some(body)) {
            Ok(_) => Ok(()),
            Err(CapabilityError::Rejected { status, message, .. }) => {
                Err(CapabilityError::LoginRejected(format!("{message} (HTTP {status})")))
            }
            Err(e) => Err(e),
        }
    }

    fn logout(&self) -> CapResult<()> {
        let url = self.url(["auth", "logout"])?;
        self.get("GET /api/auth/logout", url).map(|_| ())
    }

    fn status(&self) -> CapResult<Value> {
        let url = self.url(["status"])?;
        self.get("GET /api/status", url)
    }

    fn list_folder(&self, path: &str) -> CapResult<FolderListing> {
        let mut url = self.url(["folders", path])?;
        // The folder endpoint wants a trailing slash on the root.
        if path.trim_matches('/').is_empty() {
            url.set_path("/api/folders/");
        }
        decode_data(self.get("GET /api/folders", url)?)
    }

    fn get_lab(&self, lab_path: &str) -> CapResult<LabRecord> {
        let url = self.lab_url(lab_path, &[])?;
        decode_data(self.get("GET /api/labs/{lab}", url)?)
    }

    fn create_lab(&self, lab: &NewLab) -> CapResult<Value> {
        let url = self.url(["labs"])?;
        self.send(Method::POST, "POST /api/labs", url, Some(to_body(lab)?))
    }

    fn delete_lab(&self, lab_path: &str) -> CapResult<Value> {
        let url = self.lab_url(lab_path, &[])?;
        self.send(Method::DELETE, "DELETE /api/labs/{lab}", url, None)
    }

    fn list_nodes(&self, lab_path: &str) -> CapResult<BTreeMap<String, NodeRecord>> {
        let url = self.lab_url(lab_path, &["nodes"])?;
        decode_map(self.get("GET /api/labs/{lab}/nodes", url)?)
    }

    fn get_node(&self, lab_path: &str, node_id: &str) -> CapResult<NodeRecord> {
        let url = self.lab_url(lab_path, &["nodes", node_id])?;
        decode_data(self.get("GET /api/labs/{lab}/nodes/{id}", url)?)
    }

    fn add_node(&self, lab_path: &str, node: &NewNode) -> CapResult<Value> {
        let url = self.lab_url(lab_path, &["nodes"])?;
        self.send(Method::POST, "POST /api/labs/{lab}/nodes", url, Some(to_body(node)?))
    }

    fn delete_node(&self, lab_path: &str, node_id: &str) -> CapResult<Value> {
        let url = self.lab_url(lab_path, &["nodes", node_id])?;
        self.send(Method::DELETE, "DELETE /api/labs/{lab}/nodes/{id}", url, None)
    }

    fn node_action(&self, lab_path: &str, node_id: &str, action: NodeAction) -> CapResult<Value> {
        let url = self.lab_url(lab_path, &["nodes", node_id, action.as_str()])?;
        self.get("GET /api/labs/{lab}/nodes/{id}/{action}", url)
    }

    fn all_nodes_action(&self, lab_path: &str, action: NodeAction) -> CapResult<Value> {
        let url = self.lab_url(lab_path, &["nodes", action.as_str()])?;
        self.get("GET /api/labs/{lab}/nodes/{action}", url)
    }

    fn get_node_interfaces(&self, lab_path: &str, node_id: &str) -> CapResult<InterfacesRecord> {
        let url = self.lab_url(lab_path, &["nodes", node_id, "interfaces"])?;
        decode_data(self.get("GET /api/labs/{lab}/nodes/{id}/interfaces", url)?)
    }

    fn set_node_interfaces(
        &self,
        lab_path: &str,
        node_id: &str,
        mapping: &BTreeMap<String, u32>,
    ) -> CapResult<Value> {
        let url = self.lab_url(lab_path, &["nodes", node_id, "interfaces"])?;
        self.send(
            Method::PUT,
            "PUT /api/labs/{lab}/nodes/{id}/interfaces",
            url,
            Some(to_body(mapping)?),
        )
    }

    fn list_networks(&self, lab_path: &str) -> CapResult<BTreeMap<String, NetworkRecord>> {
        let url = self.lab_url(lab_path, &["networks"])?;
        decode_map(self.get("GET /api/labs/{lab}/networks", url)?)
    }

    fn add_network(&self, lab_path: &str, network: &NewNetwork) -> CapResult<Value> {
        let url = self.lab_url(lab_path, &["networks"])?;
        self.send(Method::POST, "POST /api/labs/{lab}/networks", url, Some(to_body(network)?))
    }

    fn delete_network(&self, lab_path: &str, network_id: &str) -> CapResult<Value> {
        let url = self.lab_url(lab_path, &["networks", network_id])?;
        self.send(Method::DELETE, "DELETE /api/labs/{lab}/networks/{id}", url, None)
    }

    fn list_links(&self, lab_path: &str) -> CapResult<Vec<LinkRecord>> {
        let url = self.lab_url(lab_path, &["topology"])?;
        decode_list(self.get("GET /api/labs/{lab}/topology", url)?)
    }

    fn list_node_templates(&self) -> CapResult<Value> {
        let mut url = self.url(["list", "templates"])?;
        url.set_path("/api/list/templates/");
        self.get("GET /api/list/templates/", url)
    }

    fn get_node_template(&self, template: &str) -> CapResult<Value> {
        let url = self.url(["list", "templates", template])?;
        self.get("GET /api/list/templates/{name}", url)
    }

    fn list_network_types(&self) -> CapResult<Value> {
        let url = self.url(["list", "networks"])?;
        self.get("GET /api/list/networks", url)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Connector
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Builds a fresh [`HttpEvengClient`] (and cookie jar) per session.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpConnector;

impl EvengConnector for HttpConnector {
    fn connect(&self, config: &EvengConfig) -> CapResult<Arc<dyn EvengApi>> {
        Ok(Arc::new(HttpEvengClient::new(config)?))
    }
}
