use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// EVE-NG endpoint
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Connection settings for the upstream EVE-NG server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvengConfig {
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default = "d_port")]
    pub port: u16,
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(default = "d_username")]
    pub username: String,
    /// Literal password. Ignored when `password_env` names a set variable.
    #[serde(default = "d_password")]
    pub password: String,
    /// Environment variable to read the password from.
    #[serde(default)]
    pub password_env: Option<String>,
    /// Verify TLS certificates (EVE-NG ships self-signed ones).
    #[serde(default)]
    pub ssl_verify: bool,
    /// Per-call deadline, applied both to the HTTP client and to each
    /// adapted call.
    #[serde(default = "d_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EvengConfig {
    fn default() -> Self {
        Self {
            host: d_host(),
            port: d_port(),
            protocol: Protocol::default(),
            username: d_username(),
            password: d_password(),
            password_env: None,
            ssl_verify: false,
            timeout_secs: d_timeout_secs(),
        }
    }
}

impl EvengConfig {
    /// `protocol://host:port`, the prefix of every API URL.
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.host, self.port)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Resolve the credentials, preferring `password_env` when it is set.
    pub fn credentials(&self) -> Credentials {
        let password = self
            .password_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| self.password.clone());
        Credentials {
            username: self.username.clone(),
            password,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Http,
    Https,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Http => f.write_str("http"),
            Protocol::Https => f.write_str("https"),
        }
    }
}

impl std::str::FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(Protocol::Http),
            "https" => Ok(Protocol::Https),
            other => Err(format!("protocol must be http or https, got '{other}'")),
        }
    }
}

/// Username/password pair sent on login.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Upstream limits
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Upper bound on blocking upstream calls in flight at once.
    #[serde(default = "d_max_concurrent")]
    pub max_concurrent_connections: usize,
    /// How many folder levels below `/` the lab walk descends.
    /// `1` lists the root and each first-level subfolder.
    #[serde(default = "d_folder_depth")]
    pub folder_depth: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_concurrent_connections: d_max_concurrent(),
            folder_depth: d_folder_depth(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_host() -> String {
    "eve.local".into()
}

fn d_port() -> u16 {
    80
}

fn d_username() -> String {
    "admin".into()
}

fn d_password() -> String {
    "eve".into()
}

fn d_timeout_secs() -> u64 {
    30
}

fn d_max_concurrent() -> usize {
    10
}

fn d_folder_depth() -> usize {
    1
}
