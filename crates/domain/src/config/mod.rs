mod eveng;
mod observability;
mod server;

pub use eveng::*;
pub use observability::*;
pub use server::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub eveng: EvengConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Environment overrides
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

impl Config {
    /// Apply `EVENG_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Vec<ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `EVENG_*` overrides from an arbitrary lookup. Values that fail
    /// to parse are reported and leave the field unchanged.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if let Some(host) = lookup("EVENG_HOST") {
            self.eveng.host = host;
        }
        if let Some(raw) = lookup("EVENG_PORT") {
            match raw.parse::<u16>() {
                Ok(port) => self.eveng.port = port,
                Err(e) => errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "EVENG_PORT".into(),
                    message: format!("invalid port '{raw}': {e}"),
                }),
            }
        }
        if let Some(raw) = lookup("EVENG_PROTOCOL") {
            match raw.parse::<Protocol>() {
                Ok(p) => self.eveng.protocol = p,
                Err(message) => errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "EVENG_PROTOCOL".into(),
                    message,
                }),
            }
        }
        if let Some(user) = lookup("EVENG_USERNAME") {
            self.eveng.username = user;
        }
        if let Some(pass) = lookup("EVENG_PASSWORD") {
            self.eveng.password = pass;
        }

        errors
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.eveng.host.trim().is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "eveng.host".into(),
                message: "host must not be empty".into(),
            });
        }

        if self.eveng.port == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "eveng.port".into(),
                message: "port must be between 1 and 65535".into(),
            });
        }

        if self.eveng.username.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "eveng.username".into(),
                message: "username must not be empty".into(),
            });
        }

        if self.eveng.timeout_secs == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "eveng.timeout_secs".into(),
                message: "timeout must be greater than 0".into(),
            });
        }

        if let Some(var) = &self.eveng.password_env {
            if std::env::var(var).map(|v| v.is_empty()).unwrap_or(true) {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Warning,
                    field: "eveng.password_env".into(),
                    message: format!("{var} is not set, falling back to eveng.password"),
                });
            }
        }

        if self.eveng.protocol == Protocol::Https && !self.eveng.ssl_verify {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "eveng.ssl_verify".into(),
                message: "TLS certificate verification is disabled".into(),
            });
        }

        if self.limits.max_concurrent_connections == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "limits.max_concurrent_connections".into(),
                message: "must allow at least one upstream call".into(),
            });
        }

        if self.limits.folder_depth > 1 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "limits.folder_depth".into(),
                message: "walking deeper than one subfolder level issues one call per folder"
                    .into(),
            });
        }

        if self.server.transport == ServerTransport::Http && self.server.port == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "port must be greater than 0".into(),
            });
        }

        if !(0.0..=1.0).contains(&self.observability.sample_rate) {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "observability.sample_rate".into(),
                message: "sample_rate must be within 0.0..=1.0".into(),
            });
        }

        errors
    }

    /// `true` if `validate()` reports no errors (warnings are allowed).
    pub fn is_valid(&self) -> bool {
        self.validate()
            .iter()
            .all(|e| e.severity != ConfigSeverity::Error)
    }
}
