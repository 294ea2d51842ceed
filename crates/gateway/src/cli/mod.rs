pub mod check;
pub mod config;

use std::path::Path;

use anyhow::Context;
use clap::{Parser, Subcommand};

use eve_domain::config::{Config, ConfigError};

/// eveng-mcp: MCP tool server for EVE-NG network emulation labs.
#[derive(Debug, Parser)]
#[command(name = "eveng-mcp", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the tool server (default when no subcommand is given).
    Serve {
        /// Override `[server] transport` (stdio or http).
        #[arg(long)]
        transport: Option<String>,
    },
    /// Validate the config and try to reach the EVE-NG server.
    Check,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Resolved configuration plus where it came from.
pub struct LoadedConfig {
    pub config: Config,
    pub path: String,
    /// Environment overrides that could not be applied.
    pub override_errors: Vec<ConfigError>,
}

/// Load the configuration from the path in `EVENG_MCP_CONFIG` (or
/// `config.toml` by default) and apply `EVENG_*` overrides.
///
/// A missing file is not an error: defaults are used.
pub fn load_config() -> anyhow::Result<LoadedConfig> {
    let path = std::env::var("EVENG_MCP_CONFIG").unwrap_or_else(|_| "config.toml".into());
    load_config_from(&path, |key| std::env::var(key).ok())
}

pub fn load_config_from(
    path: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<LoadedConfig> {
    let mut config = if Path::new(path).exists() {
        let raw = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
        toml::from_str(&raw).with_context(|| format!("parsing {path}"))?
    } else {
        Config::default()
    };
    let override_errors = config.apply_overrides(lookup);

    Ok(LoadedConfig {
        config,
        path: path.to_owned(),
        override_errors,
    })
}
