use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use eve_client::HttpConnector;
use eve_core::EveCore;
use eve_domain::config::{ConfigSeverity, ServerTransport};
use eve_gateway::cli::{self, Cli, Command, ConfigCommand, LoadedConfig};
use eve_gateway::telemetry;
use eve_mcp::McpServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        // Default to serve when no subcommand is given.
        None => serve(None).await,
        Some(Command::Serve { transport }) => serve(transport).await,
        Some(Command::Check) => {
            telemetry::init_cli_tracing();
            let loaded = cli::load_config()?;
            if !cli::check::run(&loaded).await? {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let loaded = cli::load_config()?;
            if !cli::config::validate(&loaded) {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let loaded = cli::load_config()?;
            cli::config::show(&loaded.config)
        }
        Some(Command::Version) => {
            println!("eveng-mcp {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn parse_transport(raw: &str) -> anyhow::Result<ServerTransport> {
    match raw.to_ascii_lowercase().as_str() {
        "stdio" => Ok(ServerTransport::Stdio),
        "http" => Ok(ServerTransport::Http),
        other => anyhow::bail!("unknown transport '{other}' (expected stdio or http)"),
    }
}

async fn serve(transport_override: Option<String>) -> anyhow::Result<()> {
    let LoadedConfig { config, path, override_errors } = cli::load_config()?;
    let tracer_provider = telemetry::init_tracing(&config.observability);

    let mut issues = override_errors;
    issues.extend(config.validate());
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Error => tracing::error!(field = %issue.field, "{}", issue.message),
            ConfigSeverity::Warning => tracing::warn!(field = %issue.field, "{}", issue.message),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!("invalid configuration in {path}");
    }

    let transport = match transport_override.as_deref() {
        Some(raw) => parse_transport(raw)?,
        None => config.server.transport,
    };

    tracing::info!(
        config = %path,
        endpoint = %config.eveng.base_url(),
        transport = ?transport,
        "eveng-mcp starting"
    );

    let core = Arc::new(EveCore::new(&config, Arc::new(HttpConnector)));
    let server = McpServer::new(core.clone());

    let served = match transport {
        ServerTransport::Stdio => eve_mcp::stdio::serve_stdio(server)
            .await
            .context("stdio transport"),
        ServerTransport::Http => eve_mcp::http::serve_http(server, &config.server)
            .await
            .context("HTTP transport"),
    };

    if core.is_connected() {
        if let Err(e) = core.disconnect().await {
            tracing::warn!(error = %e, "logout on shutdown failed");
        }
    }
    tracing::info!("shutdown complete");
    telemetry::shutdown(tracer_provider);

    served
}
