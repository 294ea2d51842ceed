//! `eve-gateway`: the `eveng-mcp` binary's command line, config loading
//! and tracing setup.

pub mod cli;
pub mod telemetry;
