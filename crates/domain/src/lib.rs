//! `eve-domain`: shared types for the EVE-NG tool server.
//!
//! - [`error`]: the upstream failure taxonomy every crate speaks.
//! - [`config`]: TOML configuration with `EVENG_*` environment overrides.
//! - [`status`]: node lifecycle decoding.
//! - [`lab`]: request-scoped views (inventory, topology, mutations).
//! - [`tool`], [`trace`]: tool definitions and structured trace events.

pub mod config;
pub mod error;
pub mod lab;
pub mod status;
pub mod tool;
pub mod trace;

pub use error::{Error, Result};
pub use status::NodeStatus;
