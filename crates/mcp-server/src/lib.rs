//! `eve-mcp`: MCP tool server over [`eve_core::EveCore`].
//!
//! - [`protocol`]: JSON-RPC 2.0 and MCP payload types.
//! - [`tools`]: tool definitions and dispatch.
//! - [`resources`]: `eveng://` resources.
//! - [`server`]: transport-independent request handling.
//! - [`stdio`], [`http`]: the two transports.

pub mod http;
pub mod protocol;
pub mod resources;
pub mod server;
pub mod stdio;
pub mod tools;

pub use server::McpServer;
pub use tools::{build_tool_definitions, dispatch_tool, ToolError};
