//! Node lifecycle state decoding.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of an emulated node, decoded from the platform's
/// integer status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "code")]
pub enum NodeStatus {
    Stopped,
    Starting,
    Running,
    Stopping,
    Unknown(i64),
}

impl NodeStatus {
    /// Decode an upstream status code. Total: unmapped codes become
    /// [`NodeStatus::Unknown`].
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => NodeStatus::Stopped,
            1 => NodeStatus::Starting,
            2 => NodeStatus::Running,
            3 => NodeStatus::Stopping,
            other => NodeStatus::Unknown(other),
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, NodeStatus::Running)
    }
}

impl From<i64> for NodeStatus {
    fn from(code: i64) -> Self {
        Self::from_code(code)
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeStatus::Stopped => f.write_str("Stopped"),
            NodeStatus::Starting => f.write_str("Starting"),
            NodeStatus::Running => f.write_str("Running"),
            NodeStatus::Stopping => f.write_str("Stopping"),
            NodeStatus::Unknown(code) => write!(f, "Unknown ({code})"),
        }
    }
}
