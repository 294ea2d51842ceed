use serde_json::Value;

/// Shared error type used across all eve crates.
///
/// The first five variants are the upstream failure taxonomy. Only the call
/// adapter in `eve-core` produces them from raw capability failures; every
/// layer above either propagates them unchanged or downgrades them to a
/// recorded warning.
#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    /// The endpoint could not be reached at the transport level.
    #[error("connection to {endpoint} failed: {message}")]
    Connection { endpoint: String, message: String },

    /// Credentials were rejected, or the upstream session is no longer valid.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The endpoint answered but rejected the operation.
    #[error("{operation} failed{}: {message}", fmt_status(.status))]
    Api {
        operation: String,
        status: Option<u16>,
        message: String,
        payload: Option<Value>,
    },

    /// A requested lab, node, network or folder does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A call exceeded its configured deadline.
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

fn fmt_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (HTTP {code})"),
        None => String::new(),
    }
}

impl Error {
    /// Short machine-readable name of the taxonomy bucket.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Connection { .. } => "connection_failure",
            Error::Authentication(_) => "authentication_failure",
            Error::Api { .. } => "api_failure",
            Error::NotFound(_) => "not_found",
            Error::Timeout { .. } => "timeout",
            Error::Config(_) => "config",
            Error::Other(_) => "other",
        }
    }

    pub fn is_authentication(&self) -> bool {
        matches!(self, Error::Authentication(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
