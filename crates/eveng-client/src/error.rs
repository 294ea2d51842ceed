use serde_json::Value;

/// Raw failure reported by a capability call, before classification.
#[derive(thiserror::Error, Debug, Clone)]
pub enum CapabilityError {
    /// The request never produced an HTTP response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The HTTP client gave up waiting.
    #[error("request timed out")]
    Timeout,

    /// The login endpoint refused the credentials.
    #[error("login rejected: {0}")]
    LoginRejected(String),

    /// The server answered with a non-success envelope or HTTP status.
    #[error("rejected with status {status}: {message}")]
    Rejected {
        status: u16,
        message: String,
        payload: Option<Value>,
    },

    /// The response body could not be decoded.
    #[error("undecodable response: {0}")]
    Decode(String),
}

pub type CapResult<T> = std::result::Result<T, CapabilityError>;

/// Convert a `reqwest` error into a raw capability failure.
pub fn from_reqwest(e: reqwest::Error) -> CapabilityError {
    if e.is_timeout() {
        CapabilityError::Timeout
    } else if e.is_decode() {
        CapabilityError::Decode(e.to_string())
    } else {
        CapabilityError::Transport(e.to_string())
    }
}
