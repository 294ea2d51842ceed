//! Async call adapter.
//!
//! Every blocking capability call goes through [`CallAdapter`]: it takes a
//! permit from the upstream semaphore, runs the call on the blocking pool,
//! bounds it with the per-call deadline, and classifies raw
//! [`CapabilityError`]s into the shared [`Error`] taxonomy. Nothing here
//! retries.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use eve_client::{CapResult, CapabilityError, EvengApi};
use eve_domain::error::{Error, Result};
use eve_domain::trace::TraceEvent;
use tokio::sync::Semaphore;

/// Name and key arguments of one upstream call, used in error messages and
/// trace events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub name: &'static str,
    pub detail: String,
}

impl Operation {
    pub fn new(name: &'static str) -> Self {
        Self { name, detail: String::new() }
    }

    /// Append a `key=value` argument.
    pub fn arg(mut self, key: &str, value: impl fmt::Display) -> Self {
        if !self.detail.is_empty() {
            self.detail.push(' ');
        }
        self.detail.push_str(&format!("{key}={value}"));
        self
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.detail.is_empty() {
            f.write_str(self.name)
        } else {
            write!(f, "{} {}", self.name, self.detail)
        }
    }
}

pub struct CallAdapter {
    permits: Arc<Semaphore>,
    timeout: Duration,
}

impl CallAdapter {
    /// `max_concurrent` of zero is treated as one.
    pub fn new(max_concurrent: usize, timeout: Duration) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Permits currently free.
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run one call against an established handle.
    pub async fn call<T, F>(&self, api: &Arc<dyn EvengApi>, op: Operation, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn EvengApi) -> CapResult<T> + Send + 'static,
    {
        let endpoint = api.endpoint();
        let api = Arc::clone(api);
        self.run(&endpoint, op, move || f(api.as_ref())).await
    }

    /// Run an arbitrary blocking capability closure.
    ///
    /// The semaphore permit moves into the blocking task, so a call that
    /// outlives its deadline keeps holding it until it actually returns.
    pub async fn run<T, F>(&self, endpoint: &str, op: Operation, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> CapResult<T> + Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| Error::Other(format!("{op}: upstream call pool closed")))?;

        let start = Instant::now();
        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            f()
        });

        let outcome = match tokio::time::timeout(self.timeout, handle).await {
            Err(_) => Err(Error::Timeout {
                operation: op.to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
            }),
            Ok(Err(join_err)) => Err(Error::Other(format!("{op}: call aborted: {join_err}"))),
            Ok(Ok(Err(raw))) => Err(classify(&op, endpoint, self.timeout, raw)),
            Ok(Ok(Ok(value))) => Ok(value),
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        TraceEvent::UpstreamCall {
            operation: op.to_string(),
            ok: outcome.is_ok(),
            duration_ms,
        }
        .emit();
        if let Err(e) = &outcome {
            tracing::debug!(operation = %op, kind = e.kind(), error = %e, "upstream call failed");
        }

        outcome
    }
}

/// Map a raw capability failure onto the error taxonomy.
pub fn classify(op: &Operation, endpoint: &str, timeout: Duration, raw: CapabilityError) -> Error {
    match raw {
        CapabilityError::Transport(message) => Error::Connection {
            endpoint: endpoint.to_owned(),
            message,
        },
        CapabilityError::Timeout => Error::Timeout {
            operation: op.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        },
        CapabilityError::LoginRejected(message) => Error::Authentication(message),
        CapabilityError::Rejected { status: 401 | 403 | 412, message, .. } => {
            Error::Authentication(format!("{op}: {message}"))
        }
        CapabilityError::Rejected { status: 404, message, .. } => {
            Error::NotFound(format!("{op}: {message}"))
        }
        CapabilityError::Rejected { status, message, payload } => Error::Api {
            operation: op.to_string(),
            status: Some(status),
            message,
            payload,
        },
        CapabilityError::Decode(message) => Error::Api {
            operation: op.to_string(),
            status: None,
            message,
            payload: None,
        },
    }
}
