//! Session manager: the single owner of the upstream session.
//!
//! State machine: `Disconnected -> Connecting -> Connected -> Disconnected`.
//! Transitions run under a `tokio::sync::Mutex` guard held for their full
//! duration, so at most one connect or disconnect is in flight. The state
//! and the capability handle live together behind a `parking_lot::RwLock`
//! that is only written while the guard is held; readers such as
//! [`SessionManager::is_connected`] never wait on an in-flight transition.

use std::fmt;
use std::sync::Arc;

use eve_client::{CapResult, EvengApi, EvengConnector};
use eve_domain::config::EvengConfig;
use eve_domain::error::{Error, Result};
use eve_domain::trace::TraceEvent;
use parking_lot::RwLock;
use serde_json::json;

use crate::adapter::{CallAdapter, Operation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of the session, for status reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub endpoint: String,
    pub username: String,
}

impl SessionSnapshot {
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "state": self.state.as_str(),
            "connected": self.state == SessionState::Connected,
            "endpoint": self.endpoint,
            "username": self.username,
        })
    }
}

/// Handle is `Some` iff state is `Connected`.
struct Slot {
    state: SessionState,
    handle: Option<Arc<dyn EvengApi>>,
    /// Completed connect attempts, successful or not.
    attempts: u64,
    /// Error of the most recent attempt, `None` after a success.
    last_failure: Option<Error>,
}

pub struct SessionManager {
    config: RwLock<EvengConfig>,
    connector: Arc<dyn EvengConnector>,
    adapter: Arc<CallAdapter>,
    transition: tokio::sync::Mutex<()>,
    slot: RwLock<Slot>,
}

impl SessionManager {
    pub fn new(
        config: EvengConfig,
        connector: Arc<dyn EvengConnector>,
        adapter: Arc<CallAdapter>,
    ) -> Self {
        Self {
            config: RwLock::new(config),
            connector,
            adapter,
            transition: tokio::sync::Mutex::new(()),
            slot: RwLock::new(Slot {
                state: SessionState::Disconnected,
                handle: None,
                attempts: 0,
                last_failure: None,
            }),
        }
    }

    pub fn adapter(&self) -> &Arc<CallAdapter> {
        &self.adapter
    }

    pub fn state(&self) -> SessionState {
        self.slot.read().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    pub fn endpoint(&self) -> String {
        self.config.read().base_url()
    }

    /// Current endpoint settings.
    pub fn config(&self) -> EvengConfig {
        self.config.read().clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let cfg = self.config.read();
        SessionSnapshot {
            state: self.state(),
            endpoint: cfg.base_url(),
            username: cfg.username.clone(),
        }
    }

    fn current_handle(&self) -> Option<Arc<dyn EvengApi>> {
        self.slot.read().handle.clone()
    }

    /// Write state and handle together. Callers hold the transition guard.
    fn set(&self, state: SessionState, handle: Option<Arc<dyn EvengApi>>) {
        let from = {
            let mut slot = self.slot.write();
            let from = slot.state;
            slot.state = state;
            slot.handle = handle;
            from
        };
        if from != state {
            tracing::info!(endpoint = %self.endpoint(), %from, to = %state, "session transition");
            TraceEvent::SessionTransition {
                endpoint: self.endpoint(),
                from: from.to_string(),
                to: state.to_string(),
            }
            .emit();
        }
    }

    // ── transitions ──────────────────────────────────────────────────

    /// Authenticate if not already connected. Calling it twice
    /// authenticates once.
    pub async fn connect(&self) -> Result<()> {
        self.ensure_connected().await.map(|_| ())
    }

    /// Return the live handle, authenticating first when needed.
    ///
    /// Callers that queued behind an attempt share its outcome: if it
    /// failed they get the same error and no second login is made.
    pub async fn ensure_connected(&self) -> Result<Arc<dyn EvengApi>> {
        let seen = {
            let slot = self.slot.read();
            if let Some(handle) = &slot.handle {
                return Ok(Arc::clone(handle));
            }
            slot.attempts
        };

        let _guard = self.transition.lock().await;
        {
            let slot = self.slot.read();
            if let Some(handle) = &slot.handle {
                return Ok(Arc::clone(handle));
            }
            if slot.attempts != seen {
                if let Some(err) = &slot.last_failure {
                    return Err(err.clone());
                }
            }
        }

        self.set(SessionState::Connecting, None);

        let config = self.config.read().clone();
        let endpoint = config.base_url();
        let connector = Arc::clone(&self.connector);
        let op = Operation::new("login").arg("user", &config.username);

        let result = self
            .adapter
            .run(&endpoint, op, move || -> CapResult<Arc<dyn EvengApi>> {
                let api = connector.connect(&config)?;
                api.login()?;
                Ok(api)
            })
            .await;

        {
            let mut slot = self.slot.write();
            slot.attempts += 1;
            slot.last_failure = result.as_ref().err().cloned();
        }
        match result {
            Ok(api) => {
                self.set(SessionState::Connected, Some(Arc::clone(&api)));
                Ok(api)
            }
            Err(e) => {
                tracing::warn!(endpoint = %endpoint, error = %e, "connect failed");
                self.set(SessionState::Disconnected, None);
                Err(e)
            }
        }
    }

    /// Log out (best effort) and drop the handle. No-op when disconnected.
    pub async fn disconnect(&self) -> Result<()> {
        if self.state() == SessionState::Disconnected {
            return Ok(());
        }
        let _guard = self.transition.lock().await;
        self.close_locked().await;
        Ok(())
    }

    /// Point the session at a different endpoint or credentials. Any live
    /// session is logged out first; the next connect uses the new settings.
    pub async fn reconfigure(&self, config: EvengConfig) {
        let _guard = self.transition.lock().await;
        self.close_locked().await;
        *self.config.write() = config;
    }

    async fn close_locked(&self) {
        let Some(api) = self.current_handle() else {
            self.set(SessionState::Disconnected, None);
            return;
        };
        let endpoint = api.endpoint();
        // Clear first so the last handle reference drops inside the
        // blocking logout task.
        self.set(SessionState::Disconnected, None);
        let op = Operation::new("logout");
        if let Err(e) = self.adapter.run(&endpoint, op, move || api.logout()).await {
            tracing::warn!(endpoint = %endpoint, error = %e, "logout failed, session dropped anyway");
        }
    }

    /// Drop `handle` if it is still the current one, so the next call
    /// re-authenticates. Used when a data call reports an expired session.
    pub async fn invalidate(&self, handle: &Arc<dyn EvengApi>) {
        let _guard = self.transition.lock().await;
        let is_current = self
            .current_handle()
            .is_some_and(|cur| std::ptr::addr_eq(Arc::as_ptr(&cur), Arc::as_ptr(handle)));
        if is_current {
            tracing::info!(endpoint = %handle.endpoint(), "upstream session expired, dropping handle");
            self.set(SessionState::Disconnected, None);
        }
    }

    // ── data calls ───────────────────────────────────────────────────

    /// Connect if needed, then run one capability call.
    ///
    /// An authentication failure on the call invalidates the handle it ran
    /// on; the error is still returned, never retried.
    pub async fn call<T, F>(&self, op: Operation, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn EvengApi) -> CapResult<T> + Send + 'static,
    {
        let api = self.ensure_connected().await?;
        let result = self.adapter.call(&api, op, f).await;
        if let Err(Error::Authentication(_)) = &result {
            self.invalidate(&api).await;
        }
        result
    }
}
