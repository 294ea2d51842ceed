mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{harness, harness_with, rejected};
use eve_client::CapabilityError;
use eve_core::SessionState;
use eve_domain::config::EvengConfig;

#[tokio::test]
async fn connect_twice_authenticates_once() {
    let h = harness();
    h.core.connect().await.unwrap();
    h.core.connect().await.unwrap();

    assert!(h.core.is_connected());
    assert_eq!(h.mock.calls("login"), 1);
    assert_eq!(*h.connector.connects.lock(), 1);
}

#[tokio::test]
async fn concurrent_connects_share_one_login() {
    let h = Arc::new(harness());
    *h.mock.delay.lock() = Some(Duration::from_millis(20));

    let tasks: Vec<_> = (0..5)
        .map(|_| {
            let h = Arc::clone(&h);
            tokio::spawn(async move { h.core.connect().await })
        })
        .collect();
    for t in tasks {
        t.await.unwrap().unwrap();
    }
    assert_eq!(h.mock.calls("login"), 1);
}

#[tokio::test]
async fn ensure_connected_after_disconnect_reauthenticates() {
    let h = harness();
    h.core.connect().await.unwrap();
    h.core.disconnect().await.unwrap();

    assert!(!h.core.is_connected());
    assert_eq!(h.mock.calls("logout"), 1);

    h.core.ensure_connected().await.unwrap();
    assert!(h.core.is_connected());
    assert_eq!(h.mock.calls("login"), 2);
}

#[tokio::test]
async fn disconnect_when_disconnected_is_noop() {
    let h = harness();
    h.core.disconnect().await.unwrap();
    assert_eq!(h.mock.calls("logout"), 0);
    assert_eq!(h.core.session().state(), SessionState::Disconnected);
}

#[tokio::test]
async fn failed_logout_still_disconnects() {
    let h = harness();
    h.core.connect().await.unwrap();
    h.mock.fail("logout", CapabilityError::Transport("connection reset".into()));

    h.core.disconnect().await.unwrap();
    assert!(!h.core.is_connected());
}

#[tokio::test]
async fn rejected_login_surfaces_authentication_failure() {
    let h = harness();
    h.mock.fail("login", CapabilityError::LoginRejected("Invalid username/password".into()));

    let err = h.core.connect().await.unwrap_err();
    assert_eq!(err.kind(), "authentication_failure");
    assert_eq!(h.core.session().state(), SessionState::Disconnected);

    // No retry happened, and the next attempt tries again.
    assert_eq!(h.mock.calls("login"), 1);
    h.mock.clear_failure("login");
    h.core.connect().await.unwrap();
    assert_eq!(h.mock.calls("login"), 2);
}

#[tokio::test]
async fn unreachable_endpoint_is_connection_failure() {
    let h = harness();
    h.mock.fail("login", CapabilityError::Transport("connection refused".into()));
    let err = h.core.connect().await.unwrap_err();
    assert_eq!(err.kind(), "connection_failure");
    assert!(!h.core.is_connected());
}

#[tokio::test]
async fn slow_login_times_out_and_stays_disconnected() {
    let h = harness_with(1, Duration::from_millis(30));
    *h.mock.delay.lock() = Some(Duration::from_millis(150));

    let err = h.core.connect().await.unwrap_err();
    assert_eq!(err.kind(), "timeout");
    assert_eq!(h.core.session().state(), SessionState::Disconnected);
}

#[tokio::test]
async fn expired_session_is_dropped_and_reestablished() {
    let h = harness();
    h.core.connect().await.unwrap();

    h.mock.fail("status", rejected(412, "User is not authenticated or session timed out"));
    let err = h.core.server_status().await.unwrap_err();
    assert!(err.is_authentication());
    assert!(!h.core.is_connected());

    h.mock.clear_failure("status");
    h.core.server_status().await.unwrap();
    assert_eq!(h.mock.calls("login"), 2);
    // The failing call itself was not retried.
    assert_eq!(h.mock.calls("status"), 2);
}

#[tokio::test]
async fn reconfigure_switches_endpoint() {
    let h = harness();
    h.core.connect().await.unwrap();

    let cfg = EvengConfig {
        host: "10.1.1.1".into(),
        username: "ops".into(),
        ..EvengConfig::default()
    };
    h.core.connect_to(cfg).await.unwrap();

    assert_eq!(h.mock.calls("logout"), 1);
    assert_eq!(h.mock.calls("login"), 2);
    let snap = h.core.snapshot();
    assert_eq!(snap.endpoint, "http://10.1.1.1:80");
    assert_eq!(snap.username, "ops");
    let last = h.connector.last_config.lock().clone().unwrap();
    assert_eq!(last.host, "10.1.1.1");
}

#[tokio::test]
async fn data_calls_connect_lazily() {
    let h = harness();
    assert!(!h.core.is_connected());
    h.core.list_node_templates().await.unwrap();
    assert!(h.core.is_connected());
    assert_eq!(h.mock.calls("login"), 1);
}
