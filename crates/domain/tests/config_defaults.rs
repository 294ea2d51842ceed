use std::collections::HashMap;

use eve_domain::config::{Config, ConfigSeverity, Protocol};

#[test]
fn default_endpoint_matches_stock_eveng() {
    let config = Config::default();
    assert_eq!(config.eveng.host, "eve.local");
    assert_eq!(config.eveng.port, 80);
    assert_eq!(config.eveng.protocol, Protocol::Http);
    assert_eq!(config.eveng.base_url(), "http://eve.local:80");
    assert!(!config.eveng.ssl_verify);
    assert_eq!(config.eveng.timeout_secs, 30);
}

#[test]
fn default_limits() {
    let config = Config::default();
    assert_eq!(config.limits.max_concurrent_connections, 10);
    assert_eq!(config.limits.folder_depth, 1);
}

#[test]
fn default_config_is_valid() {
    let config = Config::default();
    assert!(config.validate().is_empty());
    assert!(config.is_valid());
}

#[test]
fn full_toml_parses() {
    let toml_str = r#"
[eveng]
host = "10.0.0.5"
port = 443
protocol = "https"
username = "ops"
password = "secret"
ssl_verify = true
timeout_secs = 10

[limits]
max_concurrent_connections = 4

[server]
transport = "http"
port = 9000
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.eveng.base_url(), "https://10.0.0.5:443");
    assert_eq!(config.eveng.credentials().username, "ops");
    assert_eq!(config.limits.max_concurrent_connections, 4);
    assert_eq!(config.limits.folder_depth, 1);
    assert_eq!(config.server.port, 9000);
}

#[test]
fn invalid_protocol_fails_to_parse() {
    let toml_str = r#"
[eveng]
protocol = "ftp"
"#;
    assert!(toml::from_str::<Config>(toml_str).is_err());
}

#[test]
fn validate_flags_zero_port_and_zero_concurrency() {
    let mut config = Config::default();
    config.eveng.port = 0;
    config.limits.max_concurrent_connections = 0;
    let errors = config.validate();
    let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
    assert!(fields.contains(&"eveng.port"));
    assert!(fields.contains(&"limits.max_concurrent_connections"));
    assert!(!config.is_valid());
}

#[test]
fn https_without_verification_is_a_warning() {
    let mut config = Config::default();
    config.eveng.protocol = Protocol::Https;
    let errors = config.validate();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].severity, ConfigSeverity::Warning);
    assert!(config.is_valid());
}

#[test]
fn env_overrides_apply() {
    let env: HashMap<&str, &str> = [
        ("EVENG_HOST", "lab.example"),
        ("EVENG_PORT", "8443"),
        ("EVENG_PROTOCOL", "HTTPS"),
        ("EVENG_USERNAME", "bob"),
        ("EVENG_PASSWORD", "hunter2"),
    ]
    .into_iter()
    .collect();

    let mut config = Config::default();
    let errors = config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));
    assert!(errors.is_empty());
    assert_eq!(config.eveng.base_url(), "https://lab.example:8443");
    let creds = config.eveng.credentials();
    assert_eq!(creds.username, "bob");
    assert_eq!(creds.password, "hunter2");
}

#[test]
fn bad_env_port_is_reported_and_ignored() {
    let mut config = Config::default();
    let errors = config.apply_overrides(|k| (k == "EVENG_PORT").then(|| "http".to_string()));
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field, "EVENG_PORT");
    assert_eq!(config.eveng.port, 80);
}

#[test]
fn credentials_debug_masks_password() {
    let config = Config::default();
    let dbg = format!("{:?}", config.eveng.credentials());
    assert!(dbg.contains("admin"));
    assert!(!dbg.contains("eve\""));
}
