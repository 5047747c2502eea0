//! Configuration file loading tests.

use restream_client::RestreamConfig;
use std::io::Write;

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(content.as_bytes()).expect("write config");
    file
}

#[test]
fn test_load_full_config() {
    let file = write_config(
        r#"
endpoint = "wss://feed.example.com"
api_key = "test-key"
ping_interval_ms = 5000
max_subscriptions = 10
max_wildcard_subscriptions = 2
connect_timeout_ms = 2000

[reconnect]
enabled = false
initial_delay_ms = 100
max_delay_ms = 2000
factor = 1.5
jitter = 0.3
"#,
    );

    let config = RestreamConfig::load_from_file(file.path()).unwrap();
    assert_eq!(config.endpoint, "wss://feed.example.com");
    assert_eq!(config.api_key.as_deref(), Some("test-key"));
    assert_eq!(config.ping_interval_ms, 5000);
    assert_eq!(config.max_subscriptions, 10);
    assert!(!config.reconnect.enabled);
    assert_eq!(config.reconnect.factor, 1.5);
}

#[test]
fn test_load_empty_config_uses_defaults() {
    let file = write_config("");
    let config = RestreamConfig::load_from_file(file.path()).unwrap();
    assert_eq!(config, RestreamConfig::default());
}

#[test]
fn test_load_rejects_invalid_values() {
    let file = write_config(
        r#"
[reconnect]
factor = 0.2
"#,
    );
    assert!(RestreamConfig::load_from_file(file.path()).is_err());
}

#[test]
fn test_load_rejects_bad_toml() {
    let file = write_config("endpoint = [not toml");
    assert!(RestreamConfig::load_from_file(file.path()).is_err());
}

#[test]
fn test_load_missing_file() {
    assert!(RestreamConfig::load_from_file(std::path::Path::new(
        "/nonexistent/restream-client.toml"
    ))
    .is_err());
}
