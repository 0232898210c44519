//! Integration tests for configuration loading and validation

#![allow(clippy::expect_used, clippy::unwrap_used)]

use shard_ipc::config::{ClientConfig, NetworkConfig, ServerConfig};
use std::sync::Mutex;
use std::time::Duration;
use tracing::Level;

// Environment variables are process-wide; tests touching them take turns
static ENV_LOCK: Mutex<()> = Mutex::new(());

const ENV_VARS: [&str; 6] = [
    "SHARD_IPC_SERVER_ADDRESS",
    "SHARD_IPC_CLIENT_ADDRESS",
    "SHARD_IPC_AUTH_SECRET",
    "SHARD_IPC_MAX_CONNECTIONS",
    "SHARD_IPC_CONNECTION_TIMEOUT_MS",
    "SHARD_IPC_LOG_LEVEL",
];

fn with_env<F: FnOnce()>(vars: &[(&str, &str)], test: F) {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    for name in ENV_VARS {
        std::env::remove_var(name);
    }
    for (name, value) in vars {
        std::env::set_var(name, value);
    }

    test();

    for name in ENV_VARS {
        std::env::remove_var(name);
    }
}

const FULL_TOML: &str = r#"
[server]
address = "0.0.0.0:9100"
auth_secret = "cluster-secret"
max_connections = 32
shutdown_timeout = 250

[client]
address = "coordinator.internal:9100"
auth = "cluster-secret"
connection_timeout = 1500

[logging]
app_name = "karen"
log_level = "debug"
log_to_console = true
log_to_file = false
json_format = true
"#;

// ============================================================================
// DEFAULTS
// ============================================================================

#[test]
fn test_default_config_validates() {
    let config = NetworkConfig::default();
    let errors = config.validate();
    assert!(
        errors.is_empty(),
        "Default config should be valid, but got errors: {:?}",
        errors
    );
}

#[test]
fn test_default_client_can_authenticate_with_default_server() {
    let config = NetworkConfig::default();
    assert_eq!(config.client.auth, config.server.auth_secret);
    assert_eq!(config.client.address, config.server.address);
}

// ============================================================================
// SERVER
// ============================================================================

#[test]
fn test_empty_auth_secret() {
    let mut config = NetworkConfig::default();
    config.server.auth_secret = String::new();

    let errors = config.validate();
    assert_eq!(errors.len(), 1, "{errors:?}");
    assert!(errors[0].contains("Server auth secret cannot be empty"));

    let strict = config.validate_strict().unwrap_err().to_string();
    assert!(strict.contains("Configuration validation failed"));
    assert!(strict.contains("auth secret"));
}

#[test]
fn test_server_address_must_be_socket_addr() {
    let mut server = ServerConfig::default();

    server.address = "localhost:7798".to_string();
    assert!(server
        .validate()
        .iter()
        .any(|e| e.contains("Invalid server address format")));

    server.address = String::new();
    assert!(server.validate().iter().any(|e| e.contains("cannot be empty")));

    server.address = "127.0.0.1:0".to_string();
    assert!(server.validate().is_empty());
}

#[test]
fn test_max_connections_bounds() {
    let mut server = ServerConfig::default();

    server.max_connections = 0;
    assert!(server
        .validate()
        .iter()
        .any(|e| e.contains("Max connections must be greater than 0")));

    server.max_connections = 100_000;
    assert!(server.validate().is_empty());

    server.max_connections = 100_001;
    assert!(server.validate().iter().any(|e| e.contains("very high")));
}

#[test]
fn test_shutdown_timeout_bounds() {
    let mut server = ServerConfig::default();

    server.shutdown_timeout = Duration::from_millis(99);
    assert!(server
        .validate()
        .iter()
        .any(|e| e.contains("Shutdown timeout too short")));

    server.shutdown_timeout = Duration::from_millis(100);
    assert!(server.validate().is_empty());

    server.shutdown_timeout = Duration::from_secs(61);
    assert!(server
        .validate()
        .iter()
        .any(|e| e.contains("Shutdown timeout too long")));
}

// ============================================================================
// CLIENT
// ============================================================================

#[test]
fn test_empty_client_credential() {
    let mut client = ClientConfig::default();
    client.auth = String::new();

    assert!(client
        .validate()
        .iter()
        .any(|e| e.contains("Client auth credential cannot be empty")));
}

#[test]
fn test_client_address_accepts_hostnames() {
    let mut client = ClientConfig::default();

    client.address = "coordinator.internal:7798".to_string();
    assert!(client.validate().is_empty());

    client.address = "no-port-here".to_string();
    assert!(client
        .validate()
        .iter()
        .any(|e| e.contains("Invalid client address format")));
}

#[test]
fn test_connection_timeout_bounds() {
    let mut client = ClientConfig::default();

    client.connection_timeout = Duration::from_millis(50);
    assert!(client.validate().iter().any(|e| e.contains("too short")));

    client.connection_timeout = Duration::from_secs(301);
    assert!(client.validate().iter().any(|e| e.contains("too long")));
}

// ============================================================================
// LOGGING
// ============================================================================

#[test]
fn test_logging_needs_an_output() {
    let mut config = NetworkConfig::default();
    config.logging.log_to_console = false;
    config.logging.log_to_file = false;

    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("At least one logging output")));
}

// ============================================================================
// TOML
// ============================================================================

#[test]
fn test_full_toml_document() {
    let config = NetworkConfig::from_toml(FULL_TOML).expect("document should parse");

    assert_eq!(config.server.auth_secret, "cluster-secret");
    assert_eq!(config.server.max_connections, 32);
    assert_eq!(config.server.shutdown_timeout, Duration::from_millis(250));
    assert_eq!(config.client.connection_timeout, Duration::from_millis(1500));
    assert_eq!(config.logging.log_level, Level::DEBUG);
    assert!(config.validate().is_empty(), "{:?}", config.validate());
}

#[test]
fn test_missing_sections_fall_back_to_defaults() {
    let config = NetworkConfig::from_toml(
        r#"
[server]
address = "127.0.0.1:9200"
auth_secret = "only-the-server"
max_connections = 4
shutdown_timeout = 1000
"#,
    )
    .unwrap();

    assert_eq!(config.server.auth_secret, "only-the-server");
    assert_eq!(config.client.auth, ClientConfig::default().auth);
    assert_eq!(config.logging.app_name, "shard-ipc");
}

#[test]
fn test_toml_rejects_bad_log_level_and_garbage() {
    let bad_level = FULL_TOML.replace("\"debug\"", "\"chatty\"");
    assert!(NetworkConfig::from_toml(&bad_level).is_err());
    assert!(NetworkConfig::from_toml("[server\naddress = ").is_err());
}

#[test]
fn test_example_config_parses_back() {
    let text = NetworkConfig::example_config();
    assert!(text.contains("auth_secret"));

    let parsed = NetworkConfig::from_toml(&text).expect("example config should parse");
    assert_eq!(parsed.server.address, ServerConfig::default().address);
    assert_eq!(parsed.server.shutdown_timeout, Duration::from_secs(5));
}

#[test]
fn test_save_and_load_file() {
    let path = std::env::temp_dir().join(format!("shard-ipc-config-{}.toml", std::process::id()));
    let config = NetworkConfig::default_with_overrides(|c| {
        c.server.auth_secret = "rotated".to_string();
        c.client.auth = "rotated".to_string();
        c.client.connection_timeout = Duration::from_millis(2500);
    });

    config.save_to_file(&path).expect("save should succeed");
    let loaded = NetworkConfig::from_file(&path).expect("load should succeed");
    std::fs::remove_file(&path).ok();

    assert_eq!(loaded.server.auth_secret, "rotated");
    assert_eq!(loaded.client.auth, "rotated");
    assert_eq!(loaded.client.connection_timeout, Duration::from_millis(2500));
}

// ============================================================================
// ENVIRONMENT
// ============================================================================

#[test]
fn test_env_secret_applies_to_both_ends() {
    with_env(&[("SHARD_IPC_AUTH_SECRET", "from-env")], || {
        let config = NetworkConfig::from_env().expect("env config should load");
        assert_eq!(config.server.auth_secret, "from-env");
        assert_eq!(config.client.auth, "from-env");
    });
}

#[test]
fn test_env_addresses_are_independent() {
    with_env(
        &[
            ("SHARD_IPC_SERVER_ADDRESS", "0.0.0.0:9300"),
            ("SHARD_IPC_CLIENT_ADDRESS", "coordinator:9300"),
        ],
        || {
            let config = NetworkConfig::from_env().unwrap();
            assert_eq!(config.server.address, "0.0.0.0:9300");
            assert_eq!(config.client.address, "coordinator:9300");
            assert_eq!(config.server.auth_secret, ServerConfig::default().auth_secret);
        },
    );
}

#[test]
fn test_env_numbers_and_level() {
    with_env(
        &[
            ("SHARD_IPC_MAX_CONNECTIONS", "12"),
            ("SHARD_IPC_CONNECTION_TIMEOUT_MS", "750"),
            ("SHARD_IPC_LOG_LEVEL", "warn"),
        ],
        || {
            let config = NetworkConfig::from_env().unwrap();
            assert_eq!(config.server.max_connections, 12);
            assert_eq!(config.client.connection_timeout, Duration::from_millis(750));
            assert_eq!(config.logging.log_level, Level::WARN);
        },
    );
}

#[test]
fn test_env_rejects_unparseable_values() {
    for (name, value) in [
        ("SHARD_IPC_MAX_CONNECTIONS", "lots"),
        ("SHARD_IPC_CONNECTION_TIMEOUT_MS", "-5"),
        ("SHARD_IPC_LOG_LEVEL", "chatty"),
    ] {
        with_env(&[(name, value)], || {
            let err = NetworkConfig::from_env().unwrap_err().to_string();
            assert!(err.contains(name), "{err}");
        });
    }
}
