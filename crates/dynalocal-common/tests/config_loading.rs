//! ---
//! dl_section: "01-configuration"
//! dl_subsection: "integration-tests"
//! dl_type: "source"
//! dl_scope: "code"
//! dl_description: "Configuration loading from files on disk."
//! dl_version: "v0.1.0"
//! dl_owner: "tbd"
//! ---
use std::fs;
use std::time::Duration;

use dynalocal_common::config::{resolve_config_path, ENV_CONFIG_PATH};
use dynalocal_common::{ConfigError, ConfigSource};
use tempfile::tempdir;

#[tokio::test]
async fn loads_toml_file() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("dynalocal.toml");
    fs::write(
        &path,
        r#"
port = 8500
options = ["-sharedDb", "-inMemory"]

[installer_config]
install_path = "/opt/dynamodb-local"
java_opts = ["-Xmx256m"]

[[tables]]
TableName = "Users"
BillingMode = "PAY_PER_REQUEST"

[[tables]]
TableName = "Orders"
BillingMode = "PAY_PER_REQUEST"
"#,
    )
    .unwrap();

    let config = ConfigSource::file(&path).load().await.unwrap();
    assert_eq!(config.port, 8500);
    assert_eq!(config.options, ["-sharedDb", "-inMemory"]);
    let names: Vec<&str> = config.tables.iter().map(|t| t.name()).collect();
    assert_eq!(names, ["Users", "Orders"]);
    let installer = config.installer_config.unwrap();
    assert_eq!(installer.java_opts, ["-Xmx256m"]);
    assert!(!installer.verbose);
}

#[tokio::test]
async fn loads_yaml_file_with_camel_case_keys() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("dynalocal.yaml");
    fs::write(
        &path,
        r#"
hostname: 127.0.0.1
settleDelayMs: 100
clientConfig:
  accessKeyId: local
  secretAccessKey: local
installerConfig:
  installPath: /tmp/ddb
  verbose: true
tables:
  - TableName: Sessions
    KeySchema:
      - AttributeName: id
        KeyType: HASH
"#,
    )
    .unwrap();

    let config = ConfigSource::file(&path).load().await.unwrap();
    assert_eq!(config.hostname, "127.0.0.1");
    assert_eq!(config.settle_delay, Duration::from_millis(100));
    assert_eq!(
        config.client_config.unwrap().access_key_id.as_deref(),
        Some("local")
    );
    assert!(config.installer_config.unwrap().verbose);
    assert_eq!(config.tables[0].name(), "Sessions");
    assert!(config.tables[0].parameters.contains_key("KeySchema"));
}

#[tokio::test]
async fn loads_json_file() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("dynalocal.json");
    fs::write(&path, r#"{ "tables": [{ "TableName": "Events" }], "port": 8010 }"#).unwrap();

    let config = ConfigSource::file(&path).load().await.unwrap();
    assert_eq!(config.port, 8010);
    assert_eq!(config.tables.len(), 1);
}

#[tokio::test]
async fn missing_file_is_not_found() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("absent.toml");
    let err = ConfigSource::file(&path).load().await.unwrap_err();
    match err {
        ConfigError::NotFound { path: reported, .. } => assert_eq!(reported, path),
        other => panic!("expected NotFound, got {other}"),
    }
}

#[tokio::test]
async fn file_without_tables_is_malformed() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("dynalocal.toml");
    fs::write(&path, "port = 8000\n").unwrap();
    let err = ConfigSource::file(&path).load().await.unwrap_err();
    assert!(matches!(err, ConfigError::Shape { .. }), "unexpected {err}");
}

#[test]
fn explicit_path_wins_then_env_override() {
    let dir = tempdir().expect("tempdir");
    let explicit = dir.path().join("explicit.toml");
    let from_env = dir.path().join("from-env.toml");

    std::env::set_var(ENV_CONFIG_PATH, &from_env);
    assert_eq!(resolve_config_path(Some(&explicit)), explicit);
    assert_eq!(resolve_config_path(None), from_env);

    std::env::set_var(ENV_CONFIG_PATH, "  ");
    let fallback = resolve_config_path(None);
    assert!(fallback.ends_with("dynalocal.toml"));
    std::env::remove_var(ENV_CONFIG_PATH);
}
