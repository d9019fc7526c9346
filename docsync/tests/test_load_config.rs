use docsync::load_config::{load_config, Credentials};
use serial_test::serial;
use std::env;
use std::fs::write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::NamedTempFile;

/// A full config loads every section; the timeout falls back to the default.
#[test]
fn test_load_config_full() {
    let config_yaml = r#"
docs_root: docs
structure: docs/bookstack/bookstack-structure.yaml
report: validation-report.json
bookstack:
  url: https://wiki.example.com
migrate:
  source_dir: docs/_old
  target_dir: docs
  moved_dir: docs/_old/_moved
  log: docs/MIGRATION-LOG.md
"#;
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), config_yaml).unwrap();

    let config = load_config(config_file.path()).expect("Config should load");

    assert_eq!(config.docs_root, PathBuf::from("docs"));
    assert_eq!(config.report, Some(PathBuf::from("validation-report.json")));
    let bookstack = config.bookstack.expect("bookstack section");
    assert_eq!(bookstack.url, "https://wiki.example.com");
    assert_eq!(bookstack.timeout(), Duration::from_secs(30));
    let migrate = config.migrate.expect("migrate section");
    assert_eq!(migrate.rules, None);
    assert_eq!(migrate.paths().moved_dir, PathBuf::from("docs/_old/_moved"));
}

/// Only the docs root and structure file are required.
#[test]
fn test_load_config_minimal() {
    let config_file = NamedTempFile::new().expect("temp file");
    write(
        config_file.path(),
        "docs_root: ./docs\nstructure: ./structure.yaml\nbookstack:\n  url: http://localhost:6875\n  timeout_secs: 5\n",
    )
    .unwrap();

    let config = load_config(config_file.path()).expect("Config should load");

    assert!(config.report.is_none());
    assert!(config.migrate.is_none());
    assert_eq!(config.bookstack.unwrap().timeout(), Duration::from_secs(5));
}

#[test]
fn test_load_config_errors_for_invalid_file() {
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), b"not-yaml: [:::").unwrap();

    let err = load_config(config_file.path()).unwrap_err();
    let msg = err.to_string();
    assert!(
        msg.contains("parse") || msg.contains("YAML"),
        "Parse error expected, got: {msg}"
    );
}

#[test]
fn test_load_config_errors_for_missing_file() {
    let err = load_config("/definitely/not/here.yaml").unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}

#[test]
#[serial]
fn test_credentials_from_env() {
    env::set_var("BOOKSTACK_TOKEN_ID", "token-id");
    env::set_var("BOOKSTACK_TOKEN_SECRET", "token-secret");

    let credentials = Credentials::from_env().expect("credentials");

    assert_eq!(credentials.token_id, "token-id");
    assert_eq!(credentials.token_secret, "token-secret");
    assert!(!format!("{credentials:?}").contains("token-secret"));
}

#[test]
#[serial]
fn test_credentials_missing_secret() {
    env::set_var("BOOKSTACK_TOKEN_ID", "token-id");
    env::remove_var("BOOKSTACK_TOKEN_SECRET");

    let err = Credentials::from_env().unwrap_err();

    assert!(err.to_string().contains("BOOKSTACK_TOKEN_SECRET"));
}
