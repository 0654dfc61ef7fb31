//! Integration tests for custodian-config

use custodian_config::*;
use std::env;
use std::fs;
use std::time::Duration;

#[test]
fn test_from_toml_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("custodian.toml");
    fs::write(
        &path,
        r#"
            base_url = "https://api.example.com"
            signature_debug = true

            [api_key]
            key = "key-id"
            secret = "secret"
            passphrase = "passphrase"

            [webhook]
            hmac_key = "hook-key"
            match_timeout_secs = 45
        "#,
    )
    .unwrap();

    let config = ClientConfig::from_file(&path).unwrap();
    assert!(config.signature_debug);
    assert_eq!(config.api_key.passphrase, "passphrase");
    assert_eq!(config.webhook.match_timeout(), Duration::from_secs(45));
    assert_eq!(config.webhook.signature_header, "X-Up-Signature");
}

#[test]
fn test_from_json_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("custodian.json");
    fs::write(
        &path,
        r#"{
            "base_url": "http://localhost:8000",
            "api_key": {"key": "k", "secret": "s", "passphrase": "p"}
        }"#,
    )
    .unwrap();

    let config = ClientConfig::from_file(&path).unwrap();
    assert_eq!(config.base_url, "http://localhost:8000");
    assert!(config.webhook.hmac_key.is_none());
    assert!(!config.signature_debug);
}

#[test]
fn test_from_env_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".env");
    fs::write(
        &path,
        "CUSTODIAN_BASE_URL=https://api.example.com\n\
         CUSTODIAN_API_KEY=key-id\n\
         CUSTODIAN_API_SECRET=\"secret\"\n\
         CUSTODIAN_API_PASSPHRASE=passphrase\n\
         CUSTODIAN_WEBHOOK_HMAC_KEY=hook-key\n\
         UNRELATED=1\n",
    )
    .unwrap();

    let config = ClientConfig::from_file(&path).unwrap();
    assert_eq!(config.api_key.secret, "secret");
    assert_eq!(config.webhook.hmac_key.as_deref(), Some("hook-key"));
}

#[test]
fn test_file_errors() {
    let dir = tempfile::tempdir().unwrap();

    let missing = dir.path().join("absent.toml");
    assert!(matches!(
        ClientConfig::from_file(&missing),
        Err(ConfigError::LoadError(_))
    ));

    let incomplete = dir.path().join("incomplete.json");
    fs::write(&incomplete, r#"{"base_url": "https://api.example.com"}"#).unwrap();
    assert!(matches!(
        ClientConfig::from_file(&incomplete),
        Err(ConfigError::DeserializationError(_))
    ));

    let invalid = dir.path().join("invalid.json");
    fs::write(
        &invalid,
        r#"{
            "base_url": "https://api.example.com",
            "api_key": {"key": "k", "secret": "s", "passphrase": "p"},
            "webhook": {"match_timeout_secs": 0}
        }"#,
    )
    .unwrap();
    assert!(matches!(
        ClientConfig::from_file(&invalid),
        Err(ConfigError::ValidationError(_))
    ));
}

#[test]
fn test_from_process_environment() {
    unsafe {
        env::set_var("CUSTODIAN_BASE_URL", "https://env.example.com");
        env::set_var("CUSTODIAN_API_KEY", "env-key");
        env::set_var("CUSTODIAN_API_SECRET", "env-secret");
        env::set_var("CUSTODIAN_API_PASSPHRASE", "env-pass");
        env::set_var("CUSTODIAN_SIGNATURE_DEBUG", "1");
    }

    let config = ClientConfig::from_env();

    // Cleanup
    unsafe {
        for key in [
            "CUSTODIAN_BASE_URL",
            "CUSTODIAN_API_KEY",
            "CUSTODIAN_API_SECRET",
            "CUSTODIAN_API_PASSPHRASE",
            "CUSTODIAN_SIGNATURE_DEBUG",
        ] {
            env::remove_var(key);
        }
    }

    let config = config.unwrap();
    assert_eq!(config.base_url, "https://env.example.com");
    assert_eq!(config.api_key.key, "env-key");
    assert!(config.signature_debug);
}

#[test]
fn test_env_loader_with_prefix() {
    let loader = EnvLoader::with_prefix("CUSTODIAN_IT");

    unsafe {
        env::set_var("CUSTODIAN_IT_DATABASE_URL", "postgres://localhost");
    }

    let result = loader.load_var("DATABASE_URL");
    let all = loader.load().unwrap();

    unsafe {
        env::remove_var("CUSTODIAN_IT_DATABASE_URL");
    }

    assert_eq!(result.unwrap(), "postgres://localhost");
    assert_eq!(all["database_url"], "postgres://localhost");
}

#[test]
fn test_config_error_display() {
    let err = ConfigError::KeyNotFound("api_key".to_string());
    assert_eq!(err.to_string(), "Configuration key not found: api_key");
}
