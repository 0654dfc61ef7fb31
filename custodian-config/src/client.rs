// Typed client configuration

use crate::{ConfigError, ConfigLoader, ConfigValidator, EnvLoader, FileFormat, Result, Validate};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Prefix of the environment variables read by [`ClientConfig::from_env`]
pub const ENV_PREFIX: &str = "CUSTODIAN";

const DEFAULT_MATCH_TIMEOUT_SECS: u64 = 180;
const DEFAULT_SIGNATURE_HEADER: &str = "X-Up-Signature";
const REDACTED: &str = "[REDACTED]";

/// Everything needed to talk to the custody API and verify its webhooks
///
/// Environment variables (prefix `CUSTODIAN_`):
///
/// | Variable | Field |
/// |---|---|
/// | `CUSTODIAN_BASE_URL` | `base_url` |
/// | `CUSTODIAN_API_KEY` | `api_key.key` |
/// | `CUSTODIAN_API_SECRET` | `api_key.secret` |
/// | `CUSTODIAN_API_PASSPHRASE` | `api_key.passphrase` |
/// | `CUSTODIAN_WEBHOOK_HMAC_KEY` | `webhook.hmac_key` |
/// | `CUSTODIAN_WEBHOOK_MATCH_TIMEOUT_SECS` | `webhook.match_timeout_secs` |
/// | `CUSTODIAN_WEBHOOK_SIGNATURE_HEADER` | `webhook.signature_header` |
/// | `CUSTODIAN_SIGNATURE_DEBUG` | `signature_debug` |
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_key: ApiKeyConfig,
    #[serde(default)]
    pub webhook: WebhookSettings,
    #[serde(default)]
    pub signature_debug: bool,
}

/// API key credentials
#[derive(Clone, Deserialize)]
pub struct ApiKeyConfig {
    pub key: String,
    pub secret: String,
    pub passphrase: String,
}

impl fmt::Debug for ApiKeyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeyConfig")
            .field("key", &self.key)
            .field("secret", &REDACTED)
            .field("passphrase", &REDACTED)
            .finish()
    }
}

/// Webhook verification settings
#[derive(Clone, Deserialize)]
pub struct WebhookSettings {
    #[serde(default)]
    pub hmac_key: Option<String>,
    #[serde(default = "default_match_timeout_secs")]
    pub match_timeout_secs: u64,
    #[serde(default = "default_signature_header")]
    pub signature_header: String,
}

fn default_match_timeout_secs() -> u64 {
    DEFAULT_MATCH_TIMEOUT_SECS
}

fn default_signature_header() -> String {
    DEFAULT_SIGNATURE_HEADER.to_string()
}

impl Default for WebhookSettings {
    fn default() -> Self {
        Self {
            hmac_key: None,
            match_timeout_secs: DEFAULT_MATCH_TIMEOUT_SECS,
            signature_header: default_signature_header(),
        }
    }
}

impl WebhookSettings {
    pub fn match_timeout(&self) -> Duration {
        Duration::from_secs(self.match_timeout_secs)
    }
}

impl fmt::Debug for WebhookSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookSettings")
            .field("hmac_key", &self.hmac_key.as_ref().map(|_| REDACTED))
            .field("match_timeout_secs", &self.match_timeout_secs)
            .field("signature_header", &self.signature_header)
            .finish()
    }
}

impl Validate for ClientConfig {
    fn validate(&self) -> Result<()> {
        ConfigValidator::is_url(&self.base_url, "base_url")?;
        ConfigValidator::not_empty(&self.api_key.key, "api_key.key")?;
        ConfigValidator::not_empty(&self.api_key.secret, "api_key.secret")?;
        ConfigValidator::not_empty(&self.api_key.passphrase, "api_key.passphrase")?;

        if let Some(ref hmac_key) = self.webhook.hmac_key {
            ConfigValidator::not_empty(hmac_key, "webhook.hmac_key")?;
        }
        ConfigValidator::in_range(
            self.webhook.match_timeout_secs,
            1,
            3600,
            "webhook.match_timeout_secs",
        )?;
        ConfigValidator::is_header_name(&self.webhook.signature_header, "webhook.signature_header")
    }
}

impl ClientConfig {
    /// Load from `CUSTODIAN_*` variables, reading `.env` first when present
    pub fn from_env() -> Result<Self> {
        let vars = EnvLoader::with_prefix(ENV_PREFIX).load_dotenv(None)?;
        Self::from_vars(&vars)
    }

    /// Build from normalized variables (prefix stripped, lowercase keys)
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self> {
        let required = |key: &str| {
            vars.get(key)
                .cloned()
                .ok_or_else(|| ConfigError::KeyNotFound(key.to_string()))
        };

        let mut webhook = WebhookSettings {
            hmac_key: vars.get("webhook_hmac_key").cloned(),
            ..WebhookSettings::default()
        };
        if let Some(secs) = vars.get("webhook_match_timeout_secs") {
            webhook.match_timeout_secs = secs.trim().parse().map_err(|_| {
                ConfigError::ParseError(format!("webhook_match_timeout_secs: {:?}", secs))
            })?;
        }
        if let Some(header) = vars.get("webhook_signature_header") {
            webhook.signature_header = header.clone();
        }

        let signature_debug = match vars.get("signature_debug") {
            Some(value) => parse_flag(value)
                .ok_or_else(|| ConfigError::ParseError(format!("signature_debug: {:?}", value)))?,
            None => false,
        };

        let config = ClientConfig {
            base_url: required("base_url")?,
            api_key: ApiKeyConfig {
                key: required("api_key")?,
                secret: required("api_secret")?,
                passphrase: required("api_passphrase")?,
            },
            webhook,
            signature_debug,
        };

        config.validate()?;
        debug!(base_url = %config.base_url, key_id = %config.api_key.key, "Loaded client configuration");
        Ok(config)
    }

    /// Load from a TOML, JSON or env file
    ///
    /// Env files use the same `CUSTODIAN_*` names as the environment.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let loader = ConfigLoader::auto(path)?;
        let value = loader.load_file(path)?;

        if loader.format() == FileFormat::Env {
            let serde_json::Value::Object(map) = value else {
                return Err(ConfigError::ParseError("env file is not a key list".to_string()));
            };
            let vars = EnvLoader::with_prefix(ENV_PREFIX).collect(
                map.into_iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k, v.to_string()))),
            );
            return Self::from_vars(&vars);
        }

        let config: ClientConfig = serde_json::from_value(value)
            .map_err(|e| ConfigError::DeserializationError(e.to_string()))?;
        config.validate()?;
        debug!(path = %path.display(), key_id = %config.api_key.key, "Loaded client configuration");
        Ok(config)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
