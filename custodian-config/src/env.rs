// Environment variable loading

use crate::{ConfigError, Result};
use std::collections::HashMap;
use std::env;

/// Environment variable loader
///
/// With a prefix, only `PREFIX_*` variables are picked up and their keys are
/// returned without the prefix, lowercased (`CUSTODIAN_BASE_URL` -> `base_url`).
#[derive(Debug, Clone)]
pub struct EnvLoader {
    prefix: Option<String>,
}

impl EnvLoader {
    /// Create a new environment loader
    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }

    /// Create a loader for `PREFIX_*` variables
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self::new(Some(prefix.into()))
    }

    /// Load all matching environment variables
    pub fn load(&self) -> Result<HashMap<String, String>> {
        Ok(self.collect(env::vars()))
    }

    /// Load a `.env` file into the process environment, then load variables
    ///
    /// A missing default `.env` file is not an error; a missing explicit
    /// path is.
    pub fn load_dotenv(&self, path: Option<&str>) -> Result<HashMap<String, String>> {
        if let Some(path) = path {
            dotenvy::from_path(path).map_err(|e| ConfigError::LoadError(e.to_string()))?;
        } else {
            dotenvy::dotenv().ok();
        }
        self.load()
    }

    /// Normalize and filter arbitrary key/value pairs the way [`load`](Self::load) does
    pub fn collect<I, K, V>(&self, vars: I) -> HashMap<String, String>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        vars.into_iter()
            .filter_map(|(key, value)| self.normalize(key.as_ref()).map(|key| (key, value.into())))
            .collect()
    }

    /// Strip the prefix and lowercase a variable name
    ///
    /// Returns `None` for names outside the prefix.
    pub fn normalize(&self, key: &str) -> Option<String> {
        match self.prefix {
            Some(ref prefix) => key
                .strip_prefix(prefix.as_str())
                .and_then(|rest| rest.strip_prefix('_'))
                .filter(|rest| !rest.is_empty())
                .map(str::to_lowercase),
            None => Some(key.to_lowercase()),
        }
    }

    /// Load a specific environment variable
    pub fn load_var(&self, key: &str) -> Result<String> {
        env::var(self.full_key(key)).map_err(ConfigError::EnvError)
    }

    /// Load with default value
    pub fn load_var_or(&self, key: &str, default: &str) -> String {
        self.load_var(key).unwrap_or_else(|_| default.to_string())
    }

    /// Full variable name for a key
    pub fn full_key(&self, key: &str) -> String {
        match self.prefix {
            Some(ref prefix) => format!("{}_{}", prefix, key.to_uppercase()),
            None => key.to_uppercase(),
        }
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_loader_with_default() {
        let loader = EnvLoader::new(None);
        let value = loader.load_var_or("NONEXISTENT_VAR_12345", "default");

        assert_eq!(value, "default");
    }

    #[test]
    fn test_env_loader_missing_var() {
        let loader = EnvLoader::with_prefix("CUSTODIAN_TEST");
        let result = loader.load_var("MISSING_VAR_67890");

        assert!(matches!(result, Err(ConfigError::EnvError(_))));
    }

    #[test]
    fn test_full_key() {
        assert_eq!(
            EnvLoader::with_prefix("CUSTODIAN").full_key("base_url"),
            "CUSTODIAN_BASE_URL"
        );
        assert_eq!(EnvLoader::default().full_key("path"), "PATH");
    }

    #[test]
    fn test_normalize_respects_prefix_boundary() {
        let loader = EnvLoader::with_prefix("CUSTODIAN");

        assert_eq!(loader.normalize("CUSTODIAN_API_KEY").as_deref(), Some("api_key"));
        assert_eq!(loader.normalize("CUSTODIANX_API_KEY"), None);
        assert_eq!(loader.normalize("CUSTODIAN_"), None);
        assert_eq!(loader.normalize("OTHER_API_KEY"), None);
    }

    #[test]
    fn test_collect() {
        let loader = EnvLoader::with_prefix("CUSTODIAN");
        let vars = loader.collect([
            ("CUSTODIAN_BASE_URL", "https://api.example.com"),
            ("HOME", "/root"),
        ]);

        assert_eq!(vars.len(), 1);
        assert_eq!(vars["base_url"], "https://api.example.com");
    }
}
