// Configuration management for the Custodian SDK

pub mod client;
pub mod env;
pub mod error;
pub mod loader;
pub mod validation;

pub use client::{ApiKeyConfig, ClientConfig, ENV_PREFIX, WebhookSettings};
pub use env::EnvLoader;
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};
pub use validation::{ConfigValidator, Validate};
