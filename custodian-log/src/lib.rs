//! Custodian Logging Setup
//!
//! The SDK crates log through the [`tracing`] facade. This crate installs a
//! global `tracing-subscriber` configured from `CUSTODIAN_*` environment
//! variables, for binaries and test suites that want to see those events.
//!
//! # Usage
//!
//! ```rust
//! custodian_log::init();
//!
//! tracing::info!(key_id = "k-1", "Signing request");
//! ```
//!
//! # Environment Variables
//!
//! - `CUSTODIAN_DEBUG=1` - Enable debug logging
//! - `CUSTODIAN_LOG_LEVEL=trace|debug|info|warn|error|off` - Set log level
//! - `CUSTODIAN_LOG_FORMAT=pretty|compact|json` - Set output format
//! - `CUSTODIAN_LOG_COLOR=1|0` - Enable/disable colors
//! - `CUSTODIAN_LOG_TARGET=1|0` - Include the event target
//!
//! `RUST_LOG`, when set, replaces the level-derived filter.

use once_cell::sync::OnceCell;
use std::env;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

// ============================================================================
// Log Levels
// ============================================================================

/// Minimum level of emitted events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    /// Trace level (most verbose)
    Trace,
    /// Debug level
    Debug,
    /// Info level
    Info,
    /// Warning level
    Warn,
    /// Error level (least verbose)
    Error,
    /// Off (no logging)
    Off,
}

impl Level {
    /// Parse a level name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Some(Level::Trace),
            "debug" => Some(Level::Debug),
            "info" => Some(Level::Info),
            "warn" | "warning" => Some(Level::Warn),
            "error" => Some(Level::Error),
            "off" | "none" => Some(Level::Off),
            _ => None,
        }
    }

    /// Filter directive for this level.
    pub fn as_directive(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Off => "off",
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_directive())
    }
}

// ============================================================================
// Log Format
// ============================================================================

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Multi-line human readable output
    Pretty,
    /// Compact single-line format
    Compact,
    /// JSON format for structured logging
    Json,
}

impl Format {
    /// Parse a format name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pretty" => Some(Format::Pretty),
            "compact" => Some(Format::Compact),
            "json" => Some(Format::Json),
            _ => None,
        }
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Whether debug mode is enabled
    pub debug: bool,
    /// Minimum log level
    pub level: Level,
    /// Output format
    pub format: Format,
    /// Whether colors are enabled
    pub color: bool,
    /// Whether to include the event target
    pub target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            debug: false,
            level: Level::Info,
            format: Format::Compact,
            color: false,
            target: true,
        }
    }
}

impl LogConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Create config from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |key: &str| lookup(key).map(|v| v == "1" || v.eq_ignore_ascii_case("true"));

        let debug = flag("CUSTODIAN_DEBUG").unwrap_or(false);

        let level = lookup("CUSTODIAN_LOG_LEVEL")
            .and_then(|s| Level::parse(&s))
            .unwrap_or(if debug { Level::Debug } else { Level::Info });

        let format = lookup("CUSTODIAN_LOG_FORMAT")
            .and_then(|s| Format::parse(&s))
            .unwrap_or(Format::Compact);

        // Colors follow the terminal unless NO_COLOR is set.
        let color = flag("CUSTODIAN_LOG_COLOR")
            .unwrap_or_else(|| lookup("NO_COLOR").is_none() && lookup("TERM").is_some());

        let target = flag("CUSTODIAN_LOG_TARGET").unwrap_or(true);

        Self {
            debug,
            level,
            format,
            color: color && format != Format::Json,
            target,
        }
    }

    /// Filter used when `RUST_LOG` is not set.
    pub fn directive(&self) -> &'static str {
        if self.debug && self.level > Level::Debug {
            Level::Debug.as_directive()
        } else {
            self.level.as_directive()
        }
    }

    /// Event filter, preferring `RUST_LOG` when it is set and valid.
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.directive()))
    }
}

// ============================================================================
// Public API
// ============================================================================

static INSTALLED: OnceCell<bool> = OnceCell::new();

/// Install the global subscriber from `CUSTODIAN_*` variables.
///
/// Safe to call any number of times; only the first call configures
/// anything. Returns whether this crate's subscriber is the global one
/// (`false` when another subscriber was already installed).
pub fn init() -> bool {
    init_with(LogConfig::from_env())
}

/// Install the global subscriber with an explicit configuration.
///
/// Like [`init`], only the first call has an effect.
pub fn init_with(config: LogConfig) -> bool {
    *INSTALLED.get_or_init(|| install(&config))
}

fn install(config: &LogConfig) -> bool {
    let registry = tracing_subscriber::registry().with(config.env_filter());

    let result = match config.format {
        Format::Pretty => registry
            .with(
                fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr)
                    .with_ansi(config.color)
                    .with_target(config.target),
            )
            .try_init(),
        Format::Compact => registry
            .with(
                fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr)
                    .with_ansi(config.color)
                    .with_target(config.target),
            )
            .try_init(),
        #[cfg(feature = "json")]
        Format::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(config.target),
            )
            .try_init(),
        #[cfg(not(feature = "json"))]
        Format::Json => registry
            .with(
                fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr)
                    .with_ansi(false)
                    .with_target(config.target),
            )
            .try_init(),
    };

    result.is_ok()
}

// ============================================================================
// Tests
// ============================================================================
