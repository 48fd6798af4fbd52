#![forbid(unsafe_code)]

//! Structured logging setup.
//!
//! The core and runtime emit `tracing` events; this module installs a
//! `tracing-subscriber` fmt subscriber for binaries and examples that want to
//! see them.
//!
//! - `SETTLE_LOG` sets the filter directive (default `info`), for example
//!   `SETTLE_LOG=settle_core=trace`.
//! - `SETTLE_LOG_FORMAT=json` selects JSON lines (needs the `tracing-json`
//!   feature; without it the setting falls back to plain text).

use tracing_subscriber::EnvFilter;

use crate::error::{Result, RuntimeError};

pub const FILTER_ENV: &str = "SETTLE_LOG";
pub const FORMAT_ENV: &str = "SETTLE_LOG_FORMAT";
pub const DEFAULT_FILTER: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// `EnvFilter` directive string.
    pub filter: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
            json: false,
        }
    }
}

impl LogConfig {
    /// Read `SETTLE_LOG` / `SETTLE_LOG_FORMAT` from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let filter = lookup(FILTER_ENV)
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| DEFAULT_FILTER.to_string());
        let json = lookup(FORMAT_ENV).is_some_and(|f| f.trim().eq_ignore_ascii_case("json"));
        Self { filter, json }
    }

    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    #[must_use]
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    /// Parse the filter directive.
    pub fn env_filter(&self) -> Result<EnvFilter> {
        EnvFilter::try_new(&self.filter).map_err(|e| RuntimeError::InvalidLogFilter {
            filter: self.filter.clone(),
            message: e.to_string(),
        })
    }
}

/// Install the global subscriber described by `config`.
///
/// Fails if the filter does not parse or a global subscriber is already set.
pub fn init(config: &LogConfig) -> Result<()> {
    let filter = config.env_filter()?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    #[cfg(feature = "tracing-json")]
    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    #[cfg(not(feature = "tracing-json"))]
    let result = builder.try_init();

    result.map_err(|e| RuntimeError::LoggingInit {
        message: e.to_string(),
    })
}
