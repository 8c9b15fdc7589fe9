//! Logging bootstrap for sieve.
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to the application. With the `tracing-subscriber` feature enabled,
//! [`init`] installs one configured from the environment:
//!
//! - `SIEVE_DEBUG=true|1|yes` - enable debug logging
//! - `SIEVE_LOG_LEVEL=trace|debug|info|warn|error` - explicit level
//! - `SIEVE_LOG_FORMAT=json|pretty|compact` - output format (default: json)
//!
//! ```rust,no_run
//! sieve_query::logging::init();
//! ```
//!
//! Inside the crates, filter resolution logs with the usual macros:
//!
//! ```rust,ignore
//! debug!(param = %param, "Parameter resolved");
//! trace!(group = %group, members = entries.len(), "Combining group");
//! ```

use std::env;
use std::sync::Once;

static INIT: Once = Once::new();

/// Output format of the installed subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    /// Multi-line human readable output.
    Pretty,
    /// Single-line human readable output.
    Compact,
}

impl LogFormat {
    fn parse(raw: &str) -> Self {
        match raw.to_lowercase().as_str() {
            "pretty" => Self::Pretty,
            "compact" => Self::Compact,
            _ => Self::Json,
        }
    }

    /// Format name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Pretty => "pretty",
            Self::Compact => "compact",
        }
    }
}

/// Logging configuration read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Whether `SIEVE_DEBUG` is switched on.
    pub debug: bool,
    /// Explicit level, if `SIEVE_LOG_LEVEL` holds a known level.
    pub level: Option<&'static str>,
    /// Output format.
    pub format: LogFormat,
}

impl LogSettings {
    /// Read the settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Read the settings through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let debug = lookup("SIEVE_DEBUG")
            .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(false);
        let level = lookup("SIEVE_LOG_LEVEL").and_then(|v| match v.to_lowercase().as_str() {
            "trace" => Some("trace"),
            "debug" => Some("debug"),
            "info" => Some("info"),
            "warn" => Some("warn"),
            "error" => Some("error"),
            _ => None,
        });
        let format = lookup("SIEVE_LOG_FORMAT")
            .map(|v| LogFormat::parse(&v))
            .unwrap_or(LogFormat::Json);
        Self {
            debug,
            level,
            format,
        }
    }

    /// Effective level: the explicit one, else `debug` in debug mode, else `warn`.
    pub fn effective_level(&self) -> &'static str {
        match (self.level, self.debug) {
            (Some(level), _) => level,
            (None, true) => "debug",
            (None, false) => "warn",
        }
    }

    /// Whether anything asked for logging at all.
    pub fn is_requested(&self) -> bool {
        self.debug || self.level.is_some()
    }
}

/// Check if debug logging is enabled via `SIEVE_DEBUG`.
#[inline]
pub fn is_debug_enabled() -> bool {
    LogSettings::from_env().debug
}

/// Install the subscriber once. Later calls are no-ops.
pub fn init() {
    INIT.call_once(|| {
        let settings = LogSettings::from_env();
        if !settings.is_requested() {
            return;
        }

        #[cfg(feature = "tracing-subscriber")]
        {
            use tracing_subscriber::{EnvFilter, fmt, prelude::*};

            let level = settings.effective_level();
            let filter = EnvFilter::try_new(format!(
                "sieve={level},sieve_query={level},sieve_filters={level},sieve_axum={level}"
            ))
            .unwrap_or_else(|_| EnvFilter::new("warn"));

            let registry = tracing_subscriber::registry().with(filter);
            match settings.format {
                LogFormat::Json => registry.with(fmt::layer().json()).init(),
                LogFormat::Compact => registry.with(fmt::layer().compact()).init(),
                LogFormat::Pretty => registry.with(fmt::layer().pretty()).init(),
            }

            tracing::info!(level, format = settings.format.as_str(), "sieve logging initialized");
        }
    });
}
