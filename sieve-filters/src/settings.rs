//! Global defaults for filter sets, loadable from `sieve.toml` or the environment.
//!
//! ```toml
//! [filters]
//! blank = "keep"
//! known_parameters = ["page", "page_size", "${EXTRA_PARAM}"]
//! handle_unknown_parameters = true
//! default_group = "chain"
//! non_field_errors_key = "errors"
//! ```

use std::env;
use std::path::Path;
use std::sync::OnceLock;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How an empty raw value is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Blank {
    /// Validate the empty string like any other value.
    Keep,
    /// Treat the empty string as if the parameter were absent.
    #[default]
    Omit,
}

impl Blank {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "keep" => Some(Self::Keep),
            "omit" => Some(Self::Omit),
            _ => None,
        }
    }
}

/// Error loading settings.
#[derive(Error, Debug, Diagnostic)]
pub enum SettingsError {
    /// Error reading a file.
    #[error("failed to read settings file: {path}")]
    #[diagnostic(code(sieve::settings::io_error))]
    Io {
        /// File path.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error.
    #[error("failed to parse settings TOML")]
    #[diagnostic(code(sieve::settings::toml_error))]
    Toml {
        /// Underlying error.
        #[source]
        source: toml::de::Error,
    },

    /// An environment variable held an unusable value.
    #[error("invalid value `{value}` for {var}, expected {expected}")]
    #[diagnostic(code(sieve::settings::invalid_env))]
    InvalidEnv {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
        /// What was expected.
        expected: &'static str,
    },
}

/// Top-level layout of a settings file. Other tables are left to the
/// application.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
struct SettingsFile {
    #[serde(default)]
    filters: Settings,
}

/// Defaults applied to every filter set that does not override them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Blank policy.
    #[serde(default)]
    pub blank: Blank,

    /// Parameters never reported as unknown.
    #[serde(default = "default_known_parameters")]
    pub known_parameters: Vec<String>,

    /// Whether unknown parameters are rejected.
    #[serde(default = "default_true")]
    pub handle_unknown_parameters: bool,

    /// Group of filters that are applied one by one.
    #[serde(default = "default_group")]
    pub default_group: String,

    /// Key that collects errors not tied to a parameter.
    #[serde(default = "default_non_field_errors_key")]
    pub non_field_errors_key: String,
}

fn default_known_parameters() -> Vec<String> {
    ["page", "page_size", "cursor", "ordering", "version", "format"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_true() -> bool {
    true
}

fn default_group() -> String {
    "chain".to_string()
}

fn default_non_field_errors_key() -> String {
    "non_field_errors".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            blank: Blank::default(),
            known_parameters: default_known_parameters(),
            handle_unknown_parameters: default_true(),
            default_group: default_group(),
            non_field_errors_key: default_non_field_errors_key(),
        }
    }
}

static GLOBAL: OnceLock<Settings> = OnceLock::new();

impl Settings {
    /// Load settings from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| SettingsError::Io {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_toml(&content)
    }

    /// Parse settings from a TOML string with a `[filters]` table.
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let expanded = expand_env_vars(content);
        let file: SettingsFile =
            toml::from_str(&expanded).map_err(|e| SettingsError::Toml { source: e })?;
        Ok(file.filters)
    }

    /// Defaults overridden by `SIEVE_*` environment variables.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Defaults overridden through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SettingsError> {
        let mut settings = Self::default();

        if let Some(raw) = lookup("SIEVE_BLANK") {
            settings.blank = Blank::parse(&raw).ok_or(SettingsError::InvalidEnv {
                var: "SIEVE_BLANK",
                value: raw,
                expected: "`keep` or `omit`",
            })?;
        }
        if let Some(raw) = lookup("SIEVE_KNOWN_PARAMETERS") {
            settings.known_parameters = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(raw) = lookup("SIEVE_HANDLE_UNKNOWN_PARAMETERS") {
            settings.handle_unknown_parameters = match raw.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => {
                    return Err(SettingsError::InvalidEnv {
                        var: "SIEVE_HANDLE_UNKNOWN_PARAMETERS",
                        value: raw,
                        expected: "a boolean",
                    });
                }
            };
        }
        if let Some(raw) = lookup("SIEVE_DEFAULT_GROUP") {
            settings.default_group = raw.trim().to_string();
        }
        if let Some(raw) = lookup("SIEVE_NON_FIELD_ERRORS_KEY") {
            settings.non_field_errors_key = raw.trim().to_string();
        }

        Ok(settings)
    }

    /// Process-wide settings.
    ///
    /// Read from the environment on first use; falls back to the defaults when
    /// the environment is unusable.
    pub fn global() -> &'static Settings {
        GLOBAL.get_or_init(|| {
            Self::from_env().unwrap_or_else(|err| {
                tracing::warn!(error = %err, "Ignoring invalid SIEVE_* settings");
                Self::default()
            })
        })
    }

    /// Install process-wide settings. Returns `false` if they were already set.
    pub fn install(self) -> bool {
        GLOBAL.set(self).is_ok()
    }
}

/// Expand `${VAR}` references in a settings file.
fn expand_env_vars(content: &str) -> String {
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}").expect("valid pattern");
    re.replace_all(content, |caps: &regex_lite::Captures<'_>| {
        env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}
