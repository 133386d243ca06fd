//! Engine configuration.
//!
//! # Configuration Precedence
//!
//! Settings are resolved in this order (highest priority first):
//!
//! 1. **Programmatic**: values set on [`DeferredConfig`] directly
//! 2. **Environment variables**: values from `DEFERRED_*` env vars
//! 3. **Config file**: values loaded from a TOML file (requires `config-file` feature)
//! 4. **Defaults**: built-in defaults from [`DeferredConfig::default()`]
//!
//! # Supported Environment Variables
//!
//! | Variable | Type | Maps to |
//! |----------|------|---------|
//! | `DEFERRED_WARN_IGNORED` | `bool` | `warn_ignored` |
//! | `DEFERRED_TRACE_TRANSITIONS` | `bool` | `trace_transitions` |

use crate::error::DeferredError;
use serde::Deserialize;

/// Environment variable name for the ignored-operation warning toggle.
pub const ENV_WARN_IGNORED: &str = "DEFERRED_WARN_IGNORED";
/// Environment variable name for state-transition tracing.
pub const ENV_TRACE_TRANSITIONS: &str = "DEFERRED_TRACE_TRANSITIONS";

/// Behavioural knobs shared by every unit of a [`Context`](crate::Context).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DeferredConfig {
    /// Log a warning when a settle or register call is ignored because the
    /// unit was cancelled.
    pub warn_ignored: bool,
    /// Emit a trace event for every state transition and activation delta.
    pub trace_transitions: bool,
}

impl Default for DeferredConfig {
    fn default() -> Self {
        Self {
            warn_ignored: true,
            trace_transitions: false,
        }
    }
}

impl DeferredConfig {
    /// Returns the defaults with environment overrides applied.
    pub fn from_env() -> Result<Self, DeferredError> {
        let mut config = Self::default();
        apply_env_overrides(&mut config)?;
        Ok(config)
    }

    /// Sets whether ignored operations are logged.
    #[must_use]
    pub const fn warn_ignored(mut self, enabled: bool) -> Self {
        self.warn_ignored = enabled;
        self
    }

    /// Sets whether state transitions are traced.
    #[must_use]
    pub const fn trace_transitions(mut self, enabled: bool) -> Self {
        self.trace_transitions = enabled;
        self
    }
}

/// Apply environment variable overrides to a [`DeferredConfig`].
///
/// Only variables that are set in the environment are applied.
pub fn apply_env_overrides(config: &mut DeferredConfig) -> Result<(), DeferredError> {
    apply_overrides_from(config, |name| std::env::var(name).ok())
}

/// Apply overrides read through `lookup` instead of the process environment.
pub fn apply_overrides_from<F>(config: &mut DeferredConfig, lookup: F) -> Result<(), DeferredError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = lookup(ENV_WARN_IGNORED) {
        config.warn_ignored = parse_bool(ENV_WARN_IGNORED, &val)?;
    }
    if let Some(val) = lookup(ENV_TRACE_TRANSITIONS) {
        config.trace_transitions = parse_bool(ENV_TRACE_TRANSITIONS, &val)?;
    }
    Ok(())
}

fn parse_bool(var_name: &str, val: &str) -> Result<bool, DeferredError> {
    match val.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(DeferredError::config(format!(
            "invalid value for {var_name}: expected bool (true/false/1/0/yes/no), got {val:?}"
        ))),
    }
}

// =========================================================================
// TOML config file support (feature-gated)
// =========================================================================

/// TOML-deserializable configuration.
///
/// ```toml
/// [deferred]
/// warn_ignored = false
/// trace_transitions = true
/// ```
#[cfg(feature = "config-file")]
#[derive(Deserialize, Default, Debug)]
pub struct DeferredTomlConfig {
    /// Engine settings.
    #[serde(default)]
    pub deferred: DeferredToml,
}

/// `[deferred]` section of the TOML config.
#[cfg(feature = "config-file")]
#[derive(Deserialize, Default, Debug)]
pub struct DeferredToml {
    /// Log ignored operations.
    pub warn_ignored: Option<bool>,
    /// Trace state transitions.
    pub trace_transitions: Option<bool>,
}

/// Apply a parsed TOML config. Only `Some` fields override.
#[cfg(feature = "config-file")]
pub fn apply_toml_config(config: &mut DeferredConfig, toml: &DeferredTomlConfig) {
    if let Some(v) = toml.deferred.warn_ignored {
        config.warn_ignored = v;
    }
    if let Some(v) = toml.deferred.trace_transitions {
        config.trace_transitions = v;
    }
}

/// Parse a TOML string into a [`DeferredTomlConfig`].
#[cfg(feature = "config-file")]
pub fn parse_toml_str(toml_str: &str) -> Result<DeferredTomlConfig, DeferredError> {
    toml::from_str(toml_str)
        .map_err(|e| DeferredError::config(format!("failed to parse TOML config: {e}")))
}

/// Read and parse a TOML file into a [`DeferredTomlConfig`].
#[cfg(feature = "config-file")]
pub fn parse_toml_file(path: &std::path::Path) -> Result<DeferredTomlConfig, DeferredError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        DeferredError::config(format!(
            "failed to read config file {}: {e}",
            path.display()
        ))
    })?;
    parse_toml_str(&content)
}

/// Loads a config from a TOML file, then applies environment overrides.
#[cfg(feature = "config-file")]
pub fn load(path: &std::path::Path) -> Result<DeferredConfig, DeferredError> {
    let mut config = DeferredConfig::default();
    apply_toml_config(&mut config, &parse_toml_file(path)?);
    apply_env_overrides(&mut config)?;
    Ok(config)
}
