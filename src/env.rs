//! Environment variable names used by this crate for configuring loggers
//! without code changes.
//!
//! These are purely helpers; loggers themselves never read the
//! environment.

use crate::config::PastConfig;
use crate::error::ConfigError;
use crate::level::Level;

/// Store threshold, as a level name or integer (e.g. `INFO`, `20`).
pub const PAST_LOG_STORE_THRESHOLD_ENV: &str = "PAST_LOG_STORE_THRESHOLD";

/// Emit threshold, as a level name or integer.
pub const PAST_LOG_EMIT_THRESHOLD_ENV: &str = "PAST_LOG_EMIT_THRESHOLD";

/// Buffer capacity; `-1` for unbounded.
pub const PAST_LOG_MAX_BUFFERED_ENV: &str = "PAST_LOG_MAX_BUFFERED";

impl PastConfig {
    /// Build a config from the `PAST_LOG_*` variables. Unset variables
    /// leave the corresponding option empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`PastConfig::from_env`] with a caller-supplied lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let level = |key: &'static str| -> Result<Option<Level>, ConfigError> {
            lookup(key)
                .map(|raw| {
                    raw.parse::<Level>()
                        .map_err(|_| ConfigError::InvalidEnv { key, value: raw })
                })
                .transpose()
        };

        let max_buffered = match lookup(PAST_LOG_MAX_BUFFERED_ENV) {
            Some(raw) => match raw.trim().parse::<i64>() {
                Ok(n) if n >= -1 => Some(n),
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        key: PAST_LOG_MAX_BUFFERED_ENV,
                        value: raw,
                    })
                }
            },
            None => None,
        };

        Ok(PastConfig {
            store_threshold: level(PAST_LOG_STORE_THRESHOLD_ENV)?,
            emit_threshold: level(PAST_LOG_EMIT_THRESHOLD_ENV)?,
            max_buffered,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&'static str, &str)]) -> impl Fn(&'static str) -> Option<String> {
        let map: HashMap<&'static str, String> =
            vars.iter().map(|(k, v)| (*k, v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn reads_all_variables() {
        let cfg = PastConfig::from_lookup(lookup(&[
            (PAST_LOG_STORE_THRESHOLD_ENV, "info"),
            (PAST_LOG_EMIT_THRESHOLD_ENV, "40"),
            (PAST_LOG_MAX_BUFFERED_ENV, "-1"),
        ]))
        .unwrap();
        assert_eq!(cfg.store_threshold, Some(Level::Info));
        assert_eq!(cfg.emit_threshold, Some(Level::Error));
        assert_eq!(cfg.max_buffered, Some(-1));
    }

    #[test]
    fn empty_environment_yields_empty_config() {
        assert_eq!(PastConfig::from_lookup(lookup(&[])).unwrap(), PastConfig::default());
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let err = PastConfig::from_lookup(lookup(&[(PAST_LOG_MAX_BUFFERED_ENV, "-3")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidEnv {
                key: PAST_LOG_MAX_BUFFERED_ENV,
                value: "-3".to_string()
            }
        );
        assert!(PastConfig::from_lookup(lookup(&[(PAST_LOG_EMIT_THRESHOLD_ENV, "loud")])).is_err());
    }
}
