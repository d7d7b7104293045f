//! Environment-based configuration.

use std::collections::HashMap;
use std::time::Duration;

/// Environment configuration prefix.
pub const DEFAULT_PREFIX: &str = "CONVERSE";

/// Environment variable reader.
///
/// Reads `PREFIX_NAME` variables from the process environment, or from a
/// fixed set of pairs when built with [`EnvConfig::from_pairs`].
#[derive(Debug, Clone)]
pub struct EnvConfig {
    /// Prefix for environment variables.
    prefix: String,
    /// Fixed values used instead of the process environment.
    fixed: Option<HashMap<String, String>>,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl EnvConfig {
    /// Create a reader over the process environment.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            fixed: None,
        }
    }

    /// Create a reader over fixed `(full name, value)` pairs.
    #[must_use]
    pub fn from_pairs<I, K, V>(prefix: impl Into<String>, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            prefix: prefix.into(),
            fixed: Some(
                pairs
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    /// Build the full environment variable name.
    fn var_name(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_uppercase()
        } else {
            format!("{}_{}", self.prefix, name.to_uppercase())
        }
    }

    /// Get a string value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<String> {
        let var_name = self.var_name(name);
        match &self.fixed {
            Some(fixed) => fixed.get(&var_name).cloned(),
            None => std::env::var(&var_name).ok(),
        }
    }

    /// Get a parsed value. Unparseable values are ignored.
    #[must_use]
    pub fn parse<T: std::str::FromStr>(&self, name: &str) -> Option<T> {
        self.get(name).and_then(|v| v.trim().parse().ok())
    }

    /// Get a boolean value.
    #[must_use]
    pub fn bool(&self, name: &str) -> Option<bool> {
        self.get(name).map(|v| {
            matches!(
                v.to_lowercase().as_str(),
                "1" | "true" | "yes" | "on" | "enabled"
            )
        })
    }

    /// Get a duration in seconds (fractions allowed). Negative or
    /// out-of-range values are ignored.
    #[must_use]
    pub fn duration_secs(&self, name: &str) -> Option<Duration> {
        self.parse::<f64>(name)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }

    /// Get a duration in milliseconds.
    #[must_use]
    pub fn duration_millis(&self, name: &str) -> Option<Duration> {
        self.parse::<u64>(name).map(Duration::from_millis)
    }

    /// Check if a variable is set.
    #[must_use]
    pub fn is_set(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

/// Recognized variable names (without prefix).
pub mod vars {
    /// Maximum number of rounds.
    pub const MAX_ROUNDS: &str = "MAX_ROUNDS";
    /// Idle timeout in seconds.
    pub const IDLE_TIMEOUT_SECS: &str = "IDLE_TIMEOUT_SECS";
    /// Prompt window size in characters.
    pub const WINDOW_SIZE: &str = "WINDOW_SIZE";
    /// Final grace period in milliseconds.
    pub const FINAL_GRACE_MS: &str = "FINAL_GRACE_MS";
    /// Path to a TOML configuration file.
    pub const CONFIG: &str = "CONFIG";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_config_prefix() {
        let config = EnvConfig::new("TEST");
        assert_eq!(config.var_name("foo"), "TEST_FOO");
        assert_eq!(config.var_name("bar_baz"), "TEST_BAR_BAZ");
        assert_eq!(EnvConfig::new("").var_name("foo"), "FOO");
    }

    #[test]
    fn fixed_pairs() {
        let config = EnvConfig::from_pairs(
            "APP",
            [("APP_ENABLED", "yes"), ("APP_DISABLED", "off"), ("APP_N", " 12 ")],
        );
        assert_eq!(config.bool("enabled"), Some(true));
        assert_eq!(config.bool("disabled"), Some(false));
        assert_eq!(config.parse::<u32>("n"), Some(12));
        assert!(!config.is_set("missing"));
    }

    #[test]
    fn durations() {
        let config = EnvConfig::from_pairs(
            "APP",
            [
                ("APP_T", "1.5"),
                ("APP_MS", "250"),
                ("APP_BAD", "-3"),
                ("APP_HUGE", "1e300"),
                ("APP_NAN", "NaN"),
            ],
        );
        assert_eq!(config.duration_secs("t"), Some(Duration::from_millis(1500)));
        assert_eq!(config.duration_millis("ms"), Some(Duration::from_millis(250)));
        assert_eq!(config.duration_secs("bad"), None);
        assert_eq!(config.duration_secs("huge"), None);
        assert_eq!(config.duration_secs("nan"), None);
    }

    #[test]
    fn process_environment_lookup() {
        // PATH is set in any realistic test environment.
        let config = EnvConfig::new("");
        if std::env::var("PATH").is_ok() {
            assert!(config.is_set("PATH"));
        }
    }
}
