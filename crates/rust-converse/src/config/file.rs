//! File-based configuration loading.
//!
//! ```toml
//! [driver]
//! max_rounds = 10
//! idle_timeout_secs = 120
//!
//! [process]
//! command = "python3"
//! args = ["-u", "agentclinic.py", "--inf_type", "human_doctor"]
//! working_dir = "/opt/agentclinic"
//!
//! [dialect]
//! anchor_end_signals = true
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{DriverConfig, EnvConfig, ProcessConfig, ShutdownConfig, ShutdownStrategy};
use crate::error::{ConverseError, Result};
use crate::matcher::DialectBuilder;

/// Top-level configuration file contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConverseConfig {
    /// Session driver settings.
    pub driver: DriverSection,
    /// Peer process settings.
    pub process: Option<ProcessSection>,
    /// Dialect overrides. Unset lists keep the built-in patterns.
    pub dialect: Option<DialectSection>,
}

/// `[driver]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriverSection {
    /// Maximum number of rounds.
    pub max_rounds: usize,
    /// Idle timeout in seconds.
    pub idle_timeout_secs: f64,
    /// Prompt window in characters.
    pub window_size: usize,
    /// Trailing buffer capacity in characters.
    pub trailing_capacity: usize,
    /// Final grace period in milliseconds.
    pub final_grace_ms: u64,
}

impl Default for DriverSection {
    fn default() -> Self {
        let defaults = DriverConfig::default();
        Self {
            max_rounds: defaults.max_rounds,
            idle_timeout_secs: defaults.idle_timeout.as_secs_f64(),
            window_size: defaults.window_size,
            trailing_capacity: defaults.trailing_capacity,
            final_grace_ms: defaults.final_grace.as_millis() as u64,
        }
    }
}

/// `[process]` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessSection {
    /// The command to execute.
    pub command: String,
    /// Command arguments.
    pub args: Vec<String>,
    /// Extra environment variables.
    pub env: HashMap<String, String>,
    /// Working directory.
    pub working_dir: Option<PathBuf>,
    /// Add unbuffered-output hints (default true).
    pub unbuffered: Option<bool>,
    /// Shutdown strategy: "graceful", "terminate", "kill" or "escalating".
    pub shutdown: Option<String>,
    /// Seconds to wait for a voluntary exit.
    pub exit_wait_secs: Option<f64>,
}

/// `[dialect]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DialectSection {
    /// Replacement prompt patterns.
    pub prompts: Option<Vec<String>>,
    /// Replacement peer labels.
    pub peer_labels: Option<Vec<String>>,
    /// Replacement end-of-session patterns.
    pub end_signals: Option<Vec<String>>,
    /// Only accept end phrases at the start of a line.
    pub anchor_end_signals: bool,
}

impl ConverseConfig {
    /// Parse configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = ConverseError::with_io_context(
            std::fs::read_to_string(path),
            format!("reading config file {}", path.display()),
        )?;
        Self::from_toml_str(&content)
    }

    /// Load the file named by `CONVERSE_CONFIG`, or defaults if unset.
    pub fn from_env_path(env: &EnvConfig) -> Result<Self> {
        match env.get(super::env::vars::CONFIG) {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Build the driver configuration, including any dialect overrides.
    pub fn driver_config(&self) -> Result<DriverConfig> {
        let section = &self.driver;
        let mut config = DriverConfig::default()
            .max_rounds(section.max_rounds)
            .idle_timeout(secs_field("idle_timeout_secs", section.idle_timeout_secs)?)
            .window_size(section.window_size)
            .trailing_capacity(section.trailing_capacity)
            .final_grace(Duration::from_millis(section.final_grace_ms));

        if let Some(dialect) = &self.dialect {
            config = config.dialect(dialect.to_builder().build()?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Build the process configuration, if a `[process]` table is present.
    pub fn process_config(&self) -> Result<Option<ProcessConfig>> {
        let Some(section) = &self.process else {
            return Ok(None);
        };

        let mut shutdown = ShutdownConfig::default();
        if let Some(name) = &section.shutdown {
            shutdown = shutdown.with_strategy(parse_strategy(name)?);
        }
        if let Some(secs) = section.exit_wait_secs {
            shutdown = shutdown.with_exit_wait(secs_field("exit_wait_secs", secs)?);
        }

        let mut config = ProcessConfig::new(&section.command)
            .args(section.args.iter().cloned())
            .unbuffered(section.unbuffered.unwrap_or(true))
            .shutdown(shutdown);
        for (key, value) in &section.env {
            config = config.env(key, value);
        }
        if let Some(dir) = &section.working_dir {
            config = config.working_dir(dir);
        }
        Ok(Some(config))
    }
}

impl DialectSection {
    /// Start from the built-in dialect and apply the overrides.
    #[must_use]
    pub fn to_builder(&self) -> DialectBuilder {
        let mut builder = DialectBuilder::clinic().anchor_end_signals(self.anchor_end_signals);
        if let Some(prompts) = &self.prompts {
            builder.prompts.clone_from(prompts);
        }
        if let Some(labels) = &self.peer_labels {
            builder.peer_labels.clone_from(labels);
        }
        if let Some(signals) = &self.end_signals {
            builder.end_signals.clone_from(signals);
        }
        builder
    }
}

fn secs_field(field: &str, secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs).map_err(|_| {
        ConverseError::config(format!(
            "{field} must be a non-negative number of seconds in range, got {secs}"
        ))
    })
}

fn parse_strategy(name: &str) -> Result<ShutdownStrategy> {
    match name.to_lowercase().as_str() {
        "graceful" => Ok(ShutdownStrategy::Graceful),
        "terminate" => Ok(ShutdownStrategy::Terminate),
        "kill" => Ok(ShutdownStrategy::Kill),
        "escalating" => Ok(ShutdownStrategy::Escalating),
        other => Err(ConverseError::config(format!(
            "unknown shutdown strategy: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = ConverseConfig::from_toml_str("").unwrap();
        let driver = config.driver_config().unwrap();
        assert_eq!(driver.max_rounds, 20);
        assert_eq!(driver.final_grace, Duration::from_millis(300));
        assert!(config.process_config().unwrap().is_none());
    }

    #[test]
    fn full_file() {
        let content = r#"
            [driver]
            max_rounds = 4
            idle_timeout_secs = 2.5

            [process]
            command = "python3"
            args = ["-u", "peer.py"]
            shutdown = "terminate"
            env = { OPENAI_API_KEY = "sk-test" }

            [dialect]
            peer_labels = ["Bot"]
            anchor_end_signals = true
        "#;
        let config = ConverseConfig::from_toml_str(content).unwrap();

        let driver = config.driver_config().unwrap();
        assert_eq!(driver.max_rounds, 4);
        assert_eq!(driver.idle_timeout, Duration::from_millis(2500));
        assert!(driver.dialect.classify_line("Bot: hi").utterance().is_some());
        assert!(driver.dialect.classify_line("Patient: hi").utterance().is_none());

        let process = config.process_config().unwrap().unwrap();
        assert_eq!(process.command, "python3");
        assert_eq!(process.args, vec!["-u", "peer.py"]);
        assert_eq!(process.shutdown.strategy, ShutdownStrategy::Terminate);
        assert_eq!(
            process.env.get("OPENAI_API_KEY").map(String::as_str),
            Some("sk-test")
        );
    }

    #[test]
    fn unknown_keys_rejected() {
        let err = ConverseConfig::from_toml_str("[driver]\nmax_round = 3\n").unwrap_err();
        assert!(matches!(err, ConverseError::ConfigParse(_)));
    }

    #[test]
    fn invalid_values_rejected() {
        let config = ConverseConfig::from_toml_str("[driver]\nmax_rounds = 0\n").unwrap();
        assert!(config.driver_config().is_err());

        let config =
            ConverseConfig::from_toml_str("[process]\ncommand = \"sh\"\nshutdown = \"nap\"\n")
                .unwrap();
        assert!(config.process_config().is_err());
    }

    #[test]
    fn out_of_range_seconds_rejected() {
        let config = ConverseConfig::from_toml_str("[driver]\nidle_timeout_secs = 1e300\n").unwrap();
        let err = config.driver_config().unwrap_err();
        assert!(err.to_string().contains("idle_timeout_secs"));

        let config = ConverseConfig::from_toml_str(
            "[process]\ncommand = \"sh\"\nexit_wait_secs = -1.0\n",
        )
        .unwrap();
        let err = config.process_config().unwrap_err();
        assert!(matches!(err, ConverseError::Config { .. }));
        assert!(err.to_string().contains("exit_wait_secs"));
    }

    #[test]
    fn missing_file_has_context() {
        let err = ConverseConfig::from_file("/nonexistent/converse.toml").unwrap_err();
        assert!(err.to_string().contains("reading config file"));
    }

    #[test]
    fn env_path_unset_gives_defaults() {
        let env = EnvConfig::from_pairs("CONVERSE", std::iter::empty::<(String, String)>());
        assert_eq!(
            ConverseConfig::from_env_path(&env).unwrap(),
            ConverseConfig::default()
        );
    }
}
