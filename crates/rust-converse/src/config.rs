//! Configuration types for rust-converse.
//!
//! [`DriverConfig`] governs one session run; [`ProcessConfig`] describes
//! the peer process a [`ProcessChannel`](crate::channel::ProcessChannel)
//! launches. Both can be built in code, loaded from a TOML file
//! ([`file`]), or adjusted from `CONVERSE_*` environment variables
//! ([`env`]).

pub mod env;
pub mod file;

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

pub use env::EnvConfig;
pub use file::ConverseConfig;

use crate::error::{ConverseError, Result, SpawnError};
use crate::matcher::{self, Dialect, buffer};

/// Default maximum number of prompt-triggered replies.
pub const DEFAULT_MAX_ROUNDS: usize = 20;

/// Default idle timeout (3 minutes).
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(180);

/// Default time to keep reading after the round limit.
pub const DEFAULT_FINAL_GRACE: Duration = Duration::from_millis(300);

/// Default number of bytes requested per channel read.
pub const DEFAULT_READ_CHUNK: usize = 4096;

/// Configuration for a session run.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Maximum number of prompt-triggered replies.
    pub max_rounds: usize,
    /// Longest tolerated silence from the peer. The window restarts on every
    /// chunk of output and again after each reply is written.
    pub idle_timeout: Duration,
    /// Trailing characters inspected for a prompt.
    pub window_size: usize,
    /// Capacity of the trailing buffer, in characters.
    pub trailing_capacity: usize,
    /// How long to keep recording peer lines after the round limit.
    pub final_grace: Duration,
    /// Patterns used to read the peer's output.
    pub dialect: Dialect,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            window_size: matcher::DEFAULT_WINDOW,
            trailing_capacity: buffer::DEFAULT_CAPACITY,
            final_grace: DEFAULT_FINAL_GRACE,
            dialect: Dialect::default(),
        }
    }
}

impl DriverConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `CONVERSE_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env(&EnvConfig::default())
    }

    /// Set the maximum number of rounds.
    #[must_use]
    pub const fn max_rounds(mut self, rounds: usize) -> Self {
        self.max_rounds = rounds;
        self
    }

    /// Set the idle timeout. The window restarts after each reply.
    #[must_use]
    pub const fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set the prompt window size.
    #[must_use]
    pub const fn window_size(mut self, size: usize) -> Self {
        self.window_size = size;
        self
    }

    /// Set the trailing buffer capacity.
    #[must_use]
    pub const fn trailing_capacity(mut self, capacity: usize) -> Self {
        self.trailing_capacity = capacity;
        self
    }

    /// Set the final grace period.
    #[must_use]
    pub const fn final_grace(mut self, grace: Duration) -> Self {
        self.final_grace = grace;
        self
    }

    /// Set the dialect.
    #[must_use]
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Apply overrides from environment variables.
    #[must_use]
    pub fn with_env(mut self, source: &EnvConfig) -> Self {
        if let Some(rounds) = source.parse(env::vars::MAX_ROUNDS) {
            self.max_rounds = rounds;
        }
        if let Some(timeout) = source.duration_secs(env::vars::IDLE_TIMEOUT_SECS) {
            self.idle_timeout = timeout;
        }
        if let Some(window) = source.parse(env::vars::WINDOW_SIZE) {
            self.window_size = window;
        }
        if let Some(grace) = source.duration_millis(env::vars::FINAL_GRACE_MS) {
            self.final_grace = grace;
        }
        self
    }

    /// Check the configuration before a session starts.
    pub fn validate(&self) -> Result<()> {
        if self.max_rounds == 0 {
            return Err(ConverseError::config("max_rounds must be at least 1"));
        }
        if self.idle_timeout.is_zero() {
            return Err(ConverseError::config("idle_timeout must be positive"));
        }
        if self.window_size == 0 {
            return Err(ConverseError::config("window_size must be positive"));
        }
        if self.trailing_capacity < self.window_size {
            return Err(ConverseError::config(format!(
                "trailing_capacity ({}) must be at least window_size ({})",
                self.trailing_capacity, self.window_size
            )));
        }
        Ok(())
    }
}

/// Shutdown strategy for stopping the peer process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShutdownStrategy {
    /// Close stdin and wait, then kill.
    Graceful,
    /// Send SIGTERM (or equivalent) and wait, then kill.
    Terminate,
    /// Kill immediately.
    Kill,
    /// Close stdin, then terminate, then kill.
    #[default]
    Escalating,
}

/// Configuration for stopping the peer process.
#[derive(Debug, Clone, Copy)]
pub struct ShutdownConfig {
    /// The shutdown strategy to use.
    pub strategy: ShutdownStrategy,
    /// How long to wait for a voluntary exit after stdin closes.
    pub exit_wait: Duration,
    /// How long to wait after SIGTERM before killing.
    pub terminate_wait: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            strategy: ShutdownStrategy::Escalating,
            exit_wait: Duration::from_secs(3),
            terminate_wait: Duration::from_secs(2),
        }
    }
}

impl ShutdownConfig {
    /// Kill the process without waiting.
    #[must_use]
    pub fn kill() -> Self {
        Self {
            strategy: ShutdownStrategy::Kill,
            ..Default::default()
        }
    }

    /// Set the strategy.
    #[must_use]
    pub const fn with_strategy(mut self, strategy: ShutdownStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the voluntary exit wait.
    #[must_use]
    pub const fn with_exit_wait(mut self, wait: Duration) -> Self {
        self.exit_wait = wait;
        self
    }

    /// Set the wait after SIGTERM.
    #[must_use]
    pub const fn with_terminate_wait(mut self, wait: Duration) -> Self {
        self.terminate_wait = wait;
        self
    }
}

/// Configuration for launching the peer process.
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    /// The command to execute.
    pub command: String,
    /// Command arguments.
    pub args: Vec<String>,
    /// Extra environment variables.
    pub env: HashMap<String, String>,
    /// Whether to inherit the parent environment.
    pub inherit_env: bool,
    /// Working directory for the process.
    pub working_dir: Option<PathBuf>,
    /// Ask the peer to flush output immediately and speak UTF-8.
    pub unbuffered: bool,
    /// Bytes requested per read.
    pub read_chunk: usize,
    /// How to stop the process.
    pub shutdown: ShutdownConfig,
}

impl ProcessConfig {
    /// Create a configuration for `command`.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
            inherit_env: true,
            working_dir: None,
            unbuffered: true,
            read_chunk: DEFAULT_READ_CHUNK,
            shutdown: ShutdownConfig::default(),
        }
    }

    /// Add an argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set whether to inherit the parent environment.
    #[must_use]
    pub const fn inherit_env(mut self, inherit: bool) -> Self {
        self.inherit_env = inherit;
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Set whether unbuffered-output hints are added to the environment.
    #[must_use]
    pub const fn unbuffered(mut self, unbuffered: bool) -> Self {
        self.unbuffered = unbuffered;
        self
    }

    /// Set the shutdown configuration.
    #[must_use]
    pub const fn shutdown(mut self, shutdown: ShutdownConfig) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Environment the process will see on top of what it inherits.
    #[must_use]
    pub fn effective_env(&self) -> HashMap<String, String> {
        let mut env = HashMap::new();
        if self.unbuffered {
            env.insert("PYTHONUNBUFFERED".to_string(), "1".to_string());
            env.insert("PYTHONUTF8".to_string(), "1".to_string());
        }
        env.extend(self.env.iter().map(|(k, v)| (k.clone(), v.clone())));
        env
    }

    /// Check the configuration before spawning.
    pub fn validate(&self) -> std::result::Result<(), SpawnError> {
        if self.command.trim().is_empty() {
            return Err(SpawnError::invalid_argument(
                "command",
                &self.command,
                "command is empty",
            ));
        }
        if self.command.contains('\0') {
            return Err(SpawnError::invalid_argument(
                "command",
                &self.command,
                "contains a NUL byte",
            ));
        }
        if let Some(arg) = self.args.iter().find(|a| a.contains('\0')) {
            return Err(SpawnError::invalid_argument(
                "argument",
                arg,
                "contains a NUL byte",
            ));
        }
        if let Some(dir) = &self.working_dir {
            if !dir.is_dir() {
                return Err(SpawnError::invalid_working_dir(dir.display().to_string()));
            }
        }
        if self.read_chunk == 0 {
            return Err(SpawnError::invalid_argument(
                "read_chunk",
                "0",
                "must be positive",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_defaults_are_valid() {
        let config = DriverConfig::default();
        assert_eq!(config.max_rounds, DEFAULT_MAX_ROUNDS);
        assert_eq!(config.window_size, 200);
        assert_eq!(config.trailing_capacity, 512);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn driver_rejects_bad_values() {
        assert!(DriverConfig::new().max_rounds(0).validate().is_err());
        assert!(
            DriverConfig::new()
                .idle_timeout(Duration::ZERO)
                .validate()
                .is_err()
        );
        assert!(DriverConfig::new().window_size(0).validate().is_err());
        assert!(
            DriverConfig::new()
                .window_size(600)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn driver_env_overrides() {
        let env = EnvConfig::from_pairs(
            "CONVERSE",
            [
                ("CONVERSE_MAX_ROUNDS", "3"),
                ("CONVERSE_IDLE_TIMEOUT_SECS", "7"),
                ("CONVERSE_FINAL_GRACE_MS", "50"),
                ("CONVERSE_WINDOW_SIZE", "not-a-number"),
            ],
        );
        let config = DriverConfig::default().with_env(&env);
        assert_eq!(config.max_rounds, 3);
        assert_eq!(config.idle_timeout, Duration::from_secs(7));
        assert_eq!(config.final_grace, Duration::from_millis(50));
        assert_eq!(config.window_size, 200);
    }

    #[test]
    fn driver_env_ignores_out_of_range_timeout() {
        let env = EnvConfig::from_pairs("CONVERSE", [("CONVERSE_IDLE_TIMEOUT_SECS", "1e300")]);
        let config = DriverConfig::default().with_env(&env);
        assert_eq!(config.idle_timeout, DEFAULT_IDLE_TIMEOUT);
    }

    #[test]
    fn process_env_hints() {
        let config = ProcessConfig::new("python3").env("PYTHONUTF8", "0");
        let env = config.effective_env();
        assert_eq!(env.get("PYTHONUNBUFFERED").map(String::as_str), Some("1"));
        assert_eq!(env.get("PYTHONUTF8").map(String::as_str), Some("0"));

        let env = ProcessConfig::new("cat").unbuffered(false).effective_env();
        assert!(env.is_empty());
    }

    #[test]
    fn process_validation() {
        assert!(ProcessConfig::new("/bin/sh").validate().is_ok());
        assert!(matches!(
            ProcessConfig::new("  ").validate(),
            Err(SpawnError::InvalidArgument { .. })
        ));
        assert!(matches!(
            ProcessConfig::new("sh").arg("a\0b").validate(),
            Err(SpawnError::InvalidArgument { .. })
        ));
        assert!(matches!(
            ProcessConfig::new("sh")
                .working_dir("/definitely/not/a/dir")
                .validate(),
            Err(SpawnError::InvalidWorkingDir { .. })
        ));
    }

    #[test]
    fn shutdown_builders() {
        let config = ShutdownConfig::default()
            .with_strategy(ShutdownStrategy::Terminate)
            .with_terminate_wait(Duration::from_millis(10));
        assert_eq!(config.strategy, ShutdownStrategy::Terminate);
        assert_eq!(config.terminate_wait, Duration::from_millis(10));
        assert_eq!(ShutdownConfig::kill().strategy, ShutdownStrategy::Kill);
    }
}
