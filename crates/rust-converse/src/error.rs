//! Error types for rust-converse.
//!
//! Only two kinds of failure escape a session run: the channel could not be
//! started, or the reply source failed. Everything else a session can run
//! into (peer exit, broken pipe, stalled output) is reported as an
//! [`EndReason`](crate::types::EndReason) alongside the transcript.

use std::time::Duration;

use thiserror::Error;

use crate::transcript::Transcript;

/// The main error type for rust-converse operations.
#[derive(Debug, Error)]
pub enum ConverseError {
    /// Failed to start the peer process.
    #[error("failed to start channel: {0}")]
    Spawn(#[from] SpawnError),

    /// The reply source failed to produce a reply.
    #[error("reply source failed: {message}")]
    ReplySource {
        /// Description of the failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A session was aborted by a reply source failure.
    ///
    /// Carries whatever was exchanged before the failure.
    #[error("session aborted after {rounds} round(s): {source}")]
    SessionAborted {
        /// The failure that aborted the session.
        source: Box<ConverseError>,
        /// Transcript accumulated up to the failure.
        transcript: Transcript,
        /// Rounds completed before the failure.
        rounds: usize,
    },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An I/O error occurred with additional context.
    #[error("{context}: {source}")]
    IoWithContext {
        /// What operation was being performed.
        context: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The channel is not running.
    #[error("channel is closed")]
    ChannelClosed,

    /// Invalid regex pattern.
    #[error("invalid regex pattern: {0}")]
    Regex(#[from] regex::Error),

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Configuration file could not be parsed.
    #[error("invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Transcript serialization failed.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors related to starting the peer process.
#[derive(Debug, Error)]
pub enum SpawnError {
    /// Command not found.
    #[error("command not found: {command}")]
    CommandNotFound {
        /// The command that was not found.
        command: String,
    },

    /// Permission denied.
    #[error("permission denied: {path}")]
    PermissionDenied {
        /// The path that could not be accessed.
        path: String,
    },

    /// Working directory error.
    #[error("invalid working directory: {path}")]
    InvalidWorkingDir {
        /// The invalid working directory path.
        path: String,
    },

    /// Invalid command or argument.
    #[error("invalid {kind}: {reason}")]
    InvalidArgument {
        /// The kind of invalid input (e.g., "command", "argument").
        kind: String,
        /// The value that was invalid.
        value: String,
        /// The reason it's invalid.
        reason: String,
    },

    /// A standard stream could not be captured.
    #[error("failed to capture child {stream}")]
    StreamUnavailable {
        /// Which stream was missing.
        stream: &'static str,
    },

    /// General I/O error during spawn.
    #[error("I/O error during spawn: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for rust-converse operations.
pub type Result<T> = std::result::Result<T, ConverseError>;

impl ConverseError {
    /// Create a reply source error.
    pub fn reply_source(message: impl Into<String>) -> Self {
        Self::ReplySource {
            message: message.into(),
            source: None,
        }
    }

    /// Create a reply source error wrapping an underlying cause.
    pub fn reply_source_with(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::ReplySource {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a reply source timeout error.
    #[must_use]
    pub fn reply_timeout(duration: Duration) -> Self {
        Self::reply_source(format!("no reply within {duration:?}"))
    }

    /// Create a session aborted error.
    #[must_use]
    pub fn aborted(source: Self, transcript: Transcript, rounds: usize) -> Self {
        Self::SessionAborted {
            source: Box::new(source),
            transcript,
            rounds,
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an I/O error with context.
    pub fn io_context(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::IoWithContext {
            context: context.into(),
            source,
        }
    }

    /// Wrap an I/O result with context.
    pub fn with_io_context<T>(result: std::io::Result<T>, context: impl Into<String>) -> Result<T> {
        result.map_err(|e| Self::io_context(context, e))
    }

    /// Check if this error is a start failure.
    #[must_use]
    pub const fn is_spawn(&self) -> bool {
        matches!(self, Self::Spawn(_))
    }

    /// Check if this error originates from the reply source.
    #[must_use]
    pub fn is_reply_source(&self) -> bool {
        match self {
            Self::ReplySource { .. } => true,
            Self::SessionAborted { source, .. } => source.is_reply_source(),
            _ => false,
        }
    }

    /// Get the partial transcript if this error carries one.
    #[must_use]
    pub const fn transcript(&self) -> Option<&Transcript> {
        match self {
            Self::SessionAborted { transcript, .. } => Some(transcript),
            _ => None,
        }
    }
}

impl SpawnError {
    /// Create a command not found error.
    pub fn command_not_found(command: impl Into<String>) -> Self {
        Self::CommandNotFound {
            command: command.into(),
        }
    }

    /// Create a permission denied error.
    pub fn permission_denied(path: impl Into<String>) -> Self {
        Self::PermissionDenied { path: path.into() }
    }

    /// Create an invalid working directory error.
    pub fn invalid_working_dir(path: impl Into<String>) -> Self {
        Self::InvalidWorkingDir { path: path.into() }
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(
        kind: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidArgument {
            kind: kind.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Classify an I/O error raised while spawning `command`.
    #[must_use]
    pub fn from_spawn_io(command: &str, error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => Self::command_not_found(command),
            std::io::ErrorKind::PermissionDenied => Self::permission_denied(command),
            _ => Self::Io(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Speaker;

    #[test]
    fn reply_source_display() {
        let err = ConverseError::reply_source("backend unavailable");
        assert!(err.to_string().contains("backend unavailable"));
        assert!(err.is_reply_source());
        assert!(!err.is_spawn());
    }

    #[test]
    fn reply_timeout_mentions_duration() {
        let err = ConverseError::reply_timeout(Duration::from_secs(2));
        assert!(err.to_string().contains("2s"));
        assert!(err.is_reply_source());
    }

    #[test]
    fn aborted_keeps_transcript() {
        let mut transcript = Transcript::new();
        transcript.push(Speaker::Peer, "hello", Duration::ZERO);

        let err = ConverseError::aborted(ConverseError::reply_source("boom"), transcript, 3);
        assert!(err.is_reply_source());
        assert_eq!(err.transcript().map(Transcript::len), Some(1));
        assert!(err.to_string().contains("3 round(s)"));
    }

    #[test]
    fn spawn_error_display() {
        let err = SpawnError::command_not_found("/usr/bin/nonexistent");
        assert!(err.to_string().contains("nonexistent"));

        let err: ConverseError = err.into();
        assert!(err.is_spawn());
    }

    #[test]
    fn spawn_io_classification() {
        let err = SpawnError::from_spawn_io(
            "missing",
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        );
        assert!(matches!(err, SpawnError::CommandNotFound { .. }));

        let err = SpawnError::from_spawn_io(
            "locked",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, SpawnError::PermissionDenied { .. }));
    }

    #[test]
    fn io_with_context_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err = ConverseError::io_context("writing reply", io_err);
        let msg = err.to_string();
        assert!(msg.contains("writing reply"));
        assert!(msg.contains("pipe closed"));
    }

    #[test]
    fn with_io_context_success() {
        let result: std::io::Result<i32> = Ok(42);
        let value = ConverseError::with_io_context(result, "some operation").unwrap();
        assert_eq!(value, 42);
    }
}
