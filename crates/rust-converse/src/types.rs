//! Common types used throughout rust-converse.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Who produced an utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    /// The session driver (replies written to the peer).
    Driver,
    /// The peer process.
    Peer,
}

impl Speaker {
    /// Label used when rendering transcripts.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Driver => "DRIVER",
            Self::Peer => "PEER",
        }
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// The configured number of prompt-triggered replies was reached.
    RoundLimit,
    /// The peer printed an end-of-session line.
    EndSignal,
    /// The peer closed its output or stopped accepting input.
    StreamClosed,
    /// No output arrived within the idle timeout.
    Timeout,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::RoundLimit => "round limit reached",
            Self::EndSignal => "end signal received",
            Self::StreamClosed => "stream closed",
            Self::Timeout => "idle timeout",
        };
        f.write_str(s)
    }
}

/// State of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Session is exchanging turns.
    #[default]
    Running,
    /// Session has ended. Terminal.
    Ended(EndReason),
}

impl SessionState {
    /// Check if the session is still running.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Get the end reason, if the session has ended.
    #[must_use]
    pub const fn end_reason(&self) -> Option<EndReason> {
        match self {
            Self::Running => None,
            Self::Ended(reason) => Some(*reason),
        }
    }

    /// Transition to `Ended`. Has no effect once the session has ended.
    pub fn end(&mut self, reason: EndReason) {
        if self.is_running() {
            *self = Self::Ended(reason);
        }
    }
}

/// Counters collected over one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// Units (chunks) read from the channel.
    pub units: u64,
    /// Characters received.
    pub chars: u64,
    /// Completed output lines.
    pub lines: u64,
    /// Lines recognized as peer utterances.
    pub peer_lines: u64,
    /// Lines that were neither peer utterances nor end signals.
    pub ignored_lines: u64,
    /// Replies written to the peer.
    pub replies: u64,
}
