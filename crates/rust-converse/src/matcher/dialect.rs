//! Prompt dialects and line classification.
//!
//! A [`Dialect`] is the table of structural patterns used to read a peer's
//! output: prompt tails that yield the turn, the label that introduces a
//! peer utterance, and the phrases that close a session. The built-in
//! clinical dialect recognizes output such as:
//!
//! ```text
//! Patient [10%]: I have a headache.
//! Doctor [20%]:
//! Scene 0, The diagnosis was CORRECT 100
//! ```

use std::sync::LazyLock;

use super::pattern::{CompiledRegex, PatternSet};
use crate::error::Result;

/// Prompt tails of the built-in dialect.
pub const CLINIC_PROMPTS: &[&str] = &[
    r"Your\s+response",
    r"Enter\s+your\s+response",
    r"Doctor(?:\s*\[\d+%\])?\s*:?",
    r"Question\s+for\s+patient\s*:?",
];

/// Peer labels of the built-in dialect.
pub const CLINIC_PEER_LABELS: &[&str] = &["Patient", "P"];

/// End-of-session phrases of the built-in dialect.
pub const CLINIC_END_SIGNALS: &[&str] = &[
    r"final\s+diagnosis",
    r"(?:Scene\s+\d+,\s+)?the\s+diagnosis\s+was\s+(?:correct|incorrect)",
    r"case\s+over",
    r"thank\s+you",
];

static CLINIC: LazyLock<Dialect> = LazyLock::new(|| {
    DialectBuilder::clinic()
        .build()
        .expect("built-in dialect patterns are valid")
});

/// Classification of one complete output line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineClass {
    /// The peer spoke; carries the utterance text.
    PeerUtterance(String),
    /// The line closes the session.
    ///
    /// If the line was also a peer utterance its text is carried along so
    /// it can still be recorded.
    EndOfSession {
        /// Peer utterance on the same line, if any.
        utterance: Option<String>,
    },
    /// Anything else. Ignored.
    Other,
}

impl LineClass {
    /// Check if this line ends the session.
    #[must_use]
    pub const fn is_end(&self) -> bool {
        matches!(self, Self::EndOfSession { .. })
    }

    /// The peer utterance carried by this line, if any.
    #[must_use]
    pub fn utterance(&self) -> Option<&str> {
        match self {
            Self::PeerUtterance(text) => Some(text),
            Self::EndOfSession { utterance } => utterance.as_deref(),
            Self::Other => None,
        }
    }
}

/// A compiled table of prompt, peer and end-of-session patterns.
#[derive(Debug, Clone)]
pub struct Dialect {
    prompts: PatternSet,
    peer: Option<CompiledRegex>,
    end_signals: PatternSet,
}

impl Dialect {
    /// The built-in clinical dialect.
    #[must_use]
    pub fn clinic() -> &'static Self {
        &CLINIC
    }

    /// Start building a custom dialect.
    #[must_use]
    pub fn builder() -> DialectBuilder {
        DialectBuilder::new()
    }

    /// Check whether `buffer` ends in a prompt that yields the turn.
    ///
    /// Only the last `window` characters are inspected, with trailing
    /// whitespace trimmed. A zero window never matches.
    #[must_use]
    pub fn is_turn_yielding_tail(&self, buffer: &str, window: usize) -> bool {
        let tail = last_chars(buffer, window).trim_end();
        !tail.is_empty() && self.prompts.is_match(tail)
    }

    /// Classify one complete line of output.
    ///
    /// A trailing carriage return is ignored.
    #[must_use]
    pub fn classify_line(&self, line: &str) -> LineClass {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let utterance = self.peer_utterance(line);

        if self.end_signals.is_match(line) {
            LineClass::EndOfSession { utterance }
        } else if let Some(text) = utterance {
            LineClass::PeerUtterance(text)
        } else {
            LineClass::Other
        }
    }

    /// Number of prompt patterns.
    #[must_use]
    pub fn prompt_count(&self) -> usize {
        self.prompts.len()
    }

    /// Number of end-of-session patterns.
    #[must_use]
    pub fn end_signal_count(&self) -> usize {
        self.end_signals.len()
    }

    fn peer_utterance(&self, line: &str) -> Option<String> {
        let text = self.peer.as_ref()?.capture(line)?.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

impl Default for Dialect {
    fn default() -> Self {
        CLINIC.clone()
    }
}

/// Builder for [`Dialect`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DialectBuilder {
    /// Prompt tail patterns. Each is anchored to the end of the window.
    pub prompts: Vec<String>,
    /// Alternatives for the label that introduces a peer utterance.
    pub peer_labels: Vec<String>,
    /// End-of-session phrase patterns.
    pub end_signals: Vec<String>,
    /// Only accept end phrases at the start of a line.
    pub anchor_end_signals: bool,
}

impl DialectBuilder {
    /// Create a builder with no patterns.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder preloaded with the built-in clinical dialect.
    #[must_use]
    pub fn clinic() -> Self {
        Self {
            prompts: to_owned(CLINIC_PROMPTS),
            peer_labels: to_owned(CLINIC_PEER_LABELS),
            end_signals: to_owned(CLINIC_END_SIGNALS),
            anchor_end_signals: false,
        }
    }

    /// Add a prompt tail pattern.
    #[must_use]
    pub fn prompt(mut self, pattern: impl Into<String>) -> Self {
        self.prompts.push(pattern.into());
        self
    }

    /// Add a peer label alternative (a regex fragment such as `Patient`).
    #[must_use]
    pub fn peer_label(mut self, label: impl Into<String>) -> Self {
        self.peer_labels.push(label.into());
        self
    }

    /// Add an end-of-session phrase pattern.
    #[must_use]
    pub fn end_signal(mut self, pattern: impl Into<String>) -> Self {
        self.end_signals.push(pattern.into());
        self
    }

    /// Require end phrases to start the line.
    #[must_use]
    pub const fn anchor_end_signals(mut self, anchor: bool) -> Self {
        self.anchor_end_signals = anchor;
        self
    }

    /// Compile the dialect.
    pub fn build(&self) -> Result<Dialect> {
        let mut prompts = PatternSet::new();
        for pattern in &self.prompts {
            prompts.add(CompiledRegex::new(format!(r"(?:{pattern})\s*$"))?);
        }

        let peer = if self.peer_labels.is_empty() {
            None
        } else {
            let labels = self.peer_labels.join("|");
            Some(CompiledRegex::new(format!(
                r"^\s*(?:{labels})(?:\s*\[\d+%\])?\s*[:：]\s*(.+)$"
            ))?)
        };

        let mut end_signals = PatternSet::new();
        for pattern in &self.end_signals {
            let source = if self.anchor_end_signals {
                format!(r"^\s*(?:{pattern})")
            } else {
                pattern.clone()
            };
            end_signals.add(CompiledRegex::new(source)?);
        }

        Ok(Dialect {
            prompts,
            peer,
            end_signals,
        })
    }
}

fn to_owned(patterns: &[&str]) -> Vec<String> {
    patterns.iter().map(|p| (*p).to_string()).collect()
}

/// The last `n` characters of `text`.
fn last_chars(text: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match text.char_indices().rev().nth(n - 1) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}
