//! Session transcripts.
//!
//! A [`Transcript`] is the ordered record of everything said during a
//! session: peer utterances recognized in the output stream and the
//! replies the driver wrote back. It can be exported as newline-delimited
//! JSON for downstream reporting.

use std::fmt;
use std::io::Write;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::Speaker;

/// One entry in a transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utterance {
    /// Who said it.
    pub speaker: Speaker,
    /// What was said.
    pub text: String,
    /// Time since session start.
    pub elapsed: Duration,
}

/// Ordered, append-only record of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    entries: Vec<Utterance>,
}

impl Transcript {
    /// Create an empty transcript.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append an utterance.
    pub fn push(&mut self, speaker: Speaker, text: impl Into<String>, elapsed: Duration) {
        self.entries.push(Utterance {
            speaker,
            text: text.into(),
            elapsed,
        });
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in order.
    #[must_use]
    pub fn entries(&self) -> &[Utterance] {
        &self.entries
    }

    /// Iterate over entries in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Utterance> {
        self.entries.iter()
    }

    /// The most recent entry.
    #[must_use]
    pub fn last(&self) -> Option<&Utterance> {
        self.entries.last()
    }

    /// The most recent utterance by `speaker`.
    #[must_use]
    pub fn last_from(&self, speaker: Speaker) -> Option<&Utterance> {
        self.entries.iter().rev().find(|u| u.speaker == speaker)
    }

    /// Number of entries from `speaker`.
    #[must_use]
    pub fn count(&self, speaker: Speaker) -> usize {
        self.entries.iter().filter(|u| u.speaker == speaker).count()
    }

    /// `(speaker, text)` pairs, without timing.
    #[must_use]
    pub fn pairs(&self) -> Vec<(Speaker, &str)> {
        self.entries
            .iter()
            .map(|u| (u.speaker, u.text.as_str()))
            .collect()
    }

    /// Serialize as newline-delimited JSON, one utterance per line.
    pub fn to_ndjson(&self) -> Result<String> {
        let mut out = Vec::new();
        self.write_ndjson(&mut out)?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    /// Write newline-delimited JSON to `writer`.
    pub fn write_ndjson<W: Write>(&self, mut writer: W) -> Result<()> {
        for entry in &self.entries {
            serde_json::to_writer(&mut writer, entry)?;
            writer.write_all(b"\n")?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a Utterance;
    type IntoIter = std::slice::Iter<'a, Utterance>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl fmt::Display for Transcript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{}: {}", entry.speaker, entry.text)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Transcript {
        let mut t = Transcript::new();
        t.push(Speaker::Peer, "I have a headache.", Duration::from_millis(5));
        t.push(Speaker::Driver, "How long?", Duration::from_millis(9));
        t.push(Speaker::Peer, "Two days.", Duration::from_millis(20));
        t
    }

    #[test]
    fn transcript_order_and_counts() {
        let t = sample();
        assert_eq!(t.len(), 3);
        assert_eq!(t.count(Speaker::Peer), 2);
        assert_eq!(t.count(Speaker::Driver), 1);
        assert_eq!(t.last_from(Speaker::Driver).unwrap().text, "How long?");
        assert_eq!(
            t.pairs(),
            vec![
                (Speaker::Peer, "I have a headache."),
                (Speaker::Driver, "How long?"),
                (Speaker::Peer, "Two days."),
            ]
        );
    }

    #[test]
    fn ndjson_one_line_per_entry() {
        let ndjson = sample().to_ndjson().unwrap();
        let lines: Vec<_> = ndjson.lines().collect();
        assert_eq!(lines.len(), 3);

        let first: Utterance = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.speaker, Speaker::Peer);
        assert_eq!(first.text, "I have a headache.");
        assert!(lines[1].contains("\"driver\""));
    }

    #[test]
    fn display_renders_labels() {
        let text = sample().to_string();
        assert!(text.starts_with("PEER: I have a headache.\n"));
        assert!(text.contains("DRIVER: How long?\n"));
    }

    #[test]
    fn empty_transcript() {
        let t = Transcript::new();
        assert!(t.is_empty());
        assert!(t.last().is_none());
        assert_eq!(t.to_ndjson().unwrap(), "");
    }
}
