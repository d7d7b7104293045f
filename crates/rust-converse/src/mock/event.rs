//! Scripted events for the mock transport.

use std::time::Duration;

/// One step in a mock peer's behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    /// Bytes the peer writes.
    Output(Vec<u8>),
    /// Pause before the next event.
    Delay(Duration),
    /// Hold further output until the driver writes something.
    AwaitInput,
    /// The peer closes its output.
    Eof,
    /// The next read fails with this message.
    Error(String),
    /// The peer stops accepting input; writes fail with a broken pipe.
    CloseInput,
}

impl MockEvent {
    /// Create an output event from bytes.
    pub fn output(data: impl Into<Vec<u8>>) -> Self {
        Self::Output(data.into())
    }

    /// Create an output event from a string.
    #[must_use]
    pub fn output_str(s: &str) -> Self {
        Self::Output(s.as_bytes().to_vec())
    }

    /// Create a delay event.
    #[must_use]
    pub const fn delay(duration: Duration) -> Self {
        Self::Delay(duration)
    }

    /// Create a delay event from milliseconds.
    #[must_use]
    pub const fn delay_ms(ms: u64) -> Self {
        Self::Delay(Duration::from_millis(ms))
    }

    /// Create an error event.
    pub fn error(msg: impl Into<String>) -> Self {
        Self::Error(msg.into())
    }

    /// Check if this is an output event.
    #[must_use]
    pub const fn is_output(&self) -> bool {
        matches!(self, Self::Output(_))
    }

    /// Check if this is a delay event.
    #[must_use]
    pub const fn is_delay(&self) -> bool {
        matches!(self, Self::Delay(_))
    }

    /// Check if this is an EOF event.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        matches!(self, Self::Eof)
    }
}

/// An ordered script of events.
#[derive(Debug, Clone, Default)]
pub struct EventTimeline {
    events: Vec<MockEvent>,
    position: usize,
}

impl EventTimeline {
    /// Create an empty timeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a timeline from a list of events.
    #[must_use]
    pub const fn from_events(events: Vec<MockEvent>) -> Self {
        Self {
            events,
            position: 0,
        }
    }

    /// Append an event.
    pub fn push(&mut self, event: MockEvent) {
        self.events.push(event);
    }

    /// Take the next event.
    pub fn next(&mut self) -> Option<&MockEvent> {
        let event = self.events.get(self.position)?;
        self.position += 1;
        Some(event)
    }

    /// Peek at the next event without advancing.
    #[must_use]
    pub fn peek(&self) -> Option<&MockEvent> {
        self.events.get(self.position)
    }

    /// Check if there are more events.
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.position < self.events.len()
    }

    /// Number of events not yet taken.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.events.len().saturating_sub(self.position)
    }
}
