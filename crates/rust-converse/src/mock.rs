//! Mock peers for testing.
//!
//! [`MockTransport`] plays back a scripted [`EventTimeline`] as an async
//! duplex stream, so a session can be driven without spawning anything.
//!
//! # Example
//!
//! ```rust
//! use rust_converse::mock::MockBuilder;
//!
//! let channel = MockBuilder::new()
//!     .line("Patient: My chest hurts.")
//!     .output("Doctor: ")
//!     .await_input()
//!     .line("Patient: Since this morning.")
//!     .eof()
//!     .channel();
//! ```

pub mod event;
pub mod transport;

use std::time::Duration;

pub use event::{EventTimeline, MockEvent};
pub use transport::MockTransport;

use crate::channel::TransportChannel;

/// Builder for scripted mock peers.
#[derive(Debug, Clone, Default)]
pub struct MockBuilder {
    events: Vec<MockEvent>,
}

impl MockBuilder {
    /// Create an empty script.
    #[must_use]
    pub const fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Emit text.
    #[must_use]
    pub fn output(mut self, data: &str) -> Self {
        self.events.push(MockEvent::output_str(data));
        self
    }

    /// Emit raw bytes.
    #[must_use]
    pub fn output_bytes(mut self, data: &[u8]) -> Self {
        self.events.push(MockEvent::output(data));
        self
    }

    /// Emit text followed by a newline.
    #[must_use]
    pub fn line(mut self, text: &str) -> Self {
        self.events.push(MockEvent::output(format!("{text}\n")));
        self
    }

    /// Pause.
    #[must_use]
    pub fn delay(mut self, duration: Duration) -> Self {
        self.events.push(MockEvent::delay(duration));
        self
    }

    /// Pause for `ms` milliseconds.
    #[must_use]
    pub fn delay_ms(mut self, ms: u64) -> Self {
        self.events.push(MockEvent::delay_ms(ms));
        self
    }

    /// Wait for the driver to write before continuing.
    #[must_use]
    pub fn await_input(mut self) -> Self {
        self.events.push(MockEvent::AwaitInput);
        self
    }

    /// Close the output stream.
    #[must_use]
    pub fn eof(mut self) -> Self {
        self.events.push(MockEvent::Eof);
        self
    }

    /// Fail the next read.
    #[must_use]
    pub fn error(mut self, msg: &str) -> Self {
        self.events.push(MockEvent::error(msg));
        self
    }

    /// Stop accepting input.
    #[must_use]
    pub fn close_input(mut self) -> Self {
        self.events.push(MockEvent::CloseInput);
        self
    }

    /// Build the mock transport.
    #[must_use]
    pub fn build(self) -> MockTransport {
        MockTransport::from_timeline(EventTimeline::from_events(self.events))
    }

    /// Build a channel over the mock transport.
    #[must_use]
    pub fn channel(self) -> TransportChannel<MockTransport> {
        TransportChannel::new(self.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Channel;

    #[tokio::test]
    async fn builder_channel_plays_script() {
        let transport = MockBuilder::new()
            .line("Patient: hello")
            .output("Doctor: ")
            .eof()
            .build();
        let mut channel = TransportChannel::new(transport.clone());
        channel.start().await.unwrap();

        let mut text = String::new();
        while let Some(chunk) = channel.read_chunk().await.unwrap() {
            text.push_str(&chunk);
        }
        assert_eq!(text, "Patient: hello\nDoctor: ");
        assert_eq!(transport.remaining_events(), 0);

        channel.stop().await;
        assert_eq!(transport.shutdown_calls(), 1);
    }
}
