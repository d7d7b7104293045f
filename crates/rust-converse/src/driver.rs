//! The session driver.
//!
//! The driver consumes the peer's output as it arrives, reassembles it into
//! lines, and decides from structure alone when the peer has yielded the
//! turn. At that moment it asks the [`ReplySource`] for one line and writes
//! it back. A session ends when the round limit is reached, the peer
//! prints an end-of-session line, the peer's output closes, or the peer
//! stays silent longer than the idle timeout.
//!
//! # Example
//!
//! ```rust
//! use rust_converse::prelude::*;
//!
//! # async fn demo() -> rust_converse::Result<()> {
//! let mut channel = MockBuilder::new()
//!     .line("Patient [10%]: I have a headache.")
//!     .output("Doctor: ")
//!     .await_input()
//!     .eof()
//!     .channel();
//! let mut replies = Scripted::new(["How long has it lasted?"]);
//!
//! let config = DriverConfig::new().max_rounds(1);
//! let outcome = run_session(&mut channel, &mut replies, &config).await?;
//! assert_eq!(outcome.end_reason, EndReason::RoundLimit);
//! assert_eq!(outcome.transcript.len(), 2);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use serde::Serialize;
use tokio::time::{Instant, timeout_at};

use crate::channel::Channel;
use crate::config::DriverConfig;
use crate::error::{ConverseError, Result};
use crate::matcher::{LineClass, TailBuffer};
use crate::reply::ReplySource;
use crate::transcript::Transcript;
use crate::types::{EndReason, SessionState, SessionStats, Speaker};

/// Everything a finished session produced.
#[derive(Debug, Clone, Serialize)]
pub struct SessionOutcome {
    /// The dialogue in observed order.
    pub transcript: Transcript,
    /// Why the session stopped.
    pub end_reason: EndReason,
    /// Prompt-triggered replies sent.
    pub rounds: usize,
    /// Session counters.
    pub stats: SessionStats,
    /// Wall time from start to end.
    pub elapsed: Duration,
}

/// Runs sessions with a fixed configuration.
#[derive(Debug, Clone, Default)]
pub struct SessionDriver {
    config: DriverConfig,
}

impl SessionDriver {
    /// Create a driver.
    #[must_use]
    pub const fn new(config: DriverConfig) -> Self {
        Self { config }
    }

    /// Create a driver configured from `CONVERSE_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(DriverConfig::from_env())
    }

    /// The driver configuration.
    #[must_use]
    pub const fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Run one session over `channel`.
    pub async fn run<C, R>(&self, channel: &mut C, replies: &mut R) -> Result<SessionOutcome>
    where
        C: Channel,
        R: ReplySource,
    {
        run_session(channel, replies, &self.config).await
    }
}

/// Run one session over `channel`, answering prompts from `replies`.
///
/// The channel is started here and always stopped before returning. Only a
/// start failure or a reply source failure is an error; every other way a
/// session can stop is reported as the outcome's [`EndReason`]. A reply
/// source failure is returned as [`ConverseError::SessionAborted`] with the
/// transcript accumulated so far.
pub async fn run_session<C, R>(
    channel: &mut C,
    replies: &mut R,
    config: &DriverConfig,
) -> Result<SessionOutcome>
where
    C: Channel,
    R: ReplySource,
{
    config.validate()?;
    channel.start().await?;

    tracing::info!(
        max_rounds = config.max_rounds,
        idle_timeout = ?config.idle_timeout,
        "session started"
    );

    let mut session = Session::new(config);
    let result = session.drive(channel, replies).await;
    channel.stop().await;

    match result {
        Ok(()) => {
            let outcome = session.finish();
            tracing::info!(
                end_reason = %outcome.end_reason,
                rounds = outcome.rounds,
                entries = outcome.transcript.len(),
                elapsed = ?outcome.elapsed,
                "session ended"
            );
            Ok(outcome)
        }
        Err(e) => {
            tracing::warn!(error = %e, rounds = session.rounds, "session aborted");
            Err(ConverseError::aborted(e, session.transcript, session.rounds))
        }
    }
}

/// Per-run state.
struct Session<'a> {
    config: &'a DriverConfig,
    state: SessionState,
    transcript: Transcript,
    trailing: TailBuffer,
    /// The current, unterminated output line.
    line: String,
    rounds: usize,
    stats: SessionStats,
    started: Instant,
    last_activity: Instant,
}

impl<'a> Session<'a> {
    fn new(config: &'a DriverConfig) -> Self {
        let now = Instant::now();
        Self {
            config,
            state: SessionState::Running,
            transcript: Transcript::new(),
            trailing: TailBuffer::new(config.trailing_capacity),
            line: String::new(),
            rounds: 0,
            stats: SessionStats::default(),
            started: now,
            last_activity: now,
        }
    }

    async fn drive<C, R>(&mut self, channel: &mut C, replies: &mut R) -> Result<()>
    where
        C: Channel,
        R: ReplySource,
    {
        while self.state.is_running() {
            let deadline = deadline_after(self.last_activity, self.config.idle_timeout);
            match timeout_at(deadline, channel.read_chunk()).await {
                Err(_) => {
                    tracing::info!(idle_timeout = ?self.config.idle_timeout, "peer went silent");
                    self.state.end(EndReason::Timeout);
                }
                Ok(Ok(None)) => {
                    tracing::debug!("peer closed its output");
                    self.state.end(EndReason::StreamClosed);
                }
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "reading from peer failed");
                    self.state.end(EndReason::StreamClosed);
                }
                Ok(Ok(Some(chunk))) => self.consume(&chunk, channel, replies).await?,
            }
        }

        if self.state.end_reason() == Some(EndReason::RoundLimit) {
            self.drain_grace(channel).await;
        }
        if !self.line.trim().is_empty() {
            tracing::debug!(line = %self.line, "unterminated output at session end");
        }
        Ok(())
    }

    fn note_unit(&mut self, chunk: &str) {
        self.stats.units += 1;
        self.stats.chars += chunk.chars().count() as u64;
        tracing::trace!(chars = chunk.len(), "output received");
    }

    async fn consume<C, R>(&mut self, chunk: &str, channel: &mut C, replies: &mut R) -> Result<()>
    where
        C: Channel,
        R: ReplySource,
    {
        self.last_activity = Instant::now();
        self.note_unit(chunk);
        self.trailing.push_str(chunk);

        for ch in chunk.chars() {
            if ch == '\n' {
                let line = std::mem::take(&mut self.line);
                self.on_line(&line, channel, replies).await?;
                if !self.state.is_running() {
                    return Ok(());
                }
            } else {
                self.line.push(ch);
            }
        }

        let window = self.config.window_size;
        let tail = self.trailing.tail(window);
        if self.config.dialect.is_turn_yielding_tail(&tail, window) {
            self.reply_to_prompt(channel, replies).await?;
        }
        Ok(())
    }

    async fn on_line<C, R>(&mut self, line: &str, channel: &mut C, replies: &mut R) -> Result<()>
    where
        C: Channel,
        R: ReplySource,
    {
        let line = line.strip_suffix('\r').unwrap_or(line);
        self.stats.lines += 1;
        tracing::debug!(%line, "peer output");

        match self.config.dialect.classify_line(line) {
            LineClass::PeerUtterance(text) => self.record_peer(text),
            LineClass::EndOfSession { utterance } => {
                if let Some(text) = utterance {
                    self.record_peer(text);
                }
                tracing::info!(%line, "end of session signalled");
                self.reply(channel, replies).await?;
                self.state.end(EndReason::EndSignal);
            }
            LineClass::Other => self.stats.ignored_lines += 1,
        }
        Ok(())
    }

    async fn reply_to_prompt<C, R>(&mut self, channel: &mut C, replies: &mut R) -> Result<()>
    where
        C: Channel,
        R: ReplySource,
    {
        tracing::debug!(round = self.rounds + 1, "prompt detected");
        let sent = self.reply(channel, replies).await?;
        self.trailing.clear();
        self.line.clear();

        if sent {
            self.rounds += 1;
            if self.rounds >= self.config.max_rounds {
                tracing::info!(rounds = self.rounds, "round limit reached");
                self.state.end(EndReason::RoundLimit);
            }
        }
        Ok(())
    }

    /// Ask for a reply and write it.
    ///
    /// Returns `Ok(false)` if the write failed, in which case the session
    /// has ended with [`EndReason::StreamClosed`].
    async fn reply<C, R>(&mut self, channel: &mut C, replies: &mut R) -> Result<bool>
    where
        C: Channel,
        R: ReplySource,
    {
        let raw = match replies.generate_reply(&self.transcript).await {
            Ok(text) => text,
            Err(e @ ConverseError::ReplySource { .. }) => return Err(e),
            Err(e) => return Err(ConverseError::reply_source_with("reply source failed", e)),
        };
        let text = raw.trim_end();
        if text.is_empty() {
            return Err(ConverseError::reply_source("reply source returned an empty reply"));
        }

        if let Err(e) = channel.write_line(text).await {
            tracing::warn!(error = %e, "writing reply failed");
            self.state.end(EndReason::StreamClosed);
            return Ok(false);
        }

        tracing::debug!(reply = %text, "reply sent");
        self.stats.replies += 1;
        self.transcript
            .push(Speaker::Driver, text.to_owned(), self.started.elapsed());
        // The peer gets a full idle window to answer.
        self.last_activity = Instant::now();
        Ok(true)
    }

    /// Keep recording peer lines for `final_grace` after the round limit.
    async fn drain_grace<C: Channel>(&mut self, channel: &mut C) {
        if self.config.final_grace.is_zero() {
            return;
        }
        let deadline = deadline_after(Instant::now(), self.config.final_grace);
        while let Ok(Ok(Some(chunk))) = timeout_at(deadline, channel.read_chunk()).await {
            self.note_unit(&chunk);
            for ch in chunk.chars() {
                if ch == '\n' {
                    let line = std::mem::take(&mut self.line);
                    let line = line.strip_suffix('\r').unwrap_or(&line);
                    self.stats.lines += 1;
                    tracing::debug!(%line, "peer output after round limit");
                    match self.config.dialect.classify_line(line).utterance() {
                        Some(text) => self.record_peer(text.to_owned()),
                        None => self.stats.ignored_lines += 1,
                    }
                } else {
                    self.line.push(ch);
                }
            }
        }
    }

    fn record_peer(&mut self, text: String) {
        self.stats.peer_lines += 1;
        self.transcript.push(Speaker::Peer, text, self.started.elapsed());
    }

    fn finish(self) -> SessionOutcome {
        SessionOutcome {
            transcript: self.transcript,
            end_reason: self.state.end_reason().unwrap_or(EndReason::StreamClosed),
            rounds: self.rounds,
            stats: self.stats,
            elapsed: self.started.elapsed(),
        }
    }
}

/// `now + wait`, or a deadline too far away to matter when that overflows.
fn deadline_after(now: Instant, wait: Duration) -> Instant {
    now.checked_add(wait).unwrap_or_else(|| now + FAR_FUTURE)
}

/// About thirty years.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

#[cfg(all(test, feature = "mock"))]
mod tests {
    use super::*;
    use crate::mock::MockBuilder;
    use crate::reply::Scripted;

    #[test]
    fn deadline_saturates_instead_of_overflowing() {
        let now = Instant::now();
        assert_eq!(
            deadline_after(now, Duration::from_secs(5)),
            now + Duration::from_secs(5)
        );
        assert!(deadline_after(now, Duration::MAX) > now + Duration::from_secs(86_400));
    }

    #[tokio::test]
    async fn invalid_config_never_starts_channel() {
        let transport = MockBuilder::new().output("Doctor: ").build();
        let mut channel = crate::channel::TransportChannel::new(transport.clone());
        let mut replies = Scripted::new(["x"]);

        let config = DriverConfig::new().max_rounds(0);
        let err = run_session(&mut channel, &mut replies, &config)
            .await
            .unwrap_err();
        assert!(matches!(err, ConverseError::Config { .. }));
        assert!(!channel.is_running());
        assert_eq!(replies.calls(), 0);
    }

    #[tokio::test]
    async fn driver_runs_with_its_config() {
        let mut channel = MockBuilder::new()
            .output("Doctor: ")
            .await_input()
            .eof()
            .channel();
        let mut replies = Scripted::new(["Hi."]);

        let driver = SessionDriver::new(DriverConfig::new().max_rounds(1));
        let outcome = driver.run(&mut channel, &mut replies).await.unwrap();
        assert_eq!(outcome.end_reason, EndReason::RoundLimit);
        assert_eq!(outcome.rounds, 1);
        assert_eq!(outcome.stats.replies, 1);
        assert_eq!(driver.config().max_rounds, 1);
    }
}
