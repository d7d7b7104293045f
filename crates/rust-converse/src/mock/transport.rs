//! In-memory transport that plays back an [`EventTimeline`].

use std::collections::VecDeque;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::time::Sleep;

use super::event::{EventTimeline, MockEvent};

#[derive(Debug)]
struct MockState {
    /// Bytes waiting to be read by the driver.
    output: VecDeque<u8>,
    /// Bytes written by the driver.
    input: Vec<u8>,
    timeline: EventTimeline,
    eof: bool,
    error: Option<String>,
    input_closed: bool,
    delay: Option<Pin<Box<Sleep>>>,
    awaiting_input: bool,
    /// Writes not yet matched by an `AwaitInput` event.
    pending_writes: usize,
    writes: usize,
    shutdown_calls: usize,
    read_waker: Option<Waker>,
}

impl MockState {
    const fn new(timeline: EventTimeline) -> Self {
        Self {
            output: VecDeque::new(),
            input: Vec::new(),
            timeline,
            eof: false,
            error: None,
            input_closed: false,
            delay: None,
            awaiting_input: false,
            pending_writes: 0,
            writes: 0,
            shutdown_calls: 0,
            read_waker: None,
        }
    }

    fn wake_reader(&mut self) {
        if let Some(waker) = self.read_waker.take() {
            waker.wake();
        }
    }

    fn poll_read(&mut self, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        loop {
            if let Some(error) = self.error.take() {
                return Poll::Ready(Err(io::Error::other(error)));
            }

            if !self.output.is_empty() {
                let n = buf.remaining().min(self.output.len());
                let bytes: Vec<u8> = self.output.drain(..n).collect();
                buf.put_slice(&bytes);
                return Poll::Ready(Ok(()));
            }

            if self.eof {
                return Poll::Ready(Ok(()));
            }

            if let Some(delay) = self.delay.as_mut() {
                if delay.as_mut().poll(cx).is_pending() {
                    return Poll::Pending;
                }
                self.delay = None;
            }

            if self.awaiting_input {
                if self.pending_writes == 0 {
                    self.read_waker = Some(cx.waker().clone());
                    return Poll::Pending;
                }
                self.pending_writes -= 1;
                self.awaiting_input = false;
            }

            let Some(event) = self.timeline.next().cloned() else {
                self.read_waker = Some(cx.waker().clone());
                return Poll::Pending;
            };
            match event {
                MockEvent::Output(data) => self.output.extend(data),
                MockEvent::Delay(duration) => {
                    self.delay = Some(Box::pin(tokio::time::sleep(duration)));
                }
                MockEvent::AwaitInput => self.awaiting_input = true,
                MockEvent::Eof => self.eof = true,
                MockEvent::Error(msg) => self.error = Some(msg),
                MockEvent::CloseInput => self.input_closed = true,
            }
        }
    }
}

/// A scripted duplex peer for tests.
///
/// Clones share state, so a test can keep one handle to inspect what was
/// written while the channel owns another.
///
/// Each [`MockEvent::AwaitInput`] consumes one write; a write that arrives
/// before the await is remembered.
#[derive(Debug, Clone)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Create a transport with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::from_timeline(EventTimeline::new())
    }

    /// Create a transport that plays back `timeline`.
    #[must_use]
    pub fn from_timeline(timeline: EventTimeline) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::new(timeline))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue output to be read.
    pub fn queue_output(&self, data: &[u8]) {
        let mut state = self.lock();
        state.output.extend(data);
        state.wake_reader();
    }

    /// Queue a string to be read.
    pub fn queue_output_str(&self, s: &str) {
        self.queue_output(s.as_bytes());
    }

    /// Drain everything written so far.
    #[must_use]
    pub fn take_input(&self) -> Vec<u8> {
        std::mem::take(&mut self.lock().input)
    }

    /// Drain everything written so far, as text.
    #[must_use]
    pub fn take_input_str(&self) -> String {
        String::from_utf8_lossy(&self.take_input()).into_owned()
    }

    /// Number of write calls that succeeded.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    /// Signal EOF.
    pub fn signal_eof(&self) {
        let mut state = self.lock();
        state.eof = true;
        state.wake_reader();
    }

    /// Make subsequent writes fail with a broken pipe.
    pub fn close_input(&self) {
        self.lock().input_closed = true;
    }

    /// Check if EOF has been reached.
    #[must_use]
    pub fn is_eof(&self) -> bool {
        self.lock().eof
    }

    /// Number of times the transport was shut down.
    #[must_use]
    pub fn shutdown_calls(&self) -> usize {
        self.lock().shutdown_calls
    }

    /// Number of scripted events not yet played.
    #[must_use]
    pub fn remaining_events(&self) -> usize {
        self.lock().timeline.remaining()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl AsyncRead for MockTransport {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        self.lock().poll_read(cx, buf)
    }
}

impl AsyncWrite for MockTransport {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut state = self.lock();
        if state.input_closed {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "mock peer closed its input",
            )));
        }
        state.input.extend_from_slice(buf);
        state.writes += 1;
        state.pending_writes += 1;
        state.wake_reader();
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.lock().shutdown_calls += 1;
        Poll::Ready(Ok(()))
    }
}
