//! The duplex channel between the session driver and its peer.
//!
//! A [`Channel`] yields the peer's output as text chunks and accepts reply
//! lines. Two implementations are provided:
//!
//! - [`ProcessChannel`]: spawns a child process with piped standard streams
//! - [`TransportChannel`]: wraps any async duplex stream (an in-memory
//!   pipe, a socket, or the [`mock`](crate::mock) transport)

pub mod process;
pub mod transport;

use std::future::Future;

pub use process::ProcessChannel;
pub use transport::TransportChannel;

use crate::error::Result;

/// Duplex, line-oriented connection to a peer.
///
/// `read_chunk` must be cancel-safe: the driver races it against the idle
/// deadline and drops it if the deadline wins.
pub trait Channel: Send {
    /// Bring the channel up. Called once, before any read or write.
    fn start(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Read the next chunk of output.
    ///
    /// Returns `Ok(None)` once the peer's output has ended.
    fn read_chunk(&mut self) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Write `line` followed by a single newline, and flush.
    fn write_line(&mut self, line: &str) -> impl Future<Output = Result<()>> + Send;

    /// Tear the channel down. Safe to call any number of times.
    fn stop(&mut self) -> impl Future<Output = ()> + Send;

    /// Whether the channel has been started and not yet stopped.
    fn is_running(&self) -> bool;
}
