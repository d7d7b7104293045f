//! Reply sources: where the driver's side of the dialogue comes from.
//!
//! The driver treats reply generation as an opaque async callback over the
//! conversation so far. Anything that implements [`ReplySource`] can be
//! plugged in: a language model client, a scripted list for tests, or a
//! closure.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use rust_converse::reply::{self, ReplySourceExt};
//!
//! let source = reply::from_sync_fn(|history| {
//!     Ok(format!("I have heard {} lines so far.", history.len()))
//! })
//! .with_timeout(Duration::from_secs(30))
//! .with_fallback(reply::DEFAULT_FALLBACK);
//! ```

use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;

use crate::error::{ConverseError, Result};
use crate::transcript::Transcript;

/// Reply used by [`WithFallback`] when none is given explicitly.
pub const DEFAULT_FALLBACK: &str =
    "Could you tell me when the symptoms started and any triggers? I may order basic labs.";

/// Produces one line of reply given the transcript so far.
pub trait ReplySource: Send {
    /// Generate the next reply.
    ///
    /// The returned text should be a single non-empty line; the driver
    /// trims trailing whitespace and rejects a reply that ends up empty.
    fn generate_reply(&mut self, history: &Transcript)
    -> impl Future<Output = Result<String>> + Send;
}

impl<R: ReplySource> ReplySource for &mut R {
    fn generate_reply(
        &mut self,
        history: &Transcript,
    ) -> impl Future<Output = Result<String>> + Send {
        (**self).generate_reply(history)
    }
}

/// Reply source backed by an async closure. See [`from_fn`].
#[derive(Debug, Clone)]
pub struct FnReply<F>(F);

/// Build a reply source from a closure returning a future.
///
/// The future must not borrow the transcript; clone what it needs.
pub const fn from_fn<F, Fut>(f: F) -> FnReply<F>
where
    F: FnMut(&Transcript) -> Fut + Send,
    Fut: Future<Output = Result<String>> + Send,
{
    FnReply(f)
}

impl<F, Fut> ReplySource for FnReply<F>
where
    F: FnMut(&Transcript) -> Fut + Send,
    Fut: Future<Output = Result<String>> + Send,
{
    fn generate_reply(
        &mut self,
        history: &Transcript,
    ) -> impl Future<Output = Result<String>> + Send {
        (self.0)(history)
    }
}

/// Reply source backed by a plain closure. See [`from_sync_fn`].
#[derive(Debug, Clone)]
pub struct SyncFnReply<F>(F);

/// Build a reply source from a synchronous closure.
pub const fn from_sync_fn<F>(f: F) -> SyncFnReply<F>
where
    F: FnMut(&Transcript) -> Result<String> + Send,
{
    SyncFnReply(f)
}

impl<F> ReplySource for SyncFnReply<F>
where
    F: FnMut(&Transcript) -> Result<String> + Send,
{
    async fn generate_reply(&mut self, history: &Transcript) -> Result<String> {
        (self.0)(history)
    }
}

/// Canned replies handed out in order.
///
/// Fails once the list is exhausted.
#[derive(Debug, Clone, Default)]
pub struct Scripted {
    replies: VecDeque<String>,
    calls: usize,
}

impl Scripted {
    /// Create a source from a list of replies.
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: replies.into_iter().map(Into::into).collect(),
            calls: 0,
        }
    }

    /// Append a reply.
    #[must_use]
    pub fn then(mut self, reply: impl Into<String>) -> Self {
        self.replies.push_back(reply.into());
        self
    }

    /// Number of times a reply was requested.
    #[must_use]
    pub const fn calls(&self) -> usize {
        self.calls
    }

    /// Replies not yet handed out.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.replies.len()
    }
}

impl ReplySource for Scripted {
    async fn generate_reply(&mut self, _history: &Transcript) -> Result<String> {
        self.calls += 1;
        self.replies
            .pop_front()
            .ok_or_else(|| ConverseError::reply_source("scripted replies exhausted"))
    }
}

/// Substitutes a fixed reply when the inner source fails or returns
/// nothing but whitespace.
#[derive(Debug, Clone)]
pub struct WithFallback<R> {
    inner: R,
    fallback: String,
    used: usize,
}

impl<R> WithFallback<R> {
    /// Wrap `inner`.
    pub fn new(inner: R, fallback: impl Into<String>) -> Self {
        Self {
            inner,
            fallback: fallback.into(),
            used: 0,
        }
    }

    /// Number of times the fallback was used.
    #[must_use]
    pub const fn fallbacks_used(&self) -> usize {
        self.used
    }

    /// The wrapped source.
    pub const fn inner(&self) -> &R {
        &self.inner
    }
}

impl<R: ReplySource> ReplySource for WithFallback<R> {
    async fn generate_reply(&mut self, history: &Transcript) -> Result<String> {
        match self.inner.generate_reply(history).await {
            Ok(reply) if !reply.trim().is_empty() => Ok(reply),
            Ok(_) => {
                tracing::debug!("empty reply, using fallback");
                self.used += 1;
                Ok(self.fallback.clone())
            }
            Err(e) => {
                tracing::warn!(error = %e, "reply source failed, using fallback");
                self.used += 1;
                Ok(self.fallback.clone())
            }
        }
    }
}

/// Fails with a reply-source error if the inner source takes too long.
#[derive(Debug, Clone)]
pub struct WithTimeout<R> {
    inner: R,
    duration: Duration,
}

impl<R> WithTimeout<R> {
    /// Wrap `inner`.
    pub const fn new(inner: R, duration: Duration) -> Self {
        Self { inner, duration }
    }
}

impl<R: ReplySource> ReplySource for WithTimeout<R> {
    async fn generate_reply(&mut self, history: &Transcript) -> Result<String> {
        tokio::time::timeout(self.duration, self.inner.generate_reply(history))
            .await
            .map_err(|_| ConverseError::reply_timeout(self.duration))?
    }
}

/// Adapter methods for reply sources.
pub trait ReplySourceExt: ReplySource + Sized {
    /// Replace failed or blank replies with `fallback`.
    fn with_fallback(self, fallback: impl Into<String>) -> WithFallback<Self> {
        WithFallback::new(self, fallback)
    }

    /// Bound each reply by `duration`.
    fn with_timeout(self, duration: Duration) -> WithTimeout<Self> {
        WithTimeout::new(self, duration)
    }
}

impl<R: ReplySource> ReplySourceExt for R {}
