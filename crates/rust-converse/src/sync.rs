//! Blocking entry points for callers without an async runtime.
//!
//! # Example
//!
//! ```rust,no_run
//! use rust_converse::sync::SyncDriver;
//! use rust_converse::{DriverConfig, ProcessChannel, ProcessConfig, Scripted};
//!
//! let driver = SyncDriver::new(DriverConfig::new().max_rounds(5)).unwrap();
//! let mut channel = ProcessChannel::new(ProcessConfig::new("python3").arg("peer.py"));
//! let mut replies = Scripted::new(["Hello.", "Tell me more."]);
//! let outcome = driver.run(&mut channel, &mut replies).unwrap();
//! println!("{}", outcome.transcript);
//! ```

use tokio::runtime::{Builder, Runtime};

use crate::channel::Channel;
use crate::config::DriverConfig;
use crate::driver::{SessionDriver, SessionOutcome};
use crate::error::{ConverseError, Result};
use crate::reply::ReplySource;

/// A session driver that owns a single-threaded runtime.
pub struct SyncDriver {
    runtime: Runtime,
    driver: SessionDriver,
}

impl SyncDriver {
    /// Create a blocking driver.
    pub fn new(config: DriverConfig) -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ConverseError::io_context("creating tokio runtime", e))?;
        Ok(Self {
            runtime,
            driver: SessionDriver::new(config),
        })
    }

    /// The driver configuration.
    #[must_use]
    pub const fn config(&self) -> &DriverConfig {
        self.driver.config()
    }

    /// Run one session to completion, blocking the current thread.
    pub fn run<C, R>(&self, channel: &mut C, replies: &mut R) -> Result<SessionOutcome>
    where
        C: Channel,
        R: ReplySource,
    {
        self.runtime.block_on(self.driver.run(channel, replies))
    }

    /// Run an arbitrary future on this driver's runtime.
    pub fn block_on<F, T>(&self, future: F) -> T
    where
        F: std::future::Future<Output = T>,
    {
        self.runtime.block_on(future)
    }
}

impl std::fmt::Debug for SyncDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncDriver")
            .field("config", self.driver.config())
            .finish_non_exhaustive()
    }
}

/// Run one session on a fresh single-threaded runtime.
pub fn run_session_blocking<C, R>(
    channel: &mut C,
    replies: &mut R,
    config: &DriverConfig,
) -> Result<SessionOutcome>
where
    C: Channel,
    R: ReplySource,
{
    block_on(crate::driver::run_session(channel, replies, config))?
}

/// Run a future to completion on a fresh single-threaded runtime.
pub fn block_on<F, T>(future: F) -> Result<T>
where
    F: std::future::Future<Output = T>,
{
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| ConverseError::io_context("creating tokio runtime for block_on", e))?;

    Ok(runtime.block_on(future))
}
