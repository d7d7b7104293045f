//! rust-converse: turn-taking session driver for interactive processes
//!
//! This crate drives a line-oriented dialogue with a peer process that has
//! no structured framing. The peer prints free-form text with ad-hoc prompt
//! cues and expects one line back at unpredictable points; the driver
//! reconstructs the turn-taking protocol from the raw output alone.
//!
//! # Features
//!
//! - **Async-first design** with Tokio runtime
//! - **Sliding-window prompt detection** over a bounded trailing buffer
//! - **Line classification** of peer utterances and end-of-session markers
//! - **Round limit and idle timeout** with an explicit end reason
//! - **Child process channel** with merged stdout/stderr and escalating stop
//! - **Mock transport** for testing (feature: `mock`)
//!
//! # Example
//!
//! ```rust,no_run
//! use rust_converse::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let mut channel = ProcessChannel::new(
//!         ProcessConfig::new("python3").args(["-u", "agentclinic.py"]),
//!     );
//!     let mut replies = Scripted::new(["What brings you in today?"])
//!         .with_fallback(DEFAULT_FALLBACK);
//!
//!     let outcome = run_session(&mut channel, &mut replies, &DriverConfig::from_env()).await?;
//!     println!("{} after {} round(s)", outcome.end_reason, outcome.rounds);
//!     print!("{}", outcome.transcript);
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod config;
pub mod driver;
pub mod encoding;
pub mod error;
pub mod matcher;
pub mod prelude;
pub mod reply;
pub mod sync;
pub mod transcript;
pub mod types;

/// Mock peers for testing.
#[cfg(feature = "mock")]
pub mod mock;

pub use channel::{Channel, ProcessChannel, TransportChannel};
pub use config::{
    ConverseConfig, DriverConfig, EnvConfig, ProcessConfig, ShutdownConfig, ShutdownStrategy,
};
pub use driver::{SessionDriver, SessionOutcome, run_session};
pub use error::{ConverseError, Result, SpawnError};
pub use matcher::{
    Dialect, DialectBuilder, LineClass, TailBuffer, classify_line, is_turn_yielding_tail,
};
#[cfg(feature = "mock")]
pub use mock::{MockBuilder, MockEvent, MockTransport};
pub use reply::{ReplySource, ReplySourceExt, Scripted, WithFallback, WithTimeout};
pub use sync::{SyncDriver, run_session_blocking};
pub use transcript::{Transcript, Utterance};
pub use types::{EndReason, SessionState, SessionStats, Speaker};
