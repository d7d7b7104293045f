//! Convenient re-exports for common rust-converse usage.
//!
//! ```rust
//! use rust_converse::prelude::*;
//! ```

// Errors
pub use crate::error::{ConverseError, Result, SpawnError};

// Configuration
pub use crate::config::{DriverConfig, ProcessConfig, ShutdownConfig, ShutdownStrategy};

// Common types
pub use crate::transcript::{Transcript, Utterance};
pub use crate::types::{EndReason, SessionStats, Speaker};

// Channels
pub use crate::channel::{Channel, ProcessChannel, TransportChannel};

// Replies
pub use crate::reply::{DEFAULT_FALLBACK, ReplySource, ReplySourceExt, Scripted};

// Driver
pub use crate::driver::{SessionDriver, SessionOutcome, run_session};
pub use crate::matcher::{Dialect, DialectBuilder};

// Mocks
#[cfg(feature = "mock")]
pub use crate::mock::MockBuilder;
