//! Bounded trailing buffer over channel output.
//!
//! Holds the last `capacity` characters seen, so prompt detection never
//! rescans the full history of a session.

use std::collections::VecDeque;
use std::fmt;

/// Default trailing buffer capacity, in characters.
pub const DEFAULT_CAPACITY: usize = 512;

/// A fixed-capacity ring of the most recent characters.
#[derive(Clone)]
pub struct TailBuffer {
    /// The underlying storage.
    data: VecDeque<char>,
    /// Maximum number of characters retained.
    capacity: usize,
    /// Total characters pushed since creation.
    total_pushed: usize,
    /// Characters dropped off the front.
    discarded: usize,
}

impl TailBuffer {
    /// Create a buffer retaining at most `capacity` characters.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            data: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
            capacity,
            total_pushed: 0,
            discarded: 0,
        }
    }

    /// Append text, dropping the oldest characters beyond capacity.
    pub fn push_str(&mut self, text: &str) {
        for ch in text.chars() {
            self.push(ch);
        }
    }

    /// Append one character.
    pub fn push(&mut self, ch: char) {
        self.total_pushed += 1;
        if self.capacity == 0 {
            self.discarded += 1;
            return;
        }
        if self.data.len() == self.capacity {
            self.data.pop_front();
            self.discarded += 1;
        }
        self.data.push_back(ch);
    }

    /// The last `n` characters as a string.
    #[must_use]
    pub fn tail(&self, n: usize) -> String {
        let start = self.data.len().saturating_sub(n);
        self.data.range(start..).collect()
    }

    /// The whole buffer as a string.
    #[must_use]
    pub fn contents(&self) -> String {
        self.data.iter().collect()
    }

    /// Number of characters currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Maximum number of characters retained.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total characters pushed since creation.
    #[must_use]
    pub const fn total_pushed(&self) -> usize {
        self.total_pushed
    }

    /// Characters dropped due to capacity.
    #[must_use]
    pub const fn discarded(&self) -> usize {
        self.discarded
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.data.clear();
    }
}

impl Default for TailBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl fmt::Debug for TailBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TailBuffer")
            .field("len", &self.data.len())
            .field("capacity", &self.capacity)
            .field("total_pushed", &self.total_pushed)
            .finish()
    }
}

impl fmt::Display for TailBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for ch in &self.data {
            fmt::Write::write_char(f, *ch)?;
        }
        Ok(())
    }
}
