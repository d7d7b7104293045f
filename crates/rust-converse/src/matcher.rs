//! Structural classification of peer output.
//!
//! This module provides the stateless classifiers the session driver runs
//! over the output stream:
//!
//! - [`is_turn_yielding_tail`]: does recent output end in a prompt?
//! - [`classify_line`]: is a complete line a peer utterance, an end of
//!   session, or noise?
//!
//! Tail matching and line matching are separate because a prompt may
//! arrive without a terminating newline while the peer blocks for input,
//! whereas utterances and end signals only make sense on whole lines.
//!
//! Both free functions use the built-in clinical [`Dialect`]; build a custom
//! one with [`DialectBuilder`] for other peers.

pub mod buffer;
pub mod dialect;
pub mod pattern;

pub use buffer::TailBuffer;
pub use dialect::{Dialect, DialectBuilder, LineClass};
pub use pattern::{CompiledRegex, PatternSet};

/// Default number of trailing characters inspected for a prompt.
pub const DEFAULT_WINDOW: usize = 200;

/// Check whether `buffer` ends in a turn-yielding prompt.
///
/// Inspects the last [`DEFAULT_WINDOW`] characters of `buffer` using the
/// built-in dialect.
#[must_use]
pub fn is_turn_yielding_tail(buffer: &str) -> bool {
    Dialect::clinic().is_turn_yielding_tail(buffer, DEFAULT_WINDOW)
}

/// Classify one complete output line using the built-in dialect.
#[must_use]
pub fn classify_line(line: &str) -> LineClass {
    Dialect::clinic().classify_line(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn free_functions_use_builtin_dialect() {
        assert!(is_turn_yielding_tail("Doctor: "));
        assert!(!is_turn_yielding_tail("Patient: hello"));
        assert_eq!(
            classify_line("Patient [10%]: I have a headache."),
            LineClass::PeerUtterance("I have a headache.".into())
        );
    }

    #[test]
    fn only_the_window_counts() {
        let mut text = "Doctor:".to_string();
        text.push_str(&"x".repeat(DEFAULT_WINDOW * 3));
        text.push_str("\nQuestion for patient:");
        assert!(is_turn_yielding_tail(&text));

        let padded = format!("Doctor:{}", " ".repeat(DEFAULT_WINDOW + 1));
        assert!(!is_turn_yielding_tail(&padded));
    }

    proptest! {
        #[test]
        fn tail_verdict_independent_of_assembly(
            prefix in "[a-zA-Z :\\n]{0,300}",
            prompt in prop::sample::select(vec!["Doctor: ", "Your response", "noise", ""]),
            split in 0usize..400,
        ) {
            let whole = format!("{prefix}{prompt}");

            let mut bulk = TailBuffer::new(512);
            bulk.push_str(&whole);

            let mut pieces = TailBuffer::new(512);
            let cut = whole
                .char_indices()
                .map(|(i, _)| i)
                .nth(split)
                .unwrap_or(whole.len());
            pieces.push_str(&whole[..cut]);
            pieces.push_str(&whole[cut..]);

            prop_assert_eq!(bulk.contents(), pieces.contents());
            prop_assert_eq!(
                is_turn_yielding_tail(&bulk.contents()),
                is_turn_yielding_tail(&pieces.contents())
            );
        }

        #[test]
        fn classify_line_is_total(line in "\\PC{0,120}") {
            let _ = classify_line(&line);
        }
    }
}
