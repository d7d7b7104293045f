//! Incremental UTF-8 decoding of raw output chunks.
//!
//! Pipe reads split the byte stream at arbitrary points, so a multi-byte
//! character may straddle two reads. [`Utf8Decoder`] holds back an
//! incomplete trailing sequence until the rest arrives and replaces
//! invalid bytes with U+FFFD.

/// Streaming UTF-8 decoder.
#[derive(Debug, Clone, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
    replacements: usize,
}

impl Utf8Decoder {
    /// Create a decoder with nothing pending.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next chunk.
    ///
    /// Returns all complete characters; an incomplete sequence at the end
    /// is kept for the next call.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::with_capacity(self.pending.len());
        let mut rest: &[u8] = &self.pending;

        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    rest = &[];
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.replacements += 1;
                            rest = &after[len..];
                        }
                        None => {
                            rest = after;
                            break;
                        }
                    }
                }
            }
        }

        let keep = rest.len();
        let drop = self.pending.len() - keep;
        self.pending.drain(..drop);
        out
    }

    /// Flush at end of stream; an incomplete sequence becomes U+FFFD.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        self.pending.clear();
        self.replacements += 1;
        char::REPLACEMENT_CHARACTER.to_string()
    }

    /// Number of bytes held back awaiting completion.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Number of replacement characters emitted so far.
    #[must_use]
    pub const fn replacements(&self) -> usize {
        self.replacements
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_passes_through() {
        let mut dec = Utf8Decoder::new();
        assert_eq!(dec.decode(b"Doctor: "), "Doctor: ");
        assert_eq!(dec.pending(), 0);
    }

    #[test]
    fn split_multibyte_is_joined() {
        let bytes = "患者：好".as_bytes();
        let mut dec = Utf8Decoder::new();
        let first = dec.decode(&bytes[..4]);
        assert_eq!(first, "患");
        assert_eq!(dec.pending(), 1);
        let second = dec.decode(&bytes[4..]);
        assert_eq!(second, "者：好");
        assert_eq!(dec.replacements(), 0);
    }

    #[test]
    fn invalid_bytes_are_replaced() {
        let mut dec = Utf8Decoder::new();
        assert_eq!(dec.decode(b"ok\xffgo"), "ok\u{FFFD}go");
        assert_eq!(dec.replacements(), 1);
    }

    #[test]
    fn finish_flushes_incomplete_tail() {
        let mut dec = Utf8Decoder::new();
        assert_eq!(dec.decode(&[0xE6, 0x82]), "");
        assert_eq!(dec.finish(), "\u{FFFD}");
        assert_eq!(dec.finish(), "");
    }
}
