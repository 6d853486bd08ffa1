//! Bounded accumulation of session output.
//!
//! Terminal output arrives in arbitrary chunks; patterns are matched against
//! text. The buffer absorbs raw bytes, completes UTF-8 sequences that were
//! split across reads, and discards oldest text when the configured size is
//! exceeded so a chatty session cannot grow memory without bound.

/// Default buffer capacity (32 KiB), overridable per spawn.
pub const DEFAULT_CAPACITY: usize = 32 * 1024;

/// Accumulated session output, bounded and text-normalized.
///
/// Bytes appended through [`append`](Self::append) become part of the
/// searchable text as soon as they form complete UTF-8 sequences; an
/// incomplete trailing sequence is held back until its continuation bytes
/// arrive. Invalid sequences are replaced with U+FFFD.
#[derive(Debug, Clone)]
pub struct OutputBuffer {
    /// Decoded text available for matching.
    text: String,
    /// Trailing bytes of an incomplete UTF-8 sequence.
    pending: Vec<u8>,
    /// Maximum size of `text` in bytes.
    max_size: usize,
    /// Bytes of text discarded due to overflow.
    discarded: usize,
}

impl OutputBuffer {
    /// Create a buffer holding at most `max_size` bytes of text.
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            text: String::new(),
            pending: Vec::new(),
            max_size: max_size.max(1),
            discarded: 0,
        }
    }

    /// Append raw output bytes.
    ///
    /// Oldest text is discarded once the size bound is exceeded.
    pub fn append(&mut self, data: &[u8]) {
        self.pending.extend_from_slice(data);
        self.drain_pending();
        self.enforce_cap();
    }

    /// Move every complete UTF-8 sequence from `pending` into `text`.
    fn drain_pending(&mut self) {
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(valid) => {
                    self.text.push_str(valid);
                    self.pending.clear();
                    return;
                }
                Err(err) => {
                    let valid_len = err.valid_up_to();
                    if let Ok(valid) = std::str::from_utf8(&self.pending[..valid_len]) {
                        self.text.push_str(valid);
                    }
                    match err.error_len() {
                        Some(bad_len) => {
                            self.text.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid_len + bad_len);
                        }
                        None => {
                            // Incomplete sequence; wait for the rest.
                            self.pending.drain(..valid_len);
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Discard oldest text until the size bound holds.
    fn enforce_cap(&mut self) {
        if self.text.len() <= self.max_size {
            return;
        }
        let mut cut = self.text.len() - self.max_size;
        while !self.text.is_char_boundary(cut) {
            cut += 1;
        }
        self.discarded += cut;
        self.text.drain(..cut);
    }

    /// The text currently available for matching.
    #[must_use]
    pub fn as_text(&self) -> &str {
        &self.text
    }

    /// Consume through a match found in [`as_text`](Self::as_text).
    ///
    /// `start..end` must be char-boundary positions from the current text.
    /// Returns `(before, matched)`; text after the match is retained for
    /// the next turn.
    pub fn take_match(&mut self, start: usize, end: usize) -> (String, String) {
        let rest = self.text.split_off(end);
        let matched = self.text.split_off(start);
        let before = std::mem::replace(&mut self.text, rest);
        (before, matched)
    }

    /// Current text length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Check if no text is available.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Total bytes discarded due to overflow.
    #[must_use]
    pub const fn discarded(&self) -> usize {
        self.discarded
    }

    /// Drop all buffered output.
    pub fn clear(&mut self) {
        self.text.clear();
        self.pending.clear();
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_append() {
        let mut buf = OutputBuffer::new(100);
        buf.append(b"hello");
        assert_eq!(buf.as_text(), "hello");
        assert_eq!(buf.len(), 5);
    }

    #[test]
    fn overflow_discards_oldest() {
        let mut buf = OutputBuffer::new(10);
        buf.append(b"12345");
        buf.append(b"67890");
        buf.append(b"abc");

        assert_eq!(buf.len(), 10);
        assert_eq!(buf.as_text(), "4567890abc");
        assert_eq!(buf.discarded(), 3);
    }

    #[test]
    fn utf8_split_across_appends() {
        let mut buf = OutputBuffer::new(100);
        let snowman = "\u{2603}".as_bytes();
        buf.append(&snowman[..1]);
        assert_eq!(buf.as_text(), "");
        buf.append(&snowman[1..]);
        assert_eq!(buf.as_text(), "\u{2603}");
    }

    #[test]
    fn invalid_bytes_become_replacement() {
        let mut buf = OutputBuffer::new(100);
        buf.append(b"ok\xFFdone");
        assert_eq!(buf.as_text(), "ok\u{FFFD}done");
    }

    #[test]
    fn take_match_splits_and_retains_rest() {
        let mut buf = OutputBuffer::new(100);
        buf.append(b"PING host\n5 received\n$ ");
        let start = buf.as_text().find("5 received").unwrap();
        let (before, matched) = buf.take_match(start, start + "5 received".len());
        assert_eq!(before, "PING host\n");
        assert_eq!(matched, "5 received");
        assert_eq!(buf.as_text(), "\n$ ");
    }

    #[test]
    fn clear_drops_everything() {
        let mut buf = OutputBuffer::new(100);
        buf.append(b"data");
        buf.clear();
        assert!(buf.is_empty());
    }

    #[test]
    fn overflow_cuts_on_char_boundary() {
        let mut buf = OutputBuffer::new(4);
        buf.append("ab\u{2603}".as_bytes());
        assert!(buf.as_text().is_char_boundary(0));
        assert!(buf.len() <= 4);
    }
}
