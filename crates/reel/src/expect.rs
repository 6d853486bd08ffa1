//! Pattern matching over buffered session output.
//!
//! The matcher owns the output buffer and resolves an ordered pattern list
//! against it. Pattern priority is list position: the first pattern that
//! matches anywhere in the buffer wins, regardless of where later patterns
//! would have matched. Matched text and everything before it are consumed;
//! output after the match stays buffered for the next turn.

mod buffer;

pub use buffer::{DEFAULT_CAPACITY, OutputBuffer};

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use regex::Regex;

use crate::error::Result;
use crate::step::Event;

/// Ordered-pattern matcher over an [`OutputBuffer`].
///
/// Compiled patterns are cached per matcher, so the common loop of
/// re-expecting the same prompt every turn compiles each regex once.
#[derive(Debug)]
pub struct Matcher {
    buffer: OutputBuffer,
    cache: HashMap<String, Regex>,
}

impl Matcher {
    /// Create a matcher whose buffer holds at most `buffer_size` bytes.
    #[must_use]
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer: OutputBuffer::new(buffer_size),
            cache: HashMap::new(),
        }
    }

    /// Append raw session output.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.append(data);
    }

    /// Try to resolve `patterns` against the buffered output.
    ///
    /// Returns the [`Event::Match`] for the first pattern (in list order)
    /// found anywhere in the buffer, consuming through the matched text.
    /// Returns `Ok(None)` when nothing matches yet. An unparseable pattern
    /// is an error.
    pub fn find(&mut self, patterns: &[String]) -> Result<Option<Event>> {
        for (index, pattern) in patterns.iter().enumerate() {
            let re = match self.cache.entry(pattern.clone()) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => entry.insert(Regex::new(pattern)?),
            };
            let span = re.find(self.buffer.as_text()).map(|m| (m.start(), m.end()));
            if let Some((start, end)) = span {
                let (before, matched) = self.buffer.take_match(start, end);
                return Ok(Some(Event::Match {
                    index,
                    pattern: pattern.clone(),
                    before,
                    matched,
                }));
            }
        }
        Ok(None)
    }

    /// The output buffered so far, for diagnostics.
    #[must_use]
    pub fn buffered(&self) -> &str {
        self.buffer.as_text()
    }

    /// Drop all buffered output.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
