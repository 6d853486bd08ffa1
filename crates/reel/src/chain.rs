//! Handler chains.
//!
//! A [`Chain`] composes an ordered list of handlers into one
//! [`Handler`]: each phase queries the handlers in order and dispatches
//! the first non-nil Step. End of stream is the exception and is broadcast
//! to every handler, since each may have cleanup of its own.
//!
//! The ordering rule is the chain's only contract. An observer that always
//! returns `None` (such as [`EchoLogger`](crate::handlers::EchoLogger)) can
//! sit first in the chain without ever suppressing a later handler's
//! decision. Handlers never see each other's state; any coordination is
//! arranged by the caller before the run.

use crate::handler::Handler;
use crate::step::Step;

/// An ordered list of handlers driven as one.
pub struct Chain<'h> {
    handlers: Vec<&'h mut dyn Handler>,
}

impl<'h> Chain<'h> {
    /// Create an empty chain.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Append a handler, builder-style.
    #[must_use]
    pub fn with(mut self, handler: &'h mut dyn Handler) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Append a handler.
    pub fn push(&mut self, handler: &'h mut dyn Handler) {
        self.handlers.push(handler);
    }

    /// Number of handlers in the chain.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether the chain has no handlers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for Chain<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl Handler for Chain<'_> {
    fn first(&mut self) -> Option<Step> {
        self.handlers.iter_mut().find_map(|h| h.first())
    }

    fn on_match(&mut self, pattern: &str, before: &str, matched: &str) -> Option<Step> {
        self.handlers
            .iter_mut()
            .find_map(|h| h.on_match(pattern, before, matched))
    }

    fn on_timeout(&mut self) -> Option<Step> {
        self.handlers.iter_mut().find_map(|h| h.on_timeout())
    }

    fn on_eof(&mut self) {
        for handler in &mut self.handlers {
            handler.on_eof();
        }
    }
}

impl std::fmt::Debug for Chain<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}
