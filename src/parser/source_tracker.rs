use crate::base::{BufferedInput, Range};
use crate::token::Token;

/// Maps tokens back to their raw source text.
///
/// Only the reflected-content filter needs this: its containment checks
/// run against the exact bytes the author wrote, not the token's already
/// normalized fields.
#[derive(Copy, Clone)]
pub struct SourceTracker<'i> {
    input: &'i BufferedInput,
}

impl<'i> SourceTracker<'i> {
    #[inline]
    #[must_use]
    pub fn new(input: &'i BufferedInput) -> Self {
        SourceTracker { input }
    }

    #[inline]
    #[must_use]
    pub fn raw(&self, range: Range) -> &'i [u8] {
        self.input.slice(range)
    }

    /// Raw source of the whole token.
    #[inline]
    #[must_use]
    pub fn token_raw(&self, token: &Token) -> &'i [u8] {
        self.raw(token.raw_range)
    }
}
