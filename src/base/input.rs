use super::Range;

/// The decoded document text accumulated so far.
///
/// Unlike a windowed input buffer, the whole logical stream is retained:
/// checkpoint rollback needs to re-lex from arbitrary committed positions
/// and `document.write` splices text into the middle of the stream, both of
/// which require stable absolute offsets.
#[derive(Default, Debug)]
pub struct BufferedInput {
    bytes: Vec<u8>,
    last: bool,
}

impl BufferedInput {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn push(&mut self, text: &str) {
        debug_assert!(!self.last, "input pushed after the last chunk");
        self.bytes.extend_from_slice(text.as_bytes());
    }

    /// Inserts `text` at `at`, shifting the not-yet-consumed tail.
    /// Used for `document.write` insertions at the commit position.
    #[inline]
    pub fn splice(&mut self, at: usize, text: &str) {
        self.bytes.splice(at..at, text.as_bytes().iter().copied());
    }

    #[inline]
    pub fn mark_last(&mut self) {
        self.last = true;
    }

    #[inline]
    #[must_use]
    pub const fn is_last(&self) -> bool {
        self.last
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn get(&self, pos: usize) -> Option<u8> {
        self.bytes.get(pos).copied()
    }

    #[inline]
    #[must_use]
    pub fn slice(&self, range: Range) -> &[u8] {
        &self.bytes[range.start..range.end.min(self.bytes.len())]
    }

    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splice_shifts_tail() {
        let mut input = BufferedInput::new();

        input.push("<p>a</p>");
        input.splice(3, "XY");

        assert_eq!(input.as_bytes(), b"<p>XYa</p>");
        assert_eq!(input.slice(Range::new(3, 5)), b"XY");
    }

    #[test]
    fn slice_is_clamped_to_len() {
        let mut input = BufferedInput::new();

        input.push("abc");

        assert_eq!(input.slice(Range::new(1, 10)), b"bc");
    }
}
