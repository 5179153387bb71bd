/// A byte range into the logical input stream.
///
/// Offsets are absolute: the input buffer is never rebased, so ranges stay
/// valid for the lifetime of the document parse and can cross the thread
/// boundary as plain data.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct Range {
    pub start: usize,
    pub end: usize,
}

impl Range {
    #[inline]
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        Range { start, end }
    }

    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}
