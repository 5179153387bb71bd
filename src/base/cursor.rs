use super::BufferedInput;

/// A read position over [`BufferedInput`].
#[derive(Default, Debug, Clone, Copy)]
pub struct Cursor {
    next_pos: usize,
}

impl Cursor {
    #[inline]
    #[must_use]
    pub const fn new(pos: usize) -> Self {
        Cursor { next_pos: pos }
    }

    /// Position of the most recently consumed byte.
    #[inline]
    #[must_use]
    pub const fn pos(&self) -> usize {
        self.next_pos - 1
    }

    #[inline]
    #[must_use]
    pub const fn next_pos(&self) -> usize {
        self.next_pos
    }

    #[inline]
    pub fn consume(&mut self, input: &BufferedInput) -> Option<u8> {
        let ch = input.get(self.next_pos);

        if ch.is_some() {
            self.next_pos += 1;
        }

        ch
    }

    #[inline]
    #[must_use]
    pub fn peek(&self, input: &BufferedInput) -> Option<u8> {
        input.get(self.next_pos)
    }

    /// Skips `n` bytes known to be present (after a successful lookahead).
    #[inline]
    pub fn advance(&mut self, n: usize) {
        self.next_pos += n;
    }

    #[inline]
    pub fn unconsume(&mut self) {
        self.next_pos -= 1;
    }

    #[inline]
    pub fn rewind_to(&mut self, pos: usize) {
        self.next_pos = pos;
    }
}
