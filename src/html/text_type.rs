/// Text parsing mode of the lexer.
///
/// HTML is context-sensitive: the tree construction stage switches the
/// tokenizer between several text parsing state machines depending on the
/// current element. The tree builder simulator reproduces just enough of
/// that feedback to pick the right mode.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum TextType {
    Data,
    PlainText,
    RCData,
    RawText,
    ScriptData,
}

impl TextType {
    /// Raw-ish modes end only at an appropriate end tag (or EOF);
    /// `PlainText` never ends.
    #[inline]
    #[must_use]
    pub fn is_raw(self) -> bool {
        self != TextType::Data
    }
}

impl Default for TextType {
    #[inline]
    fn default() -> Self {
        TextType::Data
    }
}
