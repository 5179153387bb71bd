use crate::base::Range;
use crate::html::TagName;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum TokenKind {
    StartTag,
    EndTag,
    Character,
    Comment,
    Doctype,
    Eof,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Attribute {
    pub name: String,
    pub value: String,
    pub name_range: Range,
    pub value_range: Range,
}

/// A single lexical unit of markup.
///
/// The token is a single-owner value reused across lexer iterations:
/// [`Token::clear`] resets it without dropping buffer capacity. Tokens own
/// all their data and carry no back-references to the source buffer, so a
/// plain `clone` is what crosses the thread boundary inside a chunk.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Token {
    pub kind: TokenKind,
    /// Lowercased tag name; empty for non-tag tokens.
    pub name: String,
    /// Insertion-ordered; duplicate names keep the first occurrence.
    pub attributes: Vec<Attribute>,
    /// Character data or comment text. Mutable: the reflected-content
    /// filter may erase or replace it.
    pub text: String,
    pub self_closing: bool,
    /// Raw source range of the whole token in the logical stream.
    pub raw_range: Range,
}

impl Default for Token {
    fn default() -> Self {
        Token {
            kind: TokenKind::Eof,
            name: String::new(),
            attributes: Vec::new(),
            text: String::new(),
            self_closing: false,
            raw_range: Range::default(),
        }
    }
}

impl Token {
    #[inline]
    pub fn clear(&mut self) {
        self.kind = TokenKind::Eof;
        self.name.clear();
        self.attributes.clear();
        self.text.clear();
        self.self_closing = false;
        self.raw_range = Range::default();
    }

    #[inline]
    #[must_use]
    pub fn tag_name(&self) -> TagName {
        TagName::from_bytes(self.name.as_bytes())
    }

    #[inline]
    #[must_use]
    pub fn is_start_tag(&self, name: TagName) -> bool {
        self.kind == TokenKind::StartTag && self.tag_name() == name
    }

    #[inline]
    #[must_use]
    pub fn is_end_tag(&self, name: TagName) -> bool {
        self.kind == TokenKind::EndTag && self.tag_name() == name
    }

    #[inline]
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_keeps_capacity() {
        let mut token = Token::default();

        token.text.push_str("some character data");
        token.name.push_str("div");

        let text_cap = token.text.capacity();

        token.clear();

        assert!(token.text.is_empty());
        assert!(token.name.is_empty());
        assert_eq!(token.text.capacity(), text_cap);
    }

    #[test]
    fn attribute_lookup_is_case_insensitive() {
        let mut token = Token::default();

        token.kind = TokenKind::StartTag;
        token.attributes.push(Attribute {
            name: "src".into(),
            value: "a.js".into(),
            name_range: Range::default(),
            value_range: Range::default(),
        });

        assert!(token.attribute("SRC").is_some());
        assert!(token.attribute("href").is_none());
    }
}
