#[macro_use]
mod states;

use crate::base::Cursor;
use crate::html::TextType;

/// The tokenizer.
///
/// A resumable state machine converting the decoded character stream into
/// markup tokens. `next` consumes as much input as needed to produce one
/// token; if the input is exhausted mid-token the cursor is rewound to the
/// token start, so token boundaries depend only on the stream content and
/// never on how the bytes were chunked. That determinism is what makes
/// checkpoint resumption exactly equivalent to a continuous parse.
///
/// The lexer never fails: malformed markup always produces some token
/// sequence. Recovering from it is the tree builder's concern.
#[derive(Debug)]
pub struct Lexer {
    pub(super) cursor: Cursor,
    pub(super) text_type: TextType,
    pub(super) last_start_tag: String,
}

/// Everything needed to resume lexing from a position in the logical
/// stream with output identical to a continuous parse.
///
/// Snapshots are taken only at token boundaries, where the in-token
/// scratch is empty, so plain position + text mode + last start tag is
/// sufficient state.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct LexerSnapshot {
    pub pos: usize,
    pub text_type: TextType,
    pub last_start_tag: String,
}

impl Default for Lexer {
    fn default() -> Self {
        Lexer {
            cursor: Cursor::new(0),
            text_type: TextType::Data,
            last_start_tag: String::new(),
        }
    }
}

impl Lexer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Next read position in the logical stream.
    #[inline]
    #[must_use]
    pub fn pos(&self) -> usize {
        self.cursor.next_pos()
    }

    #[inline]
    #[must_use]
    pub fn text_type(&self) -> TextType {
        self.text_type
    }

    /// Applied by the driver when tree builder (simulator) feedback
    /// requires a different text parsing mode.
    #[inline]
    pub fn set_text_type(&mut self, text_type: TextType) {
        self.text_type = text_type;
    }

    #[inline]
    #[must_use]
    pub fn snapshot(&self) -> LexerSnapshot {
        LexerSnapshot {
            pos: self.cursor.next_pos(),
            text_type: self.text_type,
            last_start_tag: self.last_start_tag.clone(),
        }
    }

    pub fn restore(&mut self, snapshot: &LexerSnapshot) {
        self.cursor.rewind_to(snapshot.pos);
        self.text_type = snapshot.text_type;
        self.last_start_tag.clear();
        self.last_start_tag.push_str(&snapshot.last_start_tag);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::BufferedInput;
    use crate::token::{Token, TokenKind};

    fn lex_all(html: &str) -> Vec<Token> {
        let mut input = BufferedInput::new();

        input.push(html);
        input.mark_last();

        lex_input(&input)
    }

    fn lex_input(input: &BufferedInput) -> Vec<Token> {
        let mut lexer = Lexer::new();
        let mut token = Token::default();
        let mut tokens = Vec::new();

        while lexer.next(input, &mut token) {
            // Mimic the driver: start tags adjust the text mode.
            if token.kind == TokenKind::StartTag {
                if let Some(t) = token.tag_name().text_type_adjustment() {
                    lexer.set_text_type(t);
                }
            }

            let is_eof = token.kind == TokenKind::Eof;

            tokens.push(token.clone());

            if is_eof {
                break;
            }
        }

        tokens
    }

    fn kinds(tokens: &[Token]) -> Vec<TokenKind> {
        tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn basic_document() {
        let tokens = lex_all("<!DOCTYPE html><p class=\"a\">hi</p><!--c-->");

        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::Doctype,
                TokenKind::StartTag,
                TokenKind::Character,
                TokenKind::EndTag,
                TokenKind::Comment,
                TokenKind::Eof,
            ]
        );

        assert_eq!(tokens[0].name, "html");
        assert_eq!(tokens[1].name, "p");
        assert_eq!(tokens[1].attributes[0].name, "class");
        assert_eq!(tokens[1].attributes[0].value, "a");
        assert_eq!(tokens[2].text, "hi");
        assert_eq!(tokens[3].name, "p");
        assert_eq!(tokens[4].text, "c");
    }

    #[test]
    fn attribute_variants() {
        let tokens = lex_all("<a href=/x target=_blank disabled DATA-x='y z'>");
        let tag = &tokens[0];

        assert_eq!(tag.kind, TokenKind::StartTag);
        assert_eq!(tag.attributes.len(), 4);
        assert_eq!(tag.attributes[0].name, "href");
        assert_eq!(tag.attributes[0].value, "/x");
        assert_eq!(tag.attributes[1].value, "_blank");
        assert_eq!(tag.attributes[2].name, "disabled");
        assert_eq!(tag.attributes[2].value, "");
        assert_eq!(tag.attributes[3].name, "data-x");
        assert_eq!(tag.attributes[3].value, "y z");
    }

    #[test]
    fn duplicate_attributes_first_wins() {
        let tokens = lex_all("<img src=a src=b>");

        assert_eq!(tokens[0].attributes.len(), 1);
        assert_eq!(tokens[0].attributes[0].value, "a");
    }

    #[test]
    fn attribute_source_ranges() {
        let html = "<a href=\"xy\">";
        let tokens = lex_all(html);
        let attr = &tokens[0].attributes[0];

        assert_eq!(&html[attr.name_range.start..attr.name_range.end], "href");
        assert_eq!(&html[attr.value_range.start..attr.value_range.end], "xy");
    }

    #[test]
    fn self_closing_tag() {
        let tokens = lex_all("<br/>");

        assert!(tokens[0].self_closing);
    }

    #[test]
    fn script_content_is_raw_text() {
        let tokens = lex_all("<script>if (a < b) { x(\"</p>\"); }</script>");

        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::StartTag,
                TokenKind::Character,
                TokenKind::EndTag,
                TokenKind::Eof,
            ]
        );
        assert_eq!(tokens[1].text, "if (a < b) { x(\"</p>\"); }");
    }

    #[test]
    fn rawtext_ends_only_at_appropriate_end_tag() {
        let tokens = lex_all("<style></script>a</style>");

        assert_eq!(tokens[1].kind, TokenKind::Character);
        assert_eq!(tokens[1].text, "</script>a");
        assert!(tokens[2].is_end_tag(crate::html::TagName::Style));
    }

    #[test]
    fn plaintext_swallows_everything() {
        let tokens = lex_all("<plaintext></plaintext><p>");

        assert_eq!(tokens[1].kind, TokenKind::Character);
        assert_eq!(tokens[1].text, "</plaintext><p>");
        assert_eq!(tokens[2].kind, TokenKind::Eof);
    }

    #[test]
    fn literal_lt_in_text() {
        let tokens = lex_all("a < b <3 <<p>");

        assert_eq!(tokens[0].kind, TokenKind::Character);
        assert_eq!(tokens[0].text, "a < b <3 <");
        assert_eq!(tokens[1].kind, TokenKind::StartTag);
    }

    #[test]
    fn bogus_and_real_comments() {
        let tokens = lex_all("<!-- a -- b --><!x><?pi?>");

        assert_eq!(tokens[0].kind, TokenKind::Comment);
        assert_eq!(tokens[0].text, " a -- b ");
        assert_eq!(tokens[1].kind, TokenKind::Comment);
        assert_eq!(tokens[1].text, "x");
        assert_eq!(tokens[2].kind, TokenKind::Comment);
        assert_eq!(tokens[2].text, "?pi?");
    }

    #[test]
    fn end_tag_attributes_are_dropped() {
        let tokens = lex_all("</p class=x>");

        assert_eq!(tokens[0].kind, TokenKind::EndTag);
        assert!(tokens[0].attributes.is_empty());
    }

    #[test]
    fn empty_end_tag_emits_nothing() {
        let tokens = lex_all("a</>b");

        assert_eq!(
            kinds(&tokens),
            vec![TokenKind::Character, TokenKind::Character, TokenKind::Eof]
        );
        assert_eq!(tokens[0].text, "a");
        assert_eq!(tokens[1].text, "b");
    }

    #[test]
    fn incremental_feed_matches_whole_input() {
        let html = "<div id=a>x<y</div><script>1<2</script><!--c--><table>";
        let whole = lex_all(html);

        // Feed byte by byte: token boundaries must not change.
        let mut input = BufferedInput::new();
        let mut lexer = Lexer::new();
        let mut token = Token::default();
        let mut tokens = Vec::new();

        for (i, b) in html.bytes().enumerate() {
            input.push(std::str::from_utf8(&[b]).unwrap_or(""));

            if i == html.len() - 1 {
                input.mark_last();
            }

            while lexer.next(&input, &mut token) {
                if token.kind == TokenKind::StartTag {
                    if let Some(t) = token.tag_name().text_type_adjustment() {
                        lexer.set_text_type(t);
                    }
                }

                let is_eof = token.kind == TokenKind::Eof;

                tokens.push(token.clone());

                if is_eof {
                    break;
                }
            }
        }

        assert_eq!(tokens, whole);
    }

    #[test]
    fn snapshot_resume_is_equivalent() {
        let html = "<p>one</p><script>s()</script><p>two</p>";
        let mut input = BufferedInput::new();

        input.push(html);
        input.mark_last();

        let whole = lex_input(&input);

        // Re-lex from a snapshot taken after each token; the tail must
        // always match the continuous parse.
        let mut lexer = Lexer::new();
        let mut token = Token::default();
        let mut consumed = 0;

        loop {
            let snapshot = lexer.snapshot();

            let mut resumed = Lexer::new();

            resumed.restore(&snapshot);
            assert_eq!(resumed.snapshot(), snapshot);

            let mut tail = Vec::new();
            let mut t = Token::default();

            while resumed.next(&input, &mut t) {
                if t.kind == TokenKind::StartTag {
                    if let Some(tt) = t.tag_name().text_type_adjustment() {
                        resumed.set_text_type(tt);
                    }
                }

                let is_eof = t.kind == TokenKind::Eof;

                tail.push(t.clone());

                if is_eof {
                    break;
                }
            }

            assert_eq!(tail, whole[consumed..].to_vec());

            if !lexer.next(&input, &mut token) {
                break;
            }

            if token.kind == TokenKind::StartTag {
                if let Some(tt) = token.tag_name().text_type_adjustment() {
                    lexer.set_text_type(tt);
                }
            }

            consumed += 1;

            if token.kind == TokenKind::Eof {
                break;
            }
        }
    }
}
