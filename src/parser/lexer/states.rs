use super::Lexer;
use crate::base::{BufferedInput, Range};
use crate::html::TextType;
use crate::token::{Attribute, Token, TokenKind};

/// Lexical states. The state is local to one `next` call: on input
/// exhaustion the cursor rewinds to the token start, so every call begins
/// at a token boundary in the state implied by the current text type.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum State {
    Data,
    PlainText,
    RawText,
    RawTextLessThan,
    RawTextEndTagOpen,
    RawTextEndTagName,
    TagOpen,
    EndTagOpen,
    TagName,
    SelfClosingStartTag,
    BeforeAttrName,
    AttrName,
    AfterAttrName,
    BeforeAttrValue,
    AttrValueDoubleQuoted,
    AttrValueSingleQuoted,
    AttrValueUnquoted,
    AfterAttrValueQuoted,
    MarkupDeclarationOpen,
    CommentStart,
    CommentStartDash,
    Comment,
    CommentEndDash,
    CommentEnd,
    CommentEndBang,
    BogusComment,
    Doctype,
    BeforeDoctypeName,
    DoctypeName,
    BogusDoctype,
}

enum Lookahead {
    Matched,
    NotMatched,
    Insufficient,
}

// NOTE: macros instead of methods so that a mid-token input exhaustion can
// early-return from `next` at the point of consumption.
macro_rules! consume_or_bail {
    ($self:ident, $input:ident, $token_start:expr) => {
        match $self.cursor.consume($input) {
            Some(ch) => Some(ch),
            None if $input.is_last() => None,
            None => {
                $self.cursor.rewind_to($token_start);
                return false;
            }
        }
    };
}

macro_rules! emit_text {
    ($input:ident, $token:ident, $start:expr, $end:expr) => {{
        $token.kind = TokenKind::Character;
        set_text_lossy(&mut $token.text, $input.slice(Range::new($start, $end)));
        $token.raw_range = Range::new($start, $end);
        return true;
    }};
}

macro_rules! emit_eof {
    ($input:ident, $token:ident) => {{
        $token.kind = TokenKind::Eof;
        $token.raw_range = Range::new($input.len(), $input.len());
        return true;
    }};
}

macro_rules! emit_text_or_eof {
    ($input:ident, $token:ident, $start:expr) => {{
        let end = $input.len();

        if end > $start {
            emit_text!($input, $token, $start, end);
        }

        emit_eof!($input, $token);
    }};
}

macro_rules! emit_comment {
    ($self:ident, $input:ident, $token:ident, $token_start:expr, $text_start:expr, $text_end:expr) => {{
        $token.kind = TokenKind::Comment;
        set_text_lossy(
            &mut $token.text,
            $input.slice(Range::new($text_start, $text_end)),
        );
        $token.raw_range = Range::new($token_start, $self.cursor.next_pos());
        return true;
    }};
}

macro_rules! emit_doctype {
    ($self:ident, $token:ident, $token_start:expr) => {{
        $token.kind = TokenKind::Doctype;
        $token.raw_range = Range::new($token_start, $self.cursor.next_pos());
        return true;
    }};
}

#[inline]
fn is_ws(ch: u8) -> bool {
    matches!(ch, b' ' | b'\t' | b'\n' | b'\r' | b'\x0c')
}

fn set_text_lossy(dst: &mut String, bytes: &[u8]) {
    dst.clear();
    dst.push_str(&String::from_utf8_lossy(bytes));
}

fn lowercase_into(dst: &mut String, bytes: &[u8]) {
    dst.clear();

    for ch in String::from_utf8_lossy(bytes).chars() {
        dst.push(ch.to_ascii_lowercase());
    }
}

fn finish_attr(token: &mut Token, input: &BufferedInput, name_range: Range, value_range: Range) {
    let name = String::from_utf8_lossy(input.slice(name_range)).to_ascii_lowercase();

    // Duplicate attribute names: the first occurrence wins.
    if !name.is_empty() && token.attribute(&name).is_none() {
        let value = String::from_utf8_lossy(input.slice(value_range)).into_owned();

        token.attributes.push(Attribute {
            name,
            value,
            name_range,
            value_range,
        });
    }
}

fn lookahead(input: &BufferedInput, at: usize, needle: &[u8], case_insensitive: bool) -> Lookahead {
    for (i, &expected) in needle.iter().enumerate() {
        match input.get(at + i) {
            None if input.is_last() => return Lookahead::NotMatched,
            None => return Lookahead::Insufficient,
            Some(actual) => {
                let matches = if case_insensitive {
                    actual.eq_ignore_ascii_case(&expected)
                } else {
                    actual == expected
                };

                if !matches {
                    return Lookahead::NotMatched;
                }
            }
        }
    }

    Lookahead::Matched
}

impl Lexer {
    /// Lexes the next token out of `input`, filling `token`.
    ///
    /// Returns `false` when the input is exhausted mid-token and more is
    /// expected; the cursor is then rewound to the token start so the call
    /// can simply be repeated once more input arrives. After the final
    /// input, every call returns `true` (ultimately an `Eof` token).
    pub fn next(&mut self, input: &BufferedInput, token: &mut Token) -> bool {
        token.clear();

        let mut token_start = self.cursor.next_pos();
        let mut state = match self.text_type {
            TextType::Data => State::Data,
            TextType::PlainText => State::PlainText,
            _ => State::RawText,
        };

        // In-token scratch; rebuilt from scratch whenever the token is
        // re-lexed after a rewind.
        let mut name_start = 0;
        let mut attr_name_range = Range::default();
        let mut attr_value_start = 0;
        let mut comment_start = 0;
        let mut lt_pos = 0;
        let mut end_name_start = 0;
        let mut closing_quote = b'"';

        loop {
            match state {
                State::Data => match consume_or_bail!(self, input, token_start) {
                    Some(b'<') => match self.cursor.peek(input) {
                        None if !input.is_last() => {
                            self.cursor.rewind_to(token_start);
                            return false;
                        }
                        Some(ch)
                            if ch.is_ascii_alphabetic()
                                || ch == b'/'
                                || ch == b'!'
                                || ch == b'?' =>
                        {
                            let lt = self.cursor.pos();

                            if lt > token_start {
                                self.cursor.unconsume();
                                emit_text!(input, token, token_start, lt);
                            }

                            state = State::TagOpen;
                        }
                        // Literal `<` followed by non-markup: plain text.
                        _ => (),
                    },
                    Some(_) => (),
                    None => emit_text_or_eof!(input, token, token_start),
                },

                State::PlainText => match consume_or_bail!(self, input, token_start) {
                    Some(_) => (),
                    None => emit_text_or_eof!(input, token, token_start),
                },

                State::RawText => match consume_or_bail!(self, input, token_start) {
                    Some(b'<') => {
                        lt_pos = self.cursor.pos();
                        state = State::RawTextLessThan;
                    }
                    Some(_) => (),
                    None => emit_text_or_eof!(input, token, token_start),
                },

                State::RawTextLessThan => match consume_or_bail!(self, input, token_start) {
                    Some(b'/') => {
                        end_name_start = self.cursor.next_pos();
                        state = State::RawTextEndTagOpen;
                    }
                    Some(b'<') => lt_pos = self.cursor.pos(),
                    Some(_) => state = State::RawText,
                    None => emit_text_or_eof!(input, token, token_start),
                },

                State::RawTextEndTagOpen => match consume_or_bail!(self, input, token_start) {
                    Some(ch) if ch.is_ascii_alphabetic() => state = State::RawTextEndTagName,
                    Some(b'<') => {
                        lt_pos = self.cursor.pos();
                        state = State::RawTextLessThan;
                    }
                    Some(_) => state = State::RawText,
                    None => emit_text_or_eof!(input, token, token_start),
                },

                State::RawTextEndTagName => match consume_or_bail!(self, input, token_start) {
                    Some(ch) if ch.is_ascii_alphanumeric() => (),
                    Some(ch) if is_ws(ch) || ch == b'/' || ch == b'>' => {
                        let name_end = self.cursor.pos();
                        let appropriate = {
                            let name = input.slice(Range::new(end_name_start, name_end));

                            name.eq_ignore_ascii_case(self.last_start_tag.as_bytes())
                        };

                        if appropriate {
                            if lt_pos > token_start {
                                // Emit the preceding text run first; the
                                // end tag is re-lexed on the next call.
                                self.cursor.rewind_to(lt_pos);
                                emit_text!(input, token, token_start, lt_pos);
                            }

                            token.kind = TokenKind::EndTag;
                            lowercase_into(
                                &mut token.name,
                                input.slice(Range::new(end_name_start, name_end)),
                            );

                            match ch {
                                b'>' => {
                                    self.finish_tag(token, token_start);
                                    return true;
                                }
                                b'/' => state = State::SelfClosingStartTag,
                                _ => state = State::BeforeAttrName,
                            }
                        } else {
                            state = State::RawText;
                        }
                    }
                    Some(b'<') => {
                        lt_pos = self.cursor.pos();
                        state = State::RawTextLessThan;
                    }
                    Some(_) => state = State::RawText,
                    None => emit_text_or_eof!(input, token, token_start),
                },

                State::TagOpen => match consume_or_bail!(self, input, token_start) {
                    Some(b'!') => state = State::MarkupDeclarationOpen,
                    Some(b'/') => state = State::EndTagOpen,
                    Some(ch) if ch.is_ascii_alphabetic() => {
                        token.kind = TokenKind::StartTag;
                        name_start = self.cursor.pos();
                        state = State::TagName;
                    }
                    Some(b'?') => {
                        token.kind = TokenKind::Comment;
                        comment_start = self.cursor.pos();
                        state = State::BogusComment;
                    }
                    _ => unreachable!("Tag open character should be guaranteed by the peek"),
                },

                State::EndTagOpen => match consume_or_bail!(self, input, token_start) {
                    Some(ch) if ch.is_ascii_alphabetic() => {
                        token.kind = TokenKind::EndTag;
                        name_start = self.cursor.pos();
                        state = State::TagName;
                    }
                    Some(b'>') => {
                        // `</>`: no token at all; restart at the next byte.
                        token.clear();
                        token_start = self.cursor.next_pos();
                        state = State::Data;
                    }
                    Some(_) => {
                        token.kind = TokenKind::Comment;
                        comment_start = self.cursor.pos();
                        state = State::BogusComment;
                    }
                    // `</` at EOF is just text.
                    None => emit_text_or_eof!(input, token, token_start),
                },

                State::TagName => match consume_or_bail!(self, input, token_start) {
                    Some(ch) if is_ws(ch) => {
                        lowercase_into(
                            &mut token.name,
                            input.slice(Range::new(name_start, self.cursor.pos())),
                        );
                        state = State::BeforeAttrName;
                    }
                    Some(b'/') => {
                        lowercase_into(
                            &mut token.name,
                            input.slice(Range::new(name_start, self.cursor.pos())),
                        );
                        state = State::SelfClosingStartTag;
                    }
                    Some(b'>') => {
                        lowercase_into(
                            &mut token.name,
                            input.slice(Range::new(name_start, self.cursor.pos())),
                        );
                        self.finish_tag(token, token_start);
                        return true;
                    }
                    Some(_) => (),
                    // Partial tag at EOF is dropped on the floor.
                    None => emit_eof!(input, token),
                },

                State::SelfClosingStartTag => match consume_or_bail!(self, input, token_start) {
                    Some(b'>') => {
                        if token.kind == TokenKind::StartTag {
                            token.self_closing = true;
                        }

                        self.finish_tag(token, token_start);
                        return true;
                    }
                    Some(_) => {
                        self.cursor.unconsume();
                        state = State::BeforeAttrName;
                    }
                    None => emit_eof!(input, token),
                },

                State::BeforeAttrName => match consume_or_bail!(self, input, token_start) {
                    Some(ch) if is_ws(ch) => (),
                    Some(b'/') => state = State::SelfClosingStartTag,
                    Some(b'>') => {
                        self.finish_tag(token, token_start);
                        return true;
                    }
                    Some(_) => {
                        self.cursor.unconsume();
                        attr_name_range = Range::new(self.cursor.next_pos(), 0);
                        state = State::AttrName;
                    }
                    None => emit_eof!(input, token),
                },

                State::AttrName => match consume_or_bail!(self, input, token_start) {
                    Some(ch) if is_ws(ch) => {
                        attr_name_range.end = self.cursor.pos();
                        state = State::AfterAttrName;
                    }
                    Some(b'/') => {
                        attr_name_range.end = self.cursor.pos();

                        let p = self.cursor.pos();

                        finish_attr(token, input, attr_name_range, Range::new(p, p));
                        state = State::SelfClosingStartTag;
                    }
                    Some(b'=') => {
                        attr_name_range.end = self.cursor.pos();
                        state = State::BeforeAttrValue;
                    }
                    Some(b'>') => {
                        attr_name_range.end = self.cursor.pos();

                        let p = self.cursor.pos();

                        finish_attr(token, input, attr_name_range, Range::new(p, p));
                        self.finish_tag(token, token_start);
                        return true;
                    }
                    Some(_) => (),
                    None => emit_eof!(input, token),
                },

                State::AfterAttrName => match consume_or_bail!(self, input, token_start) {
                    Some(ch) if is_ws(ch) => (),
                    Some(b'/') => {
                        let p = self.cursor.pos();

                        finish_attr(token, input, attr_name_range, Range::new(p, p));
                        state = State::SelfClosingStartTag;
                    }
                    Some(b'=') => state = State::BeforeAttrValue,
                    Some(b'>') => {
                        let p = self.cursor.pos();

                        finish_attr(token, input, attr_name_range, Range::new(p, p));
                        self.finish_tag(token, token_start);
                        return true;
                    }
                    Some(_) => {
                        let p = self.cursor.pos();

                        finish_attr(token, input, attr_name_range, Range::new(p, p));
                        self.cursor.unconsume();
                        attr_name_range = Range::new(self.cursor.next_pos(), 0);
                        state = State::AttrName;
                    }
                    None => emit_eof!(input, token),
                },

                State::BeforeAttrValue => match consume_or_bail!(self, input, token_start) {
                    Some(ch) if is_ws(ch) => (),
                    Some(quote @ (b'"' | b'\'')) => {
                        closing_quote = quote;
                        attr_value_start = self.cursor.next_pos();
                        state = if quote == b'"' {
                            State::AttrValueDoubleQuoted
                        } else {
                            State::AttrValueSingleQuoted
                        };
                    }
                    Some(b'>') => {
                        let p = self.cursor.pos();

                        finish_attr(token, input, attr_name_range, Range::new(p, p));
                        self.finish_tag(token, token_start);
                        return true;
                    }
                    Some(_) => {
                        self.cursor.unconsume();
                        attr_value_start = self.cursor.next_pos();
                        state = State::AttrValueUnquoted;
                    }
                    None => emit_eof!(input, token),
                },

                State::AttrValueDoubleQuoted | State::AttrValueSingleQuoted => {
                    match consume_or_bail!(self, input, token_start) {
                        Some(ch) if ch == closing_quote => {
                            finish_attr(
                                token,
                                input,
                                attr_name_range,
                                Range::new(attr_value_start, self.cursor.pos()),
                            );
                            state = State::AfterAttrValueQuoted;
                        }
                        Some(_) => (),
                        None => emit_eof!(input, token),
                    }
                }

                State::AttrValueUnquoted => match consume_or_bail!(self, input, token_start) {
                    Some(ch) if is_ws(ch) => {
                        finish_attr(
                            token,
                            input,
                            attr_name_range,
                            Range::new(attr_value_start, self.cursor.pos()),
                        );
                        state = State::BeforeAttrName;
                    }
                    Some(b'>') => {
                        finish_attr(
                            token,
                            input,
                            attr_name_range,
                            Range::new(attr_value_start, self.cursor.pos()),
                        );
                        self.finish_tag(token, token_start);
                        return true;
                    }
                    Some(_) => (),
                    None => emit_eof!(input, token),
                },

                State::AfterAttrValueQuoted => match consume_or_bail!(self, input, token_start) {
                    Some(ch) if is_ws(ch) => state = State::BeforeAttrName,
                    Some(b'/') => state = State::SelfClosingStartTag,
                    Some(b'>') => {
                        self.finish_tag(token, token_start);
                        return true;
                    }
                    Some(_) => {
                        self.cursor.unconsume();
                        state = State::BeforeAttrName;
                    }
                    None => emit_eof!(input, token),
                },

                State::MarkupDeclarationOpen => {
                    let at = self.cursor.next_pos();

                    match lookahead(input, at, b"--", false) {
                        Lookahead::Matched => {
                            self.cursor.advance(2);
                            comment_start = self.cursor.next_pos();
                            state = State::CommentStart;
                        }
                        Lookahead::Insufficient => {
                            self.cursor.rewind_to(token_start);
                            return false;
                        }
                        Lookahead::NotMatched => match lookahead(input, at, b"doctype", true) {
                            Lookahead::Matched => {
                                self.cursor.advance(7);
                                state = State::Doctype;
                            }
                            Lookahead::Insufficient => {
                                self.cursor.rewind_to(token_start);
                                return false;
                            }
                            // NOTE: `<![CDATA[` lands here too; outside of
                            // foreign content it is a bogus comment anyway.
                            Lookahead::NotMatched => {
                                token.kind = TokenKind::Comment;
                                comment_start = self.cursor.next_pos();
                                state = State::BogusComment;
                            }
                        },
                    }
                }

                State::CommentStart => match consume_or_bail!(self, input, token_start) {
                    Some(b'-') => state = State::CommentStartDash,
                    Some(b'>') => {
                        emit_comment!(self, input, token, token_start, comment_start, comment_start)
                    }
                    Some(_) => state = State::Comment,
                    None => {
                        emit_comment!(self, input, token, token_start, comment_start, input.len())
                    }
                },

                State::CommentStartDash => match consume_or_bail!(self, input, token_start) {
                    Some(b'-') => state = State::CommentEnd,
                    Some(b'>') => {
                        emit_comment!(self, input, token, token_start, comment_start, comment_start)
                    }
                    Some(_) => state = State::Comment,
                    None => {
                        emit_comment!(self, input, token, token_start, comment_start, input.len())
                    }
                },

                State::Comment => match consume_or_bail!(self, input, token_start) {
                    Some(b'-') => state = State::CommentEndDash,
                    Some(_) => (),
                    None => {
                        emit_comment!(self, input, token, token_start, comment_start, input.len())
                    }
                },

                State::CommentEndDash => match consume_or_bail!(self, input, token_start) {
                    Some(b'-') => state = State::CommentEnd,
                    Some(_) => state = State::Comment,
                    None => {
                        emit_comment!(self, input, token, token_start, comment_start, input.len())
                    }
                },

                State::CommentEnd => match consume_or_bail!(self, input, token_start) {
                    Some(b'>') => {
                        let text_end = self.cursor.pos() - 2;

                        emit_comment!(self, input, token, token_start, comment_start, text_end);
                    }
                    Some(b'-') => (),
                    Some(b'!') => state = State::CommentEndBang,
                    Some(_) => state = State::Comment,
                    None => {
                        emit_comment!(self, input, token, token_start, comment_start, input.len())
                    }
                },

                State::CommentEndBang => match consume_or_bail!(self, input, token_start) {
                    Some(b'>') => {
                        let text_end = self.cursor.pos() - 3;

                        emit_comment!(self, input, token, token_start, comment_start, text_end);
                    }
                    Some(b'-') => state = State::CommentEndDash,
                    Some(_) => state = State::Comment,
                    None => {
                        emit_comment!(self, input, token, token_start, comment_start, input.len())
                    }
                },

                State::BogusComment => match consume_or_bail!(self, input, token_start) {
                    Some(b'>') => {
                        let text_end = self.cursor.pos();

                        emit_comment!(self, input, token, token_start, comment_start, text_end);
                    }
                    Some(_) => (),
                    None => {
                        emit_comment!(self, input, token, token_start, comment_start, input.len())
                    }
                },

                State::Doctype => match consume_or_bail!(self, input, token_start) {
                    Some(ch) if is_ws(ch) => state = State::BeforeDoctypeName,
                    Some(b'>') => emit_doctype!(self, token, token_start),
                    Some(_) => {
                        self.cursor.unconsume();
                        state = State::BeforeDoctypeName;
                    }
                    None => emit_doctype!(self, token, token_start),
                },

                State::BeforeDoctypeName => match consume_or_bail!(self, input, token_start) {
                    Some(ch) if is_ws(ch) => (),
                    Some(b'>') => emit_doctype!(self, token, token_start),
                    Some(_) => {
                        name_start = self.cursor.pos();
                        state = State::DoctypeName;
                    }
                    None => emit_doctype!(self, token, token_start),
                },

                State::DoctypeName => match consume_or_bail!(self, input, token_start) {
                    Some(ch) if is_ws(ch) => {
                        lowercase_into(
                            &mut token.name,
                            input.slice(Range::new(name_start, self.cursor.pos())),
                        );
                        state = State::BogusDoctype;
                    }
                    Some(b'>') => {
                        lowercase_into(
                            &mut token.name,
                            input.slice(Range::new(name_start, self.cursor.pos())),
                        );
                        emit_doctype!(self, token, token_start);
                    }
                    Some(_) => (),
                    None => {
                        lowercase_into(
                            &mut token.name,
                            input.slice(Range::new(name_start, input.len())),
                        );
                        emit_doctype!(self, token, token_start);
                    }
                },

                // Public/system identifiers are not modeled; everything up
                // to `>` is skipped.
                State::BogusDoctype => match consume_or_bail!(self, input, token_start) {
                    Some(b'>') => emit_doctype!(self, token, token_start),
                    Some(_) => (),
                    None => emit_doctype!(self, token, token_start),
                },
            }
        }
    }

    fn finish_tag(&mut self, token: &mut Token, token_start: usize) {
        token.raw_range = Range::new(token_start, self.cursor.next_pos());

        if token.kind == TokenKind::EndTag {
            // End tag attributes are parse errors; they are dropped.
            token.attributes.clear();
            token.self_closing = false;

            // An appropriate end tag always exits a raw text mode.
            if self.text_type.is_raw() {
                self.text_type = TextType::Data;
            }
        } else {
            self.last_start_tag.clear();
            self.last_start_tag.push_str(&token.name);
        }
    }
}
