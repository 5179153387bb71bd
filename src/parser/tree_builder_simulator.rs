//! Tree construction stage feedback, without the tree.
//!
//! HTML is context-sensitive: which text parsing mode the tokenizer should
//! be in depends on the state of the stack of open elements. For lexing
//! ahead of the real tree builder it is enough to track a reduced
//! projection of that state: the namespace stack and a handful of
//! integration-point rules. This simulator must never be mistaken for a
//! tree; it exists only to keep speculative lexing on the same trajectory
//! as the real parse, and to flag the one transition it cannot safely
//! predict past: an opening `<script>`.

use crate::html::{
    causes_foreign_content_exit, is_html_integration_point_in_svg,
    is_text_integration_point_in_math_ml, TagName, TextType,
};
use crate::token::{Token, TokenKind};

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum Namespace {
    Html,
    Svg,
    MathML,
}

/// Feedback for the token that was just lexed.
#[must_use]
#[derive(Debug, PartialEq, Eq)]
pub enum Feedback {
    None,
    SwitchTextType(TextType),
    /// An opening `<script>`: switch to script data and treat the position
    /// as a speculation boundary, since what the script does to the stream
    /// is unknowable here.
    ScriptStart,
}

/// Comparable copy of the simulator state; embedded in chunks so the
/// orchestrator can check that the worker's starting assumptions still
/// match ground truth.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SimulatorSnapshot {
    ns_stack: Vec<Namespace>,
}

#[derive(Debug)]
pub struct TreeBuilderSimulator {
    ns_stack: Vec<Namespace>,
}

impl Default for TreeBuilderSimulator {
    fn default() -> Self {
        TreeBuilderSimulator {
            ns_stack: vec![Namespace::Html],
        }
    }
}

impl TreeBuilderSimulator {
    #[inline]
    fn current_ns(&self) -> Namespace {
        *self
            .ns_stack
            .last()
            .expect("Namespace stack should always have at least one item")
    }

    #[must_use]
    pub fn snapshot(&self) -> SimulatorSnapshot {
        SimulatorSnapshot {
            ns_stack: self.ns_stack.clone(),
        }
    }

    pub fn restore(&mut self, snapshot: &SimulatorSnapshot) {
        self.ns_stack.clear();
        self.ns_stack.extend_from_slice(&snapshot.ns_stack);
    }

    pub fn feedback_for_token(&mut self, token: &Token) -> Feedback {
        match token.kind {
            TokenKind::StartTag => self.feedback_for_start_tag(token),
            TokenKind::EndTag => self.feedback_for_end_tag(token),
            _ => Feedback::None,
        }
    }

    fn feedback_for_start_tag(&mut self, token: &Token) -> Feedback {
        let tag = token.tag_name();

        match tag {
            TagName::Svg => self.enter_ns(Namespace::Svg),
            TagName::Math => self.enter_ns(Namespace::MathML),
            _ if self.current_ns() != Namespace::Html => {
                self.feedback_for_start_tag_in_foreign_content(token, tag)
            }
            TagName::Script => Feedback::ScriptStart,
            _ => match tag.text_type_adjustment() {
                Some(text_type) => Feedback::SwitchTextType(text_type),
                None => Feedback::None,
            },
        }
    }

    fn feedback_for_end_tag(&mut self, token: &Token) -> Feedback {
        let tag = token.tag_name();

        match tag {
            TagName::Svg if self.current_ns() == Namespace::Svg => self.leave_ns(),
            TagName::Math if self.current_ns() == Namespace::MathML => self.leave_ns(),
            _ if self.current_ns() == Namespace::Html => self.check_integration_point_exit(token),
            _ => Feedback::None,
        }
    }

    fn enter_ns(&mut self, ns: Namespace) -> Feedback {
        self.ns_stack.push(ns);
        Feedback::None
    }

    fn leave_ns(&mut self) -> Feedback {
        if self.ns_stack.len() > 1 {
            self.ns_stack.pop();
        }

        Feedback::None
    }

    fn check_integration_point_exit(&mut self, token: &Token) -> Feedback {
        let ns_stack_len = self.ns_stack.len();

        if ns_stack_len < 2 {
            return Feedback::None;
        }

        let prev_ns = self.ns_stack[ns_stack_len - 2];
        let name = token.name.as_bytes();

        let is_exit = match prev_ns {
            Namespace::MathML => {
                is_text_integration_point_in_math_ml(name)
                    || token.tag_name() == TagName::AnnotationXml
            }
            Namespace::Svg => is_html_integration_point_in_svg(name),
            Namespace::Html => false,
        };

        if is_exit {
            self.leave_ns()
        } else {
            Feedback::None
        }
    }

    fn feedback_for_start_tag_in_foreign_content(
        &mut self,
        token: &Token,
        tag: TagName,
    ) -> Feedback {
        let name = token.name.as_bytes();

        if causes_foreign_content_exit(name) {
            return self.leave_ns();
        }

        // <font> exits foreign content only when it carries one of the
        // HTML-ish presentation attributes.
        if tag == TagName::Font {
            let has_html_attr = token
                .attributes
                .iter()
                .any(|a| matches!(a.name.as_str(), "color" | "size" | "face"));

            if has_html_attr {
                return self.leave_ns();
            }

            return Feedback::None;
        }

        if !token.self_closing && self.is_integration_point_enter(token, tag) {
            return self.enter_ns(Namespace::Html);
        }

        Feedback::None
    }

    fn is_integration_point_enter(&self, token: &Token, tag: TagName) -> bool {
        let name = token.name.as_bytes();

        match self.current_ns() {
            Namespace::Svg => is_html_integration_point_in_svg(name),
            Namespace::MathML => {
                if is_text_integration_point_in_math_ml(name) {
                    return true;
                }

                // <annotation-xml> is an integration point only for HTML-ish
                // encodings.
                tag == TagName::AnnotationXml
                    && token.attribute("encoding").is_some_and(|a| {
                        a.value.eq_ignore_ascii_case("text/html")
                            || a.value.eq_ignore_ascii_case("application/xhtml+xml")
                    })
            }
            Namespace::Html => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::Range;
    use crate::token::Attribute;

    fn start_tag(name: &str) -> Token {
        let mut t = Token::default();

        t.kind = TokenKind::StartTag;
        t.name.push_str(name);
        t
    }

    fn end_tag(name: &str) -> Token {
        let mut t = Token::default();

        t.kind = TokenKind::EndTag;
        t.name.push_str(name);
        t
    }

    fn with_attr(mut t: Token, name: &str, value: &str) -> Token {
        t.attributes.push(Attribute {
            name: name.into(),
            value: value.into(),
            name_range: Range::default(),
            value_range: Range::default(),
        });
        t
    }

    #[test]
    fn script_is_a_speculation_boundary() {
        let mut sim = TreeBuilderSimulator::default();

        assert_eq!(
            sim.feedback_for_token(&start_tag("script")),
            Feedback::ScriptStart
        );
    }

    #[test]
    fn title_in_svg_is_not_rcdata() {
        let mut sim = TreeBuilderSimulator::default();

        assert_eq!(
            sim.feedback_for_token(&start_tag("title")),
            Feedback::SwitchTextType(TextType::RCData)
        );

        let _ = sim.feedback_for_token(&start_tag("svg"));

        // <title> is an HTML integration point in SVG; no text mode switch,
        // but the content below it is HTML again.
        assert_eq!(sim.feedback_for_token(&start_tag("title")), Feedback::None);
        assert_eq!(
            sim.feedback_for_token(&start_tag("textarea")),
            Feedback::SwitchTextType(TextType::RCData)
        );
    }

    #[test]
    fn font_with_color_exits_foreign_content() {
        let mut sim = TreeBuilderSimulator::default();

        let _ = sim.feedback_for_token(&start_tag("svg"));
        let _ = sim.feedback_for_token(&with_attr(start_tag("font"), "color", "red"));

        // Back in HTML: raw text switches apply again.
        assert_eq!(
            sim.feedback_for_token(&start_tag("style")),
            Feedback::SwitchTextType(TextType::RawText)
        );
    }

    #[test]
    fn foreign_content_exit_tags() {
        let mut sim = TreeBuilderSimulator::default();

        let _ = sim.feedback_for_token(&start_tag("math"));
        let _ = sim.feedback_for_token(&start_tag("div"));

        assert_eq!(
            sim.feedback_for_token(&start_tag("script")),
            Feedback::ScriptStart
        );
    }

    #[test]
    fn annotation_xml_integration_point_depends_on_encoding() {
        let mut sim = TreeBuilderSimulator::default();

        let _ = sim.feedback_for_token(&start_tag("math"));
        let _ = sim.feedback_for_token(&with_attr(
            start_tag("annotation-xml"),
            "encoding",
            "text/html",
        ));

        assert_eq!(
            sim.feedback_for_token(&start_tag("title")),
            Feedback::SwitchTextType(TextType::RCData)
        );

        let _ = sim.feedback_for_token(&end_tag("title"));
        let _ = sim.feedback_for_token(&end_tag("annotation-xml"));

        // Back to MathML.
        assert_eq!(sim.feedback_for_token(&start_tag("title")), Feedback::None);
    }

    #[test]
    fn snapshot_round_trip() {
        let mut sim = TreeBuilderSimulator::default();

        let _ = sim.feedback_for_token(&start_tag("svg"));

        let snapshot = sim.snapshot();
        let mut other = TreeBuilderSimulator::default();

        assert_ne!(other.snapshot(), snapshot);
        other.restore(&snapshot);
        assert_eq!(other.snapshot(), snapshot);
    }
}
