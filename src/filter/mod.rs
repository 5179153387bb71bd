//! Reflected-content filtering.
//!
//! Detects request data echoed back into the document as executable markup
//! and neutralizes it in the token stream before the tree builder sees it.
//! The filter is deliberately approximate: its containment tests compare
//! canonicalized source snippets against the canonicalized request URL and
//! body, so it errs toward checking too much and relies on per-token rules
//! to keep rewrites precise. Tokens are mutated in place; the source text
//! never changes.

mod canonicalize;
mod policy;
mod report;
mod suffix_index;

pub use self::policy::{FilterDisposition, ParsedDirective};
pub use self::report::{BlockedScriptReport, NoopReportSink, ReportSink};
pub use self::suffix_index::{SuffixIndex, SUFFIX_DEPTH};

use self::canonicalize::{canonicalize, canonicalize_body, fully_decode};
use crate::base::Range;
use crate::html::TagName;
use crate::parser::SourceTracker;
use crate::token::{Token, TokenKind};
use log::debug;
use memchr::memmem;

/// Bodies whose canonical form is longer than this get a [`SuffixIndex`];
/// shorter ones are scanned linearly.
const BODY_INDEX_THRESHOLD: usize = 512;

/// Target length for canonical snippets built from unbounded source (script
/// text, tag prefixes). Long payloads still match on their prefix.
const MAX_CANONICAL_FRAGMENT: usize = 100;

/// Replacement for neutralized URL attributes. Loads nothing and has an
/// origin that can never match the document's.
const URL_WITH_UNIQUE_ORIGIN: &str = "data:,";

/// Replacement for neutralized script-scheme attribute values.
const NEUTRALIZED_SCRIPT_URL: &str = "javascript:void(0)";

/// The request that produced the document being parsed.
#[derive(Clone, Debug, Default)]
pub struct DocumentRequest {
    pub url: String,
    /// Submitted form body, if any.
    pub body: Option<String>,
    /// Value of the response protection header, if the server sent one.
    pub protection_header: Option<String>,
    /// In-document policy directive value, if one was seen.
    pub policy_directive: Option<String>,
}

enum BodySearch {
    Empty,
    Linear(String),
    Indexed(SuffixIndex),
}

impl BodySearch {
    fn contains(&self, needle: &str) -> bool {
        match self {
            BodySearch::Empty => false,
            BodySearch::Linear(text) => memmem::find(text.as_bytes(), needle.as_bytes()).is_some(),
            BodySearch::Indexed(index) => index.contains(needle),
        }
    }

    fn is_empty(&self) -> bool {
        matches!(self, BodySearch::Empty)
    }
}

/// Which truncation to apply to an attribute snippet before containment
/// testing. Truncation discards trailing source that plausibly came from
/// the page rather than the injected vector.
#[derive(Copy, Clone)]
enum Truncation {
    None,
    /// URL-valued attributes: stop at `?`, `#`, the third path separator,
    /// or, once a comma was seen (data URLs), at any separator or `<`.
    SrcLike,
    /// Script-valued attributes: stop at the first unescaped quote,
    /// backtick, ampersand or angle bracket after the value delimiter.
    ScriptLike,
}

/// Text handling inside the script element currently open, if any.
#[derive(Copy, Clone, PartialEq, Eq)]
enum ScriptTextState {
    /// No verdict yet; check the next character token.
    Filtering,
    /// A check came back clean; the rest of this element is trusted.
    Permitting,
    /// Matched request data; keep suppressing while matches continue.
    Suppressing,
}

pub struct ReflectedContentFilter {
    enabled: bool,
    disposition: FilterDisposition,
    document_url: String,
    decoded_url: String,
    body: BodySearch,
    header_was_valid: bool,
    directive_was_valid: bool,
    report_url: Option<String>,
    in_script: bool,
    suspect_script: bool,
    script_text_state: ScriptTextState,
    reported: bool,
}

impl ReflectedContentFilter {
    #[must_use]
    pub fn new(enabled: bool, request: &DocumentRequest) -> Self {
        let header = request
            .protection_header
            .as_deref()
            .map(policy::parse_directive);
        let directive = request
            .policy_directive
            .as_deref()
            .map(policy::parse_directive);

        let disposition = policy::effective_disposition(header.as_ref(), directive.as_ref());

        let report_url = header
            .as_ref()
            .and_then(|h| h.report_url.clone())
            .or_else(|| directive.as_ref().and_then(|d| d.report_url.clone()));

        let body = match request.body.as_deref() {
            Some(body) if !body.is_empty() => {
                let canonical = canonicalize_body(body);

                if canonical.is_empty() {
                    BodySearch::Empty
                } else if canonical.len() > BODY_INDEX_THRESHOLD {
                    BodySearch::Indexed(SuffixIndex::new(&canonical))
                } else {
                    BodySearch::Linear(canonical)
                }
            }
            _ => BodySearch::Empty,
        };

        ReflectedContentFilter {
            enabled,
            disposition,
            document_url: request.url.clone(),
            decoded_url: canonicalize(&request.url),
            body,
            header_was_valid: header.as_ref().is_some_and(|h| h.valid),
            directive_was_valid: directive.as_ref().is_some_and(|d| d.valid),
            report_url,
            in_script: false,
            suspect_script: false,
            script_text_state: ScriptTextState::Filtering,
            reported: false,
        }
    }

    /// The filter degrades to a no-op only when explicitly disabled or when
    /// there is no request data to reflect.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.enabled
            && self.disposition != FilterDisposition::Allow
            && !(self.decoded_url.is_empty() && self.body.is_empty())
    }

    /// Inspects (and possibly rewrites) one token.
    ///
    /// Returns a report the first time a script is neutralized; at most one
    /// report is produced per document.
    pub fn filter_token(
        &mut self,
        token: &mut Token,
        source: &SourceTracker<'_>,
    ) -> Option<BlockedScriptReport> {
        if !self.is_active() {
            return None;
        }

        let did_block = match token.kind {
            TokenKind::StartTag => {
                let blocked = self.filter_start_tag(token, source);

                if token.is_start_tag(TagName::Script) {
                    self.in_script = true;
                    self.script_text_state = ScriptTextState::Filtering;
                }

                blocked
            }
            TokenKind::EndTag => {
                if token.is_end_tag(TagName::Script) {
                    self.in_script = false;
                    self.suspect_script = false;
                    self.script_text_state = ScriptTextState::Filtering;
                }

                false
            }
            TokenKind::Character if self.in_script && self.suspect_script => {
                self.filter_script_text(token, source)
            }
            _ => false,
        };

        if did_block {
            self.first_report()
        } else {
            None
        }
    }

    fn first_report(&mut self) -> Option<BlockedScriptReport> {
        if self.reported {
            return None;
        }

        self.reported = true;

        Some(BlockedScriptReport {
            document_url: self.document_url.clone(),
            blocked_entire_page: self.disposition == FilterDisposition::Block,
            header_was_valid: self.header_was_valid,
            directive_was_valid: self.directive_was_valid,
            report_url: self.report_url.clone(),
        })
    }

    fn filter_start_tag(&mut self, token: &mut Token, source: &SourceTracker<'_>) -> bool {
        let mut did_block = self.filter_generic_attributes(token, source);

        did_block |= match token.tag_name() {
            TagName::Script => self.filter_script_tag(token, source),
            TagName::Object => {
                self.erase_if_injected(token, source, "data", URL_WITH_UNIQUE_ORIGIN, Truncation::SrcLike)
                    | self.erase_if_injected(token, source, "type", "", Truncation::None)
                    | self.erase_if_injected(token, source, "classid", "", Truncation::None)
            }
            TagName::Param => self.filter_param_tag(token, source),
            TagName::Embed => {
                self.erase_if_injected(token, source, "src", URL_WITH_UNIQUE_ORIGIN, Truncation::SrcLike)
                    | self.erase_if_injected(token, source, "type", "", Truncation::None)
            }
            TagName::Applet => {
                self.erase_if_injected(token, source, "code", "", Truncation::None)
                    | self.erase_if_injected(token, source, "object", "", Truncation::None)
            }
            TagName::Iframe | TagName::Frame => {
                self.erase_if_injected(token, source, "src", URL_WITH_UNIQUE_ORIGIN, Truncation::SrcLike)
                    | self.erase_if_injected(token, source, "srcdoc", "", Truncation::ScriptLike)
            }
            TagName::Meta => self.erase_if_injected(token, source, "http-equiv", "", Truncation::None),
            TagName::Base => {
                self.erase_if_injected(token, source, "href", "", Truncation::SrcLike)
            }
            TagName::Form => {
                self.erase_if_injected(token, source, "action", URL_WITH_UNIQUE_ORIGIN, Truncation::SrcLike)
            }
            TagName::Input | TagName::Button => self.erase_if_injected(
                token,
                source,
                "formaction",
                URL_WITH_UNIQUE_ORIGIN,
                Truncation::SrcLike,
            ),
            TagName::Link if rel_includes_import(token) => self.erase_if_injected(
                token,
                source,
                "href",
                URL_WITH_UNIQUE_ORIGIN,
                Truncation::SrcLike,
            ),
            _ => false,
        };

        did_block
    }

    /// Event handlers and script-scheme URLs are dangerous on any tag.
    fn filter_generic_attributes(&mut self, token: &mut Token, source: &SourceTracker<'_>) -> bool {
        let mut did_block = false;

        for i in 0..token.attributes.len() {
            let (is_event_handler, has_script_scheme) = {
                let attr = &token.attributes[i];

                if attr.value.is_empty() {
                    continue;
                }

                (
                    is_event_handler_name(&attr.name),
                    contains_script_scheme(&attr.value),
                )
            };

            if !is_event_handler && !has_script_scheme {
                continue;
            }

            let snippet = self.attribute_snippet(token, i, source, Truncation::ScriptLike);

            if !snippet.is_empty() && self.is_contained(&snippet) {
                let attr = &mut token.attributes[i];

                debug!("erasing reflected attribute `{}`", attr.name);
                attr.value.clear();

                if has_script_scheme {
                    attr.value.push_str(NEUTRALIZED_SCRIPT_URL);
                }

                did_block = true;
            }
        }

        did_block
    }

    fn filter_script_tag(&mut self, token: &mut Token, source: &SourceTracker<'_>) -> bool {
        // The tag prefix (`<` + name) is enough to decide whether this
        // script element warrants closer inspection.
        let raw = source.token_raw(token);
        let prefix_len = (token.name.len() + 1).min(raw.len());
        let snippet = canonicalize(&String::from_utf8_lossy(&raw[..prefix_len]));

        if snippet.is_empty() || !self.is_contained(&snippet) {
            return false;
        }

        self.suspect_script = true;

        self.erase_if_injected(token, source, "src", URL_WITH_UNIQUE_ORIGIN, Truncation::SrcLike)
            | self.erase_if_injected(
                token,
                source,
                "href",
                URL_WITH_UNIQUE_ORIGIN,
                Truncation::SrcLike,
            )
            | self.erase_if_injected(
                token,
                source,
                "xlink:href",
                URL_WITH_UNIQUE_ORIGIN,
                Truncation::SrcLike,
            )
    }

    /// `<param>` only matters when it names the resource its parent object
    /// should load.
    fn filter_param_tag(&mut self, token: &mut Token, source: &SourceTracker<'_>) -> bool {
        let names_resource = token.attribute("name").is_some_and(|a| {
            ["movie", "src", "url", "href", "data"]
                .iter()
                .any(|n| a.value.eq_ignore_ascii_case(n))
        });

        if !names_resource {
            return false;
        }

        self.erase_if_injected(
            token,
            source,
            "value",
            URL_WITH_UNIQUE_ORIGIN,
            Truncation::SrcLike,
        )
    }

    /// Character data inside a suspect script element.
    fn filter_script_text(&mut self, token: &mut Token, source: &SourceTracker<'_>) -> bool {
        if self.script_text_state == ScriptTextState::Permitting {
            return false;
        }

        let snippet = canonicalize(&script_text_snippet(source.token_raw(token)));

        if !snippet.is_empty() && self.is_contained(&snippet) {
            debug!("suppressing reflected script text");
            self.script_text_state = ScriptTextState::Suppressing;
            token.text.clear();
            // A lone space keeps the element non-empty without being
            // executable.
            token.text.push(' ');

            true
        } else {
            // One clean token ends suppression; later text in this element
            // came from the page.
            self.script_text_state = ScriptTextState::Permitting;

            false
        }
    }

    fn erase_if_injected(
        &mut self,
        token: &mut Token,
        source: &SourceTracker<'_>,
        name: &str,
        replacement: &str,
        truncation: Truncation,
    ) -> bool {
        let Some(idx) = token
            .attributes
            .iter()
            .position(|a| a.name.eq_ignore_ascii_case(name))
        else {
            return false;
        };

        if token.attributes[idx].value.is_empty() && replacement.is_empty() {
            return false;
        }

        let snippet = self.attribute_snippet(token, idx, source, truncation);

        if snippet.is_empty() || !self.is_contained(&snippet) {
            return false;
        }

        let attr = &mut token.attributes[idx];

        debug!("erasing reflected `{}` attribute", attr.name);
        attr.value.clear();
        attr.value.push_str(replacement);

        true
    }

    /// Canonical snippet for an attribute, taken from the raw source
    /// starting at the attribute name. Including the name (and the value
    /// delimiter that follows it) sharply reduces accidental matches on
    /// short values.
    fn attribute_snippet(
        &self,
        token: &Token,
        idx: usize,
        source: &SourceTracker<'_>,
        truncation: Truncation,
    ) -> String {
        let attr = &token.attributes[idx];
        let start = attr.name_range.start;
        let end = attr.value_range.end.max(attr.name_range.end);
        let raw = source.raw(Range::new(start, end));
        let decoded = fully_decode(&String::from_utf8_lossy(raw));

        let truncated = match truncation {
            Truncation::None => decoded.as_str(),
            Truncation::SrcLike => truncate_src_like(&decoded),
            Truncation::ScriptLike => truncate_script_like(&decoded),
        };

        canonicalize(truncated)
    }

    fn is_contained(&self, canonical_snippet: &str) -> bool {
        debug_assert!(!canonical_snippet.is_empty());

        memmem::find(self.decoded_url.as_bytes(), canonical_snippet.as_bytes()).is_some()
            || self.body.contains(canonical_snippet)
    }
}

fn is_event_handler_name(name: &str) -> bool {
    let bytes = name.as_bytes();

    bytes.len() > 2 && bytes[..2].eq_ignore_ascii_case(b"on")
}

fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len() && s.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

/// Script schemes can hide in semicolon-delimited sub-values of
/// list-valued attributes, so each sub-value is checked.
fn contains_script_scheme(value: &str) -> bool {
    value.split(';').any(|part| {
        let part = part.trim_start_matches(|c: char| c.is_ascii_whitespace() || c.is_ascii_control());

        starts_with_ignore_case(part, "javascript:") || starts_with_ignore_case(part, "vbscript:")
    })
}

fn rel_includes_import(token: &Token) -> bool {
    token.attribute("rel").is_some_and(|a| {
        a.value
            .split_ascii_whitespace()
            .any(|t| t.eq_ignore_ascii_case("import"))
    })
}

fn truncate_src_like(s: &str) -> &str {
    let bytes = s.as_bytes();
    let mut separators = 0;
    let mut comma_seen = false;

    for (i, &b) in bytes.iter().enumerate() {
        let cut = match b {
            b'?' | b'#' => true,
            b'/' | b'\\' => {
                separators += 1;
                comma_seen || separators > 2
            }
            b'<' => comma_seen,
            b',' => {
                comma_seen = true;
                false
            }
            _ => false,
        };

        if cut {
            // The cut byte is ASCII, so this is a char boundary.
            return &s[..i];
        }
    }

    s
}

fn truncate_script_like(s: &str) -> &str {
    let bytes = s.as_bytes();

    let Some(eq) = memchr::memchr(b'=', bytes) else {
        return s;
    };

    let mut i = eq + 1;

    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }

    // A quote right after `=` is the value delimiter, not the payload.
    if i < bytes.len() && (bytes[i] == b'"' || bytes[i] == b'\'') {
        i += 1;
    }

    let mut escaped = false;

    while i < bytes.len() {
        let b = bytes[i];

        if !escaped && matches!(b, b'"' | b'\'' | b'`' | b'&' | b'<' | b'>') {
            return &s[..i];
        }

        escaped = b == b'\\' && !escaped;
        i += 1;
    }

    s
}

/// Extracts the leading fragment of script text worth testing.
///
/// Skips whitespace and leading comments (an injected payload hides its
/// surroundings behind comments, but never starts inside its own one) and
/// stops where trailing page-authored source plausibly begins: a comment
/// opener, a backtick, a comma, or a nested script tag opener after some
/// content.
fn script_text_snippet(raw: &[u8]) -> String {
    let mut i = 0;

    loop {
        while i < raw.len() && raw[i].is_ascii_whitespace() {
            i += 1;
        }

        if raw[i..].starts_with(b"//") || raw[i..].starts_with(b"<!--") {
            while i < raw.len() && raw[i] != b'\n' {
                i += 1;
            }
        } else if raw[i..].starts_with(b"/*") {
            match memmem::find(&raw[i + 2..], b"*/") {
                Some(close) => i += close + 4,
                None => return String::new(),
            }
        } else {
            break;
        }
    }

    let start = i;
    let mut seen_content = false;

    while i < raw.len() && i - start < MAX_CANONICAL_FRAGMENT {
        let b = raw[i];

        if b == b'`' || b == b',' {
            break;
        }

        if raw[i..].starts_with(b"//")
            || raw[i..].starts_with(b"/*")
            || raw[i..].starts_with(b"<!--")
        {
            break;
        }

        if seen_content && starts_script_tag(&raw[i..]) {
            break;
        }

        if !b.is_ascii_whitespace() {
            seen_content = true;
        }

        i += 1;
    }

    String::from_utf8_lossy(&raw[start..i]).into_owned()
}

fn starts_script_tag(bytes: &[u8]) -> bool {
    bytes.len() >= 7 && bytes[0] == b'<' && bytes[1..7].eq_ignore_ascii_case(b"script")
}
