use super::TextType;

/// Tag names with special lexical or filtering behavior.
///
/// Everything else maps to `Other`: the pipeline never needs to
/// distinguish tags it doesn't treat specially, so a readable C-like enum
/// beats a name hash here.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum TagName {
    Script,
    Style,
    Title,
    Textarea,
    Plaintext,
    Iframe,
    Xmp,
    Noembed,
    Noframes,
    Noscript,
    Svg,
    Math,
    Font,
    AnnotationXml,
    Object,
    Embed,
    Applet,
    Param,
    Frame,
    Meta,
    Base,
    Form,
    Input,
    Button,
    Link,
    Other,
}

impl TagName {
    #[must_use]
    pub fn from_bytes(name: &[u8]) -> Self {
        // Tag names arrive already lowercased by the lexer, but be
        // forgiving about case for direct callers.
        let mut buf = [0u8; 14];

        if name.is_empty() || name.len() > buf.len() {
            return TagName::Other;
        }

        for (i, b) in name.iter().enumerate() {
            buf[i] = b.to_ascii_lowercase();
        }

        match &buf[..name.len()] {
            b"script" => TagName::Script,
            b"style" => TagName::Style,
            b"title" => TagName::Title,
            b"textarea" => TagName::Textarea,
            b"plaintext" => TagName::Plaintext,
            b"iframe" => TagName::Iframe,
            b"xmp" => TagName::Xmp,
            b"noembed" => TagName::Noembed,
            b"noframes" => TagName::Noframes,
            b"noscript" => TagName::Noscript,
            b"svg" => TagName::Svg,
            b"math" => TagName::Math,
            b"font" => TagName::Font,
            b"annotation-xml" => TagName::AnnotationXml,
            b"object" => TagName::Object,
            b"embed" => TagName::Embed,
            b"applet" => TagName::Applet,
            b"param" => TagName::Param,
            b"frame" => TagName::Frame,
            b"meta" => TagName::Meta,
            b"base" => TagName::Base,
            b"form" => TagName::Form,
            b"input" => TagName::Input,
            b"button" => TagName::Button,
            b"link" => TagName::Link,
            _ => TagName::Other,
        }
    }

    /// Text type the lexer should switch to after this start tag is seen
    /// in the HTML namespace.
    #[inline]
    #[must_use]
    pub fn text_type_adjustment(self) -> Option<TextType> {
        match self {
            TagName::Textarea | TagName::Title => Some(TextType::RCData),
            TagName::Plaintext => Some(TextType::PlainText),
            TagName::Script => Some(TextType::ScriptData),
            TagName::Style
            | TagName::Iframe
            | TagName::Xmp
            | TagName::Noembed
            | TagName::Noframes
            | TagName::Noscript => Some(TextType::RawText),
            _ => None,
        }
    }
}

impl From<&str> for TagName {
    #[inline]
    fn from(name: &str) -> Self {
        TagName::from_bytes(name.as_bytes())
    }
}

/// Start tags that pop foreign (SVG/MathML) content back into HTML.
pub(crate) fn causes_foreign_content_exit(name: &[u8]) -> bool {
    const EXIT_TAGS: &[&[u8]] = &[
        b"b",
        b"big",
        b"blockquote",
        b"body",
        b"br",
        b"center",
        b"code",
        b"dd",
        b"div",
        b"dl",
        b"dt",
        b"em",
        b"embed",
        b"h1",
        b"h2",
        b"h3",
        b"h4",
        b"h5",
        b"h6",
        b"head",
        b"hr",
        b"i",
        b"img",
        b"li",
        b"listing",
        b"menu",
        b"meta",
        b"nobr",
        b"ol",
        b"p",
        b"pre",
        b"ruby",
        b"s",
        b"small",
        b"span",
        b"strong",
        b"strike",
        b"sub",
        b"sup",
        b"table",
        b"tt",
        b"u",
        b"ul",
        b"var",
    ];

    EXIT_TAGS.iter().any(|t| name.eq_ignore_ascii_case(t))
}

pub(crate) fn is_text_integration_point_in_math_ml(name: &[u8]) -> bool {
    const POINTS: &[&[u8]] = &[b"mi", b"mo", b"mn", b"ms", b"mtext"];

    POINTS.iter().any(|t| name.eq_ignore_ascii_case(t))
}

pub(crate) fn is_html_integration_point_in_svg(name: &[u8]) -> bool {
    const POINTS: &[&[u8]] = &[b"desc", b"title", b"foreignObject"];

    POINTS.iter().any(|t| name.eq_ignore_ascii_case(t))
}
