pub use crate::cursor::Span;

/// The three directive flavours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    /// `<% stmt %>`: runs, produces no output by itself.
    Eval,
    /// `<%= expr %>`: output, HTML-escaped.
    Escaped,
    /// `<%- expr %>`: output, verbatim.
    Raw,
}

impl DirectiveKind {
    /// Human-readable name used in diagnostics.
    pub fn describe(self) -> &'static str {
        match self {
            DirectiveKind::Eval => "eval directive",
            DirectiveKind::Escaped => "escaped directive",
            DirectiveKind::Raw => "raw directive",
        }
    }
}

/// Token classification for template source.
///
/// Data-carrying variants embed their value directly. Directive content
/// excludes the `<%`/`%>` delimiters; the token span covers the content only.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Text(String),
    Directive(DirectiveKind, String),
    Comment(String),
    Doctype(String),
    OpenTag {
        name: String,
        attributes: Vec<Attribute>,
        self_closing: bool,
    },
    CloseTag(String),
}

/// A token produced by the scanner.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Quote used around an attribute value in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quote {
    #[default]
    None,
    Single,
    Double,
}

impl Quote {
    pub fn from_char(c: char) -> Self {
        match c {
            '\'' => Quote::Single,
            '"' => Quote::Double,
            _ => Quote::None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Quote::None => "",
            Quote::Single => "'",
            Quote::Double => "\"",
        }
    }
}

/// An attribute on an open tag.
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    /// Fully static value (possibly empty for `<input checked>`).
    Simple(SimpleAttribute),
    /// Quoted value mixing text and escaped directives.
    Dynamic(DynamicAttribute),
}

impl Attribute {
    pub fn name(&self) -> &str {
        match self {
            Attribute::Simple(attr) => &attr.name,
            Attribute::Dynamic(attr) => &attr.name,
        }
    }

    pub fn is_boolean(&self) -> bool {
        match self {
            Attribute::Simple(attr) => attr.is_boolean,
            Attribute::Dynamic(attr) => attr.is_boolean,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimpleAttribute {
    pub name: String,
    pub is_boolean: bool,
    pub value: String,
    pub quote: Quote,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DynamicAttribute {
    pub name: String,
    pub is_boolean: bool,
    pub quote: Quote,
    pub parts: Vec<ValuePart>,
}

/// A piece of a dynamic attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum ValuePart {
    Text(String),
    Escaped { content: String, span: Span },
}

/// HTML void elements (no children, no close tag).
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "command", "embed", "hr", "img", "input", "keygen", "link",
    "meta", "param", "source", "track", "wbr",
];

/// Attributes whose presence alone carries meaning.
pub const BOOLEAN_ATTRIBUTES: &[&str] = &[
    "allowfullscreen", "async", "autofocus", "autoplay", "checked", "compact", "controls",
    "declare", "default", "defaultchecked", "defaultmuted", "defaultselected", "defer",
    "disabled", "draggable", "enabled", "formnovalidate", "hidden", "indeterminate", "inert",
    "ismap", "itemscope", "loop", "multiple", "muted", "nohref", "noresize", "noshade",
    "novalidate", "nowrap", "open", "pauseonexit", "readonly", "required", "reversed",
    "scoped", "seamless", "selected", "sortable", "spellcheck", "translate", "truespeed",
    "typemustmatch", "visible",
];

/// Elements whose content is scanned as raw text (only directives and the
/// matching close tag are recognized inside).
pub const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Elements whose inner whitespace is significant.
pub const WHITESPACE_PRESERVING_ELEMENTS: &[&str] = &["script", "style", "pre", "textarea"];

/// Check if a (lowercase) tag name is a void element.
pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

pub fn is_boolean_attribute(name: &str) -> bool {
    BOOLEAN_ATTRIBUTES.contains(&name)
}

pub fn is_raw_text_element(tag: &str) -> bool {
    RAW_TEXT_ELEMENTS.contains(&tag)
}

pub fn is_whitespace_preserving(tag: &str) -> bool {
    WHITESPACE_PRESERVING_ELEMENTS.contains(&tag)
}
