use crate::cursor::{SourceCursor, Span};
use crate::token::{
    is_boolean_attribute, is_raw_text_element, Attribute, DirectiveKind, DynamicAttribute, Quote,
    SimpleAttribute, Token, TokenKind, ValuePart,
};
use crate::SyntaxError;

/// Scanner mode determines which constructs are recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScannerMode {
    /// Default mode: markup, comments, doctype and directives.
    Document,
    /// Inside `<script>`/`<style>`: only directives and the matching close tag.
    RawText(String),
}

/// What a `<` starts in document mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Construct {
    Doctype,
    Comment,
    Directive(DirectiveKind),
    CloseTag,
    OpenTag,
}

/// Template source scanner.
///
/// Produces a flat token stream: text runs, directives, comments, doctypes,
/// open tags (with their attributes already split) and close tags.
/// Nesting is left to the parser.
///
/// - Document mode searches for the next special construct and emits the
///   literal run before it as `Text`.
/// - Open tags are read with anchored steps at the current position, so an
///   attribute can never swallow the next one.
/// - Position tracking goes through [`SourceCursor`] on every token.
pub struct Scanner<'a> {
    cursor: SourceCursor<'a>,
    tokens: Vec<Token>,
    mode: ScannerMode,
}

impl<'a> Scanner<'a> {
    /// Create a new scanner for the given source.
    pub fn new(source: &'a str) -> Self {
        Self {
            cursor: SourceCursor::new(source),
            tokens: Vec::new(),
            mode: ScannerMode::Document,
        }
    }

    /// Tokenize the entire source into a vector of tokens.
    pub fn tokenize(source: &str) -> Result<Vec<Token>, SyntaxError> {
        let mut scanner = Scanner::new(source);
        scanner.scan_tokens()?;
        Ok(scanner.tokens)
    }

    /// Current mode (exposed for tests and tooling).
    pub fn mode(&self) -> &ScannerMode {
        &self.mode
    }

    fn scan_tokens(&mut self) -> Result<(), SyntaxError> {
        while !self.cursor.is_at_end() {
            if let ScannerMode::RawText(tag) = &self.mode {
                let tag = tag.clone();
                self.scan_raw_text(&tag)?;
            } else {
                self.scan_document()?;
            }
        }
        Ok(())
    }

    // --- Document mode ---

    fn scan_document(&mut self) -> Result<(), SyntaxError> {
        let Some((at, construct)) = self.next_construct() else {
            self.emit_text_until(self.cursor.source().len());
            return Ok(());
        };
        self.emit_text_until(at);

        match construct {
            Construct::Doctype => {
                self.cursor.advance_by("<!DOCTYPE".len());
                self.cursor.skip_whitespace();
                let (content, span) = self.read_delimited(">", "doctype")?;
                self.tokens.push(Token::new(TokenKind::Doctype(content), span));
            }
            Construct::Comment => {
                self.cursor.advance_by("<!--".len());
                let (content, span) = self.read_delimited("-->", "comment")?;
                self.tokens.push(Token::new(TokenKind::Comment(content), span));
            }
            Construct::Directive(_) => self.read_directive()?,
            Construct::CloseTag => self.read_close_tag()?,
            Construct::OpenTag => self.read_open_tag()?,
        }
        Ok(())
    }

    /// Find the next `<` that starts something other than literal text.
    fn next_construct(&self) -> Option<(usize, Construct)> {
        let rest = self.cursor.rest();
        rest.match_indices('<')
            .find_map(|(i, _)| classify(&rest[i..]).map(|c| (self.cursor.offset() + i, c)))
    }

    // --- Raw-text mode ---

    fn scan_raw_text(&mut self, tag: &str) -> Result<(), SyntaxError> {
        let rest = self.cursor.rest();
        let stop = rest.match_indices('<').find_map(|(i, _)| {
            let here = &rest[i..];
            if is_directive_start(here) {
                Some((i, false))
            } else if is_raw_text_end(here, tag) {
                Some((i, true))
            } else {
                None
            }
        });

        let Some((i, is_close)) = stop else {
            // Unclosed element: the parser reports it
            self.emit_text_until(self.cursor.source().len());
            return Ok(());
        };
        self.emit_text_until(self.cursor.offset() + i);

        if is_close {
            self.cursor.advance_by(2);
            self.read_close_tag_name()?;
            self.mode = ScannerMode::Document;
            Ok(())
        } else {
            self.read_directive()
        }
    }

    // --- Scanners ---

    /// Read `<%...%>` with the cursor on `<`.
    fn read_directive(&mut self) -> Result<(), SyntaxError> {
        let kind = directive_kind(self.cursor.rest());
        self.cursor.advance_by(match kind {
            DirectiveKind::Eval => 2,
            DirectiveKind::Escaped | DirectiveKind::Raw => 3,
        });
        let (content, span) = self.read_delimited("%>", kind.describe())?;
        self.tokens
            .push(Token::new(TokenKind::Directive(kind, content), span));
        Ok(())
    }

    /// Read up to `terminator`, returning the content and its span, and
    /// consume the terminator.
    fn read_delimited(
        &mut self,
        terminator: &str,
        what: &str,
    ) -> Result<(String, Span), SyntaxError> {
        let start = self.cursor.point();
        let Some(end_at) = self.cursor.find(terminator) else {
            return Err(self.error(format!("Unterminated {what}")));
        };
        self.cursor.advance_to(end_at);
        let end = self.cursor.point();
        let content = self.cursor.slice(start.offset, end.offset).to_string();
        self.cursor.advance_by(terminator.len());
        Ok((content, Span::new(start, end)))
    }

    fn read_close_tag(&mut self) -> Result<(), SyntaxError> {
        self.cursor.advance_by("</".len());
        self.read_close_tag_name()
    }

    /// Read `name\s*>` after `</`.
    fn read_close_tag_name(&mut self) -> Result<(), SyntaxError> {
        let start = self.cursor.point();
        let Some(name) = self.read_tag_name() else {
            return Err(self.error("Invalid close tag"));
        };
        self.cursor.skip_whitespace();
        if self.cursor.peek() != Some('>') {
            return Err(self.error("Invalid close tag"));
        }
        self.cursor.advance();

        let span = Span::new(start, self.cursor.point());
        self.tokens.push(Token::new(TokenKind::CloseTag(name), span));
        Ok(())
    }

    fn read_open_tag(&mut self) -> Result<(), SyntaxError> {
        self.cursor.advance_by("<".len());
        let start = self.cursor.point();
        let Some(name) = self.read_tag_name() else {
            return Err(self.error("Invalid open tag"));
        };

        let mut attributes: Vec<Attribute> = Vec::new();
        let self_closing = loop {
            self.cursor.skip_whitespace();

            if is_directive_start(self.cursor.rest()) {
                let kind = directive_kind(self.cursor.rest());
                return Err(self.error(format!(
                    "Unexpected {} inside an open tag",
                    kind.describe()
                )));
            }
            if self.cursor.starts_with(">") {
                self.cursor.advance();
                break false;
            }
            if self.cursor.starts_with("/>") {
                self.cursor.advance_by(2);
                break true;
            }

            let attr_start = self.cursor.point();
            let attr_name = self.cursor.advance_while(is_attribute_name_char);
            if attr_name.is_empty() {
                return Err(self.error("Invalid open tag"));
            }
            let attr_name = attr_name.to_ascii_lowercase();
            if attributes.iter().any(|a| a.name() == attr_name) {
                self.cursor.reset(attr_start);
                return Err(self.error(format!("Repeated attribute: {attr_name}")));
            }
            let attribute = self.read_attribute(attr_name)?;
            attributes.push(attribute);
        };

        let span = Span::new(start, self.cursor.point());
        if is_raw_text_element(&name) && !self_closing {
            self.mode = ScannerMode::RawText(name.clone());
        }
        self.tokens.push(Token::new(
            TokenKind::OpenTag {
                name,
                attributes,
                self_closing,
            },
            span,
        ));
        Ok(())
    }

    /// `[a-zA-Z][^\s/>]*`, lowercased.
    fn read_tag_name(&mut self) -> Option<String> {
        if !self.cursor.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
            return None;
        }
        let name = self
            .cursor
            .advance_while(|c| !c.is_whitespace() && c != '/' && c != '>');
        Some(name.to_ascii_lowercase())
    }

    /// Read the optional `=value` part after an attribute name.
    fn read_attribute(&mut self, name: String) -> Result<Attribute, SyntaxError> {
        let is_boolean = is_boolean_attribute(&name);
        let saved = self.cursor.point();

        self.cursor.skip_whitespace();
        if self.cursor.peek() == Some('=') {
            self.cursor.advance();
            self.cursor.skip_whitespace();

            match self.cursor.peek() {
                Some(q @ ('"' | '\'')) => {
                    self.cursor.advance();
                    let quote = Quote::from_char(q);
                    let mut parts = self.read_value_parts(q)?;

                    let is_dynamic = parts.len() > 1
                        || matches!(parts.first(), Some(ValuePart::Escaped { .. }));
                    if is_dynamic {
                        return Ok(Attribute::Dynamic(DynamicAttribute {
                            name,
                            is_boolean,
                            quote,
                            parts,
                        }));
                    }
                    let value = match parts.pop() {
                        Some(ValuePart::Text(text)) => text,
                        _ => String::new(),
                    };
                    return Ok(Attribute::Simple(SimpleAttribute {
                        name,
                        is_boolean,
                        value,
                        quote,
                    }));
                }
                _ => {
                    let value = self.cursor.advance_while(is_unquoted_value_char);
                    if !value.is_empty() {
                        return Ok(Attribute::Simple(SimpleAttribute {
                            name,
                            is_boolean,
                            value: value.to_string(),
                            quote: Quote::None,
                        }));
                    }
                }
            }
        }

        // No value: `<input checked>`
        self.cursor.reset(saved);
        Ok(Attribute::Simple(SimpleAttribute {
            name,
            is_boolean,
            value: String::new(),
            quote: Quote::None,
        }))
    }

    /// Split a quoted value into text and escaped-directive parts, consuming
    /// the closing quote.
    fn read_value_parts(&mut self, quote: char) -> Result<Vec<ValuePart>, SyntaxError> {
        let mut parts = Vec::new();

        loop {
            let rest = self.cursor.rest();
            let stop = rest
                .char_indices()
                .find(|&(i, c)| c == quote || is_directive_start(&rest[i..]));
            let Some((i, c)) = stop else {
                return Err(self.error("Unterminated attribute value"));
            };

            if i > 0 {
                parts.push(ValuePart::Text(rest[..i].to_string()));
            }
            self.cursor.advance_by(i);

            if c == quote {
                self.cursor.advance();
                return Ok(parts);
            }

            match directive_kind(self.cursor.rest()) {
                DirectiveKind::Escaped => {
                    self.cursor.advance_by(3);
                    let (content, span) = self.read_delimited("%>", "escaped directive")?;
                    parts.push(ValuePart::Escaped { content, span });
                }
                kind => {
                    return Err(self.error(format!(
                        "Unexpected {} inside an attribute value",
                        kind.describe()
                    )));
                }
            }
        }
    }

    // --- Helpers ---

    fn emit_text_until(&mut self, offset: usize) {
        if offset <= self.cursor.offset() {
            return;
        }
        let start = self.cursor.point();
        self.cursor.advance_to(offset);
        let content = self.cursor.slice(start.offset, offset).to_string();
        self.tokens.push(Token::new(
            TokenKind::Text(content),
            Span::new(start, self.cursor.point()),
        ));
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(message, self.cursor.point(), self.cursor.source())
    }
}

/// Classify the construct starting at `rest` (which begins with `<`).
fn classify(rest: &str) -> Option<Construct> {
    match rest.as_bytes().get(1) {
        Some(b'%') if rest.starts_with("<%%") => None,
        Some(b'%') => Some(Construct::Directive(directive_kind(rest))),
        Some(b'!') if rest.starts_with("<!--") => Some(Construct::Comment),
        Some(b'!') if is_doctype_start(rest) => Some(Construct::Doctype),
        Some(b'/') => Some(Construct::CloseTag),
        _ => Some(Construct::OpenTag),
    }
}

/// `<%`, but not the `<%%` literal.
fn is_directive_start(rest: &str) -> bool {
    rest.starts_with("<%") && !rest.starts_with("<%%")
}

/// Kind of the directive at `rest` (which begins with `<%`).
fn directive_kind(rest: &str) -> DirectiveKind {
    match rest.as_bytes().get(2) {
        Some(b'=') => DirectiveKind::Escaped,
        Some(b'-') => DirectiveKind::Raw,
        _ => DirectiveKind::Eval,
    }
}

fn is_doctype_start(rest: &str) -> bool {
    const OPENER: &str = "<!doctype";
    rest.len() > OPENER.len()
        && rest.as_bytes()[..OPENER.len()].eq_ignore_ascii_case(OPENER.as_bytes())
        && rest[OPENER.len()..].starts_with(char::is_whitespace)
}

/// `</tag\s*>`, case-insensitive on the tag name.
fn is_raw_text_end(here: &str, tag: &str) -> bool {
    let name_end = 2 + tag.len();
    here.starts_with("</")
        && here.len() >= name_end
        && here.as_bytes()[2..name_end].eq_ignore_ascii_case(tag.as_bytes())
        && here[name_end..].trim_start().starts_with('>')
}

fn is_attribute_name_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '/' | '>' | '"' | '\'' | '<' | '=')
}

fn is_unquoted_value_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '>' | '"' | '\'' | '<' | '=' | '`')
}
