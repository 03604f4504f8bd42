//! Element-tree parser for EHTML.
//!
//! Consumes the flat token stream from `ehtml-lexer` and nests open/close
//! tags into `Element` nodes, enforcing the structural rules:
//!
//! - void elements never have children or a close tag (`<br/>` is accepted)
//! - every other element is closed explicitly, by its own name
//! - stray close tags are fatal
//! - elements nest at most [`MAX_NESTING_DEPTH`] deep

use crate::ast::{Document, Element, Node, NodeKind};
use ehtml_lexer::token::{is_void_element, Attribute};
use ehtml_lexer::{Scanner, SourcePoint, Span, SyntaxError, Token, TokenKind};

/// Deepest element nesting accepted.
pub const MAX_NESTING_DEPTH: usize = 256;

/// EHTML document parser.
pub struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    /// Open elements enclosing the current token.
    depth: usize,
}

impl<'a> Parser<'a> {
    /// Create a new parser for tokens scanned from `source`.
    pub fn new(source: &'a str, tokens: Vec<Token>) -> Self {
        Self {
            source,
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    /// Parse source code into a document tree.
    pub fn parse(source: &str) -> Result<Document, SyntaxError> {
        let tokens = Scanner::tokenize(source)?;
        let mut parser = Parser::new(source, tokens);
        parser.parse_document()
    }

    fn parse_document(&mut self) -> Result<Document, SyntaxError> {
        let mut nodes = Vec::new();

        while let Some(token) = self.next_token() {
            if let TokenKind::CloseTag(name) = &token.kind {
                return Err(self.error(format!("Unexpected close tag </{name}>"), token.span.start));
            }
            nodes.push(self.parse_node(token)?);
        }

        Ok(Document { nodes })
    }

    /// Turn one (non close-tag) token into a node, consuming the children
    /// of open tags.
    fn parse_node(&mut self, token: Token) -> Result<Node, SyntaxError> {
        let span = token.span;
        let kind = match token.kind {
            TokenKind::Text(content) => NodeKind::Text(content),
            TokenKind::Directive(kind, content) => return Ok(Node::directive(kind, content, span)),
            TokenKind::Comment(content) => NodeKind::Comment(content),
            TokenKind::Doctype(content) => NodeKind::Doctype(content),
            TokenKind::OpenTag {
                name,
                attributes,
                self_closing,
            } => return self.parse_element(name, attributes, self_closing, span),
            TokenKind::CloseTag(name) => {
                return Err(self.error(format!("Unexpected close tag </{name}>"), span.start));
            }
        };
        Ok(Node::new(kind, span))
    }

    // =========================================================================
    // Elements
    // =========================================================================

    fn parse_element(
        &mut self,
        name: String,
        attributes: Vec<Attribute>,
        self_closing: bool,
        open_span: Span,
    ) -> Result<Node, SyntaxError> {
        let is_void = is_void_element(&name);

        if is_void {
            let element = Element {
                name,
                is_void,
                attributes,
                children: Vec::new(),
            };
            return Ok(Node::new(NodeKind::Element(element), open_span));
        }

        if self_closing {
            return Err(self.error(
                format!("Only void elements may be self-closed, <{name}> must be closed with </{name}>"),
                open_span.start,
            ));
        }

        if self.depth >= MAX_NESTING_DEPTH {
            return Err(self.error(
                format!("Elements nested deeper than {MAX_NESTING_DEPTH} levels"),
                open_span.start,
            ));
        }

        self.depth += 1;
        let (children, close_span) = self.parse_children(&name, open_span)?;
        self.depth -= 1;

        let element = Element {
            name,
            is_void,
            attributes,
            children,
        };
        let span = Span::new(open_span.start, close_span.end);
        Ok(Node::new(NodeKind::Element(element), span))
    }

    /// Children of `<name>` up to and including its close tag.
    fn parse_children(
        &mut self,
        name: &str,
        open_span: Span,
    ) -> Result<(Vec<Node>, Span), SyntaxError> {
        let mut children = Vec::new();
        loop {
            let Some(token) = self.next_token() else {
                return Err(self.error(format!("Unclosed tag <{name}>"), open_span.start));
            };

            if let TokenKind::CloseTag(close) = &token.kind {
                if close != name {
                    return Err(self.error(
                        format!("Invalid close tag: expected </{name}>, found </{close}>"),
                        token.span.start,
                    ));
                }
                return Ok((children, token.span));
            }

            children.push(self.parse_node(token)?);
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn next_token(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned()?;
        self.pos += 1;
        Some(token)
    }

    fn error(&self, message: String, point: SourcePoint) -> SyntaxError {
        SyntaxError::new(message, point, self.source)
    }
}
