//! EHTML Lexer
//!
//! Tokenizes markup templates that embed `<% %>`, `<%= %>` and `<%- %>`
//! directives. Open tags come out with their attributes already split into
//! static and dynamic values; nesting is left to the parser.
//!
//! # Example
//!
//! ```
//! use ehtml_lexer::{Scanner, TokenKind};
//!
//! let tokens = Scanner::tokenize("Hi <%= name %>").unwrap();
//! assert_eq!(tokens.len(), 2);
//! assert_eq!(tokens[0].kind, TokenKind::Text("Hi ".into()));
//! ```

pub mod cursor;
pub mod scanner;
pub mod snippet;
pub mod token;

pub use cursor::{SourceCursor, SourcePoint, Span};
pub use scanner::Scanner;
pub use token::{
    Attribute, DirectiveKind, DynamicAttribute, Quote, SimpleAttribute, Token, TokenKind,
    ValuePart,
};

/// Syntax error with position information and a source excerpt.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message} (line {line}, column {column})\n{snippet}", line = .point.line, column = .point.column)]
pub struct SyntaxError {
    pub message: String,
    pub point: SourcePoint,
    pub snippet: String,
}

impl SyntaxError {
    /// Build an error at `point`, rendering the excerpt from `source`.
    pub fn new(message: impl Into<String>, point: SourcePoint, source: &str) -> Self {
        Self {
            message: message.into(),
            point,
            snippet: snippet::syntax_snippet(source, point.line),
        }
    }

    pub fn line(&self) -> usize {
        self.point.line
    }

    pub fn column(&self) -> usize {
        self.point.column
    }
}
