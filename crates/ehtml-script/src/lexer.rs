//! Lexer for template script.
//!
//! Tokenizes directive bodies and generated render code. Positions come from
//! the shared [`SourceCursor`], so script syntax errors report the same
//! line/column scheme as markup errors.
//!
//! # Examples
//!
//! ```
//! use ehtml_script::lexer::{ScriptLexer, TokenKind};
//!
//! let tokens = ScriptLexer::tokenize("count + 1").unwrap();
//! assert_eq!(tokens[0].kind, TokenKind::Identifier);
//! assert_eq!(tokens[1].kind, TokenKind::Plus);
//! assert_eq!(tokens[2].kind, TokenKind::Number);
//! ```

use ehtml_lexer::{SourceCursor, Span};

use crate::ScriptError;

/// A token produced by the script lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    pub value: TokenValue,
    /// A line break separates this token from the previous one.
    pub newline_before: bool,
}

/// Token classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Literals
    Number,
    String,
    Boolean,
    Null,
    Undefined,

    Identifier,

    // Keywords
    Let,
    Const,
    Var,
    If,
    Else,
    For,
    While,
    Do,
    Break,
    Continue,
    Return,
    Throw,
    Try,
    Catch,
    New,
    Typeof,

    // Arithmetic
    Plus,
    Minus,
    Star,
    Slash,
    Percent,

    // Comparison
    EqEq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    Gt,
    Lte,
    Gte,

    // Logical
    And,
    Or,
    Not,
    QuestionQuestion,

    // Assignment
    Eq,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,

    // Update
    PlusPlus,
    MinusMinus,

    // Delimiters
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,

    // Punctuation
    Dot,
    Comma,
    Colon,
    Semicolon,
    Question,

    Eof,
}

/// The value carried by a token. Keywords carry their text as an
/// `Identifier` so they can be used as property names.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenValue {
    None,
    Number(f64),
    String(String),
    Boolean(bool),
    Identifier(String),
}

/// Longest first, so `===` wins over `==` and `=`.
const PUNCTUATORS: &[(&str, TokenKind)] = &[
    ("===", TokenKind::StrictEq),
    ("!==", TokenKind::StrictNotEq),
    ("==", TokenKind::EqEq),
    ("!=", TokenKind::NotEq),
    ("<=", TokenKind::Lte),
    (">=", TokenKind::Gte),
    ("&&", TokenKind::And),
    ("||", TokenKind::Or),
    ("??", TokenKind::QuestionQuestion),
    ("++", TokenKind::PlusPlus),
    ("--", TokenKind::MinusMinus),
    ("+=", TokenKind::PlusEq),
    ("-=", TokenKind::MinusEq),
    ("*=", TokenKind::StarEq),
    ("/=", TokenKind::SlashEq),
    ("+", TokenKind::Plus),
    ("-", TokenKind::Minus),
    ("*", TokenKind::Star),
    ("/", TokenKind::Slash),
    ("%", TokenKind::Percent),
    ("<", TokenKind::Lt),
    (">", TokenKind::Gt),
    ("!", TokenKind::Not),
    ("=", TokenKind::Eq),
    ("(", TokenKind::LParen),
    (")", TokenKind::RParen),
    ("[", TokenKind::LBracket),
    ("]", TokenKind::RBracket),
    ("{", TokenKind::LBrace),
    ("}", TokenKind::RBrace),
    (".", TokenKind::Dot),
    (",", TokenKind::Comma),
    (":", TokenKind::Colon),
    (";", TokenKind::Semicolon),
    ("?", TokenKind::Question),
];

fn keyword(text: &str) -> Option<TokenKind> {
    Some(match text {
        "let" => TokenKind::Let,
        "const" => TokenKind::Const,
        "var" => TokenKind::Var,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "for" => TokenKind::For,
        "while" => TokenKind::While,
        "do" => TokenKind::Do,
        "break" => TokenKind::Break,
        "continue" => TokenKind::Continue,
        "return" => TokenKind::Return,
        "throw" => TokenKind::Throw,
        "try" => TokenKind::Try,
        "catch" => TokenKind::Catch,
        "new" => TokenKind::New,
        "typeof" => TokenKind::Typeof,
        _ => return None,
    })
}

/// Template-script lexer.
pub struct ScriptLexer<'a> {
    cursor: SourceCursor<'a>,
    newline_before: bool,
}

impl<'a> ScriptLexer<'a> {
    /// Create a new lexer for the given source.
    pub fn new(source: &'a str) -> Self {
        Self {
            cursor: SourceCursor::new(source),
            newline_before: false,
        }
    }

    /// Tokenize the entire source; the last token is always `Eof`.
    pub fn tokenize(source: &str) -> Result<Vec<Token>, ScriptError> {
        let mut lexer = ScriptLexer::new(source);
        let mut tokens = Vec::new();

        loop {
            let token = lexer.next_token()?;
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }

        Ok(tokens)
    }

    /// Read the next token from the source.
    pub fn next_token(&mut self) -> Result<Token, ScriptError> {
        self.newline_before = false;
        self.skip_trivia()?;

        let start = self.cursor.point();
        let Some(ch) = self.cursor.peek() else {
            return Ok(self.token(TokenKind::Eof, start, TokenValue::None));
        };

        match ch {
            '0'..='9' => self.read_number(),
            '.' if self.cursor.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) => {
                self.read_number()
            }
            '\'' | '"' | '`' => self.read_string(),
            c if is_identifier_start(c) => Ok(self.read_identifier()),
            _ => {
                let Some(&(text, kind)) = PUNCTUATORS
                    .iter()
                    .find(|(text, _)| self.cursor.starts_with(text))
                else {
                    return Err(self.error(format!("Unexpected character: '{ch}'")));
                };
                self.cursor.advance_by(text.len());
                Ok(self.token(kind, start, TokenValue::None))
            }
        }
    }

    // --- Private helpers ---

    /// Skip whitespace and comments, noting line breaks.
    fn skip_trivia(&mut self) -> Result<(), ScriptError> {
        loop {
            let skipped = self.cursor.advance_while(char::is_whitespace);
            if skipped.contains('\n') {
                self.newline_before = true;
            }

            if self.cursor.starts_with("//") {
                self.cursor.advance_while(|c| c != '\n');
            } else if self.cursor.starts_with("/*") {
                let Some(end) = self.cursor.find("*/") else {
                    return Err(self.error("Unterminated comment"));
                };
                if self.cursor.slice(self.cursor.offset(), end).contains('\n') {
                    self.newline_before = true;
                }
                self.cursor.advance_to(end + 2);
            } else {
                return Ok(());
            }
        }
    }

    fn read_number(&mut self) -> Result<Token, ScriptError> {
        let start = self.cursor.point();
        self.cursor.advance_while(|c| c.is_ascii_digit());
        if self.cursor.peek() == Some('.') {
            self.cursor.advance();
            self.cursor.advance_while(|c| c.is_ascii_digit());
        }
        if matches!(self.cursor.peek(), Some('e' | 'E')) {
            self.cursor.advance();
            if matches!(self.cursor.peek(), Some('+' | '-')) {
                self.cursor.advance();
            }
            self.cursor.advance_while(|c| c.is_ascii_digit());
        }

        let text = self.cursor.slice(start.offset, self.cursor.offset());
        let value: f64 = text
            .parse()
            .map_err(|_| self.error(format!("Invalid number: '{text}'")))?;
        Ok(self.token(TokenKind::Number, start, TokenValue::Number(value)))
    }

    fn read_string(&mut self) -> Result<Token, ScriptError> {
        let start = self.cursor.point();
        let Some(quote) = self.cursor.advance() else {
            return Err(self.error("Unterminated string"));
        };

        let mut value = String::new();
        loop {
            let Some(ch) = self.cursor.advance() else {
                return Err(self.error("Unterminated string"));
            };
            match ch {
                c if c == quote => break,
                '\n' if quote != '`' => return Err(self.error("Unterminated string")),
                '$' if quote == '`' && self.cursor.peek() == Some('{') => {
                    return Err(self.error("Template literal interpolation is not supported"));
                }
                '\\' => {
                    let Some(escaped) = self.cursor.advance() else {
                        return Err(self.error("Unterminated escape sequence"));
                    };
                    match escaped {
                        'n' => value.push('\n'),
                        't' => value.push('\t'),
                        'r' => value.push('\r'),
                        'b' => value.push('\u{8}'),
                        'f' => value.push('\u{c}'),
                        'v' => value.push('\u{b}'),
                        '0' => value.push('\0'),
                        'u' => value.push(self.read_unicode_escape()?),
                        // Line continuation
                        '\n' => {}
                        c => value.push(c),
                    }
                }
                c => value.push(c),
            }
        }

        Ok(self.token(TokenKind::String, start, TokenValue::String(value)))
    }

    /// `\uXXXX` (the `\u` is already consumed).
    fn read_unicode_escape(&mut self) -> Result<char, ScriptError> {
        let digits = self.cursor.rest().get(..4).unwrap_or("");
        let code = u32::from_str_radix(digits, 16)
            .ok()
            .filter(|_| digits.len() == 4)
            .ok_or_else(|| self.error("Invalid unicode escape"))?;
        self.cursor.advance_by(4);
        Ok(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER))
    }

    fn read_identifier(&mut self) -> Token {
        let start = self.cursor.point();
        let text = self.cursor.advance_while(is_identifier_part);

        let (kind, value) = match text {
            "true" => (TokenKind::Boolean, TokenValue::Boolean(true)),
            "false" => (TokenKind::Boolean, TokenValue::Boolean(false)),
            "null" => (TokenKind::Null, TokenValue::None),
            "undefined" => (TokenKind::Undefined, TokenValue::None),
            _ => (
                keyword(text).unwrap_or(TokenKind::Identifier),
                TokenValue::Identifier(text.to_string()),
            ),
        };
        self.token(kind, start, value)
    }

    fn token(&self, kind: TokenKind, start: ehtml_lexer::SourcePoint, value: TokenValue) -> Token {
        Token {
            kind,
            span: Span::new(start, self.cursor.point()),
            value,
            newline_before: self.newline_before,
        }
    }

    fn error(&self, message: impl Into<String>) -> ScriptError {
        let point = self.cursor.point();
        ScriptError::syntax(message, point.line, point.column)
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_identifier_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}
