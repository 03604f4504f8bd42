/// A position in source text.
///
/// `offset` is a byte offset into the source, `line` and `column` are 1-based
/// (columns count characters, not bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourcePoint {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl SourcePoint {
    pub const START: SourcePoint = SourcePoint {
        offset: 0,
        line: 1,
        column: 1,
    };

    pub fn new(offset: usize, line: usize, column: usize) -> Self {
        Self {
            offset,
            line,
            column,
        }
    }
}

impl Default for SourcePoint {
    fn default() -> Self {
        Self::START
    }
}

/// A source range: `start` is inclusive, `end` is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: SourcePoint,
    pub end: SourcePoint,
}

impl Span {
    pub fn new(start: SourcePoint, end: SourcePoint) -> Self {
        Self { start, end }
    }

    /// First and last line touched by this span.
    pub fn lines(&self) -> (usize, usize) {
        (self.start.line, self.end.line)
    }
}

/// Tracks byte offset, line and column while scanning a source string.
///
/// Every stage that reads text (the markup scanner and the template-script
/// lexer) goes through a cursor, so positions are computed in one place.
#[derive(Debug, Clone)]
pub struct SourceCursor<'a> {
    source: &'a str,
    offset: usize,
    line: usize,
    column: usize,
}

impl<'a> SourceCursor<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            offset: 0,
            line: 1,
            column: 1,
        }
    }

    /// The full source being scanned.
    pub fn source(&self) -> &'a str {
        self.source
    }

    /// Current position.
    pub fn point(&self) -> SourcePoint {
        SourcePoint::new(self.offset, self.line, self.column)
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Unread remainder of the source.
    pub fn rest(&self) -> &'a str {
        &self.source[self.offset..]
    }

    pub fn is_at_end(&self) -> bool {
        self.offset >= self.source.len()
    }

    pub fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    pub fn peek_nth(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    pub fn starts_with(&self, pattern: &str) -> bool {
        self.rest().starts_with(pattern)
    }

    /// Case-insensitive (ASCII) prefix test.
    pub fn starts_with_ignore_case(&self, pattern: &str) -> bool {
        let rest = self.rest().as_bytes();
        rest.len() >= pattern.len() && rest[..pattern.len()].eq_ignore_ascii_case(pattern.as_bytes())
    }

    /// Consume one character, updating line and column.
    pub fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.offset += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    /// Consume characters until `offset` is reached. Never moves backwards.
    pub fn advance_to(&mut self, offset: usize) {
        while self.offset < offset && self.advance().is_some() {}
    }

    /// Consume `len` bytes (must land on a char boundary).
    pub fn advance_by(&mut self, len: usize) {
        self.advance_to(self.offset + len);
    }

    /// Consume characters while `pred` holds, returning the consumed slice.
    pub fn advance_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.offset;
        while self.peek().is_some_and(&pred) {
            self.advance();
        }
        &self.source[start..self.offset]
    }

    pub fn skip_whitespace(&mut self) {
        self.advance_while(char::is_whitespace);
    }

    /// Absolute offset of the next occurrence of `pattern`, searching from the
    /// current position.
    pub fn find(&self, pattern: &str) -> Option<usize> {
        self.rest().find(pattern).map(|i| self.offset + i)
    }

    pub fn slice(&self, from: usize, to: usize) -> &'a str {
        &self.source[from..to]
    }

    /// Rewind to a previously observed point.
    pub fn reset(&mut self, point: SourcePoint) {
        self.offset = point.offset;
        self.line = point.line;
        self.column = point.column;
    }
}
