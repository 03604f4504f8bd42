//! Parser for template script.
//!
//! Recursive descent for statements, Pratt parsing for binary operator
//! precedence. Semicolons may be left out before `}`, at the end of input
//! and at a line break, which is how directive bodies such as
//! `<% let x = 1 %>` end up in the generated code.

use ehtml_lexer::Span;

use crate::ast::{
    AssignOp, BinaryOp, DeclarationKind, Declarator, ExprKind, Expression, ObjectProperty,
    Statement, StmtKind, UnaryOp, UpdateOp,
};
use crate::lexer::{ScriptLexer, Token, TokenKind, TokenValue};
use crate::ScriptError;

/// Deepest statement or operand nesting accepted.
pub const MAX_NESTING_DEPTH: usize = 128;

/// Template-script parser.
pub struct ScriptParser {
    tokens: Vec<Token>,
    pos: usize,
    /// Enclosing loops; `break`/`continue` need at least one.
    loop_depth: usize,
    /// Statements and operands currently being parsed.
    depth: usize,
}

impl ScriptParser {
    /// Create a new parser for the given tokens (must end with `Eof`).
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            loop_depth: 0,
            depth: 0,
        }
    }

    /// Parse a whole program.
    pub fn parse_program(source: &str) -> Result<Vec<Statement>, ScriptError> {
        let mut parser = ScriptParser::new(ScriptLexer::tokenize(source)?);
        let mut body = Vec::new();
        while !parser.check(TokenKind::Eof) {
            body.push(parser.parse_statement()?);
        }
        Ok(body)
    }

    /// Parse a single expression, rejecting trailing tokens.
    pub fn parse_expression_source(source: &str) -> Result<Expression, ScriptError> {
        let mut parser = ScriptParser::new(ScriptLexer::tokenize(source)?);
        let expr = parser.parse_expression()?;
        if !parser.check(TokenKind::Eof) {
            return Err(parser.unexpected());
        }
        Ok(expr)
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn parse_statement(&mut self) -> Result<Statement, ScriptError> {
        self.nested(Self::parse_any_statement)
    }

    fn parse_any_statement(&mut self) -> Result<Statement, ScriptError> {
        let start = self.peek().span;

        let kind = match self.peek().kind {
            TokenKind::LBrace => StmtKind::Block(self.parse_block()?),
            TokenKind::Semicolon => {
                self.advance();
                StmtKind::Empty
            }
            TokenKind::Let | TokenKind::Const | TokenKind::Var => {
                let declaration = self.parse_declaration()?;
                self.consume_statement_end()?;
                declaration
            }
            TokenKind::If => self.parse_if()?,
            TokenKind::For => self.parse_for()?,
            TokenKind::While => {
                self.advance();
                self.expect(TokenKind::LParen, "'(' after while")?;
                let condition = self.parse_expression()?;
                self.expect(TokenKind::RParen, "')' after condition")?;
                let body = Box::new(self.parse_loop_body()?);
                StmtKind::While { condition, body }
            }
            TokenKind::Break | TokenKind::Continue => {
                let is_break = self.check(TokenKind::Break);
                if self.loop_depth == 0 {
                    let keyword = if is_break { "break" } else { "continue" };
                    return Err(self.error(format!("Illegal {keyword} statement")));
                }
                self.advance();
                self.consume_statement_end()?;
                if is_break {
                    StmtKind::Break
                } else {
                    StmtKind::Continue
                }
            }
            TokenKind::Return => {
                self.advance();
                let value = if self.at_statement_end() {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.consume_statement_end()?;
                StmtKind::Return(value)
            }
            TokenKind::Throw => {
                self.advance();
                let value = self.parse_expression()?;
                self.consume_statement_end()?;
                StmtKind::Throw(value)
            }
            TokenKind::Try => self.parse_try()?,
            _ => {
                let expr = self.parse_expression()?;
                self.consume_statement_end()?;
                StmtKind::Expression(expr)
            }
        };

        Ok(Statement {
            kind,
            span: self.span_from(start),
        })
    }

    /// `{ statements }`
    fn parse_block(&mut self) -> Result<Vec<Statement>, ScriptError> {
        self.expect(TokenKind::LBrace, "'{'")?;
        let mut body = Vec::new();
        while !self.check(TokenKind::RBrace) {
            if self.check(TokenKind::Eof) {
                return Err(self.error("Expected '}' before end of input"));
            }
            body.push(self.parse_statement()?);
        }
        self.advance();
        Ok(body)
    }

    /// `let a = 1, b` (without the statement end).
    fn parse_declaration(&mut self) -> Result<StmtKind, ScriptError> {
        let kind = self.declaration_kind();
        self.advance();

        let mut declarators = Vec::new();
        loop {
            let name = self.expect_identifier()?;
            let init = if self.check(TokenKind::Eq) {
                self.advance();
                Some(self.parse_assignment()?)
            } else {
                None
            };
            if init.is_none() && kind == DeclarationKind::Const {
                return Err(self.error("Missing initializer in const declaration"));
            }
            declarators.push(Declarator { name, init });

            if !self.check(TokenKind::Comma) {
                break;
            }
            self.advance();
        }

        Ok(StmtKind::Declaration { kind, declarators })
    }

    fn parse_if(&mut self) -> Result<StmtKind, ScriptError> {
        self.advance(); // consume `if`
        self.expect(TokenKind::LParen, "'(' after if")?;
        let condition = self.parse_expression()?;
        self.expect(TokenKind::RParen, "')' after condition")?;
        let consequent = Box::new(self.parse_statement()?);

        let alternate = if self.check(TokenKind::Else) {
            self.advance();
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };

        Ok(StmtKind::If {
            condition,
            consequent,
            alternate,
        })
    }

    fn parse_for(&mut self) -> Result<StmtKind, ScriptError> {
        self.advance(); // consume `for`
        self.expect(TokenKind::LParen, "'(' after for")?;

        // for (let x of/in expr)
        if self.is_declaration_start() && self.is_contextual_at(2) {
            let kind = self.declaration_kind();
            self.advance();
            let binding = self.expect_identifier()?;
            let is_of = self.expect_identifier()? == "of";
            let subject = self.parse_expression()?;
            self.expect(TokenKind::RParen, "')' after for clause")?;
            let body = Box::new(self.parse_loop_body()?);

            return Ok(if is_of {
                StmtKind::ForOf {
                    kind,
                    binding,
                    iterable: subject,
                    body,
                }
            } else {
                StmtKind::ForIn {
                    kind,
                    binding,
                    object: subject,
                    body,
                }
            });
        }

        let init = if self.check(TokenKind::Semicolon) {
            None
        } else {
            let start = self.peek().span;
            let kind = if self.is_declaration_start() {
                self.parse_declaration()?
            } else {
                StmtKind::Expression(self.parse_expression()?)
            };
            Some(Box::new(Statement {
                kind,
                span: self.span_from(start),
            }))
        };
        self.expect(TokenKind::Semicolon, "';' after for initializer")?;

        let condition = if self.check(TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(TokenKind::Semicolon, "';' after for condition")?;

        let update = if self.check(TokenKind::RParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(TokenKind::RParen, "')' after for clauses")?;

        let body = Box::new(self.parse_loop_body()?);
        Ok(StmtKind::For {
            init,
            condition,
            update,
            body,
        })
    }

    fn parse_loop_body(&mut self) -> Result<Statement, ScriptError> {
        self.loop_depth += 1;
        let body = self.parse_statement();
        self.loop_depth -= 1;
        body
    }

    fn parse_try(&mut self) -> Result<StmtKind, ScriptError> {
        self.advance(); // consume `try`
        let block = self.parse_block()?;

        if !self.check(TokenKind::Catch) {
            return Err(self.error("Expected catch after try block"));
        }
        self.advance();

        let param = if self.check(TokenKind::LParen) {
            self.advance();
            let name = self.expect_identifier()?;
            self.expect(TokenKind::RParen, "')' after catch parameter")?;
            Some(name)
        } else {
            None
        };
        let handler = self.parse_block()?;

        Ok(StmtKind::Try {
            block,
            param,
            handler,
        })
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    /// Full expression, including comma sequences.
    fn parse_expression(&mut self) -> Result<Expression, ScriptError> {
        let first = self.parse_assignment()?;
        if !self.check(TokenKind::Comma) {
            return Ok(first);
        }

        let start = first.span;
        let mut items = vec![first];
        while self.check(TokenKind::Comma) {
            self.advance();
            items.push(self.parse_assignment()?);
        }
        Ok(Expression::new(ExprKind::Sequence(items), self.span_from(start)))
    }

    fn parse_assignment(&mut self) -> Result<Expression, ScriptError> {
        let target = self.parse_ternary()?;

        let op = match self.peek().kind {
            TokenKind::Eq => AssignOp::Assign,
            TokenKind::PlusEq => AssignOp::AddAssign,
            TokenKind::MinusEq => AssignOp::SubAssign,
            TokenKind::StarEq => AssignOp::MulAssign,
            TokenKind::SlashEq => AssignOp::DivAssign,
            _ => return Ok(target),
        };
        if !target.is_assignable() {
            return Err(self.error("Invalid assignment target"));
        }
        self.advance();

        let value = self.parse_assignment()?;
        let span = Span::new(target.span.start, value.span.end);
        Ok(Expression::new(
            ExprKind::Assignment {
                target: Box::new(target),
                op,
                value: Box::new(value),
            },
            span,
        ))
    }

    fn parse_ternary(&mut self) -> Result<Expression, ScriptError> {
        let condition = self.parse_binary(0)?;
        if !self.check(TokenKind::Question) {
            return Ok(condition);
        }
        self.advance();

        let consequent = self.parse_assignment()?;
        self.expect(TokenKind::Colon, "':' in conditional expression")?;
        let alternate = self.parse_assignment()?;

        let span = Span::new(condition.span.start, alternate.span.end);
        Ok(Expression::new(
            ExprKind::Ternary {
                condition: Box::new(condition),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            },
            span,
        ))
    }

    /// Pratt loop over left-associative binary operators. Operands at this
    /// level are collected into one flat chain, so long `+` runs in generated
    /// code stay shallow.
    fn parse_binary(&mut self, min_power: u8) -> Result<Expression, ScriptError> {
        let first = self.parse_unary()?;
        let mut rest = Vec::new();

        while let Some((op, power)) = binary_operator(self.peek().kind) {
            if power < min_power {
                break;
            }
            self.advance();
            rest.push((op, self.parse_binary(power + 1)?));
        }

        let Some((_, last)) = rest.last() else {
            return Ok(first);
        };
        let span = Span::new(first.span.start, last.span.end);
        Ok(Expression::new(
            ExprKind::Binary {
                first: Box::new(first),
                rest,
            },
            span,
        ))
    }

    fn parse_unary(&mut self) -> Result<Expression, ScriptError> {
        self.nested(Self::parse_prefix)
    }

    fn parse_prefix(&mut self) -> Result<Expression, ScriptError> {
        let start = self.peek().span;

        let op = match self.peek().kind {
            TokenKind::Not => Some(UnaryOp::Not),
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Typeof => Some(UnaryOp::Typeof),
            TokenKind::PlusPlus | TokenKind::MinusMinus => {
                let op = update_operator(self.peek().kind);
                self.advance();
                let target = self.parse_unary()?;
                if !target.is_assignable() {
                    return Err(self.error("Invalid update target"));
                }
                return Ok(Expression::new(
                    ExprKind::Update {
                        op,
                        prefix: true,
                        target: Box::new(target),
                    },
                    self.span_from(start),
                ));
            }
            _ => None,
        };

        let Some(op) = op else {
            return self.parse_postfix();
        };
        self.advance();
        let operand = self.parse_unary()?;
        Ok(Expression::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            self.span_from(start),
        ))
    }

    fn parse_postfix(&mut self) -> Result<Expression, ScriptError> {
        let expr = self.parse_call_member()?;

        let is_update = matches!(self.peek().kind, TokenKind::PlusPlus | TokenKind::MinusMinus)
            && !self.peek().newline_before;
        if !is_update {
            return Ok(expr);
        }
        if !expr.is_assignable() {
            return Err(self.error("Invalid update target"));
        }

        let op = update_operator(self.peek().kind);
        self.advance();
        let span = self.span_from(expr.span);
        Ok(Expression::new(
            ExprKind::Update {
                op,
                prefix: false,
                target: Box::new(expr),
            },
            span,
        ))
    }

    /// Primary followed by any number of `.name`, `[expr]` and `(args)`.
    fn parse_call_member(&mut self) -> Result<Expression, ScriptError> {
        if self.check(TokenKind::New) {
            return self.parse_new();
        }

        let mut expr = self.parse_primary()?;
        loop {
            match self.peek().kind {
                TokenKind::Dot => {
                    self.advance();
                    let name_span = self.peek().span;
                    let name = self.expect_property_name()?;
                    let property = Expression::new(ExprKind::String(name), name_span);
                    expr = self.member(expr, property, false);
                }
                TokenKind::LBracket => {
                    self.advance();
                    let property = self.parse_expression()?;
                    self.expect(TokenKind::RBracket, "']' after index")?;
                    expr = self.member(expr, property, true);
                }
                TokenKind::LParen => {
                    let arguments = self.parse_arguments()?;
                    let span = self.span_from(expr.span);
                    expr = Expression::new(
                        ExprKind::Call {
                            callee: Box::new(expr),
                            arguments,
                        },
                        span,
                    );
                }
                _ => return Ok(expr),
            }
        }
    }

    /// `new Callee(args)`; the argument list is optional.
    fn parse_new(&mut self) -> Result<Expression, ScriptError> {
        let start = self.peek().span;
        self.advance(); // consume `new`

        let expr = self.parse_call_member()?;
        let (callee, arguments) = match expr.kind {
            ExprKind::Call { callee, arguments } => (callee, arguments),
            kind => (Box::new(Expression::new(kind, expr.span)), Vec::new()),
        };
        Ok(Expression::new(
            ExprKind::New { callee, arguments },
            self.span_from(start),
        ))
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expression>, ScriptError> {
        self.expect(TokenKind::LParen, "'('")?;
        let mut arguments = Vec::new();
        while !self.check(TokenKind::RParen) {
            arguments.push(self.parse_assignment()?);
            if !self.check(TokenKind::Comma) {
                break;
            }
            self.advance();
        }
        self.expect(TokenKind::RParen, "')' after arguments")?;
        Ok(arguments)
    }

    fn parse_primary(&mut self) -> Result<Expression, ScriptError> {
        let token = self.peek().clone();
        let span = token.span;

        let kind = match (token.kind, token.value) {
            (TokenKind::Number, TokenValue::Number(n)) => {
                self.advance();
                ExprKind::Number(n)
            }
            (TokenKind::String, TokenValue::String(s)) => {
                self.advance();
                ExprKind::String(s)
            }
            (TokenKind::Boolean, TokenValue::Boolean(b)) => {
                self.advance();
                ExprKind::Boolean(b)
            }
            (TokenKind::Null, _) => {
                self.advance();
                ExprKind::Null
            }
            (TokenKind::Undefined, _) => {
                self.advance();
                ExprKind::Undefined
            }
            (TokenKind::Identifier, TokenValue::Identifier(name)) => {
                self.advance();
                ExprKind::Identifier(name)
            }
            (TokenKind::LParen, _) => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(TokenKind::RParen, "')'")?;
                return Ok(Expression::new(inner.kind, self.span_from(span)));
            }
            (TokenKind::LBracket, _) => self.parse_array()?,
            (TokenKind::LBrace, _) => self.parse_object()?,
            (TokenKind::Do, _) => {
                self.advance();
                // A block expression is its own function-like body
                let outer = std::mem::take(&mut self.loop_depth);
                let body = self.parse_block();
                self.loop_depth = outer;
                ExprKind::Block(body?)
            }
            _ => return Err(self.unexpected()),
        };

        Ok(Expression::new(kind, self.span_from(span)))
    }

    fn parse_array(&mut self) -> Result<ExprKind, ScriptError> {
        self.advance(); // consume `[`
        let mut items = Vec::new();
        while !self.check(TokenKind::RBracket) {
            items.push(self.parse_assignment()?);
            if !self.check(TokenKind::Comma) {
                break;
            }
            self.advance();
        }
        self.expect(TokenKind::RBracket, "']' after array elements")?;
        Ok(ExprKind::Array(items))
    }

    fn parse_object(&mut self) -> Result<ExprKind, ScriptError> {
        self.advance(); // consume `{`
        let mut properties = Vec::new();

        while !self.check(TokenKind::RBrace) {
            let key_token = self.peek().clone();
            let key = match key_token.value {
                TokenValue::String(s) | TokenValue::Identifier(s) => s,
                TokenValue::Number(n) => crate::value::format_number(n),
                _ => return Err(self.unexpected()),
            };
            self.advance();

            if self.check(TokenKind::Colon) {
                self.advance();
                let value = self.parse_assignment()?;
                properties.push(ObjectProperty {
                    key,
                    value,
                    shorthand: false,
                });
            } else if key_token.kind == TokenKind::Identifier {
                properties.push(ObjectProperty {
                    value: Expression::new(ExprKind::Identifier(key.clone()), key_token.span),
                    key,
                    shorthand: true,
                });
            } else {
                return Err(self.error("Expected ':' after property name"));
            }

            if !self.check(TokenKind::Comma) {
                break;
            }
            self.advance();
        }

        self.expect(TokenKind::RBrace, "'}' after object properties")?;
        Ok(ExprKind::Object(properties))
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn member(&self, object: Expression, property: Expression, computed: bool) -> Expression {
        let span = self.span_from(object.span);
        Expression::new(
            ExprKind::Member {
                object: Box::new(object),
                property: Box::new(property),
                computed,
            },
            span,
        )
    }

    fn peek(&self) -> &Token {
        // The token list always ends with Eof, and `advance` never moves past it
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.pos.min(last)]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.pos.saturating_sub(1)]
    }

    fn advance(&mut self) {
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<(), ScriptError> {
        if !self.check(kind) {
            return Err(self.error(format!("Expected {what}")));
        }
        self.advance();
        Ok(())
    }

    fn expect_identifier(&mut self) -> Result<String, ScriptError> {
        match (&self.peek().kind, &self.peek().value) {
            (TokenKind::Identifier, TokenValue::Identifier(name)) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.error("Expected identifier")),
        }
    }

    /// After `.`, keywords and literals are valid property names.
    fn expect_property_name(&mut self) -> Result<String, ScriptError> {
        let name = match (&self.peek().kind, &self.peek().value) {
            (_, TokenValue::Identifier(name)) => name.clone(),
            (TokenKind::Boolean, TokenValue::Boolean(b)) => b.to_string(),
            (TokenKind::Null, _) => "null".into(),
            (TokenKind::Undefined, _) => "undefined".into(),
            _ => return Err(self.error("Expected property name")),
        };
        self.advance();
        Ok(name)
    }

    fn is_declaration_start(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Let | TokenKind::Const | TokenKind::Var
        )
    }

    fn declaration_kind(&self) -> DeclarationKind {
        match self.peek().kind {
            TokenKind::Const => DeclarationKind::Const,
            TokenKind::Var => DeclarationKind::Var,
            _ => DeclarationKind::Let,
        }
    }

    /// Whether the token `offset` ahead is the contextual keyword `of` or `in`.
    fn is_contextual_at(&self, offset: usize) -> bool {
        matches!(
            self.tokens.get(self.pos + offset),
            Some(Token {
                kind: TokenKind::Identifier,
                value: TokenValue::Identifier(name),
                ..
            }) if name == "of" || name == "in"
        )
    }

    fn at_statement_end(&self) -> bool {
        let token = self.peek();
        matches!(
            token.kind,
            TokenKind::Semicolon | TokenKind::RBrace | TokenKind::Eof
        ) || token.newline_before
    }

    /// `;`, or an inserted one before `}`, at the end, or at a line break.
    fn consume_statement_end(&mut self) -> Result<(), ScriptError> {
        if self.check(TokenKind::Semicolon) {
            self.advance();
            return Ok(());
        }
        if self.at_statement_end() {
            return Ok(());
        }
        Err(self.unexpected())
    }

    fn span_from(&self, start: Span) -> Span {
        Span::new(start.start, self.previous().span.end)
    }

    fn unexpected(&self) -> ScriptError {
        let token = self.peek();
        let message = match (&token.kind, &token.value) {
            (TokenKind::Eof, _) => "Unexpected end of input".to_string(),
            (_, TokenValue::Identifier(name)) => format!("Unexpected token '{name}'"),
            (_, TokenValue::String(_)) => "Unexpected string".to_string(),
            (_, TokenValue::Number(_)) => "Unexpected number".to_string(),
            (kind, _) => format!("Unexpected token {kind:?}"),
        };
        self.error(message)
    }

    fn error(&self, message: impl Into<String>) -> ScriptError {
        let point = self.peek().span.start;
        ScriptError::syntax(message, point.line, point.column)
    }

    /// Every cycle through the grammar passes a statement or an operand,
    /// so counting those bounds the recursion.
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, ScriptError>,
    ) -> Result<T, ScriptError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(self.error(format!(
                "Nesting deeper than {MAX_NESTING_DEPTH} levels"
            )));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }
}

/// Binding power and operator for binary tokens; higher binds tighter.
fn binary_operator(kind: TokenKind) -> Option<(BinaryOp, u8)> {
    Some(match kind {
        TokenKind::QuestionQuestion => (BinaryOp::NullishCoalescing, 1),
        TokenKind::Or => (BinaryOp::Or, 1),
        TokenKind::And => (BinaryOp::And, 2),
        TokenKind::EqEq => (BinaryOp::Eq, 3),
        TokenKind::NotEq => (BinaryOp::Neq, 3),
        TokenKind::StrictEq => (BinaryOp::StrictEq, 3),
        TokenKind::StrictNotEq => (BinaryOp::StrictNeq, 3),
        TokenKind::Lt => (BinaryOp::Lt, 4),
        TokenKind::Gt => (BinaryOp::Gt, 4),
        TokenKind::Lte => (BinaryOp::Lte, 4),
        TokenKind::Gte => (BinaryOp::Gte, 4),
        TokenKind::Plus => (BinaryOp::Add, 5),
        TokenKind::Minus => (BinaryOp::Sub, 5),
        TokenKind::Star => (BinaryOp::Mul, 6),
        TokenKind::Slash => (BinaryOp::Div, 6),
        TokenKind::Percent => (BinaryOp::Mod, 6),
        _ => return None,
    })
}

fn update_operator(kind: TokenKind) -> UpdateOp {
    if kind == TokenKind::MinusMinus {
        UpdateOp::Decrement
    } else {
        UpdateOp::Increment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn expr(source: &str) -> ExprKind {
        ScriptParser::parse_expression_source(source).unwrap().kind
    }

    fn program(source: &str) -> Vec<StmtKind> {
        ScriptParser::parse_program(source)
            .unwrap()
            .into_iter()
            .map(|s| s.kind)
            .collect()
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    #[test]
    fn test_literals() {
        assert_eq!(expr("42"), ExprKind::Number(42.0));
        assert_eq!(expr("'hi'"), ExprKind::String("hi".into()));
        assert_eq!(expr("null"), ExprKind::Null);
        assert_eq!(expr("undefined"), ExprKind::Undefined);
    }

    fn chain(source: &str) -> (ExprKind, Vec<(BinaryOp, ExprKind)>) {
        let ExprKind::Binary { first, rest } = expr(source) else {
            panic!("Expected binary");
        };
        (
            first.kind,
            rest.into_iter().map(|(op, operand)| (op, operand.kind)).collect(),
        )
    }

    #[test]
    fn test_precedence() {
        let (_, rest) = chain("a + b * c");
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].0, BinaryOp::Add);
        assert!(matches!(&rest[0].1, ExprKind::Binary { rest, .. } if rest[0].0 == BinaryOp::Mul));
    }

    #[test]
    fn test_left_associative_chain_is_flat() {
        let (first, rest) = chain("a - b - c");
        assert_eq!(first, ExprKind::Identifier("a".into()));
        assert_eq!(
            rest,
            vec![
                (BinaryOp::Sub, ExprKind::Identifier("b".into())),
                (BinaryOp::Sub, ExprKind::Identifier("c".into())),
            ]
        );
    }

    #[test]
    fn test_logical_below_comparison() {
        let (_, rest) = chain("a < 1 && b === 2 || c");
        let ops: Vec<BinaryOp> = rest.iter().map(|(op, _)| *op).collect();
        assert_eq!(ops, vec![BinaryOp::Lt, BinaryOp::And, BinaryOp::Or]);
        assert!(matches!(&rest[1].1, ExprKind::Binary { .. }));
    }

    #[test]
    fn test_long_concatenation() {
        let source = vec!["a"; 20_000].join("+");
        let (_, rest) = chain(&source);
        assert_eq!(rest.len(), 19_999);
    }

    #[test]
    fn test_nesting_limit() {
        let shallow = format!("{}x{}", "(".repeat(50), ")".repeat(50));
        assert_eq!(expr(&shallow), ExprKind::Identifier("x".into()));

        let deep = [
            format!("{}x{}", "(".repeat(10_000), ")".repeat(10_000)),
            format!("{}x{}", "[".repeat(10_000), "]".repeat(10_000)),
            format!("{}x", "!".repeat(10_000)),
            format!("{}x;", "if (a) ".repeat(10_000)),
        ];
        for source in deep {
            let err = ScriptParser::parse_program(&source).unwrap_err();
            assert!(err.to_string().contains("Nesting deeper than 128 levels"));
        }
    }

    #[test]
    fn test_member_chain_and_call() {
        let ExprKind::Call { callee, arguments } = expr("locals.items[0].name.trim()") else {
            panic!("Expected call");
        };
        assert!(arguments.is_empty());
        assert_eq!(callee.describe(), "locals.items[...].name.trim");
    }

    #[test]
    fn test_keyword_property_name() {
        assert!(matches!(expr("a.catch"), ExprKind::Member { computed: false, .. }));
    }

    #[test]
    fn test_sequence_in_parens() {
        let ExprKind::Sequence(items) = expr("(__line(2,3),__e(a))") else {
            panic!("Expected sequence");
        };
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_ternary_and_assignment() {
        let ExprKind::Assignment { op, value, .. } = expr("x += a ? 1 : 2") else {
            panic!("Expected assignment");
        };
        assert_eq!(op, AssignOp::AddAssign);
        assert!(matches!(value.kind, ExprKind::Ternary { .. }));
    }

    #[test]
    fn test_invalid_assignment_target() {
        let err = ScriptParser::parse_expression_source("a + 1 = 2").unwrap_err();
        assert!(err.to_string().contains("Invalid assignment target"));
    }

    #[test]
    fn test_object_literal() {
        let ExprKind::Object(props) = expr(r#"{"a-b": 1, c, d: 'x', 2: true,}"#) else {
            panic!("Expected object");
        };
        let keys: Vec<_> = props.iter().map(|p| (p.key.as_str(), p.shorthand)).collect();
        assert_eq!(
            keys,
            vec![("a-b", false), ("c", true), ("d", false), ("2", false)]
        );
    }

    #[test]
    fn test_update_forms() {
        assert!(matches!(expr("i++"), ExprKind::Update { prefix: false, .. }));
        assert!(matches!(
            expr("--i"),
            ExprKind::Update {
                prefix: true,
                op: UpdateOp::Decrement,
                ..
            }
        ));
    }

    #[test]
    fn test_new_expression() {
        let ExprKind::New { callee, arguments } = expr("new Error('x')") else {
            panic!("Expected new");
        };
        assert_eq!(callee.describe(), "Error");
        assert_eq!(arguments.len(), 1);
    }

    #[test]
    fn test_do_block_expression() {
        let ExprKind::Block(body) = expr("do{let __o=\"\";return __o;}") else {
            panic!("Expected block");
        };
        assert_eq!(body.len(), 2);
    }

    #[test]
    fn test_unary_typeof() {
        let ExprKind::Unary { op, operand } = expr("typeof x") else {
            panic!("Expected unary");
        };
        assert_eq!(op, UnaryOp::Typeof);
        assert_eq!(operand.kind, ExprKind::Identifier("x".into()));
    }

    // =========================================================================
    // Statements
    // =========================================================================

    #[test]
    fn test_declarations() {
        let stmts = program("let a=locals.a,b=locals.b;const c = 1");
        let StmtKind::Declaration { kind, declarators } = &stmts[0] else {
            panic!("Expected declaration");
        };
        assert_eq!(*kind, DeclarationKind::Let);
        assert_eq!(declarators.len(), 2);
        assert!(matches!(
            stmts[1],
            StmtKind::Declaration {
                kind: DeclarationKind::Const,
                ..
            }
        ));
    }

    #[test]
    fn test_const_requires_initializer() {
        let err = ScriptParser::parse_program("const a;").unwrap_err();
        assert!(err.to_string().contains("Missing initializer"));
    }

    #[test]
    fn test_semicolon_insertion_at_newline() {
        let stmts = program("let x = 1\nx++\n__o+=x;");
        assert_eq!(stmts.len(), 3);
    }

    #[test]
    fn test_missing_semicolon_on_same_line() {
        let err = ScriptParser::parse_program("a b").unwrap_err();
        assert!(err.to_string().contains("Unexpected token 'b'"));
    }

    #[test]
    fn test_if_else_split_over_directives() {
        let stmts = program("if (a) {\n__o+=\"x\";} else {\n__o+=\"y\";}\n");
        let StmtKind::If { alternate, .. } = &stmts[0] else {
            panic!("Expected if");
        };
        assert!(alternate.is_some());
    }

    #[test]
    fn test_for_forms() {
        let stmts = program(
            "for (let i = 0; i < 3; i++) {}\nfor (const x of xs) {}\nfor (let k in o) {}\nfor (;;) break",
        );
        assert!(matches!(stmts[0], StmtKind::For { .. }));
        assert!(matches!(stmts[1], StmtKind::ForOf { .. }));
        assert!(matches!(stmts[2], StmtKind::ForIn { .. }));
        assert!(matches!(
            &stmts[3],
            StmtKind::For {
                init: None,
                condition: None,
                update: None,
                ..
            }
        ));
    }

    #[test]
    fn test_try_catch() {
        let stmts = program("try { a() } catch (e) { throw e }");
        let StmtKind::Try { param, handler, .. } = &stmts[0] else {
            panic!("Expected try");
        };
        assert_eq!(param.as_deref(), Some("e"));
        assert_eq!(handler.len(), 1);
    }

    #[test]
    fn test_return_without_value_at_newline() {
        let stmts = program("return\n1");
        assert_eq!(stmts[0], StmtKind::Return(None));
    }

    #[test]
    fn test_unclosed_block() {
        let err = ScriptParser::parse_program("if (a) {").unwrap_err();
        assert!(err.to_string().contains("Expected '}'"));
    }

    #[test]
    fn test_break_outside_loop() {
        let err = ScriptParser::parse_program("break;").unwrap_err();
        assert!(err.to_string().starts_with("Illegal break statement"));

        assert!(ScriptParser::parse_program("while (a) { if (b) break; }").is_ok());
        // The loop does not reach into a block expression
        assert!(ScriptParser::parse_program("while (a) { x = do { continue; }; }").is_err());
    }
}
