//! Template script: the small JavaScript-like language EHTML templates
//! compile into, and the interpreter that runs it.
//!
//! A compiled template is a single procedure body. It reads its data from
//! `locals`, appends output to a string and `return`s it:
//!
//! ```text
//! "use strict";locals=locals||{};let name=locals.name;
//! let __o="";__o+="<p>";__o+=__e(name);__o+="</p>";return __o;
//! ```

pub mod ast;
pub mod builtins;
mod interpreter;
pub mod lexer;
pub mod parser;
pub mod value;

pub use ast::{Expression, Statement};
pub use builtins::escape_html;
pub use parser::ScriptParser;
pub use value::Value;

use ast::{ExprKind, StmtKind};
use interpreter::Interpreter;
use tracing::debug;

/// Callback rendering a custom element: `(tag name, locals) -> html`.
pub type CustomRenderer<'f> = dyn FnMut(&str, Value) -> Result<String, ScriptError> + 'f;

/// Errors raised while parsing or running template script.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScriptError {
    #[error("{message} (line {line}, column {column})")]
    Syntax {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("{0} is not defined")]
    Reference(String),

    #[error("{0}")]
    Type(String),

    /// A value raised with `throw`.
    #[error("{message}")]
    Thrown { message: String, value: Value },

    /// Raised by the host, e.g. a failing custom element render.
    #[error("{0}")]
    Custom(String),
}

impl ScriptError {
    pub fn syntax(message: impl Into<String>, line: usize, column: usize) -> Self {
        ScriptError::Syntax {
            message: message.into(),
            line,
            column,
        }
    }

    /// Wrap a thrown value; its `message` field becomes the error message.
    pub fn thrown(value: Value) -> Self {
        let message = match value.get("message") {
            Some(message) => message.to_display_string(),
            None => value.to_display_string(),
        };
        ScriptError::Thrown { message, value }
    }

    /// Error class name as seen by `catch`.
    pub fn name(&self) -> &str {
        match self {
            ScriptError::Syntax { .. } => "SyntaxError",
            ScriptError::Reference(_) => "ReferenceError",
            ScriptError::Type(_) => "TypeError",
            ScriptError::Thrown { value, .. } => match value.get("name") {
                Some(Value::String(name)) => name,
                _ => "Error",
            },
            ScriptError::Custom(_) => "Error",
        }
    }

    /// The value a `catch` clause binds.
    pub fn to_value(&self) -> Value {
        match self {
            ScriptError::Thrown { value, .. } => value.clone(),
            other => Value::error(other.name(), other.to_string()),
        }
    }
}

/// Template lines being executed, maintained by `__line(start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LineCursor {
    pub start: usize,
    pub end: usize,
}

/// A parsed template-script procedure.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    body: Vec<Statement>,
    strict: bool,
}

impl Program {
    pub fn parse(code: &str) -> Result<Self, ScriptError> {
        let body = ScriptParser::parse_program(code)?;
        let strict = matches!(
            body.first().map(|stmt| &stmt.kind),
            Some(StmtKind::Expression(Expression { kind: ExprKind::String(directive), .. }))
                if directive == "use strict"
        );
        debug!(statements = body.len(), strict, "parsed template script");
        Ok(Self { body, strict })
    }

    /// Whether the body opens with a `"use strict"` directive.
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn body(&self) -> &[Statement] {
        &self.body
    }

    /// Run with `locals` bound. `cursor` keeps the last recorded template
    /// lines even when an error escapes.
    pub fn run(
        &self,
        locals: Value,
        cursor: &mut LineCursor,
        render_custom: &mut CustomRenderer<'_>,
    ) -> Result<Value, ScriptError> {
        Interpreter::new(self.strict, cursor, render_custom).run(&self.body, locals)
    }

    /// Run and convert the result to a string.
    pub fn render(
        &self,
        locals: Value,
        cursor: &mut LineCursor,
        render_custom: &mut CustomRenderer<'_>,
    ) -> Result<String, ScriptError> {
        self.run(locals, cursor, render_custom)
            .map(|value| value.to_display_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn no_custom(name: &str, _: Value) -> Result<String, ScriptError> {
        Err(ScriptError::Custom(format!("No renderer for custom element <{name}>")))
    }

    #[test]
    fn test_strict_detection() {
        assert!(Program::parse("\"use strict\";let a=1;").unwrap().is_strict());
        assert!(!Program::parse("let a=1;\"use strict\";").unwrap().is_strict());
        assert!(!Program::parse("").unwrap().is_strict());
    }

    #[test]
    fn test_render_to_string() {
        let program = Program::parse("locals=locals||{};return locals.n * 2;").unwrap();
        let locals = Value::object([("n", Value::Number(21.0))]);
        let out = program
            .render(locals, &mut LineCursor::default(), &mut no_custom)
            .unwrap();
        assert_eq!(out, "42");
    }

    #[test]
    fn test_missing_locals_default() {
        let program = Program::parse("locals=locals||{};return locals.n;").unwrap();
        let out = program
            .run(Value::Undefined, &mut LineCursor::default(), &mut no_custom)
            .unwrap();
        assert_eq!(out, Value::Undefined);
    }

    #[test]
    fn test_custom_error_surfaces() {
        let program = Program::parse("return renderCustom(\"x-a\", {});").unwrap();
        let err = program
            .run(Value::Undefined, &mut LineCursor::default(), &mut no_custom)
            .unwrap_err();
        assert_eq!(err.to_string(), "No renderer for custom element <x-a>");
    }

    #[test]
    fn test_error_values() {
        assert_eq!(
            ScriptError::Reference("x".into()).to_value(),
            Value::error("ReferenceError", "x is not defined")
        );
        let thrown = ScriptError::thrown(Value::error("RangeError", "too big"));
        assert_eq!(thrown.name(), "RangeError");
        assert_eq!(thrown.to_string(), "too big");
    }
}
