//! Tree-walking evaluator for template script.
//!
//! Scope 0 holds implicit globals, scope 1 is the procedure body (where
//! `locals` and `var` live); blocks push further scopes.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::HashMap;

use ehtml_lexer::snippet::range_snippet;
use indexmap::IndexMap;
use tracing::trace;

use crate::ast::{
    BinaryOp, DeclarationKind, ExprKind, Expression, Statement, StmtKind, UnaryOp, UpdateOp,
};
use crate::builtins::{self, Builtin};
use crate::value::Value;
use crate::{CustomRenderer, LineCursor, ScriptError};

const GLOBAL: usize = 0;
const FUNCTION: usize = 1;

#[derive(Debug)]
struct Binding {
    value: Value,
    mutable: bool,
}

type Scope = HashMap<String, Binding>;

/// How a statement finished.
enum Completion {
    Normal,
    Return(Value),
    Break,
    Continue,
}

/// An assignable location: a variable plus a property path.
struct Place {
    root: String,
    keys: Vec<Value>,
}

pub(crate) struct Interpreter<'c, 'f> {
    scopes: Vec<Scope>,
    strict: bool,
    cursor: &'c mut LineCursor,
    render_custom: &'c mut CustomRenderer<'f>,
}

impl<'c, 'f> Interpreter<'c, 'f> {
    pub(crate) fn new(
        strict: bool,
        cursor: &'c mut LineCursor,
        render_custom: &'c mut CustomRenderer<'f>,
    ) -> Self {
        Self {
            scopes: vec![Scope::new(), Scope::new()],
            strict,
            cursor,
            render_custom,
        }
    }

    /// Run a procedure body with `locals` bound; the result is its `return` value.
    pub(crate) fn run(&mut self, body: &[Statement], locals: Value) -> Result<Value, ScriptError> {
        self.scopes[FUNCTION].insert(
            "locals".into(),
            Binding {
                value: locals,
                mutable: true,
            },
        );
        match self.exec_statements(body)? {
            Completion::Return(value) => Ok(value),
            Completion::Normal | Completion::Break | Completion::Continue => Ok(Value::Undefined),
        }
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn exec_statements(&mut self, body: &[Statement]) -> Result<Completion, ScriptError> {
        for stmt in body {
            match self.exec(stmt)? {
                Completion::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Completion::Normal)
    }

    fn exec_block(&mut self, body: &[Statement]) -> Result<Completion, ScriptError> {
        self.scoped(|this| this.exec_statements(body))
    }

    /// Run `f` in a fresh block scope.
    fn scoped<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        self.scopes.push(Scope::new());
        let result = f(self);
        self.scopes.pop();
        result
    }

    fn exec(&mut self, stmt: &Statement) -> Result<Completion, ScriptError> {
        match &stmt.kind {
            StmtKind::Expression(expr) => {
                match &expr.kind {
                    ExprKind::Assignment { target, op, value } => {
                        self.assign(target, op.binary(), value, false)?;
                    }
                    _ => {
                        self.eval(expr)?;
                    }
                }
                Ok(Completion::Normal)
            }

            StmtKind::Declaration { kind, declarators } => {
                for declarator in declarators {
                    let value = match &declarator.init {
                        Some(init) => self.eval(init)?,
                        None => Value::Undefined,
                    };
                    self.declare(*kind, &declarator.name, value, stmt)?;
                }
                Ok(Completion::Normal)
            }

            StmtKind::If {
                condition,
                consequent,
                alternate,
            } => {
                if self.eval(condition)?.is_truthy() {
                    self.exec(consequent)
                } else if let Some(alternate) = alternate {
                    self.exec(alternate)
                } else {
                    Ok(Completion::Normal)
                }
            }

            StmtKind::For {
                init,
                condition,
                update,
                body,
            } => self.scoped(|this| {
                if let Some(init) = init {
                    this.exec(init)?;
                }
                loop {
                    if let Some(condition) = condition {
                        if !this.eval(condition)?.is_truthy() {
                            break;
                        }
                    }
                    match this.exec(body)? {
                        Completion::Break => break,
                        Completion::Return(value) => return Ok(Completion::Return(value)),
                        Completion::Normal | Completion::Continue => {}
                    }
                    if let Some(update) = update {
                        this.eval(update)?;
                    }
                }
                Ok(Completion::Normal)
            }),

            StmtKind::ForOf {
                kind,
                binding,
                iterable,
                body,
            } => {
                let items = match self.eval(iterable)? {
                    Value::Array(items) => items,
                    Value::String(s) => s.chars().map(|c| Value::String(c.to_string())).collect(),
                    _ => {
                        return Err(ScriptError::Type(format!(
                            "{} is not iterable",
                            iterable.describe()
                        )))
                    }
                };
                self.exec_iterations(*kind, binding, items, body, stmt)
            }

            StmtKind::ForIn {
                kind,
                binding,
                object,
                body,
            } => {
                let subject = self.eval(object)?;
                let keys = builtins::keys(&subject)
                    .into_iter()
                    .map(Value::String)
                    .collect();
                self.exec_iterations(*kind, binding, keys, body, stmt)
            }

            StmtKind::While { condition, body } => {
                while self.eval(condition)?.is_truthy() {
                    match self.exec(body)? {
                        Completion::Break => break,
                        Completion::Return(value) => return Ok(Completion::Return(value)),
                        Completion::Normal | Completion::Continue => {}
                    }
                }
                Ok(Completion::Normal)
            }

            StmtKind::Block(body) => self.exec_block(body),
            StmtKind::Break => Ok(Completion::Break),
            StmtKind::Continue => Ok(Completion::Continue),

            StmtKind::Return(value) => Ok(Completion::Return(match value {
                Some(expr) => self.eval(expr)?,
                None => Value::Undefined,
            })),

            StmtKind::Throw(expr) => Err(ScriptError::thrown(self.eval(expr)?)),

            StmtKind::Try {
                block,
                param,
                handler,
            } => match self.exec_block(block) {
                Ok(completion) => Ok(completion),
                Err(err) => {
                    trace!(error = %err, "caught");
                    self.scoped(|this| {
                        if let Some(param) = param {
                            this.declare(DeclarationKind::Let, param, err.to_value(), stmt)?;
                        }
                        this.exec_statements(handler)
                    })
                }
            },

            StmtKind::Empty => Ok(Completion::Normal),
        }
    }

    /// Body of a `for...of` / `for...in`, one scope per iteration.
    fn exec_iterations(
        &mut self,
        kind: DeclarationKind,
        binding: &str,
        items: Vec<Value>,
        body: &Statement,
        stmt: &Statement,
    ) -> Result<Completion, ScriptError> {
        for item in items {
            let completion = self.scoped(|this| {
                this.declare(kind, binding, item, stmt)?;
                this.exec(body)
            })?;
            match completion {
                Completion::Break => break,
                Completion::Return(value) => return Ok(Completion::Return(value)),
                Completion::Normal | Completion::Continue => {}
            }
        }
        Ok(Completion::Normal)
    }

    fn declare(
        &mut self,
        kind: DeclarationKind,
        name: &str,
        value: Value,
        stmt: &Statement,
    ) -> Result<(), ScriptError> {
        let index = match kind {
            DeclarationKind::Var => FUNCTION,
            DeclarationKind::Let | DeclarationKind::Const => self.scopes.len() - 1,
        };
        let scope = &mut self.scopes[index];
        if kind != DeclarationKind::Var && scope.contains_key(name) {
            let start = stmt.span.start;
            return Err(ScriptError::syntax(
                format!("Identifier '{name}' has already been declared"),
                start.line,
                start.column,
            ));
        }
        scope.insert(
            name.to_string(),
            Binding {
                value,
                mutable: kind != DeclarationKind::Const,
            },
        );
        Ok(())
    }

    // =========================================================================
    // Variables and places
    // =========================================================================

    fn lookup(&self, name: &str) -> Option<&Binding> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    fn lookup_mut(&mut self, name: &str) -> Option<&mut Binding> {
        self.scopes.iter_mut().rev().find_map(|scope| scope.get_mut(name))
    }

    fn read_variable(&self, name: &str) -> Result<Value, ScriptError> {
        match self.lookup(name) {
            Some(binding) => Ok(binding.value.clone()),
            None => self.read_global(name),
        }
    }

    /// An undeclared name: a builtin, or an error in strict code.
    fn read_global(&self, name: &str) -> Result<Value, ScriptError> {
        if let Some(builtin) = Builtin::global(name) {
            return Ok(Value::Builtin(builtin));
        }
        if self.strict {
            Err(ScriptError::Reference(name.to_string()))
        } else {
            Ok(Value::Undefined)
        }
    }

    /// Whether `expr` is a variable or a member chain rooted in one.
    fn is_path(expr: &Expression) -> bool {
        match &expr.kind {
            ExprKind::Identifier(_) => true,
            ExprKind::Member { object, .. } => Self::is_path(object),
            _ => false,
        }
    }

    fn resolve_place(&mut self, target: &Expression) -> Result<Place, ScriptError> {
        match &target.kind {
            ExprKind::Identifier(name) => Ok(Place {
                root: name.clone(),
                keys: Vec::new(),
            }),
            ExprKind::Member {
                object, property, ..
            } => {
                let mut place = self.resolve_place(object)?;
                let key = self.eval(property)?;
                place.keys.push(key);
                Ok(place)
            }
            _ => Err(ScriptError::Type("Invalid assignment target".into())),
        }
    }

    /// Read through a place, cloning only the final value.
    fn read_place(&self, place: &Place) -> Result<Value, ScriptError> {
        let mut current: Cow<'_, Value> = match self.lookup(&place.root) {
            Some(binding) => Cow::Borrowed(&binding.value),
            None => Cow::Owned(self.read_global(&place.root)?),
        };
        for key in &place.keys {
            current = match current {
                Cow::Borrowed(value) => match value.property_ref(key) {
                    Some(inner) => Cow::Borrowed(inner),
                    None => Cow::Owned(value.property(key)?),
                },
                Cow::Owned(value) => Cow::Owned(value.property(key)?),
            };
        }
        Ok(current.into_owned())
    }

    /// The value a place's path leads to, for in-place mutation.
    fn place_mut(&mut self, root: &str, keys: &[Value]) -> Result<&mut Value, ScriptError> {
        let strict = self.strict;
        let Some(binding) = self.lookup_mut(root) else {
            return Err(if Builtin::global(root).is_some() || !strict {
                ScriptError::Type(format!(
                    "Cannot set properties of undefined (setting '{}')",
                    keys.first().map(Value::to_display_string).unwrap_or_default()
                ))
            } else {
                ScriptError::Reference(root.to_string())
            });
        };

        let mut target = &mut binding.value;
        for (i, key) in keys.iter().enumerate() {
            target = match target.property_mut(key) {
                Some(inner) => inner,
                None => {
                    let setting = keys.get(i + 1).unwrap_or(key);
                    return Err(ScriptError::Type(format!(
                        "Cannot set properties of undefined (setting '{}')",
                        setting.to_display_string()
                    )));
                }
            };
        }
        Ok(target)
    }

    fn write_place(&mut self, place: &Place, value: Value) -> Result<(), ScriptError> {
        let Some((last, path)) = place.keys.split_last() else {
            let strict = self.strict;
            return match self.lookup_mut(&place.root) {
                Some(binding) if !binding.mutable => {
                    Err(ScriptError::Type("Assignment to constant variable.".into()))
                }
                Some(binding) => {
                    binding.value = value;
                    Ok(())
                }
                None if strict => Err(ScriptError::Reference(place.root.clone())),
                None => {
                    self.scopes[GLOBAL].insert(
                        place.root.clone(),
                        Binding {
                            value,
                            mutable: true,
                        },
                    );
                    Ok(())
                }
            };
        };

        self.place_mut(&place.root, path)?.set_property(last, value)
    }

    /// `target = value` or `target op= value`. Without `keep` the result is
    /// not materialized, so appending to a string stays linear.
    fn assign(
        &mut self,
        target: &Expression,
        op: Option<BinaryOp>,
        value: &Expression,
        keep: bool,
    ) -> Result<Value, ScriptError> {
        if !target.is_assignable() {
            return Err(ScriptError::Type("Invalid assignment target".into()));
        }
        let place = self.resolve_place(target)?;

        let result = match op {
            None => self.eval(value)?,
            Some(op) => {
                let appendable = op == BinaryOp::Add && self.holds_string(&place);
                let current = if appendable {
                    None
                } else {
                    Some(self.read_place(&place)?)
                };
                let rhs = self.eval(value)?;
                let current = match current {
                    Some(current) => current,
                    None => {
                        if self.append(&place, &rhs) {
                            return if keep {
                                self.read_place(&place)
                            } else {
                                Ok(Value::Undefined)
                            };
                        }
                        self.read_place(&place)?
                    }
                };
                binary_values(op, current, rhs)
            }
        };

        if keep {
            self.write_place(&place, result.clone())?;
            Ok(result)
        } else {
            self.write_place(&place, result)?;
            Ok(Value::Undefined)
        }
    }

    /// Whether a place is a mutable variable holding a string.
    fn holds_string(&self, place: &Place) -> bool {
        place.keys.is_empty()
            && matches!(
                self.lookup(&place.root),
                Some(Binding {
                    value: Value::String(_),
                    mutable: true,
                })
            )
    }

    /// Append to a string variable in place.
    fn append(&mut self, place: &Place, rhs: &Value) -> bool {
        if !place.keys.is_empty() {
            return false;
        }
        match self.lookup_mut(&place.root) {
            Some(Binding {
                value: Value::String(s),
                mutable: true,
            }) => {
                s.push_str(&rhs.to_display_string());
                true
            }
            _ => false,
        }
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn eval(&mut self, expr: &Expression) -> Result<Value, ScriptError> {
        match &expr.kind {
            ExprKind::Number(n) => Ok(Value::Number(*n)),
            ExprKind::String(s) => Ok(Value::String(s.clone())),
            ExprKind::Boolean(b) => Ok(Value::Bool(*b)),
            ExprKind::Null => Ok(Value::Null),
            ExprKind::Undefined => Ok(Value::Undefined),
            ExprKind::Identifier(name) => self.read_variable(name),

            ExprKind::Binary { first, rest } => self.eval_binary(first, rest),

            ExprKind::Unary { op, operand } => match op {
                UnaryOp::Typeof => {
                    if let ExprKind::Identifier(name) = &operand.kind {
                        if self.lookup(name).is_none() && Builtin::global(name).is_none() {
                            return Ok(Value::from("undefined"));
                        }
                    }
                    Ok(Value::from(self.eval(operand)?.type_of()))
                }
                UnaryOp::Not => Ok(Value::Bool(!self.eval(operand)?.is_truthy())),
                UnaryOp::Neg => Ok(Value::Number(-self.eval(operand)?.to_number())),
                UnaryOp::Plus => Ok(Value::Number(self.eval(operand)?.to_number())),
            },

            ExprKind::Update { op, prefix, target } => {
                if !target.is_assignable() {
                    return Err(ScriptError::Type("Invalid update target".into()));
                }
                let place = self.resolve_place(target)?;
                let old = self.read_place(&place)?.to_number();
                let new = match op {
                    UpdateOp::Increment => old + 1.0,
                    UpdateOp::Decrement => old - 1.0,
                };
                self.write_place(&place, Value::Number(new))?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }

            ExprKind::Member {
                object, property, ..
            } => {
                if Self::is_path(object) {
                    let place = self.resolve_place(expr)?;
                    self.read_place(&place)
                } else {
                    let object = self.eval(object)?;
                    let key = self.eval(property)?;
                    object.property(&key)
                }
            }

            ExprKind::Call { callee, arguments } | ExprKind::New { callee, arguments } => {
                self.eval_call(callee, arguments)
            }

            ExprKind::Ternary {
                condition,
                consequent,
                alternate,
            } => {
                if self.eval(condition)?.is_truthy() {
                    self.eval(consequent)
                } else {
                    self.eval(alternate)
                }
            }

            ExprKind::Object(properties) => {
                let mut map = IndexMap::new();
                for property in properties {
                    let value = self.eval(&property.value)?;
                    map.insert(property.key.clone(), value);
                }
                Ok(Value::Object(map))
            }

            ExprKind::Array(items) => Ok(Value::Array(self.eval_all(items)?)),

            ExprKind::Assignment { target, op, value } => {
                self.assign(target, op.binary(), value, true)
            }

            ExprKind::Sequence(items) => {
                let mut last = Value::Undefined;
                for item in items {
                    last = self.eval(item)?;
                }
                Ok(last)
            }

            ExprKind::Block(body) => match self.exec_block(body)? {
                Completion::Return(value) => Ok(value),
                Completion::Normal | Completion::Break | Completion::Continue => {
                    Ok(Value::Undefined)
                }
            },
        }
    }

    fn eval_all(&mut self, items: &[Expression]) -> Result<Vec<Value>, ScriptError> {
        items.iter().map(|item| self.eval(item)).collect()
    }

    /// Fold a binary chain left to right, short-circuiting `&& || ??`.
    fn eval_binary(
        &mut self,
        first: &Expression,
        rest: &[(BinaryOp, Expression)],
    ) -> Result<Value, ScriptError> {
        let mut acc = self.eval(first)?;
        for (op, right) in rest {
            acc = match op {
                BinaryOp::And if !acc.is_truthy() => acc,
                BinaryOp::Or if acc.is_truthy() => acc,
                BinaryOp::NullishCoalescing if !acc.is_nullish() => acc,
                BinaryOp::And | BinaryOp::Or | BinaryOp::NullishCoalescing => self.eval(right)?,
                _ => {
                    let right = self.eval(right)?;
                    binary_values(*op, acc, right)
                }
            };
        }
        Ok(acc)
    }

    fn eval_call(
        &mut self,
        callee: &Expression,
        arguments: &[Expression],
    ) -> Result<Value, ScriptError> {
        let ExprKind::Member {
            object, property, ..
        } = &callee.kind
        else {
            let function = self.eval(callee)?;
            let args = self.eval_all(arguments)?;
            return match function {
                Value::Builtin(builtin) => self.call_builtin(builtin, args),
                _ => Err(not_a_function(callee)),
            };
        };

        // Method call: resolve the receiver as a place when possible so
        // mutating methods write back.
        let receiver_place = if Self::is_path(object) {
            Some(self.resolve_place(object)?)
        } else {
            None
        };
        let receiver = match &receiver_place {
            Some(place) => self.read_place(place)?,
            None => self.eval(object)?,
        };
        let name = self.eval(property)?.to_display_string();
        let args = self.eval_all(arguments)?;

        if receiver.is_nullish() {
            return Err(ScriptError::Type(format!(
                "Cannot read properties of {} (reading '{name}')",
                receiver.to_display_string()
            )));
        }

        if let (Some(place), Value::Array(_), "push") = (&receiver_place, &receiver, name.as_str())
        {
            let Value::Array(items) = self.place_mut(&place.root, &place.keys)? else {
                return Err(not_a_function(callee));
            };
            items.extend(args);
            return Ok(Value::Number(items.len() as f64));
        }

        match receiver.property(&Value::String(name.clone()))? {
            Value::Builtin(builtin) => self.call_builtin(builtin, args),
            _ => builtins::call_method(&receiver, &name, &args)
                .unwrap_or_else(|| Err(not_a_function(callee))),
        }
    }

    fn call_builtin(&mut self, builtin: Builtin, args: Vec<Value>) -> Result<Value, ScriptError> {
        match builtin {
            Builtin::Line => {
                let start = args.first().map_or(f64::NAN, Value::to_number);
                let end = args.get(1).map_or(start, Value::to_number);
                self.cursor.start = to_line(start);
                self.cursor.end = to_line(end);
                Ok(Value::Undefined)
            }
            Builtin::Context => Ok(self.contextualize(args)),
            Builtin::RenderCustom => {
                let mut args = args.into_iter();
                let name = args.next().unwrap_or_default().to_display_string();
                let locals = args.next().unwrap_or_default();
                trace!(element = %name, "rendering custom element");
                let html = (self.render_custom)(&name, locals)?;
                Ok(Value::String(html))
            }
            _ => builtins::call(builtin, &args),
        }
    }

    /// `__context(err, filename, source)`: rewrite an error's message to
    /// point at the current template lines.
    fn contextualize(&self, args: Vec<Value>) -> Value {
        let mut args = args.into_iter();
        let err = args.next().unwrap_or_default();
        let filename = args.next().unwrap_or_default().to_display_string();
        let source = args.next().unwrap_or_default().to_display_string();

        let message = match err.get("message") {
            Some(message) => message.to_display_string(),
            None => err.to_display_string(),
        };
        let name = match err.get("name") {
            Some(Value::String(name)) => name.clone(),
            _ => "Error".into(),
        };
        let LineCursor { start, end } = *self.cursor;
        let snippet = range_snippet(&source, start, end);

        Value::object([
            ("name", Value::String(name)),
            (
                "message",
                Value::String(format!("{filename}:{start}\n{snippet}\n\n{message}")),
            ),
            ("path", Value::String(filename)),
        ])
    }
}

fn not_a_function(callee: &Expression) -> ScriptError {
    ScriptError::Type(format!("{} is not a function", callee.describe()))
}

fn to_line(n: f64) -> usize {
    if n.is_finite() && n > 0.0 {
        n as usize
    } else {
        0
    }
}

/// Apply a non-short-circuit binary operator to evaluated operands.
pub(crate) fn binary_values(op: BinaryOp, left: Value, right: Value) -> Value {
    match op {
        BinaryOp::Add => add(left, right),
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Mod => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::Eq => Value::Bool(left.loose_equals(&right)),
        BinaryOp::Neq => Value::Bool(!left.loose_equals(&right)),
        BinaryOp::StrictEq => Value::Bool(left.strict_equals(&right)),
        BinaryOp::StrictNeq => Value::Bool(!left.strict_equals(&right)),
        BinaryOp::Lt => Value::Bool(compare(&left, &right) == Some(Ordering::Less)),
        BinaryOp::Gt => Value::Bool(compare(&left, &right) == Some(Ordering::Greater)),
        BinaryOp::Lte => Value::Bool(matches!(
            compare(&left, &right),
            Some(Ordering::Less | Ordering::Equal)
        )),
        BinaryOp::Gte => Value::Bool(matches!(
            compare(&left, &right),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        BinaryOp::And => {
            if left.is_truthy() {
                right
            } else {
                left
            }
        }
        BinaryOp::Or => {
            if left.is_truthy() {
                left
            } else {
                right
            }
        }
        BinaryOp::NullishCoalescing => {
            if left.is_nullish() {
                right
            } else {
                left
            }
        }
    }
}

/// `+`: concatenation when either side is a string or composite.
fn add(left: Value, right: Value) -> Value {
    let stringish = |v: &Value| {
        matches!(
            v,
            Value::String(_) | Value::Array(_) | Value::Object(_) | Value::Builtin(_)
        )
    };
    if !stringish(&left) && !stringish(&right) {
        return Value::Number(left.to_number() + right.to_number());
    }
    match left {
        Value::String(mut s) => {
            s.push_str(&right.to_display_string());
            Value::String(s)
        }
        other => Value::String(other.to_display_string() + &right.to_display_string()),
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => left.to_number().partial_cmp(&right.to_number()),
    }
}
