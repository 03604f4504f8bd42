//! Abstract syntax tree for template script.
//!
//! Expressions follow the JavaScript shapes the render code needs; statements
//! cover declarations, control flow and `try`/`catch`. `do { ... }` appears as
//! an expression (`ExprKind::Block`) whose value is the block's `return`.

use ehtml_lexer::Span;

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// `expr;`
    Expression(Expression),

    /// `let a = 1, b;`
    Declaration {
        kind: DeclarationKind,
        declarators: Vec<Declarator>,
    },

    If {
        condition: Expression,
        consequent: Box<Statement>,
        alternate: Option<Box<Statement>>,
    },

    /// `for (init; condition; update) body`
    For {
        init: Option<Box<Statement>>,
        condition: Option<Expression>,
        update: Option<Expression>,
        body: Box<Statement>,
    },

    /// `for (const item of items) body`
    ForOf {
        kind: DeclarationKind,
        binding: String,
        iterable: Expression,
        body: Box<Statement>,
    },

    /// `for (const key in object) body`
    ForIn {
        kind: DeclarationKind,
        binding: String,
        object: Expression,
        body: Box<Statement>,
    },

    While {
        condition: Expression,
        body: Box<Statement>,
    },

    Block(Vec<Statement>),
    Break,
    Continue,
    Return(Option<Expression>),
    Throw(Expression),

    Try {
        block: Vec<Statement>,
        param: Option<String>,
        handler: Vec<Statement>,
    },

    /// A lone `;`
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    Let,
    Const,
    Var,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Declarator {
    pub name: String,
    pub init: Option<Expression>,
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

/// A complete expression node.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub kind: ExprKind,
    pub span: Span,
}

/// Expression variants.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Numeric literal: `42`, `3.14`
    Number(f64),

    /// String literal: `"hello"`, `'world'`
    String(String),

    /// Boolean literal: `true`, `false`
    Boolean(bool),

    Null,

    Undefined,

    /// Identifier: `locals`, `__e`
    Identifier(String),

    /// Left-associative binary chain: `a + b - c`, `count > 0 && ok`.
    ///
    /// Folded left to right. Every operator binds no tighter than the one
    /// before it, so `a < 1 && b` is `[(Lt, 1), (And, b)]` after `a`, while
    /// `a + b * c` nests the product as a single operand.
    Binary {
        first: Box<Expression>,
        rest: Vec<(BinaryOp, Expression)>,
    },

    /// Unary operation: `!active`, `-count`, `typeof x`
    Unary {
        op: UnaryOp,
        operand: Box<Expression>,
    },

    /// `i++`, `--i`
    Update {
        op: UpdateOp,
        prefix: bool,
        target: Box<Expression>,
    },

    /// Member access: `user.name`, `items[0]`.
    /// For the dotted form `property` is a string literal.
    Member {
        object: Box<Expression>,
        property: Box<Expression>,
        computed: bool,
    },

    /// Function call: `__e(x)`, `items.push(item)`
    Call {
        callee: Box<Expression>,
        arguments: Vec<Expression>,
    },

    /// `new Error("x")`
    New {
        callee: Box<Expression>,
        arguments: Vec<Expression>,
    },

    /// Ternary: `count > 0 ? 'yes' : 'no'`
    Ternary {
        condition: Box<Expression>,
        consequent: Box<Expression>,
        alternate: Box<Expression>,
    },

    /// Object literal: `{ count: 0, "a-b": 'test' }`
    Object(Vec<ObjectProperty>),

    /// Array literal: `[1, 2, 3]`
    Array(Vec<Expression>),

    /// Assignment: `count = 5`, `__o += x`
    Assignment {
        target: Box<Expression>,
        op: AssignOp,
        value: Box<Expression>,
    },

    /// Comma sequence: `(__line(2), __e(a))`
    Sequence(Vec<Expression>),

    /// `do { ... }` block expression
    Block(Vec<Statement>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectProperty {
    pub key: String,
    pub value: Expression,
    pub shorthand: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Neq,
    StrictEq,
    StrictNeq,
    Lt,
    Gt,
    Lte,
    Gte,
    And,
    Or,
    NullishCoalescing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
    Typeof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOp {
    Increment,
    Decrement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
}

impl AssignOp {
    /// The binary operator a compound assignment applies.
    pub fn binary(self) -> Option<BinaryOp> {
        match self {
            AssignOp::Assign => None,
            AssignOp::AddAssign => Some(BinaryOp::Add),
            AssignOp::SubAssign => Some(BinaryOp::Sub),
            AssignOp::MulAssign => Some(BinaryOp::Mul),
            AssignOp::DivAssign => Some(BinaryOp::Div),
        }
    }
}

impl Expression {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Identifiers and member chains can be assigned to.
    pub fn is_assignable(&self) -> bool {
        matches!(self.kind, ExprKind::Identifier(_) | ExprKind::Member { .. })
    }

    /// Short source-like description used in error messages.
    pub fn describe(&self) -> String {
        match &self.kind {
            ExprKind::Identifier(name) => name.clone(),
            ExprKind::Member {
                object,
                property,
                computed: false,
            } => match &property.kind {
                ExprKind::String(name) => format!("{}.{name}", object.describe()),
                _ => format!("{}[...]", object.describe()),
            },
            ExprKind::Member { object, .. } => format!("{}[...]", object.describe()),
            ExprKind::Call { callee, .. } => format!("{}(...)", callee.describe()),
            _ => "expression".into(),
        }
    }
}
