//! Lowered syntax tree evaluated by the snippet interpreter.
//!
//! The parser converts ruff's AST into these types, dropping everything the
//! interpreter does not execute (annotations, decorators, type parameters) and
//! rejecting the constructs it does not support.

use std::rc::Rc;

use crate::value::Value;

/// A statement together with the 1-based source line it starts on.
#[derive(Debug, Clone)]
pub struct NodeLoc {
    pub line: u32,
    pub node: Node,
}

/// Binary operators, shared by binary expressions and augmented assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Add,
    Sub,
    Mult,
    MatMult,
    Div,
    Mod,
    Pow,
    LShift,
    RShift,
    BitOr,
    BitXor,
    BitAnd,
    FloorDiv,
}

impl Operator {
    /// The operator's source symbol, used in `TypeError` messages.
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mult => "*",
            Self::MatMult => "@",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Pow => "** or pow()",
            Self::LShift => "<<",
            Self::RShift => ">>",
            Self::BitOr => "|",
            Self::BitXor => "^",
            Self::BitAnd => "&",
            Self::FloorDiv => "//",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOperator {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    Is,
    IsNot,
    In,
    NotIn,
}

impl CmpOperator {
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtE => "<=",
            Self::Gt => ">",
            Self::GtE => ">=",
            Self::Is => "is",
            Self::IsNot => "is not",
            Self::In => "in",
            Self::NotIn => "not in",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Neg,
    Pos,
    Invert,
}

/// Conversion flag of an f-string replacement field: `!s`, `!r` or `!a`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    None,
    Str,
    Repr,
    Ascii,
}

/// One piece of an f-string.
#[derive(Debug, Clone)]
pub enum FStringPart {
    Literal(String),
    Interpolation {
        expr: Box<Expr>,
        conversion: Conversion,
        /// Format spec after the colon; may itself contain replacement fields.
        format_spec: Option<Vec<FStringPart>>,
        /// Source text echoed by the `=` debug specifier, e.g. `x=` for `f"{x=}"`.
        debug_text: Option<String>,
    },
}

/// One argument at a call site.
#[derive(Debug, Clone)]
pub enum Arg {
    Positional(Expr),
    /// `*iterable`
    Star(Expr),
    Keyword(String, Expr),
    /// `**mapping`
    DoubleStar(Expr),
}

/// `for target in iter if cond...` clause of a comprehension.
#[derive(Debug, Clone)]
pub struct Comprehension {
    pub target: Target,
    pub iter: Expr,
    pub ifs: Vec<Expr>,
}

#[derive(Debug, Clone)]
pub enum ComprehensionKind {
    List(Box<Expr>),
    Set(Box<Expr>),
    Dict(Box<Expr>, Box<Expr>),
    /// Generator expressions are evaluated eagerly into a list.
    Generator(Box<Expr>),
}

/// Entry in a dict display.
#[derive(Debug, Clone)]
pub enum DictItem {
    Pair(Expr, Expr),
    Unpack(Expr),
}

#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Value),
    Name(String),
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    Set(Vec<Expr>),
    Dict(Vec<DictItem>),
    /// `*value` inside a list, tuple or set display.
    Starred(Box<Expr>),
    FString(Vec<FStringPart>),
    Attribute {
        object: Box<Expr>,
        attr: String,
    },
    Subscript {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Slice {
        lower: Option<Box<Expr>>,
        upper: Option<Box<Expr>>,
        step: Option<Box<Expr>>,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Arg>,
    },
    /// `object.method(args)`, kept separate so methods need no bound-method allocation.
    AttrCall {
        object: Box<Expr>,
        attr: String,
        args: Vec<Arg>,
    },
    Op {
        left: Box<Expr>,
        op: Operator,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOperator,
        operand: Box<Expr>,
    },
    /// `a < b < c`: every comparator is evaluated at most once.
    Compare {
        left: Box<Expr>,
        ops: Vec<(CmpOperator, Expr)>,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    IfElse {
        test: Box<Expr>,
        body: Box<Expr>,
        orelse: Box<Expr>,
    },
    /// Walrus operator `name := value`.
    Named {
        target: String,
        value: Box<Expr>,
    },
    Lambda(Rc<FunctionDef>),
    Comprehension {
        kind: ComprehensionKind,
        generators: Vec<Comprehension>,
    },
}

/// Assignment target.
#[derive(Debug, Clone)]
pub enum Target {
    Name(String),
    Subscript { object: Expr, index: Expr },
    Attribute { object: Expr, attr: String },
    /// Tuple or list unpacking, possibly containing one starred target.
    Unpack(Vec<Target>),
    Starred(Box<Target>),
}

/// A parameter with an optional default expression.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub default: Option<Expr>,
}

/// Definition shared by `def` statements and lambdas.
#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: String,
    /// Positional-only and regular positional parameters, in order.
    pub params: Vec<Param>,
    pub var_args: Option<String>,
    pub kwonly: Vec<Param>,
    pub var_kwargs: Option<String>,
    pub body: Vec<NodeLoc>,
}

#[derive(Debug, Clone)]
pub struct ExceptHandler {
    /// `None` for a bare `except:`.
    pub exc_type: Option<Expr>,
    pub name: Option<String>,
    pub body: Vec<NodeLoc>,
}

#[derive(Debug, Clone)]
pub struct Try {
    pub body: Vec<NodeLoc>,
    pub handlers: Vec<ExceptHandler>,
    pub or_else: Vec<NodeLoc>,
    pub finally: Vec<NodeLoc>,
}

/// `import a.b as c` or `from a import b as c`.
#[derive(Debug, Clone)]
pub enum Import {
    Module { module: String, binding: String },
    From { module: String, names: Vec<(String, String)> },
}

#[derive(Debug, Clone)]
pub enum Node {
    Pass,
    Expr(Expr),
    Assign { targets: Vec<Target>, value: Expr },
    AugAssign { target: Target, op: Operator, value: Expr },
    Delete(Vec<Target>),
    If { test: Expr, body: Vec<NodeLoc>, or_else: Vec<NodeLoc> },
    For { target: Target, iter: Expr, body: Vec<NodeLoc>, or_else: Vec<NodeLoc> },
    While { test: Expr, body: Vec<NodeLoc>, or_else: Vec<NodeLoc> },
    Break,
    Continue,
    Return(Option<Expr>),
    FunctionDef(Rc<FunctionDef>),
    Raise(Option<Expr>),
    Assert { test: Expr, msg: Option<Expr> },
    Try(Box<Try>),
    With { items: Vec<(Expr, Option<Target>)>, body: Vec<NodeLoc> },
    Global(Vec<String>),
    Import(Import),
}
