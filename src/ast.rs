//! Abstract Syntax Tree (AST) for PyNext
//!
//! The AST represents the structure of a PyNext module after parsing.
//! Every expression node carries a semantic-type slot (`ty`) that is `None`
//! after parsing and filled in by the type checker.

use crate::sema::Type;
use crate::span::Span;

/// A complete PyNext module (compilation unit)
#[derive(Debug, Clone)]
pub struct Program {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

/// A statement
#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    /// Expression statement: `print_int(x)`
    Expr(Expr),

    /// Return statement: `return x` or a bare `return`
    Return(Option<Expr>),

    /// Conditional: `if cond ... [else ...] end`
    If {
        cond: Expr,
        then_block: Block,
        else_block: Option<Block>,
    },

    /// Loop: `while cond ... end`
    While { cond: Expr, body: Block },

    /// Variable declaration: `var x: int = 0`
    ///
    /// At least one of `type_name` and `init` is present; the parser rejects
    /// a declaration with neither.
    VarDecl {
        name: String,
        type_name: Option<String>,
        init: Option<Expr>,
    },

    /// Function definition or extern prototype
    Function(FnDecl),

    /// Struct declaration
    Struct(StructDecl),
}

/// A sequence of statements, terminated by `end`, `else`, or end of file
/// (the terminator is not part of the block)
#[derive(Debug, Clone)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

/// Function definition: `def f(a: int) -> int ... end`
///
/// A declaration without a body is an extern prototype
/// (`extern def f(a: int) -> int`). A `None` return type means void.
#[derive(Debug, Clone)]
pub struct FnDecl {
    pub name: String,
    /// Parameter (name, type name) pairs
    pub params: Vec<(String, String)>,
    pub return_type: Option<String>,
    pub body: Option<Block>,
    pub span: Span,
}

/// Struct declaration: `struct Point x: int y: int end`
///
/// Field index is declaration order; the type checker and the code
/// generator both rely on this.
#[derive(Debug, Clone)]
pub struct StructDecl {
    pub name: String,
    /// Field (name, type name) pairs in declaration order
    pub fields: Vec<(String, String)>,
    pub span: Span,
}

/// An expression
#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
    /// Semantic type, filled in by the type checker
    pub ty: Option<Type>,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span, ty: None }
    }

    /// Whether this expression denotes a storage location (can appear on
    /// the left of `=`)
    pub fn is_lvalue(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Variable(_) | ExprKind::Member { .. } | ExprKind::Index { .. }
        )
    }
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    /// Literal: `42`, `3.14`, `true`, `"hi"`
    Literal { value: String, kind: LiteralKind },

    /// Variable reference: `x`
    Variable(String),

    /// Binary expression: `a + b`; assignment is parsed as a binary
    /// expression whose left side must be an l-value
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Function call: `f(a, b)`
    Call { callee: String, args: Vec<Expr> },

    /// Member access: `p.x`
    Member { object: Box<Expr>, member: String },

    /// Index access: `a[i]`
    Index { object: Box<Expr>, index: Box<Expr> },

    /// Array literal: `[1, 2, 3]`
    Array(Vec<Expr>),
}

/// Which kind of literal an `ExprKind::Literal` holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    Int,
    Float,
    Bool,
    Str,
}

/// Binary operators, lowest to highest precedence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Assign,
    Eq,
    Ne,
    Lt,
    Gt,
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Assign => "=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        }
    }
}
