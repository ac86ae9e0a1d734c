//! Type Error Definitions
//!
//! Diagnostics produced during semantic analysis. They are collected, not
//! thrown: the checker keeps walking with `void` as the placeholder type.

use crate::sema::Type;
use crate::span::Span;
use std::fmt;
use thiserror::Error;

/// A semantic diagnostic with its source span
#[derive(Debug, Clone, PartialEq)]
pub struct TypeError {
    pub kind: TypeErrorKind,
    pub span: Span,
}

impl TypeError {
    pub fn new(kind: TypeErrorKind, span: Span) -> Self {
        Self { kind, span }
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TypeErrorKind {
    #[error("undefined variable '{name}'")]
    UndefinedVariable { name: String },

    #[error("undefined function '{name}'")]
    UndefinedFunction { name: String },

    #[error("unknown type name '{name}'")]
    UndefinedType { name: String },

    #[error("'{name}' is not a function")]
    NotAFunction { name: String },

    #[error("'{name}' expects {expected} argument(s), found {found}")]
    WrongArgCount {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("argument {index} of '{name}' expects {expected}, found {found}")]
    ArgTypeMismatch {
        name: String,
        index: usize,
        expected: Type,
        found: Type,
    },

    #[error("member access on non-struct type {ty}")]
    MemberOnNonStruct { ty: Type },

    #[error("struct '{name}' has no member '{member}'")]
    UnknownMember { name: String, member: String },

    #[error("indexing non-array type {ty}")]
    IndexOnNonArray { ty: Type },

    #[error("array index must be an integer, found {ty}")]
    NonIntegerIndex { ty: Type },

    #[error("assignment to non-lvalue expression")]
    AssignToNonLvalue,
}
