//! PyNext Compiler
//!
//! An ahead-of-time compiler for PyNext, a small statically-typed,
//! expression-oriented language with Python-like surface syntax and
//! explicit `end`-delimited blocks. Source is lowered to LLVM IR and the
//! bundled driver JIT-executes the resulting `main`.
//!
//! # Architecture
//!
//! ```text
//! Source Code (.next)
//!       │
//!       ▼
//! ┌─────────────┐
//! │    Lexer    │  → Tokens
//! └─────────────┘
//!       │
//!       ▼
//! ┌─────────────┐
//! │   Parser    │  → AST
//! └─────────────┘
//!       │
//!       ▼
//! ┌─────────────┐
//! │    Sema     │  → Typed AST
//! └─────────────┘
//!       │
//!       ▼
//! ┌─────────────┐
//! │  Code Gen   │  → LLVM IR → JIT
//! └─────────────┘
//! ```
//!
//! Each stage fully consumes its input and hands an owned result to the
//! next; the only back-write is Sema filling the type slots of AST
//! expression nodes.

pub mod ast;
pub mod codegen;
pub mod lexer;
pub mod parser;
pub mod sema;
pub mod span;
pub mod token;

// Re-exports for convenience
pub use lexer::Lexer;
pub use span::{Position, Span};
pub use token::{Token, TokenKind};

/// Compiler version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// File extension for PyNext source files
pub const FILE_EXTENSION: &str = "next";
