//! Token definitions for PyNext
//!
//! This module defines all the tokens that the lexer can produce.

use crate::span::Span;
use logos::Logos;
use std::fmt;

/// A token produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// Line of the token's first byte (1-indexed)
    pub line: u32,
    /// Column of the token's first byte (1-indexed)
    pub column: u32,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span, line: u32, column: u32) -> Self {
        Self { kind, span, line, column }
    }

    /// Get the text of this token from source
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        self.span.text(source)
    }
}

/// All possible token types in PyNext
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")] // Skip whitespace
#[logos(skip r"#[^\n]*")] // Skip line comments
pub enum TokenKind {
    // ============ Literals ============

    /// Integer literal: 42
    #[regex(r"[0-9]+", priority = 2)]
    Integer,

    /// Float literal: 3.14 (requires at least one digit after the dot)
    #[regex(r"[0-9]+\.[0-9]+")]
    Float,

    /// String literal: "hello" (no escape processing)
    #[regex(r#""[^"]*""#)]
    String,

    /// Boolean literals
    #[token("true")]
    True,
    #[token("false")]
    False,

    // ============ Keywords ============

    #[token("def")]
    Def,
    #[token("end")]
    End,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("return")]
    Return,
    #[token("var")]
    Var,
    #[token("struct")]
    Struct,
    #[token("extern")]
    Extern,
    #[token("while")]
    While,

    // ============ Operators ============

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("=")]
    Equal,
    #[token("==")]
    EqualEqual,
    #[token("!=")]
    NotEqual,
    #[token("->")]
    Arrow,
    #[token("<")]
    LessThan,
    #[token(">")]
    GreaterThan,
    #[token(".")]
    Dot,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,

    // ============ Delimiters ============

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,

    // ============ Identifiers ============

    /// Identifier: foo, _bar, Point
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Identifier,

    // ============ Special ============

    /// Unrecognized byte; the parser treats this as fatal
    Error,

    /// End of file
    Eof,
}

impl TokenKind {
    /// Check if this token is a keyword
    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            TokenKind::Def
                | TokenKind::End
                | TokenKind::If
                | TokenKind::Else
                | TokenKind::Return
                | TokenKind::Var
                | TokenKind::Struct
                | TokenKind::Extern
                | TokenKind::While
                | TokenKind::True
                | TokenKind::False
        )
    }

    /// Check if this token is a literal
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            TokenKind::Integer
                | TokenKind::Float
                | TokenKind::String
                | TokenKind::True
                | TokenKind::False
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenKind::Integer => "integer",
            TokenKind::Float => "float",
            TokenKind::String => "string",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Def => "def",
            TokenKind::End => "end",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::Return => "return",
            TokenKind::Var => "var",
            TokenKind::Struct => "struct",
            TokenKind::Extern => "extern",
            TokenKind::While => "while",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Equal => "=",
            TokenKind::EqualEqual => "==",
            TokenKind::NotEqual => "!=",
            TokenKind::Arrow => "->",
            TokenKind::LessThan => "<",
            TokenKind::GreaterThan => ">",
            TokenKind::Dot => ".",
            TokenKind::Comma => ",",
            TokenKind::Colon => ":",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Identifier => "identifier",
            TokenKind::Error => "invalid token",
            TokenKind::Eof => "end of file",
        };
        write!(f, "{}", s)
    }
}
