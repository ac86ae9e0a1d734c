//! Lexer for PyNext
//!
//! The lexer converts source code into a stream of tokens. Token recognition
//! is driven by the `logos` crate; this wrapper adds 1-based line/column
//! tracking and a sticky end-of-file token.

use crate::span::Span;
use crate::token::{Token, TokenKind};
use logos::Logos;

/// The lexer for PyNext
pub struct Lexer<'src> {
    source: &'src str,
    inner: logos::Lexer<'src, TokenKind>,
    /// Byte offset up to which line/column have been accounted
    scanned: usize,
    line: u32,
    column: u32,
    /// Set once the underlying stream is exhausted; EOF is sticky
    at_eof: bool,
}

impl<'src> Lexer<'src> {
    /// Create a new lexer for the given source code
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            inner: TokenKind::lexer(source),
            scanned: 0,
            line: 1,
            column: 1,
            at_eof: false,
        }
    }

    /// Get the source code
    pub fn source(&self) -> &'src str {
        self.source
    }

    /// Advance the line/column counters over `source[self.scanned..to]`.
    fn track_position(&mut self, to: usize) {
        for byte in self.source[self.scanned..to].bytes() {
            if byte == b'\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.scanned = to;
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Token {
        if self.at_eof {
            return self.eof_token();
        }

        match self.inner.next() {
            Some(result) => {
                let span = self.inner.span();
                self.track_position(span.start);
                let (line, column) = (self.line, self.column);
                self.track_position(span.end);
                let kind = match result {
                    Ok(kind) => kind,
                    Err(()) => TokenKind::Error,
                };
                Token::new(kind, Span::new(span.start, span.end), line, column)
            }
            None => {
                self.at_eof = true;
                self.eof_token()
            }
        }
    }

    fn eof_token(&mut self) -> Token {
        let end = self.source.len();
        self.track_position(end);
        Token::new(TokenKind::Eof, Span::new(end, end), self.line, self.column)
    }

    /// Collect all tokens into a vector, ending with the EOF token
    pub fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        tokens
    }
}

impl<'src> Iterator for Lexer<'src> {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        let token = self.next_token();
        if token.kind == TokenKind::Eof {
            None
        } else {
            Some(token)
        }
    }
}

/// Helper function to lex source code
pub fn lex(source: &str) -> Vec<Token> {
    Lexer::new(source).tokenize()
}
