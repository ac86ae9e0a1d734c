//! Parser for PyNext
//!
//! This is a recursive descent parser that converts tokens into an AST.
//! Statements are parsed by plain descent; binary expressions use Pratt
//! precedence climbing. A syntax error is fatal: the first error aborts
//! the parse and there is no recovery.

use crate::ast::*;
use crate::lexer::Lexer;
use crate::span::{Position, Span};
use crate::token::{Token, TokenKind};
use thiserror::Error;

/// Parser errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("{position}: expected {expected}, found {found}")]
    UnexpectedToken {
        expected: String,
        found: TokenKind,
        position: Position,
    },

    #[error("{position}: unrecognized character in input")]
    InvalidToken { position: Position },

    #[error("{position}: variable '{name}' needs a type annotation or an initializer")]
    MissingVarType { name: String, position: Position },
}

/// Parse result
pub type ParseResult<T> = Result<T, ParseError>;

/// The parser for PyNext
pub struct Parser<'src> {
    lexer: Lexer<'src>,
    current: Token,
    previous: Token,
}

impl<'src> Parser<'src> {
    /// Create a new parser
    pub fn new(source: &'src str) -> Self {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_token();
        let previous = current.clone();
        Self {
            lexer,
            current,
            previous,
        }
    }

    /// Get the source code
    pub fn source(&self) -> &'src str {
        self.lexer.source()
    }

    /// Advance to next token
    fn advance(&mut self) -> Token {
        self.previous = self.current.clone();
        self.current = self.lexer.next_token();
        self.previous.clone()
    }

    /// Check if current token matches
    fn check(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    /// Check if at end of file
    fn is_at_end(&self) -> bool {
        self.check(TokenKind::Eof)
    }

    fn position(&self) -> Position {
        Position::new(self.current.line, self.current.column)
    }

    /// Consume token if it matches, otherwise error
    fn expect(&mut self, kind: TokenKind) -> ParseResult<Token> {
        if self.check(TokenKind::Error) {
            return Err(ParseError::InvalidToken {
                position: self.position(),
            });
        }
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(ParseError::UnexpectedToken {
                expected: format!("{}", kind),
                found: self.current.kind,
                position: self.position(),
            })
        }
    }

    /// Consume token if it matches
    fn consume(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Get text of a token
    fn text(&self, token: &Token) -> &'src str {
        token.text(self.lexer.source())
    }

    // ============ Top-level parsing ============

    /// Parse a complete module
    pub fn parse_program(&mut self) -> ParseResult<Program> {
        let start = self.current.span.start;
        let mut stmts = Vec::new();

        while !self.is_at_end() {
            let stmt = match self.current.kind {
                TokenKind::Def => self.parse_function()?,
                TokenKind::Extern => self.parse_extern()?,
                TokenKind::Struct => self.parse_struct()?,
                _ => self.parse_statement()?,
            };
            stmts.push(stmt);
        }

        let end = self.previous.span.end.max(start);
        Ok(Program {
            stmts,
            span: Span::new(start, end),
        })
    }

    // ============ Declarations ============

    fn parse_function(&mut self) -> ParseResult<Stmt> {
        let start = self.current.span.start;
        self.expect(TokenKind::Def)?;
        let name = self.parse_ident()?;

        self.expect(TokenKind::LParen)?;
        let params = self.parse_params()?;
        self.expect(TokenKind::RParen)?;

        let return_type = if self.consume(TokenKind::Arrow) {
            Some(self.parse_type_name()?)
        } else {
            None
        };

        let body = self.parse_block()?;
        self.expect(TokenKind::End)?;

        let span = Span::new(start, self.previous.span.end);
        Ok(Stmt {
            kind: StmtKind::Function(FnDecl {
                name,
                params,
                return_type,
                body: Some(body),
                span,
            }),
            span,
        })
    }

    /// Parse an extern prototype: no body, no `end`
    fn parse_extern(&mut self) -> ParseResult<Stmt> {
        let start = self.current.span.start;
        self.expect(TokenKind::Extern)?;
        self.expect(TokenKind::Def)?;
        let name = self.parse_ident()?;

        self.expect(TokenKind::LParen)?;
        let params = self.parse_params()?;
        self.expect(TokenKind::RParen)?;

        let return_type = if self.consume(TokenKind::Arrow) {
            Some(self.parse_type_name()?)
        } else {
            None
        };

        let span = Span::new(start, self.previous.span.end);
        Ok(Stmt {
            kind: StmtKind::Function(FnDecl {
                name,
                params,
                return_type,
                body: None,
                span,
            }),
            span,
        })
    }

    fn parse_params(&mut self) -> ParseResult<Vec<(String, String)>> {
        let mut params = Vec::new();

        if !self.check(TokenKind::RParen) {
            loop {
                let name = self.parse_ident()?;
                self.expect(TokenKind::Colon)?;
                let type_name = self.parse_type_name()?;
                params.push((name, type_name));
                if !self.consume(TokenKind::Comma) {
                    break;
                }
            }
        }

        Ok(params)
    }

    fn parse_struct(&mut self) -> ParseResult<Stmt> {
        let start = self.current.span.start;
        self.expect(TokenKind::Struct)?;
        let name = self.parse_ident()?;

        let mut fields = Vec::new();
        while !self.check(TokenKind::End) && !self.is_at_end() {
            let field_name = self.parse_ident()?;
            self.expect(TokenKind::Colon)?;
            let type_name = self.parse_type_name()?;
            fields.push((field_name, type_name));
        }
        self.expect(TokenKind::End)?;

        let span = Span::new(start, self.previous.span.end);
        Ok(Stmt {
            kind: StmtKind::Struct(StructDecl { name, fields, span }),
            span,
        })
    }

    // ============ Statements ============

    /// Parse statements up to the next `end`, `else`, or end of file;
    /// the terminator itself is left for the caller
    fn parse_block(&mut self) -> ParseResult<Block> {
        let start = self.current.span.start;
        let mut stmts = Vec::new();

        while !self.check(TokenKind::End) && !self.check(TokenKind::Else) && !self.is_at_end() {
            stmts.push(self.parse_statement()?);
        }

        let end = self.previous.span.end.max(start);
        Ok(Block {
            stmts,
            span: Span::new(start, end),
        })
    }

    fn parse_statement(&mut self) -> ParseResult<Stmt> {
        let start = self.current.span.start;

        if self.consume(TokenKind::Return) {
            // A bare `return` is only valid where the block ends
            let value = if self.check(TokenKind::End)
                || self.check(TokenKind::Else)
                || self.is_at_end()
            {
                None
            } else {
                Some(self.parse_expr()?)
            };
            let span = Span::new(start, self.previous.span.end);
            return Ok(Stmt {
                kind: StmtKind::Return(value),
                span,
            });
        }

        if self.consume(TokenKind::If) {
            let cond = self.parse_expr()?;
            let then_block = self.parse_block()?;
            let else_block = if self.consume(TokenKind::Else) {
                Some(self.parse_block()?)
            } else {
                None
            };
            self.expect(TokenKind::End)?;
            let span = Span::new(start, self.previous.span.end);
            return Ok(Stmt {
                kind: StmtKind::If {
                    cond,
                    then_block,
                    else_block,
                },
                span,
            });
        }

        if self.consume(TokenKind::While) {
            let cond = self.parse_expr()?;
            let body = self.parse_block()?;
            self.expect(TokenKind::End)?;
            let span = Span::new(start, self.previous.span.end);
            return Ok(Stmt {
                kind: StmtKind::While { cond, body },
                span,
            });
        }

        if self.consume(TokenKind::Var) {
            let name = self.parse_ident()?;

            let type_name = if self.consume(TokenKind::Colon) {
                Some(self.parse_type_name()?)
            } else {
                None
            };

            let init = if self.consume(TokenKind::Equal) {
                Some(self.parse_expr()?)
            } else {
                None
            };

            if type_name.is_none() && init.is_none() {
                return Err(ParseError::MissingVarType {
                    name,
                    position: self.position(),
                });
            }

            let span = Span::new(start, self.previous.span.end);
            return Ok(Stmt {
                kind: StmtKind::VarDecl {
                    name,
                    type_name,
                    init,
                },
                span,
            });
        }

        // Fallback: expression statement
        let expr = self.parse_expr()?;
        let span = expr.span;
        Ok(Stmt {
            kind: StmtKind::Expr(expr),
            span,
        })
    }

    fn parse_ident(&mut self) -> ParseResult<String> {
        let token = self.expect(TokenKind::Identifier)?;
        Ok(self.text(&token).to_string())
    }

    /// Parse a type name: an identifier followed by zero or more `[]`
    /// pairs, kept textual (`int`, `Point[]`, `int[][]`) for later
    /// resolution
    fn parse_type_name(&mut self) -> ParseResult<String> {
        let mut name = self.parse_ident()?;
        while self.consume(TokenKind::LBracket) {
            self.expect(TokenKind::RBracket)?;
            name.push_str("[]");
        }
        Ok(name)
    }

    // ============ Expression parsing ============

    pub fn parse_expr(&mut self) -> ParseResult<Expr> {
        let lhs = self.parse_primary()?;
        self.parse_binary(0, lhs)
    }

    /// Precedence climbing loop. Left-associative operators take their
    /// right operand at `prec + 1`; assignment is right-associative and
    /// takes it at `prec`.
    fn parse_binary(&mut self, min_prec: u8, mut lhs: Expr) -> ParseResult<Expr> {
        loop {
            let prec = match binary_precedence(self.current.kind) {
                Some(prec) if prec >= min_prec => prec,
                _ => return Ok(lhs),
            };
            let op = binary_op(self.current.kind);
            self.advance();

            let mut rhs = self.parse_primary()?;
            if let Some(next_prec) = binary_precedence(self.current.kind) {
                let right_assoc = op == BinaryOp::Assign;
                if next_prec > prec || (right_assoc && next_prec == prec) {
                    let min = if right_assoc { prec } else { prec + 1 };
                    rhs = self.parse_binary(min, rhs)?;
                }
            }

            let span = lhs.span.merge(rhs.span);
            lhs = Expr::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(lhs),
                    right: Box::new(rhs),
                },
                span,
            );
        }
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let start = self.current.span.start;

        let mut expr = match self.current.kind {
            TokenKind::Integer => {
                let token = self.advance();
                Expr::new(
                    ExprKind::Literal {
                        value: self.text(&token).to_string(),
                        kind: LiteralKind::Int,
                    },
                    token.span,
                )
            }
            TokenKind::Float => {
                let token = self.advance();
                Expr::new(
                    ExprKind::Literal {
                        value: self.text(&token).to_string(),
                        kind: LiteralKind::Float,
                    },
                    token.span,
                )
            }
            TokenKind::True | TokenKind::False => {
                let token = self.advance();
                Expr::new(
                    ExprKind::Literal {
                        value: self.text(&token).to_string(),
                        kind: LiteralKind::Bool,
                    },
                    token.span,
                )
            }
            TokenKind::String => {
                let token = self.advance();
                let text = self.text(&token);
                // The token slice includes the quotes; the literal does not
                Expr::new(
                    ExprKind::Literal {
                        value: text[1..text.len() - 1].to_string(),
                        kind: LiteralKind::Str,
                    },
                    token.span,
                )
            }
            TokenKind::Identifier => {
                let token = self.advance();
                let name = self.text(&token).to_string();
                if self.consume(TokenKind::LParen) {
                    let args = self.parse_args()?;
                    self.expect(TokenKind::RParen)?;
                    Expr::new(
                        ExprKind::Call { callee: name, args },
                        Span::new(start, self.previous.span.end),
                    )
                } else {
                    Expr::new(ExprKind::Variable(name), token.span)
                }
            }
            TokenKind::LBracket => {
                self.advance();
                let mut elements = Vec::new();
                if !self.check(TokenKind::RBracket) {
                    loop {
                        elements.push(self.parse_expr()?);
                        if !self.consume(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RBracket)?;
                Expr::new(
                    ExprKind::Array(elements),
                    Span::new(start, self.previous.span.end),
                )
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                inner
            }
            TokenKind::Error => {
                return Err(ParseError::InvalidToken {
                    position: self.position(),
                });
            }
            found => {
                return Err(ParseError::UnexpectedToken {
                    expected: "expression".to_string(),
                    found,
                    position: self.position(),
                });
            }
        };

        // Postfix chains: member access and indexing
        loop {
            if self.consume(TokenKind::Dot) {
                let member = self.parse_ident()?;
                expr = Expr::new(
                    ExprKind::Member {
                        object: Box::new(expr),
                        member,
                    },
                    Span::new(start, self.previous.span.end),
                );
            } else if self.consume(TokenKind::LBracket) {
                let index = self.parse_expr()?;
                self.expect(TokenKind::RBracket)?;
                expr = Expr::new(
                    ExprKind::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                    },
                    Span::new(start, self.previous.span.end),
                );
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn parse_args(&mut self) -> ParseResult<Vec<Expr>> {
        let mut args = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                args.push(self.parse_expr()?);
                if !self.consume(TokenKind::Comma) {
                    break;
                }
            }
        }
        Ok(args)
    }
}

/// Binding strength of a binary operator token, lowest (assignment) to
/// highest (multiplicative); `None` for tokens that end an expression
fn binary_precedence(kind: TokenKind) -> Option<u8> {
    match kind {
        TokenKind::Equal => Some(1),
        TokenKind::EqualEqual | TokenKind::NotEqual => Some(2),
        TokenKind::LessThan | TokenKind::GreaterThan => Some(3),
        TokenKind::Plus | TokenKind::Minus => Some(4),
        TokenKind::Star | TokenKind::Slash => Some(5),
        _ => None,
    }
}

fn binary_op(kind: TokenKind) -> BinaryOp {
    match kind {
        TokenKind::Equal => BinaryOp::Assign,
        TokenKind::EqualEqual => BinaryOp::Eq,
        TokenKind::NotEqual => BinaryOp::Ne,
        TokenKind::LessThan => BinaryOp::Lt,
        TokenKind::GreaterThan => BinaryOp::Gt,
        TokenKind::Plus => BinaryOp::Add,
        TokenKind::Minus => BinaryOp::Sub,
        TokenKind::Star => BinaryOp::Mul,
        TokenKind::Slash => BinaryOp::Div,
        _ => unreachable!("not a binary operator: {:?}", kind),
    }
}

/// Parse a source module
pub fn parse(source: &str) -> Result<Program, ParseError> {
    Parser::new(source).parse_program()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Program {
        parse(source).expect("parse failed")
    }

    fn single_expr(source: &str) -> Expr {
        let program = parse_ok(source);
        assert_eq!(program.stmts.len(), 1);
        match program.stmts.into_iter().next().unwrap().kind {
            StmtKind::Expr(expr) => expr,
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    /// Render an expression as a fully parenthesized string
    fn render(expr: &Expr) -> String {
        match &expr.kind {
            ExprKind::Literal { value, .. } => value.clone(),
            ExprKind::Variable(name) => name.clone(),
            ExprKind::Binary { op, left, right } => {
                format!("({} {} {})", render(left), op.as_str(), render(right))
            }
            ExprKind::Call { callee, args } => {
                let args: Vec<_> = args.iter().map(render).collect();
                format!("{}({})", callee, args.join(", "))
            }
            ExprKind::Member { object, member } => format!("{}.{}", render(object), member),
            ExprKind::Index { object, index } => {
                format!("{}[{}]", render(object), render(index))
            }
            ExprKind::Array(elements) => {
                let elements: Vec<_> = elements.iter().map(render).collect();
                format!("[{}]", elements.join(", "))
            }
        }
    }

    #[test]
    fn test_precedence_mul_over_add() {
        assert_eq!(render(&single_expr("2 + 3 * 4")), "(2 + (3 * 4))");
        assert_eq!(render(&single_expr("2 * 3 + 4")), "((2 * 3) + 4)");
    }

    #[test]
    fn test_precedence_comparison_and_equality() {
        assert_eq!(render(&single_expr("a + 1 < b * 2")), "((a + 1) < (b * 2))");
        assert_eq!(render(&single_expr("a < b == c > d")), "((a < b) == (c > d))");
    }

    #[test]
    fn test_left_associativity() {
        assert_eq!(render(&single_expr("1 - 2 - 3")), "((1 - 2) - 3)");
        assert_eq!(render(&single_expr("8 / 4 / 2")), "((8 / 4) / 2)");
    }

    #[test]
    fn test_assignment_is_right_associative() {
        assert_eq!(render(&single_expr("a = b = c")), "(a = (b = c))");
        assert_eq!(render(&single_expr("x = y + 1")), "(x = (y + 1))");
    }

    #[test]
    fn test_grouping() {
        assert_eq!(render(&single_expr("(2 + 3) * 4")), "((2 + 3) * 4)");
    }

    #[test]
    fn test_postfix_chains() {
        assert_eq!(render(&single_expr("p.pos.x")), "p.pos.x");
        assert_eq!(render(&single_expr("m[i][j]")), "m[i][j]");
        assert_eq!(render(&single_expr("a[i].x")), "a[i].x");
        assert_eq!(render(&single_expr("p.items[0]")), "p.items[0]");
    }

    #[test]
    fn test_call_with_expression_args() {
        assert_eq!(
            render(&single_expr("f(1 + 2, g(x), a[0])")),
            "f((1 + 2), g(x), a[0])"
        );
    }

    #[test]
    fn test_string_literal_drops_quotes() {
        let expr = single_expr(r#""hello world""#);
        match expr.kind {
            ExprKind::Literal { value, kind } => {
                assert_eq!(kind, LiteralKind::Str);
                assert_eq!(value, "hello world");
            }
            other => panic!("expected literal, got {:?}", other),
        }
    }

    #[test]
    fn test_array_literal() {
        assert_eq!(render(&single_expr("[10, 20, 30]")), "[10, 20, 30]");
        assert_eq!(render(&single_expr("[]")), "[]");
    }

    #[test]
    fn test_function_definition() {
        let program = parse_ok("def add(a: int, b: int) -> int return a + b end");
        match &program.stmts[0].kind {
            StmtKind::Function(decl) => {
                assert_eq!(decl.name, "add");
                assert_eq!(
                    decl.params,
                    vec![
                        ("a".to_string(), "int".to_string()),
                        ("b".to_string(), "int".to_string())
                    ]
                );
                assert_eq!(decl.return_type.as_deref(), Some("int"));
                assert_eq!(decl.body.as_ref().unwrap().stmts.len(), 1);
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_function_without_arrow_is_void() {
        let program = parse_ok("def noop() end");
        match &program.stmts[0].kind {
            StmtKind::Function(decl) => {
                assert!(decl.return_type.is_none());
                assert!(decl.body.is_some());
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_extern_has_no_body_and_no_end() {
        let program = parse_ok("extern def print_int(val: int)\ndef main() end");
        match &program.stmts[0].kind {
            StmtKind::Function(decl) => {
                assert_eq!(decl.name, "print_int");
                assert!(decl.body.is_none());
            }
            other => panic!("expected extern function, got {:?}", other),
        }
        assert!(matches!(program.stmts[1].kind, StmtKind::Function(_)));
    }

    #[test]
    fn test_struct_declaration() {
        let program = parse_ok("struct Point x: int y: int end");
        match &program.stmts[0].kind {
            StmtKind::Struct(decl) => {
                assert_eq!(decl.name, "Point");
                assert_eq!(
                    decl.fields,
                    vec![
                        ("x".to_string(), "int".to_string()),
                        ("y".to_string(), "int".to_string())
                    ]
                );
            }
            other => panic!("expected struct, got {:?}", other),
        }
    }

    #[test]
    fn test_array_type_names() {
        let program = parse_ok("var a: int[] = [1]\nvar m: int[][] = []\nvar p: Point[] = []");
        let names: Vec<_> = program
            .stmts
            .iter()
            .map(|s| match &s.kind {
                StmtKind::VarDecl { type_name, .. } => type_name.clone().unwrap(),
                other => panic!("expected var decl, got {:?}", other),
            })
            .collect();
        assert_eq!(names, vec!["int[]", "int[][]", "Point[]"]);
    }

    #[test]
    fn test_var_requires_type_or_initializer() {
        assert!(matches!(
            parse("var x"),
            Err(ParseError::MissingVarType { .. })
        ));
        assert!(parse("var x: int").is_ok());
        assert!(parse("var x = 1").is_ok());
        assert!(parse("var x: int = 1").is_ok());
    }

    #[test]
    fn test_if_else() {
        let program = parse_ok("if x < 1 return 1 else return 2 end");
        match &program.stmts[0].kind {
            StmtKind::If {
                then_block,
                else_block,
                ..
            } => {
                assert_eq!(then_block.stmts.len(), 1);
                assert_eq!(else_block.as_ref().unwrap().stmts.len(), 1);
            }
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn test_if_without_else() {
        let program = parse_ok("if x > 0 x = x - 1 end");
        match &program.stmts[0].kind {
            StmtKind::If { else_block, .. } => assert!(else_block.is_none()),
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn test_while_loop() {
        let program = parse_ok("while i < 5 i = i + 1 end");
        match &program.stmts[0].kind {
            StmtKind::While { body, .. } => assert_eq!(body.stmts.len(), 1),
            other => panic!("expected while, got {:?}", other),
        }
    }

    #[test]
    fn test_bare_return_before_end() {
        let program = parse_ok("def f() return end");
        match &program.stmts[0].kind {
            StmtKind::Function(decl) => {
                let body = decl.body.as_ref().unwrap();
                assert!(matches!(body.stmts[0].kind, StmtKind::Return(None)));
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_bare_return_before_else() {
        let program = parse_ok("def f(x: int) if x > 0 return else return end end");
        assert!(matches!(program.stmts[0].kind, StmtKind::Function(_)));
    }

    #[test]
    fn test_top_level_statements_mix_with_declarations() {
        let program = parse_ok("var x = 1\ndef f() end\nx = 2\nstruct S a: int end");
        assert_eq!(program.stmts.len(), 4);
        assert!(matches!(program.stmts[0].kind, StmtKind::VarDecl { .. }));
        assert!(matches!(program.stmts[1].kind, StmtKind::Function(_)));
        assert!(matches!(program.stmts[2].kind, StmtKind::Expr(_)));
        assert!(matches!(program.stmts[3].kind, StmtKind::Struct(_)));
    }

    #[test]
    fn test_unexpected_token_is_fatal() {
        assert!(matches!(
            parse("def f( end"),
            Err(ParseError::UnexpectedToken { .. })
        ));
        assert!(matches!(
            parse("struct P x int end"),
            Err(ParseError::UnexpectedToken { .. })
        ));
    }

    #[test]
    fn test_lexical_error_is_fatal() {
        assert!(matches!(
            parse("var x = @"),
            Err(ParseError::InvalidToken { .. })
        ));
    }

    #[test]
    fn test_error_position_is_reported() {
        let err = parse("def f(\n    x int\n) end").unwrap_err();
        match err {
            ParseError::UnexpectedToken { position, .. } => {
                assert_eq!(position.line, 2);
            }
            other => panic!("expected unexpected token error, got {:?}", other),
        }
    }
}
