//! Semantic analysis for PyNext
//!
//! A single walk over the module AST that resolves identifiers against a
//! scoped symbol table, registers struct and function types, and annotates
//! every expression with its semantic type. Diagnostics are collected and
//! never abort the walk; `void` stands in wherever resolution fails.

mod error;
mod ty;

pub use error::{TypeError, TypeErrorKind};
pub use ty::{StructInfo, Type};

use crate::ast::{BinaryOp, Block, Expr, ExprKind, LiteralKind, Program, Stmt, StmtKind};
use crate::span::Span;
use std::collections::HashMap;

/// The type checker
///
/// Processes exactly one module; not reusable.
pub struct TypeChecker {
    /// Currently visible bindings (module scope, plus parameters while
    /// inside a function body)
    symbols: HashMap<String, Type>,
    /// Struct registry, by declared name
    structs: HashMap<String, StructInfo>,
    errors: Vec<TypeError>,
}

impl TypeChecker {
    pub fn new() -> Self {
        let mut symbols = HashMap::new();
        // Host runtime prototypes; callable without a source-level extern
        symbols.insert(
            "print_int".to_string(),
            Type::Function {
                params: vec![Type::Int],
                ret: Box::new(Type::Void),
            },
        );
        symbols.insert(
            "print_string".to_string(),
            Type::Function {
                params: vec![Type::String],
                ret: Box::new(Type::Void),
            },
        );

        Self {
            symbols,
            structs: HashMap::new(),
            errors: Vec::new(),
        }
    }

    /// Walk the module, filling every expression's type slot. Returns the
    /// collected diagnostics; an empty vector means a clean module.
    pub fn check(&mut self, program: &mut Program) -> Vec<TypeError> {
        for stmt in &mut program.stmts {
            self.check_stmt(stmt);
        }
        std::mem::take(&mut self.errors)
    }

    /// The struct registry, as filled by the walk
    pub fn structs(&self) -> &HashMap<String, StructInfo> {
        &self.structs
    }

    fn error(&mut self, kind: TypeErrorKind, span: Span) {
        self.errors.push(TypeError::new(kind, span));
    }

    /// Resolve a textual type name: scalar keywords, then declared structs,
    /// then `T[]` array suffixes. Unknown names are diagnosed and resolve
    /// to `void`.
    fn resolve_type(&mut self, name: &str, span: Span) -> Type {
        match name {
            "void" => Type::Void,
            "int" => Type::Int,
            "float" => Type::Float,
            "bool" => Type::Bool,
            "string" => Type::String,
            _ => {
                if self.structs.contains_key(name) {
                    return Type::Struct(name.to_string());
                }
                if let Some(elem) = name.strip_suffix("[]") {
                    return Type::array_of(self.resolve_type(elem, span));
                }
                self.error(
                    TypeErrorKind::UndefinedType {
                        name: name.to_string(),
                    },
                    span,
                );
                Type::Void
            }
        }
    }

    // ============ Statements ============

    fn check_stmt(&mut self, stmt: &mut Stmt) {
        let span = stmt.span;
        match &mut stmt.kind {
            StmtKind::Expr(expr) => {
                self.check_expr(expr);
            }
            StmtKind::Return(value) => {
                if let Some(expr) = value {
                    self.check_expr(expr);
                }
            }
            StmtKind::If {
                cond,
                then_block,
                else_block,
            } => {
                self.check_expr(cond);
                self.check_block(then_block);
                if let Some(block) = else_block {
                    self.check_block(block);
                }
            }
            StmtKind::While { cond, body } => {
                self.check_expr(cond);
                self.check_block(body);
            }
            StmtKind::VarDecl {
                name,
                type_name,
                init,
            } => {
                let init_ty = init.as_mut().map(|expr| self.check_expr(expr));
                let ty = match type_name {
                    Some(type_name) => self.resolve_type(type_name, span),
                    None => init_ty.unwrap_or(Type::Void),
                };
                self.symbols.insert(name.clone(), ty);
            }
            StmtKind::Function(decl) => {
                let param_types: Vec<Type> = decl
                    .params
                    .iter()
                    .map(|(_, type_name)| self.resolve_type(type_name, span))
                    .collect();
                let ret = match &decl.return_type {
                    Some(type_name) => self.resolve_type(type_name, span),
                    None => Type::Void,
                };

                // Register before descending so recursive calls resolve
                self.symbols.insert(
                    decl.name.clone(),
                    Type::Function {
                        params: param_types.clone(),
                        ret: Box::new(ret),
                    },
                );

                if let Some(body) = &mut decl.body {
                    // Two-level scoping by whole-map snapshot: module
                    // bindings stay visible, parameters overlay them, and
                    // the restore drops everything the body introduced
                    let snapshot = self.symbols.clone();
                    for ((name, _), ty) in decl.params.iter().zip(param_types) {
                        self.symbols.insert(name.clone(), ty);
                    }
                    for stmt in &mut body.stmts {
                        self.check_stmt(stmt);
                    }
                    self.symbols = snapshot;
                }
            }
            StmtKind::Struct(decl) => {
                let fields: Vec<(String, Type)> = decl
                    .fields
                    .iter()
                    .map(|(name, type_name)| (name.clone(), self.resolve_type(type_name, span)))
                    .collect();
                self.structs.insert(
                    decl.name.clone(),
                    StructInfo {
                        name: decl.name.clone(),
                        fields,
                    },
                );
            }
        }
    }

    fn check_block(&mut self, block: &mut Block) {
        for stmt in &mut block.stmts {
            self.check_stmt(stmt);
        }
    }

    // ============ Expressions ============

    /// Annotate one expression and return its type
    fn check_expr(&mut self, expr: &mut Expr) -> Type {
        let span = expr.span;
        let ty = match &mut expr.kind {
            ExprKind::Literal { kind, .. } => match kind {
                LiteralKind::Int => Type::Int,
                LiteralKind::Float => Type::Float,
                LiteralKind::Bool => Type::Bool,
                LiteralKind::Str => Type::String,
            },
            ExprKind::Variable(name) => match self.symbols.get(name.as_str()).cloned() {
                Some(ty) => ty,
                None => {
                    let name = name.clone();
                    self.error(TypeErrorKind::UndefinedVariable { name }, span);
                    Type::Void
                }
            },
            ExprKind::Binary { op, left, right } => {
                let op = *op;
                let left_ty = self.check_expr(left);
                let right_ty = self.check_expr(right);
                if op == BinaryOp::Assign {
                    if left.is_lvalue() {
                        // Permissive: the assignment takes the type of its
                        // right side, with no compatibility check
                        right_ty
                    } else {
                        self.error(TypeErrorKind::AssignToNonLvalue, span);
                        Type::Void
                    }
                } else if left_ty == Type::Int && right_ty == Type::Int {
                    Type::Int
                } else {
                    // Permissive fallback: the left side wins
                    left_ty
                }
            }
            ExprKind::Call { callee, args } => {
                let callee = callee.clone();
                let arg_types: Vec<Type> =
                    args.iter_mut().map(|arg| self.check_expr(arg)).collect();
                match self.symbols.get(callee.as_str()).cloned() {
                    Some(Type::Function { params, ret }) => {
                        if params.len() != arg_types.len() {
                            self.error(
                                TypeErrorKind::WrongArgCount {
                                    name: callee.clone(),
                                    expected: params.len(),
                                    found: arg_types.len(),
                                },
                                span,
                            );
                        }
                        for (index, (expected, found)) in
                            params.iter().zip(&arg_types).enumerate()
                        {
                            if expected != found && !found.is_void() {
                                self.error(
                                    TypeErrorKind::ArgTypeMismatch {
                                        name: callee.clone(),
                                        index: index + 1,
                                        expected: expected.clone(),
                                        found: found.clone(),
                                    },
                                    span,
                                );
                            }
                        }
                        *ret
                    }
                    Some(_) => {
                        self.error(TypeErrorKind::NotAFunction { name: callee }, span);
                        Type::Void
                    }
                    None => {
                        self.error(TypeErrorKind::UndefinedFunction { name: callee }, span);
                        Type::Void
                    }
                }
            }
            ExprKind::Member { object, member } => {
                let member = member.clone();
                let object_ty = self.check_expr(object);
                match object_ty {
                    Type::Struct(name) => {
                        let field_ty = self
                            .structs
                            .get(&name)
                            .and_then(|info| info.field_type(&member))
                            .cloned();
                        match field_ty {
                            Some(ty) => ty,
                            None => {
                                self.error(TypeErrorKind::UnknownMember { name, member }, span);
                                Type::Void
                            }
                        }
                    }
                    ty => {
                        self.error(TypeErrorKind::MemberOnNonStruct { ty }, span);
                        Type::Void
                    }
                }
            }
            ExprKind::Index { object, index } => {
                let object_ty = self.check_expr(object);
                let index_ty = self.check_expr(index);
                if index_ty != Type::Int {
                    self.error(TypeErrorKind::NonIntegerIndex { ty: index_ty }, span);
                }
                match object_ty {
                    Type::Array(elem) => *elem,
                    ty => {
                        self.error(TypeErrorKind::IndexOnNonArray { ty }, span);
                        Type::Void
                    }
                }
            }
            ExprKind::Array(elements) => {
                let mut iter = elements.iter_mut();
                match iter.next() {
                    Some(first) => {
                        let elem_ty = self.check_expr(first);
                        for element in iter {
                            self.check_expr(element);
                        }
                        Type::array_of(elem_ty)
                    }
                    // An empty literal defaults to an integer array
                    None => Type::array_of(Type::Int),
                }
            }
        };

        expr.ty = Some(ty.clone());
        ty
    }
}

impl Default for TypeChecker {
    fn default() -> Self {
        Self::new()
    }
}
