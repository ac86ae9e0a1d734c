//! LLVM code generation for PyNext
//!
//! Walks the type-annotated AST and emits LLVM IR through inkwell: one
//! function per definition, stack slots for locals (allocas in the entry
//! block), named aggregates for structs, and heap allocation through the
//! host `malloc` for array literals. Top-level statements outside any
//! function are collected into an implicit entry function.

pub mod jit;

use std::collections::HashMap;

use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::module::Module;
use inkwell::types::{BasicMetadataTypeEnum, BasicType, BasicTypeEnum, StructType};
use inkwell::values::{
    BasicMetadataValueEnum, BasicValueEnum, FunctionValue, IntValue, PointerValue,
};
use inkwell::{AddressSpace, IntPredicate};

use crate::ast::{
    BinaryOp, Block, Expr, ExprKind, FnDecl, LiteralKind, Program, Stmt, StmtKind, StructDecl,
};
use crate::sema::Type;

/// LLVM code generator
///
/// Processes exactly one module; not reusable.
pub struct CodeGen<'ctx> {
    context: &'ctx Context,
    module: Module<'ctx>,
    builder: Builder<'ctx>,
    /// Map from variable name to its stack slot and allocated type for the
    /// current function (pointers are opaque, so the type rides along)
    named_values: HashMap<String, (PointerValue<'ctx>, BasicTypeEnum<'ctx>)>,
    /// Map from struct name to its named LLVM aggregate
    struct_types: HashMap<String, StructType<'ctx>>,
    /// Map from struct name to field-name -> index, in declaration order
    struct_field_indices: HashMap<String, HashMap<String, u32>>,
}

impl<'ctx> CodeGen<'ctx> {
    pub fn new(context: &'ctx Context, module_name: &str) -> Self {
        let module = context.create_module(module_name);
        let builder = context.create_builder();

        Self {
            context,
            module,
            builder,
            named_values: HashMap::new(),
            struct_types: HashMap::new(),
            struct_field_indices: HashMap::new(),
        }
    }

    pub fn module(&self) -> &Module<'ctx> {
        &self.module
    }

    /// Lower a whole module
    ///
    /// Top-level non-declaration statements land in an implicit entry
    /// function in source order. The entry function is named `main` unless
    /// the user defined a `main` of their own, in which case it is named
    /// `__init` and the user's `main` keeps its signature.
    pub fn generate(&mut self, program: &Program) {
        let has_user_main = program.stmts.iter().any(|stmt| {
            matches!(&stmt.kind, StmtKind::Function(decl) if decl.name == "main")
        });
        let entry_name = if has_user_main { "__init" } else { "main" };

        let fn_type = self.context.i64_type().fn_type(&[], false);
        let entry_fn = self.module.add_function(entry_name, fn_type, None);
        let entry_block = self.context.append_basic_block(entry_fn, "entry");
        self.builder.position_at_end(entry_block);

        for stmt in &program.stmts {
            self.lower_stmt(stmt);
        }

        let current = self.builder.get_insert_block().unwrap();
        if current.get_terminator().is_none() {
            let zero = self.context.i64_type().const_int(0, false);
            self.builder.build_return(Some(&zero)).unwrap();
        }
    }

    // ============ Type mapping ============

    /// Map a textual type name to an LLVM type. Arrays are raw element
    /// pointers; unknown names fall back to i64 as a last resort.
    fn llvm_type_from_name(&self, name: &str) -> BasicTypeEnum<'ctx> {
        match name {
            "int" => self.context.i64_type().into(),
            "float" => self.context.f64_type().into(),
            "bool" => self.context.bool_type().into(),
            "string" => self.context.i8_type().ptr_type(AddressSpace::default()).into(),
            _ => {
                if name.ends_with("[]") {
                    self.context.i8_type().ptr_type(AddressSpace::default()).into()
                } else if let Some(struct_ty) = self.struct_types.get(name) {
                    (*struct_ty).into()
                } else {
                    self.context.i64_type().into()
                }
            }
        }
    }

    /// Map a semantic type to an LLVM type; `None` for void
    fn llvm_type(&self, ty: &Type) -> Option<BasicTypeEnum<'ctx>> {
        match ty {
            Type::Void => None,
            Type::Int => Some(self.context.i64_type().into()),
            Type::Float => Some(self.context.f64_type().into()),
            Type::Bool => Some(self.context.bool_type().into()),
            Type::String => Some(self.context.i8_type().ptr_type(AddressSpace::default()).into()),
            Type::Array(_) => Some(self.context.i8_type().ptr_type(AddressSpace::default()).into()),
            Type::Struct(name) => Some(
                self.struct_types
                    .get(name)
                    .map(|struct_ty| (*struct_ty).into())
                    .unwrap_or_else(|| self.context.i64_type().into()),
            ),
            Type::Function { .. } => {
                Some(self.context.i8_type().ptr_type(AddressSpace::default()).into())
            }
        }
    }

    // ============ Statements ============

    fn lower_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.lower_expr(expr);
            }
            StmtKind::Return(value) => match value {
                Some(expr) => {
                    if let Some(value) = self.lower_expr(expr) {
                        self.builder.build_return(Some(&value)).unwrap();
                    }
                }
                None => {
                    self.builder.build_return(None).unwrap();
                }
            },
            StmtKind::If {
                cond,
                then_block,
                else_block,
            } => self.lower_if(cond, then_block, else_block.as_ref()),
            StmtKind::While { cond, body } => self.lower_while(cond, body),
            StmtKind::VarDecl {
                name,
                type_name,
                init,
            } => self.lower_var_decl(name, type_name.as_deref(), init.as_ref()),
            StmtKind::Function(decl) => self.lower_function(decl),
            StmtKind::Struct(decl) => self.lower_struct(decl),
        }
    }

    fn lower_block(&mut self, block: &Block) {
        for stmt in &block.stmts {
            self.lower_stmt(stmt);
        }
    }

    fn lower_function(&mut self, decl: &FnDecl) {
        let param_types: Vec<BasicMetadataTypeEnum<'ctx>> = decl
            .params
            .iter()
            .map(|(_, type_name)| self.llvm_type_from_name(type_name).into())
            .collect();
        let fn_type = match decl.return_type.as_deref() {
            None | Some("void") => self.context.void_type().fn_type(&param_types, false),
            Some(name) => self.llvm_type_from_name(name).fn_type(&param_types, false),
        };

        // Reuse an earlier prototype (extern or host declaration) if one
        // exists; otherwise add a fresh function
        let function = match self.module.get_function(&decl.name) {
            Some(existing) if existing.count_basic_blocks() == 0 => existing,
            _ => self.module.add_function(&decl.name, fn_type, None),
        };

        let body = match &decl.body {
            Some(body) => body,
            // Extern prototype: nothing further to emit
            None => return,
        };

        let saved_block = self.builder.get_insert_block();
        let saved_values = std::mem::take(&mut self.named_values);

        let entry = self.context.append_basic_block(function, "entry");
        self.builder.position_at_end(entry);

        for (index, (name, type_name)) in decl.params.iter().enumerate() {
            let param = match function.get_nth_param(index as u32) {
                Some(param) => param,
                None => break,
            };
            let ty = self.llvm_type_from_name(type_name);
            let slot = self.create_entry_block_alloca(name, ty);
            self.builder.build_store(slot, param).unwrap();
            self.named_values.insert(name.clone(), (slot, ty));
        }

        self.lower_block(body);

        // Fabricate a return if the body fell off the end
        let current = self.builder.get_insert_block().unwrap();
        if current.get_terminator().is_none() {
            match function.get_type().get_return_type() {
                None => {
                    self.builder.build_return(None).unwrap();
                }
                Some(BasicTypeEnum::IntType(int_ty)) => {
                    let zero = int_ty.const_int(0, false);
                    self.builder.build_return(Some(&zero)).unwrap();
                }
                Some(other) => {
                    let undef = undef_value(other);
                    self.builder.build_return(Some(&undef)).unwrap();
                }
            }
        }

        if !function.verify(true) {
            eprintln!("codegen: function '{}' failed IR verification", decl.name);
        }

        self.named_values = saved_values;
        if let Some(block) = saved_block {
            self.builder.position_at_end(block);
        }
    }

    fn lower_struct(&mut self, decl: &StructDecl) {
        if self.struct_types.contains_key(&decl.name) {
            return;
        }

        let field_types: Vec<BasicTypeEnum<'ctx>> = decl
            .fields
            .iter()
            .map(|(_, type_name)| self.llvm_type_from_name(type_name))
            .collect();
        let indices: HashMap<String, u32> = decl
            .fields
            .iter()
            .enumerate()
            .map(|(index, (name, _))| (name.clone(), index as u32))
            .collect();

        let struct_ty = self.context.opaque_struct_type(&decl.name);
        struct_ty.set_body(&field_types, false);

        self.struct_types.insert(decl.name.clone(), struct_ty);
        self.struct_field_indices.insert(decl.name.clone(), indices);
    }

    /// Locals always get their slot in the entry block so the address is
    /// stable for the whole function (and mem2reg can promote it)
    fn lower_var_decl(&mut self, name: &str, type_name: Option<&str>, init: Option<&Expr>) {
        let init_value = init.and_then(|expr| self.lower_expr(expr));

        let ty = match type_name {
            Some(type_name) => self.llvm_type_from_name(type_name),
            None => match init_value {
                Some(value) => value.get_type(),
                // Rejected at parse time; nothing to bind
                None => return,
            },
        };

        let slot = self.create_entry_block_alloca(name, ty);
        match init_value {
            Some(value) => {
                self.builder.build_store(slot, value).unwrap();
            }
            None => {
                self.builder.build_store(slot, ty.const_zero()).unwrap();
            }
        }

        self.named_values.insert(name.to_string(), (slot, ty));
    }

    fn lower_if(&mut self, cond: &Expr, then_block: &Block, else_block: Option<&Block>) {
        let cond_value = match self.lower_expr(cond) {
            Some(value) => self.widen_condition(value, "ifcond"),
            None => return,
        };

        let function = self.current_function();
        let then_bb = self.context.append_basic_block(function, "then");
        let else_bb = else_block.map(|_| self.context.append_basic_block(function, "else"));
        let merge_bb = self.context.append_basic_block(function, "ifcont");

        self.builder
            .build_conditional_branch(cond_value, then_bb, else_bb.unwrap_or(merge_bb))
            .unwrap();

        self.builder.position_at_end(then_bb);
        self.lower_block(then_block);
        if self
            .builder
            .get_insert_block()
            .unwrap()
            .get_terminator()
            .is_none()
        {
            self.builder.build_unconditional_branch(merge_bb).unwrap();
        }

        if let (Some(else_bb), Some(block)) = (else_bb, else_block) {
            self.builder.position_at_end(else_bb);
            self.lower_block(block);
            if self
                .builder
                .get_insert_block()
                .unwrap()
                .get_terminator()
                .is_none()
            {
                self.builder.build_unconditional_branch(merge_bb).unwrap();
            }
        }

        self.builder.position_at_end(merge_bb);
    }

    fn lower_while(&mut self, cond: &Expr, body: &Block) {
        let function = self.current_function();
        let cond_bb = self.context.append_basic_block(function, "whilecond");
        let body_bb = self.context.append_basic_block(function, "whilebody");
        let after_bb = self.context.append_basic_block(function, "afterwhile");

        self.builder.build_unconditional_branch(cond_bb).unwrap();

        self.builder.position_at_end(cond_bb);
        let cond_value = match self.lower_expr(cond) {
            Some(value) => self.widen_condition(value, "loopcond"),
            None => return,
        };
        self.builder
            .build_conditional_branch(cond_value, body_bb, after_bb)
            .unwrap();

        self.builder.position_at_end(body_bb);
        self.lower_block(body);
        if self
            .builder
            .get_insert_block()
            .unwrap()
            .get_terminator()
            .is_none()
        {
            self.builder.build_unconditional_branch(cond_bb).unwrap();
        }

        self.builder.position_at_end(after_bb);
    }

    // ============ Expressions ============

    fn lower_expr(&mut self, expr: &Expr) -> Option<BasicValueEnum<'ctx>> {
        match &expr.kind {
            ExprKind::Literal { value, kind } => Some(match kind {
                LiteralKind::Int => {
                    let n: i64 = value.parse().unwrap_or_default();
                    self.context.i64_type().const_int(n as u64, true).into()
                }
                LiteralKind::Float => {
                    let f: f64 = value.parse().unwrap_or_default();
                    self.context.f64_type().const_float(f).into()
                }
                LiteralKind::Bool => {
                    let bit = (value == "true") as u64;
                    self.context.bool_type().const_int(bit, false).into()
                }
                LiteralKind::Str => self
                    .builder
                    .build_global_string_ptr(value, "str")
                    .unwrap()
                    .as_pointer_value()
                    .into(),
            }),

            ExprKind::Variable(name) => match self.named_values.get(name).copied() {
                Some((slot, ty)) => Some(self.builder.build_load(slot, name).unwrap()),
                None => {
                    eprintln!("codegen: unknown variable '{}'", name);
                    None
                }
            },

            ExprKind::Binary {
                op: BinaryOp::Assign,
                left,
                right,
            } => {
                let addr = self.lvalue_address(left)?;
                let value = self.lower_expr(right)?;
                self.builder.build_store(addr, value).unwrap();
                // The assignment's own value is the stored value
                Some(value)
            }

            ExprKind::Binary { op, left, right } => {
                let lhs = self.lower_expr(left)?.into_int_value();
                let rhs = self.lower_expr(right)?.into_int_value();
                let value: BasicValueEnum<'ctx> = match op {
                    BinaryOp::Add => self.builder.build_int_add(lhs, rhs, "addtmp").unwrap().into(),
                    BinaryOp::Sub => self.builder.build_int_sub(lhs, rhs, "subtmp").unwrap().into(),
                    BinaryOp::Mul => self.builder.build_int_mul(lhs, rhs, "multmp").unwrap().into(),
                    BinaryOp::Div => self
                        .builder
                        .build_int_signed_div(lhs, rhs, "divtmp")
                        .unwrap()
                        .into(),
                    BinaryOp::Lt => self
                        .builder
                        .build_int_compare(IntPredicate::SLT, lhs, rhs, "cmptmp")
                        .unwrap()
                        .into(),
                    BinaryOp::Gt => self
                        .builder
                        .build_int_compare(IntPredicate::SGT, lhs, rhs, "cmptmp")
                        .unwrap()
                        .into(),
                    BinaryOp::Eq => self
                        .builder
                        .build_int_compare(IntPredicate::EQ, lhs, rhs, "cmptmp")
                        .unwrap()
                        .into(),
                    BinaryOp::Ne => self
                        .builder
                        .build_int_compare(IntPredicate::NE, lhs, rhs, "cmptmp")
                        .unwrap()
                        .into(),
                    BinaryOp::Assign => unreachable!("handled above"),
                };
                Some(value)
            }

            ExprKind::Call { callee, args } => {
                let function = self
                    .module
                    .get_function(callee)
                    .or_else(|| self.host_function(callee));
                let function = match function {
                    Some(function) => function,
                    None => {
                        eprintln!("codegen: unknown function '{}'", callee);
                        return None;
                    }
                };

                if function.count_params() as usize != args.len() {
                    eprintln!(
                        "codegen: '{}' expects {} argument(s), found {}",
                        callee,
                        function.count_params(),
                        args.len()
                    );
                    return None;
                }

                let mut arg_values: Vec<BasicMetadataValueEnum<'ctx>> =
                    Vec::with_capacity(args.len());
                for arg in args {
                    arg_values.push(self.lower_expr(arg)?.into());
                }

                let call = self
                    .builder
                    .build_call(function, &arg_values, "calltmp")
                    .unwrap();
                // Void calls carry no value
                call.try_as_basic_value().left()
            }

            ExprKind::Member { .. } | ExprKind::Index { .. } => {
                let addr = self.lvalue_address(expr)?;
                let ty = expr
                    .ty
                    .as_ref()
                    .and_then(|ty| self.llvm_type(ty))
                    .unwrap_or_else(|| self.context.i64_type().into());
                let name = match expr.kind {
                    ExprKind::Member { .. } => "memberload",
                    _ => "indexload",
                };
                Some(self.builder.build_load(addr, name).unwrap())
            }

            ExprKind::Array(elements) => self.lower_array_literal(expr, elements),
        }
    }

    /// Heap-allocate an array literal: `malloc(count * sizeof(elem))`,
    /// then store each element through a GEP. The expression's value is
    /// the array pointer. The allocation is never freed.
    fn lower_array_literal(
        &mut self,
        expr: &Expr,
        elements: &[Expr],
    ) -> Option<BasicValueEnum<'ctx>> {
        let elem_ty = match expr.ty.as_ref() {
            Some(Type::Array(elem)) => self
                .llvm_type(elem)
                .unwrap_or_else(|| self.context.i64_type().into()),
            _ => self.context.i64_type().into(),
        };

        let malloc = self.host_function("malloc")?;
        let i64_ty = self.context.i64_type();
        let elem_size = elem_ty
            .size_of()
            .unwrap_or_else(|| i64_ty.const_int(8, false));
        let count = i64_ty.const_int(elements.len() as u64, false);
        let total = self
            .builder
            .build_int_mul(elem_size, count, "arraysize")
            .unwrap();

        let call = self
            .builder
            .build_call(malloc, &[total.into()], "malloccall")
            .unwrap();
        let array_ptr = call.try_as_basic_value().left()?.into_pointer_value();
        let elem_ptr_ty = elem_ty.ptr_type(AddressSpace::default());
        let typed_array_ptr = self
            .builder
            .build_pointer_cast(array_ptr, elem_ptr_ty, "arraycast")
            .unwrap();

        for (index, element) in elements.iter().enumerate() {
            let value = match self.lower_expr(element) {
                Some(value) => value,
                None => continue,
            };
            let offset = i64_ty.const_int(index as u64, false);
            let slot = unsafe {
                self.builder
                    .build_in_bounds_gep(typed_array_ptr, &[offset], "initidx")
                    .unwrap()
            };
            self.builder.build_store(slot, value).unwrap();
        }

        Some(array_ptr.into())
    }

    // ============ Addresses ============

    /// Compute the address of a storage location. Variables come from
    /// their stack slot; members GEP the enclosing struct's address;
    /// indexing GEPs the array pointer itself (arrays are values, structs
    /// live in slots).
    fn lvalue_address(&mut self, expr: &Expr) -> Option<PointerValue<'ctx>> {
        match &expr.kind {
            ExprKind::Variable(name) => match self.named_values.get(name) {
                Some((slot, _)) => Some(*slot),
                None => {
                    eprintln!("codegen: unknown variable '{}'", name);
                    None
                }
            },

            ExprKind::Member { object, member } => {
                let base = self.lvalue_address(object)?;

                let struct_name = match object.ty.as_ref() {
                    Some(Type::Struct(name)) => name,
                    _ => {
                        eprintln!("codegen: member access on a non-struct value");
                        return None;
                    }
                };
                let struct_ty = match self.struct_types.get(struct_name) {
                    Some(struct_ty) => *struct_ty,
                    None => {
                        eprintln!("codegen: unknown struct '{}'", struct_name);
                        return None;
                    }
                };
                let index = match self
                    .struct_field_indices
                    .get(struct_name)
                    .and_then(|fields| fields.get(member))
                {
                    Some(index) => *index,
                    None => {
                        eprintln!(
                            "codegen: struct '{}' has no member '{}'",
                            struct_name, member
                        );
                        return None;
                    }
                };

                self.builder
                    .build_struct_gep(base, index, "memberaddr")
                    .ok()
            }

            ExprKind::Index { object, index } => {
                // The array is a value (the pointer), not a slot
                let array_ptr = self.lower_expr(object)?.into_pointer_value();
                let index_value = self.lower_expr(index)?.into_int_value();

                let elem_ty = match object.ty.as_ref() {
                    Some(Type::Array(elem)) => self
                        .llvm_type(elem)
                        .unwrap_or_else(|| self.context.i64_type().into()),
                    _ => {
                        eprintln!("codegen: indexing a non-array value");
                        return None;
                    }
                };

                let elem_ptr_ty = elem_ty.ptr_type(AddressSpace::default());
                let typed_array_ptr = self
                    .builder
                    .build_pointer_cast(array_ptr, elem_ptr_ty, "arraycast")
                    .unwrap();

                let addr = unsafe {
                    self.builder
                        .build_in_bounds_gep(typed_array_ptr, &[index_value], "indexaddr")
                        .unwrap()
                };
                Some(addr)
            }

            _ => {
                eprintln!("codegen: expression is not an l-value");
                None
            }
        }
    }

    // ============ Helpers ============

    fn current_function(&self) -> FunctionValue<'ctx> {
        self.builder
            .get_insert_block()
            .unwrap()
            .get_parent()
            .unwrap()
    }

    /// Allocas go at the top of the entry block so slot addresses are
    /// stable regardless of where the declaration appears
    fn create_entry_block_alloca(
        &self,
        name: &str,
        ty: BasicTypeEnum<'ctx>,
    ) -> PointerValue<'ctx> {
        let function = self.current_function();
        let entry = function.get_first_basic_block().unwrap();

        let builder = self.context.create_builder();
        match entry.get_first_instruction() {
            Some(first) => builder.position_before(&first),
            None => builder.position_at_end(entry),
        }
        builder.build_alloca(ty, name).unwrap()
    }

    /// Conditions computed as 64-bit integers are compared against zero to
    /// produce the 1-bit value a branch needs
    fn widen_condition(&self, value: BasicValueEnum<'ctx>, name: &str) -> IntValue<'ctx> {
        let value = value.into_int_value();
        if value.get_type().get_bit_width() == 64 {
            let zero = self.context.i64_type().const_int(0, false);
            self.builder
                .build_int_compare(IntPredicate::NE, value, zero, name)
                .unwrap()
        } else {
            value
        }
    }

    /// Declare a host-provided C ABI symbol on first use
    fn host_function(&self, name: &str) -> Option<FunctionValue<'ctx>> {
        if let Some(function) = self.module.get_function(name) {
            return Some(function);
        }

        let i64_ty = self.context.i64_type();
        let ptr_ty = self.context.i8_type().ptr_type(AddressSpace::default());
        let void_ty = self.context.void_type();

        match name {
            "print_int" => {
                let fn_type = void_ty.fn_type(&[i64_ty.into()], false);
                Some(self.module.add_function("print_int", fn_type, None))
            }
            "print_string" => {
                let fn_type = void_ty.fn_type(&[ptr_ty.into()], false);
                Some(self.module.add_function("print_string", fn_type, None))
            }
            "malloc" => {
                let fn_type = ptr_ty.fn_type(&[i64_ty.into()], false);
                Some(self.module.add_function("malloc", fn_type, None))
            }
            _ => None,
        }
    }
}

fn undef_value(ty: BasicTypeEnum<'_>) -> BasicValueEnum<'_> {
    match ty {
        BasicTypeEnum::ArrayType(t) => t.get_undef().into(),
        BasicTypeEnum::FloatType(t) => t.get_undef().into(),
        BasicTypeEnum::IntType(t) => t.get_undef().into(),
        BasicTypeEnum::PointerType(t) => t.get_undef().into(),
        BasicTypeEnum::StructType(t) => t.get_undef().into(),
        BasicTypeEnum::VectorType(t) => t.get_undef().into(),
    }
}
