// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! The type checker implementation.

use std::collections::HashMap;

use solar_ast::expr::{BinOp, Expr, ExprKind};
use solar_ast::stmt::{FnDecl, Stmt, StmtKind};
use solar_ast::{NodeId, Span, Type};
use solar_stdlib::{Builtin, BuiltinRegistry};

/// The signature of a user-defined function.
#[derive(Debug, Clone)]
pub struct FnSig {
    pub params: Vec<Type>,
    pub ret: Type,
}

/// Result of a successful check: the inferred type of every expression node.
#[derive(Debug, Default)]
pub struct TypedProgram {
    pub node_types: HashMap<NodeId, Type>,
}

/// The Solar type checker.
///
/// Scopes form a stack of name → type maps. Blocks, functions, and `para`
/// loops push a scope on entry and pop it on exit.
pub struct TypeChecker<'a> {
    registry: &'a BuiltinRegistry,
    scopes: Vec<HashMap<String, Type>>,
    funcs: HashMap<String, FnSig>,
    /// Declared return types of the functions being checked, innermost last.
    ret_stack: Vec<Type>,
    node_types: HashMap<NodeId, Type>,
}

impl<'a> TypeChecker<'a> {
    pub fn new(registry: &'a BuiltinRegistry) -> Self {
        Self {
            registry,
            scopes: vec![HashMap::new()],
            funcs: HashMap::new(),
            ret_stack: Vec::new(),
            node_types: HashMap::new(),
        }
    }

    /// Checks a full program, halting on the first error.
    pub fn check(mut self, stmts: &[Stmt]) -> Result<TypedProgram, TypeError> {
        // First pass: collect top-level function signatures so calls may
        // precede declarations. Function names must be unique.
        for stmt in stmts {
            if let StmtKind::Fn(decl) = &stmt.kind {
                let sig = FnSig {
                    params: decl.params.iter().map(|p| p.ty).collect(),
                    ret: decl.ret_ty,
                };
                if self.funcs.insert(decl.name.clone(), sig).is_some() {
                    return Err(TypeError::DuplicateFunction {
                        name: decl.name.clone(),
                        span: stmt.span,
                    });
                }
            }
        }

        for stmt in stmts {
            self.infer_stmt(stmt)?;
        }

        Ok(TypedProgram { node_types: self.node_types })
    }

    fn in_scope<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, TypeError>,
    ) -> Result<T, TypeError> {
        self.scopes.push(HashMap::new());
        let result = f(self);
        self.scopes.pop();
        result
    }

    fn lookup_var(&self, name: &str) -> Option<Type> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name).copied())
    }

    fn bind_var(&mut self, name: &str, ty: Type) {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(slot) = scope.get_mut(name) {
                *slot = ty;
                return;
            }
        }
        if let Some(innermost) = self.scopes.last_mut() {
            innermost.insert(name.to_string(), ty);
        }
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn infer_stmt(&mut self, stmt: &Stmt) -> Result<Type, TypeError> {
        match &stmt.kind {
            StmtKind::Expr(expr) => self.infer_expr(expr),

            StmtKind::Assign { name, ty, value } => {
                let value_ty = self.infer_expr(value)?;

                match self.lookup_var(name) {
                    Some(bound) => {
                        // An identifier has exactly one type for its lifetime
                        if let Some(annotated) = ty {
                            if *annotated != bound {
                                return Err(TypeError::AnnotationMismatch {
                                    name: name.clone(),
                                    annotated: *annotated,
                                    found: bound,
                                    span: stmt.span,
                                });
                            }
                        }
                        if value_ty != bound {
                            return Err(TypeError::ReassignMismatch {
                                name: name.clone(),
                                bound,
                                found: value_ty,
                                span: stmt.span,
                            });
                        }
                        Ok(bound)
                    }
                    None => {
                        let bound = match ty {
                            Some(annotated) => {
                                if *annotated != value_ty {
                                    return Err(TypeError::AnnotationMismatch {
                                        name: name.clone(),
                                        annotated: *annotated,
                                        found: value_ty,
                                        span: stmt.span,
                                    });
                                }
                                *annotated
                            }
                            None => value_ty,
                        };
                        self.bind_var(name, bound);
                        Ok(bound)
                    }
                }
            }

            StmtKind::If { cond, then_block, else_block } => {
                self.check_condition(cond, "se")?;
                self.infer_block(then_block)?;
                if let Some(else_block) = else_block {
                    self.infer_block(else_block)?;
                }
                Ok(Type::Void)
            }

            StmtKind::While { cond, body } => {
                self.check_condition(cond, "enquanto")?;
                self.infer_block(body)?;
                Ok(Type::Void)
            }

            StmtKind::For { init, cond, step, body } => self.in_scope(|this| {
                if let Some(init) = init {
                    this.infer_stmt(init)?;
                }
                if let Some(cond) = cond {
                    this.check_condition(cond, "para")?;
                }
                this.infer_block(body)?;
                if let Some(step) = step {
                    this.infer_stmt(step)?;
                }
                Ok(Type::Void)
            }),

            StmtKind::Fn(decl) => self.check_fn_decl(decl, stmt.span),

            StmtKind::Return(value) => {
                let declared = match self.ret_stack.last() {
                    Some(ty) => *ty,
                    None => return Err(TypeError::ReturnOutsideFunction { span: stmt.span }),
                };
                let found = match value {
                    Some(expr) => self.infer_expr(expr)?,
                    None => Type::Void,
                };
                if found != declared {
                    return Err(TypeError::ReturnMismatch {
                        expected: declared,
                        found,
                        span: stmt.span,
                    });
                }
                Ok(Type::Void)
            }

            // Imports were spliced away by the resolver
            StmtKind::Import(_) => Ok(Type::Void),
        }
    }

    fn infer_block(&mut self, stmts: &[Stmt]) -> Result<Type, TypeError> {
        self.in_scope(|this| {
            let mut last = Type::Void;
            for stmt in stmts {
                last = this.infer_stmt(stmt)?;
            }
            Ok(last)
        })
    }

    fn check_fn_decl(&mut self, decl: &FnDecl, span: Span) -> Result<Type, TypeError> {
        self.ret_stack.push(decl.ret_ty);
        let body_ty = self.in_scope(|this| {
            for param in &decl.params {
                this.bind_var(&param.name, param.ty);
            }
            this.infer_block(&decl.body)
        });
        self.ret_stack.pop();
        let body_ty = body_ty?;

        // Non-void functions without an explicit return fall back to the
        // body's final expression, which must match the declared type.
        if decl.ret_ty != Type::Void && !has_return(&decl.body) && body_ty != decl.ret_ty {
            return Err(TypeError::ImplicitReturnMismatch {
                func: decl.name.clone(),
                expected: decl.ret_ty,
                found: body_ty,
                span,
            });
        }

        Ok(Type::Void)
    }

    fn check_condition(&mut self, cond: &Expr, construct: &'static str) -> Result<(), TypeError> {
        let ty = self.infer_expr(cond)?;
        if !matches!(ty, Type::Boolean | Type::Integer) {
            return Err(TypeError::Condition { construct, found: ty, span: cond.span });
        }
        Ok(())
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn infer_expr(&mut self, expr: &Expr) -> Result<Type, TypeError> {
        let ty = match &expr.kind {
            ExprKind::Int(_) => Type::Integer,
            ExprKind::Float(_) => Type::Decimal,
            ExprKind::Bool(_) => Type::Boolean,
            ExprKind::Str(_) => Type::Text,

            ExprKind::Var(name) => self
                .lookup_var(name)
                .ok_or_else(|| TypeError::UndefinedVariable {
                    name: name.clone(),
                    span: expr.span,
                })?,

            ExprKind::Binary { op, left, right } => {
                let lt = self.infer_expr(left)?;
                let rt = self.infer_expr(right)?;
                self.check_binary(*op, lt, rt, expr.span)?
            }

            ExprKind::Call { callee, args } => self.check_call(callee, args, expr.span)?,
        };

        self.node_types.insert(expr.id, ty);
        Ok(ty)
    }

    fn check_binary(&self, op: BinOp, lt: Type, rt: Type, span: Span) -> Result<Type, TypeError> {
        if op.is_arithmetic() {
            // Both operands numeric and of the same type; no coercion
            if !lt.is_numeric() || !rt.is_numeric() || lt != rt {
                return Err(TypeError::ArithmeticOperands { op, left: lt, right: rt, span });
            }
            return Ok(lt);
        }

        if op.is_equality() {
            if lt != rt {
                return Err(TypeError::ComparisonOperands { left: lt, right: rt, span });
            }
            return Ok(Type::Boolean);
        }

        debug_assert!(op.is_ordering());
        if lt != rt || !lt.is_numeric() {
            return Err(TypeError::OrderingOperands { left: lt, right: rt, span });
        }
        Ok(Type::Boolean)
    }

    fn check_call(&mut self, callee: &str, args: &[Expr], span: Span) -> Result<Type, TypeError> {
        // User-defined functions take precedence over registry entries
        if let Some(sig) = self.funcs.get(callee).cloned() {
            if args.len() != sig.params.len() {
                return Err(TypeError::ArityMismatch {
                    func: callee.to_string(),
                    expected: sig.params.len(),
                    found: args.len(),
                    span,
                });
            }
            for (index, (arg, expected)) in args.iter().zip(&sig.params).enumerate() {
                let found = self.infer_expr(arg)?;
                if found != *expected {
                    return Err(TypeError::ArgumentMismatch {
                        func: callee.to_string(),
                        index: index + 1,
                        expected: *expected,
                        found,
                        span: arg.span,
                    });
                }
            }
            return Ok(sig.ret);
        }

        if let Some(builtin) = self.registry.get(callee) {
            return self.check_builtin_call(builtin, args, span);
        }

        Err(TypeError::UnknownFunction { name: callee.to_string(), span })
    }

    fn check_builtin_call(
        &mut self,
        builtin: &Builtin,
        args: &[Expr],
        span: Span,
    ) -> Result<Type, TypeError> {
        if args.len() < builtin.min_args {
            return Err(TypeError::MinArity {
                func: builtin.name.to_string(),
                min: builtin.min_args,
                found: args.len(),
                span,
            });
        }
        if let Some(max) = builtin.max_args {
            if args.len() > max {
                return Err(TypeError::MaxArity {
                    func: builtin.name.to_string(),
                    max,
                    found: args.len(),
                    span,
                });
            }
        }

        for (index, arg) in args.iter().enumerate() {
            let found = self.infer_expr(arg)?;
            if !builtin.args.accepts(found) {
                return Err(TypeError::BuiltinArgMismatch {
                    func: builtin.name.to_string(),
                    index: index + 1,
                    found,
                    span: arg.span,
                });
            }
        }

        Ok(builtin.ret)
    }
}

/// Whether the block contains an explicit `retornar` on any path.
fn has_return(stmts: &[Stmt]) -> bool {
    stmts.iter().any(|stmt| match &stmt.kind {
        StmtKind::Return(_) => true,
        StmtKind::If { then_block, else_block, .. } => {
            has_return(then_block)
                || else_block.as_deref().map(has_return).unwrap_or(false)
        }
        StmtKind::While { body, .. } => has_return(body),
        StmtKind::For { body, .. } => has_return(body),
        _ => false,
    })
}

/// A type error with its source span.
#[derive(Debug, thiserror::Error)]
pub enum TypeError {
    #[error("variable '{name}' is not declared")]
    UndefinedVariable { name: String, span: Span },

    #[error("function '{name}' is not defined")]
    UnknownFunction { name: String, span: Span },

    #[error("function '{name}' is declared more than once")]
    DuplicateFunction { name: String, span: Span },

    #[error("operator '{op}' requires numeric operands of the same type, got {left} and {right}")]
    ArithmeticOperands { op: BinOp, left: Type, right: Type, span: Span },

    #[error("cannot compare {left} with {right}")]
    ComparisonOperands { left: Type, right: Type, span: Span },

    #[error("ordering requires numeric operands of the same type, got {left} and {right}")]
    OrderingOperands { left: Type, right: Type, span: Span },

    #[error("variable '{name}' is annotated as {annotated} but has type {found}")]
    AnnotationMismatch { name: String, annotated: Type, found: Type, span: Span },

    #[error("variable '{name}' has type {bound}, cannot assign {found}")]
    ReassignMismatch { name: String, bound: Type, found: Type, span: Span },

    #[error("function '{func}' expects {expected} argument(s), got {found}")]
    ArityMismatch { func: String, expected: usize, found: usize, span: Span },

    #[error("function '{func}' requires at least {min} argument(s), got {found}")]
    MinArity { func: String, min: usize, found: usize, span: Span },

    #[error("function '{func}' accepts at most {max} argument(s), got {found}")]
    MaxArity { func: String, max: usize, found: usize, span: Span },

    #[error("argument {index} of '{func}' has type {found}, expected {expected}")]
    ArgumentMismatch { func: String, index: usize, expected: Type, found: Type, span: Span },

    #[error("argument {index} of '{func}' has unsupported type {found}")]
    BuiltinArgMismatch { func: String, index: usize, found: Type, span: Span },

    #[error("condition of '{construct}' must be boolean or integer, got {found}")]
    Condition { construct: &'static str, found: Type, span: Span },

    #[error("'retornar' is only allowed inside a function")]
    ReturnOutsideFunction { span: Span },

    #[error("return type mismatch: expected {expected}, got {found}")]
    ReturnMismatch { expected: Type, found: Type, span: Span },

    #[error("function '{func}' implicitly returns {found}, expected {expected}")]
    ImplicitReturnMismatch { func: String, expected: Type, found: Type, span: Span },
}

impl TypeError {
    /// The source span the error points at.
    pub fn span(&self) -> Span {
        match self {
            TypeError::UndefinedVariable { span, .. }
            | TypeError::UnknownFunction { span, .. }
            | TypeError::DuplicateFunction { span, .. }
            | TypeError::ArithmeticOperands { span, .. }
            | TypeError::ComparisonOperands { span, .. }
            | TypeError::OrderingOperands { span, .. }
            | TypeError::AnnotationMismatch { span, .. }
            | TypeError::ReassignMismatch { span, .. }
            | TypeError::ArityMismatch { span, .. }
            | TypeError::MinArity { span, .. }
            | TypeError::MaxArity { span, .. }
            | TypeError::ArgumentMismatch { span, .. }
            | TypeError::BuiltinArgMismatch { span, .. }
            | TypeError::Condition { span, .. }
            | TypeError::ReturnOutsideFunction { span }
            | TypeError::ReturnMismatch { span, .. }
            | TypeError::ImplicitReturnMismatch { span, .. } => *span,
        }
    }
}
