// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! AST → bytecode lowering.
//!
//! Expressions compile post-order onto the value stack; statements leave
//! the stack empty. Control flow lowers to jumps whose targets are
//! backpatched once known, and calls are patched after every function
//! body has an address.

use std::collections::{BTreeMap, HashMap};

use solar_ast::expr::{BinOp, Expr, ExprKind};
use solar_ast::stmt::{FnDecl, Stmt, StmtKind};
use solar_ast::Span;
use solar_backend::{Backend, BackendError, ENTRY_FUNCTION};
use solar_stdlib::{BuiltinKind, BuiltinRegistry};

use crate::opcode::{Instruction, OpCode};
use crate::vm::Vm;

/// Local slot numbering for the function currently being compiled.
#[derive(Default)]
struct LocalTable {
    slots: HashMap<String, i64>,
}

impl LocalTable {
    fn get_or_insert(&mut self, name: &str) -> i64 {
        let next = self.slots.len() as i64;
        *self.slots.entry(name.to_string()).or_insert(next)
    }

    fn count(&self) -> i64 {
        self.slots.len() as i64
    }
}

pub struct BytecodeBackend {
    registry: BuiltinRegistry,
    code: Vec<Instruction>,
    globals: HashMap<String, i64>,
    /// Present while compiling a function body.
    locals: Option<LocalTable>,
    functions: BTreeMap<String, FnDecl>,
    fn_addrs: HashMap<String, i64>,
    /// Call sites waiting for their target address.
    pending_calls: Vec<(usize, String)>,
}

impl BytecodeBackend {
    pub fn new(registry: BuiltinRegistry) -> Self {
        Self {
            registry,
            code: Vec::new(),
            globals: HashMap::new(),
            locals: None,
            functions: BTreeMap::new(),
            fn_addrs: HashMap::new(),
            pending_calls: Vec::new(),
        }
    }

    /// Number of global slots the generated program uses.
    pub fn global_count(&self) -> usize {
        self.globals.len()
    }

    /// Lowers a whole program: main code first, then function bodies.
    pub fn generate(&mut self, program: &[Stmt]) -> Result<Vec<Instruction>, GenError> {
        let mut entry = false;
        for stmt in program {
            if let StmtKind::Fn(decl) = &stmt.kind {
                self.functions.insert(decl.name.clone(), decl.clone());
                if decl.name == ENTRY_FUNCTION {
                    entry = true;
                }
            }
        }

        if entry {
            let site = self.emit(OpCode::Call, 0, Span::new(0, 0));
            self.pending_calls.push((site, ENTRY_FUNCTION.to_string()));
            self.emit(OpCode::Pop, 0, Span::new(0, 0));
        } else {
            for stmt in program {
                if !matches!(stmt.kind, StmtKind::Fn(_)) {
                    self.gen_stmt(stmt)?;
                }
            }
        }
        self.emit(OpCode::Halt, 0, Span::new(0, 0));

        let names: Vec<String> = self.functions.keys().cloned().collect();
        for name in names {
            let decl = self.functions[&name].clone();
            self.gen_function(&decl)?;
        }

        for (site, callee) in std::mem::take(&mut self.pending_calls) {
            let addr = self.fn_addrs.get(&callee).copied().ok_or_else(|| GenError {
                message: format!("function '{}' is not defined", callee),
                span: self.code[site].span,
            })?;
            self.code[site].operand = addr;
        }

        Ok(std::mem::take(&mut self.code))
    }

    fn emit(&mut self, op: OpCode, operand: i64, span: Span) -> usize {
        self.code.push(Instruction { op, operand, span });
        self.code.len() - 1
    }

    fn patch_target(&mut self, site: usize) {
        self.code[site].operand = self.code.len() as i64;
    }

    // =========================================================================
    // Functions
    // =========================================================================

    fn gen_function(&mut self, decl: &FnDecl) -> Result<(), GenError> {
        self.fn_addrs.insert(decl.name.clone(), self.code.len() as i64);

        let enter = self.emit(OpCode::Enter, 0, Span::new(0, 0));
        let mut table = LocalTable::default();
        let param_slots: Vec<i64> = decl
            .params
            .iter()
            .map(|p| table.get_or_insert(&p.name))
            .collect();
        self.locals = Some(table);

        // Arguments arrive on the stack in call order, last on top
        for slot in param_slots.iter().rev() {
            self.emit(OpCode::Store, *slot, Span::new(0, 0));
        }

        // The body's trailing expression doubles as the implicit return
        match decl.body.split_last() {
            Some((last, rest)) if matches!(last.kind, StmtKind::Expr(_)) => {
                for stmt in rest {
                    self.gen_stmt(stmt)?;
                }
                if let StmtKind::Expr(expr) = &last.kind {
                    self.gen_expr(expr)?;
                }
                self.emit(OpCode::Ret, 0, Span::new(0, 0));
            }
            _ => {
                for stmt in &decl.body {
                    self.gen_stmt(stmt)?;
                }
                self.emit(OpCode::Const, 0, Span::new(0, 0));
                self.emit(OpCode::Ret, 0, Span::new(0, 0));
            }
        }

        let frame_size = self.locals.take().map(|t| t.count()).unwrap_or(0);
        self.code[enter].operand = frame_size;
        Ok(())
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn gen_stmt(&mut self, stmt: &Stmt) -> Result<(), GenError> {
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.gen_expr(expr)?;
                self.emit(OpCode::Pop, 0, stmt.span);
            }

            StmtKind::Assign { name, value, .. } => {
                self.gen_expr(value)?;
                // Function writes always create locals so the caller's
                // bindings survive the call, like the interpreter
                match &mut self.locals {
                    Some(table) => {
                        let slot = table.get_or_insert(name);
                        self.emit(OpCode::Store, slot, stmt.span);
                    }
                    None => {
                        let next = self.globals.len() as i64;
                        let slot = *self.globals.entry(name.clone()).or_insert(next);
                        self.emit(OpCode::StoreGlobal, slot, stmt.span);
                    }
                }
            }

            StmtKind::If { cond, then_block, else_block } => {
                self.gen_expr(cond)?;
                let to_else = self.emit(OpCode::JumpIfFalse, 0, stmt.span);
                for stmt in then_block {
                    self.gen_stmt(stmt)?;
                }
                match else_block {
                    Some(else_block) => {
                        let to_end = self.emit(OpCode::Jump, 0, stmt.span);
                        self.patch_target(to_else);
                        for stmt in else_block {
                            self.gen_stmt(stmt)?;
                        }
                        self.patch_target(to_end);
                    }
                    None => self.patch_target(to_else),
                }
            }

            StmtKind::While { cond, body } => {
                let top = self.code.len() as i64;
                self.gen_expr(cond)?;
                let to_end = self.emit(OpCode::JumpIfFalse, 0, stmt.span);
                for stmt in body {
                    self.gen_stmt(stmt)?;
                }
                self.emit(OpCode::Jump, top, stmt.span);
                self.patch_target(to_end);
            }

            StmtKind::For { init, cond, step, body } => {
                if let Some(init) = init {
                    self.gen_stmt(init)?;
                }
                let top = self.code.len() as i64;
                let to_end = match cond {
                    Some(cond) => {
                        self.gen_expr(cond)?;
                        Some(self.emit(OpCode::JumpIfFalse, 0, stmt.span))
                    }
                    // Empty condition loops until a return
                    None => None,
                };
                for stmt in body {
                    self.gen_stmt(stmt)?;
                }
                if let Some(step) = step {
                    self.gen_stmt(step)?;
                }
                self.emit(OpCode::Jump, top, stmt.span);
                if let Some(site) = to_end {
                    self.patch_target(site);
                }
            }

            // Bodies get their own addresses after main code
            StmtKind::Fn(_) => {}

            StmtKind::Return(value) => {
                match value {
                    Some(expr) => self.gen_expr(expr)?,
                    None => {
                        self.emit(OpCode::Const, 0, stmt.span);
                    }
                }
                self.emit(OpCode::Ret, 0, stmt.span);
            }

            // Imports were spliced away by the resolver
            StmtKind::Import(_) => {}
        }
        Ok(())
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn gen_expr(&mut self, expr: &Expr) -> Result<(), GenError> {
        match &expr.kind {
            ExprKind::Int(n) => {
                self.emit(OpCode::Const, *n, expr.span);
            }
            ExprKind::Bool(b) => {
                self.emit(OpCode::Const, *b as i64, expr.span);
            }
            // Decimals truncate, like the native backends
            ExprKind::Float(v) => {
                self.emit(OpCode::Const, *v as i64, expr.span);
            }
            ExprKind::Str(_) => {
                return Err(GenError {
                    message: "text literals are not supported by the bytecode backend".to_string(),
                    span: expr.span,
                });
            }

            ExprKind::Var(name) => {
                if let Some(slot) = self.locals.as_ref().and_then(|t| t.slots.get(name)).copied() {
                    self.emit(OpCode::Load, slot, expr.span);
                } else if let Some(slot) = self.globals.get(name).copied() {
                    self.emit(OpCode::LoadGlobal, slot, expr.span);
                } else {
                    return Err(GenError {
                        message: format!("variable '{}' is not defined", name),
                        span: expr.span,
                    });
                }
            }

            ExprKind::Binary { op, left, right } => {
                self.gen_expr(left)?;
                self.gen_expr(right)?;
                let op = match op {
                    BinOp::Add => OpCode::Add,
                    BinOp::Sub => OpCode::Sub,
                    BinOp::Mul => OpCode::Mul,
                    BinOp::Div => OpCode::Div,
                    BinOp::Pow => OpCode::Pow,
                    BinOp::Eq => OpCode::Eq,
                    BinOp::Ne => OpCode::Ne,
                    BinOp::Lt => OpCode::Lt,
                    BinOp::Gt => OpCode::Gt,
                    BinOp::Le => OpCode::Le,
                    BinOp::Ge => OpCode::Ge,
                };
                self.emit(op, 0, expr.span);
            }

            ExprKind::Call { callee, args } => self.gen_call(callee, args, expr.span)?,
        }
        Ok(())
    }

    fn gen_call(&mut self, callee: &str, args: &[Expr], span: Span) -> Result<(), GenError> {
        if self.functions.contains_key(callee) {
            for arg in args {
                self.gen_expr(arg)?;
            }
            let site = self.emit(OpCode::Call, 0, span);
            self.pending_calls.push((site, callee.to_string()));
            return Ok(());
        }

        let Some(builtin) = self.registry.get(callee).cloned() else {
            return Err(GenError {
                message: format!("function '{}' is not defined", callee),
                span,
            });
        };
        match builtin.kind {
            BuiltinKind::Print => {
                for arg in args {
                    self.gen_expr(arg)?;
                }
                self.emit(OpCode::Print, args.len() as i64, span);
            }
            BuiltinKind::Pure(_) => match callee {
                "soma" => {
                    self.gen_expr(&args[0])?;
                    for arg in &args[1..] {
                        self.gen_expr(arg)?;
                        self.emit(OpCode::Add, 0, span);
                    }
                }
                "abs" => {
                    self.gen_expr(&args[0])?;
                    self.emit(OpCode::Abs, 0, span);
                }
                _ => {
                    return Err(GenError {
                        message: format!("built-in '{}' has no bytecode lowering", callee),
                        span,
                    })
                }
            },
        }
        Ok(())
    }
}

/// A lowering error with its source span.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct GenError {
    pub message: String,
    pub span: Span,
}

impl Backend for BytecodeBackend {
    fn name(&self) -> &'static str {
        "bytecode VM"
    }

    fn extension(&self) -> &'static str {
        ".bc"
    }

    fn compile(&mut self, program: &[Stmt]) -> Result<(), BackendError> {
        let code = self.generate(program).map_err(|err| BackendError::Runtime {
            message: err.message,
            span: Some(err.span),
        })?;
        let mut vm = Vm::new(self.global_count());
        vm.execute(&code).map_err(|err| BackendError::Runtime {
            message: err.to_string(),
            span: err.span(),
        })
    }
}
