// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! x86-64 System V code emission.
//!
//! Evaluation is a strict post-order walk: every subexpression leaves its
//! integer result in `%rax`. Binary operators spill the left operand to the
//! stack while the right evaluates. Inside functions, each new binding
//! grows the frame by one quadword; at file scope, bindings become labeled
//! quadwords in the data section.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Write as _;
use std::path::Path;

use solar_ast::expr::{BinOp, Expr, ExprKind};
use solar_ast::stmt::{FnDecl, Stmt, StmtKind};
use solar_backend::{write_artifact, Backend, BackendError, ENTRY_FUNCTION};
use solar_stdlib::{BuiltinKind, BuiltinRegistry};

use crate::link::assemble_and_link;

/// Registers for the first six integer arguments (System V AMD64).
const PARAM_REGISTERS: [&str; 6] = ["%rdi", "%rsi", "%rdx", "%rcx", "%r8", "%r9"];

pub struct X86_64Backend {
    registry: BuiltinRegistry,
    text: String,
    globals: BTreeSet<String>,
    decimals: Vec<(String, f64)>,
    strings: Vec<(String, String)>,
    label_count: usize,
    functions: BTreeMap<String, FnDecl>,
    /// Per-scope name → frame offset maps; empty outside functions.
    locals: Vec<HashMap<String, i64>>,
    frame_offset: i64,
    needs_div_guard: bool,
}

impl X86_64Backend {
    pub fn new(registry: BuiltinRegistry) -> Self {
        Self {
            registry,
            text: String::new(),
            globals: BTreeSet::new(),
            decimals: Vec::new(),
            strings: Vec::new(),
            label_count: 0,
            functions: BTreeMap::new(),
            locals: Vec::new(),
            frame_offset: 0,
            needs_div_guard: false,
        }
    }

    /// Generates the complete assembly source without invoking any tools.
    pub fn emit_program(&mut self, program: &[Stmt]) -> String {
        let entry = self.collect_functions(program);

        let names: Vec<String> = self.functions.keys().cloned().collect();
        for name in names {
            let decl = self.functions[&name].clone();
            self.gen_function(&decl);
        }

        self.emit(".global _start");
        self.emit("_start:");
        if entry.is_some() {
            self.emit("    call func_principal");
        } else {
            for stmt in program {
                if !matches!(stmt.kind, StmtKind::Fn(_)) {
                    self.gen_stmt(stmt);
                }
            }
        }
        self.emit("    mov $0, %rdi");
        self.emit("    call sair");

        if self.needs_div_guard {
            self.emit("");
            self.emit(".div_zero:");
            self.emit("    mov $1, %rdi");
            self.emit("    call sair");
        }

        self.assemble_source()
    }

    fn collect_functions(&mut self, program: &[Stmt]) -> Option<FnDecl> {
        let mut entry = None;
        for stmt in program {
            if let StmtKind::Fn(decl) = &stmt.kind {
                self.functions.insert(decl.name.clone(), decl.clone());
                if decl.name == ENTRY_FUNCTION {
                    entry = Some(decl.clone());
                }
            }
        }
        entry
    }

    /// Stitches the runtime include, data section, and text together.
    fn assemble_source(&self) -> String {
        let mut out = String::new();
        out.push_str(".section .text\n");
        out.push_str(".include \"external/runtime.s\"\n");
        out.push('\n');
        out.push_str(".section .data\n");
        for name in &self.globals {
            let _ = writeln!(out, "{}: .quad 0", global_label(name));
        }
        for (label, value) in &self.decimals {
            let _ = writeln!(out, "{}: .quad 0x{:016x}", label, value.to_bits());
        }
        for (label, value) in &self.strings {
            let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
            let _ = writeln!(out, "{}: .ascii \"{}\\0\"", label, escaped);
        }
        out.push('\n');
        out.push_str(".section .text\n");
        out.push_str(&self.text);
        out
    }

    // =========================================================================
    // Emission helpers
    // =========================================================================

    fn emit(&mut self, line: &str) {
        self.text.push_str(line);
        self.text.push('\n');
    }

    fn emitf(&mut self, line: String) {
        self.text.push_str(&line);
        self.text.push('\n');
    }

    fn reserve_id(&mut self) -> usize {
        let id = self.label_count;
        self.label_count += 1;
        id
    }

    fn in_function(&self) -> bool {
        !self.locals.is_empty()
    }

    fn lookup_local(&self, name: &str) -> Option<i64> {
        self.locals.iter().rev().find_map(|scope| scope.get(name).copied())
    }

    /// Grows the frame by one quadword and maps the name to its offset.
    fn alloc_local(&mut self, name: &str) -> i64 {
        self.frame_offset -= 8;
        let offset = self.frame_offset;
        self.emit("    sub $8, %rsp");
        if let Some(scope) = self.locals.last_mut() {
            scope.insert(name.to_string(), offset);
        }
        offset
    }

    // =========================================================================
    // Functions
    // =========================================================================

    fn gen_function(&mut self, decl: &FnDecl) {
        self.emitf(format!("func_{}:", decl.name));
        self.emit("    push %rbp");
        self.emit("    mov %rsp, %rbp");

        self.locals.push(HashMap::new());
        self.frame_offset = 0;

        for (idx, param) in decl.params.iter().enumerate() {
            if idx < PARAM_REGISTERS.len() {
                let offset = self.alloc_local(&param.name);
                self.emitf(format!("    mov {}, {}(%rbp)", PARAM_REGISTERS[idx], offset));
            } else {
                // Stack arguments sit above the saved %rbp and return address
                let incoming = 16 + 8 * (idx - PARAM_REGISTERS.len()) as i64;
                self.emitf(format!("    mov {}(%rbp), %rax", incoming));
                let offset = self.alloc_local(&param.name);
                self.emitf(format!("    mov %rax, {}(%rbp)", offset));
            }
        }

        let terminated = self.gen_block(&decl.body);
        if !terminated {
            // Implicit return: the last evaluated value is already in %rax
            self.emit("    leave");
            self.emit("    ret");
        }

        self.locals.pop();
        self.frame_offset = 0;
        self.emit("");
    }

    // =========================================================================
    // Statements
    // =========================================================================

    /// Emits a block; returns true when it ended in an explicit return.
    fn gen_block(&mut self, stmts: &[Stmt]) -> bool {
        let scoped = self.in_function();
        if scoped {
            self.locals.push(HashMap::new());
        }

        let mut terminated = false;
        for stmt in stmts {
            self.gen_stmt(stmt);
            if matches!(stmt.kind, StmtKind::Return(_)) {
                // Code after a return is unreachable
                terminated = true;
                break;
            }
        }

        if scoped {
            self.locals.pop();
        }
        terminated
    }

    fn gen_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Expr(expr) => self.gen_expr(expr),

            StmtKind::Assign { name, value, .. } => {
                self.gen_expr(value);
                if self.in_function() {
                    let offset = match self.lookup_local(name) {
                        Some(offset) => offset,
                        None => self.alloc_local(name),
                    };
                    self.emitf(format!("    mov %rax, {}(%rbp)", offset));
                } else {
                    self.globals.insert(name.clone());
                    self.emitf(format!("    mov %rax, {}(%rip)", global_label(name)));
                }
            }

            StmtKind::If { cond, then_block, else_block } => {
                let id = self.reserve_id();
                let end_label = format!(".if_fim_{}", id);
                let else_label = format!(".if_senao_{}", id);

                self.gen_expr(cond);
                self.emit("    test %rax, %rax");
                if else_block.is_some() {
                    self.emitf(format!("    jz {}", else_label));
                } else {
                    self.emitf(format!("    jz {}", end_label));
                }

                let then_terminated = self.gen_block(then_block);
                if let Some(else_block) = else_block {
                    if !then_terminated {
                        self.emitf(format!("    jmp {}", end_label));
                    }
                    self.emitf(format!("{}:", else_label));
                    self.gen_block(else_block);
                }
                self.emitf(format!("{}:", end_label));
            }

            StmtKind::While { cond, body } => {
                let id = self.reserve_id();
                let cond_label = format!(".while_cond_{}", id);
                let body_label = format!(".while_body_{}", id);
                let end_label = format!(".while_end_{}", id);

                self.emitf(format!("    jmp {}", cond_label));
                self.emitf(format!("{}:", body_label));
                self.gen_block(body);
                self.emitf(format!("    jmp {}", cond_label));
                self.emitf(format!("{}:", cond_label));
                self.gen_expr(cond);
                self.emit("    test %rax, %rax");
                self.emitf(format!("    jnz {}", body_label));
                self.emitf(format!("{}:", end_label));
            }

            StmtKind::For { init, cond, step, body } => {
                let id = self.reserve_id();
                let cond_label = format!(".for_cond_{}", id);
                let body_label = format!(".for_body_{}", id);
                let step_label = format!(".for_step_{}", id);
                let end_label = format!(".for_end_{}", id);

                if let Some(init) = init {
                    self.gen_stmt(init);
                }

                self.emitf(format!("{}:", cond_label));
                if let Some(cond) = cond {
                    self.gen_expr(cond);
                    self.emit("    test %rax, %rax");
                    self.emitf(format!("    jz {}", end_label));
                }

                self.emitf(format!("{}:", body_label));
                self.gen_block(body);
                self.emitf(format!("    jmp {}", step_label));

                self.emitf(format!("{}:", step_label));
                if let Some(step) = step {
                    self.gen_stmt(step);
                }
                self.emitf(format!("    jmp {}", cond_label));

                self.emitf(format!("{}:", end_label));
            }

            // Bodies were emitted up front
            StmtKind::Fn(_) => {}

            StmtKind::Return(value) => {
                match value {
                    Some(expr) => self.gen_expr(expr),
                    None => self.emit("    mov $0, %rax"),
                }
                self.emit("    leave");
                self.emit("    ret");
            }

            // Imports were spliced away by the resolver
            StmtKind::Import(_) => {}
        }
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn gen_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Int(n) => self.emitf(format!("    mov ${}, %rax", n)),

            ExprKind::Bool(b) => self.emitf(format!("    mov ${}, %rax", *b as i64)),

            ExprKind::Str(s) => {
                let label = self.string_label(s.clone());
                self.emitf(format!("    lea {}(%rip), %rax", label));
            }

            ExprKind::Float(f) => {
                // Decimals truncate to integer in the native lowering
                let label = self.decimal_label(*f);
                self.emitf(format!("    movsd {}(%rip), %xmm0", label));
                self.emit("    cvttsd2si %xmm0, %rax");
            }

            ExprKind::Var(name) => match self.lookup_local(name) {
                Some(offset) => self.emitf(format!("    mov {}(%rbp), %rax", offset)),
                None => self.emitf(format!("    mov {}(%rip), %rax", global_label(name))),
            },

            ExprKind::Binary { op, left, right } => {
                self.gen_expr(left);
                self.emit("    push %rax");
                self.gen_expr(right);
                self.emit("    mov %rax, %rbx");
                self.emit("    pop %rax");
                self.gen_binop(*op);
            }

            ExprKind::Call { callee, args } => self.gen_call(callee, args),
        }
    }

    fn gen_binop(&mut self, op: BinOp) {
        match op {
            BinOp::Add => self.emit("    add %rbx, %rax"),
            BinOp::Sub => self.emit("    sub %rbx, %rax"),
            BinOp::Mul => self.emit("    imul %rbx, %rax"),
            BinOp::Div => {
                self.needs_div_guard = true;
                self.emit("    test %rbx, %rbx");
                self.emit("    jz .div_zero");
                self.emit("    cqo");
                self.emit("    idiv %rbx");
            }
            BinOp::Pow => self.gen_pow(),
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => {
                self.gen_comparison(op)
            }
        }
    }

    /// Exponentiation by repeated multiplication; exponent 0 yields 1.
    fn gen_pow(&mut self) {
        let id = self.reserve_id();
        let loop_label = format!(".pow_loop_{}", id);
        let done_label = format!(".pow_done_{}", id);

        self.emit("    mov %rax, %rcx");
        self.emit("    mov $1, %rax");
        self.emit("    test %rbx, %rbx");
        self.emitf(format!("    jz {}", done_label));
        self.emitf(format!("{}:", loop_label));
        self.emit("    imul %rcx, %rax");
        self.emit("    dec %rbx");
        self.emitf(format!("    jnz {}", loop_label));
        self.emitf(format!("{}:", done_label));
    }

    fn gen_comparison(&mut self, op: BinOp) {
        let set = match op {
            BinOp::Eq => "sete",
            BinOp::Ne => "setne",
            BinOp::Lt => "setl",
            BinOp::Gt => "setg",
            BinOp::Le => "setle",
            BinOp::Ge => "setge",
            _ => unreachable!("not a comparison"),
        };
        self.emit("    cmp %rbx, %rax");
        self.emitf(format!("    {} %al", set));
        self.emit("    movzx %al, %rax");
    }

    // =========================================================================
    // Calls
    // =========================================================================

    fn gen_call(&mut self, callee: &str, args: &[Expr]) {
        if self.functions.contains_key(callee) {
            self.gen_user_call(callee, args);
            return;
        }

        let Some(builtin) = self.registry.get(callee).cloned() else {
            return;
        };
        match builtin.kind {
            BuiltinKind::Print => {
                for arg in args {
                    self.gen_expr(arg);
                    self.emit("    call imprime_num");
                }
            }
            BuiltinKind::Pure(_) => self.gen_pure_builtin(callee, args),
        }
    }

    /// System V call: arguments evaluate left to right into a spill area so
    /// evaluation cannot clobber already-loaded parameter registers; the
    /// first six then load into registers and the rest stay on the stack in
    /// reverse order. The caller reclaims the whole area after the call.
    fn gen_user_call(&mut self, callee: &str, args: &[Expr]) {
        let n = args.len();
        if n == 0 {
            self.emitf(format!("    call func_{}", callee));
            return;
        }

        let stack_args = n.saturating_sub(PARAM_REGISTERS.len());
        let slot = |idx: usize| -> usize {
            if idx >= PARAM_REGISTERS.len() {
                8 * (idx - PARAM_REGISTERS.len())
            } else {
                8 * (stack_args + idx)
            }
        };

        self.emitf(format!("    sub ${}, %rsp", 8 * n));
        for (idx, arg) in args.iter().enumerate() {
            self.gen_expr(arg);
            self.emitf(format!("    mov %rax, {}(%rsp)", slot(idx)));
        }
        for idx in 0..n.min(PARAM_REGISTERS.len()) {
            self.emitf(format!("    mov {}(%rsp), {}", slot(idx), PARAM_REGISTERS[idx]));
        }
        self.emitf(format!("    call func_{}", callee));
        self.emitf(format!("    add ${}, %rsp", 8 * n));
    }

    fn gen_pure_builtin(&mut self, name: &str, args: &[Expr]) {
        match name {
            "soma" => {
                self.gen_expr(&args[0]);
                for arg in &args[1..] {
                    self.emit("    push %rax");
                    self.gen_expr(arg);
                    self.emit("    mov %rax, %rbx");
                    self.emit("    pop %rax");
                    self.emit("    add %rbx, %rax");
                }
            }
            "abs" => {
                let id = self.reserve_id();
                let done_label = format!(".abs_done_{}", id);
                self.gen_expr(&args[0]);
                self.emit("    test %rax, %rax");
                self.emitf(format!("    jns {}", done_label));
                self.emit("    neg %rax");
                self.emitf(format!("{}:", done_label));
            }
            _ => {}
        }
    }

    // =========================================================================
    // Literal pools
    // =========================================================================

    fn string_label(&mut self, value: String) -> String {
        let label = format!("str_{}", self.reserve_id());
        self.strings.push((label.clone(), value));
        label
    }

    fn decimal_label(&mut self, value: f64) -> String {
        let label = format!("decimal_{}", self.reserve_id());
        self.decimals.push((label.clone(), value));
        label
    }
}

fn global_label(name: &str) -> String {
    format!("var_{}", name)
}

impl Backend for X86_64Backend {
    fn name(&self) -> &'static str {
        "x86-64 assembly"
    }

    fn extension(&self) -> &'static str {
        ".s"
    }

    fn compile(&mut self, program: &[Stmt]) -> Result<(), BackendError> {
        let source = self.emit_program(program);
        let asm_file = Path::new("programa.s");
        write_artifact(asm_file, &source)?;
        assemble_and_link(asm_file)
    }
}
