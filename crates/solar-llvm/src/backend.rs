// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! AST → textual LLVM IR.
//!
//! One IR function per user function plus a `main` entry; all variables
//! are i64 stack slots (decimals truncate on use, keeping parity with the
//! native backend), and `printf` handles output with one format global
//! per format string.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::process::Command;

use solar_ast::expr::{BinOp, Expr, ExprKind};
use solar_ast::stmt::{FnDecl, Stmt, StmtKind};
use solar_backend::{write_artifact, Backend, BackendError, ENTRY_FUNCTION};
use solar_stdlib::{BuiltinKind, BuiltinRegistry};

use crate::builder::{escape_c_string, FunctionBuilder};

/// The IR-level type of an emitted value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ty {
    I64,
    F64,
    Ptr,
}

/// An emitted value: its textual operand form plus its IR type.
#[derive(Debug, Clone)]
struct Val {
    repr: String,
    ty: Ty,
}

impl Val {
    fn int(repr: impl Into<String>) -> Val {
        Val { repr: repr.into(), ty: Ty::I64 }
    }

    fn zero() -> Val {
        Val::int("0")
    }
}

/// How a variable is represented in the current scope.
#[derive(Debug, Clone)]
enum Binding {
    /// An `alloca` pointer; reads load through it.
    Slot(String),
    /// A direct SSA value (function parameters).
    Direct(Val),
}

pub struct LlvmBackend {
    registry: BuiltinRegistry,
    /// Rendered global constant definitions, in first-use order.
    globals: Vec<String>,
    emitted_globals: BTreeSet<String>,
    str_count: usize,
    needs_exit: bool,
    user_funcs: BTreeSet<String>,
    scopes: Vec<HashMap<String, Binding>>,
    rendered: Vec<String>,
}

impl LlvmBackend {
    pub fn new(registry: BuiltinRegistry) -> Self {
        Self {
            registry,
            globals: Vec::new(),
            emitted_globals: BTreeSet::new(),
            str_count: 0,
            needs_exit: false,
            user_funcs: BTreeSet::new(),
            scopes: Vec::new(),
            rendered: Vec::new(),
        }
    }

    /// Generates the complete textual module without invoking any tools.
    pub fn emit_program(&mut self, program: &[Stmt]) -> String {
        let mut entry = None;
        for stmt in program {
            if let StmtKind::Fn(decl) = &stmt.kind {
                self.user_funcs.insert(decl.name.clone());
                if decl.name == ENTRY_FUNCTION {
                    entry = Some(decl.name.clone());
                }
            }
        }

        for stmt in program {
            if let StmtKind::Fn(decl) = &stmt.kind {
                self.gen_function(decl);
            }
        }

        let mut main = FunctionBuilder::new("define i32 @main()");
        self.scopes.push(HashMap::new());
        if let Some(name) = entry {
            let tmp = main.fresh();
            main.push(format!("{} = call i64 @{}()", tmp, name));
        } else {
            for stmt in program {
                if matches!(stmt.kind, StmtKind::Fn(_)) {
                    continue;
                }
                if main.is_terminated() {
                    break;
                }
                self.gen_stmt(&mut main, stmt);
            }
        }
        main.terminate("ret i32 0".to_string());
        self.scopes.pop();
        self.rendered.push(main.render());

        self.render_module()
    }

    fn render_module(&self) -> String {
        let mut out = String::new();
        for global in &self.globals {
            out.push_str(global);
            out.push('\n');
        }
        if !self.globals.is_empty() {
            out.push('\n');
        }
        out.push_str("declare i32 @printf(ptr, ...)\n");
        if self.needs_exit {
            out.push_str("declare void @exit(i32)\n");
        }
        out.push('\n');
        for func in &self.rendered {
            out.push_str(func);
            out.push('\n');
        }
        out
    }

    // =========================================================================
    // Globals
    // =========================================================================

    /// Emits a named byte-array global once; returns its `@name` operand.
    fn ensure_global(&mut self, name: &str, contents: &[u8]) -> String {
        if self.emitted_globals.insert(name.to_string()) {
            let mut bytes = contents.to_vec();
            bytes.push(0);
            self.globals.push(format!(
                "@{} = private unnamed_addr constant [{} x i8] c\"{}\"",
                name,
                bytes.len(),
                escape_c_string(&bytes),
            ));
        }
        format!("@{}", name)
    }

    fn string_literal(&mut self, value: &str) -> String {
        let name = format!("str_{}", self.str_count);
        self.str_count += 1;
        self.ensure_global(&name, value.as_bytes())
    }

    // =========================================================================
    // Functions
    // =========================================================================

    fn gen_function(&mut self, decl: &FnDecl) {
        let params: Vec<String> = decl
            .params
            .iter()
            .map(|p| format!("i64 %{}", p.name))
            .collect();
        let header = format!("define i64 @{}({})", decl.name, params.join(", "));
        let mut f = FunctionBuilder::new(header);

        self.scopes.push(HashMap::new());
        for param in &decl.params {
            self.bind(
                &param.name,
                Binding::Direct(Val::int(format!("%{}", param.name))),
            );
        }

        let last = self.gen_block(&mut f, &decl.body);
        if !f.is_terminated() {
            let value = self.to_i64(&mut f, last);
            f.terminate(format!("ret i64 {}", value.repr));
        }
        self.scopes.pop();

        self.rendered.push(f.render());
    }

    // =========================================================================
    // Statements
    // =========================================================================

    /// Emits a block in its own scope; returns its last value.
    fn gen_block(&mut self, f: &mut FunctionBuilder, stmts: &[Stmt]) -> Val {
        self.scopes.push(HashMap::new());
        let mut last = Val::zero();
        for stmt in stmts {
            if f.is_terminated() {
                break;
            }
            last = self.gen_stmt(f, stmt);
        }
        self.scopes.pop();
        last
    }

    fn gen_stmt(&mut self, f: &mut FunctionBuilder, stmt: &Stmt) -> Val {
        match &stmt.kind {
            StmtKind::Expr(expr) => self.gen_expr(f, expr),

            StmtKind::Assign { name, value, .. } => {
                let value = self.gen_expr(f, value);
                let value = self.to_i64(f, value);
                match self.lookup(name) {
                    Some(Binding::Slot(ptr)) => {
                        f.push(format!("store i64 {}, ptr {}", value.repr, ptr));
                    }
                    _ => {
                        let ptr = f.fresh();
                        f.push(format!("{} = alloca i64", ptr));
                        f.push(format!("store i64 {}, ptr {}", value.repr, ptr));
                        self.bind(name, Binding::Slot(ptr));
                    }
                }
                value
            }

            StmtKind::If { cond, then_block, else_block } => {
                self.gen_if(f, cond, then_block, else_block.as_deref())
            }

            StmtKind::While { cond, body } => {
                let cond_b = f.add_block("while.cond");
                let body_b = f.add_block("while.body");
                let end_b = f.add_block("while.end");

                f.terminate(format!("br label %{}", f.label(cond_b)));
                f.select(cond_b);
                let cond_val = self.gen_expr(f, cond);
                let flag = self.truth_test(f, cond_val);
                f.terminate(format!(
                    "br i1 {}, label %{}, label %{}",
                    flag,
                    f.label(body_b),
                    f.label(end_b)
                ));

                f.select(body_b);
                self.gen_block(f, body);
                f.terminate(format!("br label %{}", f.label(cond_b)));

                f.select(end_b);
                Val::zero()
            }

            StmtKind::For { init, cond, step, body } => {
                if let Some(init) = init {
                    self.gen_stmt(f, init);
                }

                let cond_b = f.add_block("for.cond");
                let body_b = f.add_block("for.body");
                let step_b = f.add_block("for.step");
                let end_b = f.add_block("for.end");

                f.terminate(format!("br label %{}", f.label(cond_b)));
                f.select(cond_b);
                match cond {
                    Some(cond) => {
                        let cond_val = self.gen_expr(f, cond);
                        let flag = self.truth_test(f, cond_val);
                        f.terminate(format!(
                            "br i1 {}, label %{}, label %{}",
                            flag,
                            f.label(body_b),
                            f.label(end_b)
                        ));
                    }
                    // Empty condition loops forever
                    None => f.terminate(format!("br label %{}", f.label(body_b))),
                }

                f.select(body_b);
                self.gen_block(f, body);
                f.terminate(format!("br label %{}", f.label(step_b)));

                f.select(step_b);
                if let Some(step) = step {
                    self.gen_stmt(f, step);
                }
                f.terminate(format!("br label %{}", f.label(cond_b)));

                f.select(end_b);
                Val::zero()
            }

            // Only top-level functions are lowered
            StmtKind::Fn(_) => Val::zero(),

            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.gen_expr(f, expr),
                    None => Val::zero(),
                };
                let value = self.to_i64(f, value);
                f.terminate(format!("ret i64 {}", value.repr));
                value
            }

            // Imports were spliced away by the resolver
            StmtKind::Import(_) => Val::zero(),
        }
    }

    fn gen_if(
        &mut self,
        f: &mut FunctionBuilder,
        cond: &Expr,
        then_block: &[Stmt],
        else_block: Option<&[Stmt]>,
    ) -> Val {
        let cond_val = self.gen_expr(f, cond);
        let flag = self.truth_test(f, cond_val);

        let then_b = f.add_block("if.then");
        let merge_b = f.add_block("if.end");
        let else_b = else_block.map(|_| f.add_block("if.else"));

        match else_b {
            Some(else_b) => f.terminate(format!(
                "br i1 {}, label %{}, label %{}",
                flag,
                f.label(then_b),
                f.label(else_b)
            )),
            None => f.terminate(format!(
                "br i1 {}, label %{}, label %{}",
                flag,
                f.label(then_b),
                f.label(merge_b)
            )),
        }

        f.select(then_b);
        let then_val = self.gen_block(f, then_block);
        let then_flows = !f.is_terminated();
        let mut then_incoming = None;
        if then_flows {
            let value = self.to_i64(f, then_val);
            then_incoming = Some((value, f.current_id()));
            f.terminate(format!("br label %{}", f.label(merge_b)));
        }

        let mut else_incoming = None;
        if let (Some(else_b), Some(else_stmts)) = (else_b, else_block) {
            f.select(else_b);
            let else_val = self.gen_block(f, else_stmts);
            if !f.is_terminated() {
                let value = self.to_i64(f, else_val);
                else_incoming = Some((value, f.current_id()));
                f.terminate(format!("br label %{}", f.label(merge_b)));
            }
        }

        f.select(merge_b);

        // A φ joins the branch values when both reach the merge point
        if let (Some((tv, tb)), Some((ev, eb))) = (&then_incoming, &else_incoming) {
            let tmp = f.fresh();
            f.push(format!(
                "{} = phi i64 [ {}, %{} ], [ {}, %{} ]",
                tmp,
                tv.repr,
                f.label(*tb),
                ev.repr,
                f.label(*eb)
            ));
            return Val::int(tmp);
        }
        then_incoming.map(|(v, _)| v).unwrap_or_else(Val::zero)
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn gen_expr(&mut self, f: &mut FunctionBuilder, expr: &Expr) -> Val {
        match &expr.kind {
            ExprKind::Int(n) => Val::int(n.to_string()),
            ExprKind::Bool(b) => Val::int((*b as i64).to_string()),
            ExprKind::Float(v) => Val {
                repr: format!("0x{:016X}", v.to_bits()),
                ty: Ty::F64,
            },
            ExprKind::Str(s) => Val { repr: self.string_literal(s), ty: Ty::Ptr },

            ExprKind::Var(name) => match self.lookup(name) {
                Some(Binding::Slot(ptr)) => {
                    let tmp = f.fresh();
                    f.push(format!("{} = load i64, ptr {}", tmp, ptr));
                    Val::int(tmp)
                }
                Some(Binding::Direct(val)) => val,
                // Unreachable after type checking
                None => Val::zero(),
            },

            ExprKind::Binary { op, left, right } => {
                let lhs = self.gen_expr(f, left);
                let rhs = self.gen_expr(f, right);
                let lhs = self.to_i64(f, lhs);
                let rhs = self.to_i64(f, rhs);
                self.gen_binop(f, *op, lhs, rhs)
            }

            ExprKind::Call { callee, args } => self.gen_call(f, callee, args),
        }
    }

    fn gen_binop(&mut self, f: &mut FunctionBuilder, op: BinOp, lhs: Val, rhs: Val) -> Val {
        let simple = match op {
            BinOp::Add => Some("add"),
            BinOp::Sub => Some("sub"),
            BinOp::Mul => Some("mul"),
            _ => None,
        };
        if let Some(inst) = simple {
            let tmp = f.fresh();
            f.push(format!("{} = {} i64 {}, {}", tmp, inst, lhs.repr, rhs.repr));
            return Val::int(tmp);
        }

        match op {
            BinOp::Div => self.gen_division(f, lhs, rhs),
            BinOp::Pow => self.gen_pow(f, lhs, rhs),
            _ => {
                let pred = match op {
                    BinOp::Eq => "eq",
                    BinOp::Ne => "ne",
                    BinOp::Lt => "slt",
                    BinOp::Gt => "sgt",
                    BinOp::Le => "sle",
                    BinOp::Ge => "sge",
                    _ => unreachable!("arithmetic handled above"),
                };
                let cmp = f.fresh();
                f.push(format!("{} = icmp {} i64 {}, {}", cmp, pred, lhs.repr, rhs.repr));
                let tmp = f.fresh();
                f.push(format!("{} = zext i1 {} to i64", tmp, cmp));
                Val::int(tmp)
            }
        }
    }

    /// Division branches to an error block on a zero divisor: the program
    /// prints a diagnostic and exits with status 1.
    fn gen_division(&mut self, f: &mut FunctionBuilder, lhs: Val, rhs: Val) -> Val {
        self.needs_exit = true;
        let message = self.ensure_global("div_err", b"runtime error: division by zero\n");

        let is_zero = f.fresh();
        f.push(format!("{} = icmp eq i64 {}, 0", is_zero, rhs.repr));

        let zero_b = f.add_block("div.zero");
        let ok_b = f.add_block("div.ok");
        f.terminate(format!(
            "br i1 {}, label %{}, label %{}",
            is_zero,
            f.label(zero_b),
            f.label(ok_b)
        ));

        f.select(zero_b);
        let tmp = f.fresh();
        f.push(format!("{} = call i32 (ptr, ...) @printf(ptr {})", tmp, message));
        f.push("call void @exit(i32 1)".to_string());
        f.terminate("unreachable".to_string());

        f.select(ok_b);
        let quotient = f.fresh();
        f.push(format!("{} = sdiv i64 {}, {}", quotient, lhs.repr, rhs.repr));
        Val::int(quotient)
    }

    /// Exponentiation as an iterative square-and-multiply loop over
    /// alloca-backed state.
    fn gen_pow(&mut self, f: &mut FunctionBuilder, base: Val, exp: Val) -> Val {
        let res_ptr = f.fresh();
        let exp_ptr = f.fresh();
        let base_ptr = f.fresh();
        f.push(format!("{} = alloca i64", res_ptr));
        f.push(format!("{} = alloca i64", exp_ptr));
        f.push(format!("{} = alloca i64", base_ptr));
        f.push(format!("store i64 1, ptr {}", res_ptr));
        f.push(format!("store i64 {}, ptr {}", exp.repr, exp_ptr));
        f.push(format!("store i64 {}, ptr {}", base.repr, base_ptr));

        let chk_b = f.add_block("pow.chk");
        let loop_b = f.add_block("pow.loop");
        let mul_b = f.add_block("pow.mul");
        let cont_b = f.add_block("pow.cont");
        let end_b = f.add_block("pow.end");

        f.terminate(format!("br label %{}", f.label(chk_b)));

        f.select(chk_b);
        let cur = f.fresh();
        f.push(format!("{} = load i64, ptr {}", cur, exp_ptr));
        let positive = f.fresh();
        f.push(format!("{} = icmp sgt i64 {}, 0", positive, cur));
        f.terminate(format!(
            "br i1 {}, label %{}, label %{}",
            positive,
            f.label(loop_b),
            f.label(end_b)
        ));

        f.select(loop_b);
        let cur2 = f.fresh();
        f.push(format!("{} = load i64, ptr {}", cur2, exp_ptr));
        let low_bit = f.fresh();
        f.push(format!("{} = and i64 {}, 1", low_bit, cur2));
        let odd = f.fresh();
        f.push(format!("{} = icmp ne i64 {}, 0", odd, low_bit));
        f.terminate(format!(
            "br i1 {}, label %{}, label %{}",
            odd,
            f.label(mul_b),
            f.label(cont_b)
        ));

        f.select(mul_b);
        let res = f.fresh();
        f.push(format!("{} = load i64, ptr {}", res, res_ptr));
        let b = f.fresh();
        f.push(format!("{} = load i64, ptr {}", b, base_ptr));
        let product = f.fresh();
        f.push(format!("{} = mul i64 {}, {}", product, res, b));
        f.push(format!("store i64 {}, ptr {}", product, res_ptr));
        f.terminate(format!("br label %{}", f.label(cont_b)));

        f.select(cont_b);
        let b2 = f.fresh();
        f.push(format!("{} = load i64, ptr {}", b2, base_ptr));
        let squared = f.fresh();
        f.push(format!("{} = mul i64 {}, {}", squared, b2, b2));
        f.push(format!("store i64 {}, ptr {}", squared, base_ptr));
        let e = f.fresh();
        f.push(format!("{} = load i64, ptr {}", e, exp_ptr));
        let halved = f.fresh();
        f.push(format!("{} = ashr i64 {}, 1", halved, e));
        f.push(format!("store i64 {}, ptr {}", halved, exp_ptr));
        f.terminate(format!("br label %{}", f.label(chk_b)));

        f.select(end_b);
        let result = f.fresh();
        f.push(format!("{} = load i64, ptr {}", result, res_ptr));
        Val::int(result)
    }

    // =========================================================================
    // Calls
    // =========================================================================

    fn gen_call(&mut self, f: &mut FunctionBuilder, callee: &str, args: &[Expr]) -> Val {
        if self.user_funcs.contains(callee) {
            let mut operands = Vec::with_capacity(args.len());
            for arg in args {
                let value = self.gen_expr(f, arg);
                let value = self.to_i64(f, value);
                operands.push(format!("i64 {}", value.repr));
            }
            let tmp = f.fresh();
            f.push(format!("{} = call i64 @{}({})", tmp, callee, operands.join(", ")));
            return Val::int(tmp);
        }

        let Some(builtin) = self.registry.get(callee).cloned() else {
            return Val::zero();
        };
        match builtin.kind {
            BuiltinKind::Print => self.gen_print(f, args),
            BuiltinKind::Pure(_) => self.gen_pure_builtin(f, callee, args),
        }
    }

    /// Arguments print space-separated, dispatching the format string on
    /// the emitted value's IR type, followed by one newline.
    fn gen_print(&mut self, f: &mut FunctionBuilder, args: &[Expr]) -> Val {
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                let sep = self.ensure_global("fmt_sep", b" ");
                let tmp = f.fresh();
                f.push(format!("{} = call i32 (ptr, ...) @printf(ptr {})", tmp, sep));
            }
            let value = self.gen_expr(f, arg);
            let (fmt, operand) = match value.ty {
                Ty::F64 => (self.ensure_global("fmt_dec", b"%g"), format!("double {}", value.repr)),
                Ty::Ptr => (self.ensure_global("fmt_str", b"%s"), format!("ptr {}", value.repr)),
                Ty::I64 => (self.ensure_global("fmt_int", b"%ld"), format!("i64 {}", value.repr)),
            };
            let tmp = f.fresh();
            f.push(format!(
                "{} = call i32 (ptr, ...) @printf(ptr {}, {})",
                tmp, fmt, operand
            ));
        }
        let nl = self.ensure_global("fmt_nl", b"\n");
        let tmp = f.fresh();
        f.push(format!("{} = call i32 (ptr, ...) @printf(ptr {})", tmp, nl));
        Val::zero()
    }

    fn gen_pure_builtin(&mut self, f: &mut FunctionBuilder, name: &str, args: &[Expr]) -> Val {
        match name {
            "soma" => {
                let first = self.gen_expr(f, &args[0]);
                let mut acc = self.to_i64(f, first);
                for arg in &args[1..] {
                    let value = self.gen_expr(f, arg);
                    let value = self.to_i64(f, value);
                    let tmp = f.fresh();
                    f.push(format!("{} = add i64 {}, {}", tmp, acc.repr, value.repr));
                    acc = Val::int(tmp);
                }
                acc
            }
            "abs" => {
                let value = self.gen_expr(f, &args[0]);
                let value = self.to_i64(f, value);
                let negative = f.fresh();
                f.push(format!("{} = icmp slt i64 {}, 0", negative, value.repr));
                let negated = f.fresh();
                f.push(format!("{} = sub i64 0, {}", negated, value.repr));
                let tmp = f.fresh();
                f.push(format!(
                    "{} = select i1 {}, i64 {}, i64 {}",
                    tmp, negative, negated, value.repr
                ));
                Val::int(tmp)
            }
            _ => Val::zero(),
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn truth_test(&mut self, f: &mut FunctionBuilder, value: Val) -> String {
        let value = self.to_i64(f, value);
        let flag = f.fresh();
        f.push(format!("{} = icmp ne i64 {}, 0", flag, value.repr));
        flag
    }

    /// Coerces to i64: decimals truncate, pointers degrade to zero.
    fn to_i64(&mut self, f: &mut FunctionBuilder, value: Val) -> Val {
        match value.ty {
            Ty::I64 => value,
            Ty::F64 => {
                let tmp = f.fresh();
                f.push(format!("{} = fptosi double {} to i64", tmp, value.repr));
                Val::int(tmp)
            }
            Ty::Ptr => Val::zero(),
        }
    }

    fn lookup(&self, name: &str) -> Option<Binding> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).cloned())
    }

    fn bind(&mut self, name: &str, binding: Binding) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), binding);
        }
    }
}

impl Backend for LlvmBackend {
    fn name(&self) -> &'static str {
        "LLVM IR"
    }

    fn extension(&self) -> &'static str {
        ".ll"
    }

    fn compile(&mut self, program: &[Stmt]) -> Result<(), BackendError> {
        let module = self.emit_program(program);
        let ir_file = Path::new("programa.ll");
        write_artifact(ir_file, &module)?;

        // Producing a native executable is best-effort
        if let Err(err) = compile_to_executable(ir_file) {
            eprintln!("warning: {}", err);
            eprintln!("compile manually with: clang programa.ll -o programa");
        }
        Ok(())
    }
}

/// Tries `clang`, then falls back to running through `lli`.
fn compile_to_executable(ir_file: &Path) -> Result<(), BackendError> {
    let out_dir = Path::new("resultado");
    std::fs::create_dir_all(out_dir).map_err(|source| BackendError::Io {
        path: out_dir.to_path_buf(),
        source,
    })?;

    let executable = out_dir.join("programa");
    let clang = Command::new("clang")
        .arg("-O2")
        .arg("-o")
        .arg(&executable)
        .arg(ir_file)
        .status();

    match clang {
        Ok(status) if status.success() => Ok(()),
        _ => {
            let status = Command::new("lli")
                .arg(ir_file)
                .status()
                .map_err(|source| BackendError::ToolMissing { tool: "clang/lli", source })?;
            if status.success() {
                Ok(())
            } else {
                Err(BackendError::ToolFailed { tool: "lli", status })
            }
        }
    }
}
