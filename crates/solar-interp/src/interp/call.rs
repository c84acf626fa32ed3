// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Function calling: user functions and built-ins.

use solar_ast::expr::Expr;
use solar_ast::stmt::FnDecl;
use solar_ast::Span;
use solar_stdlib::{Builtin, BuiltinKind};

use crate::value::Value;

use super::{Flow, Interpreter, RuntimeDiagnostic, RuntimeError};

impl Interpreter {
    pub(crate) fn eval_call(
        &mut self,
        callee: &str,
        args: &[Expr],
        span: Span,
    ) -> Result<Value, RuntimeDiagnostic> {
        if let Some(decl) = self.functions.get(callee).cloned() {
            // Arguments are evaluated in the caller's environment
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(self.eval_expr(arg)?);
            }
            return self.call_function(&decl, values, span);
        }

        if let Some(builtin) = self.registry.get(callee).cloned() {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(self.eval_expr(arg)?);
            }
            return self.call_builtin(&builtin, values, span);
        }

        Err(RuntimeDiagnostic::new(
            RuntimeError::UndefinedFunction(callee.to_string()),
            span,
        ))
    }

    /// Runs a user function in a fresh environment cloned from the caller's.
    pub(crate) fn call_function(
        &mut self,
        decl: &FnDecl,
        args: Vec<Value>,
        span: Span,
    ) -> Result<Value, RuntimeDiagnostic> {
        if args.len() != decl.params.len() {
            return Err(RuntimeDiagnostic::new(
                RuntimeError::ArityMismatch {
                    func: decl.name.clone(),
                    expected: decl.params.len(),
                    got: args.len(),
                },
                span,
            ));
        }

        // The callee sees the caller's bindings (globals included) but its
        // own writes vanish when the caller's environment is restored.
        let mut local = self.env.clone();
        for (param, value) in decl.params.iter().zip(args) {
            local.define(param.name.clone(), value);
        }

        let saved = std::mem::replace(&mut self.env, local);
        let result = self.exec_block(&decl.body);
        self.env = saved;

        match result? {
            Flow::Return(value) => Ok(value),
            // Implicit return: the block's last value
            Flow::Normal(value) => Ok(value),
        }
    }

    fn call_builtin(
        &mut self,
        builtin: &Builtin,
        args: Vec<Value>,
        span: Span,
    ) -> Result<Value, RuntimeDiagnostic> {
        if args.len() < builtin.min_args {
            return Err(RuntimeDiagnostic::new(
                RuntimeError::MinArity {
                    func: builtin.name.to_string(),
                    min: builtin.min_args,
                    got: args.len(),
                },
                span,
            ));
        }
        if let Some(max) = builtin.max_args {
            if args.len() > max {
                return Err(RuntimeDiagnostic::new(
                    RuntimeError::MaxArity {
                        func: builtin.name.to_string(),
                        max,
                        got: args.len(),
                    },
                    span,
                ));
            }
        }

        match builtin.kind {
            BuiltinKind::Print => {
                let mut line = String::new();
                for (i, value) in args.iter().enumerate() {
                    if i > 0 {
                        line.push(' ');
                    }
                    line.push_str(&value.display());
                }
                line.push('\n');
                self.write_output(&line);
                Ok(Value::zero())
            }
            BuiltinKind::Pure(f) => {
                let mut ints = Vec::with_capacity(args.len());
                for value in &args {
                    let n = match value {
                        Value::Int(n) => *n,
                        Value::Bool(b) => *b as i64,
                        other => {
                            return Err(RuntimeDiagnostic::new(
                                RuntimeError::NonNumericOperand(other.type_name()),
                                span,
                            ))
                        }
                    };
                    ints.push(n);
                }
                Ok(Value::Int(f(&ints)))
            }
        }
    }
}
