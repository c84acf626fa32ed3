// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Statement execution.

use solar_ast::stmt::{Stmt, StmtKind};

use crate::value::Value;

use super::{Flow, Interpreter, RuntimeDiagnostic};

impl Interpreter {
    pub(crate) fn exec_stmt(&mut self, stmt: &Stmt) -> Result<Flow, RuntimeDiagnostic> {
        match &stmt.kind {
            StmtKind::Expr(expr) => Ok(Flow::Normal(self.eval_expr(expr)?)),

            StmtKind::Assign { name, value, .. } => {
                let value = self.eval_expr(value)?;
                self.env.define(name.clone(), value.clone());
                Ok(Flow::Normal(value))
            }

            StmtKind::If { cond, then_block, else_block } => {
                let cond = self.eval_expr(cond)?;
                if cond.is_truthy() {
                    self.exec_block(then_block)
                } else if let Some(else_block) = else_block {
                    self.exec_block(else_block)
                } else {
                    Ok(Flow::Normal(Value::zero()))
                }
            }

            StmtKind::While { cond, body } => {
                let mut last = Value::zero();
                loop {
                    if !self.eval_expr(cond)?.is_truthy() {
                        break;
                    }
                    match self.exec_block(body)? {
                        Flow::Normal(value) => last = value,
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
                Ok(Flow::Normal(last))
            }

            StmtKind::For { init, cond, step, body } => {
                // The init binding lands in the enclosing environment and
                // outlives the loop.
                if let Some(init) = init {
                    self.exec_stmt(init)?;
                }
                let mut last = Value::zero();
                loop {
                    let keep_going = match cond {
                        Some(cond) => self.eval_expr(cond)?.is_truthy(),
                        // Empty condition means true
                        None => true,
                    };
                    if !keep_going {
                        break;
                    }
                    match self.exec_block(body)? {
                        Flow::Normal(value) => last = value,
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                    if let Some(step) = step {
                        self.exec_stmt(step)?;
                    }
                }
                Ok(Flow::Normal(last))
            }

            StmtKind::Fn(decl) => {
                self.functions.insert(decl.name.clone(), decl.clone());
                Ok(Flow::Normal(Value::zero()))
            }

            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval_expr(expr)?,
                    None => Value::zero(),
                };
                Ok(Flow::Return(value))
            }

            // Imports were spliced away by the resolver
            StmtKind::Import(_) => Ok(Flow::Normal(Value::zero())),
        }
    }

    /// Runs a block, forwarding `Return` without evaluating further.
    pub(crate) fn exec_block(&mut self, stmts: &[Stmt]) -> Result<Flow, RuntimeDiagnostic> {
        let mut last = Value::zero();
        for stmt in stmts {
            match self.exec_stmt(stmt)? {
                Flow::Normal(value) => last = value,
                flow @ Flow::Return(_) => return Ok(flow),
            }
        }
        Ok(Flow::Normal(last))
    }
}
