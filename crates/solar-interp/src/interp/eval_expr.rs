// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Expression evaluation.

use solar_ast::expr::{BinOp, Expr, ExprKind};
use solar_ast::Span;

use crate::value::Value;

use super::{Interpreter, RuntimeDiagnostic, RuntimeError};

/// A numeric operand after boolean coercion.
enum Num {
    Int(i64),
    Float(f64),
}

impl Interpreter {
    pub(crate) fn eval_expr(&mut self, expr: &Expr) -> Result<Value, RuntimeDiagnostic> {
        match &expr.kind {
            ExprKind::Int(n) => Ok(Value::Int(*n)),
            ExprKind::Float(f) => Ok(Value::Float(*f)),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Str(s) => Ok(Value::Str(s.clone())),

            ExprKind::Var(name) => self.env.get(name).cloned().ok_or_else(|| {
                RuntimeDiagnostic::new(RuntimeError::UndefinedVariable(name.clone()), expr.span)
            }),

            ExprKind::Binary { op, left, right } => {
                let lhs = self.eval_expr(left)?;
                let rhs = self.eval_expr(right)?;
                self.eval_binary(*op, lhs, rhs, expr.span)
            }

            ExprKind::Call { callee, args } => self.eval_call(callee, args, expr.span),
        }
    }

    fn eval_binary(
        &mut self,
        op: BinOp,
        lhs: Value,
        rhs: Value,
        span: Span,
    ) -> Result<Value, RuntimeDiagnostic> {
        // Equality works on any pair of same-typed values
        if op.is_equality() {
            return self.eval_equality(op, lhs, rhs, span);
        }

        let l = as_num(&lhs).map_err(|e| RuntimeDiagnostic::new(e, span))?;
        let r = as_num(&rhs).map_err(|e| RuntimeDiagnostic::new(e, span))?;

        match (l, r) {
            (Num::Int(a), Num::Int(b)) => self.int_op(op, a, b, span),
            (Num::Float(a), Num::Float(b)) => self.float_op(op, a, b, span),
            _ => Err(RuntimeDiagnostic::new(RuntimeError::MixedNumericOperands, span)),
        }
    }

    fn eval_equality(
        &mut self,
        op: BinOp,
        lhs: Value,
        rhs: Value,
        span: Span,
    ) -> Result<Value, RuntimeDiagnostic> {
        let equal = match (&lhs, &rhs) {
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            // Integers and booleans interoperate through 0/1 coercion
            _ => {
                let a = as_num(&lhs).map_err(|e| RuntimeDiagnostic::new(e, span))?;
                let b = as_num(&rhs).map_err(|e| RuntimeDiagnostic::new(e, span))?;
                match (a, b) {
                    (Num::Int(a), Num::Int(b)) => a == b,
                    (Num::Float(a), Num::Float(b)) => a == b,
                    _ => {
                        return Err(RuntimeDiagnostic::new(
                            RuntimeError::MixedNumericOperands,
                            span,
                        ))
                    }
                }
            }
        };
        let equal = if op == BinOp::Ne { !equal } else { equal };
        // Comparisons yield 0/1 so they interoperate with integer truth tests
        Ok(Value::Int(equal as i64))
    }

    fn int_op(&self, op: BinOp, a: i64, b: i64, span: Span) -> Result<Value, RuntimeDiagnostic> {
        let value = match op {
            BinOp::Add => Value::Int(a.wrapping_add(b)),
            BinOp::Sub => Value::Int(a.wrapping_sub(b)),
            BinOp::Mul => Value::Int(a.wrapping_mul(b)),
            BinOp::Div => {
                if b == 0 {
                    return Err(RuntimeDiagnostic::new(RuntimeError::DivisionByZero, span));
                }
                Value::Int(a.wrapping_div(b))
            }
            // pow over the widened float representation, truncated back
            BinOp::Pow => Value::Int((a as f64).powf(b as f64) as i64),
            BinOp::Lt => Value::Int((a < b) as i64),
            BinOp::Gt => Value::Int((a > b) as i64),
            BinOp::Le => Value::Int((a <= b) as i64),
            BinOp::Ge => Value::Int((a >= b) as i64),
            BinOp::Eq | BinOp::Ne => unreachable!("equality is handled separately"),
        };
        Ok(value)
    }

    fn float_op(&self, op: BinOp, a: f64, b: f64, span: Span) -> Result<Value, RuntimeDiagnostic> {
        let value = match op {
            BinOp::Add => Value::Float(a + b),
            BinOp::Sub => Value::Float(a - b),
            BinOp::Mul => Value::Float(a * b),
            BinOp::Div => {
                if b == 0.0 {
                    return Err(RuntimeDiagnostic::new(RuntimeError::DivisionByZero, span));
                }
                Value::Float(a / b)
            }
            BinOp::Pow => Value::Float(a.powf(b)),
            BinOp::Lt => Value::Int((a < b) as i64),
            BinOp::Gt => Value::Int((a > b) as i64),
            BinOp::Le => Value::Int((a <= b) as i64),
            BinOp::Ge => Value::Int((a >= b) as i64),
            BinOp::Eq | BinOp::Ne => unreachable!("equality is handled separately"),
        };
        Ok(value)
    }
}

fn as_num(value: &Value) -> Result<Num, RuntimeError> {
    match value {
        Value::Int(n) => Ok(Num::Int(*n)),
        // Booleans coerce to 1/0 in arithmetic contexts
        Value::Bool(b) => Ok(Num::Int(*b as i64)),
        Value::Float(f) => Ok(Num::Float(*f)),
        Value::Str(_) => Err(RuntimeError::NonNumericOperand(value.type_name())),
    }
}
