// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! The interpreter implementation.
//!
//! A tree-walk evaluator driven directly by the AST. Return propagation
//! uses the [`Flow`] sum type: block, loop, and conditional executors
//! inspect it and forward `Return` outward without further evaluation;
//! only the enclosing function call unwraps it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

mod call;
mod eval_expr;
mod exec_stmt;

use solar_ast::stmt::{FnDecl, Stmt, StmtKind};
use solar_ast::Span;
use solar_backend::{Backend, BackendError, ENTRY_FUNCTION};
use solar_stdlib::BuiltinRegistry;

use crate::env::Environment;
use crate::value::Value;

/// How a block finished.
#[derive(Debug)]
pub(crate) enum Flow {
    /// Fell through; the payload is the block's last value.
    Normal(Value),
    /// An explicit `retornar` is propagating outward.
    Return(Value),
}

/// The tree-walk interpreter.
pub struct Interpreter {
    /// Variable bindings of the environment currently executing.
    pub(crate) env: Environment,
    /// Function declarations by name.
    pub(crate) functions: HashMap<String, FnDecl>,
    /// Built-in signatures and implementations.
    pub(crate) registry: BuiltinRegistry,
    /// Optional output buffer for capturing stdout (used in tests).
    output_buffer: Option<Rc<RefCell<String>>>,
}

impl Interpreter {
    pub fn new(registry: BuiltinRegistry) -> Self {
        Self {
            env: Environment::new(),
            functions: HashMap::new(),
            registry,
            output_buffer: None,
        }
    }

    /// Returns interpreter and output buffer reference.
    pub fn with_captured_output(registry: BuiltinRegistry) -> (Self, Rc<RefCell<String>>) {
        let buffer = Rc::new(RefCell::new(String::new()));
        let mut interp = Self::new(registry);
        interp.output_buffer = Some(Rc::clone(&buffer));
        (interp, buffer)
    }

    /// Executes a program and returns its final value.
    ///
    /// If a top-level function named `principal` exists, execution is a
    /// synthetic call to it; otherwise top-level statements run in source
    /// order after all function declarations are registered.
    pub fn run(&mut self, program: &[Stmt]) -> Result<Value, RuntimeDiagnostic> {
        let mut entry = None;
        for stmt in program {
            if let StmtKind::Fn(decl) = &stmt.kind {
                self.functions.insert(decl.name.clone(), decl.clone());
                if decl.name == ENTRY_FUNCTION {
                    entry = Some(decl.clone());
                }
            }
        }

        if let Some(decl) = entry {
            return self.call_function(&decl, Vec::new(), Span::new(0, 0));
        }

        let mut last = Value::zero();
        for stmt in program {
            if matches!(stmt.kind, StmtKind::Fn(_)) {
                continue;
            }
            match self.exec_stmt(stmt)? {
                Flow::Normal(value) => last = value,
                // A stray top-level `retornar` ends the program with its value
                Flow::Return(value) => return Ok(value),
            }
        }
        Ok(last)
    }

    pub(crate) fn write_output(&self, text: &str) {
        if let Some(buffer) = &self.output_buffer {
            buffer.borrow_mut().push_str(text);
        } else {
            print!("{}", text);
        }
    }
}

impl Backend for Interpreter {
    fn name(&self) -> &'static str {
        "AST interpreter"
    }

    fn extension(&self) -> &'static str {
        ""
    }

    fn compile(&mut self, program: &[Stmt]) -> Result<(), BackendError> {
        self.run(program).map(|_| ()).map_err(|diag| BackendError::Runtime {
            message: diag.error.to_string(),
            span: Some(diag.span),
        })
    }
}

/// A runtime error.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("variable '{0}' is not defined")]
    UndefinedVariable(String),

    #[error("function '{0}' is not defined")]
    UndefinedFunction(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("function '{func}' expects {expected} argument(s), got {got}")]
    ArityMismatch { func: String, expected: usize, got: usize },

    #[error("function '{func}' requires at least {min} argument(s), got {got}")]
    MinArity { func: String, min: usize, got: usize },

    #[error("function '{func}' accepts at most {max} argument(s), got {got}")]
    MaxArity { func: String, max: usize, got: usize },

    #[error("non-numeric operand of type {0}")]
    NonNumericOperand(&'static str),

    #[error("operands have mixed numeric types")]
    MixedNumericOperands,
}

/// Runtime error with source location for diagnostic display.
#[derive(Debug)]
pub struct RuntimeDiagnostic {
    pub error: RuntimeError,
    pub span: Span,
}

impl RuntimeDiagnostic {
    pub fn new(error: RuntimeError, span: Span) -> Self {
        Self { error, span }
    }
}

impl std::fmt::Display for RuntimeDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for RuntimeDiagnostic {}
