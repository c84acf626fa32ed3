// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! The stack-machine executor.

use std::cell::RefCell;
use std::rc::Rc;

use solar_ast::Span;

use crate::opcode::{Instruction, OpCode};

/// One activation record: where to resume, and the local slots.
struct Frame {
    return_pc: usize,
    locals: Vec<i64>,
}

/// The Solar virtual machine.
pub struct Vm {
    stack: Vec<i64>,
    globals: Vec<i64>,
    frames: Vec<Frame>,
    /// Optional output buffer for capturing stdout (used in tests).
    output_buffer: Option<Rc<RefCell<String>>>,
}

impl Vm {
    pub fn new(global_count: usize) -> Self {
        Self {
            stack: Vec::with_capacity(64),
            globals: vec![0; global_count],
            frames: Vec::new(),
            output_buffer: None,
        }
    }

    /// Returns the machine and its output buffer reference.
    pub fn with_captured_output(global_count: usize) -> (Self, Rc<RefCell<String>>) {
        let buffer = Rc::new(RefCell::new(String::new()));
        let mut vm = Self::new(global_count);
        vm.output_buffer = Some(Rc::clone(&buffer));
        (vm, buffer)
    }

    pub fn execute(&mut self, code: &[Instruction]) -> Result<(), VmError> {
        let mut pc = 0usize;

        while let Some(instr) = code.get(pc) {
            match instr.op {
                OpCode::Const => self.stack.push(instr.operand),

                OpCode::Add => self.binary(|a, b| Ok(a.wrapping_add(b)), instr.span)?,
                OpCode::Sub => self.binary(|a, b| Ok(a.wrapping_sub(b)), instr.span)?,
                OpCode::Mul => self.binary(|a, b| Ok(a.wrapping_mul(b)), instr.span)?,
                OpCode::Div => self.binary(
                    |a, b| {
                        if b == 0 {
                            Err(VmError::DivisionByZero { span: Span::new(0, 0) })
                        } else {
                            Ok(a.wrapping_div(b))
                        }
                    },
                    instr.span,
                )?,
                OpCode::Pow => {
                    self.binary(|a, b| Ok((a as f64).powf(b as f64) as i64), instr.span)?
                }
                OpCode::Abs => {
                    let value = self.pop()?;
                    self.stack.push(value.wrapping_abs());
                }

                OpCode::Eq => self.binary(|a, b| Ok((a == b) as i64), instr.span)?,
                OpCode::Ne => self.binary(|a, b| Ok((a != b) as i64), instr.span)?,
                OpCode::Lt => self.binary(|a, b| Ok((a < b) as i64), instr.span)?,
                OpCode::Gt => self.binary(|a, b| Ok((a > b) as i64), instr.span)?,
                OpCode::Le => self.binary(|a, b| Ok((a <= b) as i64), instr.span)?,
                OpCode::Ge => self.binary(|a, b| Ok((a >= b) as i64), instr.span)?,

                OpCode::Load => {
                    let frame = self.frames.last().ok_or(VmError::NoFrame)?;
                    let value = *frame
                        .locals
                        .get(instr.operand as usize)
                        .ok_or(VmError::InvalidSlot(instr.operand))?;
                    self.stack.push(value);
                }
                OpCode::Store => {
                    let value = self.pop()?;
                    let frame = self.frames.last_mut().ok_or(VmError::NoFrame)?;
                    let slot = frame
                        .locals
                        .get_mut(instr.operand as usize)
                        .ok_or(VmError::InvalidSlot(instr.operand))?;
                    *slot = value;
                }
                OpCode::LoadGlobal => {
                    let value = *self
                        .globals
                        .get(instr.operand as usize)
                        .ok_or(VmError::InvalidSlot(instr.operand))?;
                    self.stack.push(value);
                }
                OpCode::StoreGlobal => {
                    let value = self.pop()?;
                    let slot = self
                        .globals
                        .get_mut(instr.operand as usize)
                        .ok_or(VmError::InvalidSlot(instr.operand))?;
                    *slot = value;
                }

                OpCode::Print => {
                    let count = instr.operand as usize;
                    let mut values = Vec::with_capacity(count);
                    for _ in 0..count {
                        values.push(self.pop()?);
                    }
                    values.reverse();
                    let line: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                    self.write_output(&format!("{}\n", line.join(" ")));
                    self.stack.push(0);
                }

                OpCode::Pop => {
                    self.pop()?;
                }

                OpCode::Jump => {
                    pc = instr.operand as usize;
                    continue;
                }
                OpCode::JumpIfFalse => {
                    if self.pop()? == 0 {
                        pc = instr.operand as usize;
                        continue;
                    }
                }

                OpCode::Call => {
                    self.frames.push(Frame { return_pc: pc + 1, locals: Vec::new() });
                    pc = instr.operand as usize;
                    continue;
                }
                OpCode::Enter => {
                    let frame = self.frames.last_mut().ok_or(VmError::NoFrame)?;
                    frame.locals = vec![0; instr.operand as usize];
                }
                OpCode::Ret => {
                    let frame = self.frames.pop().ok_or(VmError::NoFrame)?;
                    pc = frame.return_pc;
                    continue;
                }

                OpCode::Halt => return Ok(()),
            }

            pc += 1;
        }

        Ok(())
    }

    fn binary(
        &mut self,
        f: impl FnOnce(i64, i64) -> Result<i64, VmError>,
        span: Span,
    ) -> Result<(), VmError> {
        let b = self.pop()?;
        let a = self.pop()?;
        let value = f(a, b).map_err(|err| match err {
            VmError::DivisionByZero { .. } => VmError::DivisionByZero { span },
            other => other,
        })?;
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Result<i64, VmError> {
        self.stack.pop().ok_or(VmError::StackUnderflow)
    }

    fn write_output(&self, text: &str) {
        if let Some(buffer) = &self.output_buffer {
            buffer.borrow_mut().push_str(text);
        } else {
            print!("{}", text);
        }
    }
}

/// A virtual machine execution error.
#[derive(Debug, thiserror::Error)]
pub enum VmError {
    #[error("division by zero")]
    DivisionByZero { span: Span },

    #[error("value stack underflow")]
    StackUnderflow,

    #[error("frame access outside a function")]
    NoFrame,

    #[error("invalid variable slot {0}")]
    InvalidSlot(i64),
}

impl VmError {
    pub fn span(&self) -> Option<Span> {
        match self {
            VmError::DivisionByZero { span } => Some(*span),
            _ => None,
        }
    }
}
