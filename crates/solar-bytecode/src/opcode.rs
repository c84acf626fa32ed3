//! Instruction set of the Solar virtual machine.

use std::fmt;

use solar_ast::Span;

/// One stack-machine operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    /// Push the operand.
    Const,
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Abs,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    /// Push the current frame's local slot `operand`.
    Load,
    /// Pop into the current frame's local slot `operand`.
    Store,
    /// Push global slot `operand`.
    LoadGlobal,
    /// Pop into global slot `operand`.
    StoreGlobal,
    /// Pop `operand` values, print them space-separated with a newline,
    /// push the neutral 0.
    Print,
    /// Discard the top of the stack.
    Pop,
    /// Unconditional jump to `operand`.
    Jump,
    /// Pop a condition; jump to `operand` when it is zero.
    JumpIfFalse,
    /// Call the function at `operand`.
    Call,
    /// Open a frame with `operand` local slots.
    Enter,
    /// Close the current frame and resume at the saved address.
    Ret,
    Halt,
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OpCode::Const => "CONST",
            OpCode::Add => "ADD",
            OpCode::Sub => "SUB",
            OpCode::Mul => "MUL",
            OpCode::Div => "DIV",
            OpCode::Pow => "POW",
            OpCode::Abs => "ABS",
            OpCode::Eq => "EQ",
            OpCode::Ne => "NE",
            OpCode::Lt => "LT",
            OpCode::Gt => "GT",
            OpCode::Le => "LE",
            OpCode::Ge => "GE",
            OpCode::Load => "LOAD",
            OpCode::Store => "STORE",
            OpCode::LoadGlobal => "LOADG",
            OpCode::StoreGlobal => "STOREG",
            OpCode::Print => "PRINT",
            OpCode::Pop => "POP",
            OpCode::Jump => "JMP",
            OpCode::JumpIfFalse => "JF",
            OpCode::Call => "CALL",
            OpCode::Enter => "ENTER",
            OpCode::Ret => "RET",
            OpCode::Halt => "HALT",
        };
        f.write_str(name)
    }
}

/// An instruction with its operand and originating source span.
#[derive(Debug, Clone, Copy)]
pub struct Instruction {
    pub op: OpCode,
    pub operand: i64,
    pub span: Span,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op {
            OpCode::Const
            | OpCode::Load
            | OpCode::Store
            | OpCode::LoadGlobal
            | OpCode::StoreGlobal
            | OpCode::Print
            | OpCode::Jump
            | OpCode::JumpIfFalse
            | OpCode::Call
            | OpCode::Enter => write!(f, "{} {}", self.op, self.operand),
            _ => write!(f, "{}", self.op),
        }
    }
}
