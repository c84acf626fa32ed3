// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! The bytecode backend: a stack-machine compiler and its virtual machine.
//!
//! Programs lower to a flat instruction vector (control flow becomes
//! backpatched jumps, calls push frames) which the VM then executes
//! directly. Integer-only, like the native backend.

mod generator;
mod opcode;
mod vm;

pub use generator::BytecodeBackend;
pub use opcode::{Instruction, OpCode};
pub use vm::{Vm, VmError};
