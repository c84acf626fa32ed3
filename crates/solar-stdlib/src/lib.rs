// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! The Solar built-in function registry.
//!
//! The registry is constructed once at program start and passed explicitly
//! to the phases that consult it: the lexer (identifier classification),
//! the type checker (signatures), and the backends (execution or lowering).

mod builtins;
mod registry;

pub use builtins::default_builtins;
pub use registry::{ArgRule, Builtin, BuiltinKind, BuiltinRegistry};
