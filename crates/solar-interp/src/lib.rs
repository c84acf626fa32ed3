// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! The tree-walking interpreter backend.

mod env;
mod interp;
mod value;

pub use env::Environment;
pub use interp::{Interpreter, RuntimeDiagnostic, RuntimeError};
pub use value::Value;
