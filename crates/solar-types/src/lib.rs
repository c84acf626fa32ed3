// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Static type checking for Solar.
//!
//! Local inference restricted to the language's monomorphic types: no
//! coercion, no polymorphism. The checker never mutates the AST; it
//! produces a map from node id to inferred type as its only output.

mod checker;

pub use checker::{FnSig, TypeChecker, TypeError, TypedProgram};
