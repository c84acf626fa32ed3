// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Syntactic analysis for Solar: recursive descent for statements,
//! Pratt precedence climbing for expressions.

mod parser;

pub use parser::{ParseError, Parser};
