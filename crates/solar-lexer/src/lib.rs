// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Lexical analysis for Solar source code.

mod lexer;

pub use lexer::{LexError, Lexer};
