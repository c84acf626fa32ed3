// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! The contract every Solar backend implements.
//!
//! A backend consumes the type-checked top-level statement list and either
//! evaluates it (interpreter) or produces artifacts (assembly, LLVM IR).

use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use solar_ast::stmt::Stmt;
use solar_ast::Span;

/// A consumer of the type-checked AST.
pub trait Backend {
    /// Human-readable backend name for diagnostics.
    fn name(&self) -> &'static str;

    /// Canonical output file extension; empty for the interpreter.
    fn extension(&self) -> &'static str;

    /// Compile (or execute) the program.
    fn compile(&mut self, program: &[Stmt]) -> Result<(), BackendError>;
}

/// An error produced by a backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// A runtime failure in the interpreter, with its source span when known.
    #[error("{message}")]
    Runtime { message: String, span: Option<Span> },

    #[error("failed to write {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("'{tool}' is not available")]
    ToolMissing {
        tool: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("'{tool}' exited with status {status}")]
    ToolFailed { tool: &'static str, status: ExitStatus },
}

/// Write a backend artifact, creating parent directories as needed.
pub fn write_artifact(path: &Path, contents: &str) -> Result<(), BackendError> {
    let io_err = |source| BackendError::Io { path: path.to_path_buf(), source };
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir).map_err(io_err)?;
        }
    }
    std::fs::write(path, contents).map_err(io_err)
}

/// The name a program's entry function must have.
///
/// When a top-level function called `principal` exists, backends execute a
/// synthetic call to it instead of running top-level statements.
pub const ENTRY_FUNCTION: &str = "principal";
