// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Assembling and linking through the system toolchain.

use std::path::Path;
use std::process::Command;

use solar_backend::BackendError;

/// Runs `as` then `ld`, producing `result/programa`.
///
/// `-I .` lets the assembler find `external/runtime.s` relative to the
/// working directory.
pub(crate) fn assemble_and_link(asm_file: &Path) -> Result<(), BackendError> {
    let object = Path::new("result/programa.o");
    let executable = Path::new("result/programa");

    if let Some(dir) = object.parent() {
        std::fs::create_dir_all(dir).map_err(|source| BackendError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    run_tool("as", Command::new("as").args(["-I", "."]).arg("-o").arg(object).arg(asm_file))?;
    run_tool("ld", Command::new("ld").arg("-o").arg(executable).arg(object))?;
    Ok(())
}

fn run_tool(tool: &'static str, command: &mut Command) -> Result<(), BackendError> {
    let status = command
        .status()
        .map_err(|source| BackendError::ToolMissing { tool, source })?;
    if !status.success() {
        return Err(BackendError::ToolFailed { tool, status });
    }
    Ok(())
}
