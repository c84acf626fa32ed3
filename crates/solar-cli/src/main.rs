// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! The `solar-compiler` binary: flag parsing, the compilation pipeline,
//! and diagnostic rendering.

use std::process;
use std::str::FromStr;

use colored::Colorize;
use solar_ast::{LineMap, Span};
use solar_backend::Backend;
use solar_bytecode::BytecodeBackend;
use solar_codegen::{Arch, X86_64Backend};
use solar_interp::Interpreter;
use solar_lexer::Lexer;
use solar_llvm::LlvmBackend;
use solar_parser::Parser;
use solar_resolve::ModuleResolver;
use solar_stdlib::default_builtins;
use solar_types::TypeChecker;

/// Which backend consumes the checked AST.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BackendChoice {
    Interpreter,
    Assembly,
    Llvm,
    Bytecode,
}

impl FromStr for BackendChoice {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "interpreter" | "interp" | "ast" => Ok(BackendChoice::Interpreter),
            "assembly" | "asm" | "native" => Ok(BackendChoice::Assembly),
            "llvm" | "llvmir" | "ir" => Ok(BackendChoice::Llvm),
            "bytecode" | "bc" | "vm" => Ok(BackendChoice::Bytecode),
            _ => Err(()),
        }
    }
}

/// Parsed command line.
#[derive(Debug)]
struct Config {
    input: String,
    backend: BackendChoice,
    arch: String,
    debug: bool,
    help: bool,
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let config = match parse_args(&args) {
        Ok(config) => config,
        Err(message) => {
            eprintln!("{} {}", "error:".red().bold(), message);
            process::exit(1);
        }
    };

    if config.help {
        print_usage();
        return;
    }

    process::exit(run(&config));
}

fn parse_args(args: &[String]) -> Result<Config, String> {
    let mut backend = BackendChoice::Interpreter;
    let mut arch = "x86_64".to_string();
    let mut debug = false;
    let mut help = false;
    let mut input = None;

    for arg in args {
        if let Some(flag) = arg.strip_prefix('-') {
            let flag = flag.strip_prefix('-').unwrap_or(flag);
            let (name, value) = match flag.split_once('=') {
                Some((name, value)) => (name, Some(value)),
                None => (flag, None),
            };
            match (name, value) {
                ("backend", Some(value)) => {
                    backend = value.parse().map_err(|()| {
                        format!(
                            "unknown backend '{}' (accepted: interpreter|interp|ast, \
                             assembly|asm|native, llvm|llvmir|ir, bytecode|bc|vm)",
                            value
                        )
                    })?;
                }
                ("arch", Some(value)) => arch = value.to_string(),
                ("debug", None) => debug = true,
                ("help", None) | ("h", None) => help = true,
                _ => return Err(format!("unknown flag '{}'", arg)),
            }
        } else if input.is_none() {
            input = Some(arg.clone());
        } else {
            return Err(format!("unexpected argument '{}'", arg));
        }
    }

    if help {
        return Ok(Config {
            input: String::new(),
            backend,
            arch,
            debug,
            help,
        });
    }

    let input = input.ok_or_else(|| "input file required (see -help)".to_string())?;
    Ok(Config { input, backend, arch, debug, help })
}

fn print_usage() {
    println!("Solar compiler");
    println!();
    println!("Usage: solar-compiler [flags] <file>");
    println!();
    println!("Flags:");
    println!("  -backend=<kind>  Backend to use (default: interpreter)");
    println!("  -arch=<arch>     Architecture for assembly (default: x86_64)");
    println!("  -debug           Print tokens and the parsed tree");
    println!("  -help            Show this help");
    println!();
    println!("Backends:");
    println!("  interpreter, interp, ast   Direct AST interpretation");
    println!("  assembly, asm, native      Native x86-64 assembly via as/ld");
    println!("  llvm, llvmir, ir           Textual LLVM IR, compiled with clang when available");
    println!("  bytecode, bc, vm           Stack bytecode executed on the built-in VM");
}

/// Runs the full pipeline; returns the process exit code.
fn run(config: &Config) -> i32 {
    let source = match std::fs::read_to_string(&config.input) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("{} cannot read {}: {}", "error:".red().bold(), config.input, err);
            return 1;
        }
    };

    let registry = default_builtins();

    // Lex
    let tokens = match Lexer::new(&source, &registry).tokenize() {
        Ok(tokens) => tokens,
        Err(err) => {
            show_error(&source, err.span, &err.message, err.hint.as_deref());
            return 1;
        }
    };

    if config.debug {
        dump_tokens(&source, &tokens);
    }

    // Parse
    let mut parser = Parser::new(tokens);
    let stmts = match parser.parse() {
        Ok(stmts) => stmts,
        Err(err) => {
            show_error(&source, err.span, &err.message, err.hint.as_deref());
            return 1;
        }
    };

    if config.debug {
        println!("=== AST ({} statements) ===", stmts.len());
        for stmt in &stmts {
            println!("{:#?}", stmt);
        }
    }

    // Resolve imports
    let mut resolver = ModuleResolver::new(&registry).with_source_file(&config.input);
    let stmts = match resolver.expand_program(stmts, parser.next_unused_id()) {
        Ok(stmts) => stmts,
        Err(err) => {
            eprintln!("{} {}", "error:".red().bold(), err);
            return 1;
        }
    };

    // Type check
    if let Err(err) = TypeChecker::new(&registry).check(&stmts) {
        show_error(&source, err.span(), &err.to_string(), None);
        return 1;
    }

    // Dispatch to the selected backend
    let mut backend: Box<dyn Backend> = match config.backend {
        BackendChoice::Interpreter => Box::new(Interpreter::new(registry)),
        BackendChoice::Assembly => {
            if Arch::from_str(&config.arch).is_err() {
                eprintln!(
                    "{} unknown architecture '{}' (accepted: x86_64)",
                    "error:".red().bold(),
                    config.arch
                );
                return 1;
            }
            Box::new(X86_64Backend::new(registry))
        }
        BackendChoice::Llvm => Box::new(LlvmBackend::new(registry)),
        BackendChoice::Bytecode => Box::new(BytecodeBackend::new(registry)),
    };

    if config.debug {
        println!("=== Backend: {} ===", backend.name());
    }

    if let Err(err) = backend.compile(&stmts) {
        match err {
            solar_backend::BackendError::Runtime { ref message, span: Some(span) } => {
                show_error(&source, span, message, None);
            }
            other => eprintln!("{} {}", "error:".red().bold(), other),
        }
        return 1;
    }

    match config.backend {
        BackendChoice::Assembly => {
            println!("assembly written to programa.s, executable at result/programa");
        }
        BackendChoice::Llvm => {
            println!("LLVM IR written to programa.ll");
        }
        BackendChoice::Interpreter | BackendChoice::Bytecode => {}
    }
    0
}

fn dump_tokens(source: &str, tokens: &[solar_ast::token::Token]) {
    let line_map = LineMap::new(source);
    println!("=== Tokens ({}) ===", tokens.len());
    for token in tokens {
        let (line, col) = line_map.offset_to_line_col(token.span.start);
        println!("{:4}:{:<3} {:?}", line, col, token.kind);
    }
}

/// Renders a positioned diagnostic: the message, then the offending line
/// with a caret under the error column.
fn show_error(source: &str, span: Span, message: &str, hint: Option<&str>) {
    let line_map = LineMap::new(source);
    let (line, col) = line_map.offset_to_line_col(span.start);

    eprintln!("{} {}", "error:".red().bold(), message);
    eprintln!("  --> line {}:{}", line, col);
    if let Some(text) = line_map.line_text(source, line) {
        eprintln!("   |");
        eprintln!("{:3}| {}", line, text);
        eprintln!("   | {}^", " ".repeat((col as usize).saturating_sub(1)));
    }
    if let Some(hint) = hint {
        eprintln!("   = hint: {}", hint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn default_backend_is_the_interpreter() {
        let config = parse_args(&args(&["programa.solar"])).unwrap();
        assert_eq!(config.backend, BackendChoice::Interpreter);
        assert_eq!(config.arch, "x86_64");
        assert_eq!(config.input, "programa.solar");
        assert!(!config.debug);
    }

    #[test]
    fn backend_aliases_resolve() {
        for alias in ["interpreter", "interp", "ast"] {
            assert_eq!(alias.parse(), Ok(BackendChoice::Interpreter));
        }
        for alias in ["assembly", "asm", "native"] {
            assert_eq!(alias.parse(), Ok(BackendChoice::Assembly));
        }
        for alias in ["llvm", "llvmir", "ir"] {
            assert_eq!(alias.parse(), Ok(BackendChoice::Llvm));
        }
        for alias in ["bytecode", "bc", "vm"] {
            assert_eq!(alias.parse(), Ok(BackendChoice::Bytecode));
        }
        assert_eq!("jit".parse::<BackendChoice>(), Err(()));
    }

    #[test]
    fn unknown_backend_lists_accepted_values() {
        let err = parse_args(&args(&["-backend=jvm", "x.solar"])).unwrap_err();
        assert!(err.contains("unknown backend 'jvm'"));
        assert!(err.contains("interpreter|interp|ast"));
    }

    #[test]
    fn flags_accept_one_or_two_dashes() {
        let config = parse_args(&args(&["--backend=asm", "-debug", "x.solar"])).unwrap();
        assert_eq!(config.backend, BackendChoice::Assembly);
        assert!(config.debug);
    }

    #[test]
    fn missing_input_is_an_error() {
        let err = parse_args(&args(&["-debug"])).unwrap_err();
        assert!(err.contains("input file required"));
    }

    #[test]
    fn extra_positional_arguments_are_rejected() {
        let err = parse_args(&args(&["a.solar", "b.solar"])).unwrap_err();
        assert!(err.contains("unexpected argument"));
    }

    #[test]
    fn help_needs_no_input() {
        let config = parse_args(&args(&["-help"])).unwrap();
        assert!(config.help);
    }
}
