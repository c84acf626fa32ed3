// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! End-to-end bytecode tests, including output parity with the
//! interpreter for integer programs.

use solar_bytecode::{BytecodeBackend, Vm, VmError};
use solar_interp::Interpreter;
use solar_lexer::Lexer;
use solar_parser::Parser;
use solar_stdlib::default_builtins;
use solar_types::TypeChecker;

fn check(source: &str) -> Vec<solar_ast::stmt::Stmt> {
    let registry = default_builtins();
    let tokens = Lexer::new(source, &registry).tokenize().expect("lexing failed");
    let stmts = Parser::new(tokens).parse().expect("parsing failed");
    TypeChecker::new(&registry).check(&stmts).expect("type checking failed");
    stmts
}

fn run(source: &str) -> (Result<(), VmError>, String) {
    let stmts = check(source);
    let mut backend = BytecodeBackend::new(default_builtins());
    let code = backend.generate(&stmts).expect("lowering failed");
    let (mut vm, output) = Vm::with_captured_output(backend.global_count());
    let result = vm.execute(&code);
    let captured = output.borrow().clone();
    (result, captured)
}

fn run_interpreter(source: &str) -> String {
    let stmts = check(source);
    let (mut interp, output) = Interpreter::with_captured_output(default_builtins());
    interp.run(&stmts).expect("interpretation failed");
    let captured = output.borrow().clone();
    captured
}

#[test]
fn end_to_end_scenarios() {
    let cases = [
        ("imprime(42);", "42\n"),
        ("x ~> (2 + 3) * 4; imprime(x);", "20\n"),
        ("n ~> 7; se n > 5 { imprime(1); } senao { imprime(0); }", "1\n"),
        (
            "s ~> 0; i ~> 1; enquanto i <= 5 { s ~> s + i; i ~> i + 1; } imprime(s);",
            "15\n",
        ),
        (
            "definir quad(x: inteiro): inteiro { retornar x * x; } imprime(quad(6));",
            "36\n",
        ),
        ("para (i ~> 0; i < 3; i ~> i + 1) { imprime(i); }", "0\n1\n2\n"),
    ];

    for (source, expected) in cases {
        let (result, output) = run(source);
        result.expect("execution failed");
        assert_eq!(output, expected, "source: {}", source);
    }
}

#[test]
fn output_matches_the_interpreter() {
    let programs = [
        "imprime(2 + 3 * 4, 2 ** 3 ** 2, 10 - 3 - 2);",
        "definir fib(n: inteiro): inteiro { se n < 2 { retornar n; } retornar fib(n - 1) + fib(n - 2); } imprime(fib(10));",
        "imprime(soma(1, 2, 3), abs(-7));",
        "x ~> 9; definir leitura(): inteiro { retornar x + 1; } imprime(leitura()); imprime(x);",
        "imprime(7 / 2, 7 ** 0);",
    ];

    for source in programs {
        let (result, bytecode_out) = run(source);
        result.expect("execution failed");
        assert_eq!(bytecode_out, run_interpreter(source), "source: {}", source);
    }
}

#[test]
fn recursion_gets_its_own_frame() {
    let source = "
        definir fatorial(n: inteiro): inteiro {
            se n <= 1 { retornar 1; }
            retornar n * fatorial(n - 1);
        }
        imprime(fatorial(10));
    ";
    let (result, output) = run(source);
    result.expect("execution failed");
    assert_eq!(output, "3628800\n");
}

#[test]
fn callee_writes_do_not_touch_globals() {
    let source = "
        g ~> 10;
        definir escrita(): inteiro { g ~> 99; retornar g; }
        imprime(escrita());
        imprime(g);
    ";
    let (result, output) = run(source);
    result.expect("execution failed");
    assert_eq!(output, "99\n10\n");
}

#[test]
fn principal_is_the_entry_point() {
    let (result, output) =
        run("imprime(5); definir principal(): inteiro { imprime(1); retornar 0; }");
    result.expect("execution failed");
    assert_eq!(output, "1\n");
}

#[test]
fn implicit_return_is_the_last_expression() {
    let (result, output) = run("definir tres(): inteiro { 1 + 2; } imprime(tres());");
    result.expect("execution failed");
    assert_eq!(output, "3\n");
}

#[test]
fn division_by_zero_reports_its_span() {
    let source = "x ~> 0; imprime(10 / x);";
    let (result, _) = run(source);
    match result.unwrap_err() {
        VmError::DivisionByZero { span } => {
            assert_eq!(&source[span.start..span.end], "10 / x");
        }
        other => panic!("expected DivisionByZero, got {:?}", other),
    }
}

#[test]
fn empty_for_condition_loops_until_return() {
    let source = "
        definir conta(): inteiro {
            n ~> 0;
            para (; ; n ~> n + 1) {
                se n == 3 { retornar n; }
            }
        }
        imprime(conta());
    ";
    let (result, output) = run(source);
    result.expect("execution failed");
    assert_eq!(output, "3\n");
}

#[test]
fn text_literals_are_rejected_at_lowering() {
    let registry = default_builtins();
    let tokens = Lexer::new("x ~> \"ola\";", &registry).tokenize().unwrap();
    let stmts = Parser::new(tokens).parse().unwrap();
    let err = BytecodeBackend::new(registry).generate(&stmts).unwrap_err();
    assert!(err.message.contains("text literals"), "{}", err.message);
}

#[test]
fn instructions_disassemble_readably() {
    let stmts = check("x ~> 5; imprime(x);");
    let mut backend = BytecodeBackend::new(default_builtins());
    let code = backend.generate(&stmts).unwrap();
    let listing: Vec<String> = code.iter().map(|i| i.to_string()).collect();
    assert_eq!(listing[0], "CONST 5");
    assert_eq!(listing[1], "STOREG 0");
    assert_eq!(listing[2], "LOADG 0");
    assert_eq!(listing[3], "PRINT 1");
    assert!(listing.last().unwrap().starts_with("HALT"));
}
