// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! End-to-end interpreter tests: each program is lexed, parsed, type
//! checked, and run against a captured output buffer.

use solar_interp::{Interpreter, RuntimeError, Value};
use solar_lexer::Lexer;
use solar_parser::Parser;
use solar_stdlib::default_builtins;
use solar_types::TypeChecker;

/// Runs a checked program and returns its stdout.
fn run(source: &str) -> String {
    let registry = default_builtins();
    let tokens = Lexer::new(source, &registry).tokenize().expect("lexing failed");
    let stmts = Parser::new(tokens).parse().expect("parsing failed");
    TypeChecker::new(&registry).check(&stmts).expect("type checking failed");

    let (mut interp, output) = Interpreter::with_captured_output(registry);
    interp.run(&stmts).expect("execution failed");
    let captured = output.borrow().clone();
    captured
}

/// Runs without the type checker, for semantics the checker cannot see.
fn run_unchecked(source: &str) -> (Result<Value, solar_interp::RuntimeDiagnostic>, String) {
    let registry = default_builtins();
    let tokens = Lexer::new(source, &registry).tokenize().expect("lexing failed");
    let stmts = Parser::new(tokens).parse().expect("parsing failed");

    let (mut interp, output) = Interpreter::with_captured_output(registry);
    let result = interp.run(&stmts);
    let captured = output.borrow().clone();
    (result, captured)
}

#[test]
fn hello_integer() {
    assert_eq!(run("imprime(42);"), "42\n");
}

#[test]
fn arithmetic_with_parentheses() {
    assert_eq!(run("x ~> (2 + 3) * 4; imprime(x);"), "20\n");
}

#[test]
fn conditional() {
    assert_eq!(
        run("n ~> 7; se n > 5 { imprime(1); } senao { imprime(0); }"),
        "1\n"
    );
    assert_eq!(
        run("n ~> 3; se n > 5 { imprime(1); } senao { imprime(0); }"),
        "0\n"
    );
}

#[test]
fn while_loop_sums_one_to_five() {
    assert_eq!(
        run("s ~> 0; i ~> 1; enquanto i <= 5 { s ~> s + i; i ~> i + 1; } imprime(s);"),
        "15\n"
    );
}

#[test]
fn user_function() {
    assert_eq!(
        run("definir quad(x: inteiro): inteiro { retornar x * x; } imprime(quad(6));"),
        "36\n"
    );
}

#[test]
fn for_loop_counts() {
    assert_eq!(
        run("para (i ~> 0; i < 3; i ~> i + 1) { imprime(i); }"),
        "0\n1\n2\n"
    );
}

#[test]
fn precedence_and_associativity() {
    assert_eq!(run("imprime(2 + 3 * 4);"), "14\n");
    assert_eq!(run("imprime(2 ** 3 ** 2);"), "512\n");
    assert_eq!(run("imprime(10 - 3 - 2);"), "5\n");
}

#[test]
fn comparison_chain_through_boolean() {
    // 1 < 2 yields 1; equality against verdadeiro coerces and holds
    assert_eq!(run("imprime(1 < 2 == verdadeiro);"), "1\n");
}

#[test]
fn exponent_zero_returns_one() {
    assert_eq!(run("imprime(7 ** 0);"), "1\n");
    assert_eq!(run("imprime(0 ** 0);"), "1\n");
}

#[test]
fn booleans_coerce_in_arithmetic() {
    // The static checker rejects boolean arithmetic; the dynamic rule
    // still coerces verdadeiro/falso to 1/0
    let (_, output) = run_unchecked("imprime(verdadeiro + verdadeiro);");
    assert_eq!(output, "2\n");
    let (_, output) = run_unchecked("imprime(falso + 3);");
    assert_eq!(output, "3\n");
}

#[test]
fn booleans_print_in_portuguese() {
    assert_eq!(run("imprime(verdadeiro, falso);"), "verdadeiro falso\n");
}

#[test]
fn multiple_arguments_are_space_separated() {
    assert_eq!(run("imprime(1, 2, 3);"), "1 2 3\n");
}

#[test]
fn division_by_zero_is_a_runtime_error() {
    let (result, _) = run_unchecked("x ~> 0; imprime(10 / x);");
    let diag = result.unwrap_err();
    assert!(matches!(diag.error, RuntimeError::DivisionByZero));
    // The diagnostic points at the division
    assert!(diag.span.start > 0);
}

#[test]
fn integer_division_truncates() {
    assert_eq!(run("imprime(7 / 2);"), "3\n");
}

#[test]
fn principal_is_the_entry_point() {
    // Top-level statements do not run when principal exists
    assert_eq!(
        run("imprime(99); definir principal(): inteiro { imprime(1); retornar 0; }"),
        "1\n"
    );
}

#[test]
fn return_propagates_through_nested_loops() {
    let source = "
        definir busca(): inteiro {
            para (i ~> 0; i < 10; i ~> i + 1) {
                enquanto verdadeiro {
                    retornar i + 40;
                }
            }
            retornar 0 - 1;
        }
        imprime(busca());
    ";
    assert_eq!(run(source), "40\n");
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
    assert_eq!(run(source), "3\n");
}

#[test]
fn for_init_binding_persists_after_loop() {
    // The init clause binds into the enclosing environment; pinned behavior
    let (result, output) =
        run_unchecked("para (i ~> 0; i < 3; i ~> i + 1) { } imprime(i);");
    result.expect("execution failed");
    assert_eq!(output, "3\n");
}

#[test]
fn callee_reads_globals_but_writes_are_discarded() {
    let source = "
        g ~> 10;
        definir leitura(): inteiro { retornar g; }
        definir escrita(): inteiro { g ~> 99; retornar g; }
        imprime(leitura());
        imprime(escrita());
        imprime(g);
    ";
    assert_eq!(run(source), "10\n99\n10\n");
}

#[test]
fn arguments_evaluate_in_caller_environment() {
    let source = "
        x ~> 5;
        definir soma_um(x: inteiro): inteiro { retornar x + 1; }
        imprime(soma_um(x * 2));
    ";
    assert_eq!(run(source), "11\n");
}

#[test]
fn implicit_return_is_the_last_expression() {
    assert_eq!(
        run("definir tres(): inteiro { 1 + 2; } imprime(tres());"),
        "3\n"
    );
}

#[test]
fn typed_values_survive_function_returns() {
    // No silent truncation: text and decimal results keep their tags
    let source = "definir saudacao(): texto { retornar \"ola\"; } s ~> saudacao();";
    let (result, _) = run_unchecked(source);
    assert_eq!(result.unwrap(), Value::Str("ola".into()));
}

#[test]
fn decimals_print_shortest_form() {
    let (_, output) = run_unchecked("imprime(2.5, 3.0);");
    assert_eq!(output, "2.5 3\n");
}

#[test]
fn decimal_arithmetic_keeps_precision() {
    let (result, _) = run_unchecked("x ~> 1.5 + 2.25; x;");
    assert_eq!(result.unwrap(), Value::Float(3.75));
}

#[test]
fn pure_builtins_compute() {
    assert_eq!(run("imprime(soma(1, 2, 3));"), "6\n");
    assert_eq!(run("imprime(abs(-7));"), "7\n");
    assert_eq!(run("imprime(abs(7));"), "7\n");
}

#[test]
fn assignment_yields_its_value() {
    // An assignment in a for clause carries its value as statement result
    let (result, _) = run_unchecked("x ~> 41; x ~> x + 1;");
    assert_eq!(result.unwrap(), Value::Int(42));
}

#[test]
fn undefined_variable_at_runtime() {
    let (result, _) = run_unchecked("imprime(nao_existe);");
    let diag = result.unwrap_err();
    assert!(matches!(diag.error, RuntimeError::UndefinedVariable(_)));
}

#[test]
fn text_operands_in_arithmetic_fail_precisely() {
    let (result, _) = run_unchecked("x ~> \"a\" * 2;");
    let diag = result.unwrap_err();
    assert!(matches!(diag.error, RuntimeError::NonNumericOperand("texto")));
}
