// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Assembly emission tests. These check the generated text; assembling and
//! linking are exercised only through the CLI on a Linux host.

use solar_codegen::X86_64Backend;
use solar_lexer::Lexer;
use solar_parser::Parser;
use solar_stdlib::default_builtins;
use solar_types::TypeChecker;

fn emit(source: &str) -> String {
    let registry = default_builtins();
    let tokens = Lexer::new(source, &registry).tokenize().expect("lexing failed");
    let stmts = Parser::new(tokens).parse().expect("parsing failed");
    TypeChecker::new(&registry).check(&stmts).expect("type checking failed");
    X86_64Backend::new(registry).emit_program(&stmts)
}

#[test]
fn globals_become_data_quadwords() {
    let asm = emit("x ~> 5; imprime(x);");
    assert!(asm.contains("var_x: .quad 0"), "{}", asm);
    assert!(asm.contains("    mov %rax, var_x(%rip)"), "{}", asm);
    assert!(asm.contains("    mov var_x(%rip), %rax"), "{}", asm);
    assert!(asm.contains("    call imprime_num"), "{}", asm);
}

#[test]
fn runtime_is_included_and_program_exits() {
    let asm = emit("imprime(1);");
    assert!(asm.contains(".include \"external/runtime.s\""), "{}", asm);
    assert!(asm.contains(".global _start"), "{}", asm);
    assert!(asm.ends_with("    mov $0, %rdi\n    call sair\n"), "{}", asm);
}

#[test]
fn binary_operands_spill_through_the_stack() {
    let asm = emit("imprime(2 + 3);");
    let expected = "    mov $2, %rax\n    push %rax\n    mov $3, %rax\n    mov %rax, %rbx\n    pop %rax\n    add %rbx, %rax\n";
    assert!(asm.contains(expected), "{}", asm);
}

#[test]
fn comparisons_use_set_and_zero_extend() {
    let asm = emit("imprime(1 < 2);");
    assert!(asm.contains("    cmp %rbx, %rax\n    setl %al\n    movzx %al, %rax"), "{}", asm);

    let asm = emit("imprime(1 != 2);");
    assert!(asm.contains("    setne %al"), "{}", asm);
}

#[test]
fn nested_exponentiation_gets_unique_labels() {
    let asm = emit("imprime(2 ** 3 ** 2);");
    assert!(asm.contains(".pow_loop_0:"), "{}", asm);
    assert!(asm.contains(".pow_loop_1:"), "{}", asm);
    assert!(asm.contains("jz .pow_done_0"), "{}", asm);
    assert!(asm.contains("jz .pow_done_1"), "{}", asm);
}

#[test]
fn division_is_guarded_against_zero() {
    let asm = emit("imprime(10 / 2);");
    assert!(asm.contains("    test %rbx, %rbx\n    jz .div_zero\n    cqo\n    idiv %rbx"), "{}", asm);
    assert!(asm.contains(".div_zero:\n    mov $1, %rdi\n    call sair"), "{}", asm);
}

#[test]
fn functions_frame_their_locals() {
    let asm = emit("definir quad(x: inteiro): inteiro { retornar x * x; } imprime(quad(6));");
    assert!(asm.contains("func_quad:\n    push %rbp\n    mov %rsp, %rbp"), "{}", asm);
    // The parameter lands in a frame slot, not a global
    assert!(asm.contains("    mov %rdi, -8(%rbp)"), "{}", asm);
    assert!(!asm.contains("var_x"), "{}", asm);
    assert!(asm.contains("    leave\n    ret"), "{}", asm);
}

#[test]
fn local_rebinding_reuses_the_slot() {
    let asm = emit("definir f(): inteiro { a ~> 1; a ~> 2; retornar a; } imprime(f());");
    // One allocation, two stores to the same offset
    let allocs = asm.matches("    sub $8, %rsp").count();
    assert_eq!(allocs, 1, "{}", asm);
    assert_eq!(asm.matches("    mov %rax, -8(%rbp)").count(), 2, "{}", asm);
}

#[test]
fn calls_fill_registers_from_a_spill_area() {
    let asm = emit("definir f(a, b) { retornar a + b; } imprime(f(1, 2));");
    assert!(asm.contains("    sub $16, %rsp"), "{}", asm);
    assert!(asm.contains("    mov 0(%rsp), %rdi"), "{}", asm);
    assert!(asm.contains("    mov 8(%rsp), %rsi"), "{}", asm);
    assert!(asm.contains("    call func_f\n    add $16, %rsp"), "{}", asm);
}

#[test]
fn seventh_argument_goes_to_the_stack() {
    let asm = emit(
        "definir f(a, b, c, d, e, g, h) { retornar a + h; } imprime(f(1, 2, 3, 4, 5, 6, 7));",
    );
    // Caller reserves seven slots; the seventh stays below the registers
    assert!(asm.contains("    sub $56, %rsp"), "{}", asm);
    assert!(asm.contains("    mov 8(%rsp), %rdi"), "{}", asm);
    assert!(asm.contains("    call func_f\n    add $56, %rsp"), "{}", asm);
    // Callee copies the stack argument into its own frame
    assert!(asm.contains("    mov 16(%rbp), %rax"), "{}", asm);
}

#[test]
fn principal_becomes_the_entry_point() {
    let asm = emit("imprime(99); definir principal(): inteiro { retornar 0; }");
    let start = asm.find("_start:").unwrap();
    assert!(asm[start..].contains("    call func_principal"), "{}", asm);
    // Top-level statements are not emitted into _start
    assert!(!asm[start..].contains("imprime_num"), "{}", asm);
}

#[test]
fn if_else_uses_label_pairs() {
    let asm = emit("se 1 { imprime(1); } senao { imprime(0); }");
    assert!(asm.contains("jz .if_senao_0"), "{}", asm);
    assert!(asm.contains("jmp .if_fim_0"), "{}", asm);
    assert!(asm.contains(".if_senao_0:"), "{}", asm);
    assert!(asm.contains(".if_fim_0:"), "{}", asm);
}

#[test]
fn while_jumps_to_condition_first() {
    let asm = emit("enquanto 0 { imprime(1); }");
    assert!(asm.contains("    jmp .while_cond_0\n.while_body_0:"), "{}", asm);
    assert!(asm.contains("    jnz .while_body_0\n.while_end_0:"), "{}", asm);
}

#[test]
fn for_threads_control_through_the_step_block() {
    let asm = emit("para (i ~> 0; i < 3; i ~> i + 1) { imprime(i); }");
    assert!(asm.contains(".for_cond_0:"), "{}", asm);
    assert!(asm.contains("jz .for_end_0"), "{}", asm);
    assert!(asm.contains("    jmp .for_step_0\n.for_step_0:"), "{}", asm);
    assert!(asm.contains("    jmp .for_cond_0\n.for_end_0:"), "{}", asm);
}

#[test]
fn string_literals_land_in_the_data_section() {
    let asm = emit("x ~> \"ola\";");
    assert!(asm.contains("str_0: .ascii \"ola\\0\""), "{}", asm);
    assert!(asm.contains("    lea str_0(%rip), %rax"), "{}", asm);
}

#[test]
fn decimals_are_stored_as_bit_patterns_and_truncated() {
    let asm = emit("x ~> 2.5;");
    assert!(asm.contains("decimal_0: .quad 0x4004000000000000"), "{}", asm);
    assert!(asm.contains("    movsd decimal_0(%rip), %xmm0\n    cvttsd2si %xmm0, %rax"), "{}", asm);
}

#[test]
fn pure_builtins_lower_inline() {
    let asm = emit("x ~> soma(1, 2, 3);");
    assert!(asm.contains("    add %rbx, %rax"), "{}", asm);

    let asm = emit("x ~> abs(-5);");
    assert!(asm.contains("    jns .abs_done_0"), "{}", asm);
    assert!(asm.contains("    neg %rax"), "{}", asm);
}

#[test]
fn code_after_return_is_not_emitted() {
    let asm = emit("definir f(): inteiro { retornar 1; imprime(2); } imprime(f());");
    let body_start = asm.find("func_f:").unwrap();
    let body_end = asm[body_start..].find("\n\n").unwrap() + body_start;
    assert!(!asm[body_start..body_end].contains("imprime_num"), "{}", asm);
}
