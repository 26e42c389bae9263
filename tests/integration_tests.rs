//! End-to-end compilation scenarios, compiling whole programs through
//! the public [`ciscalc::compile`] API rather than unit-level pieces.

use ciscalc::compile::compile_source;
use ciscalc::ir::Op;

#[test]
fn minimal_program_matches_expected_quad_shape() {
    let artifacts =
        compile_source("program p { declare x enddeclare x := 1; print(x) }").unwrap();
    assert!(artifacts.int_text.starts_with("0: (begin_block, p, _, _)"));
    assert!(artifacts.int_text.contains("1: (:=, 1, _, x)"));
    assert!(artifacts.int_text.contains("2: (out, x, _, _)"));
    assert!(artifacts.int_text.contains("3: (halt, _, _, _)"));
    assert!(artifacts.int_text.contains("4: (end_block, p, _, _)"));
    assert!(artifacts.c_text.is_some());
    assert!(artifacts.asm_text.contains("li      $t1, 1"));
    assert!(artifacts.asm_text.contains("sw      $t1, -12($s0)"));
    assert!(artifacts.asm_text.contains("li      $v0, 1"));
}

#[test]
fn short_circuit_or_binds_looser_than_and() {
    let src = "program p { \
        declare a, b, c enddeclare \
        if (a < 1 or b > 2 and c = 3) { a := 1 } }";
    let artifacts = compile_source(src).unwrap();
    let relational_count = artifacts.int_text.matches("): (<,").count()
        + artifacts.int_text.matches("(>,").count()
        + artifacts.int_text.matches("(=,").count();
    assert!(relational_count >= 3);
}

#[test]
fn do_while_exit_jumps_past_the_loop() {
    let src = "program p { \
        declare x enddeclare \
        x := 3; \
        do { x := x - 1; if (x = 0) exit; } while (x > 0); \
        print(x) }";
    let artifacts = compile_source(src).unwrap();
    assert!(artifacts.int_text.contains("jump"));
    assert!(artifacts.asm_text.contains("li      $v0, 1"));
}

#[test]
fn select_with_default_probes_each_case() {
    let src = "program p { \
        declare x enddeclare \
        x := 1; \
        select (x) 1: print(10); 2: print(20); default: print(30); }";
    let artifacts = compile_source(src).unwrap();
    assert!(artifacts.int_text.contains("(=, x, 1, _)"));
    assert!(artifacts.int_text.contains("(=, x, 2, _)"));
}

#[test]
fn select_with_out_of_order_case_constants_is_rejected() {
    let src = "program p { \
        declare x enddeclare \
        x := 1; \
        select (x) 2: print(10); 1: print(20); default: print(30); }";
    let err = compile_source(src).unwrap_err();
    assert_eq!(err.kind, ciscalc::error::ErrorKind::Syntax);
}

#[test]
fn nested_function_call_by_reference_passes_an_address() {
    let src = "program p { \
        declare x enddeclare \
        function f(inout y) { y := y + 1; return(y) } \
        x := 1; \
        x := f(inout x); \
        print(x) }";
    let artifacts = compile_source(src).unwrap();
    assert!(artifacts.int_text.contains("REF"));
    assert!(artifacts.int_text.contains("RET"));
    assert!(artifacts.asm_text.contains("sw      $t0, -8($fp)"));
    assert!(artifacts.c_text.is_none());
}

#[test]
fn redeclaring_a_variable_in_the_same_scope_is_rejected() {
    let src = "program p { declare x, x enddeclare x := 1 }";
    let err = compile_source(src).unwrap_err();
    assert_eq!(err.kind, ciscalc::error::ErrorKind::Scope);
}

#[test]
fn parameter_and_variable_name_collision_is_rejected() {
    let src = "program p { \
        function f(in x) { declare x enddeclare return(x) } \
        declare y enddeclare \
        y := f(in 1) }";
    let err = compile_source(src).unwrap_err();
    assert_eq!(err.kind, ciscalc::error::ErrorKind::Scope);
}

#[test]
fn call_site_argument_count_mismatch_is_rejected() {
    let src = "program p { \
        procedure q(in a) { print(a) } \
        call q() }";
    let err = compile_source(src).unwrap_err();
    assert_eq!(err.kind, ciscalc::error::ErrorKind::CallSite);
}

#[test]
fn function_without_a_return_statement_is_rejected() {
    let src = "program p { function f() { print(1) } x := f() }";
    let err = compile_source(src).unwrap_err();
    assert_eq!(err.kind, ciscalc::error::ErrorKind::Semantic);
}

#[test]
fn exit_outside_a_dowhile_loop_is_rejected() {
    let src = "program p { exit }";
    let err = compile_source(src).unwrap_err();
    assert_eq!(err.kind, ciscalc::error::ErrorKind::Semantic);
}

#[test]
fn literal_out_of_range_is_a_semantic_error() {
    let src = "program p { declare x enddeclare x := 32768 }";
    let err = compile_source(src).unwrap_err();
    assert_eq!(err.kind, ciscalc::error::ErrorKind::Semantic);
}

#[test]
fn negated_max_literal_is_accepted() {
    let src = "program p { declare x enddeclare x := -32768; print(x) }";
    let artifacts = compile_source(src).unwrap();
    assert!(artifacts.int_text.contains("32768"));
}

#[test]
fn every_quad_label_matches_its_position() {
    let src = "program p { \
        declare a enddeclare \
        while (a < 10) { a := a + 1 }; \
        print(a) }";
    let artifacts = compile_source(src).unwrap();
    for (i, line) in artifacts.int_text.lines().enumerate() {
        assert!(line.starts_with(&format!("{i}:")));
    }
}

#[test]
fn program_with_no_subprograms_emits_compilable_c() {
    let src = "program p { declare x enddeclare x := 2 * 3 + 1; print(x) }";
    let artifacts = compile_source(src).unwrap();
    let c = artifacts.c_text.unwrap();
    assert!(c.contains("int main(void)"));
    assert!(c.contains("int x;"));
    assert!(c.contains("printf"));
}

#[test]
fn quad_ops_include_no_par_or_call_when_no_subprograms_are_declared() {
    let src = "program p { declare x enddeclare x := 1; print(x) }";
    let artifacts = compile_source(src).unwrap();
    assert!(!artifacts.int_text.contains("par"));
    assert!(!artifacts.int_text.contains("call"));
    let _ = Op::Par;
}
