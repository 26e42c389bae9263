//! Mechanical IR-to-ANSI-C translation (C7), emitted once for the whole
//! program, and only when no nested subprograms exist (spec §4.7).
//!
//! Grounded on the reference's `transform_to_c`/`generate_c_code_file`/
//! `find_var_decl`/`transform_decls`. The reference's per-block variable
//! declaration scan walks the live `quad_code` list by index from inside
//! the function currently being translated; here the same scan runs over
//! an already-complete `&[Quad]` slice, since CiScal's single-pass
//! generation finishes building the quad stream before any backend runs.

use crate::ir::{Op, Operand, Quad};
use std::collections::BTreeSet;

pub const CSC_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Translates the whole quad stream to a compilable ANSI C source string.
/// Callers are responsible for checking spec §4.7's precondition (no
/// nested subprograms) before calling this — translating a program with
/// nested subprograms would require lexical closures C cannot express.
pub fn emit_c(quads: &[Quad], main_name: &str) -> String {
    let mut out = String::new();
    out.push_str("#include <stdio.h>\n\n");
    out.push_str("/* This file was automatically generated by:\n");
    out.push_str(&format!(" *     CiScal Compiler {CSC_VERSION}\n"));
    out.push_str(" */\n\n");
    for (i, quad) in quads.iter().enumerate() {
        if let Some(line) = transform_quad(quads, i, quad, main_name) {
            out.push_str(&line);
            out.push('\n');
        }
    }
    out
}

/// Scans forward from just after `begin_block` to the matching `end_block`
/// collecting every plain variable name referenced (spec §4.7): `par`
/// operands and `call` targets are skipped, since parameters are not
/// local C variables and `call` carries no data operands of its own.
fn find_var_decls(quads: &[Quad], begin_index: usize) -> BTreeSet<String> {
    let mut vars = BTreeSet::new();
    for quad in &quads[begin_index + 1..] {
        if quad.op == Op::EndBlock {
            break;
        }
        if quad.op == Op::Par || quad.op == Op::Call {
            continue;
        }
        for operand in [&quad.arg1, &quad.arg2, &quad.res] {
            if let Operand::Name(name) = operand {
                vars.insert(name.clone());
            }
        }
    }
    vars
}

fn transform_decls(vars: &BTreeSet<String>) -> String {
    if vars.is_empty() {
        return String::new();
    }
    let joined = vars.iter().cloned().collect::<Vec<_>>().join(", ");
    format!("\n\tint {joined};")
}

fn transform_quad(quads: &[Quad], index: usize, quad: &Quad, main_name: &str) -> Option<String> {
    let label = quad.label;
    match &quad.op {
        Op::Jump => {
            let target = label_of(&quad.res);
            Some(format!("\tL_{label}: goto L_{target};"))
        }
        Op::Eq | Op::Neq | Op::Lss | Op::Leq | Op::Gtr | Op::Geq => {
            let c_op = relop_c(&quad.op);
            let target = label_of(&quad.res);
            Some(format!(
                "\tL_{label}: if ({} {c_op} {}) goto L_{target};",
                quad.arg1, quad.arg2
            ))
        }
        Op::Assign => Some(format!("\tL_{label}: {} = {};", quad.res, quad.arg1)),
        Op::Add | Op::Sub | Op::Mul | Op::Div => Some(format!(
            "\tL_{label}: {} = {} {} {};",
            quad.res, quad.arg1, quad.op, quad.arg2
        )),
        Op::Out => Some(format!("\tL_{label}: printf(\"%d\\n\", {});", quad.arg1)),
        Op::Retv => Some(format!("\tL_{label}: return ({});", quad.arg1)),
        Op::Halt => Some(format!("\tL_{label}: return 0;")),
        Op::BeginBlock => {
            let name = match &quad.arg1 {
                Operand::Name(n) => n.clone(),
                other => other.to_string(),
            };
            let signature = if name == main_name {
                "int main(void)\n{".to_string()
            } else {
                format!("int {name}()\n{{")
            };
            let vars = find_var_decls(quads, index);
            Some(format!(
                "{signature}{}\n\tL_{label}:",
                transform_decls(&vars)
            ))
        }
        Op::EndBlock => Some(format!("\tL_{label}: {{}}\n}}\n")),
        // `par`/`call` never reach the C backend: they only exist when a
        // program has subprograms, which is exactly the case this backend
        // is never invoked for (spec §4.7).
        Op::Par | Op::Call => None,
    }
}

fn label_of(operand: &Operand) -> String {
    match operand {
        Operand::Label(l) => l.to_string(),
        other => other.to_string(),
    }
}

fn relop_c(op: &Op) -> &'static str {
    match op {
        Op::Eq => "==",
        Op::Neq => "!=",
        Op::Lss => "<",
        Op::Leq => "<=",
        Op::Gtr => ">",
        Op::Geq => ">=",
        _ => unreachable!("relop_c called on a non-relational op"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::IrBuilder;

    #[test]
    fn emits_main_signature_and_return() {
        let mut ir = IrBuilder::new();
        ir.gen_quad(Op::BeginBlock, "main".into(), Operand::Blank, Operand::Blank);
        ir.gen_quad(Op::Assign, 1.into(), Operand::Blank, "x".into());
        ir.gen_quad(Op::Halt, Operand::Blank, Operand::Blank, Operand::Blank);
        ir.gen_quad(Op::EndBlock, "main".into(), Operand::Blank, Operand::Blank);
        let c = emit_c(ir.quads(), "main");
        assert!(c.contains("int main(void)"));
        assert!(c.contains("int x;"));
        assert!(c.contains("x = 1;"));
        assert!(c.contains("return 0;"));
    }

    #[test]
    fn relational_quad_becomes_goto_if() {
        let mut ir = IrBuilder::new();
        ir.gen_quad(Op::BeginBlock, "main".into(), Operand::Blank, Operand::Blank);
        let l = ir.gen_quad(
            Op::Lss,
            "x".into(),
            "y".into(),
            Operand::Blank,
        );
        ir.backpatch(&vec![l], 9);
        ir.gen_quad(Op::EndBlock, "main".into(), Operand::Blank, Operand::Blank);
        let c = emit_c(ir.quads(), "main");
        assert!(c.contains("if (x < y) goto L_9;"));
    }

    #[test]
    fn par_and_call_quads_produce_no_c_line() {
        assert_eq!(
            transform_quad(
                &[],
                0,
                &Quad { label: 0, op: Op::Call, arg1: "f".into(), arg2: Operand::Blank, res: Operand::Blank },
                "main"
            ),
            None
        );
    }
}
