//! Compilation pipeline (spec §7/§9): parses a `.csc` source, drives the
//! MIPS and (conditionally) ANSI C backends, and manages the lifecycle of
//! the three sibling output artifacts.
//!
//! Grounded on the teacher's `compile_to_rust`/`compile_file` split
//! between a pure in-memory stage and a filesystem-facing stage, adapted
//! to CiScal's three-artifact output and fail-fast cleanup rule.

use std::fs;
use std::path::{Path, PathBuf};

use crate::cemit;
use crate::mips::MipsEmitter;
use crate::parser::Parser;

/// The three sibling artifacts a successful compilation produces,
/// already rendered to strings (spec §6). `c` is `None` when the program
/// declares any nested subprogram (spec §4.7).
#[derive(Debug)]
pub struct Artifacts {
    pub int_text: String,
    pub c_text: Option<String>,
    pub asm_text: String,
}

/// Runs the whole pipeline over already-read source text, without
/// touching the filesystem. Kept separate from [`compile_file`] so tests
/// can exercise the pipeline without scratch files.
pub fn compile_source(source: &str) -> Result<Artifacts, crate::error::CompileError> {
    let output = Parser::new(source)?.parse()?;

    let int_text = output
        .ir
        .quads()
        .iter()
        .map(|q| q.to_string())
        .collect::<Vec<_>>()
        .join("\n");

    let main_framelength = output
        .symtab
        .scope(
            output
                .blocks
                .iter()
                .find(|b| b.name == output.main_name)
                .expect("program() always records the main block")
                .scope_idx,
        )
        .framelength();

    let mut emitter = MipsEmitter::new(&output.symtab, &output.main_name, main_framelength, output.halt_label);
    for block in &output.blocks {
        let quads = output.ir.slice(block.start_quad, block.end_quad);
        emitter.emit_block(quads, &block.name, block.scope_idx)?;
    }
    let asm_text = emitter.finish();

    let c_text = if output.have_subprog {
        None
    } else {
        Some(cemit::emit_c(output.ir.quads(), &output.main_name))
    };

    Ok(Artifacts {
        int_text,
        c_text,
        asm_text,
    })
}

/// Paths of the three artifacts a compilation writes, all siblings of
/// the input file (spec §6).
pub struct OutputPaths {
    pub int: PathBuf,
    pub c: PathBuf,
    pub asm: PathBuf,
}

impl OutputPaths {
    pub fn for_input(input: &Path, asm_out: &Path) -> Self {
        let stem = input.with_extension("");
        Self {
            int: stem.with_extension("int"),
            c: stem.with_extension("c"),
            asm: asm_out.to_path_buf(),
        }
    }
}

/// Reads `input`, compiles it, and writes the resulting artifacts to
/// `paths`. On any error, deletes whichever of `.int`/`.c` were already
/// written before propagating the error (spec §5/§7's fail-fast cleanup);
/// a partial `.asm` is left in place for forensic inspection.
pub fn compile_file(input: &Path, paths: &OutputPaths) -> Result<(), PipelineError> {
    let source = fs::read_to_string(input).map_err(PipelineError::Io)?;

    let artifacts = match compile_source(&source) {
        Ok(a) => a,
        Err(e) => {
            cleanup(paths);
            return Err(PipelineError::Compile(e, source));
        }
    };

    fs::write(&paths.int, &artifacts.int_text).map_err(PipelineError::Io)?;
    if let Some(c_text) = &artifacts.c_text {
        fs::write(&paths.c, c_text).map_err(PipelineError::Io)?;
    } else if paths.c.exists() {
        let _ = fs::remove_file(&paths.c);
    }
    fs::write(&paths.asm, &artifacts.asm_text).map_err(PipelineError::Io)?;

    Ok(())
}

fn cleanup(paths: &OutputPaths) {
    let _ = fs::remove_file(&paths.int);
    let _ = fs::remove_file(&paths.c);
}

#[derive(Debug)]
pub enum PipelineError {
    Io(std::io::Error),
    /// A compile error plus the source text it was raised against, so
    /// the caller can render `display_with_source`.
    Compile(crate::error::CompileError, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_program_produces_all_three_artifacts() {
        let artifacts =
            compile_source("program p { declare x enddeclare x := 1; print(x) }").unwrap();
        assert!(artifacts.int_text.contains("begin_block"));
        assert!(artifacts.c_text.is_some());
        assert!(artifacts.asm_text.contains(".globl L_0"));
    }

    #[test]
    fn program_with_subprogram_omits_c_text() {
        let src = "program p { \
            procedure q() { print(1) } \
            call q() }";
        let artifacts = compile_source(src).unwrap();
        assert!(artifacts.c_text.is_none());
    }

    #[test]
    fn compile_error_propagates_as_pipeline_compile_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("bad.csc");
        fs::write(&input, "program p { garbage").unwrap();
        let paths = OutputPaths::for_input(&input, &dir.path().join("bad.asm"));
        let err = compile_file(&input, &paths).unwrap_err();
        assert!(matches!(err, PipelineError::Compile(_, _)));
        assert!(!paths.int.exists());
        assert!(!paths.c.exists());
    }

    #[test]
    fn successful_compile_writes_all_artifact_files() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("ok.csc");
        fs::write(&input, "program p { declare x enddeclare x := 1; print(x) }").unwrap();
        let paths = OutputPaths::for_input(&input, &dir.path().join("ok.asm"));
        compile_file(&input, &paths).unwrap();
        assert!(paths.int.exists());
        assert!(paths.c.exists());
        assert!(paths.asm.exists());
    }
}
