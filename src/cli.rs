//! Command-line interface (spec §6).
//!
//! A flat, single-command surface rather than the teacher's `largo`
//! subcommand tree — CiScal does one thing, compile a `.csc` file — but
//! kept in clap's derive style and exit-code discipline the teacher uses
//! throughout `cli.rs`.

use std::path::PathBuf;

use clap::Parser;

use crate::compile::{self, OutputPaths, PipelineError};
use crate::error::warn;

#[derive(Parser)]
#[command(name = "csc", about = "CiScal compiler: quadruple IR, ANSI C, and MIPS assembly", disable_version_flag = true)]
pub struct Cli {
    /// Input source file; must end in `.csc`.
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output assembly file; defaults to `<basename>.asm`.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Accepted for compatibility; intermediate output is always written.
    #[arg(short = 'I', long = "interm")]
    pub interm: bool,

    /// Accepted for compatibility; the ANSI C equivalent is always written.
    #[arg(short = 'C', long = "c-equiv")]
    pub c_equiv: bool,

    /// Accepted for compatibility; temporaries are always kept.
    #[arg(long = "save-temps")]
    pub save_temps: bool,

    #[arg(short = 'v', long = "version")]
    pub version: bool,
}

/// Entry point for the `csc` binary. Returns the process exit code
/// rather than calling `std::process::exit` directly, so the mapping
/// from [`crate::error::ErrorKind`] to exit code stays testable.
pub fn run<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) => {
            // clap prints --help/--version text and returns a successful
            // exit for those; anything else is a usage error (spec §6).
            let code = if e.exit_code() == 0 { 0 } else { 1 };
            e.print().ok();
            return code;
        }
    };

    if cli.version {
        println!("csc {}", env!("CARGO_PKG_VERSION"));
        return 0;
    }

    if cli.interm {
        warn("-I/--interm is enabled by default; intermediate output is always written");
    }
    if cli.c_equiv {
        warn("-C/--c-equiv is enabled by default; the ANSI C equivalent is always written");
    }
    if cli.save_temps {
        warn("--save-temps is enabled by default; temporaries are always kept");
    }

    let Some(input) = cli.input else {
        eprintln!("csc: missing required argument '-i'/'--input'");
        return 1;
    };

    if input.extension().and_then(|e| e.to_str()) != Some("csc") {
        eprintln!("csc: input file '{}' must end in '.csc'", input.display());
        return 1;
    }

    let asm_out = cli
        .output
        .clone()
        .unwrap_or_else(|| input.with_extension("asm"));
    if asm_out.exists() {
        warn(&format!("overwriting existing output file '{}'", asm_out.display()));
    }

    let paths = OutputPaths::for_input(&input, &asm_out);
    match compile::compile_file(&input, &paths) {
        Ok(()) => 0,
        Err(PipelineError::Io(e)) => {
            eprintln!("csc: {e}");
            1
        }
        Err(PipelineError::Compile(err, source)) => {
            eprintln!("{}", err.display_with_source(&input.display().to_string(), &source));
            err.kind.exit_code()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_input_is_a_usage_error() {
        assert_eq!(run(["csc"]), 1);
    }

    #[test]
    fn non_csc_extension_is_a_usage_error() {
        assert_eq!(run(["csc", "-i", "prog.txt"]), 1);
    }

    #[test]
    fn version_flag_exits_success() {
        assert_eq!(run(["csc", "-v"]), 0);
    }

    #[test]
    fn successful_compile_exits_success() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("ok.csc");
        std::fs::write(&input, "program p { declare x enddeclare x := 1; print(x) }").unwrap();
        assert_eq!(run(["csc", "-i", input.to_str().unwrap()]), 0);
        assert!(dir.path().join("ok.asm").exists());
    }

    #[test]
    fn compatibility_flags_warn_but_still_compile() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("ok.csc");
        std::fs::write(&input, "program p { declare x enddeclare x := 1; print(x) }").unwrap();
        assert_eq!(
            run(["csc", "-i", input.to_str().unwrap(), "-I", "-C", "--save-temps"]),
            0
        );
    }

    #[test]
    fn syntax_error_exits_with_category_three() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("bad.csc");
        std::fs::write(&input, "program p { garbage").unwrap();
        assert_eq!(run(["csc", "-i", input.to_str().unwrap()]), 3);
    }
}
