//! CiScal compiler entry point.

use std::process::ExitCode;

fn main() -> ExitCode {
    let code = ciscalc::cli::run(std::env::args_os());
    ExitCode::from(code as u8)
}
