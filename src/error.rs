//! Diagnostics: error categories, exit codes, and caret-underline
//! source display (spec §6/§7).
//!
//! Adapted from the teacher's `ParseError`/`display_with_source` shape;
//! the typo-suggestion feature (`suggest::find_similar`) is dropped —
//! CiScal has a small fixed keyword set and no natural-language input
//! to fuzzily correct.

use crate::style::Style;
use crate::token::Pos;
use std::fmt;

/// Exit-code taxonomy from spec §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Usage,      // 1
    Lexical,    // 2
    Syntax,     // 3
    Semantic,   // 4 - exit/return placement, missing return
    Scope,      // 5 - redefinition
    Internal,   // 6 - MIPS-emission inconsistency
    CallSite,   // 7 - undeclared name or call-site mismatch
}

impl ErrorKind {
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorKind::Usage => 1,
            ErrorKind::Lexical => 2,
            ErrorKind::Syntax => 3,
            ErrorKind::Semantic => 4,
            ErrorKind::Scope => 5,
            ErrorKind::Internal => 6,
            ErrorKind::CallSite => 7,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompileError {
    pub kind: ErrorKind,
    pub pos: Pos,
    pub message: String,
}

impl CompileError {
    pub fn new(kind: ErrorKind, pos: Pos, message: impl Into<String>) -> Self {
        Self {
            kind,
            pos,
            message: message.into(),
        }
    }

    /// Renders `[ERROR] <file>:<line>:<col>: <message>` followed by the
    /// offending source line and a caret underneath the column,
    /// matching spec §6's diagnostic format.
    pub fn display_with_source(&self, file: &str, source: &str) -> String {
        let line_content = source.lines().nth((self.pos.line as usize).saturating_sub(1)).unwrap_or("");
        let caret = format!("{}^", " ".repeat(self.pos.col as usize));

        let label = Style::bold_red("ERROR");
        let location = Style::bold(&format!("{file}:{}:{}:", self.pos.line, self.pos.col));
        let caret_colored = Style::green(&caret);

        format!(
            "[{label}] {location} {}\n  {line_content}\n  {caret_colored}",
            self.message
        )
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.pos.line, self.pos.col, self.message)
    }
}

impl std::error::Error for CompileError {}

/// Prints a warning in the same shape as an error, but never aborts
/// compilation (spec §7).
pub fn warn(message: &str) {
    eprintln!("[{}] {message}", Style::magenta("WARNING"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_with_source_shows_line_and_caret() {
        let err = CompileError::new(ErrorKind::Syntax, Pos::new(1, 8), "expected ';'");
        let source = "x := 1 2";
        let rendered = err.display_with_source("prog.csc", source);
        assert!(rendered.contains("x := 1 2"));
        assert!(rendered.contains('^'));
        assert!(rendered.contains("prog.csc:1:8"));
    }

    #[test]
    fn exit_codes_match_taxonomy() {
        assert_eq!(ErrorKind::Lexical.exit_code(), 2);
        assert_eq!(ErrorKind::Syntax.exit_code(), 3);
        assert_eq!(ErrorKind::Semantic.exit_code(), 4);
        assert_eq!(ErrorKind::Scope.exit_code(), 5);
        assert_eq!(ErrorKind::Internal.exit_code(), 6);
        assert_eq!(ErrorKind::CallSite.exit_code(), 7);
    }
}
