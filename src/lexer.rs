//! Deterministic finite-state tokenizer (C2), driven by `Source` (C1).
//!
//! Implements the explicit DFA from spec §4.1: states 0 (start),
//! 1 (identifier), 2 (integer), 3/4/5 (two-character operator lookahead
//! for `<`, `>`, `:`), 6/7/8 (`\* ... *\` comments).

use crate::error::{CompileError, ErrorKind};
use crate::source::Source;
use crate::token::{keyword_or_punct, Pos, Token, TokenKind, MAX_IDENT_LEN};

pub struct Lexer {
    src: Source,
}

const SINGLE_CHAR_PUNCT: &[u8] = b"+-*/=,;{}()[]";

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            src: Source::new(source),
        }
    }

    /// Scans and returns the next token, or a lexical error (E2).
    pub fn next_token(&mut self) -> Result<Token, CompileError> {
        loop {
            let (line, col) = self.src.pos();
            let start_pos = Pos::new(line, col);
            let Some(c) = self.src.next_char() else {
                return Ok(Token::new(TokenKind::Eof, String::new(), start_pos));
            };

            if c.is_ascii_whitespace() {
                continue; // state 0 self-loop; Source already tracks line/col
            }

            if c.is_ascii_alphabetic() {
                return Ok(self.scan_identifier(c, start_pos));
            }

            if c.is_ascii_digit() {
                return self.scan_number(c, start_pos);
            }

            if c == b'<' {
                return Ok(self.scan_lt(start_pos));
            }
            if c == b'>' {
                return Ok(self.scan_gt(start_pos));
            }
            if c == b':' {
                return Ok(self.scan_colon(start_pos));
            }
            if c == b'\\' {
                self.scan_comment(start_pos)?;
                continue;
            }
            if SINGLE_CHAR_PUNCT.contains(&c) {
                let lexeme = (c as char).to_string();
                let kind = keyword_or_punct(&lexeme).expect("single-char punct is always known");
                return Ok(Token::new(kind, lexeme, start_pos));
            }

            return Err(CompileError::new(
                ErrorKind::Lexical,
                start_pos,
                format!("unexpected character '{}'", c as char),
            ));
        }
    }

    // State 1: identifier / keyword.
    fn scan_identifier(&mut self, first: u8, pos: Pos) -> Token {
        let mut raw = vec![first];
        loop {
            match self.src.next_char() {
                Some(c) if c.is_ascii_alphanumeric() => raw.push(c),
                Some(c) => {
                    self.src.pushback(c);
                    break;
                }
                None => break,
            }
        }
        let full = String::from_utf8_lossy(&raw).into_owned();
        let truncated: String = full.chars().take(MAX_IDENT_LEN).collect();
        let kind = keyword_or_punct(&full).unwrap_or_else(|| TokenKind::Ident(truncated.clone()));
        Token::new(kind, full, pos)
    }

    // State 2: integer literal. A digit followed by a letter is a lexical
    // error (identifiers must start with a letter, spec §4.1).
    fn scan_number(&mut self, first: u8, pos: Pos) -> Result<Token, CompileError> {
        let mut raw = vec![first];
        loop {
            match self.src.next_char() {
                Some(c) if c.is_ascii_digit() => raw.push(c),
                Some(c) if c.is_ascii_alphabetic() => {
                    return Err(CompileError::new(
                        ErrorKind::Lexical,
                        pos,
                        "identifiers must not start with a digit".to_string(),
                    ));
                }
                Some(c) => {
                    self.src.pushback(c);
                    break;
                }
                None => break,
            }
        }
        let text = String::from_utf8_lossy(&raw).into_owned();
        let value: i32 = text.parse().map_err(|_| {
            CompileError::new(ErrorKind::Lexical, pos, "number literal too large")
        })?;
        Ok(Token::new(TokenKind::Number(value), text, pos))
    }

    // State 3: '<' -> '<=' | '<>' | '<'
    fn scan_lt(&mut self, pos: Pos) -> Token {
        match self.src.next_char() {
            Some(b'=') => Token::new(TokenKind::Leq, "<=".into(), pos),
            Some(b'>') => Token::new(TokenKind::Neq, "<>".into(), pos),
            Some(c) => {
                self.src.pushback(c);
                Token::new(TokenKind::Lss, "<".into(), pos)
            }
            None => Token::new(TokenKind::Lss, "<".into(), pos),
        }
    }

    // State 4: '>' -> '>=' | '>'
    fn scan_gt(&mut self, pos: Pos) -> Token {
        match self.src.next_char() {
            Some(b'=') => Token::new(TokenKind::Geq, ">=".into(), pos),
            Some(c) => {
                self.src.pushback(c);
                Token::new(TokenKind::Gtr, ">".into(), pos)
            }
            None => Token::new(TokenKind::Gtr, ">".into(), pos),
        }
    }

    // State 5: ':' -> ':=' | ':'
    fn scan_colon(&mut self, pos: Pos) -> Token {
        match self.src.next_char() {
            Some(b'=') => Token::new(TokenKind::Becomes, ":=".into(), pos),
            Some(c) => {
                self.src.pushback(c);
                Token::new(TokenKind::Colon, ":".into(), pos)
            }
            None => Token::new(TokenKind::Colon, ":".into(), pos),
        }
    }

    // States 6/7/8: `\* ... *\` comments.
    fn scan_comment(&mut self, start: Pos) -> Result<(), CompileError> {
        match self.src.next_char() {
            Some(b'*') => {}
            _ => {
                return Err(CompileError::new(
                    ErrorKind::Lexical,
                    start,
                    "expected '*' after '\\' to open a comment",
                ))
            }
        }
        loop {
            match self.src.next_char() {
                None => {
                    return Err(CompileError::new(
                        ErrorKind::Lexical,
                        start,
                        "unterminated comment",
                    ))
                }
                Some(b'*') => loop {
                    match self.src.next_char() {
                        Some(b'\\') => return Ok(()),
                        Some(b'*') => continue,
                        Some(_) => break,
                        None => {
                            return Err(CompileError::new(
                                ErrorKind::Lexical,
                                start,
                                "unterminated comment",
                            ))
                        }
                    }
                },
                Some(_) => continue,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(src);
        let mut out = Vec::new();
        loop {
            let tok = lexer.next_token().expect("lex ok");
            if tok.kind == TokenKind::Eof {
                break;
            }
            out.push(tok.kind);
        }
        out
    }

    #[test]
    fn lexes_assignment_statement() {
        let toks = kinds("x := 1;");
        assert_eq!(
            toks,
            vec![
                TokenKind::Ident("x".into()),
                TokenKind::Becomes,
                TokenKind::Number(1),
                TokenKind::Semicolon,
            ]
        );
    }

    #[test]
    fn distinguishes_two_char_operators() {
        assert_eq!(kinds("<="), vec![TokenKind::Leq]);
        assert_eq!(kinds("<>"), vec![TokenKind::Neq]);
        assert_eq!(kinds("<"), vec![TokenKind::Lss]);
        assert_eq!(kinds(">="), vec![TokenKind::Geq]);
        assert_eq!(kinds(">"), vec![TokenKind::Gtr]);
    }

    #[test]
    fn truncates_long_identifiers_to_30_chars() {
        let long = "a".repeat(40);
        let mut lexer = Lexer::new(&long);
        let tok = lexer.next_token().unwrap();
        match tok.kind {
            TokenKind::Ident(name) => assert_eq!(name.len(), MAX_IDENT_LEN),
            other => panic!("expected ident, got {other:?}"),
        }
    }

    #[test]
    fn digit_then_letter_is_lexical_error() {
        let mut lexer = Lexer::new("1a");
        assert!(lexer.next_token().is_err());
    }

    #[test]
    fn skips_comments() {
        let toks = kinds("x \\* this is ignored *\\ := 2;");
        assert_eq!(
            toks,
            vec![
                TokenKind::Ident("x".into()),
                TokenKind::Becomes,
                TokenKind::Number(2),
                TokenKind::Semicolon,
            ]
        );
    }

    #[test]
    fn unterminated_comment_is_lexical_error() {
        let mut lexer = Lexer::new("\\* never closes");
        assert!(lexer.next_token().is_err());
    }

    #[test]
    fn keywords_are_recognized() {
        let toks = kinds("declare enddeclare if else while do exit select default call in inout print return and or not program procedure function");
        assert_eq!(
            toks,
            vec![
                TokenKind::Declare,
                TokenKind::EndDeclare,
                TokenKind::If,
                TokenKind::Else,
                TokenKind::While,
                TokenKind::Do,
                TokenKind::Exit,
                TokenKind::Select,
                TokenKind::Default,
                TokenKind::Call,
                TokenKind::In,
                TokenKind::Inout,
                TokenKind::Print,
                TokenKind::Return,
                TokenKind::And,
                TokenKind::Or,
                TokenKind::Not,
                TokenKind::Program,
                TokenKind::Procedure,
                TokenKind::Function,
            ]
        );
    }

    #[test]
    fn line_and_col_are_tracked_across_lines() {
        let mut lexer = Lexer::new("x\ny");
        let t1 = lexer.next_token().unwrap();
        assert_eq!(t1.pos, Pos::new(1, 0));
        let t2 = lexer.next_token().unwrap();
        assert_eq!(t2.pos, Pos::new(2, 0));
    }
}
