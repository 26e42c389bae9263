//! Declarations and subprogram headers (spec §4.4 grammar: `declarations`,
//! `varlist`, `subprograms`, `func`, `formalpars`, `formalparitem`).

use super::Parser;
use crate::error::{CompileError, ErrorKind};
use crate::symtab::{ParamMode, RetType};
use crate::token::TokenKind;

impl Parser {
    // declarations := ['declare' varlist 'enddeclare']
    pub(super) fn declarations(&mut self) -> Result<(), CompileError> {
        if self.tok.kind == TokenKind::Declare {
            self.advance()?;
            self.varlist()?;
            self.expect(&TokenKind::EndDeclare)?;
            self.advance()?;
        }
        Ok(())
    }

    // varlist := IDENT (',' IDENT)*
    fn varlist(&mut self) -> Result<(), CompileError> {
        let pos = self.pos();
        let name = self.expect_ident()?;
        self.symtab.declare_variable(&name, pos)?;
        while self.tok.kind == TokenKind::Comma {
            self.advance()?;
            let pos = self.pos();
            let name = self.expect_ident()?;
            self.symtab.declare_variable(&name, pos)?;
        }
        Ok(())
    }

    // subprograms := (('procedure'|'function') IDENT formalpars block)*
    pub(super) fn subprograms(&mut self) -> Result<(), CompileError> {
        while matches!(self.tok.kind, TokenKind::Procedure | TokenKind::Function) {
            let is_function = self.tok.kind == TokenKind::Function;
            self.in_function.push(is_function);
            self.have_return.push(false);
            self.have_subprog = true;
            self.advance()?;

            let pos = self.pos();
            let name = self.expect_ident()?;
            let ret_type = if is_function { RetType::Int } else { RetType::Void };
            self.symtab.declare_function(&name, ret_type, pos)?;
            let enclosing_idx = self.symtab.current_idx();
            self.symtab.add_new_scope(&name);

            self.formalpars(&name, enclosing_idx)?;
            self.block(&name, false)?;

            let was_function = self.in_function.pop().expect("pushed above");
            let returned = self.have_return.pop().expect("pushed above");
            if was_function && !returned {
                return Err(CompileError::new(
                    ErrorKind::Semantic,
                    pos,
                    format!("function '{name}' has no return statement in its body"),
                ));
            }
        }
        Ok(())
    }

    // formalpars := '(' [formalparitem (',' formalparitem)*] ')'
    fn formalpars(&mut self, func_name: &str, enclosing_idx: usize) -> Result<(), CompileError> {
        self.expect(&TokenKind::LParen)?;
        self.advance()?;
        if matches!(self.tok.kind, TokenKind::In | TokenKind::Inout) {
            self.formalparitem(func_name, enclosing_idx)?;
            while self.tok.kind == TokenKind::Comma {
                self.advance()?;
                self.formalparitem(func_name, enclosing_idx)?;
            }
        }
        self.expect(&TokenKind::RParen)?;
        self.advance()?;
        Ok(())
    }

    // formalparitem := ('in'|'inout') IDENT
    fn formalparitem(&mut self, func_name: &str, enclosing_idx: usize) -> Result<(), CompileError> {
        let mode = match self.tok.kind {
            TokenKind::In => ParamMode::Cv,
            TokenKind::Inout => ParamMode::Ref,
            _ => {
                return Err(CompileError::new(
                    ErrorKind::Syntax,
                    self.pos(),
                    format!("expected 'in' or 'inout' but found {}", self.tok.kind),
                ))
            }
        };
        self.advance()?;
        let pos = self.pos();
        let name = self.expect_ident()?;
        self.symtab.declare_parameter(&name, mode, pos)?;
        self.symtab.add_function_arg(enclosing_idx, func_name, mode);
        Ok(())
    }
}
