//! Statements and structured control flow (spec §4.2/§4.4: `sequence`,
//! `brack_or_stat`, `statement`, `if`, `while`, `do...while`, `select`,
//! `exit`, `return`, `print`, `call`).

use super::Parser;
use crate::error::{CompileError, ErrorKind};
use crate::ir::{make_list, merge, Op, Operand};
use crate::token::TokenKind;

impl Parser {
    // sequence := statement (';' statement)*
    pub(super) fn sequence(&mut self) -> Result<(), CompileError> {
        self.statement()?;
        while self.tok.kind == TokenKind::Semicolon {
            self.advance()?;
            self.statement()?;
        }
        Ok(())
    }

    // brack_or_stat := '{' sequence '}' | statement ';'
    pub(super) fn brack_or_stat(&mut self) -> Result<(), CompileError> {
        if self.tok.kind == TokenKind::LBrace {
            self.advance()?;
            self.sequence()?;
            self.expect(&TokenKind::RBrace)?;
            self.advance()?;
        } else {
            self.statement()?;
            self.expect(&TokenKind::Semicolon)?;
            self.advance()?;
        }
        Ok(())
    }

    fn statement(&mut self) -> Result<(), CompileError> {
        match self.tok.kind.clone() {
            TokenKind::Ident(name) => {
                self.advance()?;
                self.expect(&TokenKind::Becomes)?;
                self.advance()?;
                let e = self.expression()?;
                self.ir.gen_quad(Op::Assign, e, Operand::Blank, name.into());
                Ok(())
            }
            TokenKind::If => self.if_stat(),
            TokenKind::While => self.while_stat(),
            TokenKind::Do => self.dowhile_stat(),
            TokenKind::Select => self.select_stat(),
            TokenKind::Exit => self.exit_stat(),
            TokenKind::Return => self.return_stat(),
            TokenKind::Print => self.print_stat(),
            TokenKind::Call => self.call_stat(),
            // statement := ... | ε
            _ => Ok(()),
        }
    }

    // 'if' '(' condition ')' brack_or_stat ['else' brack_or_stat]
    fn if_stat(&mut self) -> Result<(), CompileError> {
        self.advance()?;
        self.expect(&TokenKind::LParen)?;
        self.advance()?;
        let (true_list, false_list) = self.condition()?;
        self.expect(&TokenKind::RParen)?;
        self.advance()?;

        self.ir.backpatch(&true_list, self.ir.next_quad());
        self.brack_or_stat()?;
        let skip_quad = self
            .ir
            .gen_quad(Op::Jump, Operand::Blank, Operand::Blank, Operand::Blank);
        let skip_list = make_list(skip_quad);

        self.ir.backpatch(&false_list, self.ir.next_quad());
        if self.tok.kind == TokenKind::Else {
            self.advance()?;
            self.brack_or_stat()?;
        }
        self.ir.backpatch(&skip_list, self.ir.next_quad());
        Ok(())
    }

    // 'while' '(' condition ')' brack_or_stat
    fn while_stat(&mut self) -> Result<(), CompileError> {
        self.advance()?;
        let b_quad = self.ir.next_quad();
        self.expect(&TokenKind::LParen)?;
        self.advance()?;
        let (true_list, false_list) = self.condition()?;
        self.expect(&TokenKind::RParen)?;
        self.advance()?;

        self.ir.backpatch(&true_list, self.ir.next_quad());
        self.brack_or_stat()?;
        self.ir
            .gen_quad(Op::Jump, Operand::Blank, Operand::Blank, Operand::Label(b_quad));
        self.ir.backpatch(&false_list, self.ir.next_quad());
        Ok(())
    }

    // 'do' brack_or_stat 'while' '(' condition ')'
    fn dowhile_stat(&mut self) -> Result<(), CompileError> {
        self.advance()?;
        let s_quad = self.ir.next_quad();
        self.in_dowhile.push(Vec::new());
        self.brack_or_stat()?;

        self.expect(&TokenKind::While)?;
        self.advance()?;
        self.expect(&TokenKind::LParen)?;
        self.advance()?;
        let (true_list, false_list) = self.condition()?;
        self.expect(&TokenKind::RParen)?;
        self.advance()?;

        self.ir.backpatch(&true_list, s_quad);
        let post_loop = self.ir.next_quad();
        self.ir.backpatch(&false_list, post_loop);
        let exit_list = self.in_dowhile.pop().expect("pushed at loop entry");
        self.ir.backpatch(&exit_list, post_loop);
        Ok(())
    }

    // 'exit'
    fn exit_stat(&mut self) -> Result<(), CompileError> {
        let pos = self.pos();
        self.advance()?;
        if self.in_dowhile.is_empty() {
            return Err(CompileError::new(
                ErrorKind::Semantic,
                pos,
                "'exit' used outside a do-while loop",
            ));
        }
        let label = self
            .ir
            .gen_quad(Op::Jump, Operand::Blank, Operand::Blank, Operand::Blank);
        self.in_dowhile
            .last_mut()
            .expect("checked non-empty above")
            .push(label);
        Ok(())
    }

    // 'return' '(' expression ')'
    fn return_stat(&mut self) -> Result<(), CompileError> {
        let pos = self.pos();
        self.advance()?;
        self.expect(&TokenKind::LParen)?;
        self.advance()?;
        let e = self.expression()?;
        self.expect(&TokenKind::RParen)?;
        self.advance()?;
        match self.in_function.last() {
            Some(true) => {
                *self.have_return.last_mut().expect("matches in_function stack") = true;
            }
            _ => {
                return Err(CompileError::new(
                    ErrorKind::Semantic,
                    pos,
                    "'return' used outside a function body",
                ))
            }
        }
        self.ir.gen_quad(Op::Retv, e, Operand::Blank, Operand::Blank);
        Ok(())
    }

    // 'print' '(' expression ')'
    fn print_stat(&mut self) -> Result<(), CompileError> {
        self.advance()?;
        self.expect(&TokenKind::LParen)?;
        self.advance()?;
        let e = self.expression()?;
        self.expect(&TokenKind::RParen)?;
        self.advance()?;
        self.ir.gen_quad(Op::Out, e, Operand::Blank, Operand::Blank);
        Ok(())
    }

    // 'call' IDENT actualpars
    fn call_stat(&mut self) -> Result<(), CompileError> {
        self.advance()?;
        let name = self.expect_ident()?;
        self.actualpars()?;
        self.ir
            .gen_quad(Op::Call, name.into(), Operand::Blank, Operand::Blank);
        Ok(())
    }

    // select := 'select' '(' IDENT ')' (NUMBER ':' brack_or_stat)+ 'default' ':' brack_or_stat
    fn select_stat(&mut self) -> Result<(), CompileError> {
        self.advance()?;
        self.expect(&TokenKind::LParen)?;
        self.advance()?;
        let id = self.expect_ident()?;
        self.expect(&TokenKind::RParen)?;
        self.advance()?;

        let mut exit_list = Vec::new();
        let mut expected = 1i32;
        loop {
            let (n, pos) = match self.tok.kind {
                TokenKind::Number(n) => (n, self.pos()),
                _ => break,
            };
            if n != expected {
                return Err(CompileError::new(
                    ErrorKind::Syntax,
                    pos,
                    format!("select case constants must be 1, 2, 3, ... in order; expected {expected}, found {n}"),
                ));
            }
            self.advance()?;
            self.expect(&TokenKind::Colon)?;
            self.advance()?;

            let true_label = self
                .ir
                .gen_quad(Op::Eq, id.clone().into(), n.into(), Operand::Blank);
            let false_label = self
                .ir
                .gen_quad(Op::Jump, Operand::Blank, Operand::Blank, Operand::Blank);
            self.ir.backpatch(&make_list(true_label), self.ir.next_quad());
            self.brack_or_stat()?;
            let exit_quad = self
                .ir
                .gen_quad(Op::Jump, Operand::Blank, Operand::Blank, Operand::Blank);
            exit_list = merge(exit_list, make_list(exit_quad));
            self.ir.backpatch(&make_list(false_label), self.ir.next_quad());
            expected += 1;
        }
        if expected == 1 {
            return Err(CompileError::new(
                ErrorKind::Syntax,
                self.pos(),
                "'select' requires at least one numbered case",
            ));
        }
        self.expect(&TokenKind::Default)?;
        self.advance()?;
        self.expect(&TokenKind::Colon)?;
        self.advance()?;
        self.brack_or_stat()?;
        self.ir.backpatch(&exit_list, self.ir.next_quad());
        Ok(())
    }
}
