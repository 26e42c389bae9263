//! Expressions, boolean conditions, and call argument lists (spec §4.2/
//! §4.4 grammar: `condition`, `boolterm`, `boolfactor`, `expression`,
//! `term`, `factor`, `actualpars`).

use super::Parser;
use crate::error::{CompileError, ErrorKind};
use crate::ir::{make_list, merge, JumpList, Op, Operand, ParMode};
use crate::token::TokenKind;

/// Largest magnitude a bare positive literal may have (spec §3).
const MAX_POSITIVE_LITERAL: i32 = 32767;
/// Largest magnitude allowed when immediately negated by a leading unary
/// sign — the one case where 32768 becomes a legal value, `-32768`.
const MAX_NEGATED_LITERAL: i32 = 32768;

impl Parser {
    // condition := boolterm ('or' boolterm)*
    pub(super) fn condition(&mut self) -> Result<(JumpList, JumpList), CompileError> {
        let (mut true_list, mut false_list) = self.boolterm()?;
        while self.tok.kind == TokenKind::Or {
            self.advance()?;
            self.ir.backpatch(&false_list, self.ir.next_quad());
            let (rt, rf) = self.boolterm()?;
            true_list = merge(true_list, rt);
            false_list = rf;
        }
        Ok((true_list, false_list))
    }

    // boolterm := boolfactor ('and' boolfactor)*
    fn boolterm(&mut self) -> Result<(JumpList, JumpList), CompileError> {
        let (mut true_list, mut false_list) = self.boolfactor()?;
        while self.tok.kind == TokenKind::And {
            self.advance()?;
            self.ir.backpatch(&true_list, self.ir.next_quad());
            let (rt, rf) = self.boolfactor()?;
            true_list = rt;
            false_list = merge(false_list, rf);
        }
        Ok((true_list, false_list))
    }

    // boolfactor := 'not' '[' condition ']' | '[' condition ']' | expression relop expression
    fn boolfactor(&mut self) -> Result<(JumpList, JumpList), CompileError> {
        match self.tok.kind {
            TokenKind::Not => {
                self.advance()?;
                self.expect(&TokenKind::LBracket)?;
                self.advance()?;
                let (t, f) = self.condition()?;
                self.expect(&TokenKind::RBracket)?;
                self.advance()?;
                Ok((f, t))
            }
            TokenKind::LBracket => {
                self.advance()?;
                let (t, f) = self.condition()?;
                self.expect(&TokenKind::RBracket)?;
                self.advance()?;
                Ok((t, f))
            }
            _ => {
                let lhs = self.expression()?;
                let op = self.relop()?;
                let rhs = self.expression()?;
                let true_label = self.ir.gen_quad(op, lhs, rhs, Operand::Blank);
                let false_label = self
                    .ir
                    .gen_quad(Op::Jump, Operand::Blank, Operand::Blank, Operand::Blank);
                Ok((make_list(true_label), make_list(false_label)))
            }
        }
    }

    fn relop(&mut self) -> Result<Op, CompileError> {
        let op = match self.tok.kind {
            TokenKind::Eql => Op::Eq,
            TokenKind::Neq => Op::Neq,
            TokenKind::Lss => Op::Lss,
            TokenKind::Leq => Op::Leq,
            TokenKind::Gtr => Op::Gtr,
            TokenKind::Geq => Op::Geq,
            _ => {
                return Err(CompileError::new(
                    ErrorKind::Syntax,
                    self.pos(),
                    format!("expected a relational operator but found {}", self.tok.kind),
                ))
            }
        };
        self.advance()?;
        Ok(op)
    }

    // expression := [sign] term (('+'|'-') term)*
    pub(super) fn expression(&mut self) -> Result<Operand, CompileError> {
        let neg = match self.tok.kind {
            TokenKind::Minus => {
                self.advance()?;
                true
            }
            TokenKind::Plus => {
                self.advance()?;
                false
            }
            _ => false,
        };

        let mut result = self.term(neg)?;
        if neg {
            let t = self.new_temp();
            self.ir
                .gen_quad(Op::Sub, 0.into(), result, Operand::Name(t.clone()));
            result = Operand::Name(t);
        }

        loop {
            let op = match self.tok.kind {
                TokenKind::Plus => Op::Add,
                TokenKind::Minus => Op::Sub,
                _ => break,
            };
            self.advance()?;
            let rhs = self.term(false)?;
            let t = self.new_temp();
            self.ir.gen_quad(op, result, rhs, Operand::Name(t.clone()));
            result = Operand::Name(t);
        }
        Ok(result)
    }

    // term := factor (('*'|'/') factor)*
    fn term(&mut self, allow_negated_max: bool) -> Result<Operand, CompileError> {
        let mut result = self.factor(allow_negated_max)?;
        loop {
            let op = match self.tok.kind {
                TokenKind::Times => Op::Mul,
                TokenKind::Slash => Op::Div,
                _ => break,
            };
            self.advance()?;
            let rhs = self.factor(false)?;
            let t = self.new_temp();
            self.ir.gen_quad(op, result, rhs, Operand::Name(t.clone()));
            result = Operand::Name(t);
        }
        Ok(result)
    }

    // factor := NUMBER | '(' expression ')' | IDENT [actualpars]
    //
    // `allow_negated_max` is true only for the factor in the leading
    // position of an expression's first term with a leading unary minus
    // (spec §3: `-32768` is the one literal whose magnitude exceeds 32767
    // but is still a legal signed 16-bit value once negated).
    fn factor(&mut self, allow_negated_max: bool) -> Result<Operand, CompileError> {
        match self.tok.kind.clone() {
            TokenKind::Number(n) => {
                let pos = self.pos();
                let max = if allow_negated_max {
                    MAX_NEGATED_LITERAL
                } else {
                    MAX_POSITIVE_LITERAL
                };
                if n > max {
                    return Err(CompileError::new(
                        ErrorKind::Semantic,
                        pos,
                        format!("number literal {n} does not fit in a signed 16-bit integer"),
                    ));
                }
                self.advance()?;
                Ok(Operand::Const(n))
            }
            TokenKind::LParen => {
                self.advance()?;
                let e = self.expression()?;
                self.expect(&TokenKind::RParen)?;
                self.advance()?;
                Ok(e)
            }
            TokenKind::Ident(name) => {
                self.advance()?;
                if self.tok.kind == TokenKind::LParen {
                    self.function_call_value(&name)
                } else {
                    Ok(Operand::Name(name))
                }
            }
            other => Err(CompileError::new(
                ErrorKind::Syntax,
                self.pos(),
                format!("expected a number, '(', or identifier but found {other}"),
            )),
        }
    }

    /// Function invocation used as an expression value (spec §4.2): the
    /// argument `par` quads come first, then `(par, t, RET)` and `(call,
    /// f, _, _)`; the expression's value is the fresh temp `t`.
    fn function_call_value(&mut self, name: &str) -> Result<Operand, CompileError> {
        self.actualpars()?;
        let t = self.new_temp();
        self.ir.gen_quad(
            Op::Par,
            Operand::Name(t.clone()),
            ParMode::Ret.into(),
            Operand::Blank,
        );
        self.ir
            .gen_quad(Op::Call, name.into(), Operand::Blank, Operand::Blank);
        Ok(Operand::Name(t))
    }

    // actualpars := '(' [actualparitem (',' actualparitem)*] ')'
    pub(super) fn actualpars(&mut self) -> Result<(), CompileError> {
        self.expect(&TokenKind::LParen)?;
        self.advance()?;
        if self.tok.kind != TokenKind::RParen {
            self.actualparitem()?;
            while self.tok.kind == TokenKind::Comma {
                self.advance()?;
                self.actualparitem()?;
            }
        }
        self.expect(&TokenKind::RParen)?;
        self.advance()?;
        Ok(())
    }

    // actualparitem := 'in' expression | 'inout' IDENT
    fn actualparitem(&mut self) -> Result<(), CompileError> {
        match self.tok.kind {
            TokenKind::In => {
                self.advance()?;
                let e = self.expression()?;
                self.ir.gen_quad(Op::Par, e, ParMode::Cv.into(), Operand::Blank);
                Ok(())
            }
            TokenKind::Inout => {
                self.advance()?;
                let name = self.expect_ident()?;
                self.ir
                    .gen_quad(Op::Par, name.into(), ParMode::Ref.into(), Operand::Blank);
                Ok(())
            }
            _ => Err(CompileError::new(
                ErrorKind::Syntax,
                self.pos(),
                format!("expected 'in' or 'inout' but found {}", self.tok.kind),
            )),
        }
    }
}
