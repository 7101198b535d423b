// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recursive-descent parser for condition expressions.
//!
//! Precedence, low to high: `or` < `and` < `not` < comparison < `in` <
//! postfix (attribute/subscript/call) < atom.

use crate::ast::{CmpOp, Expr, Literal};
use crate::error::EvalError;
use crate::lexer::{Lexer, Token, TokenKind};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn parse(input: &str) -> Result<Expr, EvalError> {
        let tokens = Lexer::tokenize(input)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.parse_or()?;
        parser.expect_eof()?;
        Ok(expr)
    }

    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.tokens[self.pos].kind.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        kind
    }

    fn expect_eof(&self) -> Result<(), EvalError> {
        if *self.peek() == TokenKind::Eof {
            Ok(())
        } else {
            Err(EvalError::Syntax(format!(
                "unexpected trailing token {:?}",
                self.peek()
            )))
        }
    }

    fn expect(&mut self, expected: TokenKind) -> Result<(), EvalError> {
        if self.peek() == &expected {
            self.advance();
            Ok(())
        } else {
            Err(EvalError::Syntax(format!(
                "expected {expected:?}, found {:?}",
                self.peek()
            )))
        }
    }

    fn parse_or(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.parse_and()?;
        while *self.peek() == TokenKind::Or {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.parse_not()?;
        while *self.peek() == TokenKind::And {
            self.advance();
            let rhs = self.parse_not()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr, EvalError> {
        if *self.peek() == TokenKind::Not {
            self.advance();
            let inner = self.parse_not()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, EvalError> {
        let lhs = self.parse_postfix()?;
        let op = match self.peek() {
            TokenKind::Eq => CmpOp::Eq,
            TokenKind::NotEq => CmpOp::NotEq,
            TokenKind::Lt => CmpOp::Lt,
            TokenKind::LtEq => CmpOp::LtEq,
            TokenKind::Gt => CmpOp::Gt,
            TokenKind::GtEq => CmpOp::GtEq,
            TokenKind::In => CmpOp::In,
            _ => return Ok(lhs),
        };
        self.advance();
        let rhs = self.parse_postfix()?;
        Ok(Expr::Cmp(op, Box::new(lhs), Box::new(rhs)))
    }

    fn parse_postfix(&mut self) -> Result<Expr, EvalError> {
        let mut expr = self.parse_atom()?;
        loop {
            match self.peek() {
                TokenKind::Dot => {
                    self.advance();
                    let name = match self.advance() {
                        TokenKind::Ident(s) => s,
                        other => {
                            return Err(EvalError::Syntax(format!(
                                "expected attribute name after '.', found {other:?}"
                            )))
                        }
                    };
                    expr = Expr::Attr(Box::new(expr), name);
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_or()?;
                    self.expect(TokenKind::RBracket)?;
                    expr = Expr::Subscript(Box::new(expr), Box::new(index));
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_atom(&mut self) -> Result<Expr, EvalError> {
        match self.advance() {
            TokenKind::Number(n) => Ok(Expr::Literal(Literal::Number(n))),
            TokenKind::Str(s) => Ok(Expr::Literal(Literal::Str(s))),
            TokenKind::True => Ok(Expr::Literal(Literal::Bool(true))),
            TokenKind::False => Ok(Expr::Literal(Literal::Bool(false))),
            TokenKind::None => Ok(Expr::Literal(Literal::None)),
            TokenKind::Ident(name) => {
                if *self.peek() == TokenKind::LParen {
                    self.advance();
                    let args = self.parse_call_args()?;
                    Ok(Expr::Call(name, args))
                } else {
                    Ok(Expr::Ident(name))
                }
            }
            TokenKind::LParen => {
                let inner = self.parse_or()?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            other => Err(EvalError::Syntax(format!("unexpected token {other:?}"))),
        }
    }

    fn parse_call_args(&mut self) -> Result<Vec<Expr>, EvalError> {
        let mut args = Vec::new();
        if *self.peek() == TokenKind::RParen {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.parse_or()?);
            match self.peek() {
                TokenKind::Comma => {
                    self.advance();
                }
                TokenKind::RParen => {
                    self.advance();
                    break;
                }
                other => {
                    return Err(EvalError::Syntax(format!(
                        "expected ',' or ')' in call arguments, found {other:?}"
                    )))
                }
            }
        }
        Ok(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_comparison() {
        let expr = Parser::parse("status == 'open'").unwrap();
        assert_eq!(
            expr,
            Expr::Cmp(
                CmpOp::Eq,
                Box::new(Expr::Ident("status".into())),
                Box::new(Expr::Literal(Literal::Str("open".into())))
            )
        );
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let expr = Parser::parse("a or b and c").unwrap();
        assert_eq!(
            expr,
            Expr::Or(
                Box::new(Expr::Ident("a".into())),
                Box::new(Expr::And(
                    Box::new(Expr::Ident("b".into())),
                    Box::new(Expr::Ident("c".into()))
                ))
            )
        );
    }

    #[test]
    fn parses_call_with_attribute_arg() {
        let expr = Parser::parse("task_tree_complete(task.id)").unwrap();
        assert_eq!(
            expr,
            Expr::Call(
                "task_tree_complete".into(),
                vec![Expr::Attr(Box::new(Expr::Ident("task".into())), "id".into())]
            )
        );
    }

    #[test]
    fn parses_subscript_chain() {
        let expr = Parser::parse("variables['mcp_calls']['gobby-tasks']").unwrap();
        assert_eq!(
            expr,
            Expr::Subscript(
                Box::new(Expr::Subscript(
                    Box::new(Expr::Ident("variables".into())),
                    Box::new(Expr::Literal(Literal::Str("mcp_calls".into())))
                )),
                Box::new(Expr::Literal(Literal::Str("gobby-tasks".into())))
            )
        );
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert!(Parser::parse("a and b )").is_err());
    }

    #[test]
    fn parses_not_equal_and_in() {
        let expr = Parser::parse("x != 1 and y in z").unwrap();
        match expr {
            Expr::And(lhs, rhs) => {
                assert!(matches!(*lhs, Expr::Cmp(CmpOp::NotEq, _, _)));
                assert!(matches!(*rhs, Expr::Cmp(CmpOp::In, _, _)));
            }
            _ => panic!("expected And"),
        }
    }
}
