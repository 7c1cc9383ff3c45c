use crate::lexer::token::{Token, TokenKind};
use crate::range::Range;
use smol_str::SmolStr;
use std::iter::Peekable;

use super::Program;
use super::error::ParseError;
use super::node::{Args, BinaryOp, Expr, Literal, Node, UnaryOp};

/// Binding power of `not`, which applies to a whole comparison.
const NOT_OPERAND_PRECEDENCE: u8 = 3;

pub struct Parser<'a> {
    tokens: Peekable<core::slice::Iter<'a, Token>>,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: core::slice::Iter<'a, Token>) -> Self {
        Self {
            tokens: tokens.peekable(),
        }
    }

    pub fn parse(&mut self) -> Result<Program, ParseError> {
        let token = self.next_token()?;
        let program = self.parse_expr(token)?;

        match self.tokens.next() {
            Some(token) if !token.is_eof() => Err(ParseError::UnexpectedToken(token.clone())),
            _ => Ok(program),
        }
    }

    fn next_token(&mut self) -> Result<&'a Token, ParseError> {
        self.tokens.next().ok_or_else(|| {
            ParseError::UnexpectedEOFDetected(Token {
                range: Range::default(),
                kind: TokenKind::Eof,
            })
        })
    }

    fn peek_kind(&mut self) -> Option<&TokenKind> {
        self.tokens.peek().map(|token| &token.kind)
    }

    #[inline(always)]
    fn parse_expr(&mut self, token: &'a Token) -> Result<Node, ParseError> {
        let lhs = self.parse_unary_expr(token)?;
        self.parse_binary_op(1, lhs)
    }

    #[inline(always)]
    fn binary_op(kind: &TokenKind) -> Option<BinaryOp> {
        match kind {
            TokenKind::Or => Some(BinaryOp::Or),
            TokenKind::And => Some(BinaryOp::And),
            TokenKind::EqEq => Some(BinaryOp::Eq),
            TokenKind::NeEq => Some(BinaryOp::NotEq),
            TokenKind::Lt => Some(BinaryOp::Lt),
            TokenKind::Lte => Some(BinaryOp::Lte),
            TokenKind::Gt => Some(BinaryOp::Gt),
            TokenKind::Gte => Some(BinaryOp::Gte),
            TokenKind::Like => Some(BinaryOp::Like),
            TokenKind::Plus => Some(BinaryOp::Add),
            TokenKind::Minus => Some(BinaryOp::Sub),
            TokenKind::Asterisk => Some(BinaryOp::Mul),
            TokenKind::Slash => Some(BinaryOp::Div),
            TokenKind::Percent => Some(BinaryOp::Mod),
            _ => None,
        }
    }

    #[inline(always)]
    fn binary_op_precedence(op: BinaryOp) -> u8 {
        match op {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Eq
            | BinaryOp::NotEq
            | BinaryOp::Lt
            | BinaryOp::Lte
            | BinaryOp::Gt
            | BinaryOp::Gte
            | BinaryOp::Like => 3,
            BinaryOp::Add | BinaryOp::Sub => 4,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => 5,
        }
    }

    fn parse_binary_op(&mut self, min_prec: u8, mut lhs: Node) -> Result<Node, ParseError> {
        loop {
            let op = match self.peek_kind().and_then(Self::binary_op) {
                Some(op) => op,
                None => break,
            };
            let prec = Self::binary_op_precedence(op);

            if prec < min_prec {
                break;
            }

            let operator_token = self.next_token()?;
            let rhs_token = self.next_token()?;
            let mut rhs = self.parse_unary_expr(rhs_token)?;

            loop {
                let next_prec = self
                    .peek_kind()
                    .and_then(Self::binary_op)
                    .map(Self::binary_op_precedence)
                    .unwrap_or(0);

                if next_prec > prec {
                    rhs = self.parse_binary_op(next_prec, rhs)?;
                } else {
                    break;
                }
            }

            lhs = Node::new(
                operator_token.clone(),
                Expr::Binary(op, Box::new(lhs), Box::new(rhs)),
            );
        }

        Ok(lhs)
    }

    fn parse_unary_expr(&mut self, token: &'a Token) -> Result<Node, ParseError> {
        match &token.kind {
            TokenKind::Minus => {
                let operand_token = self.next_token()?;
                let operand = self.parse_unary_expr(operand_token)?;
                Ok(Node::new(
                    token.clone(),
                    Expr::Unary(UnaryOp::Negate, Box::new(operand)),
                ))
            }
            TokenKind::Not => {
                let operand_token = self.next_token()?;
                let operand = self.parse_unary_expr(operand_token)?;
                let operand = self.parse_binary_op(NOT_OPERAND_PRECEDENCE, operand)?;
                Ok(Node::new(
                    token.clone(),
                    Expr::Unary(UnaryOp::Not, Box::new(operand)),
                ))
            }
            _ => {
                let primary = self.parse_primary_expr(token)?;
                self.parse_member_access(primary)
            }
        }
    }

    fn parse_member_access(&mut self, mut target: Node) -> Result<Node, ParseError> {
        while let Some(TokenKind::Dot) = self.peek_kind() {
            let dot_token = self.next_token()?;
            let name_token = self.next_token()?;
            let name = match &name_token.kind {
                TokenKind::Ident(name) | TokenKind::Field(name) => name.clone(),
                _ => return Err(ParseError::ExpectedAttributeName(name_token.clone())),
            };

            target = Node::new(
                Token {
                    range: dot_token.range.merge(&name_token.range),
                    kind: name_token.kind.clone(),
                },
                Expr::Member(Box::new(target), name),
            );
        }

        Ok(target)
    }

    fn parse_primary_expr(&mut self, token: &'a Token) -> Result<Node, ParseError> {
        match &token.kind {
            TokenKind::NumberLiteral(n) => Ok(self.parse_literal(token, Literal::Number(*n))),
            TokenKind::StringLiteral(s) => {
                Ok(self.parse_literal(token, Literal::String(s.clone())))
            }
            TokenKind::BoolLiteral(b) => Ok(self.parse_literal(token, Literal::Bool(*b))),
            TokenKind::Null => Ok(self.parse_literal(token, Literal::Null)),
            TokenKind::Field(name) => Ok(Node::new(token.clone(), Expr::Field(name.clone()))),
            TokenKind::Ident(name) => self.parse_ident(name, token),
            TokenKind::LParen => self.parse_paren(token),
            TokenKind::Eof => Err(ParseError::UnexpectedEOFDetected(token.clone())),
            _ => Err(ParseError::UnexpectedToken(token.clone())),
        }
    }

    fn parse_literal(&self, token: &Token, literal: Literal) -> Node {
        Node::new(token.clone(), Expr::Literal(literal))
    }

    // A bare identifier not followed by `(` reads an attribute of the subject record.
    fn parse_ident(&mut self, name: &SmolStr, token: &'a Token) -> Result<Node, ParseError> {
        match self.peek_kind() {
            Some(TokenKind::LParen) => {
                self.next_token()?;
                let args = self.parse_args()?;
                Ok(Node::new(token.clone(), Expr::Call(name.clone(), args)))
            }
            _ => Ok(Node::new(token.clone(), Expr::Field(name.clone()))),
        }
    }

    fn parse_args(&mut self) -> Result<Args, ParseError> {
        let mut args = Vec::new();

        if let Some(TokenKind::RParen) = self.peek_kind() {
            self.next_token()?;
            return Ok(args);
        }

        loop {
            let token = self.next_token()?;
            args.push(self.parse_expr(token)?);

            let delimiter = self.next_token()?;
            match delimiter.kind {
                TokenKind::Comma => continue,
                TokenKind::RParen => break,
                TokenKind::Eof => return Err(ParseError::UnexpectedEOFDetected(delimiter.clone())),
                _ => return Err(ParseError::ExpectedClosingParen(delimiter.clone())),
            }
        }

        Ok(args)
    }

    fn parse_paren(&mut self, _lparen_token: &'a Token) -> Result<Node, ParseError> {
        let expr_token = self.next_token()?;
        let expr = self.parse_expr(expr_token)?;
        let rparen_token = self.next_token()?;

        match rparen_token.kind {
            TokenKind::RParen => Ok(expr),
            TokenKind::Eof => Err(ParseError::UnexpectedEOFDetected(rparen_token.clone())),
            _ => Err(ParseError::ExpectedClosingParen(rparen_token.clone())),
        }
    }
}
