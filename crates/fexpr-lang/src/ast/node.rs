use std::fmt::{self, Display, Formatter};

use itertools::Itertools;
use smol_str::SmolStr;

use crate::{Token, number::Number, range::Range};

pub type Args = Vec<Node>;

#[derive(PartialEq, Debug, Clone)]
pub struct Node {
    pub token: Token,
    pub expr: Expr,
}

impl Node {
    pub fn new(token: Token, expr: Expr) -> Self {
        Self { token, expr }
    }

    pub fn range(&self) -> Range {
        match &self.expr {
            Expr::Binary(_, lhs, rhs) => lhs.range().merge(&rhs.range()),
            Expr::Unary(_, operand) => self.token.range.merge(&operand.range()),
            Expr::Member(target, _) => target.range().merge(&self.token.range),
            Expr::Call(_, args) => args
                .last()
                .map(|arg| self.token.range.merge(&arg.range()))
                .unwrap_or_else(|| self.token.range.clone()),
            Expr::Literal(_) | Expr::Field(_) => self.token.range.clone(),
        }
    }
}

#[derive(PartialEq, Debug, Clone)]
pub enum Literal {
    Number(Number),
    String(String),
    Bool(bool),
    Null,
}

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            Literal::Number(n) => write!(f, "{}", n),
            Literal::String(s) => write!(f, "'{}'", s.replace('\'', "\\'")),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Null => write!(f, "null"),
        }
    }
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinaryOp {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::NotEq
                | BinaryOp::Lt
                | BinaryOp::Lte
                | BinaryOp::Gt
                | BinaryOp::Gte
                | BinaryOp::Like
        )
    }
}

impl Display for BinaryOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        let s = match self {
            BinaryOp::Or => "or",
            BinaryOp::And => "and",
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Lte => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Gte => ">=",
            BinaryOp::Like => "like",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
        };
        write!(f, "{}", s)
    }
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum UnaryOp {
    Negate,
    Not,
}

#[derive(PartialEq, Debug, Clone)]
pub enum Expr {
    Literal(Literal),
    Field(SmolStr),
    Member(Box<Node>, SmolStr),
    Call(SmolStr, Args),
    Unary(UnaryOp, Box<Node>),
    Binary(BinaryOp, Box<Node>, Box<Node>),
}

impl Display for Node {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match &self.expr {
            Expr::Literal(literal) => write!(f, "{}", literal),
            Expr::Field(name) => write!(f, "{{{}}}", name),
            Expr::Member(target, name) => write!(f, "{}.{}", target, name),
            Expr::Call(name, args) => write!(f, "{}({})", name, args.iter().join(", ")),
            Expr::Unary(UnaryOp::Negate, operand) => write!(f, "-{}", operand),
            Expr::Unary(UnaryOp::Not, operand) => write!(f, "(not {})", operand),
            Expr::Binary(op, lhs, rhs) => write!(f, "({} {} {})", lhs, op, rhs),
        }
    }
}
