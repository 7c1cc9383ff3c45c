pub mod builtin;
pub mod context;
pub mod error;

use builtin::{BUILTIN_FUNCTIONS, GET_FEATURE, IF};
use context::Context;
use error::EvalError;

use crate::Program;
use crate::ast::node::{BinaryOp, Expr, Literal, Node, UnaryOp};
use crate::value::{Filter, FilterOp, Value};

/// Evaluates `program` against the subject record held by `ctx`.
///
/// Foreign lookups go through the context and never block; a lookup whose
/// feature is not known yet evaluates to `None` for this pass.
pub fn eval(program: &Program, ctx: &mut Context) -> Result<Value, EvalError> {
    eval_node(program, ctx)
}

fn eval_node(node: &Node, ctx: &mut Context) -> Result<Value, EvalError> {
    match &node.expr {
        Expr::Literal(literal) => Ok(eval_literal(literal)),
        Expr::Field(name) => Ok(ctx.record().get(name).cloned().unwrap_or_default()),
        Expr::Member(target, name) => Ok(eval_node(target, ctx)?.get(name)),
        Expr::Call(name, args) => eval_call(node, name, args, ctx),
        Expr::Unary(op, operand) => {
            let value = eval_node(operand, ctx)?;
            Ok(eval_unary(*op, value, ctx.is_filter_mode()))
        }
        Expr::Binary(op, lhs, rhs) => eval_binary(*op, lhs, rhs, ctx),
    }
}

fn eval_literal(literal: &Literal) -> Value {
    match literal {
        Literal::Number(n) => Value::Number(*n),
        Literal::String(s) => Value::String(s.clone()),
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Null => Value::None,
    }
}

fn eval_call(
    node: &Node,
    name: &str,
    args: &[Node],
    ctx: &mut Context,
) -> Result<Value, EvalError> {
    let function_name = name.to_ascii_lowercase();

    match function_name.as_str() {
        GET_FEATURE => {
            check_arity(node, name, args, 3, 3)?;
            let dataset = eval_node(&args[0], ctx)?;
            let attribute = eval_node(&args[1], ctx)?;
            let value = eval_node(&args[2], ctx)?;

            match (dataset, attribute, value) {
                (_, _, Value::None) => Ok(Value::None),
                (Value::String(dataset), Value::String(attribute), value) => Ok(ctx
                    .get_feature(&dataset, &attribute, &value)
                    .map(Value::Record)
                    .unwrap_or_default()),
                _ => Ok(Value::None),
            }
        }
        IF => {
            check_arity(node, name, args, 3, 3)?;
            if eval_node(&args[0], ctx)?.is_truthy() {
                eval_node(&args[1], ctx)
            } else {
                eval_node(&args[2], ctx)
            }
        }
        _ => match BUILTIN_FUNCTIONS.get(function_name.as_str()) {
            Some(f) => {
                if !f.num_params.is_valid(args.len()) {
                    return Err(EvalError::InvalidNumberOfArguments(
                        node.token.clone(),
                        name.to_string(),
                        f.num_params.to_num(),
                        args.len(),
                    ));
                }

                let values = args
                    .iter()
                    .map(|arg| eval_node(arg, ctx))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((f.func)(&values))
            }
            None => Err(EvalError::NotDefined(node.token.clone(), name.to_string())),
        },
    }
}

fn check_arity(
    node: &Node,
    name: &str,
    args: &[Node],
    min: usize,
    max: usize,
) -> Result<(), EvalError> {
    let got = args.len();
    if got < min || got > max {
        Err(EvalError::InvalidNumberOfArguments(
            node.token.clone(),
            name.to_string(),
            max,
            got,
        ))
    } else {
        Ok(())
    }
}

fn eval_unary(op: UnaryOp, value: Value, filter_mode: bool) -> Value {
    match (op, value) {
        (UnaryOp::Negate, Value::Number(n)) => Value::Number(-n),
        (UnaryOp::Negate, _) => Value::None,
        (UnaryOp::Not, Value::Filter(filter)) if filter_mode => {
            Value::Filter(Filter::Not(Box::new(filter)))
        }
        (UnaryOp::Not, Value::None) => Value::None,
        (UnaryOp::Not, value) => Value::Bool(!value.is_truthy()),
    }
}

fn filter_op(op: BinaryOp) -> Option<FilterOp> {
    match op {
        BinaryOp::Eq => Some(FilterOp::Eq),
        BinaryOp::NotEq => Some(FilterOp::NotEq),
        BinaryOp::Lt => Some(FilterOp::Lt),
        BinaryOp::Lte => Some(FilterOp::Lte),
        BinaryOp::Gt => Some(FilterOp::Gt),
        BinaryOp::Gte => Some(FilterOp::Gte),
        BinaryOp::Like => Some(FilterOp::Like),
        _ => None,
    }
}

fn eval_binary(
    op: BinaryOp,
    lhs: &Node,
    rhs: &Node,
    ctx: &mut Context,
) -> Result<Value, EvalError> {
    // In filter mode `{attr} <op> value` becomes a predicate on `attr` instead of a boolean.
    if let (true, Expr::Field(attribute), Some(operator)) =
        (ctx.is_filter_mode(), &lhs.expr, filter_op(op))
    {
        let value = eval_node(rhs, ctx)?;
        return Ok(Value::Filter(Filter::compare(attribute, operator, value)));
    }

    let lhs = eval_node(lhs, ctx)?;
    let rhs = eval_node(rhs, ctx)?;

    Ok(match op {
        BinaryOp::And => eval_and(lhs, rhs),
        BinaryOp::Or => eval_or(lhs, rhs),
        BinaryOp::Add => match (&lhs, &rhs) {
            (Value::None, _) | (_, Value::None) => Value::None,
            (Value::Number(a), Value::Number(b)) => Value::Number(*a + *b),
            (Value::String(_), _) | (_, Value::String(_)) => {
                Value::String(format!("{}{}", lhs, rhs))
            }
            _ => Value::None,
        },
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
            eval_arithmetic(op, &lhs, &rhs)
        }
        _ => match filter_op(op) {
            Some(operator) => Value::Bool(operator.apply(&lhs, &rhs)),
            None => Value::None,
        },
    })
}

fn eval_arithmetic(op: BinaryOp, lhs: &Value, rhs: &Value) -> Value {
    let (a, b) = match (lhs, rhs) {
        (Value::None, _) | (_, Value::None) => return Value::None,
        _ => match (lhs.as_number(), rhs.as_number()) {
            (Some(a), Some(b)) => (a, b),
            _ => return Value::None,
        },
    };

    match op {
        BinaryOp::Sub => Value::Number(a - b),
        BinaryOp::Mul => Value::Number(a * b),
        BinaryOp::Div | BinaryOp::Mod if b.is_zero() => Value::None,
        BinaryOp::Div => Value::Number(a / b),
        BinaryOp::Mod => Value::Number(a % b),
        _ => Value::None,
    }
}

fn eval_and(lhs: Value, rhs: Value) -> Value {
    match (lhs, rhs) {
        (Value::Filter(a), Value::Filter(b)) => Value::Filter(a.and(b)),
        (Value::Filter(f), other) | (other, Value::Filter(f)) => {
            if other.is_truthy() {
                Value::Filter(f)
            } else {
                Value::FALSE
            }
        }
        (a, b) => Value::Bool(a.is_truthy() && b.is_truthy()),
    }
}

fn eval_or(lhs: Value, rhs: Value) -> Value {
    match (lhs, rhs) {
        (Value::Filter(a), Value::Filter(b)) => Value::Filter(a.or(b)),
        (Value::Filter(f), other) | (other, Value::Filter(f)) => {
            if other.is_truthy() {
                Value::TRUE
            } else {
                Value::Filter(f)
            }
        }
        (a, b) => Value::Bool(a.is_truthy() || b.is_truthy()),
    }
}
