//! `fexpr-lang` parses and evaluates attribute expressions over feature records.
//!
//! ## Examples
//!
//! ```rust
//! use fexpr_lang::{Context, NoLookup, Record, Value};
//!
//! let record = Record::new().with("quantity", 3).with("price", 2);
//! let mut lookup = NoLookup;
//! let mut ctx = Context::new(&record, &mut lookup);
//!
//! assert_eq!(fexpr_lang::eval("{quantity} * {price}", &mut ctx).unwrap(), Value::from(6));
//!
//! // In filter mode comparisons against fields become predicates.
//! let mut ctx = Context::new(&record, &mut lookup).with_filter_mode(true);
//! let value = fexpr_lang::eval("{status} = 'open'", &mut ctx).unwrap();
//! assert_eq!(value, Value::Filter(fexpr_lang::Filter::eq("status", "open")));
//! ```
mod ast;
mod error;
mod eval;
mod lexer;
mod number;
mod range;
mod value;

use error::InnerError;

pub use ast::Program;
pub use ast::error::ParseError;
pub use ast::node::{BinaryOp, Expr, Literal, Node, UnaryOp};
pub use ast::parser::Parser;
pub use error::Error;
pub use eval::builtin::{BUILTIN_FUNCTIONS, BuiltinFunction, ParamNum};
pub use eval::context::{Context, FeatureLookup, NoLookup};
pub use eval::error::EvalError;
pub use lexer::Lexer;
pub use lexer::error::LexerError;
pub use lexer::token::{Token, TokenKind};
pub use number::Number;
pub use range::{Position, Range};
pub use value::{Filter, FilterOp, Record, Value, like};

#[allow(clippy::result_large_err)]
pub fn parse(code: &str) -> Result<Program, Error> {
    Parser::new(tokenize(code)?.iter())
        .parse()
        .map_err(|e| Error::from_error(code, InnerError::Parse(e)))
}

#[allow(clippy::result_large_err)]
pub fn tokenize(code: &str) -> Result<Vec<Token>, Error> {
    Lexer::new()
        .tokenize(code)
        .map_err(|e| Error::from_error(code, InnerError::Lexer(e)))
}

/// Evaluates an already parsed `program`; `code` is the text it was parsed from.
#[allow(clippy::result_large_err)]
pub fn eval_program(code: &str, program: &Program, ctx: &mut Context) -> Result<Value, Error> {
    eval::eval(program, ctx).map_err(|e| Error::from_error(code, InnerError::Eval(e)))
}

/// Parses and evaluates `code` in one step.
#[allow(clippy::result_large_err)]
pub fn eval(code: &str, ctx: &mut Context) -> Result<Value, Error> {
    let program = parse(code)?;
    eval_program(code, &program, ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::lexer("{a +", "LexerError::UnterminatedField")]
    #[case::parser("1 +", "ParseError::UnexpectedEOFDetected")]
    #[case::eval("nope()", "EvalError::NotDefined")]
    fn test_eval_error_code(#[case] code: &str, #[case] expected: &str) {
        use miette::Diagnostic;

        let record = Record::new();
        let mut lookup = NoLookup;
        let mut ctx = Context::new(&record, &mut lookup);
        let err = eval(code, &mut ctx).unwrap_err();

        assert_eq!(err.code().unwrap().to_string(), expected);
        assert_eq!(err.source_code, code);
    }

    #[test]
    fn test_parse_display_round_trip() {
        let program = parse("getFeature('parcels', 'id', {parcel_id}).area * 2").unwrap();
        let printed = program.to_string();
        assert_eq!(parse(&printed).unwrap().to_string(), printed);
    }
}
