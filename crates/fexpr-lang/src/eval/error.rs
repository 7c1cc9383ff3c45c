use thiserror::Error;

use crate::Token;

type FunctionName = String;
type ErrorToken = Token;

#[derive(Error, Debug, PartialEq, Clone)]
pub enum EvalError {
    #[error("\"{1}\" is not defined")]
    NotDefined(ErrorToken, FunctionName),
    #[error("Invalid number of arguments in \"{1}\", expected {2}, got {3}")]
    InvalidNumberOfArguments(ErrorToken, FunctionName, usize, usize),
}

impl EvalError {
    #[cold]
    pub fn token(&self) -> &Token {
        match self {
            EvalError::NotDefined(token, _) => token,
            EvalError::InvalidNumberOfArguments(token, _, _, _) => token,
        }
    }
}
