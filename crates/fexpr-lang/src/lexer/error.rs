use thiserror::Error;

use crate::range::Range;

#[derive(Error, Debug, PartialEq, Clone)]
pub enum LexerError {
    #[error("Unexpected character `{1}`")]
    UnexpectedCharacter(Range, char),
    #[error("Unterminated field reference, expected a closing `}}`")]
    UnterminatedField(Range),
    #[error("Unterminated string literal")]
    UnterminatedString(Range),
}

impl LexerError {
    #[cold]
    pub fn range(&self) -> Option<&Range> {
        match self {
            LexerError::UnexpectedCharacter(range, _) => Some(range),
            LexerError::UnterminatedField(range) => Some(range),
            LexerError::UnterminatedString(range) => Some(range),
        }
    }
}
