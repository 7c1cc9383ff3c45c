use miette::{Diagnostic, SourceOffset, SourceSpan};

use crate::{
    Range, ast::error::ParseError, eval::error::EvalError, lexer::error::LexerError,
};

#[derive(Debug, thiserror::Error, PartialEq, Clone)]
pub enum InnerError {
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error(transparent)]
    Lexer(#[from] LexerError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// An error in one expression, carrying its text so it can be rendered with a source label.
#[derive(PartialEq, Debug, Clone, thiserror::Error)]
#[error("{cause}")]
pub struct Error {
    /// The underlying cause of the error.
    pub cause: InnerError,
    /// The expression text the error refers to.
    pub source_code: String,
    /// The location in the source code for diagnostics.
    pub location: SourceSpan,
}

impl Error {
    pub fn from_error(source_code: impl Into<String>, cause: InnerError) -> Self {
        let source_code = source_code.into();
        let range = match &cause {
            InnerError::Lexer(err) => err.range(),
            InnerError::Parse(ParseError::UnexpectedEOFDetected(_)) => None,
            InnerError::Parse(err) => Some(&err.token().range),
            InnerError::Eval(err) => Some(&err.token().range),
        };

        let location = match range {
            Some(range) => span(&source_code, range),
            None => {
                let (offset, len) = source_code
                    .char_indices()
                    .last()
                    .map(|(i, c)| (i, c.len_utf8()))
                    .unwrap_or((0, 0));
                SourceSpan::new(offset.into(), len)
            }
        };

        Self {
            cause,
            source_code,
            location,
        }
    }
}

fn span(source_code: &str, range: &Range) -> SourceSpan {
    let start = SourceOffset::from_location(
        source_code,
        range.start.line as usize,
        range.start.column,
    );
    let end = SourceOffset::from_location(source_code, range.end.line as usize, range.end.column);

    SourceSpan::new(
        start,
        std::cmp::max(end.offset().saturating_sub(start.offset()), 1),
    )
}

impl Diagnostic for Error {
    fn code<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        let c = match self.cause {
            InnerError::Lexer(LexerError::UnexpectedCharacter(_, _)) => {
                "LexerError::UnexpectedCharacter"
            }
            InnerError::Lexer(LexerError::UnterminatedField(_)) => "LexerError::UnterminatedField",
            InnerError::Lexer(LexerError::UnterminatedString(_)) => {
                "LexerError::UnterminatedString"
            }
            InnerError::Parse(ParseError::UnexpectedToken(_)) => "ParseError::UnexpectedToken",
            InnerError::Parse(ParseError::UnexpectedEOFDetected(_)) => {
                "ParseError::UnexpectedEOFDetected"
            }
            InnerError::Parse(ParseError::ExpectedClosingParen(_)) => {
                "ParseError::ExpectedClosingParen"
            }
            InnerError::Parse(ParseError::ExpectedAttributeName(_)) => {
                "ParseError::ExpectedAttributeName"
            }
            InnerError::Eval(EvalError::NotDefined(_, _)) => "EvalError::NotDefined",
            InnerError::Eval(EvalError::InvalidNumberOfArguments(_, _, _, _)) => {
                "EvalError::InvalidNumberOfArguments"
            }
        };

        Some(Box::new(c))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        let msg = match &self.cause {
            InnerError::Lexer(LexerError::UnexpectedCharacter(_, _)) => {
                Some("Remove the character or quote it inside a string literal.".to_string())
            }
            InnerError::Lexer(LexerError::UnterminatedField(_)) => {
                Some("Field references are written as `{name}`.".to_string())
            }
            InnerError::Lexer(LexerError::UnterminatedString(_)) => {
                Some("Close the string literal with the quote it was opened with.".to_string())
            }
            InnerError::Parse(ParseError::UnexpectedToken(_)) => {
                Some("Check for syntax errors or misplaced tokens.".to_string())
            }
            InnerError::Parse(ParseError::UnexpectedEOFDetected(_)) => Some(
                "Input ended unexpectedly. Check for missing operands or closing parentheses."
                    .to_string(),
            ),
            InnerError::Parse(ParseError::ExpectedAttributeName(_)) => {
                Some("Member access is written as `expr.attribute`.".to_string())
            }
            InnerError::Eval(EvalError::NotDefined(_, name)) => {
                Some(format!("'{name}' is not a known function."))
            }
            InnerError::Eval(EvalError::InvalidNumberOfArguments(_, _, expected, actual)) => {
                Some(format!(
                    "Invalid number of arguments: expected {expected}, got {actual}."
                ))
            }
            _ => None,
        };

        msg.map(|m| Box::new(m) as Box<dyn std::fmt::Display>)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = miette::LabeledSpan> + '_>> {
        Some(Box::new(std::iter::once(
            miette::LabeledSpan::new_with_span(Some(format!("{}", self.cause)), self.location),
        )))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&self.source_code)
    }
}
