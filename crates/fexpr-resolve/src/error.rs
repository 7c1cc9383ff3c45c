use miette::Diagnostic;

/// A problem reported alongside an evaluation result.
#[allow(clippy::large_enum_variant)]
#[derive(Debug, Clone, PartialEq, thiserror::Error, Diagnostic)]
pub enum Error {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Expression(#[from] fexpr_lang::Error),
    #[error("Evaluation did not settle within {rounds} rounds")]
    #[diagnostic(
        code(ResolveError::RoundLimitExceeded),
        help("The expression keeps discovering new dependencies. Raise `max_rounds` or check for lookups whose key changes every round.")
    )]
    RoundLimitExceeded { rounds: usize },
}
