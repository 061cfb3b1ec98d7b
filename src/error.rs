use thiserror::Error;

use crate::parser::Rule;

pub type Result<T, E = PqlError> = std::result::Result<T, E>;

/// Errors produced while turning query text into a [`crate::ast::Query`].
///
/// Every variant aborts the parse. `BooleanSemantic` is only ever produced once
/// the selection is known to be `BOOLEAN`, so callers can answer `FALSE`
/// instead of reporting a failure.
#[derive(Debug, Error, Clone, PartialEq, Eq, Hash)]
pub enum PqlError {
    /// The input does not have the shape expected at the current position.
    #[error("syntax error: {0}")]
    Syntax(String),
    /// The input is well formed but breaks a declaration or typing rule.
    #[error("semantic error: {0}")]
    Semantic(String),
    /// A semantic error in a query that selects `BOOLEAN`.
    #[error("semantic error: {0}")]
    BooleanSemantic(String),
}

impl PqlError {
    pub fn syntax(message: impl Into<String>) -> Self {
        Self::Syntax(message.into())
    }

    pub fn semantic(message: impl Into<String>) -> Self {
        Self::Semantic(message.into())
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Syntax(message) | Self::Semantic(message) | Self::BooleanSemantic(message) => {
                message
            }
        }
    }

    pub fn is_syntax(&self) -> bool {
        matches!(self, Self::Syntax(_))
    }

    /// True for both plain and boolean semantic errors.
    pub fn is_semantic(&self) -> bool {
        matches!(self, Self::Semantic(_) | Self::BooleanSemantic(_))
    }

    pub fn is_boolean_semantic(&self) -> bool {
        matches!(self, Self::BooleanSemantic(_))
    }

    /// Re-tags a plain semantic error as a boolean one. Other kinds pass through.
    pub(crate) fn into_boolean(self) -> Self {
        match self {
            Self::Semantic(message) => Self::BooleanSemantic(message),
            other => other,
        }
    }
}

impl From<pest::error::Error<Rule>> for PqlError {
    fn from(err: pest::error::Error<Rule>) -> Self {
        Self::Syntax(err.to_string())
    }
}
