//! Error type for the search compiler.

use thiserror::Error;

/// Errors produced while parsing, resolving or compiling a search query.
///
/// Every failure is caused by caller input, so there is a single kind whose
/// message is meant to be shown to the user verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    /// The query text, a requested field or a parameter could not be compiled.
    #[error("{0}")]
    InvalidSearchQuery(String),
}

impl SearchError {
    /// Creates an `InvalidSearchQuery` error with the given message.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidSearchQuery(message.into())
    }

    /// Returns the user-facing message.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::InvalidSearchQuery(message) => message,
        }
    }
}

/// Result alias used throughout the search module.
pub type Result<T, E = SearchError> = std::result::Result<T, E>;
