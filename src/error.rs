use thiserror::Error;

/// Errors raised by the query pipeline.
///
/// None of these are downgraded to an empty result inside the pipeline; the
/// caller decides how to present them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("Malformed tree at token '{id}': {reason}")]
    MalformedTree { id: String, reason: String },

    #[error("Unknown category '{0}'")]
    UnknownCategory(String),

    #[error("Tree too large: {measure} {actual} exceeds limit {limit}")]
    OversizeTree {
        measure: &'static str,
        actual: usize,
        limit: usize,
    },

    #[error("Unknown destination repository '{0}'")]
    UnknownDestination(String),

    #[error("Cannot encode {context}: {reason}")]
    EncodingError { context: String, reason: String },
}

impl QueryError {
    pub(crate) fn malformed(id: &str, reason: impl Into<String>) -> Self {
        QueryError::MalformedTree {
            id: id.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn encoding(context: impl Into<String>, reason: impl Into<String>) -> Self {
        QueryError::EncodingError {
            context: context.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, QueryError>;
