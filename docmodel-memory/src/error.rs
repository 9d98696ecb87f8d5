use thiserror::Error;

use docmodel_core::error::ModelError;

/// Errors raised by the in-memory store for filters and updates it cannot execute.
///
/// They reach callers boxed inside [`ModelError::Backend`], the same way a driver error
/// would.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryStoreError {
    #[error("unknown operator {0}")]
    UnknownOperator(String),
    #[error("invalid operand for {operator}: {reason}")]
    InvalidOperand { operator: String, reason: String },
    #[error("update document must contain only update operators")]
    ReplacementUpdate,
    #[error("update document is empty")]
    EmptyUpdate,
    #[error("the _id field cannot be changed")]
    ImmutableId,
}

impl MemoryStoreError {
    pub(crate) fn operand(operator: &str, reason: impl Into<String>) -> Self {
        Self::InvalidOperand {
            operator: operator.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<MemoryStoreError> for ModelError {
    fn from(err: MemoryStoreError) -> Self {
        ModelError::backend(err)
    }
}
