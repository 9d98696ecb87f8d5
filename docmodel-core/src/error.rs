//! Error types and result types for model declaration, validation and persistence.
//!
//! Every fallible operation in this crate returns [`ModelResult<T>`]. Errors raised by
//! validation are produced before any backend call is made; errors raised by a backend
//! are passed through as [`ModelError::Backend`] without translation.

use std::{error::Error as StdError, fmt};

use bson::error::Error as BsonError;
use thiserror::Error;

/// The check that rejected a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationKind {
    /// A required field has no value (absent, null, or empty where emptiness counts).
    Required,
    /// The value has the wrong BSON type for the field.
    Type,
    /// A string value is longer than the configured `size`.
    Size,
    /// A list element does not match the configured `item_type`.
    ItemType,
}

/// A value failed one of its field's checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Name of the offending field.
    pub field: String,
    /// Which check failed.
    pub kind: ValidationKind,
    /// Human readable reason.
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, kind: ValidationKind, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Field {} {}", self.field, self.reason)
    }
}

impl StdError for ValidationError {}

/// Represents all possible errors that can occur when declaring, validating or persisting models.
#[derive(Error, Debug)]
pub enum ModelError {
    /// A field or schema was declared with options outside its constraint set.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// A value failed a field's required, type or shape check.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
    /// A declared or transient attribute was read before it was ever assigned.
    #[error("Attribute {0} has no value")]
    AttributeMissing(String),
    /// `save` found no declared field value to persist.
    #[error("No value provided")]
    NoData,
    /// A batch operation received something other than a sequence of documents.
    #[error("Expected an iterable of documents: {0}")]
    NotIterable(String),
    /// No connection has been established for this process.
    #[error("Not connected to a document store")]
    NotConnected,
    /// Error during store initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// Serialization/deserialization error when converting between document formats.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// A write would break a unique index.
    #[error("Duplicate value for unique field {field} in collection {collection}")]
    DuplicateKey { collection: String, field: String },
    /// An error raised by the underlying store driver, kept intact.
    #[error("Backend error: {0}")]
    Backend(#[source] Box<dyn StdError + Send + Sync>),
}

impl ModelError {
    /// Wraps a driver error without translating it.
    pub fn backend<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        ModelError::Backend(Box::new(err))
    }

    /// Returns the validation failure carried by this error, if any.
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            ModelError::Validation(err) => Some(err),
            _ => None,
        }
    }
}

/// A specialized `Result` type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

impl From<BsonError> for ModelError {
    fn from(err: BsonError) -> Self {
        ModelError::Serialization(err.to_string())
    }
}
