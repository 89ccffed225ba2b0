//! Error types and result types for model and document store operations.
//!
//! Every fallible operation in this crate returns [`DocumentStoreResult<T>`]. Declaration-time
//! problems surface as [`DocumentStoreError::Configuration`] before any backend call is made,
//! value problems surface as [`DocumentStoreError::ValueType`] or
//! [`DocumentStoreError::RequiredValue`] before the write they belong to is issued, and backend
//! transport failures are passed through untouched as [`DocumentStoreError::Backend`].

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when declaring models or talking to a store.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// Invalid model declaration, field option, manager access or unbound path precondition.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// A value does not match the native kind a field requires.
    ///
    /// The first argument is the field kind, the second the required type, the third the
    /// type that was actually supplied.
    #[error("{0} required value type {1}, got {2}")]
    ValueType(String, String, String),
    /// A required field has neither a value nor a default.
    #[error("Field {0} required value")]
    RequiredValue(String),
    /// The requested document does not exist.
    /// The first argument describes the lookup, the second is the collection path.
    #[error("Document not found {0} in collection {1}")]
    DocumentNotFound(String, String),
    /// A single-result lookup matched more than one document.
    /// The first argument is the number of matches, the second is the collection path.
    #[error("Multiple objects returned ({0}) from collection {1}")]
    MultipleResults(usize, String),
    /// A reference field points at a document that no longer exists.
    #[error("Referenced document does not exist: {0}")]
    DanglingReference(String),
    /// Reference resolution revisited a document already on the resolution chain,
    /// or exceeded the configured depth.
    #[error("Reference cycle detected at {0}")]
    ReferenceCycle(String),
    /// Stored data could not be converted back into its native representation.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// Serialization/deserialization error when converting between document formats.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during store initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A specialized `Result` type for document store operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl DocumentStoreError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        DocumentStoreError::Configuration(message.into())
    }

    /// Returns `true` for the "does not exist" family so callers can branch without matching.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DocumentStoreError::DocumentNotFound(..))
    }
}

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}
