//! Document store backend contract

use crate::document::query::Query;
use crate::error::{AppError, DocumentError, GenericError};
use crate::listener::ListenerStream;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Document fields
pub type Fields = Map<String, Value>;

/// Event from a document listener: the document (`None` when absent) or a terminal error
pub type DocumentEvent = Result<Option<DocumentSnapshot>, DocumentStoreError>;

/// Event from a query listener: all matching documents or a terminal error
pub type QueryEvent = Result<Vec<DocumentSnapshot>, DocumentStoreError>;

/// A document read from the store
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    /// Document id within its collection
    pub id: String,
    /// Document fields
    pub data: Fields,
}

/// gRPC status codes reported by the document database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentErrorCode {
    /// Operation was cancelled
    Cancelled,
    /// Unknown error
    Unknown,
    /// Client specified an invalid argument
    InvalidArgument,
    /// Deadline expired before the operation completed
    DeadlineExceeded,
    /// Document or collection not found
    NotFound,
    /// Document already exists
    AlreadyExists,
    /// Caller lacks permission
    PermissionDenied,
    /// Quota or rate limit exhausted
    ResourceExhausted,
    /// System not in the state required by the operation
    FailedPrecondition,
    /// Operation aborted, typically a transaction conflict
    Aborted,
    /// Operation attempted past the valid range
    OutOfRange,
    /// Operation not implemented
    Unimplemented,
    /// Internal server error
    Internal,
    /// Service unavailable
    Unavailable,
    /// Unrecoverable data loss
    DataLoss,
    /// Request lacks valid credentials
    Unauthenticated,
}

impl DocumentErrorCode {
    /// Convert a gRPC status code; unknown values map to [`DocumentErrorCode::Unknown`]
    pub fn from_grpc_code(code: i32) -> Self {
        match code {
            1 => Self::Cancelled,
            3 => Self::InvalidArgument,
            4 => Self::DeadlineExceeded,
            5 => Self::NotFound,
            6 => Self::AlreadyExists,
            7 => Self::PermissionDenied,
            8 => Self::ResourceExhausted,
            9 => Self::FailedPrecondition,
            10 => Self::Aborted,
            11 => Self::OutOfRange,
            12 => Self::Unimplemented,
            13 => Self::Internal,
            14 => Self::Unavailable,
            15 => Self::DataLoss,
            16 => Self::Unauthenticated,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for DocumentErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Failure reported by a [`DocumentStore`]
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DocumentStoreError {
    /// Server returned a status code
    #[error("{code}: {message}")]
    Status {
        /// Status code
        code: DocumentErrorCode,
        /// Detail message
        message: String,
    },

    /// Transport-level I/O failure
    #[error("I/O error: {0}")]
    Io(String),

    /// Document data could not be converted to or from the caller's type
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Anything else
    #[error("Unexpected error: {0}")]
    Other(String),
}

impl DocumentStoreError {
    /// Error with a status code
    pub fn status(code: DocumentErrorCode, message: impl Into<String>) -> Self {
        Self::Status {
            code,
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for DocumentStoreError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<DocumentStoreError> for AppError {
    fn from(error: DocumentStoreError) -> Self {
        match error {
            DocumentStoreError::Status { code, .. } => match code {
                DocumentErrorCode::PermissionDenied => DocumentError::PermissionDenied.into(),
                DocumentErrorCode::NotFound => DocumentError::DocumentNotFound.into(),
                DocumentErrorCode::Aborted => DocumentError::Aborted.into(),
                DocumentErrorCode::Unavailable => GenericError::NetworkError.into(),
                _ => DocumentError::TransactionFailed.into(),
            },
            DocumentStoreError::Io(_) => GenericError::NetworkError.into(),
            DocumentStoreError::Serialization(_) | DocumentStoreError::Other(_) => {
                GenericError::UnknownError.into()
            }
        }
    }
}

/// Collection/document database with filtered queries and change listeners
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Locally generated document id
    fn generate_id(&self) -> String;

    /// Create or overwrite a document
    async fn set(&self, collection: &str, id: &str, data: Fields) -> Result<(), DocumentStoreError>;

    /// Read a document; `None` if absent
    async fn get(&self, collection: &str, id: &str)
        -> Result<Option<DocumentSnapshot>, DocumentStoreError>;

    /// Merge `fields` into an existing document; dotted keys address nested maps.
    /// Fails with [`DocumentErrorCode::NotFound`] if the document does not exist.
    async fn update(&self, collection: &str, id: &str, fields: Fields)
        -> Result<(), DocumentStoreError>;

    /// Delete a document; deleting a missing document succeeds
    async fn delete(&self, collection: &str, id: &str) -> Result<(), DocumentStoreError>;

    /// Documents matching `query`, ordered by id
    async fn run_query(&self, query: &Query) -> Result<Vec<DocumentSnapshot>, DocumentStoreError>;

    /// Watch one document: current state first, then every change
    fn listen_document(&self, collection: &str, id: &str) -> ListenerStream<DocumentEvent>;

    /// Watch a query's result set: current results first, then every change
    fn listen_query(&self, query: &Query) -> ListenerStream<QueryEvent>;
}
