//! Error taxonomy and result envelope
//!
//! Every repository operation returns [`DataResult`]. Backend failures never cross the
//! repository boundary as-is: each backend error type converts into exactly one
//! [`AppError`] through its `From` impl, which is the classification table for that backend.
//!
//! # Design
//! Uses thiserror for ergonomic error definitions. The taxonomy is closed: callers can match
//! exhaustively on [`AppError`] and its per-subsystem enums.

use std::fmt::Display;
use thiserror::Error;

/// Outcome of every repository operation: exactly one of a payload or a classified error.
pub type DataResult<T> = Result<T, AppError>;

/// Top-level error taxonomy
///
/// Wraps the per-subsystem categories into a single closed type.
///
/// # Example
/// ```
/// use firebase_facade::{AppError, AuthError};
///
/// let err: AppError = AuthError::EmailInUse.into();
/// assert!(matches!(err, AppError::Auth(AuthError::EmailInUse)));
/// ```
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppError {
    /// Failures that can happen in any operation
    #[error("{0}")]
    Generic(#[from] GenericError),

    /// Identity provider failures
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Realtime record store failures
    #[error("Record store error: {0}")]
    RecordStore(#[from] RecordError),

    /// Document store failures
    #[error("Document store error: {0}")]
    DocumentStore(#[from] DocumentError),
}

/// Errors not tied to a particular backend
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenericError {
    /// Transport-level failure (no connectivity, socket errors)
    #[error("Network error")]
    NetworkError,

    /// Anything the classification tables do not recognize
    #[error("Unknown error")]
    UnknownError,
}

/// Identity provider failure categories
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthError {
    /// An account already exists for this email (or the credential is linked elsewhere)
    #[error("Email already in use")]
    EmailInUse,

    /// Password rejected by the provider's strength policy
    #[error("Weak password")]
    WeakPassword,

    /// Email/password or credential is malformed or wrong
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Account does not exist or is disabled
    #[error("User not found")]
    UserNotFound,

    /// Action link or code is invalid or expired
    #[error("Invalid action code")]
    ActionCodeInvalid,

    /// Provider failed to send an email
    #[error("Email could not be sent")]
    EmailSendFailed,

    /// Sensitive operation needs a fresh sign-in
    #[error("This operation requires recent authentication")]
    RequiresRecentLogin,

    /// Sign-in needs a second factor
    #[error("Multi-factor authentication required")]
    MultiFactorRequired,

    /// reCAPTCHA verification could not be presented
    #[error("reCAPTCHA verification unavailable")]
    RecaptchaMissing,

    /// Web-based sign-in flow failed
    #[error("Web operation failed")]
    WebOperationFailed,

    /// Provider rejected the request for a reason with no dedicated category
    #[error("Authentication error")]
    GenericAuthError,
}

/// Realtime record store failure categories
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordError {
    /// Security rules rejected the read or write
    #[error("Permission denied")]
    PermissionDenied,

    /// Local data is out of sync with the server
    #[error("Data stale")]
    DataStale,

    /// Operation failed, or the watched node is missing
    #[error("Operation failed")]
    OperationFailed,

    /// Connection dropped while the operation was pending
    #[error("Disconnected")]
    Disconnected,

    /// Auth token expired
    #[error("Token expired")]
    TokenExpired,

    /// Auth token invalid
    #[error("Token invalid")]
    TokenInvalid,

    /// Transaction retried too many times
    #[error("Max retries exceeded")]
    MaxRetriesExceeded,

    /// A concurrent set overwrote this write
    #[error("Overridden by a concurrent write")]
    OverriddenByConcurrentWrite,

    /// Service temporarily unavailable
    #[error("Unavailable")]
    Unavailable,

    /// Write canceled by the client
    #[error("Write canceled")]
    WriteCanceled,
}

/// Document store failure categories
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentError {
    /// Security rules rejected the operation
    #[error("Permission denied")]
    PermissionDenied,

    /// Target document does not exist (e.g. update of a missing document)
    #[error("Document not found")]
    DocumentNotFound,

    /// Write conflicted or failed server-side
    #[error("Transaction failed")]
    TransactionFailed,

    /// Operation aborted
    #[error("Aborted")]
    Aborted,
}

impl AppError {
    /// Stable, machine-readable code for this error (e.g. `"auth/email-in-use"`)
    pub fn code(&self) -> &'static str {
        match self {
            Self::Generic(GenericError::NetworkError) => "generic/network-error",
            Self::Generic(GenericError::UnknownError) => "generic/unknown-error",
            Self::Auth(e) => match e {
                AuthError::EmailInUse => "auth/email-in-use",
                AuthError::WeakPassword => "auth/weak-password",
                AuthError::InvalidCredentials => "auth/invalid-credentials",
                AuthError::UserNotFound => "auth/user-not-found",
                AuthError::ActionCodeInvalid => "auth/action-code-invalid",
                AuthError::EmailSendFailed => "auth/email-send-failed",
                AuthError::RequiresRecentLogin => "auth/requires-recent-login",
                AuthError::MultiFactorRequired => "auth/multi-factor-required",
                AuthError::RecaptchaMissing => "auth/recaptcha-missing",
                AuthError::WebOperationFailed => "auth/web-operation-failed",
                AuthError::GenericAuthError => "auth/generic",
            },
            Self::RecordStore(e) => match e {
                RecordError::PermissionDenied => "record/permission-denied",
                RecordError::DataStale => "record/data-stale",
                RecordError::OperationFailed => "record/operation-failed",
                RecordError::Disconnected => "record/disconnected",
                RecordError::TokenExpired => "record/token-expired",
                RecordError::TokenInvalid => "record/token-invalid",
                RecordError::MaxRetriesExceeded => "record/max-retries",
                RecordError::OverriddenByConcurrentWrite => "record/overridden-by-set",
                RecordError::Unavailable => "record/unavailable",
                RecordError::WriteCanceled => "record/write-canceled",
            },
            Self::DocumentStore(e) => match e {
                DocumentError::PermissionDenied => "document/permission-denied",
                DocumentError::DocumentNotFound => "document/not-found",
                DocumentError::TransactionFailed => "document/transaction-failed",
                DocumentError::Aborted => "document/aborted",
            },
        }
    }

    /// Check if the caller may reasonably retry the same operation later
    ///
    /// Repositories never retry on their own; this only informs the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Generic(GenericError::NetworkError)
                | Self::RecordStore(RecordError::Disconnected)
                | Self::RecordStore(RecordError::Unavailable)
                | Self::RecordStore(RecordError::DataStale)
                | Self::RecordStore(RecordError::MaxRetriesExceeded)
                | Self::RecordStore(RecordError::OverriddenByConcurrentWrite)
                | Self::DocumentStore(DocumentError::Aborted)
                | Self::DocumentStore(DocumentError::TransactionFailed)
        )
    }

    /// Check if error indicates the user must sign in (again) before retrying
    pub fn requires_auth(&self) -> bool {
        matches!(
            self,
            Self::Auth(AuthError::RequiresRecentLogin)
                | Self::RecordStore(RecordError::TokenExpired)
                | Self::RecordStore(RecordError::TokenInvalid)
        )
    }
}

/// Classify a backend error at the repository boundary and log it.
///
/// `operation` names the repository call for the log line.
pub(crate) fn classify<E>(operation: &'static str, error: E) -> AppError
where
    E: Into<AppError> + Display,
{
    let message = error.to_string();
    let app_error = error.into();
    tracing::warn!(
        operation,
        code = app_error.code(),
        error = %message,
        "repository operation failed"
    );
    app_error
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_error_into_app_error() {
        let err: AppError = AuthError::WeakPassword.into();
        assert!(matches!(err, AppError::Auth(AuthError::WeakPassword)));
    }

    #[test]
    fn test_record_error_into_app_error() {
        let err: AppError = RecordError::Unavailable.into();
        assert!(matches!(err, AppError::RecordStore(RecordError::Unavailable)));
    }

    #[test]
    fn test_is_retryable() {
        assert!(AppError::from(GenericError::NetworkError).is_retryable());
        assert!(AppError::from(RecordError::Unavailable).is_retryable());
        assert!(!AppError::from(AuthError::EmailInUse).is_retryable());
        assert!(!AppError::from(DocumentError::PermissionDenied).is_retryable());
    }

    #[test]
    fn test_requires_auth() {
        assert!(AppError::from(AuthError::RequiresRecentLogin).requires_auth());
        assert!(AppError::from(RecordError::TokenExpired).requires_auth());
        assert!(!AppError::from(GenericError::UnknownError).requires_auth());
    }

    #[test]
    fn test_codes_are_unique() {
        use std::collections::HashSet;

        let all = crate::messages::ALL_ERRORS;
        let codes: HashSet<_> = all.iter().map(AppError::code).collect();
        assert_eq!(codes.len(), all.len());
    }

    #[test]
    fn test_error_display() {
        let display = AppError::from(AuthError::EmailInUse).to_string();
        assert!(display.contains("Auth error"));
        assert!(display.contains("Email already in use"));
    }
}
