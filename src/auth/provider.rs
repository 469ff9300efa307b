//! Identity provider seam
//!
//! [`IdentityProvider`] is the account backend consumed by the session repository.
//! [`IdentityProviderError`] carries the provider's own failure categories; its `From`
//! impl into [`AppError`] is the identity classification table.

use crate::auth::types::{Credential, ProfileUpdate, SignInResult, User};
use crate::error::{AppError, AuthError, GenericError};
use async_trait::async_trait;
use thiserror::Error;

/// Failures reported by an identity provider
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityProviderError {
    /// Email or federated credential already belongs to an account
    #[error("Account collision: {0}")]
    UserCollision(String),

    /// Password rejected by the strength policy
    #[error("Weak password: {0}")]
    WeakPassword(String),

    /// Malformed or wrong credentials
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Account missing or disabled
    #[error("Invalid user: {0}")]
    InvalidUser(String),

    /// Out-of-band action code invalid or expired
    #[error("Invalid action code: {0}")]
    ActionCode(String),

    /// Email could not be sent
    #[error("Email failure: {0}")]
    Email(String),

    /// Operation needs a fresh sign-in
    #[error("Recent login required")]
    RecentLoginRequired,

    /// Sign-in needs a second factor
    #[error("Multi-factor authentication required")]
    MultiFactorRequired,

    /// reCAPTCHA token missing or rejected
    #[error("reCAPTCHA verification missing")]
    MissingRecaptcha,

    /// Browser-based flow failed
    #[error("Web operation failed: {0}")]
    Web(String),

    /// Operation needs a signed-in user and there is none
    #[error("No user is signed in")]
    NoCurrentUser,

    /// Provider rejected the request with a code that has no dedicated variant
    #[error("Request rejected: {code}")]
    Rejected {
        /// Provider error code, e.g. "OPERATION_NOT_ALLOWED"
        code: String,
    },

    /// Transport failure
    #[error("Network error: {0}")]
    Network(String),

    /// Client-side failure (bad response, missing configuration)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IdentityProviderError {
    /// Create from an Identity Toolkit REST API error message
    ///
    /// Messages may carry a detail suffix (`"WEAK_PASSWORD : Password should be at least 6
    /// characters"`); only the code before `" : "` is matched.
    pub fn from_error_code(message: &str) -> Self {
        let code = message.split(" : ").next().unwrap_or(message).trim();
        let detail = || message.to_string();
        match code {
            "EMAIL_EXISTS" | "CREDENTIAL_ALREADY_IN_USE" | "FEDERATED_USER_ID_ALREADY_LINKED" => {
                Self::UserCollision(detail())
            }
            "WEAK_PASSWORD" => Self::WeakPassword(detail()),
            "INVALID_PASSWORD"
            | "INVALID_LOGIN_CREDENTIALS"
            | "INVALID_EMAIL"
            | "INVALID_IDP_RESPONSE"
            | "INVALID_CUSTOM_TOKEN"
            | "MISSING_PASSWORD"
            | "MISSING_EMAIL" => Self::InvalidCredentials(detail()),
            "EMAIL_NOT_FOUND" | "USER_NOT_FOUND" | "USER_DISABLED" | "USER_MISMATCH" => {
                Self::InvalidUser(detail())
            }
            "INVALID_OOB_CODE" | "EXPIRED_OOB_CODE" => Self::ActionCode(detail()),
            "INVALID_RECIPIENT_EMAIL" | "INVALID_SENDER" | "INVALID_MESSAGE_PAYLOAD" => {
                Self::Email(detail())
            }
            "CREDENTIAL_TOO_OLD_LOGIN_AGAIN" | "TOKEN_EXPIRED" | "INVALID_ID_TOKEN" => {
                Self::RecentLoginRequired
            }
            "CAPTCHA_CHECK_FAILED" | "MISSING_RECAPTCHA_TOKEN" | "INVALID_RECAPTCHA_TOKEN" => {
                Self::MissingRecaptcha
            }
            "INVALID_CONTINUE_URI" | "UNAUTHORIZED_DOMAIN" | "MISSING_CONTINUE_URI" => {
                Self::Web(detail())
            }
            other => Self::Rejected {
                code: other.to_string(),
            },
        }
    }
}

impl From<reqwest::Error> for IdentityProviderError {
    fn from(error: reqwest::Error) -> Self {
        // A body we cannot parse is our problem, not the network's
        if error.is_decode() {
            return Self::Internal(format!("Failed to parse response: {}", error));
        }
        Self::Network(error.to_string())
    }
}

impl From<IdentityProviderError> for AppError {
    fn from(error: IdentityProviderError) -> Self {
        match error {
            IdentityProviderError::UserCollision(_) => AuthError::EmailInUse.into(),
            IdentityProviderError::WeakPassword(_) => AuthError::WeakPassword.into(),
            IdentityProviderError::InvalidCredentials(_) => AuthError::InvalidCredentials.into(),
            IdentityProviderError::InvalidUser(_) | IdentityProviderError::NoCurrentUser => {
                AuthError::UserNotFound.into()
            }
            IdentityProviderError::ActionCode(_) => AuthError::ActionCodeInvalid.into(),
            IdentityProviderError::Email(_) => AuthError::EmailSendFailed.into(),
            IdentityProviderError::RecentLoginRequired => AuthError::RequiresRecentLogin.into(),
            IdentityProviderError::MultiFactorRequired => AuthError::MultiFactorRequired.into(),
            IdentityProviderError::MissingRecaptcha => AuthError::RecaptchaMissing.into(),
            IdentityProviderError::Web(_) => AuthError::WebOperationFailed.into(),
            IdentityProviderError::Rejected { .. } => AuthError::GenericAuthError.into(),
            IdentityProviderError::Network(_) => GenericError::NetworkError.into(),
            IdentityProviderError::Internal(_) => GenericError::UnknownError.into(),
        }
    }
}

/// Account backend
///
/// Implementations keep their own notion of the current user; every operation except the
/// sign-in family acts on it and fails with [`IdentityProviderError::NoCurrentUser`]
/// when nobody is signed in.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create an email/password account and sign it in
    async fn create_user_with_email_and_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<SignInResult, IdentityProviderError>;

    /// Sign in with email and password
    async fn sign_in_with_email_and_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<SignInResult, IdentityProviderError>;

    /// Sign in with any credential
    async fn sign_in_with_credential(
        &self,
        credential: &Credential,
    ) -> Result<SignInResult, IdentityProviderError>;

    /// Create and sign in an anonymous account
    async fn sign_in_anonymously(&self) -> Result<SignInResult, IdentityProviderError>;

    /// Currently signed-in account
    async fn current_user(&self) -> Option<User>;

    /// Forget the current user
    ///
    /// The local session ends even when this returns an error; an error only reports that
    /// revoking the session remotely failed.
    async fn sign_out(&self) -> Result<(), IdentityProviderError>;

    /// Send a verification email to the current user's address
    async fn send_email_verification(&self) -> Result<(), IdentityProviderError>;

    /// Send a password reset email
    async fn send_password_reset_email(&self, email: &str) -> Result<(), IdentityProviderError>;

    /// Change display name and/or photo URL of the current user
    async fn update_profile(&self, update: &ProfileUpdate) -> Result<(), IdentityProviderError>;

    /// Send a verification link to `new_email`; the address changes once it is followed
    async fn update_email(&self, new_email: &str) -> Result<(), IdentityProviderError>;

    /// Change the current user's password
    async fn update_password(&self, new_password: &str) -> Result<(), IdentityProviderError>;

    /// Delete the current user's account and sign out
    async fn delete_user(&self) -> Result<(), IdentityProviderError>;

    /// Prove the current user's identity again, refreshing the recent-login window
    async fn reauthenticate(&self, credential: &Credential) -> Result<(), IdentityProviderError>;

    /// Attach another provider to the current account
    async fn link_with_credential(
        &self,
        credential: &Credential,
    ) -> Result<(), IdentityProviderError>;

    /// Detach a provider from the current account
    async fn unlink(&self, provider_id: &str) -> Result<(), IdentityProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_error_code_strips_detail() {
        let err = IdentityProviderError::from_error_code(
            "WEAK_PASSWORD : Password should be at least 6 characters",
        );
        assert!(matches!(err, IdentityProviderError::WeakPassword(_)));
    }

    #[test]
    fn test_from_error_code_table() {
        let cases = [
            ("EMAIL_EXISTS", AppError::Auth(AuthError::EmailInUse)),
            ("INVALID_LOGIN_CREDENTIALS", AppError::Auth(AuthError::InvalidCredentials)),
            ("INVALID_EMAIL", AppError::Auth(AuthError::InvalidCredentials)),
            ("EMAIL_NOT_FOUND", AppError::Auth(AuthError::UserNotFound)),
            ("USER_DISABLED", AppError::Auth(AuthError::UserNotFound)),
            ("EXPIRED_OOB_CODE", AppError::Auth(AuthError::ActionCodeInvalid)),
            ("CREDENTIAL_TOO_OLD_LOGIN_AGAIN", AppError::Auth(AuthError::RequiresRecentLogin)),
            ("MISSING_RECAPTCHA_TOKEN", AppError::Auth(AuthError::RecaptchaMissing)),
            ("INVALID_RECIPIENT_EMAIL", AppError::Auth(AuthError::EmailSendFailed)),
            ("UNAUTHORIZED_DOMAIN", AppError::Auth(AuthError::WebOperationFailed)),
            ("OPERATION_NOT_ALLOWED", AppError::Auth(AuthError::GenericAuthError)),
        ];
        for (code, expected) in cases {
            let classified: AppError = IdentityProviderError::from_error_code(code).into();
            assert_eq!(classified, expected, "code {}", code);
        }
    }

    #[test]
    fn test_unknown_code_is_rejected() {
        let err = IdentityProviderError::from_error_code("TOO_MANY_ATTEMPTS_TRY_LATER");
        assert_eq!(
            err,
            IdentityProviderError::Rejected {
                code: "TOO_MANY_ATTEMPTS_TRY_LATER".to_string()
            }
        );
    }

    #[test]
    fn test_transport_and_internal_classification() {
        let network: AppError = IdentityProviderError::Network("reset".to_string()).into();
        assert_eq!(network, AppError::Generic(GenericError::NetworkError));

        let internal: AppError = IdentityProviderError::Internal("bad json".to_string()).into();
        assert_eq!(internal, AppError::Generic(GenericError::UnknownError));

        let no_user: AppError = IdentityProviderError::NoCurrentUser.into();
        assert_eq!(no_user, AppError::Auth(AuthError::UserNotFound));
    }
}
