//! User-facing error messages
//!
//! Every [`AppError`] maps to one fixed, pre-written message. The mapping lives behind the
//! [`ErrorMessages`] trait so the UI layer can swap the table (locale, tone) without
//! touching repositories.

use crate::error::{AppError, AuthError, DocumentError, GenericError, RecordError};
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Every member of the closed taxonomy, in declaration order.
pub const ALL_ERRORS: [AppError; 27] = [
    AppError::Generic(GenericError::NetworkError),
    AppError::Generic(GenericError::UnknownError),
    AppError::Auth(AuthError::EmailInUse),
    AppError::Auth(AuthError::WeakPassword),
    AppError::Auth(AuthError::InvalidCredentials),
    AppError::Auth(AuthError::UserNotFound),
    AppError::Auth(AuthError::ActionCodeInvalid),
    AppError::Auth(AuthError::EmailSendFailed),
    AppError::Auth(AuthError::RequiresRecentLogin),
    AppError::Auth(AuthError::MultiFactorRequired),
    AppError::Auth(AuthError::RecaptchaMissing),
    AppError::Auth(AuthError::WebOperationFailed),
    AppError::Auth(AuthError::GenericAuthError),
    AppError::RecordStore(RecordError::PermissionDenied),
    AppError::RecordStore(RecordError::DataStale),
    AppError::RecordStore(RecordError::OperationFailed),
    AppError::RecordStore(RecordError::Disconnected),
    AppError::RecordStore(RecordError::TokenExpired),
    AppError::RecordStore(RecordError::TokenInvalid),
    AppError::RecordStore(RecordError::MaxRetriesExceeded),
    AppError::RecordStore(RecordError::OverriddenByConcurrentWrite),
    AppError::RecordStore(RecordError::Unavailable),
    AppError::RecordStore(RecordError::WriteCanceled),
    AppError::DocumentStore(DocumentError::PermissionDenied),
    AppError::DocumentStore(DocumentError::DocumentNotFound),
    AppError::DocumentStore(DocumentError::TransactionFailed),
    AppError::DocumentStore(DocumentError::Aborted),
];

/// Translates an [`AppError`] into a message suitable for end users
pub trait ErrorMessages: Send + Sync {
    /// Message for `error`
    fn message(&self, error: &AppError) -> &str;
}

/// Static lookup table implementation of [`ErrorMessages`]
#[derive(Debug, Clone)]
pub struct MessageTable {
    entries: HashMap<AppError, &'static str>,
    fallback: &'static str,
}

impl MessageTable {
    /// Build a table from `(error, message)` pairs.
    ///
    /// Errors missing from `entries` resolve to the message for
    /// `Generic::UnknownError` (or an empty string if that is missing too).
    pub fn new(entries: impl IntoIterator<Item = (AppError, &'static str)>) -> Self {
        let entries: HashMap<_, _> = entries.into_iter().collect();
        let fallback = entries
            .get(&AppError::Generic(GenericError::UnknownError))
            .copied()
            .unwrap_or("");
        Self { entries, fallback }
    }

    /// English messages
    pub fn english() -> Self {
        Self::new(ENGLISH)
    }

    /// Brazilian Portuguese messages
    pub fn portuguese() -> Self {
        Self::new(PORTUGUESE)
    }

    /// Check whether every taxonomy member has a dedicated entry
    pub fn is_complete(&self) -> bool {
        ALL_ERRORS.iter().all(|e| self.entries.contains_key(e))
    }
}

impl Default for MessageTable {
    fn default() -> Self {
        Self::english()
    }
}

impl ErrorMessages for MessageTable {
    fn message(&self, error: &AppError) -> &str {
        self.entries.get(error).copied().unwrap_or(self.fallback)
    }
}

static DEFAULT_MESSAGES: Lazy<MessageTable> = Lazy::new(MessageTable::english);

/// Message for `error` from the default (English) table
pub fn user_message(error: &AppError) -> &'static str {
    DEFAULT_MESSAGES
        .entries
        .get(error)
        .copied()
        .unwrap_or(DEFAULT_MESSAGES.fallback)
}

const ENGLISH: [(AppError, &str); 27] = [
    (AppError::Generic(GenericError::NetworkError), "No internet connection. Check your network and try again."),
    (AppError::Generic(GenericError::UnknownError), "Something unexpected happened. Please try again later."),
    (AppError::Auth(AuthError::EmailInUse), "This email address is already registered."),
    (AppError::Auth(AuthError::WeakPassword), "Your password is too weak. Please choose a stronger one."),
    (AppError::Auth(AuthError::InvalidCredentials), "Invalid email or password."),
    (AppError::Auth(AuthError::UserNotFound), "No user found with this email."),
    (AppError::Auth(AuthError::ActionCodeInvalid), "The verification link is invalid or has expired. Please request a new one."),
    (AppError::Auth(AuthError::EmailSendFailed), "We could not send the email. Please try again later."),
    (AppError::Auth(AuthError::RequiresRecentLogin), "This operation is sensitive and requires signing in again."),
    (AppError::Auth(AuthError::MultiFactorRequired), "This account requires an additional verification step to sign in."),
    (AppError::Auth(AuthError::RecaptchaMissing), "We could not verify the app. Please try again."),
    (AppError::Auth(AuthError::WebOperationFailed), "Authentication through the web service failed."),
    (AppError::Auth(AuthError::GenericAuthError), "An authentication error occurred. Please try again."),
    (AppError::RecordStore(RecordError::PermissionDenied), "You do not have permission to access this data."),
    (AppError::RecordStore(RecordError::DataStale), "The data may be out of date. Try reloading."),
    (AppError::RecordStore(RecordError::OperationFailed), "The database operation failed."),
    (AppError::RecordStore(RecordError::Disconnected), "The operation was cancelled because the connection was lost."),
    (AppError::RecordStore(RecordError::TokenExpired), "Your session has expired. Please sign in again to continue."),
    (AppError::RecordStore(RecordError::TokenInvalid), "Your session is invalid. Please sign in again."),
    (AppError::RecordStore(RecordError::MaxRetriesExceeded), "The operation could not be completed. Check your connection and try again."),
    (AppError::RecordStore(RecordError::OverriddenByConcurrentWrite), "Your changes could not be saved because the data was updated. Try again."),
    (AppError::RecordStore(RecordError::Unavailable), "The service is temporarily unavailable. Try again in a moment."),
    (AppError::RecordStore(RecordError::WriteCanceled), "The write operation was cancelled."),
    (AppError::DocumentStore(DocumentError::PermissionDenied), "You do not have permission to access this document."),
    (AppError::DocumentStore(DocumentError::DocumentNotFound), "The requested document was not found."),
    (AppError::DocumentStore(DocumentError::TransactionFailed), "The operation failed because of a data conflict. Try again."),
    (AppError::DocumentStore(DocumentError::Aborted), "The operation was cancelled."),
];

const PORTUGUESE: [(AppError, &str); 27] = [
    (AppError::Generic(GenericError::NetworkError), "Sem conexão com a internet. Verifique sua rede e tente novamente."),
    (AppError::Generic(GenericError::UnknownError), "Ocorreu um erro inesperado. Por favor, tente novamente mais tarde."),
    (AppError::Auth(AuthError::EmailInUse), "Este endereço de e-mail já está cadastrado."),
    (AppError::Auth(AuthError::WeakPassword), "Sua senha é muito fraca. Por favor, use uma senha mais forte."),
    (AppError::Auth(AuthError::InvalidCredentials), "E-mail ou senha inválidos."),
    (AppError::Auth(AuthError::UserNotFound), "Nenhum usuário encontrado com este e-mail."),
    (AppError::Auth(AuthError::ActionCodeInvalid), "O link de verificação é inválido ou já expirou. Por favor, solicite um novo."),
    (AppError::Auth(AuthError::EmailSendFailed), "Não foi possível enviar o e-mail de verificação. Tente novamente mais tarde."),
    (AppError::Auth(AuthError::RequiresRecentLogin), "Esta operação é sensível e requer uma nova autenticação. Por favor, faça login novamente."),
    (AppError::Auth(AuthError::MultiFactorRequired), "Esta conta requer um passo adicional de verificação para fazer login."),
    (AppError::Auth(AuthError::RecaptchaMissing), "Não foi possível verificar o aplicativo. Tente novamente."),
    (AppError::Auth(AuthError::WebOperationFailed), "A autenticação através do serviço web falhou."),
    (AppError::Auth(AuthError::GenericAuthError), "Ocorreu um erro de autenticação. Por favor, tente novamente."),
    (AppError::RecordStore(RecordError::PermissionDenied), "Você não tem permissão para acessar estes dados."),
    (AppError::RecordStore(RecordError::DataStale), "Os dados podem estar desatualizados. Tente recarregar."),
    (AppError::RecordStore(RecordError::OperationFailed), "A operação no banco de dados falhou."),
    (AppError::RecordStore(RecordError::Disconnected), "A operação foi cancelada por falta de conexão com a internet."),
    (AppError::RecordStore(RecordError::TokenExpired), "Sua sessão expirou. Por favor, faça login novamente para continuar."),
    (AppError::RecordStore(RecordError::TokenInvalid), "Sua sessão é inválida. Por favor, faça login novamente."),
    (AppError::RecordStore(RecordError::MaxRetriesExceeded), "Não foi possível completar a operação. Verifique sua conexão e tente novamente."),
    (AppError::RecordStore(RecordError::OverriddenByConcurrentWrite), "Suas alterações não puderam ser salvas porque os dados foram atualizados. Tente novamente."),
    (AppError::RecordStore(RecordError::Unavailable), "O serviço está temporariamente indisponível. Tente novamente em alguns instantes."),
    (AppError::RecordStore(RecordError::WriteCanceled), "A operação de escrita foi cancelada."),
    (AppError::DocumentStore(DocumentError::PermissionDenied), "Você não tem permissão para acessar este documento."),
    (AppError::DocumentStore(DocumentError::DocumentNotFound), "O documento solicitado não foi encontrado."),
    (AppError::DocumentStore(DocumentError::TransactionFailed), "A operação falhou devido a um conflito de dados. Tente novamente."),
    (AppError::DocumentStore(DocumentError::Aborted), "A operação foi cancelada."),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_are_complete() {
        assert!(MessageTable::english().is_complete());
        assert!(MessageTable::portuguese().is_complete());
    }

    #[test]
    fn test_messages_are_distinct_per_error() {
        use std::collections::HashSet;

        let table = MessageTable::english();
        let distinct: HashSet<_> = ALL_ERRORS.iter().map(|e| table.message(e)).collect();
        assert_eq!(distinct.len(), ALL_ERRORS.len());
    }

    #[test]
    fn test_partial_table_falls_back_to_unknown() {
        let table = MessageTable::new([(
            AppError::Generic(GenericError::UnknownError),
            "oops",
        )]);
        assert!(!table.is_complete());
        assert_eq!(table.message(&AppError::Auth(AuthError::WeakPassword)), "oops");
    }

    #[test]
    fn test_user_message_uses_english() {
        assert_eq!(
            user_message(&AppError::Auth(AuthError::InvalidCredentials)),
            "Invalid email or password."
        );
    }

    #[test]
    fn test_portuguese_lookup() {
        let table = MessageTable::portuguese();
        assert_eq!(
            table.message(&AppError::DocumentStore(DocumentError::Aborted)),
            "A operação foi cancelada."
        );
    }
}
