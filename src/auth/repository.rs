//! Session repository
//!
//! Account lifecycle on top of an [`IdentityProvider`]. Tracks a [`SessionState`] and
//! broadcasts every transition to [`SessionRepository::auth_state_changes`] subscribers.

use crate::auth::provider::{IdentityProvider, IdentityProviderError};
use crate::auth::types::{
    Credential, LoginRequest, ProfileUpdate, RegisterRequest, RegisterResponse, Session,
    SessionState, SignInResult, User,
};
use crate::error::{classify, DataResult};
use async_stream::stream;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, RwLock};

/// Identity operations with classified errors and a tracked session
///
/// Cloning shares the session.
#[derive(Clone)]
pub struct SessionRepository {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    provider: Arc<dyn IdentityProvider>,
    state: RwLock<SessionState>,
    state_tx: broadcast::Sender<SessionState>,
}

impl SessionRepository {
    /// Repository over `provider`, starting [`SessionState::Unauthenticated`]
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        // Broadcast channel for session transitions (capacity: 16)
        let (state_tx, _) = broadcast::channel(16);
        Self {
            inner: Arc::new(SessionInner {
                provider,
                state: RwLock::new(SessionState::Unauthenticated),
                state_tx,
            }),
        }
    }

    /// Current session state
    pub async fn session_state(&self) -> SessionState {
        self.inner.state.read().await.clone()
    }

    async fn set_state(&self, state: SessionState) {
        let mut current = self.inner.state.write().await;
        *current = state.clone();

        // Broadcast state change (ignore error if no listeners)
        let _ = self.inner.state_tx.send(state);
    }

    /// Subscribe to session transitions
    ///
    /// The stream yields the current state first, then every later transition.
    ///
    /// # Example
    /// ```no_run
    /// use firebase_facade::{Facade, InMemoryBackends, SessionState};
    /// use futures::StreamExt;
    ///
    /// # async fn example() {
    /// let facade = Facade::new(InMemoryBackends::new().backends(), Default::default());
    /// let mut states = facade.auth().auth_state_changes().await;
    /// while let Some(state) = states.next().await {
    ///     match state {
    ///         SessionState::Authenticated { uid, .. } => println!("signed in: {}", uid),
    ///         SessionState::SignedOut => println!("signed out"),
    ///         _ => {}
    ///     }
    /// }
    /// # }
    /// ```
    pub async fn auth_state_changes(&self) -> Pin<Box<dyn Stream<Item = SessionState> + Send>> {
        // Subscribe before reading so no transition falls in between
        let mut rx = self.inner.state_tx.subscribe();
        let initial = self.session_state().await;

        Box::pin(stream! {
            // Yield initial state first
            yield initial;

            loop {
                match rx.recv().await {
                    Ok(state) => yield state,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "auth state subscriber lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    /// Create an email/password account
    ///
    /// A verification email goes to the new account before this returns. Sending it is
    /// best-effort: a failure is logged and the registration still succeeds.
    pub async fn register_email_with_password(
        &self,
        request: &RegisterRequest,
    ) -> DataResult<RegisterResponse> {
        let result = self
            .inner
            .provider
            .create_user_with_email_and_password(&request.email, &request.password)
            .await
            .map_err(|e| classify("register_email_with_password", e))?;

        let user = &result.user;
        // Sent while the new account is still the provider's current user
        if let Err(e) = self.inner.provider.send_email_verification().await {
            tracing::warn!(uid = %user.uid, error = %e, "verification email not sent");
        }

        self.set_state(SessionState::Registered {
            uid: user.uid.clone(),
            email_verified: user.email_verified,
        })
        .await;
        tracing::debug!(uid = %user.uid, "account registered");

        Ok(RegisterResponse {
            id: user.uid.clone(),
            name: request.full_name(),
            method: result.provider_id.clone(),
            provider: result.provider_id.clone(),
            is_anonymous: user.is_anonymous,
            is_email_verified: user.email_verified,
            is_new_user: result.is_new_user,
        })
    }

    async fn authenticated(&self, result: SignInResult) -> Session {
        self.set_state(SessionState::authenticated(&result.user)).await;
        tracing::debug!(uid = %result.user.uid, provider = %result.provider_id, "signed in");
        Session::from(&result)
    }

    /// Sign in with email and password
    pub async fn login_email_with_password(&self, request: &LoginRequest) -> DataResult<Session> {
        let result = self
            .inner
            .provider
            .sign_in_with_email_and_password(&request.email, &request.password)
            .await
            .map_err(|e| classify("login_email_with_password", e))?;
        Ok(self.authenticated(result).await)
    }

    /// Sign in with any credential
    pub async fn login_with_credential(&self, credential: &Credential) -> DataResult<Session> {
        let result = self
            .inner
            .provider
            .sign_in_with_credential(credential)
            .await
            .map_err(|e| classify("login_with_credential", e))?;
        Ok(self.authenticated(result).await)
    }

    /// Sign in with a new anonymous account
    pub async fn login_anonymously(&self) -> DataResult<Session> {
        let result = self
            .inner
            .provider
            .sign_in_anonymously()
            .await
            .map_err(|e| classify("login_anonymously", e))?;
        Ok(self.authenticated(result).await)
    }

    /// Signed-in account, if any
    pub async fn get_current_user(&self) -> DataResult<Option<User>> {
        Ok(self.inner.provider.current_user().await)
    }

    /// Check if a user is signed in
    pub async fn is_user_logged(&self) -> DataResult<bool> {
        Ok(self.inner.provider.current_user().await.is_some())
    }

    /// Sign out
    ///
    /// Always succeeds: a provider failure is logged and the local session ends anyway.
    pub async fn sign_out(&self) -> DataResult<()> {
        if let Err(e) = self.inner.provider.sign_out().await {
            classify("sign_out", e);
        }
        self.set_state(SessionState::SignedOut).await;
        Ok(())
    }

    /// Change display name and/or photo URL
    pub async fn update_profile(&self, update: &ProfileUpdate) -> DataResult<()> {
        self.inner
            .provider
            .update_profile(update)
            .await
            .map_err(|e| classify("update_profile", e))
    }

    /// Start an email change; the new address takes effect once its link is followed
    pub async fn update_email(&self, new_email: &str) -> DataResult<()> {
        self.inner
            .provider
            .update_email(new_email)
            .await
            .map_err(|e| classify("update_email", e))
    }

    /// Change the password
    pub async fn update_password(&self, new_password: &str) -> DataResult<()> {
        self.inner
            .provider
            .update_password(new_password)
            .await
            .map_err(|e| classify("update_password", e))
    }

    /// Send a verification email to the current user
    pub async fn send_email_verification(&self) -> DataResult<()> {
        self.inner
            .provider
            .send_email_verification()
            .await
            .map_err(|e| classify("send_email_verification", e))
    }

    /// Send a password reset email
    pub async fn send_password_reset_email(&self, email: &str) -> DataResult<()> {
        self.inner
            .provider
            .send_password_reset_email(email)
            .await
            .map_err(|e| classify("send_password_reset_email", e))
    }

    /// Delete the current account; the session ends on success
    pub async fn delete(&self) -> DataResult<()> {
        self.inner
            .provider
            .delete_user()
            .await
            .map_err(|e| classify("delete", e))?;
        self.set_state(SessionState::SignedOut).await;
        Ok(())
    }

    /// Re-authenticate the current user with their password
    pub async fn reauthenticate(&self, password: &str) -> DataResult<()> {
        let user = self
            .inner
            .provider
            .current_user()
            .await
            .ok_or_else(|| classify("reauthenticate", IdentityProviderError::NoCurrentUser))?;
        let Some(email) = user.email else {
            return Err(classify(
                "reauthenticate",
                IdentityProviderError::InvalidCredentials("account has no email".to_string()),
            ));
        };
        self.inner
            .provider
            .reauthenticate(&Credential::email(email, password))
            .await
            .map_err(|e| classify("reauthenticate", e))
    }

    /// Attach `credential` to the current account
    pub async fn link_with_credential(&self, credential: &Credential) -> DataResult<()> {
        self.inner
            .provider
            .link_with_credential(credential)
            .await
            .map_err(|e| classify("link_with_credential", e))
    }

    /// Detach `provider_id` from the current account
    pub async fn unlink(&self, provider_id: &str) -> DataResult<()> {
        self.inner
            .provider
            .unlink(provider_id)
            .await
            .map_err(|e| classify("unlink", e))
    }
}

impl std::fmt::Debug for SessionRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRepository").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::memory::InMemoryIdentityProvider;
    use crate::error::{AppError, AuthError};
    use futures::StreamExt;

    fn repository() -> (SessionRepository, InMemoryIdentityProvider) {
        let provider = InMemoryIdentityProvider::new();
        (SessionRepository::new(Arc::new(provider.clone())), provider)
    }

    #[tokio::test]
    async fn test_failed_login_keeps_state() {
        let (repo, _) = repository();
        let result = repo
            .login_email_with_password(&LoginRequest::new("ghost@example.com", "secret1"))
            .await;
        assert_eq!(result, Err(AppError::Auth(AuthError::UserNotFound)));
        assert_eq!(repo.session_state().await, SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let (repo, _) = repository();
        let request = RegisterRequest::new("Ana", "Souza", "ana@example.com", "secret1");
        let registered = repo.register_email_with_password(&request).await.unwrap();
        assert_eq!(registered.name, "Ana Souza");
        assert_eq!(registered.method, "password");
        assert!(matches!(
            repo.session_state().await,
            SessionState::Registered { .. }
        ));

        let session = repo
            .login_email_with_password(&LoginRequest::new("ana@example.com", "secret1"))
            .await
            .unwrap();
        assert_eq!(session.uid, registered.id);
        assert!(repo.is_user_logged().await.unwrap());
    }

    #[tokio::test]
    async fn test_sign_out_succeeds_when_provider_fails() {
        let (repo, provider) = repository();
        repo.login_anonymously().await.unwrap();
        provider.fail_next(IdentityProviderError::Network("offline".to_string()));

        assert_eq!(repo.sign_out().await, Ok(()));
        assert_eq!(repo.session_state().await, SessionState::SignedOut);
        assert!(!repo.is_user_logged().await.unwrap());
        assert_eq!(repo.get_current_user().await, Ok(None));
    }

    #[tokio::test]
    async fn test_auth_state_changes_yields_initial_state() {
        let (repo, _) = repository();
        let mut states = repo.auth_state_changes().await;
        assert_eq!(states.next().await, Some(SessionState::Unauthenticated));

        let session = repo.login_anonymously().await.unwrap();
        assert_eq!(
            states.next().await,
            Some(SessionState::Authenticated {
                uid: session.uid,
                is_anonymous: true,
                email_verified: false,
            })
        );
    }

    #[tokio::test]
    async fn test_reauthenticate_without_user() {
        let (repo, _) = repository();
        assert_eq!(
            repo.reauthenticate("secret1").await,
            Err(AppError::Auth(AuthError::UserNotFound))
        );
    }
}
