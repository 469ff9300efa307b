//! Login with presence

use crate::auth::{Credential, LoginRequest, Session, SessionRepository};
use crate::error::DataResult;
use crate::record::PresenceRepository;

/// Sign in, then publish the user as online
///
/// If going online fails, the user is signed out again and the presence error is returned,
/// so a caller never ends up signed in but invisible.
#[derive(Clone, Debug)]
pub struct LoginUseCase {
    auth: SessionRepository,
    presence: PresenceRepository,
    entity_type: String,
}

impl LoginUseCase {
    /// Use case publishing presence under `entity_type`
    pub fn new(auth: SessionRepository, presence: PresenceRepository, entity_type: String) -> Self {
        Self {
            auth,
            presence,
            entity_type,
        }
    }

    /// Email/password login
    pub async fn login(&self, request: &LoginRequest) -> DataResult<Session> {
        let session = self.auth.login_email_with_password(request).await?;
        self.go_online(session).await
    }

    /// Anonymous login
    pub async fn login_anonymously(&self) -> DataResult<Session> {
        let session = self.auth.login_anonymously().await?;
        self.go_online(session).await
    }

    /// Login with any credential
    pub async fn login_with_credential(&self, credential: &Credential) -> DataResult<Session> {
        let session = self.auth.login_with_credential(credential).await?;
        self.go_online(session).await
    }

    async fn go_online(&self, session: Session) -> DataResult<Session> {
        if let Err(presence_error) = self.presence.go_online(&self.entity_type, &session.uid).await
        {
            tracing::warn!(
                uid = %session.uid,
                code = presence_error.code(),
                "presence failed after login, signing out"
            );
            // sign_out never fails
            let _ = self.auth.sign_out().await;
            return Err(presence_error);
        }
        Ok(session)
    }
}
