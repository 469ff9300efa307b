//! Logout with presence

use crate::auth::SessionRepository;
use crate::error::DataResult;
use crate::record::PresenceRepository;

/// Publish the user as offline, then sign out
///
/// The sign-out happens even when going offline fails; that failure is still reported.
#[derive(Clone, Debug)]
pub struct LogoutUseCase {
    auth: SessionRepository,
    presence: PresenceRepository,
    entity_type: String,
}

impl LogoutUseCase {
    /// Use case clearing presence under `entity_type`
    pub fn new(auth: SessionRepository, presence: PresenceRepository, entity_type: String) -> Self {
        Self {
            auth,
            presence,
            entity_type,
        }
    }

    /// Go offline and sign out
    pub async fn logout(&self) -> DataResult<()> {
        let presence = match self.auth.get_current_user().await? {
            Some(user) => self.presence.go_offline(&self.entity_type, &user.uid).await,
            None => Ok(()),
        };
        self.auth.sign_out().await?;
        presence
    }
}
