//! Composite facade
//!
//! [`Facade`] owns one repository per backend, built from explicitly injected [`Backends`].
//! There are no global instances: two facades over different backends are independent.

use crate::auth::{IdentityProvider, InMemoryIdentityProvider, SessionRepository};
use crate::document::{DocumentRepository, DocumentStore, InMemoryDocumentStore};
use crate::record::{InMemoryRecordStore, RecordRepository, RecordStore};
use crate::settings::Settings;
use crate::usecase::{LoginUseCase, LogoutUseCase};
use std::sync::Arc;

/// The three backends a [`Facade`] runs on
#[derive(Clone)]
pub struct Backends {
    /// Account backend
    pub identity: Arc<dyn IdentityProvider>,
    /// Realtime record store
    pub records: Arc<dyn RecordStore>,
    /// Document store
    pub documents: Arc<dyn DocumentStore>,
}

impl Backends {
    /// Bundle three backends
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        records: Arc<dyn RecordStore>,
        documents: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            identity,
            records,
            documents,
        }
    }
}

impl std::fmt::Debug for Backends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backends").finish_non_exhaustive()
    }
}

/// In-memory backends, kept as concrete types so tests can reach their fault hooks
#[derive(Clone, Default)]
pub struct InMemoryBackends {
    /// In-memory identity provider
    pub identity: InMemoryIdentityProvider,
    /// In-memory record store
    pub records: InMemoryRecordStore,
    /// In-memory document store
    pub documents: InMemoryDocumentStore,
}

impl InMemoryBackends {
    /// Fresh, empty backends
    pub fn new() -> Self {
        Self::default()
    }

    /// Type-erased handles sharing state with `self`
    pub fn backends(&self) -> Backends {
        Backends {
            identity: Arc::new(self.identity.clone()),
            records: Arc::new(self.records.clone()),
            documents: Arc::new(self.documents.clone()),
        }
    }
}

/// Entry point: repositories and use cases over one set of backends
///
/// Cloning is cheap and shares the repositories.
///
/// # Example
/// ```no_run
/// use firebase_facade::{Facade, InMemoryBackends, LoginRequest, Settings};
///
/// # async fn example() -> Result<(), firebase_facade::AppError> {
/// let backends = InMemoryBackends::new();
/// let facade = Facade::new(backends.backends(), Settings::default());
///
/// let session = facade
///     .login_use_case()
///     .login(&LoginRequest::new("alice@example.com", "secret1"))
///     .await?;
/// println!("online as {}", session.uid);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Facade {
    inner: Arc<FacadeInner>,
}

struct FacadeInner {
    settings: Settings,
    auth: SessionRepository,
    database: RecordRepository,
    documents: DocumentRepository,
}

impl Facade {
    /// Build every repository over `backends`
    pub fn new(backends: Backends, settings: Settings) -> Self {
        let Backends {
            identity,
            records,
            documents,
        } = backends;
        Self {
            inner: Arc::new(FacadeInner {
                auth: SessionRepository::new(identity),
                database: RecordRepository::new(records, &settings.layout),
                documents: DocumentRepository::new(documents),
                settings,
            }),
        }
    }

    /// Session/identity repository
    pub fn auth(&self) -> &SessionRepository {
        &self.inner.auth
    }

    /// Realtime record repositories (messages, geo, presence)
    pub fn database(&self) -> &RecordRepository {
        &self.inner.database
    }

    /// Document repository
    pub fn documents(&self) -> &DocumentRepository {
        &self.inner.documents
    }

    /// Settings the facade was built with
    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    /// Login followed by going online, with sign-out compensation
    pub fn login_use_case(&self) -> LoginUseCase {
        LoginUseCase::new(
            self.inner.auth.clone(),
            self.inner.database.presence().clone(),
            self.inner.settings.presence_entity_type.clone(),
        )
    }

    /// Going offline followed by sign-out
    pub fn logout_use_case(&self) -> LogoutUseCase {
        LogoutUseCase::new(
            self.inner.auth.clone(),
            self.inner.database.presence().clone(),
            self.inner.settings.presence_entity_type.clone(),
        )
    }
}

impl std::fmt::Debug for Facade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Facade")
            .field("settings", &self.inner.settings)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::NodePath;

    #[tokio::test]
    async fn test_backends_share_state() {
        let backends = InMemoryBackends::new();
        let facade = Facade::new(backends.backends(), Settings::default());

        facade
            .database()
            .presence()
            .go_online("users", "alice")
            .await
            .unwrap();
        let stored = backends
            .records
            .get(&NodePath::parse("presence/users/alice"))
            .await
            .unwrap();
        assert!(stored.is_some());
    }

    #[tokio::test]
    async fn test_facades_are_independent() {
        let a = Facade::new(InMemoryBackends::new().backends(), Settings::default());
        let b = Facade::new(InMemoryBackends::new().backends(), Settings::default());

        a.auth().login_anonymously().await.unwrap();
        assert!(a.auth().is_user_logged().await.unwrap());
        assert!(!b.auth().is_user_logged().await.unwrap());
    }

    #[test]
    fn test_custom_presence_entity() {
        let settings = Settings {
            presence_entity_type: "drivers".to_string(),
            ..Settings::default()
        };
        let facade = Facade::new(InMemoryBackends::new().backends(), settings);
        assert_eq!(facade.settings().presence_entity_type, "drivers");
    }
}
