//! Firebase Facade
//!
//! Repository-pattern facade over an identity provider, a realtime record store and a
//! document store. Every operation returns a [`DataResult`]; backend failures are
//! classified into the closed [`AppError`] taxonomy at the repository boundary.
//!
//! Backends are traits ([`IdentityProvider`], [`RecordStore`], [`DocumentStore`]) injected
//! through [`Backends`]. In-memory implementations ship with the crate.
//!
//! # Example
//! ```no_run
//! # async fn example() -> Result<(), firebase_facade::AppError> {
//! use firebase_facade::{Facade, InMemoryBackends, RegisterRequest, Settings};
//! use firebase_facade::record::Message;
//!
//! let facade = Facade::new(InMemoryBackends::new().backends(), Settings::default());
//!
//! let request = RegisterRequest::new("Ana", "Souza", "ana@example.com", "secret1");
//! let account = facade.auth().register_email_with_password(&request).await?;
//!
//! facade
//!     .database()
//!     .messages()
//!     .send_message("conv-1", Message::new(&account.id, "Olá!"))
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod listener;
pub mod logging;
pub mod messages;
pub mod settings;
pub mod subscription;

pub mod auth;
pub mod document;
pub mod record;

pub mod facade;
pub mod usecase;

// Re-exports for convenience
pub use error::{AppError, AuthError, DataResult, DocumentError, GenericError, RecordError};
pub use facade::{Backends, Facade, InMemoryBackends};
pub use listener::{ListenerRegistration, ListenerStream};
pub use logging::init_tracing;
pub use messages::{user_message, ErrorMessages, MessageTable};
pub use settings::{IdentitySettings, RecordLayout, Settings};
pub use subscription::Subscription;

// Auth re-exports
pub use auth::{
    Credential, IdentityProvider, LoginRequest, ProfileUpdate, RegisterRequest,
    RegisterResponse, Session, SessionRepository, SessionState, User,
};

// Store re-exports
pub use document::{DocumentRepository, DocumentStore, Filter, Operator};
pub use record::{RecordRepository, RecordStore};

pub use usecase::{LoginUseCase, LogoutUseCase};
