//! Identity and session management
//!
//! [`IdentityProvider`] is the account backend seam. [`SessionRepository`] wraps it with
//! error classification and session tracking.

pub mod memory;
pub mod provider;
pub mod repository;
pub mod rest;
pub mod types;

pub use memory::{EmailKind, InMemoryIdentityProvider, SentEmail};
pub use provider::{IdentityProvider, IdentityProviderError};
pub use repository::SessionRepository;
pub use rest::RestIdentityProvider;
pub use types::{
    Credential, LoginRequest, ProfileUpdate, RegisterRequest, RegisterResponse, Session,
    SessionState, SignInResult, User, UserMetadata,
};
