//! Composite use cases
//!
//! Flows that span the session repository and the presence repository.

mod login;
mod logout;

pub use login::LoginUseCase;
pub use logout::LogoutUseCase;
