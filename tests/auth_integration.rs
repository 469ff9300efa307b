//! Integration tests for the REST identity provider
//!
//! These tests talk to a real Identity Toolkit endpoint and require:
//! 1. A Firebase project with Email/Password and Anonymous sign-in enabled
//! 2. Environment variables set in a .env file
//! 3. Run with: cargo test --features integration-tests -- --test-threads=1
//!
//! `FIREBASE_AUTH_ENDPOINT` may point at the auth emulator instead.

#![cfg(feature = "integration-tests")]

use firebase_facade::auth::{IdentityProvider, RestIdentityProvider};
use firebase_facade::{
    AppError, AuthError, Facade, InMemoryBackends, LoginRequest, RegisterRequest, Settings,
};
use std::env;
use std::sync::Arc;

/// Load environment variables from .env file
fn load_env() -> Settings {
    dotenvy::dotenv().ok();
    Settings::from_env()
}

fn provider() -> RestIdentityProvider {
    let settings = load_env();
    RestIdentityProvider::new(&settings.identity).expect("FIREBASE_API_KEY must be set in .env file")
}

/// Facade with the REST provider and in-memory stores
fn facade() -> Facade {
    let settings = load_env();
    let mut backends = InMemoryBackends::new().backends();
    backends.identity = Arc::new(
        RestIdentityProvider::new(&settings.identity)
            .expect("FIREBASE_API_KEY must be set in .env file"),
    );
    Facade::new(backends, settings)
}

fn unique_email() -> String {
    format!("facade+{}@example.com", chrono::Utc::now().timestamp_millis())
}

/// Test: Sign in with the configured test user
#[tokio::test]
async fn test_sign_in_with_email_password() {
    let provider = provider();
    let email = env::var("TEST_USER_EMAIL").expect("TEST_USER_EMAIL must be set in .env file");
    let password =
        env::var("TEST_USER_PASSWORD").expect("TEST_USER_PASSWORD must be set in .env file");

    let result = provider
        .sign_in_with_email_and_password(&email, &password)
        .await
        .expect("Failed to sign in");

    assert!(!result.user.uid.is_empty());
    assert_eq!(result.user.email.as_deref(), Some(email.as_str()));
    assert!(!result.is_new_user);

    provider.sign_out().await.expect("Failed to sign out");
    assert!(provider.current_user().await.is_none());
}

/// Test: Anonymous authentication, cleaned up afterwards
#[tokio::test]
async fn test_anonymous_auth() {
    let provider = provider();

    let result = provider
        .sign_in_anonymously()
        .await
        .expect("Failed to sign in anonymously");
    assert!(result.user.is_anonymous);
    assert!(result.is_new_user);

    provider.delete_user().await.expect("Failed to delete user");
    assert!(provider.current_user().await.is_none());
}

/// Test: Register twice through the facade, then delete
#[tokio::test]
async fn test_register_twice_then_delete() {
    let facade = facade();
    let email = unique_email();
    let request = RegisterRequest::new("Test", "User", &email, "TempPassword123!");

    let registered = facade
        .auth()
        .register_email_with_password(&request)
        .await
        .expect("Failed to register");
    assert!(registered.is_new_user);

    let again = facade.auth().register_email_with_password(&request).await;
    assert_eq!(again, Err(AppError::Auth(AuthError::EmailInUse)));

    facade
        .auth()
        .login_email_with_password(&LoginRequest::new(&email, "TempPassword123!"))
        .await
        .expect("Failed to sign in");
    facade.auth().delete().await.expect("Failed to delete user");
}

/// Test: Wrong password is classified
#[tokio::test]
async fn test_wrong_password_is_classified() {
    let facade = facade();
    let email = env::var("TEST_USER_EMAIL").expect("TEST_USER_EMAIL must be set in .env file");

    let result = facade
        .auth()
        .login_email_with_password(&LoginRequest::new(email, "definitely-wrong"))
        .await;
    assert!(matches!(
        result,
        Err(AppError::Auth(AuthError::InvalidCredentials))
    ));
}

/// Test: Send password reset email
#[tokio::test]
async fn test_password_reset() {
    let provider = provider();
    let email = env::var("TEST_USER_EMAIL").expect("TEST_USER_EMAIL must be set in .env file");

    provider
        .send_password_reset_email(&email)
        .await
        .expect("Failed to send password reset email");
}
