//! Session repository behaviour against the in-memory identity provider

use firebase_facade::auth::{EmailKind, IdentityProviderError, SentEmail};
use firebase_facade::{
    AppError, AuthError, Credential, Facade, GenericError, InMemoryBackends, LoginRequest,
    ProfileUpdate, RegisterRequest, SessionState, Settings,
};
use futures::StreamExt;

fn setup() -> (Facade, InMemoryBackends) {
    let backends = InMemoryBackends::new();
    let facade = Facade::new(backends.backends(), Settings::default());
    (facade, backends)
}

fn alice() -> RegisterRequest {
    RegisterRequest::new("Alice", "Silva", "alice@example.com", "secret1")
}

fn verification(to: &str) -> SentEmail {
    SentEmail {
        kind: EmailKind::Verification,
        to: to.to_string(),
    }
}

#[tokio::test]
async fn test_register_twice_is_email_in_use() {
    let (facade, _) = setup();
    let first = facade.auth().register_email_with_password(&alice()).await.unwrap();
    assert!(first.is_new_user);
    assert_eq!(first.name, "Alice Silva");
    assert!(!first.is_anonymous);

    let second = facade.auth().register_email_with_password(&alice()).await;
    assert_eq!(second, Err(AppError::Auth(AuthError::EmailInUse)));
}

#[tokio::test]
async fn test_register_sends_verification_to_new_account() {
    let (facade, backends) = setup();
    let registered = facade.auth().register_email_with_password(&alice()).await.unwrap();
    assert_eq!(
        facade.auth().session_state().await,
        SessionState::Registered {
            uid: registered.id.clone(),
            email_verified: false,
        }
    );

    assert_eq!(
        backends.identity.sent_emails(),
        vec![verification("alice@example.com")]
    );
}

#[tokio::test]
async fn test_each_registration_verifies_its_own_address() {
    let (facade, backends) = setup();
    let auth = facade.auth();
    auth.register_email_with_password(&alice()).await.unwrap();
    auth.register_email_with_password(&RegisterRequest::new(
        "Bob",
        "Lima",
        "bob@example.com",
        "secret1",
    ))
    .await
    .unwrap();

    assert_eq!(
        backends.identity.sent_emails(),
        vec![verification("alice@example.com"), verification("bob@example.com")]
    );
}

#[tokio::test]
async fn test_sign_out_right_after_register_keeps_verification() {
    let (facade, backends) = setup();
    facade.auth().register_email_with_password(&alice()).await.unwrap();
    facade.auth().sign_out().await.unwrap();

    assert_eq!(
        backends.identity.sent_emails(),
        vec![verification("alice@example.com")]
    );
    assert!(backends.identity.follow_email_link("alice@example.com"));
}

#[tokio::test]
async fn test_register_succeeds_when_verification_email_fails() {
    let (facade, backends) = setup();
    backends
        .identity
        .fail_next_email(IdentityProviderError::Email("INVALID_SENDER".to_string()));

    let registered = facade.auth().register_email_with_password(&alice()).await.unwrap();
    assert!(registered.is_new_user);
    assert!(backends.identity.sent_emails().is_empty());
    assert!(facade.auth().is_user_logged().await.unwrap());
}

#[tokio::test]
async fn test_failed_remote_sign_out_still_signs_out_locally() {
    let (facade, backends) = setup();
    let auth = facade.auth();
    auth.login_anonymously().await.unwrap();
    backends
        .identity
        .fail_next_sign_out(IdentityProviderError::Network("connection refused".to_string()));

    assert_eq!(auth.sign_out().await, Ok(()));
    assert_eq!(auth.session_state().await, SessionState::SignedOut);
    assert!(!auth.is_user_logged().await.unwrap());
    assert_eq!(auth.get_current_user().await, Ok(None));
}

#[tokio::test]
async fn test_register_validation_errors() {
    let (facade, _) = setup();
    let weak = RegisterRequest::new("Bob", "Lima", "bob@example.com", "123");
    assert_eq!(
        facade.auth().register_email_with_password(&weak).await,
        Err(AppError::Auth(AuthError::WeakPassword))
    );

    let malformed = RegisterRequest::new("Bob", "Lima", "bob-at-example", "secret1");
    assert_eq!(
        facade.auth().register_email_with_password(&malformed).await,
        Err(AppError::Auth(AuthError::InvalidCredentials))
    );
    assert_eq!(facade.auth().session_state().await, SessionState::Unauthenticated);
}

#[tokio::test]
async fn test_login_variants_reach_authenticated() {
    let (facade, _) = setup();
    let auth = facade.auth();
    auth.register_email_with_password(&alice()).await.unwrap();
    auth.sign_out().await.unwrap();

    let session = auth
        .login_email_with_password(&LoginRequest::new("alice@example.com", "secret1"))
        .await
        .unwrap();
    assert!(matches!(
        auth.session_state().await,
        SessionState::Authenticated { ref uid, is_anonymous: false, .. } if *uid == session.uid
    ));

    let anonymous = auth.login_anonymously().await.unwrap();
    assert!(anonymous.is_anonymous);

    let google = Credential::Google {
        id_token: Some("google-id-token".to_string()),
        access_token: None,
    };
    let federated = auth.login_with_credential(&google).await.unwrap();
    assert!(!federated.is_anonymous);
    assert_ne!(federated.uid, anonymous.uid);
}

#[tokio::test]
async fn test_wrong_password_leaves_state_unchanged() {
    let (facade, _) = setup();
    let auth = facade.auth();
    auth.register_email_with_password(&alice()).await.unwrap();
    auth.sign_out().await.unwrap();

    let result = auth
        .login_email_with_password(&LoginRequest::new("alice@example.com", "wrong-one"))
        .await;
    assert_eq!(result, Err(AppError::Auth(AuthError::InvalidCredentials)));
    assert_eq!(auth.session_state().await, SessionState::SignedOut);
}

#[tokio::test]
async fn test_network_failure_is_generic() {
    let (facade, backends) = setup();
    backends
        .identity
        .fail_next(IdentityProviderError::Network("connection refused".to_string()));
    assert_eq!(
        facade.auth().login_anonymously().await,
        Err(AppError::Generic(GenericError::NetworkError))
    );
}

#[tokio::test]
async fn test_sensitive_operations_need_recent_login() {
    let (facade, backends) = setup();
    let auth = facade.auth();
    auth.register_email_with_password(&alice()).await.unwrap();
    backends.identity.expire_recent_login();

    let requires_login = Err(AppError::Auth(AuthError::RequiresRecentLogin));
    assert_eq!(auth.update_email("alice@new.example.com").await, requires_login);
    assert_eq!(auth.update_password("better-secret").await, requires_login);
    assert_eq!(auth.unlink("password").await, requires_login);
    assert_eq!(auth.delete().await, requires_login);

    auth.reauthenticate("secret1").await.unwrap();
    auth.update_password("better-secret").await.unwrap();
    auth.delete().await.unwrap();
    assert_eq!(auth.session_state().await, SessionState::SignedOut);
    assert_eq!(backends.identity.account_count(), 0);
}

#[tokio::test]
async fn test_reauthenticate_with_wrong_password() {
    let (facade, _) = setup();
    let auth = facade.auth();
    auth.register_email_with_password(&alice()).await.unwrap();
    assert_eq!(
        auth.reauthenticate("not-it").await,
        Err(AppError::Auth(AuthError::InvalidCredentials))
    );
}

#[tokio::test]
async fn test_update_email_collision() {
    let (facade, _) = setup();
    let auth = facade.auth();
    auth.register_email_with_password(&RegisterRequest::new(
        "Bob",
        "Lima",
        "bob@example.com",
        "secret1",
    ))
    .await
    .unwrap();
    auth.register_email_with_password(&alice()).await.unwrap();

    assert_eq!(
        auth.update_email("bob@example.com").await,
        Err(AppError::Auth(AuthError::EmailInUse))
    );
}

#[tokio::test]
async fn test_update_profile() {
    let (facade, _) = setup();
    let auth = facade.auth();
    let update = ProfileUpdate::new().with_display_name("Alice S.");
    assert_eq!(
        auth.update_profile(&update).await,
        Err(AppError::Auth(AuthError::UserNotFound))
    );

    auth.register_email_with_password(&alice()).await.unwrap();
    auth.update_profile(&update).await.unwrap();
    let user = auth.get_current_user().await.unwrap().unwrap();
    assert_eq!(user.display_name.as_deref(), Some("Alice S."));
}

#[tokio::test]
async fn test_password_reset_email() {
    let (facade, backends) = setup();
    let auth = facade.auth();
    assert_eq!(
        auth.send_password_reset_email("ghost@example.com").await,
        Err(AppError::Auth(AuthError::UserNotFound))
    );

    auth.register_email_with_password(&alice()).await.unwrap();
    auth.send_password_reset_email("alice@example.com").await.unwrap();
    assert!(backends
        .identity
        .sent_emails()
        .iter()
        .any(|sent| sent.kind == EmailKind::PasswordReset));
}

#[tokio::test]
async fn test_link_credential_collision() {
    let (facade, _) = setup();
    let auth = facade.auth();
    let github = Credential::GitHub {
        token: "gh-token".to_string(),
    };
    auth.login_with_credential(&github).await.unwrap();

    auth.login_anonymously().await.unwrap();
    assert_eq!(
        auth.link_with_credential(&github).await,
        Err(AppError::Auth(AuthError::EmailInUse))
    );

    let facebook = Credential::Facebook {
        access_token: "fb-token".to_string(),
    };
    auth.link_with_credential(&facebook).await.unwrap();
    let user = auth.get_current_user().await.unwrap().unwrap();
    assert!(!user.is_anonymous);
    assert_eq!(user.provider_ids, vec!["facebook.com".to_string()]);
}

#[tokio::test]
async fn test_auth_state_changes_sequence() {
    let (facade, _) = setup();
    let auth = facade.auth();
    let mut states = auth.auth_state_changes().await;
    assert_eq!(states.next().await, Some(SessionState::Unauthenticated));

    let registered = auth.register_email_with_password(&alice()).await.unwrap();
    assert_eq!(
        states.next().await,
        Some(SessionState::Registered {
            uid: registered.id.clone(),
            email_verified: false,
        })
    );

    auth.sign_out().await.unwrap();
    assert_eq!(states.next().await, Some(SessionState::SignedOut));
}
