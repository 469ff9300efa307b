//! Identity types
//!
//! Accounts, credentials and the request/response payloads of the session repository.

use serde::{Deserialize, Serialize};

/// Account timestamps
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMetadata {
    /// When the account was created (Unix timestamp in milliseconds)
    pub creation_timestamp: i64,

    /// Last sign-in (Unix timestamp in milliseconds)
    pub last_sign_in_timestamp: i64,
}

impl UserMetadata {
    pub(crate) fn now() -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            creation_timestamp: now,
            last_sign_in_timestamp: now,
        }
    }
}

/// Account as reported by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique user ID
    pub uid: String,

    /// Email address (if available)
    pub email: Option<String>,

    /// Display name (if available)
    pub display_name: Option<String>,

    /// Photo URL (if available)
    pub photo_url: Option<String>,

    /// Whether the email address has been verified
    pub email_verified: bool,

    /// Whether the account is anonymous
    pub is_anonymous: bool,

    /// Providers linked to the account (e.g. "password", "google.com")
    pub provider_ids: Vec<String>,

    /// Account timestamps
    pub metadata: UserMetadata,
}

impl User {
    pub(crate) fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: None,
            display_name: None,
            photo_url: None,
            email_verified: false,
            is_anonymous: false,
            provider_ids: Vec::new(),
            metadata: UserMetadata::now(),
        }
    }
}

/// Authentication credential
///
/// Passed to sign-in, re-authentication and linking.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Email and password credential
    EmailPassword {
        /// Email address
        email: String,
        /// Password
        password: String,
    },

    /// Google OAuth credential
    Google {
        /// Google Sign-In ID token
        id_token: Option<String>,
        /// Google Sign-In access token
        access_token: Option<String>,
    },

    /// Facebook OAuth credential
    Facebook {
        /// Facebook access token
        access_token: String,
    },

    /// GitHub OAuth credential
    GitHub {
        /// GitHub OAuth access token
        token: String,
    },

    /// Generic OAuth2 credential
    OAuth {
        /// Provider ID (e.g., "apple.com", "microsoft.com")
        provider_id: String,
        /// ID token (OIDC)
        id_token: Option<String>,
        /// Access token
        access_token: Option<String>,
        /// Raw nonce
        raw_nonce: Option<String>,
    },

    /// Anonymous credential
    Anonymous,

    /// Custom token credential
    CustomToken {
        /// Custom JWT token
        token: String,
    },
}

impl Credential {
    /// Email/password credential
    pub fn email(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self::EmailPassword {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Get the provider ID for this credential
    pub fn provider_id(&self) -> &str {
        match self {
            Credential::EmailPassword { .. } => "password",
            Credential::Google { .. } => "google.com",
            Credential::Facebook { .. } => "facebook.com",
            Credential::GitHub { .. } => "github.com",
            Credential::OAuth { provider_id, .. } => provider_id,
            Credential::Anonymous => "anonymous",
            Credential::CustomToken { .. } => "custom",
        }
    }

    /// The token that identifies the federated account, if any
    pub(crate) fn subject(&self) -> Option<&str> {
        match self {
            Credential::Google { id_token, access_token }
            | Credential::OAuth { id_token, access_token, .. } => {
                id_token.as_deref().or(access_token.as_deref())
            }
            Credential::Facebook { access_token } => Some(access_token),
            Credential::GitHub { token } | Credential::CustomToken { token } => Some(token),
            Credential::EmailPassword { .. } | Credential::Anonymous => None,
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::EmailPassword { email, .. } => f
                .debug_struct("EmailPassword")
                .field("email", email)
                .field("password", &"<redacted>")
                .finish(),
            Credential::Anonymous => f.write_str("Anonymous"),
            other => f
                .debug_struct("Credential")
                .field("provider_id", &other.provider_id())
                .field("token", &"<redacted>")
                .finish(),
        }
    }
}

/// Result of a successful sign-in or account creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInResult {
    /// The signed-in account
    pub user: User,

    /// Provider that authenticated the user (e.g. "password", "google.com")
    pub provider_id: String,

    /// Whether this sign-in created the account
    pub is_new_user: bool,
}

/// Account registration payload
#[derive(Clone, PartialEq, Eq)]
pub struct RegisterRequest {
    /// First name
    pub name: String,
    /// Last name
    pub last_name: String,
    /// Email address
    pub email: String,
    /// Password
    pub password: String,
}

impl RegisterRequest {
    /// Build a registration payload
    pub fn new(
        name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            last_name: last_name.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    /// "name last_name"
    pub fn full_name(&self) -> String {
        format!("{} {}", self.name, self.last_name)
    }
}

impl std::fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("name", &self.name)
            .field("last_name", &self.last_name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Profile summary returned by registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisterResponse {
    /// New account's uid
    pub id: String,
    /// Full name from the request
    pub name: String,
    /// Sign-in method used to create the account
    pub method: String,
    /// Provider that owns the account
    pub provider: String,
    /// Whether the account is anonymous
    pub is_anonymous: bool,
    /// Whether the email was already verified
    pub is_email_verified: bool,
    /// Whether the account was created by this call
    pub is_new_user: bool,
}

/// Email/password login payload
#[derive(Clone, PartialEq, Eq)]
pub struct LoginRequest {
    /// Email address
    pub email: String,
    /// Password
    pub password: String,
}

impl LoginRequest {
    /// Build a login payload
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Authenticated session handed back by the login operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    /// Signed-in user's uid
    pub uid: String,
    /// Whether the session belongs to an anonymous account
    pub is_anonymous: bool,
}

impl From<&SignInResult> for Session {
    fn from(result: &SignInResult) -> Self {
        Self {
            uid: result.user.uid.clone(),
            is_anonymous: result.user.is_anonymous,
        }
    }
}

/// Profile change request
///
/// Fields left as `None` are not touched.
///
/// # Example
/// ```
/// use firebase_facade::ProfileUpdate;
///
/// let update = ProfileUpdate::new()
///     .with_display_name("Ana Souza")
///     .with_photo_url("https://example.com/ana.png");
/// assert_eq!(update.display_name.as_deref(), Some("Ana Souza"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    /// New display name
    pub display_name: Option<String>,

    /// New photo URL
    pub photo_url: Option<String>,
}

impl ProfileUpdate {
    /// Creates an empty profile update
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the display name
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Sets the photo URL
    pub fn with_photo_url(mut self, url: impl Into<String>) -> Self {
        self.photo_url = Some(url.into());
        self
    }

    /// Check if the update changes nothing
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.photo_url.is_none()
    }
}

/// Session lifecycle
///
/// `Unauthenticated → Registered → Authenticated → SignedOut`. A failed operation never
/// moves the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    /// No sign-in has happened yet
    #[default]
    Unauthenticated,

    /// An account was just created
    Registered {
        /// New account's uid
        uid: String,
        /// Whether its email is verified
        email_verified: bool,
    },

    /// A user is signed in
    Authenticated {
        /// Signed-in user's uid
        uid: String,
        /// Whether the account is anonymous
        is_anonymous: bool,
        /// Whether its email is verified
        email_verified: bool,
    },

    /// The user signed out or deleted the account
    SignedOut,
}

impl SessionState {
    /// uid of the session's account, if there is one
    pub fn uid(&self) -> Option<&str> {
        match self {
            Self::Registered { uid, .. } | Self::Authenticated { uid, .. } => Some(uid),
            Self::Unauthenticated | Self::SignedOut => None,
        }
    }

    pub(crate) fn authenticated(user: &User) -> Self {
        Self::Authenticated {
            uid: user.uid.clone(),
            is_anonymous: user.is_anonymous,
            email_verified: user.email_verified,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_provider_ids() {
        assert_eq!(Credential::email("a@b.c", "pw").provider_id(), "password");
        let github = Credential::GitHub {
            token: "gh".to_string(),
        };
        assert_eq!(github.provider_id(), "github.com");
        assert_eq!(github.subject(), Some("gh"));
        assert_eq!(Credential::Anonymous.subject(), None);
    }

    #[test]
    fn test_google_subject_prefers_id_token() {
        let credential = Credential::Google {
            id_token: Some("id".to_string()),
            access_token: Some("access".to_string()),
        };
        assert_eq!(credential.subject(), Some("id"));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let debug = format!("{:?}", Credential::email("ana@example.com", "hunter22"));
        assert!(debug.contains("ana@example.com"));
        assert!(!debug.contains("hunter22"));

        let debug = format!("{:?}", LoginRequest::new("ana@example.com", "hunter22"));
        assert!(!debug.contains("hunter22"));
    }

    #[test]
    fn test_register_full_name() {
        let request = RegisterRequest::new("Ana", "Souza", "ana@example.com", "secret1");
        assert_eq!(request.full_name(), "Ana Souza");
    }

    #[test]
    fn test_profile_update_builder() {
        assert!(ProfileUpdate::new().is_empty());
        let update = ProfileUpdate::new().with_photo_url("https://example.com/p.png");
        assert!(!update.is_empty());
        assert!(update.display_name.is_none());
    }

    #[test]
    fn test_session_state_uid() {
        assert_eq!(SessionState::default().uid(), None);
        let state = SessionState::Registered {
            uid: "u1".to_string(),
            email_verified: false,
        };
        assert_eq!(state.uid(), Some("u1"));
    }
}
