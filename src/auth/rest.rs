//! Identity Toolkit REST provider
//!
//! Talks to `accounts:*` endpoints of the Identity Toolkit API with `reqwest`. The signed-in
//! user and their ID token are held in memory only; ID tokens are not refreshed, so an
//! expired token surfaces as [`IdentityProviderError::RecentLoginRequired`].

use crate::auth::provider::{IdentityProvider, IdentityProviderError};
use crate::auth::types::{Credential, ProfileUpdate, SignInResult, User};
use crate::settings::IdentitySettings;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::RwLock;

/// [`IdentityProvider`] backed by the Identity Toolkit REST API
///
/// # Example
/// ```no_run
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// use firebase_facade::auth::{IdentityProvider, RestIdentityProvider};
/// use firebase_facade::Settings;
///
/// let provider = RestIdentityProvider::new(&Settings::from_env().identity)?;
/// let result = provider.sign_in_with_email_and_password("user@example.com", "password").await?;
/// println!("Signed in: {}", result.user.uid);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RestIdentityProvider {
    inner: Arc<RestInner>,
}

struct RestInner {
    api_key: String,
    endpoint: String,
    http_client: reqwest::Client,
    session: RwLock<Option<RestSession>>,
}

struct RestSession {
    user: User,
    id_token: String,
}

/// Sign-in family response (`signUp`, `signInWithPassword`, `signInWithIdp`, ...)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    local_id: Option<String>,
    email: Option<String>,
    display_name: Option<String>,
    photo_url: Option<String>,
    id_token: Option<String>,
    #[serde(default)]
    email_verified: bool,
    is_new_user: Option<bool>,
    mfa_pending_credential: Option<String>,
}

impl SignInResponse {
    fn into_session(
        self,
        provider_id: &str,
        is_anonymous: bool,
    ) -> Result<RestSession, IdentityProviderError> {
        // Error-first: a second factor is pending, there is no session yet
        if self.mfa_pending_credential.is_some() {
            return Err(IdentityProviderError::MultiFactorRequired);
        }
        let (Some(uid), Some(id_token)) = (self.local_id, self.id_token) else {
            return Err(IdentityProviderError::Internal(
                "Sign-in response without localId or idToken".to_string(),
            ));
        };

        let mut user = User::new(uid);
        user.email = self.email.filter(|e| !e.is_empty());
        user.display_name = self.display_name;
        user.photo_url = self.photo_url;
        user.email_verified = self.email_verified;
        user.is_anonymous = is_anonymous;
        if !is_anonymous {
            user.provider_ids.push(provider_id.to_string());
        }
        Ok(RestSession { user, id_token })
    }
}

/// `accounts:update` response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateResponse {
    email: Option<String>,
    display_name: Option<String>,
    photo_url: Option<String>,
    #[serde(default)]
    email_verified: bool,
    #[serde(default)]
    provider_user_info: Vec<ProviderUserInfo>,
    id_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProviderUserInfo {
    provider_id: String,
}

impl UpdateResponse {
    fn apply(self, session: &mut RestSession) {
        let user = &mut session.user;
        if self.email.is_some() {
            user.email = self.email;
        }
        user.display_name = self.display_name;
        user.photo_url = self.photo_url;
        user.email_verified = self.email_verified;
        user.provider_ids = self
            .provider_user_info
            .into_iter()
            .map(|info| info.provider_id)
            .collect();
        if !user.provider_ids.is_empty() {
            user.is_anonymous = false;
        }
        if let Some(id_token) = self.id_token {
            session.id_token = id_token;
        }
    }
}

/// `signInWithIdp` post body for a federated credential
fn idp_post_body(credential: &Credential) -> Result<String, IdentityProviderError> {
    let (id_token, access_token) = match credential {
        // Error-first: these never go through signInWithIdp
        Credential::EmailPassword { .. } | Credential::Anonymous | Credential::CustomToken { .. } => {
            return Err(IdentityProviderError::InvalidCredentials(format!(
                "{} credential is not a federated credential",
                credential.provider_id()
            )));
        }
        Credential::Google { id_token, access_token }
        | Credential::OAuth { id_token, access_token, .. } => {
            if id_token.is_none() && access_token.is_none() {
                return Err(IdentityProviderError::InvalidCredentials(format!(
                    "{} credential requires id_token or access_token",
                    credential.provider_id()
                )));
            }
            (id_token.as_deref(), access_token.as_deref())
        }
        Credential::Facebook { access_token } => (None, Some(access_token.as_str())),
        Credential::GitHub { token } => (None, Some(token.as_str())),
    };

    let mut post_body = format!("providerId={}", credential.provider_id());
    if let Some(id_token) = id_token {
        post_body.push_str(&format!("&id_token={}", id_token));
    }
    if let Some(access_token) = access_token {
        post_body.push_str(&format!("&access_token={}", access_token));
    }
    if let Credential::OAuth {
        raw_nonce: Some(nonce),
        ..
    } = credential
    {
        post_body.push_str(&format!("&nonce={}", nonce));
    }
    Ok(post_body)
}

impl RestIdentityProvider {
    /// Build a provider from identity settings
    ///
    /// Fails when no API key is configured or the HTTP client cannot be built.
    pub fn new(settings: &IdentitySettings) -> Result<Self, IdentityProviderError> {
        // Validate API key (error case first)
        let Some(api_key) = settings.api_key.clone().filter(|k| !k.is_empty()) else {
            return Err(IdentityProviderError::Internal(
                "API key not configured".to_string(),
            ));
        };

        let http_client = reqwest::Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| {
                IdentityProviderError::Internal(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            inner: Arc::new(RestInner {
                api_key,
                endpoint: settings.endpoint.trim_end_matches('/').to_string(),
                http_client,
                session: RwLock::new(None),
            }),
        })
    }

    fn url(&self, method: &str) -> String {
        format!(
            "{}/accounts:{}?key={}",
            self.inner.endpoint, method, self.inner.api_key
        )
    }

    async fn post<T: DeserializeOwned>(
        &self,
        method: &str,
        body: Value,
    ) -> Result<T, IdentityProviderError> {
        let response = self
            .inner
            .http_client
            .post(self.url(method))
            .json(&body)
            .send()
            .await?;

        // Handle error responses first
        if !response.status().is_success() {
            let error_body: Value = response.json().await?;
            let error_message = error_body["error"]["message"]
                .as_str()
                .unwrap_or("UNKNOWN_ERROR");
            tracing::debug!(method, error_message, "identity toolkit rejected request");
            return Err(IdentityProviderError::from_error_code(error_message));
        }

        Ok(response.json().await?)
    }

    async fn id_token(&self) -> Result<String, IdentityProviderError> {
        self.inner
            .session
            .read()
            .await
            .as_ref()
            .map(|session| session.id_token.clone())
            .ok_or(IdentityProviderError::NoCurrentUser)
    }

    async fn start_session(
        &self,
        response: SignInResponse,
        provider_id: &str,
        is_anonymous: bool,
        created: bool,
    ) -> Result<SignInResult, IdentityProviderError> {
        let is_new_user = response.is_new_user.unwrap_or(created);
        let session = response.into_session(provider_id, is_anonymous)?;
        let user = session.user.clone();
        *self.inner.session.write().await = Some(session);
        Ok(SignInResult {
            user,
            provider_id: provider_id.to_string(),
            is_new_user,
        })
    }

    async fn update_account(&self, mut body: Value) -> Result<(), IdentityProviderError> {
        body["idToken"] = Value::String(self.id_token().await?);
        let response: UpdateResponse = self.post("update", body).await?;
        if let Some(session) = self.inner.session.write().await.as_mut() {
            response.apply(session);
        }
        Ok(())
    }

    /// Sign in with credentials and check they belong to the current user
    async fn verify_current(&self, credential: &Credential) -> Result<String, IdentityProviderError> {
        let response: SignInResponse = match credential {
            Credential::EmailPassword { email, password } => {
                self.post(
                    "signInWithPassword",
                    json!({ "email": email, "password": password, "returnSecureToken": true }),
                )
                .await?
            }
            Credential::CustomToken { token } => {
                self.post(
                    "signInWithCustomToken",
                    json!({ "token": token, "returnSecureToken": true }),
                )
                .await?
            }
            federated => {
                self.post(
                    "signInWithIdp",
                    json!({
                        "postBody": idp_post_body(federated)?,
                        "requestUri": "http://localhost",
                        "returnSecureToken": true,
                    }),
                )
                .await?
            }
        };
        let current = self
            .current_user()
            .await
            .ok_or(IdentityProviderError::NoCurrentUser)?;
        let session = response.into_session(credential.provider_id(), false)?;
        if session.user.uid != current.uid {
            return Err(IdentityProviderError::InvalidUser("USER_MISMATCH".to_string()));
        }
        Ok(session.id_token)
    }
}

#[async_trait]
impl IdentityProvider for RestIdentityProvider {
    async fn create_user_with_email_and_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<SignInResult, IdentityProviderError> {
        let response: SignInResponse = self
            .post(
                "signUp",
                json!({ "email": email, "password": password, "returnSecureToken": true }),
            )
            .await?;
        self.start_session(response, "password", false, true).await
    }

    async fn sign_in_with_email_and_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<SignInResult, IdentityProviderError> {
        let response: SignInResponse = self
            .post(
                "signInWithPassword",
                json!({ "email": email, "password": password, "returnSecureToken": true }),
            )
            .await?;
        self.start_session(response, "password", false, false).await
    }

    async fn sign_in_with_credential(
        &self,
        credential: &Credential,
    ) -> Result<SignInResult, IdentityProviderError> {
        match credential {
            Credential::EmailPassword { email, password } => {
                self.sign_in_with_email_and_password(email, password).await
            }
            Credential::Anonymous => self.sign_in_anonymously().await,
            Credential::CustomToken { token } => {
                // Error-first: validate token
                if token.is_empty() {
                    return Err(IdentityProviderError::InvalidCredentials(
                        "Custom token cannot be empty".to_string(),
                    ));
                }
                let response: SignInResponse = self
                    .post(
                        "signInWithCustomToken",
                        json!({ "token": token, "returnSecureToken": true }),
                    )
                    .await?;
                self.start_session(response, "custom", false, false).await
            }
            federated => {
                let response: SignInResponse = self
                    .post(
                        "signInWithIdp",
                        json!({
                            "postBody": idp_post_body(federated)?,
                            "requestUri": "http://localhost",
                            "returnSecureToken": true,
                            "returnIdpCredential": true,
                        }),
                    )
                    .await?;
                self.start_session(response, federated.provider_id(), false, false)
                    .await
            }
        }
    }

    async fn sign_in_anonymously(&self) -> Result<SignInResult, IdentityProviderError> {
        // signUp with no email/password creates an anonymous user
        let response: SignInResponse = self
            .post("signUp", json!({ "returnSecureToken": true }))
            .await?;
        self.start_session(response, "anonymous", true, true).await
    }

    async fn current_user(&self) -> Option<User> {
        self.inner
            .session
            .read()
            .await
            .as_ref()
            .map(|session| session.user.clone())
    }

    async fn sign_out(&self) -> Result<(), IdentityProviderError> {
        *self.inner.session.write().await = None;
        Ok(())
    }

    async fn send_email_verification(&self) -> Result<(), IdentityProviderError> {
        let id_token = self.id_token().await?;
        let _: Value = self
            .post(
                "sendOobCode",
                json!({ "requestType": "VERIFY_EMAIL", "idToken": id_token }),
            )
            .await?;
        Ok(())
    }

    async fn send_password_reset_email(&self, email: &str) -> Result<(), IdentityProviderError> {
        // Validate email (error case first)
        if email.is_empty() {
            return Err(IdentityProviderError::InvalidCredentials(
                "MISSING_EMAIL".to_string(),
            ));
        }
        let _: Value = self
            .post(
                "sendOobCode",
                json!({ "requestType": "PASSWORD_RESET", "email": email }),
            )
            .await?;
        Ok(())
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> Result<(), IdentityProviderError> {
        let mut body = json!({ "returnSecureToken": false });
        if let Some(name) = &update.display_name {
            body["displayName"] = Value::String(name.clone());
        }
        if let Some(url) = &update.photo_url {
            body["photoUrl"] = Value::String(url.clone());
        }
        self.update_account(body).await
    }

    async fn update_email(&self, new_email: &str) -> Result<(), IdentityProviderError> {
        let id_token = self.id_token().await?;
        let _: Value = self
            .post(
                "sendOobCode",
                json!({
                    "requestType": "VERIFY_AND_CHANGE_EMAIL",
                    "idToken": id_token,
                    "newEmail": new_email,
                }),
            )
            .await?;
        Ok(())
    }

    async fn update_password(&self, new_password: &str) -> Result<(), IdentityProviderError> {
        self.update_account(json!({ "password": new_password, "returnSecureToken": true }))
            .await
    }

    async fn delete_user(&self) -> Result<(), IdentityProviderError> {
        let id_token = self.id_token().await?;
        let _: Value = self.post("delete", json!({ "idToken": id_token })).await?;
        *self.inner.session.write().await = None;
        Ok(())
    }

    async fn reauthenticate(&self, credential: &Credential) -> Result<(), IdentityProviderError> {
        let id_token = self.verify_current(credential).await?;
        if let Some(session) = self.inner.session.write().await.as_mut() {
            session.id_token = id_token;
        }
        Ok(())
    }

    async fn link_with_credential(
        &self,
        credential: &Credential,
    ) -> Result<(), IdentityProviderError> {
        match credential {
            Credential::EmailPassword { email, password } => {
                self.update_account(
                    json!({ "email": email, "password": password, "returnSecureToken": true }),
                )
                .await
            }
            Credential::Anonymous | Credential::CustomToken { .. } => {
                Err(IdentityProviderError::InvalidCredentials(format!(
                    "{} credential cannot be linked",
                    credential.provider_id()
                )))
            }
            federated => {
                let id_token = self.id_token().await?;
                let response: SignInResponse = self
                    .post(
                        "signInWithIdp",
                        json!({
                            "idToken": id_token,
                            "postBody": idp_post_body(federated)?,
                            "requestUri": "http://localhost",
                            "returnSecureToken": true,
                        }),
                    )
                    .await?;
                let linked = response.into_session(federated.provider_id(), false)?;
                if let Some(session) = self.inner.session.write().await.as_mut() {
                    session.id_token = linked.id_token;
                    session.user.is_anonymous = false;
                    session
                        .user
                        .provider_ids
                        .push(federated.provider_id().to_string());
                }
                Ok(())
            }
        }
    }

    async fn unlink(&self, provider_id: &str) -> Result<(), IdentityProviderError> {
        self.update_account(json!({ "deleteProvider": [provider_id] }))
            .await
    }
}

impl std::fmt::Debug for RestIdentityProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestIdentityProvider")
            .field("endpoint", &self.inner.endpoint)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> IdentitySettings {
        IdentitySettings {
            api_key: Some("test-key".to_string()),
            endpoint: "http://localhost:9099/identitytoolkit.googleapis.com/v1/".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_new_requires_api_key() {
        let result = RestIdentityProvider::new(&IdentitySettings::default());
        assert!(matches!(result, Err(IdentityProviderError::Internal(_))));
    }

    #[test]
    fn test_url_building() {
        let provider = RestIdentityProvider::new(&settings()).unwrap();
        assert_eq!(
            provider.url("signUp"),
            "http://localhost:9099/identitytoolkit.googleapis.com/v1/accounts:signUp?key=test-key"
        );
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let provider = RestIdentityProvider::new(&settings()).unwrap();
        assert!(!format!("{:?}", provider).contains("test-key"));
    }

    #[test]
    fn test_idp_post_body() {
        let google = Credential::Google {
            id_token: Some("id-tok".to_string()),
            access_token: None,
        };
        assert_eq!(
            idp_post_body(&google).unwrap(),
            "providerId=google.com&id_token=id-tok"
        );

        let github = Credential::GitHub {
            token: "gh".to_string(),
        };
        assert_eq!(
            idp_post_body(&github).unwrap(),
            "providerId=github.com&access_token=gh"
        );
    }

    #[test]
    fn test_idp_post_body_rejects_non_federated() {
        assert!(idp_post_body(&Credential::Anonymous).is_err());
        let empty = Credential::OAuth {
            provider_id: "apple.com".to_string(),
            id_token: None,
            access_token: None,
            raw_nonce: None,
        };
        assert!(matches!(
            idp_post_body(&empty),
            Err(IdentityProviderError::InvalidCredentials(_))
        ));
    }

    #[test]
    fn test_mfa_pending_response() {
        let response: SignInResponse = serde_json::from_value(json!({
            "mfaPendingCredential": "pending",
            "mfaInfo": [],
        }))
        .unwrap();
        assert!(matches!(
            response.into_session("password", false),
            Err(IdentityProviderError::MultiFactorRequired)
        ));
    }

    #[test]
    fn test_sign_in_response_into_session() {
        let response: SignInResponse = serde_json::from_value(json!({
            "localId": "uid-1",
            "email": "ana@example.com",
            "idToken": "token",
            "refreshToken": "refresh",
            "expiresIn": "3600",
        }))
        .unwrap();
        let session = response.into_session("password", false).unwrap();
        assert_eq!(session.user.uid, "uid-1");
        assert_eq!(session.user.provider_ids, vec!["password".to_string()]);
        assert_eq!(session.id_token, "token");
    }

    #[tokio::test]
    async fn test_operations_without_session() {
        let provider = RestIdentityProvider::new(&settings()).unwrap();
        assert!(provider.current_user().await.is_none());
        assert_eq!(
            provider.send_email_verification().await,
            Err(IdentityProviderError::NoCurrentUser)
        );
        assert_eq!(
            provider.unlink("google.com").await,
            Err(IdentityProviderError::NoCurrentUser)
        );
    }
}
