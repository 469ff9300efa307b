//! In-process identity provider
//!
//! Accounts live in a map behind a mutex. Emails are not delivered; they land in an outbox
//! that tests can inspect and "follow".

use crate::auth::provider::{IdentityProvider, IdentityProviderError};
use crate::auth::types::{Credential, ProfileUpdate, SignInResult, User};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Shortest password the in-memory provider accepts
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Kind of email the provider sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmailKind {
    /// Address verification after registration
    Verification,
    /// Password reset link
    PasswordReset,
    /// Link that confirms an email change
    VerifyAndChangeEmail,
}

/// An email sitting in the outbox
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    /// What the email is for
    pub kind: EmailKind,
    /// Recipient
    pub to: String,
}

/// In-memory [`IdentityProvider`]
///
/// Cloning shares the same accounts.
///
/// # Example
/// ```
/// use firebase_facade::auth::{IdentityProvider, InMemoryIdentityProvider};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let provider = InMemoryIdentityProvider::new();
/// let result = provider
///     .create_user_with_email_and_password("alice@example.com", "secret1")
///     .await?;
/// assert!(result.is_new_user);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct InMemoryIdentityProvider {
    inner: Arc<Mutex<Accounts>>,
}

#[derive(Default)]
struct Accounts {
    by_uid: HashMap<String, Account>,
    by_email: HashMap<String, String>,
    federated: HashMap<(String, String), String>,
    current: Option<String>,
    recent_login: bool,
    faults: VecDeque<IdentityProviderError>,
    sign_out_faults: VecDeque<IdentityProviderError>,
    email_faults: VecDeque<IdentityProviderError>,
    outbox: Vec<SentEmail>,
}

struct Account {
    user: User,
    password: Option<String>,
    pending_email: Option<String>,
}

impl Accounts {
    fn take_fault(&mut self) -> Result<(), IdentityProviderError> {
        match self.faults.pop_front() {
            Some(fault) => Err(fault),
            None => Ok(()),
        }
    }

    /// Queue an email, unless delivery is set to fail
    fn deliver(&mut self, kind: EmailKind, to: String) -> Result<(), IdentityProviderError> {
        if let Some(fault) = self.email_faults.pop_front() {
            return Err(fault);
        }
        self.outbox.push(SentEmail { kind, to });
        Ok(())
    }

    fn current_uid(&self) -> Result<String, IdentityProviderError> {
        self.current
            .clone()
            .filter(|uid| self.by_uid.contains_key(uid))
            .ok_or(IdentityProviderError::NoCurrentUser)
    }

    fn current_account(&mut self) -> Result<&mut Account, IdentityProviderError> {
        let uid = self.current_uid()?;
        self.by_uid
            .get_mut(&uid)
            .ok_or(IdentityProviderError::NoCurrentUser)
    }

    /// Sensitive operations need a signed-in user who authenticated recently
    fn sensitive_uid(&self) -> Result<String, IdentityProviderError> {
        let uid = self.current_uid()?;
        if !self.recent_login {
            return Err(IdentityProviderError::RecentLoginRequired);
        }
        Ok(uid)
    }

    fn sign_in(&mut self, uid: &str, provider_id: &str, is_new_user: bool) -> SignInResult {
        self.current = Some(uid.to_string());
        self.recent_login = true;
        let user = match self.by_uid.get_mut(uid) {
            Some(account) => {
                account.user.metadata.last_sign_in_timestamp =
                    chrono::Utc::now().timestamp_millis();
                account.user.clone()
            }
            None => User::new(uid),
        };
        SignInResult {
            user,
            provider_id: provider_id.to_string(),
            is_new_user,
        }
    }

    fn insert(&mut self, user: User, password: Option<String>) -> String {
        let uid = user.uid.clone();
        if let Some(email) = &user.email {
            self.by_email.insert(email.clone(), uid.clone());
        }
        self.by_uid.insert(
            uid.clone(),
            Account {
                user,
                password,
                pending_email: None,
            },
        );
        uid
    }

    fn check_password(&self, email: &str, password: &str) -> Result<String, IdentityProviderError> {
        let uid = self
            .by_email
            .get(email)
            .ok_or_else(|| IdentityProviderError::InvalidUser("EMAIL_NOT_FOUND".to_string()))?;
        let account = self
            .by_uid
            .get(uid)
            .ok_or_else(|| IdentityProviderError::InvalidUser("USER_NOT_FOUND".to_string()))?;
        if account.password.as_deref() != Some(password) {
            return Err(IdentityProviderError::InvalidCredentials(
                "INVALID_PASSWORD".to_string(),
            ));
        }
        Ok(uid.clone())
    }
}

fn new_uid() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

fn validate_email(email: &str) -> Result<(), IdentityProviderError> {
    // Error-first: the provider only checks the shape of the address
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid {
        return Err(IdentityProviderError::InvalidCredentials(
            "INVALID_EMAIL".to_string(),
        ));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), IdentityProviderError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(IdentityProviderError::WeakPassword(format!(
            "Password should be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

fn federated_key(credential: &Credential) -> Result<(String, String), IdentityProviderError> {
    let subject = credential.subject().filter(|s| !s.is_empty()).ok_or_else(|| {
        IdentityProviderError::InvalidCredentials(format!(
            "{} credential requires a token",
            credential.provider_id()
        ))
    })?;
    Ok((credential.provider_id().to_string(), subject.to_string()))
}

impl InMemoryIdentityProvider {
    /// Provider with no accounts
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next provider call fail with `error`
    pub fn fail_next(&self, error: IdentityProviderError) {
        self.lock().faults.push_back(error);
    }

    /// Make the next remote sign-out fail with `error`; the local session still ends
    pub fn fail_next_sign_out(&self, error: IdentityProviderError) {
        self.lock().sign_out_faults.push_back(error);
    }

    /// Make the next email delivery fail with `error`
    pub fn fail_next_email(&self, error: IdentityProviderError) {
        self.lock().email_faults.push_back(error);
    }

    /// Age the current sign-in so sensitive operations require re-authentication
    pub fn expire_recent_login(&self) {
        self.lock().recent_login = false;
    }

    /// Emails sent so far, oldest first
    pub fn sent_emails(&self) -> Vec<SentEmail> {
        self.lock().outbox.clone()
    }

    /// Follow the newest link sent to `email`, as the user clicking it would.
    ///
    /// Verifies the address, or completes a pending email change. Returns `false` if no
    /// such link exists.
    pub fn follow_email_link(&self, email: &str) -> bool {
        let mut accounts = self.lock();
        let Some(sent) = accounts
            .outbox
            .iter()
            .rev()
            .find(|sent| sent.to == email && sent.kind != EmailKind::PasswordReset)
            .cloned()
        else {
            return false;
        };

        match sent.kind {
            EmailKind::Verification => {
                let Some(uid) = accounts.by_email.get(email).cloned() else {
                    return false;
                };
                match accounts.by_uid.get_mut(&uid) {
                    Some(account) => {
                        account.user.email_verified = true;
                        true
                    }
                    None => false,
                }
            }
            EmailKind::VerifyAndChangeEmail => {
                let Some((uid, old_email)) = accounts.by_uid.iter().find_map(|(uid, account)| {
                    (account.pending_email.as_deref() == Some(email))
                        .then(|| (uid.clone(), account.user.email.clone()))
                }) else {
                    return false;
                };
                if let Some(old) = old_email {
                    accounts.by_email.remove(&old);
                }
                accounts.by_email.insert(email.to_string(), uid.clone());
                if let Some(account) = accounts.by_uid.get_mut(&uid) {
                    account.pending_email = None;
                    account.user.email = Some(email.to_string());
                    account.user.email_verified = true;
                }
                true
            }
            EmailKind::PasswordReset => false,
        }
    }

    /// Stored account for `uid`
    pub fn account(&self, uid: &str) -> Option<User> {
        self.lock().by_uid.get(uid).map(|account| account.user.clone())
    }

    /// Number of accounts
    pub fn account_count(&self) -> usize {
        self.lock().by_uid.len()
    }

    fn lock(&self) -> MutexGuard<'_, Accounts> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self) -> Result<MutexGuard<'_, Accounts>, IdentityProviderError> {
        let mut accounts = self.lock();
        accounts.take_fault()?;
        Ok(accounts)
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn create_user_with_email_and_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<SignInResult, IdentityProviderError> {
        let mut accounts = self.begin()?;
        validate_email(email)?;
        validate_password(password)?;
        if accounts.by_email.contains_key(email) {
            return Err(IdentityProviderError::UserCollision("EMAIL_EXISTS".to_string()));
        }

        let mut user = User::new(new_uid());
        user.email = Some(email.to_string());
        user.provider_ids.push("password".to_string());
        let uid = accounts.insert(user, Some(password.to_string()));
        tracing::debug!(%uid, "account created");
        Ok(accounts.sign_in(&uid, "password", true))
    }

    async fn sign_in_with_email_and_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<SignInResult, IdentityProviderError> {
        let mut accounts = self.begin()?;
        validate_email(email)?;
        let uid = accounts.check_password(email, password)?;
        Ok(accounts.sign_in(&uid, "password", false))
    }

    async fn sign_in_with_credential(
        &self,
        credential: &Credential,
    ) -> Result<SignInResult, IdentityProviderError> {
        match credential {
            Credential::EmailPassword { email, password } => {
                return self.sign_in_with_email_and_password(email, password).await;
            }
            Credential::Anonymous => return self.sign_in_anonymously().await,
            _ => {}
        }

        let mut accounts = self.begin()?;
        let key = federated_key(credential)?;
        let provider_id = key.0.clone();
        if let Some(uid) = accounts.federated.get(&key).cloned() {
            return Ok(accounts.sign_in(&uid, &provider_id, false));
        }

        // Unseen federated identity: the provider creates the account on first sign-in
        let mut user = User::new(new_uid());
        user.provider_ids.push(provider_id.clone());
        let uid = accounts.insert(user, None);
        accounts.federated.insert(key, uid.clone());
        Ok(accounts.sign_in(&uid, &provider_id, true))
    }

    async fn sign_in_anonymously(&self) -> Result<SignInResult, IdentityProviderError> {
        let mut accounts = self.begin()?;
        let mut user = User::new(new_uid());
        user.is_anonymous = true;
        let uid = accounts.insert(user, None);
        Ok(accounts.sign_in(&uid, "anonymous", true))
    }

    async fn current_user(&self) -> Option<User> {
        let accounts = self.lock();
        let uid = accounts.current.as_ref()?;
        accounts.by_uid.get(uid).map(|account| account.user.clone())
    }

    async fn sign_out(&self) -> Result<(), IdentityProviderError> {
        let mut accounts = self.lock();
        accounts.current = None;
        accounts.recent_login = false;
        match accounts.sign_out_faults.pop_front() {
            Some(fault) => Err(fault),
            None => accounts.take_fault(),
        }
    }

    async fn send_email_verification(&self) -> Result<(), IdentityProviderError> {
        let mut accounts = self.begin()?;
        let email = accounts
            .current_account()?
            .user
            .email
            .clone()
            .ok_or_else(|| IdentityProviderError::Email("INVALID_RECIPIENT_EMAIL".to_string()))?;
        accounts.deliver(EmailKind::Verification, email)
    }

    async fn send_password_reset_email(&self, email: &str) -> Result<(), IdentityProviderError> {
        let mut accounts = self.begin()?;
        validate_email(email)?;
        if !accounts.by_email.contains_key(email) {
            return Err(IdentityProviderError::InvalidUser("EMAIL_NOT_FOUND".to_string()));
        }
        accounts.deliver(EmailKind::PasswordReset, email.to_string())
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> Result<(), IdentityProviderError> {
        let mut accounts = self.begin()?;
        let account = accounts.current_account()?;
        if let Some(name) = &update.display_name {
            account.user.display_name = Some(name.clone());
        }
        if let Some(url) = &update.photo_url {
            account.user.photo_url = Some(url.clone());
        }
        Ok(())
    }

    async fn update_email(&self, new_email: &str) -> Result<(), IdentityProviderError> {
        let mut accounts = self.begin()?;
        let uid = accounts.sensitive_uid()?;
        validate_email(new_email)?;
        if accounts.by_email.contains_key(new_email) {
            return Err(IdentityProviderError::UserCollision("EMAIL_EXISTS".to_string()));
        }
        accounts.deliver(EmailKind::VerifyAndChangeEmail, new_email.to_string())?;
        if let Some(account) = accounts.by_uid.get_mut(&uid) {
            account.pending_email = Some(new_email.to_string());
        }
        Ok(())
    }

    async fn update_password(&self, new_password: &str) -> Result<(), IdentityProviderError> {
        let mut accounts = self.begin()?;
        let uid = accounts.sensitive_uid()?;
        validate_password(new_password)?;
        if let Some(account) = accounts.by_uid.get_mut(&uid) {
            account.password = Some(new_password.to_string());
        }
        Ok(())
    }

    async fn delete_user(&self) -> Result<(), IdentityProviderError> {
        let mut accounts = self.begin()?;
        let uid = accounts.sensitive_uid()?;
        if let Some(account) = accounts.by_uid.remove(&uid) {
            if let Some(email) = account.user.email {
                accounts.by_email.remove(&email);
            }
        }
        accounts.federated.retain(|_, owner| *owner != uid);
        accounts.current = None;
        accounts.recent_login = false;
        tracing::debug!(%uid, "account deleted");
        Ok(())
    }

    async fn reauthenticate(&self, credential: &Credential) -> Result<(), IdentityProviderError> {
        let mut accounts = self.begin()?;
        let uid = accounts.current_uid()?;
        let proven = match credential {
            Credential::EmailPassword { email, password } => {
                accounts.check_password(email, password)?
            }
            Credential::Anonymous => {
                return Err(IdentityProviderError::InvalidCredentials(
                    "anonymous credential cannot re-authenticate".to_string(),
                ));
            }
            federated => {
                let key = federated_key(federated)?;
                accounts.federated.get(&key).cloned().ok_or_else(|| {
                    IdentityProviderError::InvalidCredentials("INVALID_IDP_RESPONSE".to_string())
                })?
            }
        };
        if proven != uid {
            return Err(IdentityProviderError::InvalidUser("USER_MISMATCH".to_string()));
        }
        accounts.recent_login = true;
        Ok(())
    }

    async fn link_with_credential(
        &self,
        credential: &Credential,
    ) -> Result<(), IdentityProviderError> {
        let mut accounts = self.begin()?;
        let uid = accounts.sensitive_uid()?;
        match credential {
            Credential::EmailPassword { email, password } => {
                validate_email(email)?;
                validate_password(password)?;
                if accounts.by_email.contains_key(email.as_str()) {
                    return Err(IdentityProviderError::UserCollision("EMAIL_EXISTS".to_string()));
                }
                accounts.by_email.insert(email.clone(), uid.clone());
                if let Some(account) = accounts.by_uid.get_mut(&uid) {
                    account.password = Some(password.clone());
                    account.user.email = Some(email.clone());
                    account.user.is_anonymous = false;
                    account.user.provider_ids.push("password".to_string());
                }
            }
            Credential::Anonymous => {
                return Err(IdentityProviderError::InvalidCredentials(
                    "anonymous credential cannot be linked".to_string(),
                ));
            }
            federated => {
                let key = federated_key(federated)?;
                if accounts.federated.contains_key(&key) {
                    return Err(IdentityProviderError::UserCollision(
                        "CREDENTIAL_ALREADY_IN_USE".to_string(),
                    ));
                }
                let provider_id = key.0.clone();
                accounts.federated.insert(key, uid.clone());
                if let Some(account) = accounts.by_uid.get_mut(&uid) {
                    account.user.is_anonymous = false;
                    account.user.provider_ids.push(provider_id);
                }
            }
        }
        Ok(())
    }

    async fn unlink(&self, provider_id: &str) -> Result<(), IdentityProviderError> {
        let mut accounts = self.begin()?;
        let uid = accounts.sensitive_uid()?;
        let account = accounts
            .by_uid
            .get_mut(&uid)
            .ok_or(IdentityProviderError::NoCurrentUser)?;
        if !account.user.provider_ids.iter().any(|p| p == provider_id) {
            return Err(IdentityProviderError::Rejected {
                code: "NO_SUCH_PROVIDER".to_string(),
            });
        }
        account.user.provider_ids.retain(|p| p != provider_id);
        if provider_id == "password" {
            account.password = None;
        }
        accounts
            .federated
            .retain(|(provider, _), owner| !(provider == provider_id && *owner == uid));
        Ok(())
    }
}
