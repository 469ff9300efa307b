//! Facade settings
//!
//! Node layout of the record store, identity endpoint configuration and the log directive.
//! Defaults match the layout used by the mobile clients this facade was written for.

use serde::Deserialize;
use std::time::Duration;

/// Node roots inside the realtime record store
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RecordLayout {
    /// Messages per conversation: `{messages}/{conversation_id}/{message_id}`
    pub messages: String,
    /// Canonical conversations: `{conversations}/{conversation_id}`
    pub conversations: String,
    /// Per-user fan-out index: `{user_conversations}/{user_id}/{conversation_id}`
    pub user_conversations: String,
    /// Locations: `{locations}/{entity_type}/{entity_id}`
    pub locations: String,
    /// Presence: `{presence}/{entity_type}/{entity_id}`
    pub presence: String,
    /// User profiles searched by name
    pub users: String,
}

impl Default for RecordLayout {
    fn default() -> Self {
        Self {
            messages: "messages".to_string(),
            conversations: "conversations".to_string(),
            user_conversations: "user-conversations".to_string(),
            locations: "locations".to_string(),
            presence: "presence".to_string(),
            users: "users".to_string(),
        }
    }
}

/// Settings for the REST identity provider
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct IdentitySettings {
    /// Web API key of the project
    pub api_key: Option<String>,

    /// Base URL of the Identity Toolkit API
    ///
    /// Default: "https://identitytoolkit.googleapis.com/v1"
    pub endpoint: String,

    /// HTTP request timeout in seconds
    ///
    /// Default: 30
    pub timeout_secs: u64,
}

impl Default for IdentitySettings {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: "https://identitytoolkit.googleapis.com/v1".to_string(),
            timeout_secs: 30,
        }
    }
}

impl IdentitySettings {
    /// Request timeout as a [`Duration`]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Settings for the whole facade
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Record store node layout
    pub layout: RecordLayout,

    /// Entity type under which signed-in users publish presence
    ///
    /// Default: "users"
    pub presence_entity_type: String,

    /// Identity provider settings
    pub identity: IdentitySettings,

    /// Default `tracing` filter directive when `RUST_LOG` is unset
    ///
    /// Default: "info"
    pub log_directive: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            layout: RecordLayout::default(),
            presence_entity_type: "users".to_string(),
            identity: IdentitySettings::default(),
            log_directive: "info".to_string(),
        }
    }
}

impl Settings {
    /// Creates default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overlaid with environment variables
    ///
    /// - `FIREBASE_API_KEY` → `identity.api_key`
    /// - `FIREBASE_AUTH_ENDPOINT` → `identity.endpoint`
    /// - `FACADE_PRESENCE_ENTITY` → `presence_entity_type`
    /// - `FACADE_LOG` → `log_directive`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with values from `lookup` (same keys as [`Settings::from_env`])
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut settings = Self::default();
        if let Some(api_key) = lookup("FIREBASE_API_KEY").filter(|v| !v.is_empty()) {
            settings.identity.api_key = Some(api_key);
        }
        if let Some(endpoint) = lookup("FIREBASE_AUTH_ENDPOINT") {
            settings.identity.endpoint = endpoint.trim_end_matches('/').to_string();
        }
        if let Some(entity) = lookup("FACADE_PRESENCE_ENTITY") {
            settings.presence_entity_type = entity;
        }
        if let Some(directive) = lookup("FACADE_LOG") {
            settings.log_directive = directive;
        }
        settings
    }

    /// Parse settings from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
