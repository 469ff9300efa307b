//! Records stored in the realtime tree
//!
//! Field names on the wire are camelCase to stay compatible with the mobile clients that
//! share the database. Missing fields fall back to their defaults when decoding.

use serde::{Deserialize, Serialize};

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Delivery status of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageStatus {
    /// Queued on the sender's device
    #[default]
    Sending,
    /// Written to the store
    Sent,
    /// Received by the recipient's device
    Delivered,
    /// Seen by the recipient
    Read,
    /// Could not be sent
    Failed,
}

/// A single chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Message {
    /// Child key under the conversation
    #[serde(rename = "messageId")]
    pub id: String,
    /// Author
    pub sender_id: String,
    /// Text body
    pub content: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    /// Delivery status
    pub status: MessageStatus,
}

impl Default for Message {
    fn default() -> Self {
        Self {
            id: String::new(),
            sender_id: String::new(),
            content: String::new(),
            timestamp: now_millis(),
            status: MessageStatus::Sending,
        }
    }
}

impl Message {
    /// New outgoing message stamped with the current time
    pub fn new(sender_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            sender_id: sender_id.into(),
            content: content.into(),
            ..Self::default()
        }
    }
}

/// Kind of conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversationType {
    /// Two participants
    #[default]
    OneToOne,
    /// Many participants
    Group,
    /// A user and a support agent
    Support,
}

/// A conversation and its cached last message
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Conversation {
    /// Conversation key
    #[serde(rename = "conversationId")]
    pub id: String,
    /// Kind of conversation
    #[serde(rename = "type")]
    pub kind: ConversationType,
    /// Participant ids, in the order given at creation
    pub participants: Vec<String>,
    /// Copy of the most recent message, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message: Option<Message>,
    /// Unread message counter
    pub unread_count: u32,
}

impl Conversation {
    /// New conversation between `participants`
    pub fn new(kind: ConversationType, participants: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            kind,
            participants: participants.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

/// Online state of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PresenceState {
    /// Whether the entity is connected
    pub is_online: bool,
    /// Milliseconds since the Unix epoch of the last change
    pub last_seen: i64,
}

impl Default for PresenceState {
    fn default() -> Self {
        Self {
            is_online: false,
            last_seen: now_millis(),
        }
    }
}

impl PresenceState {
    /// Online as of now
    pub fn online() -> Self {
        Self {
            is_online: true,
            ..Self::default()
        }
    }

    /// Offline as of now
    pub fn offline() -> Self {
        Self::default()
    }
}

/// Geographic position of an entity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoLocation {
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

impl Default for GeoLocation {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

impl GeoLocation {
    /// Position stamped with the current time
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            timestamp: now_millis(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_wire_format() {
        let message = Message {
            id: "m1".to_string(),
            sender_id: "alice".to_string(),
            content: "hi".to_string(),
            timestamp: 42,
            status: MessageStatus::Sent,
        };
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({ "messageId": "m1", "senderId": "alice", "content": "hi", "timestamp": 42, "status": "SENT" })
        );
    }

    #[test]
    fn test_conversation_decodes_with_defaults() {
        let conversation: Conversation =
            serde_json::from_value(json!({ "conversationId": "c1", "type": "GROUP" })).unwrap();
        assert_eq!(conversation.kind, ConversationType::Group);
        assert!(conversation.participants.is_empty());
        assert!(conversation.last_message.is_none());
    }

    #[test]
    fn test_presence_wire_format() {
        let value = serde_json::to_value(PresenceState { is_online: true, last_seen: 7 }).unwrap();
        assert_eq!(value, json!({ "isOnline": true, "lastSeen": 7 }));
    }
}
