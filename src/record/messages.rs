//! Messages and conversations
//!
//! Layout (roots from [`RecordLayout`]):
//! - `{messages}/{conversation_id}/{message_id}`: the message list
//! - `{conversations}/{conversation_id}`: canonical conversation, with a cached `lastMessage`
//! - `{user_conversations}/{user_id}/{conversation_id}`: per-participant copy (fan-out on write)
//!
//! Known limitation: [`MessageRepository::update_message_status`] patches the message only;
//! the cached `lastMessage` copy keeps its previous status.

use crate::error::{classify, DataResult};
use crate::record::path::NodePath;
use crate::record::repository::{decode_children, decode_rows, watch_node};
use crate::record::store::{RecordQuery, RecordStore, RecordStoreError};
use crate::record::types::{Conversation, Message, MessageStatus};
use crate::settings::RecordLayout;
use crate::subscription::Subscription;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Maximum number of users returned by [`MessageRepository::search_users`]
pub const USER_SEARCH_LIMIT: usize = 20;

/// Chat operations over the record store
#[derive(Clone)]
pub struct MessageRepository {
    store: Arc<dyn RecordStore>,
    messages: NodePath,
    conversations: NodePath,
    user_conversations: NodePath,
    users: NodePath,
}

fn to_value<T: Serialize>(operation: &'static str, value: &T) -> DataResult<Value> {
    serde_json::to_value(value).map_err(|e| classify(operation, RecordStoreError::from(e)))
}

impl MessageRepository {
    /// Repository over the node roots in `layout`
    pub fn new(store: Arc<dyn RecordStore>, layout: &RecordLayout) -> Self {
        Self {
            store,
            messages: NodePath::parse(&layout.messages),
            conversations: NodePath::parse(&layout.conversations),
            user_conversations: NodePath::parse(&layout.user_conversations),
            users: NodePath::parse(&layout.users),
        }
    }

    /// Send a message to a conversation
    ///
    /// Assigns a fresh push key as the message id and stamps `status = Sent`. The message
    /// and the conversation's `lastMessage` are written in one atomic multi-path update.
    ///
    /// # Example
    /// ```no_run
    /// use firebase_facade::record::Message;
    /// use firebase_facade::{Facade, InMemoryBackends};
    ///
    /// # async fn example() -> Result<(), firebase_facade::AppError> {
    /// let facade = Facade::new(InMemoryBackends::new().backends(), Default::default());
    /// facade
    ///     .database()
    ///     .messages()
    ///     .send_message("c1", Message::new("alice", "hello"))
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn send_message(&self, conversation_id: &str, message: Message) -> DataResult<()> {
        let message_node = self
            .messages
            .id_child(conversation_id)
            .map_err(|e| classify("send_message", e))?;
        let conversation_node = self
            .conversations
            .id_child(conversation_id)
            .map_err(|e| classify("send_message", e))?;

        let message_id = self.store.generate_key();
        let message = Message {
            id: message_id.clone(),
            status: MessageStatus::Sent,
            ..message
        };
        let value = to_value("send_message", &message)?;

        let updates = BTreeMap::from([
            (message_node.child(&message_id), value.clone()),
            (conversation_node.child("lastMessage"), value),
        ]);
        self.store
            .update_children(updates)
            .await
            .map_err(|e| classify("send_message", e))?;

        tracing::debug!(conversation_id, message_id = %message_id, "message sent");
        Ok(())
    }

    /// Follow the full message list of a conversation
    ///
    /// Every change re-delivers the whole list in key order (oldest first). A conversation
    /// with no messages yields an empty list.
    pub fn get_messages(&self, conversation_id: &str) -> Subscription<Vec<Message>> {
        let path = match self.messages.id_child(conversation_id) {
            Ok(path) => path,
            Err(e) => return Subscription::failed(classify("get_messages", e)),
        };
        let listener = self.store.listen(&path);
        watch_node(listener, "get_messages", |value| Ok(decode_children(value)))
    }

    /// One page of history in key order
    ///
    /// Returns at most `limit` messages: the last ones strictly before `before_message_id`,
    /// or the latest ones when it is `None`.
    pub async fn get_message_history(
        &self,
        conversation_id: &str,
        before_message_id: Option<&str>,
        limit: usize,
    ) -> DataResult<Vec<Message>> {
        let path = self
            .messages
            .id_child(conversation_id)
            .map_err(|e| classify("get_message_history", e))?;
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut query = RecordQuery::new().order_by_key().limit_to_last(limit);
        if let Some(before) = before_message_id {
            query = query.end_before(before);
        }

        let rows = self
            .store
            .query(&path, &query)
            .await
            .map_err(|e| classify("get_message_history", e))?;
        Ok(decode_rows(rows))
    }

    /// Follow the conversations indexed under `user_id`
    pub fn get_conversations(&self, user_id: &str) -> Subscription<Vec<Conversation>> {
        let path = match self.user_conversations.id_child(user_id) {
            Ok(path) => path,
            Err(e) => return Subscription::failed(classify("get_conversations", e)),
        };
        let listener = self.store.listen(&path);
        watch_node(listener, "get_conversations", |value| Ok(decode_children(value)))
    }

    /// Create a conversation and index it under every participant
    ///
    /// The canonical record and each participant's copy are written in one atomic update.
    /// Returns the generated conversation id.
    pub async fn create_conversation(&self, conversation: Conversation) -> DataResult<String> {
        let conversation_id = self.store.generate_key();
        let conversation = Conversation {
            id: conversation_id.clone(),
            ..conversation
        };
        let value = to_value("create_conversation", &conversation)?;

        let mut updates = BTreeMap::new();
        updates.insert(self.conversations.child(&conversation_id), value.clone());
        for participant in &conversation.participants {
            let index = self
                .user_conversations
                .id_child(participant)
                .map_err(|e| classify("create_conversation", e))?;
            updates.insert(index.child(&conversation_id), value.clone());
        }

        self.store
            .update_children(updates)
            .await
            .map_err(|e| classify("create_conversation", e))?;

        tracing::debug!(
            conversation_id = %conversation_id,
            participants = conversation.participants.len(),
            "conversation created"
        );
        Ok(conversation_id)
    }

    /// Set the status of one message
    pub async fn update_message_status(
        &self,
        conversation_id: &str,
        message_id: &str,
        status: MessageStatus,
    ) -> DataResult<()> {
        let node = self
            .messages
            .id_child(conversation_id)
            .and_then(|conversation| conversation.id_child(message_id))
            .map_err(|e| classify("update_message_status", e))?;
        let value = to_value("update_message_status", &status)?;
        let updates = BTreeMap::from([(node.child("status"), value)]);

        self.store
            .update_children(updates)
            .await
            .map_err(|e| classify("update_message_status", e))
    }

    /// Users whose `name` starts with `prefix`, at most [`USER_SEARCH_LIMIT`], ordered by name
    ///
    /// Profiles are returned as stored; the record store has no fixed user schema.
    pub async fn search_users(&self, prefix: &str) -> DataResult<Vec<Value>> {
        let query = RecordQuery::new()
            .order_by_child("name")
            .start_at(prefix)
            .end_at(format!("{prefix}\u{f8ff}"))
            .limit_to_first(USER_SEARCH_LIMIT);

        let rows = self
            .store
            .query(&self.users, &query)
            .await
            .map_err(|e| classify("search_users", e))?;
        Ok(rows.into_iter().map(|(_, user)| user).collect())
    }
}

impl std::fmt::Debug for MessageRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageRepository")
            .field("messages", &self.messages)
            .field("conversations", &self.conversations)
            .finish_non_exhaustive()
    }
}
