//! Entity presence
//!
//! `{presence}/{entity_type}/{entity_id}` holds a [`PresenceState`]. Going online arms a
//! disconnect hook so the server flips the node to offline if the client vanishes.

use crate::error::{classify, DataResult};
use crate::record::path::NodePath;
use crate::record::repository::watch_node;
use crate::record::store::{RecordStore, RecordStoreError};
use crate::record::types::PresenceState;
use crate::settings::RecordLayout;
use crate::subscription::Subscription;
use serde_json::Value;
use std::sync::Arc;

/// Presence operations
#[derive(Clone)]
pub struct PresenceRepository {
    store: Arc<dyn RecordStore>,
    root: NodePath,
}

fn presence_value(operation: &'static str, state: PresenceState) -> DataResult<Value> {
    serde_json::to_value(state).map_err(|e| classify(operation, RecordStoreError::from(e)))
}

impl PresenceRepository {
    /// Repository rooted at `layout.presence`
    pub fn new(store: Arc<dyn RecordStore>, layout: &RecordLayout) -> Self {
        Self {
            store,
            root: NodePath::parse(&layout.presence),
        }
    }

    fn node(&self, entity_type: &str, entity_id: &str) -> Result<NodePath, RecordStoreError> {
        self.root.id_child(entity_type)?.id_child(entity_id)
    }

    /// Mark the entity online and arm the offline disconnect hook
    ///
    /// The hook is armed before the online write, so a connection lost in between still
    /// leaves the entity offline.
    pub async fn go_online(&self, entity_type: &str, entity_id: &str) -> DataResult<()> {
        let path = self
            .node(entity_type, entity_id)
            .map_err(|e| classify("go_online", e))?;
        let offline = presence_value("go_online", PresenceState::offline())?;
        let online = presence_value("go_online", PresenceState::online())?;

        self.store
            .on_disconnect_set(&path, offline)
            .await
            .map_err(|e| classify("go_online", e))?;
        self.store
            .set(&path, online)
            .await
            .map_err(|e| classify("go_online", e))?;

        tracing::debug!(%path, "presence online");
        Ok(())
    }

    /// Disarm the disconnect hook, then mark the entity offline
    pub async fn go_offline(&self, entity_type: &str, entity_id: &str) -> DataResult<()> {
        let path = self
            .node(entity_type, entity_id)
            .map_err(|e| classify("go_offline", e))?;
        let offline = presence_value("go_offline", PresenceState::offline())?;

        // Order matters: disarm, then write
        self.store
            .cancel_on_disconnect(&path)
            .await
            .map_err(|e| classify("go_offline", e))?;
        self.store
            .set(&path, offline)
            .await
            .map_err(|e| classify("go_offline", e))?;

        tracing::debug!(%path, "presence offline");
        Ok(())
    }

    /// Follow the entity's presence
    ///
    /// A missing node means the entity never connected and is delivered as offline.
    pub fn track_presence(&self, entity_type: &str, entity_id: &str) -> Subscription<PresenceState> {
        let path = match self.node(entity_type, entity_id) {
            Ok(path) => path,
            Err(e) => return Subscription::failed(classify("track_presence", e)),
        };
        let listener = self.store.listen(&path);
        watch_node(listener, "track_presence", |value| match value {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(PresenceState::offline()),
        })
    }
}

impl std::fmt::Debug for PresenceRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceRepository")
            .field("root", &self.root)
            .finish()
    }
}
