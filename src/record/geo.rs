//! Entity locations
//!
//! One leaf per entity at `{locations}/{entity_type}/{entity_id}`.

use crate::error::{classify, DataResult};
use crate::record::path::NodePath;
use crate::record::repository::watch_node;
use crate::record::store::{RecordErrorCode, RecordStore, RecordStoreError};
use crate::record::types::GeoLocation;
use crate::settings::RecordLayout;
use crate::subscription::Subscription;
use std::sync::Arc;

/// Location updates and tracking
#[derive(Clone)]
pub struct GeoRepository {
    store: Arc<dyn RecordStore>,
    root: NodePath,
}

impl GeoRepository {
    /// Repository rooted at `layout.locations`
    pub fn new(store: Arc<dyn RecordStore>, layout: &RecordLayout) -> Self {
        Self {
            store,
            root: NodePath::parse(&layout.locations),
        }
    }

    fn node(&self, entity_type: &str, entity_id: &str) -> Result<NodePath, RecordStoreError> {
        self.root.id_child(entity_type)?.id_child(entity_id)
    }

    /// Overwrite the entity's location
    pub async fn update_location(
        &self,
        entity_type: &str,
        entity_id: &str,
        location: &GeoLocation,
    ) -> DataResult<()> {
        let path = self
            .node(entity_type, entity_id)
            .map_err(|e| classify("update_location", e))?;
        let value = serde_json::to_value(location)
            .map_err(|e| classify("update_location", RecordStoreError::from(e)))?;

        self.store
            .set(&path, value)
            .await
            .map_err(|e| classify("update_location", e))?;

        tracing::debug!(%path, "location updated");
        Ok(())
    }

    /// Follow the entity's location
    ///
    /// Every value of the node is delivered. While the node is missing the subscription
    /// yields `RecordStore(OperationFailed)` and keeps listening.
    ///
    /// # Example
    /// ```no_run
    /// use firebase_facade::{Facade, InMemoryBackends};
    /// use futures::StreamExt;
    ///
    /// # async fn example() {
    /// let facade = Facade::new(InMemoryBackends::new().backends(), Default::default());
    /// let mut driver = facade.database().geo().track_location("drivers", "d-42");
    /// while let Some(Ok(location)) = driver.next().await {
    ///     println!("{}, {}", location.latitude, location.longitude);
    /// }
    /// # }
    /// ```
    pub fn track_location(&self, entity_type: &str, entity_id: &str) -> Subscription<GeoLocation> {
        let path = match self.node(entity_type, entity_id) {
            Ok(path) => path,
            Err(e) => return Subscription::failed(classify("track_location", e)),
        };
        let listener = self.store.listen(&path);

        watch_node(listener, "track_location", move |value| match value {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Err(RecordStoreError::coded(
                RecordErrorCode::OperationFailed,
                format!("No location at {path}"),
            )),
        })
    }
}

impl std::fmt::Debug for GeoRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoRepository").field("root", &self.root).finish()
    }
}
