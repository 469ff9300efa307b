//! Record repository aggregate and shared subscription plumbing

use crate::error::classify;
use crate::listener::ListenerStream;
use crate::record::geo::GeoRepository;
use crate::record::messages::MessageRepository;
use crate::record::presence::PresenceRepository;
use crate::record::store::{RecordQuery, RecordStore, RecordStoreError, ValueEvent};
use crate::settings::RecordLayout;
use crate::subscription::Subscription;
use async_stream::stream;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

/// Entry point to the realtime record repositories
///
/// All three repositories share one [`RecordStore`].
#[derive(Clone)]
pub struct RecordRepository {
    messages: MessageRepository,
    geo: GeoRepository,
    presence: PresenceRepository,
}

impl RecordRepository {
    /// Build the repositories over `store` with the node roots from `layout`
    pub fn new(store: Arc<dyn RecordStore>, layout: &RecordLayout) -> Self {
        Self {
            messages: MessageRepository::new(Arc::clone(&store), layout),
            geo: GeoRepository::new(Arc::clone(&store), layout),
            presence: PresenceRepository::new(store, layout),
        }
    }

    /// Messages and conversations
    pub fn messages(&self) -> &MessageRepository {
        &self.messages
    }

    /// Entity locations
    pub fn geo(&self) -> &GeoRepository {
        &self.geo
    }

    /// Entity presence
    pub fn presence(&self) -> &PresenceRepository {
        &self.presence
    }
}

impl std::fmt::Debug for RecordRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordRepository").finish_non_exhaustive()
    }
}

/// Adapt a value listener into a [`Subscription`].
///
/// Decode failures are delivered as errors and the subscription continues. A listener
/// error is delivered once and ends the subscription.
pub(crate) fn watch_node<T, F>(
    listener: ListenerStream<ValueEvent>,
    operation: &'static str,
    decode: F,
) -> Subscription<T>
where
    T: Send + 'static,
    F: Fn(Option<Value>) -> Result<T, RecordStoreError> + Send + 'static,
{
    Subscription::new(stream! {
        let mut listener = listener;
        while let Some(event) = listener.next().await {
            match event {
                Ok(value) => {
                    yield decode(value).map_err(|e| classify(operation, e));
                }
                Err(e) => {
                    yield Err(classify(operation, e));
                    break;
                }
            }
        }
    })
}

/// Decode every child of a node in key order, skipping children that do not decode
pub(crate) fn decode_children<T: DeserializeOwned>(value: Option<Value>) -> Vec<T> {
    match value {
        Some(Value::Object(children)) => decode_rows(RecordQuery::new().apply(&children)),
        _ => Vec::new(),
    }
}

pub(crate) fn decode_rows<T: DeserializeOwned>(rows: Vec<(String, Value)>) -> Vec<T> {
    rows.into_iter()
        .filter_map(|(key, child)| match serde_json::from_value(child) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                tracing::debug!(key = %key, error = %e, "skipping child that does not decode");
                None
            }
        })
        .collect()
}
