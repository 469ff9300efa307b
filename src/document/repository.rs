//! Typed document repository
//!
//! Payloads are any serde type that serializes to a map. Subscriptions end after
//! delivering a store error (for example, access revoked mid-stream).

use crate::document::filter::{build_query, Filter};
use crate::document::store::{DocumentSnapshot, DocumentStore, DocumentStoreError, Fields};
use crate::error::{classify, DataResult};
use crate::subscription::Subscription;
use async_stream::stream;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// CRUD, queries and listeners over a [`DocumentStore`]
#[derive(Clone)]
pub struct DocumentRepository {
    store: Arc<dyn DocumentStore>,
}

fn to_fields<T: Serialize>(data: &T) -> Result<Fields, DocumentStoreError> {
    match serde_json::to_value(data)? {
        Value::Object(fields) => Ok(fields),
        other => Err(DocumentStoreError::Serialization(format!(
            "document data must serialize to a map, got {other}"
        ))),
    }
}

fn decode<T: DeserializeOwned>(document: DocumentSnapshot) -> Result<T, DocumentStoreError> {
    Ok(serde_json::from_value(Value::Object(document.data))?)
}

fn decode_all<T: DeserializeOwned>(
    documents: Vec<DocumentSnapshot>,
) -> Result<Vec<T>, DocumentStoreError> {
    documents.into_iter().map(decode).collect()
}

impl DocumentRepository {
    /// Repository over `store`
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Store `data` as a new document and return its id
    ///
    /// Uses `custom_id` when given (overwriting any document with that id), otherwise a
    /// generated id.
    ///
    /// # Example
    /// ```no_run
    /// use firebase_facade::{Facade, InMemoryBackends};
    /// use serde::{Deserialize, Serialize};
    ///
    /// #[derive(Serialize, Deserialize)]
    /// struct City {
    ///     name: String,
    ///     population: u64,
    /// }
    ///
    /// # async fn example() -> Result<(), firebase_facade::AppError> {
    /// let facade = Facade::new(InMemoryBackends::new().backends(), Default::default());
    /// let city = City { name: "Recife".to_string(), population: 1_500_000 };
    /// let id = facade.documents().add_document("cities", &city, None).await?;
    /// let stored: Option<City> = facade.documents().get_document("cities", &id).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn add_document<T: Serialize + Sync>(
        &self,
        collection: &str,
        data: &T,
        custom_id: Option<&str>,
    ) -> DataResult<String> {
        let fields = to_fields(data).map_err(|e| classify("add_document", e))?;
        let id = match custom_id {
            Some(id) => id.to_string(),
            None => self.store.generate_id(),
        };

        self.store
            .set(collection, &id, fields)
            .await
            .map_err(|e| classify("add_document", e))?;

        tracing::debug!(collection, id = %id, "document added");
        Ok(id)
    }

    /// Read one document; `Ok(None)` when it does not exist
    pub async fn get_document<T: DeserializeOwned>(
        &self,
        collection: &str,
        document_id: &str,
    ) -> DataResult<Option<T>> {
        let document = self
            .store
            .get(collection, document_id)
            .await
            .map_err(|e| classify("get_document", e))?;

        document
            .map(decode)
            .transpose()
            .map_err(|e| classify("get_document", e))
    }

    /// Merge `fields` into an existing document
    ///
    /// Keys may be dotted paths into nested maps. Fails with
    /// `DocumentStore(DocumentNotFound)` if the document does not exist.
    pub async fn update_document(
        &self,
        collection: &str,
        document_id: &str,
        fields: Fields,
    ) -> DataResult<()> {
        self.store
            .update(collection, document_id, fields)
            .await
            .map_err(|e| classify("update_document", e))
    }

    /// Delete one document
    pub async fn delete_document(&self, collection: &str, document_id: &str) -> DataResult<()> {
        self.store
            .delete(collection, document_id)
            .await
            .map_err(|e| classify("delete_document", e))
    }

    /// Documents matching every filter, ordered by id
    ///
    /// An empty filter list returns the whole collection.
    pub async fn find_documents<T: DeserializeOwned>(
        &self,
        collection: &str,
        filters: &[Filter],
    ) -> DataResult<Vec<T>> {
        let query = build_query(collection, filters);
        let documents = self
            .store
            .run_query(&query)
            .await
            .map_err(|e| classify("find_documents", e))?;

        decode_all(documents).map_err(|e| classify("find_documents", e))
    }

    /// Follow one document; `None` while it does not exist
    pub fn listen_to_document<T>(&self, collection: &str, document_id: &str) -> Subscription<Option<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let mut listener = self.store.listen_document(collection, document_id);
        Subscription::new(stream! {
            while let Some(event) = listener.next().await {
                match event {
                    Ok(document) => {
                        yield document
                            .map(decode)
                            .transpose()
                            .map_err(|e| classify("listen_to_document", e));
                    }
                    Err(e) => {
                        yield Err(classify("listen_to_document", e));
                        break;
                    }
                }
            }
        })
    }

    /// Follow the documents matching every filter
    ///
    /// Each change re-delivers the complete matching set.
    pub fn listen_to_collection<T>(&self, collection: &str, filters: &[Filter]) -> Subscription<Vec<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let query = build_query(collection, filters);
        let mut listener = self.store.listen_query(&query);
        Subscription::new(stream! {
            while let Some(event) = listener.next().await {
                match event {
                    Ok(documents) => {
                        yield decode_all(documents).map_err(|e| classify("listen_to_collection", e));
                    }
                    Err(e) => {
                        yield Err(classify("listen_to_collection", e));
                        break;
                    }
                }
            }
        })
    }
}

impl std::fmt::Debug for DocumentRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentRepository").finish_non_exhaustive()
    }
}
