//! In-process document store

use crate::document::query::Query;
use crate::document::store::{
    DocumentErrorCode, DocumentEvent, DocumentSnapshot, DocumentStore, DocumentStoreError, Fields,
    QueryEvent,
};
use crate::listener::{ListenerSet, ListenerStream};
use async_trait::async_trait;
use rand::Rng;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// In-memory [`DocumentStore`]
///
/// Cloning shares the same collections. Besides the store contract it can inject failures:
/// [`InMemoryDocumentStore::fail_next`] fails one call and
/// [`InMemoryDocumentStore::revoke_access`] denies a whole collection, ending its listeners.
#[derive(Clone)]
pub struct InMemoryDocumentStore {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<StoreState>,
    documents: ListenerSet<DocumentWatch, DocumentEvent>,
    queries: ListenerSet<QueryWatch, QueryEvent>,
}

#[derive(Default)]
struct StoreState {
    collections: HashMap<String, BTreeMap<String, Fields>>,
    denied: HashSet<String>,
    faults: VecDeque<DocumentStoreError>,
}

struct DocumentWatch {
    collection: String,
    id: String,
    last: Option<DocumentSnapshot>,
}

struct QueryWatch {
    query: Query,
    last: Vec<DocumentSnapshot>,
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDocumentStore {
    /// Empty store
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(StoreState::default()),
                documents: ListenerSet::new(),
                queries: ListenerSet::new(),
            }),
        }
    }

    /// Make the next call (read or write) fail with `error`
    pub fn fail_next(&self, error: DocumentStoreError) {
        self.lock().faults.push_back(error);
    }

    /// Deny all access to `collection`. Active listeners on it receive `PermissionDenied`
    /// and end; later calls fail the same way until [`InMemoryDocumentStore::restore_access`].
    pub fn revoke_access(&self, collection: &str) {
        self.lock().denied.insert(collection.to_string());
        self.inner.documents.close_matching(|watch| {
            (watch.collection == collection).then(|| Err(permission_denied(collection)))
        });
        self.inner.queries.close_matching(|watch| {
            (watch.query.collection() == collection).then(|| Err(permission_denied(collection)))
        });
    }

    /// Lift a [`InMemoryDocumentStore::revoke_access`]
    pub fn restore_access(&self, collection: &str) {
        self.lock().denied.remove(collection);
    }

    /// Number of live document and query listeners
    pub fn listener_count(&self) -> usize {
        self.inner.documents.len() + self.inner.queries.len()
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock the state after checking access and pending faults
    fn begin(&self, collection: &str) -> Result<MutexGuard<'_, StoreState>, DocumentStoreError> {
        validate_collection(collection)?;
        let mut state = self.lock();
        if let Some(error) = state.faults.pop_front() {
            return Err(error);
        }
        if state.denied.contains(collection) {
            return Err(permission_denied(collection));
        }
        Ok(state)
    }

    /// Deliver changes in `collection` to listeners. Called with the state lock held.
    fn publish(&self, state: &StoreState, collection: &str) {
        self.inner.documents.notify(|watch| {
            if watch.collection != collection {
                return None;
            }
            let current = snapshot(state, &watch.collection, &watch.id);
            if current == watch.last {
                return None;
            }
            watch.last = current.clone();
            Some(Ok(current))
        });
        self.inner.queries.notify(|watch| {
            if watch.query.collection() != collection {
                return None;
            }
            let current = evaluate(state, &watch.query);
            if current == watch.last {
                return None;
            }
            watch.last = current.clone();
            Some(Ok(current))
        });
    }
}

fn permission_denied(collection: &str) -> DocumentStoreError {
    DocumentStoreError::status(
        DocumentErrorCode::PermissionDenied,
        format!("Missing or insufficient permissions for collection '{collection}'"),
    )
}

fn validate_collection(collection: &str) -> Result<(), DocumentStoreError> {
    if collection.is_empty() || collection.contains('/') {
        return Err(DocumentStoreError::status(
            DocumentErrorCode::InvalidArgument,
            format!("Invalid collection name '{collection}'"),
        ));
    }
    Ok(())
}

fn validate_id(id: &str) -> Result<(), DocumentStoreError> {
    if id.is_empty() || id.contains('/') || id == "." || id == ".." {
        return Err(DocumentStoreError::status(
            DocumentErrorCode::InvalidArgument,
            format!("Invalid document id '{id}'"),
        ));
    }
    Ok(())
}

fn snapshot(state: &StoreState, collection: &str, id: &str) -> Option<DocumentSnapshot> {
    let data = state.collections.get(collection)?.get(id)?;
    Some(DocumentSnapshot {
        id: id.to_string(),
        data: data.clone(),
    })
}

fn evaluate(state: &StoreState, query: &Query) -> Vec<DocumentSnapshot> {
    let Some(documents) = state.collections.get(query.collection()) else {
        return Vec::new();
    };
    documents
        .iter()
        .filter(|(_, data)| query.matches(data))
        .map(|(id, data)| DocumentSnapshot {
            id: id.clone(),
            data: data.clone(),
        })
        .collect()
}

/// Write `value` at a dotted `path`, creating (or replacing non-map) intermediate fields
fn set_field(document: &mut Fields, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            document.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let child = document
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            if let Value::Object(map) = child {
                set_field(map, rest, value);
            }
        }
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    fn generate_id(&self) -> String {
        rand::thread_rng()
            .sample_iter(&rand::distributions::Alphanumeric)
            .take(20)
            .map(char::from)
            .collect()
    }

    async fn set(&self, collection: &str, id: &str, data: Fields) -> Result<(), DocumentStoreError> {
        validate_id(id)?;
        let mut state = self.begin(collection)?;
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), data);
        self.publish(&state, collection);
        Ok(())
    }

    async fn get(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<DocumentSnapshot>, DocumentStoreError> {
        validate_id(id)?;
        let state = self.begin(collection)?;
        Ok(snapshot(&state, collection, id))
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> Result<(), DocumentStoreError> {
        validate_id(id)?;
        let mut state = self.begin(collection)?;
        let Some(document) = state
            .collections
            .get_mut(collection)
            .and_then(|documents| documents.get_mut(id))
        else {
            return Err(DocumentStoreError::status(
                DocumentErrorCode::NotFound,
                format!("No document to update: {collection}/{id}"),
            ));
        };
        for (path, value) in fields {
            set_field(document, &path, value);
        }
        self.publish(&state, collection);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), DocumentStoreError> {
        validate_id(id)?;
        let mut state = self.begin(collection)?;
        let removed = state
            .collections
            .get_mut(collection)
            .and_then(|documents| documents.remove(id));
        if removed.is_some() {
            self.publish(&state, collection);
        }
        Ok(())
    }

    async fn run_query(&self, query: &Query) -> Result<Vec<DocumentSnapshot>, DocumentStoreError> {
        let state = self.begin(query.collection())?;
        Ok(evaluate(&state, query))
    }

    fn listen_document(&self, collection: &str, id: &str) -> ListenerStream<DocumentEvent> {
        let state = match validate_id(id).and_then(|_| self.begin(collection)) {
            Ok(state) => state,
            Err(error) => return ListenerStream::once([Err(error)]),
        };
        let current = snapshot(&state, collection, id);
        let watch = DocumentWatch {
            collection: collection.to_string(),
            id: id.to_string(),
            last: current.clone(),
        };
        self.inner.documents.register(watch, Some(Ok(current)))
    }

    fn listen_query(&self, query: &Query) -> ListenerStream<QueryEvent> {
        let state = match self.begin(query.collection()) {
            Ok(state) => state,
            Err(error) => return ListenerStream::once([Err(error)]),
        };
        let current = evaluate(&state, query);
        let watch = QueryWatch {
            query: query.clone(),
            last: current.clone(),
        };
        self.inner.queries.register(watch, Some(Ok(current)))
    }
}

impl std::fmt::Debug for InMemoryDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryDocumentStore")
            .field("listeners", &self.listener_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn test_generated_ids() {
        let store = InMemoryDocumentStore::new();
        let id = store.generate_id();
        assert_eq!(id.len(), 20);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(id, store.generate_id());
    }

    #[tokio::test]
    async fn test_update_merges_dotted_fields() {
        let store = InMemoryDocumentStore::new();
        store
            .set("users", "u1", fields(json!({ "name": "Ana", "address": { "city": "Recife", "zip": "1" } })))
            .await
            .unwrap();
        store
            .update("users", "u1", fields(json!({ "address.city": "Olinda", "age": 30 })))
            .await
            .unwrap();

        let doc = store.get("users", "u1").await.unwrap().unwrap();
        assert_eq!(
            Value::Object(doc.data),
            json!({ "name": "Ana", "age": 30, "address": { "city": "Olinda", "zip": "1" } })
        );
    }

    #[tokio::test]
    async fn test_update_missing_document_is_not_found() {
        let store = InMemoryDocumentStore::new();
        let err = store.update("users", "ghost", Fields::new()).await.unwrap_err();
        assert!(matches!(err, DocumentStoreError::Status { code: DocumentErrorCode::NotFound, .. }));
    }

    #[tokio::test]
    async fn test_delete_missing_document_succeeds() {
        let store = InMemoryDocumentStore::new();
        store.delete("users", "ghost").await.unwrap();
    }

    #[tokio::test]
    async fn test_query_listener_only_sees_matching_changes() {
        let store = InMemoryDocumentStore::new();
        let query = Query::new("users").where_equal_to("active", json!(true));
        let mut listener = store.listen_query(&query);
        assert_eq!(listener.next().await, Some(Ok(vec![])));

        store.set("users", "a", fields(json!({ "active": false }))).await.unwrap();
        store.set("users", "b", fields(json!({ "active": true }))).await.unwrap();

        let Some(Ok(docs)) = listener.next().await else {
            panic!("expected results");
        };
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "b");
    }

    #[tokio::test]
    async fn test_revoke_access_ends_listeners() {
        let store = InMemoryDocumentStore::new();
        let mut listener = store.listen_document("secret", "d1");
        assert_eq!(listener.next().await, Some(Ok(None)));

        store.revoke_access("secret");
        assert!(matches!(
            listener.next().await,
            Some(Err(DocumentStoreError::Status { code: DocumentErrorCode::PermissionDenied, .. }))
        ));
        assert_eq!(listener.next().await, None);
        assert_eq!(store.listener_count(), 0);

        assert!(store.get("secret", "d1").await.is_err());
        store.restore_access("secret");
        assert!(store.get("secret", "d1").await.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_names_are_rejected() {
        let store = InMemoryDocumentStore::new();
        assert!(store.set("a/b", "x", Fields::new()).await.is_err());
        assert!(store.set("a", "", Fields::new()).await.is_err());
    }
}
