//! In-process record store
//!
//! A JSON tree behind a mutex with value listeners, disconnect hooks and fault injection.
//! Used by tests and by applications that want the facade without a live backend.

use crate::listener::{ListenerSet, ListenerStream};
use crate::record::path::NodePath;
use crate::record::push_id::PushIdGenerator;
use crate::record::store::{RecordErrorCode, RecordQuery, RecordStore, RecordStoreError, ValueEvent};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// In-memory [`RecordStore`]
///
/// Cloning shares the same tree.
///
/// # Example
/// ```
/// use firebase_facade::record::{InMemoryRecordStore, NodePath, RecordStore};
/// use serde_json::json;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryRecordStore::new();
/// store.set(&NodePath::parse("presence/users/alice"), json!(true)).await?;
/// assert_eq!(store.get(&NodePath::parse("presence/users")).await?, Some(json!({ "alice": true })));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct InMemoryRecordStore {
    inner: Arc<Inner>,
}

struct Inner {
    tree: Mutex<Tree>,
    listeners: ListenerSet<Watch, ValueEvent>,
    push_ids: PushIdGenerator,
}

struct Tree {
    root: Value,
    disconnect_hooks: BTreeMap<NodePath, Value>,
    write_faults: VecDeque<RecordStoreError>,
    read_faults: VecDeque<RecordStoreError>,
}

struct Watch {
    path: NodePath,
    last: Option<Value>,
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRecordStore {
    /// Empty store
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                tree: Mutex::new(Tree {
                    root: Value::Object(Map::new()),
                    disconnect_hooks: BTreeMap::new(),
                    write_faults: VecDeque::new(),
                    read_faults: VecDeque::new(),
                }),
                listeners: ListenerSet::new(),
                push_ids: PushIdGenerator::new(),
            }),
        }
    }

    /// Make the next write-side call (`set`, `update_children`, disconnect hook arm/disarm)
    /// fail with `error` without touching the tree.
    pub fn fail_next_write(&self, error: RecordStoreError) {
        self.lock().write_faults.push_back(error);
    }

    /// Make the next `get` or `query` fail with `error`
    pub fn fail_next_read(&self, error: RecordStoreError) {
        self.lock().read_faults.push_back(error);
    }

    /// Cancel every listener at, above or below `path` with `error`, as the server does when
    /// read access is revoked.
    pub fn revoke_listeners(&self, path: &NodePath, error: RecordStoreError) {
        self.inner
            .listeners
            .close_matching(|watch| watch.path.overlaps(path).then(|| Err(error.clone())));
    }

    /// Simulate this client's connection dropping: every armed disconnect hook is applied
    /// (as one write) and then discarded. Returns the number of hooks applied.
    pub fn simulate_disconnect(&self) -> usize {
        let mut tree = self.lock();
        let hooks = std::mem::take(&mut tree.disconnect_hooks);
        let applied = hooks.len();
        tracing::debug!(hooks = applied, "simulating client disconnect");
        self.commit(&mut tree, hooks);
        applied
    }

    /// Value an armed disconnect hook will write at `path`
    pub fn disconnect_hook(&self, path: &NodePath) -> Option<Value> {
        self.lock().disconnect_hooks.get(path).cloned()
    }

    /// Number of live value listeners
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    fn lock(&self) -> MutexGuard<'_, Tree> {
        self.inner.tree.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply writes and notify listeners whose value changed. Runs under the tree lock so
    /// listeners observe writes in commit order.
    fn commit(&self, tree: &mut Tree, writes: impl IntoIterator<Item = (NodePath, Value)>) {
        for (path, value) in writes {
            write_at(&mut tree.root, path.segments(), normalize(value));
        }
        let root = &tree.root;
        self.inner.listeners.notify(|watch| {
            let current = value_at(root, &watch.path).cloned();
            if current == watch.last {
                return None;
            }
            watch.last = current.clone();
            Some(Ok(current))
        });
    }
}

fn validate(path: &NodePath) -> Result<(), RecordStoreError> {
    match path.invalid_segment() {
        Some(segment) => Err(RecordStoreError::coded(
            RecordErrorCode::OperationFailed,
            format!("Invalid key '{segment}' in path {path}"),
        )),
        None => Ok(()),
    }
}

fn take_fault(faults: &mut VecDeque<RecordStoreError>) -> Result<(), RecordStoreError> {
    match faults.pop_front() {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

fn is_empty_node(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Drop null children and empty objects; the tree never stores either.
fn normalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let map: Map<String, Value> = map
                .into_iter()
                .map(|(k, v)| (k, normalize(v)))
                .filter(|(_, v)| !is_empty_node(v))
                .collect();
            if map.is_empty() {
                Value::Null
            } else {
                Value::Object(map)
            }
        }
        other => other,
    }
}

fn value_at<'a>(root: &'a Value, path: &NodePath) -> Option<&'a Value> {
    let node = path
        .segments()
        .iter()
        .try_fold(root, |node, key| node.get(key.as_str()))?;
    (!is_empty_node(node)).then_some(node)
}

fn write_at(node: &mut Value, segments: &[String], value: Value) {
    let Some((first, rest)) = segments.split_first() else {
        *node = if value.is_null() {
            Value::Object(Map::new())
        } else {
            value
        };
        return;
    };

    if !node.is_object() {
        if value.is_null() {
            return;
        }
        *node = Value::Object(Map::new());
    }
    let Value::Object(map) = node else {
        return;
    };

    if rest.is_empty() {
        if value.is_null() {
            map.remove(first);
        } else {
            map.insert(first.clone(), value);
        }
        return;
    }

    let child = map.entry(first.clone()).or_insert(Value::Null);
    write_at(child, rest, value);
    if is_empty_node(child) {
        map.remove(first);
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    fn generate_key(&self) -> String {
        self.inner.push_ids.next_id()
    }

    async fn get(&self, path: &NodePath) -> Result<Option<Value>, RecordStoreError> {
        validate(path)?;
        let mut tree = self.lock();
        take_fault(&mut tree.read_faults)?;
        Ok(value_at(&tree.root, path).cloned())
    }

    async fn query(
        &self,
        path: &NodePath,
        query: &RecordQuery,
    ) -> Result<Vec<(String, Value)>, RecordStoreError> {
        validate(path)?;
        let mut tree = self.lock();
        take_fault(&mut tree.read_faults)?;
        match value_at(&tree.root, path) {
            Some(Value::Object(children)) => Ok(query.apply(children)),
            _ => Ok(Vec::new()),
        }
    }

    async fn set(&self, path: &NodePath, value: Value) -> Result<(), RecordStoreError> {
        validate(path)?;
        let mut tree = self.lock();
        take_fault(&mut tree.write_faults)?;
        self.commit(&mut tree, [(path.clone(), value)]);
        Ok(())
    }

    async fn update_children(
        &self,
        updates: BTreeMap<NodePath, Value>,
    ) -> Result<(), RecordStoreError> {
        for path in updates.keys() {
            validate(path)?;
        }
        // Overlapping paths make the result depend on write order
        let paths: Vec<&NodePath> = updates.keys().collect();
        for (i, a) in paths.iter().enumerate() {
            if let Some(b) = paths[i + 1..].iter().find(|b| a.overlaps(b)) {
                return Err(RecordStoreError::coded(
                    RecordErrorCode::OperationFailed,
                    format!("Update paths overlap: {a} and {b}"),
                ));
            }
        }

        let mut tree = self.lock();
        take_fault(&mut tree.write_faults)?;
        self.commit(&mut tree, updates);
        Ok(())
    }

    fn listen(&self, path: &NodePath) -> ListenerStream<ValueEvent> {
        if let Err(error) = validate(path) {
            return ListenerStream::once([Err(error)]);
        }
        let tree = self.lock();
        let current = value_at(&tree.root, path).cloned();
        let watch = Watch {
            path: path.clone(),
            last: current.clone(),
        };
        self.inner.listeners.register(watch, Some(Ok(current)))
    }

    async fn on_disconnect_set(
        &self,
        path: &NodePath,
        value: Value,
    ) -> Result<(), RecordStoreError> {
        validate(path)?;
        let mut tree = self.lock();
        take_fault(&mut tree.write_faults)?;
        tree.disconnect_hooks.insert(path.clone(), value);
        Ok(())
    }

    async fn cancel_on_disconnect(&self, path: &NodePath) -> Result<(), RecordStoreError> {
        validate(path)?;
        let mut tree = self.lock();
        take_fault(&mut tree.write_faults)?;
        tree.disconnect_hooks.retain(|hook, _| !path.contains(hook));
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRecordStore")
            .field("listeners", &self.listener_count())
            .finish_non_exhaustive()
    }
}
