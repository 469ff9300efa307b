//! Record store backend contract
//!
//! [`RecordStore`] is the seam between the repositories and a hierarchical realtime
//! database. Implementations report failures as [`RecordStoreError`]; the `From` impl into
//! [`AppError`] is the only place those failures are classified.

use crate::error::{AppError, GenericError, RecordError};
use crate::listener::ListenerStream;
use crate::record::path::NodePath;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Event delivered by a value listener: the node's value (`None` when absent) or a
/// terminal error after which the listener is gone.
pub type ValueEvent = Result<Option<Value>, RecordStoreError>;

/// Structured error codes reported by the realtime database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordErrorCode {
    /// Local data is out of date
    DataStale,
    /// Server-side failure
    OperationFailed,
    /// Security rules rejected the request
    PermissionDenied,
    /// Operation cancelled because the connection dropped
    Disconnected,
    /// Auth token expired
    ExpiredToken,
    /// Auth token invalid
    InvalidToken,
    /// Transaction gave up after too many retries
    MaxRetries,
    /// A later `set` replaced this transaction's data
    OverriddenBySet,
    /// Service unavailable
    Unavailable,
    /// Exception thrown from user callback code
    UserCodeException,
    /// Transport failure
    NetworkError,
    /// Write cancelled by the client
    WriteCanceled,
    /// Any code this crate does not know
    Unknown(i32),
}

impl RecordErrorCode {
    /// Convert a numeric database error code
    ///
    /// Codes follow the realtime database SDKs (`-3` permission denied, `-24` network, ...).
    pub fn from_code(code: i32) -> Self {
        match code {
            -1 => Self::DataStale,
            -2 => Self::OperationFailed,
            -3 => Self::PermissionDenied,
            -4 => Self::Disconnected,
            -6 => Self::ExpiredToken,
            -7 => Self::InvalidToken,
            -8 => Self::MaxRetries,
            -9 => Self::OverriddenBySet,
            -10 => Self::Unavailable,
            -11 => Self::UserCodeException,
            -24 => Self::NetworkError,
            -25 => Self::WriteCanceled,
            other => Self::Unknown(other),
        }
    }

    /// Wire name of the code, e.g. `"permission_denied"`
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DataStale => "data_stale",
            Self::OperationFailed => "operation_failed",
            Self::PermissionDenied => "permission_denied",
            Self::Disconnected => "disconnected",
            Self::ExpiredToken => "expired_token",
            Self::InvalidToken => "invalid_token",
            Self::MaxRetries => "max_retries",
            Self::OverriddenBySet => "overridden_by_set",
            Self::Unavailable => "unavailable",
            Self::UserCodeException => "user_code_exception",
            Self::NetworkError => "network_error",
            Self::WriteCanceled => "write_canceled",
            Self::Unknown(_) => "unknown_error",
        }
    }
}

impl fmt::Display for RecordErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by a [`RecordStore`]
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RecordStoreError {
    /// Error carrying a structured database code
    #[error("{message} ({code})")]
    Coded {
        /// Database error code
        code: RecordErrorCode,
        /// Human-readable detail
        message: String,
    },

    /// Error known only by its message text
    #[error("{0}")]
    Message(String),

    /// Transport-level I/O failure
    #[error("I/O error: {0}")]
    Io(String),

    /// Anything else
    #[error("Unexpected error: {0}")]
    Other(String),
}

impl RecordStoreError {
    /// Error with a structured code
    pub fn coded(code: RecordErrorCode, message: impl Into<String>) -> Self {
        Self::Coded {
            code,
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for RecordStoreError {
    fn from(error: serde_json::Error) -> Self {
        Self::Message(format!("Failed to convert value: {error}"))
    }
}

/// Message fragments recognized when no structured code is available, checked in order.
const MESSAGE_FRAGMENTS: [(&str, AppError); 10] = [
    ("permission_denied", AppError::RecordStore(RecordError::PermissionDenied)),
    ("data_stale", AppError::RecordStore(RecordError::DataStale)),
    ("disconnected", AppError::RecordStore(RecordError::Disconnected)),
    ("expired_token", AppError::RecordStore(RecordError::TokenExpired)),
    ("invalid_token", AppError::RecordStore(RecordError::TokenInvalid)),
    ("max_retries", AppError::RecordStore(RecordError::MaxRetriesExceeded)),
    ("overridden_by_set", AppError::RecordStore(RecordError::OverriddenByConcurrentWrite)),
    ("unavailable", AppError::RecordStore(RecordError::Unavailable)),
    ("write_canceled", AppError::RecordStore(RecordError::WriteCanceled)),
    ("network_error", AppError::Generic(GenericError::NetworkError)),
];

fn classify_message(message: &str) -> AppError {
    // Providers are inconsistent about "permission denied" vs "permission_denied"
    let normalized = message.to_ascii_lowercase().replace([' ', '-'], "_");
    MESSAGE_FRAGMENTS
        .iter()
        .find(|(fragment, _)| normalized.contains(fragment))
        .map(|(_, kind)| *kind)
        .unwrap_or(AppError::Generic(GenericError::UnknownError))
}

impl From<RecordStoreError> for AppError {
    fn from(error: RecordStoreError) -> Self {
        match error {
            RecordStoreError::Coded { code, .. } => match code {
                RecordErrorCode::DataStale => RecordError::DataStale.into(),
                RecordErrorCode::OperationFailed => RecordError::OperationFailed.into(),
                RecordErrorCode::PermissionDenied => RecordError::PermissionDenied.into(),
                RecordErrorCode::Disconnected => RecordError::Disconnected.into(),
                RecordErrorCode::ExpiredToken => RecordError::TokenExpired.into(),
                RecordErrorCode::InvalidToken => RecordError::TokenInvalid.into(),
                RecordErrorCode::MaxRetries => RecordError::MaxRetriesExceeded.into(),
                RecordErrorCode::OverriddenBySet => RecordError::OverriddenByConcurrentWrite.into(),
                RecordErrorCode::Unavailable => RecordError::Unavailable.into(),
                RecordErrorCode::WriteCanceled => RecordError::WriteCanceled.into(),
                RecordErrorCode::NetworkError => GenericError::NetworkError.into(),
                RecordErrorCode::UserCodeException | RecordErrorCode::Unknown(_) => {
                    GenericError::UnknownError.into()
                }
            },
            RecordStoreError::Message(message) => classify_message(&message),
            RecordStoreError::Io(_) => GenericError::NetworkError.into(),
            RecordStoreError::Other(_) => GenericError::UnknownError.into(),
        }
    }
}

/// Ordering applied by a [`RecordQuery`]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RecordOrder {
    /// By child key
    #[default]
    Key,
    /// By the value of a named grandchild
    Child(String),
}

/// Window applied after ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordLimit {
    /// Keep the first `n` children
    First(usize),
    /// Keep the last `n` children
    Last(usize),
}

/// Ordered, bounded read of a node's children
///
/// Bounds compare against the ordering value: the key for [`RecordOrder::Key`], the named
/// child's value for [`RecordOrder::Child`]. Values order as null, false, true, numbers,
/// strings, then objects; ties break by key.
///
/// # Example
/// ```
/// use firebase_facade::record::RecordQuery;
///
/// // Last 2 messages strictly before "m5"
/// let query = RecordQuery::new().order_by_key().end_before("m5").limit_to_last(2);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordQuery {
    order: RecordOrder,
    start_at: Option<Value>,
    end_at: Option<Value>,
    end_before: Option<Value>,
    limit: Option<RecordLimit>,
}

impl RecordQuery {
    /// All children ordered by key
    pub fn new() -> Self {
        Self::default()
    }

    /// Order by child key
    pub fn order_by_key(mut self) -> Self {
        self.order = RecordOrder::Key;
        self
    }

    /// Order by the value at `child` inside each child
    pub fn order_by_child(mut self, child: impl Into<String>) -> Self {
        self.order = RecordOrder::Child(child.into());
        self
    }

    /// Inclusive lower bound
    pub fn start_at(mut self, value: impl Into<Value>) -> Self {
        self.start_at = Some(value.into());
        self
    }

    /// Inclusive upper bound
    pub fn end_at(mut self, value: impl Into<Value>) -> Self {
        self.end_at = Some(value.into());
        self
    }

    /// Exclusive upper bound
    pub fn end_before(mut self, value: impl Into<Value>) -> Self {
        self.end_before = Some(value.into());
        self
    }

    /// Keep the first `n` children after ordering
    pub fn limit_to_first(mut self, n: usize) -> Self {
        self.limit = Some(RecordLimit::First(n));
        self
    }

    /// Keep the last `n` children after ordering
    pub fn limit_to_last(mut self, n: usize) -> Self {
        self.limit = Some(RecordLimit::Last(n));
        self
    }

    /// Ordering in effect
    pub fn order(&self) -> &RecordOrder {
        &self.order
    }

    /// Limit in effect
    pub fn limit(&self) -> Option<RecordLimit> {
        self.limit
    }

    /// Evaluate the query against the children of a node
    pub fn apply(&self, children: &Map<String, Value>) -> Vec<(String, Value)> {
        let mut selected: Vec<(String, Value)> = children
            .iter()
            .filter(|(key, value)| self.in_bounds(key, value))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        selected.sort_by(|(ka, va), (kb, vb)| match &self.order {
            RecordOrder::Key => compare_keys(ka, kb),
            RecordOrder::Child(child) => {
                compare_values(child_value(va, child), child_value(vb, child))
                    .then_with(|| compare_keys(ka, kb))
            }
        });

        match self.limit {
            Some(RecordLimit::First(n)) => selected.truncate(n),
            Some(RecordLimit::Last(n)) => {
                let skip = selected.len().saturating_sub(n);
                selected.drain(..skip);
            }
            None => {}
        }
        selected
    }

    fn in_bounds(&self, key: &str, value: &Value) -> bool {
        let compare = |bound: &Value| -> Ordering {
            match &self.order {
                RecordOrder::Key => match bound {
                    Value::String(bound) => compare_keys(key, bound),
                    other => compare_keys(key, &other.to_string()),
                },
                RecordOrder::Child(child) => compare_values(child_value(value, child), bound),
            }
        };

        if let Some(start) = &self.start_at {
            if compare(start) == Ordering::Less {
                return false;
            }
        }
        if let Some(end) = &self.end_at {
            if compare(end) == Ordering::Greater {
                return false;
            }
        }
        if let Some(end) = &self.end_before {
            if compare(end) != Ordering::Less {
                return false;
            }
        }
        true
    }
}

static NULL: Value = Value::Null;

fn child_value<'a>(value: &'a Value, child: &str) -> &'a Value {
    child
        .split('/')
        .filter(|s| !s.is_empty())
        .try_fold(value, |node, key| node.get(key))
        .unwrap_or(&NULL)
}

fn rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(false) => 1,
        Value::Bool(true) => 2,
        Value::Number(_) => 3,
        Value::String(_) => 4,
        Value::Array(_) | Value::Object(_) => 5,
    }
}

/// Total order over record values used by child ordering and bounds
pub(crate) fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or_default();
            let y = y.as_f64().unwrap_or_default();
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Keys that are canonical 32-bit integers sort numerically before all other keys
pub(crate) fn compare_keys(a: &str, b: &str) -> Ordering {
    match (integer_key(a), integer_key(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

fn integer_key(key: &str) -> Option<i32> {
    key.parse::<i32>().ok().filter(|n| n.to_string() == key)
}

/// Hierarchical realtime key/value store
///
/// Values are JSON trees. Writing `Value::Null` deletes a node.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Locally generated, chronologically sortable child key
    fn generate_key(&self) -> String;

    /// Read a node; `None` if absent
    async fn get(&self, path: &NodePath) -> Result<Option<Value>, RecordStoreError>;

    /// Read the children of a node through `query`
    async fn query(
        &self,
        path: &NodePath,
        query: &RecordQuery,
    ) -> Result<Vec<(String, Value)>, RecordStoreError>;

    /// Overwrite a node
    async fn set(&self, path: &NodePath, value: Value) -> Result<(), RecordStoreError>;

    /// Apply every write atomically: all become visible together or none do
    async fn update_children(
        &self,
        updates: BTreeMap<NodePath, Value>,
    ) -> Result<(), RecordStoreError>;

    /// Watch a node. The current value is delivered first, then every change.
    fn listen(&self, path: &NodePath) -> ListenerStream<ValueEvent>;

    /// Arm a server-side write applied when this client's connection is lost
    async fn on_disconnect_set(&self, path: &NodePath, value: Value)
        -> Result<(), RecordStoreError>;

    /// Disarm the disconnect hooks at `path`
    async fn cancel_on_disconnect(&self, path: &NodePath) -> Result<(), RecordStoreError>;
}
