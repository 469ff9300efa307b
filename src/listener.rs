//! Backend listener plumbing
//!
//! Backends push events into a [`ListenerStream`]. The stream owns a
//! [`ListenerRegistration`]; dropping either one deregisters the listener synchronously,
//! so a cancelled subscription can never leak a backend listener.

use futures::Stream;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Handle for removing a backend listener
///
/// Removal runs at most once: on [`ListenerRegistration::remove`] or on drop.
pub struct ListenerRegistration {
    remove: Option<Box<dyn FnOnce() + Send>>,
}

impl ListenerRegistration {
    /// Wrap the backend's deregistration callback
    pub fn new(remove: impl FnOnce() + Send + 'static) -> Self {
        Self {
            remove: Some(Box::new(remove)),
        }
    }

    /// A registration with nothing to remove (e.g. a listener that failed to attach)
    pub fn noop() -> Self {
        Self { remove: None }
    }

    /// Removes the listener and stops receiving updates
    pub fn remove(mut self) {
        self.run();
    }

    fn run(&mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl Drop for ListenerRegistration {
    fn drop(&mut self) {
        self.run();
    }
}

impl std::fmt::Debug for ListenerRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistration")
            .field("active", &self.remove.is_some())
            .finish()
    }
}

/// Stream of events pushed by a backend listener.
///
/// When dropped, the underlying listener is removed.
pub struct ListenerStream<T> {
    receiver: UnboundedReceiverStream<T>,
    registration: ListenerRegistration,
}

impl<T> ListenerStream<T> {
    /// Pair a receiving channel with the registration that feeds it
    pub fn new(receiver: mpsc::UnboundedReceiver<T>, registration: ListenerRegistration) -> Self {
        Self {
            receiver: UnboundedReceiverStream::new(receiver),
            registration,
        }
    }

    /// A stream that yields `events` and then ends, with no backend listener behind it
    pub fn once(events: impl IntoIterator<Item = T>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        for event in events {
            let _ = tx.send(event);
        }
        Self::new(rx, ListenerRegistration::noop())
    }

    /// Remove the backend listener now; buffered events are discarded
    pub fn remove(self) {
        let Self { registration, .. } = self;
        registration.remove();
    }
}

impl<T> Stream for ListenerStream<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.receiver).poll_next(cx)
    }
}

impl<T> std::fmt::Debug for ListenerStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerStream")
            .field("registration", &self.registration)
            .finish()
    }
}

/// Listener table used by the in-memory backends.
///
/// Each entry pairs a watch key (a path, a query) with the sender half of its channel.
/// Deliveries happen under the table lock, and removal takes the same lock, so once a
/// registration is removed no further event reaches its stream.
pub(crate) struct ListenerSet<K, T> {
    inner: Arc<Mutex<ListenerTable<K, T>>>,
}

struct ListenerTable<K, T> {
    next_id: u64,
    entries: HashMap<u64, (K, mpsc::UnboundedSender<T>)>,
}

impl<K, T> ListenerSet<K, T>
where
    K: Send + 'static,
    T: Send + 'static,
{
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ListenerTable {
                next_id: 0,
                entries: HashMap::new(),
            })),
        }
    }

    /// Register a listener and deliver `initial` to it before any later event.
    pub(crate) fn register(&self, key: K, initial: Option<T>) -> ListenerStream<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut table = self.lock();
        let id = table.next_id;
        table.next_id += 1;
        if let Some(event) = initial {
            let _ = tx.send(event);
        }
        table.entries.insert(id, (key, tx));
        drop(table);

        let weak: Weak<Mutex<ListenerTable<K, T>>> = Arc::downgrade(&self.inner);
        let registration = ListenerRegistration::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .entries
                    .remove(&id);
            }
        });
        ListenerStream::new(rx, registration)
    }

    /// Deliver to every listener; `event_for` returns `None` to skip a listener.
    ///
    /// The key is handed out mutably so a listener can remember what it last saw.
    pub(crate) fn notify(&self, mut event_for: impl FnMut(&mut K) -> Option<T>) {
        let mut table = self.lock();
        table.entries.retain(|_, (key, tx)| match event_for(key) {
            Some(event) => tx.send(event).is_ok(),
            None => !tx.is_closed(),
        });
    }

    /// Deliver a final event to matching listeners and drop them.
    pub(crate) fn close_matching(&self, mut event_for: impl FnMut(&K) -> Option<T>) {
        let mut table = self.lock();
        table.entries.retain(|_, (key, tx)| match event_for(key) {
            Some(event) => {
                let _ = tx.send(event);
                false
            }
            None => true,
        });
    }

    /// Number of live listeners
    pub(crate) fn len(&self) -> usize {
        self.lock().entries.len()
    }

    fn lock(&self) -> MutexGuard<'_, ListenerTable<K, T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_listener_stream_drop_removes_registration() {
        let set: ListenerSet<String, u32> = ListenerSet::new();
        {
            let _stream = set.register("a".to_string(), None);
            assert_eq!(set.len(), 1);
            // Stream dropped here
        }
        assert_eq!(set.len(), 0);
    }

    #[tokio::test]
    async fn test_initial_event_is_delivered_first() {
        let set: ListenerSet<String, u32> = ListenerSet::new();
        let mut stream = set.register("a".to_string(), Some(1));
        set.notify(|_| Some(2));
        assert_eq!(stream.next().await, Some(1));
        assert_eq!(stream.next().await, Some(2));
    }

    #[tokio::test]
    async fn test_notify_skips_unmatched_keys() {
        let set: ListenerSet<&'static str, u32> = ListenerSet::new();
        let mut a = set.register("a", None);
        let mut b = set.register("b", None);
        set.notify(|key| (*key == "b").then_some(7));
        drop(set);
        assert_eq!(b.next().await, Some(7));
        assert_eq!(a.next().await, None);
    }

    #[tokio::test]
    async fn test_close_matching_ends_stream() {
        let set: ListenerSet<&'static str, u32> = ListenerSet::new();
        let mut stream = set.register("a", None);
        set.close_matching(|_| Some(9));
        assert_eq!(set.len(), 0);
        assert_eq!(stream.next().await, Some(9));
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test]
    async fn test_once_stream() {
        let stream = ListenerStream::once([1, 2, 3]);
        let all: Vec<_> = stream.collect().await;
        assert_eq!(all, vec![1, 2, 3]);
    }

    #[test]
    fn test_registration_runs_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let registration = ListenerRegistration::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        registration.remove();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
