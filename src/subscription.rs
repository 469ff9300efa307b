//! Caller-facing subscription streams.
//!
//! Every `track_*` / `listen_*` / `get_*` subscription returns a [`Subscription`], a stream
//! of [`DataResult`] values. The stream owns the backend listener: dropping it, or calling
//! [`Subscription::cancel`], removes the listener synchronously.
//!
//! # Example
//! ```no_run
//! use firebase_facade::{Facade, InMemoryBackends};
//! use futures::StreamExt;
//!
//! # async fn example() {
//! let facade = Facade::new(InMemoryBackends::new().backends(), Default::default());
//! let mut presence = facade.database().presence().track_presence("users", "alice");
//! while let Some(state) = presence.next().await {
//!     match state {
//!         Ok(state) => println!("online: {}", state.is_online),
//!         Err(e) => eprintln!("Error: {}", e),
//!     }
//! }
//! // Listener removed when `presence` is dropped
//! # }
//! ```

use crate::error::{AppError, DataResult};
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A stream of classified updates from a backend listener.
pub struct Subscription<T> {
    inner: Pin<Box<dyn Stream<Item = DataResult<T>> + Send>>,
}

impl<T> Subscription<T> {
    pub(crate) fn new(stream: impl Stream<Item = DataResult<T>> + Send + 'static) -> Self {
        Self {
            inner: Box::pin(stream),
        }
    }

    /// A subscription that never attached: yields `error` once, then ends
    pub(crate) fn failed(error: AppError) -> Self
    where
        T: Send + 'static,
    {
        Self::new(futures::stream::iter([Err(error)]))
    }

    /// Stop receiving updates and remove the backend listener
    pub fn cancel(self) {
        drop(self);
    }
}

impl<T> Stream for Subscription<T> {
    type Item = DataResult<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AuthError, GenericError};
    use futures::StreamExt;

    #[tokio::test]
    async fn test_subscription_forwards_items() {
        let items: Vec<DataResult<u8>> = vec![Ok(1), Err(GenericError::UnknownError.into())];
        let mut subscription = Subscription::new(futures::stream::iter(items));

        assert_eq!(subscription.next().await, Some(Ok(1)));
        assert_eq!(
            subscription.next().await,
            Some(Err(AppError::Generic(GenericError::UnknownError)))
        );
        assert_eq!(subscription.next().await, None);
    }

    #[tokio::test]
    async fn test_failed_subscription_ends_after_error() {
        let mut subscription = Subscription::<u8>::failed(AuthError::UserNotFound.into());
        assert_eq!(
            subscription.next().await,
            Some(Err(AppError::Auth(AuthError::UserNotFound)))
        );
        assert_eq!(subscription.next().await, None);
    }
}
