//! Cancellable collection subscriptions.

use std::sync::Arc;

use crate::{
    core::query::Query,
    types::WatchId,
};

use super::backend::{BackendError, RemoteBackend, SnapshotDelivery, WatchStream};

/// Owned watcher registration.
///
/// The registration is released exactly once: by [`Subscription::cancel`],
/// when the backend closes the stream, or when the value is dropped.
/// Cancelling an inactive subscription is a no-op.
#[derive(Default)]
pub struct Subscription {
    inner: Option<Active>,
}

struct Active {
    backend: Arc<dyn RemoteBackend>,
    query: Query,
    stream: WatchStream,
}

impl Subscription {
    /// Registers a watcher for `query`. The first delivery is the initial
    /// snapshot.
    pub async fn open(backend: Arc<dyn RemoteBackend>, query: Query) -> Result<Self, BackendError> {
        let stream = backend.watch(query.clone()).await?;
        tracing::debug!(watch_id = stream.id, collection = %query.collection, "subscribed");
        Ok(Self {
            inner: Some(Active {
                backend,
                query,
                stream,
            }),
        })
    }

    /// A subscription that was never opened.
    pub fn inactive() -> Self {
        Self::default()
    }

    /// Backend watcher id while active.
    pub fn id(&self) -> Option<WatchId> {
        self.inner.as_ref().map(|a| a.stream.id)
    }

    /// Query this subscription was opened with.
    pub fn query(&self) -> Option<&Query> {
        self.inner.as_ref().map(|a| &a.query)
    }

    /// True until cancelled or closed by the backend.
    pub fn is_active(&self) -> bool {
        self.inner.is_some()
    }

    /// Waits for the next delivery. Returns `None` once inactive.
    pub async fn next(&mut self) -> Option<SnapshotDelivery> {
        let active = self.inner.as_mut()?;
        match active.stream.rx.recv().await {
            Some(delivery) => Some(delivery),
            None => {
                self.cancel();
                None
            }
        }
    }

    /// Returns an already queued delivery without waiting.
    pub fn try_next(&mut self) -> Option<SnapshotDelivery> {
        self.inner.as_mut()?.stream.rx.try_recv().ok()
    }

    /// Detaches from the backend. Safe to call any number of times.
    pub fn cancel(&mut self) {
        if let Some(active) = self.inner.take() {
            tracing::debug!(watch_id = active.stream.id, collection = %active.query.collection, "unsubscribed");
            active.backend.unwatch(active.stream.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id())
            .field("collection", &self.query().map(|q| q.collection.as_str()))
            .finish()
    }
}
