//! Transport seam between feature views and the document database.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::{
    core::{query::Query, store::StoreError},
    document::{Document, FieldPatch, Fields},
    persist::PersistError,
    types::{DocId, OpSeq, WatchId},
};

/// Transport, auth, or backend-side failure.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// The backend rejected the mutation.
    #[error(transparent)]
    Rejected(#[from] StoreError),
    /// Journaling the mutation failed.
    #[error("persistence failed: {0}")]
    Persist(String),
    /// The request could not reach the backend.
    #[error("transport failure: {0}")]
    Transport(String),
    /// The caller is not allowed to perform the request.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// The backend task is gone.
    #[error("backend channel closed")]
    ChannelClosed,
}

impl From<PersistError> for BackendError {
    fn from(value: PersistError) -> Self {
        Self::Persist(value.to_string())
    }
}

/// Full, ordered view of a query's result set at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Backend sequence the snapshot reflects.
    pub seq: OpSeq,
    /// Documents in query order.
    pub documents: Vec<Document>,
}

/// One delivery on a watcher channel.
pub type SnapshotDelivery = Result<Snapshot, BackendError>;

/// Receiving half of a registered watcher.
#[derive(Debug)]
pub struct WatchStream {
    /// Backend-assigned watcher id, used to detach.
    pub id: WatchId,
    /// Snapshot deliveries in backend emission order.
    pub rx: mpsc::UnboundedReceiver<SnapshotDelivery>,
}

/// Client view of a remote document database.
///
/// Every call is atomic at single-document granularity. Implementations
/// deliver an initial snapshot promptly after [`RemoteBackend::watch`] and a
/// new full snapshot after every change that affects the query.
///
/// Writes return the sequence the backend applied them at. A snapshot whose
/// [`Snapshot::seq`] is at or past that sequence reflects the write.
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Registers a watcher for `query`.
    async fn watch(&self, query: Query) -> Result<WatchStream, BackendError>;

    /// Detaches a watcher. Unknown or already detached ids are ignored.
    fn unwatch(&self, id: WatchId);

    /// Creates a document and returns its server-assigned id.
    async fn create(&self, collection: &str, fields: Fields) -> Result<(DocId, OpSeq), BackendError>;

    /// Replaces the fields named in `patch`.
    async fn update(&self, collection: &str, id: &str, patch: FieldPatch) -> Result<OpSeq, BackendError>;

    /// Writes `patch` to document `id`, creating it under that id when
    /// absent.
    async fn merge(&self, collection: &str, id: &str, patch: FieldPatch) -> Result<OpSeq, BackendError>;

    /// Removes a document.
    async fn delete(&self, collection: &str, id: &str) -> Result<OpSeq, BackendError>;

    /// Appends `element` to an array field without deduplication.
    async fn append_to_array(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        element: Value,
    ) -> Result<OpSeq, BackendError>;
}
