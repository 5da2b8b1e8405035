//! Validated writes for one collection.
//!
//! Every mutation is checked client-side first. A rejected draft raises a
//! warning notice and returns [`SyncError::Validation`] without touching
//! the backend. Transport or backend failures raise an error notice and
//! are returned to the caller; nothing is retried. Successful writes return
//! the backend sequence they were applied at.

use std::sync::Arc;

use serde_json::Value;

use crate::{
    blob::BlobStore,
    document::{Document, Fields, FieldPatch},
    types::{DocId, OpSeq},
};

use super::{
    backend::RemoteBackend,
    error::{SyncError, ValidationError},
    notice::{NoticeKind, Notifier},
};

/// User input headed for the backend.
pub trait Draft: Send + Sync {
    /// Rejects missing or malformed input.
    fn validate(&self) -> Result<(), ValidationError>;

    /// Document fields written on success.
    fn to_fields(&self) -> Fields;

    /// Name used in notices when the draft is appended to another
    /// document's array instead of stored on its own.
    fn noun(&self) -> &'static str {
        "Entry"
    }
}

/// Outcome of deleting a document that may reference a stored blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The document was removed and it referenced no blob.
    Deleted,
    /// The document and its blob were both removed.
    DeletedWithBlob,
    /// The document was removed but the blob could not be.
    PartiallyFailed {
        /// Why the blob step failed.
        reason: String,
    },
}

/// Write path for one collection, bound to a backend and blob store.
#[derive(Clone)]
pub struct MutationGateway {
    backend: Arc<dyn RemoteBackend>,
    blobs: Arc<dyn BlobStore>,
    notifier: Notifier,
    collection: String,
    label: String,
}

impl MutationGateway {
    /// Gateway writing to `collection`; `label` names its records in
    /// notices ("Item", "Post").
    pub fn new(
        backend: Arc<dyn RemoteBackend>,
        blobs: Arc<dyn BlobStore>,
        notifier: Notifier,
        collection: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            blobs,
            notifier,
            collection: collection.into(),
            label: label.into(),
        }
    }

    /// Target collection.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Blob store used for media-bearing documents.
    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    /// Validates `draft` or raises a warning notice.
    pub fn check(&self, draft: &impl Draft) -> Result<(), SyncError> {
        draft.validate().map_err(|err| {
            self.notifier.warning(&self.collection, err.message.clone());
            SyncError::Validation(err)
        })
    }

    /// Creates a document from `draft`.
    pub async fn create(&self, draft: &impl Draft) -> Result<(DocId, OpSeq), SyncError> {
        self.check(draft)?;
        self.create_unchecked(draft.to_fields()).await
    }

    /// Creates a document from already validated fields.
    pub async fn create_unchecked(&self, fields: Fields) -> Result<(DocId, OpSeq), SyncError> {
        match self.backend.create(&self.collection, fields).await {
            Ok(created) => {
                self.notifier
                    .success(&self.collection, format!("{} added successfully!", self.label));
                Ok(created)
            }
            Err(err) => Err(self.failed("add", err.into())),
        }
    }

    /// Overwrites the fields named by `draft` on document `id`.
    pub async fn update(&self, id: &str, draft: &impl Draft) -> Result<OpSeq, SyncError> {
        self.check(draft)?;
        self.update_fields(id, FieldPatch::from(draft.to_fields())).await
    }

    /// Overwrites fields without a draft.
    pub async fn update_fields(&self, id: &str, patch: FieldPatch) -> Result<OpSeq, SyncError> {
        match self.backend.update(&self.collection, id, patch).await {
            Ok(seq) => {
                self.notifier
                    .success(&self.collection, format!("{} updated successfully!", self.label));
                Ok(seq)
            }
            Err(err) => Err(self.failed("update", err.into())),
        }
    }

    /// Writes `patch` to document `id`, creating it under that id when
    /// absent.
    pub async fn merge(&self, id: &str, patch: FieldPatch) -> Result<OpSeq, SyncError> {
        match self.backend.merge(&self.collection, id, patch).await {
            Ok(seq) => {
                self.notifier
                    .success(&self.collection, format!("{} updated successfully!", self.label));
                Ok(seq)
            }
            Err(err) => Err(self.failed("update", err.into())),
        }
    }

    /// Removes document `id`.
    pub async fn delete(&self, id: &str) -> Result<OpSeq, SyncError> {
        match self.backend.delete(&self.collection, id).await {
            Ok(seq) => {
                self.notifier
                    .success(&self.collection, format!("{} deleted successfully!", self.label));
                Ok(seq)
            }
            Err(err) => Err(self.failed("delete", err.into())),
        }
    }

    /// Appends the validated `element` to array `field` of document `id`.
    /// Returns the appended value.
    pub async fn append_to_array(
        &self,
        id: &str,
        field: &str,
        element: &impl Draft,
    ) -> Result<(Value, OpSeq), SyncError> {
        self.check(element)?;
        let value = Value::Object(element.to_fields());
        match self
            .backend
            .append_to_array(&self.collection, id, field, value.clone())
            .await
        {
            Ok(seq) => {
                self.notifier
                    .success(&self.collection, format!("{} added successfully!", element.noun()));
                Ok((value, seq))
            }
            Err(err) => Err(self.failed("add to", err.into())),
        }
    }

    /// Removes `doc`, then the blob its `url_field` points at.
    ///
    /// The document removal decides success. A blob that cannot be resolved
    /// or deleted afterwards yields [`DeleteOutcome::PartiallyFailed`] and a
    /// partial-failure notice rather than an error. The sequence is the
    /// document removal's.
    pub async fn delete_with_blob(
        &self,
        doc: &Document,
        url_field: &str,
    ) -> Result<(DeleteOutcome, OpSeq), SyncError> {
        let seq = match self.backend.delete(&self.collection, &doc.id).await {
            Ok(seq) => seq,
            Err(err) => return Err(self.failed("delete", err.into())),
        };

        let url = doc.str_field(url_field);
        if url.is_empty() {
            self.notifier
                .success(&self.collection, format!("{} deleted successfully!", self.label));
            return Ok((DeleteOutcome::Deleted, seq));
        }

        let blob_result = match self.blobs.path_from_url(url) {
            Ok(path) => self.blobs.delete(&path).await,
            Err(err) => Err(err),
        };
        match blob_result {
            Ok(()) => {
                self.notifier
                    .success(&self.collection, format!("{} deleted successfully!", self.label));
                Ok((DeleteOutcome::DeletedWithBlob, seq))
            }
            Err(err) => {
                tracing::warn!(collection = %self.collection, id = %doc.id, error = %err, "blob left behind");
                self.notifier.notify(
                    NoticeKind::PartialFailure,
                    &self.collection,
                    format!("{} deleted, but its file could not be removed.", self.label),
                );
                Ok((
                    DeleteOutcome::PartiallyFailed {
                        reason: err.to_string(),
                    },
                    seq,
                ))
            }
        }
    }

    fn failed(&self, verb: &str, err: SyncError) -> SyncError {
        self.notifier.error(
            &self.collection,
            format!("Failed to {verb} {}: {err}", self.label.to_lowercase()),
        );
        err
    }
}

impl std::fmt::Debug for MutationGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationGateway")
            .field("collection", &self.collection)
            .field("label", &self.label)
            .finish()
    }
}
