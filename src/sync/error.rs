//! Client-layer error taxonomy.

use thiserror::Error;

use crate::{blob::BlobError, types::DocId};

use super::backend::BackendError;

/// Required input missing or malformed; raised before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    /// User-facing explanation.
    pub message: String,
}

impl ValidationError {
    /// Builds a validation error from display text.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Failures surfaced to a feature view. None of them is fatal.
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    /// Input rejected client-side; nothing was sent.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    /// Read or write failed at the backend or in transit.
    #[error(transparent)]
    Backend(#[from] BackendError),
    /// Object storage failed.
    #[error(transparent)]
    Blob(#[from] BlobError),
    /// The document is not in the current mirror.
    #[error("document {0} not found")]
    NotFound(DocId),
    /// The operation needs an open detail view.
    #[error("no document selected")]
    NoSelection,
}
