//! Photo and video gallery backed by blob storage.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    blob::media_path,
    core::query::Query,
    document::Fields,
    sync::{DeleteOutcome, Draft, FeatureView, SyncError, ValidationError},
    types::{DocId, SortDirection, TimestampMs, collections, now_ms},
};

use super::{Feature, Record, require};

/// Field holding the blob download URL.
pub const URL_FIELD: &str = "url";

/// The gallery, newest first.
#[derive(Debug, Clone, Copy, Default)]
pub struct MediaLibrary;

impl Feature for MediaLibrary {
    const COLLECTION: &'static str = collections::MEDIA;
    const LABEL: &'static str = "Media";
    type Record = MediaItem;

    fn query(&self) -> Query {
        Query::collection(Self::COLLECTION).order_by("createdAt", SortDirection::Desc)
    }
}

/// One uploaded file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MediaItem {
    /// Document id.
    #[serde(skip)]
    pub id: DocId,
    /// Display name.
    pub name: String,
    /// Caption.
    pub caption: String,
    /// Blob download URL.
    pub url: String,
    /// Lower-cased file extension (`jpg`, `mp4`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Upload time.
    pub created_at: TimestampMs,
}

impl MediaItem {
    /// True for common video extensions.
    pub fn is_video(&self) -> bool {
        matches!(self.kind.as_str(), "mp4" | "mov" | "webm" | "avi" | "mkv")
    }
}

impl Record for MediaItem {
    fn set_id(&mut self, id: DocId) {
        self.id = id;
    }
}

/// A file to upload with its display metadata.
#[derive(Debug, Clone)]
pub struct Upload {
    /// Original file name; decides the blob path and `type`.
    pub file_name: String,
    /// File content.
    pub bytes: Vec<u8>,
    /// Display name.
    pub name: String,
    /// Caption.
    pub caption: String,
}

impl Upload {
    /// Lower-cased extension of the file name.
    pub fn kind(&self) -> String {
        self.file_name
            .rsplit('.')
            .next()
            .unwrap_or_default()
            .to_lowercase()
    }
}

impl Draft for Upload {
    fn validate(&self) -> Result<(), ValidationError> {
        require(
            !self.bytes.is_empty()
                && !self.file_name.trim().is_empty()
                && !self.name.trim().is_empty()
                && !self.caption.trim().is_empty(),
            "Please provide a file, name, and caption.",
        )
    }

    /// Metadata fields; the URL is added once the blob is stored.
    fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("name".into(), Value::from(self.name.as_str()));
        fields.insert("caption".into(), Value::from(self.caption.as_str()));
        fields.insert("type".into(), Value::from(self.kind()));
        fields.insert("createdAt".into(), Value::from(now_ms()));
        fields
    }
}

impl FeatureView<MediaLibrary> {
    /// Stores the file under `media/<file name>` and records it in the
    /// gallery. A blob whose document cannot be written is removed again.
    pub async fn upload(&mut self, upload: Upload) -> Result<DocId, SyncError> {
        self.gateway().check(&upload)?;
        let blobs = Arc::clone(self.gateway().blobs());
        let path = media_path(&upload.file_name);

        let url = match blobs.upload(&path, upload.bytes.clone()).await {
            Ok(url) => url,
            Err(err) => {
                self.notifier()
                    .error(MediaLibrary::COLLECTION, format!("Upload failed: {err}"));
                return Err(err.into());
            }
        };

        let mut fields = upload.to_fields();
        fields.insert(URL_FIELD.into(), Value::from(url));
        match self.insert_fields(fields).await {
            Ok(id) => Ok(id),
            Err(err) => {
                if let Err(cleanup) = blobs.delete(&path).await {
                    tracing::warn!(%path, error = %cleanup, "orphaned upload not removed");
                }
                Err(err)
            }
        }
    }

    /// Deletes the gallery entry, then its blob.
    pub async fn delete_media(&mut self, id: &str) -> Result<DeleteOutcome, SyncError> {
        self.delete_with_blob(id, URL_FIELD).await
    }
}
