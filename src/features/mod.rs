//! Per-collection instantiations of the synchronization pattern.
//!
//! Each feature names its collection, the query its view subscribes with,
//! and the typed record its documents decode into. Feature-specific writes
//! are inherent methods on [`FeatureView`](crate::sync::FeatureView) of
//! that feature.

pub mod countdown;
pub mod favorites;
pub mod journal;
pub mod media;
pub mod moods;
pub mod posts;
pub mod profile;
pub mod reels;
pub mod shopping;
pub mod songs;
pub mod stories;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{
    auth::Identity,
    core::query::Query,
    document::{Document, Fields},
    sync::ValidationError,
    types::DocId,
};

/// One collection-backed feature.
pub trait Feature: Send + Sync + 'static {
    /// Collection the feature reads and writes.
    const COLLECTION: &'static str;
    /// Record name used in notices ("Item", "Post").
    const LABEL: &'static str;
    /// Typed view of one document.
    type Record: Record;

    /// Query the feature's view subscribes with.
    fn query(&self) -> Query {
        Query::collection(Self::COLLECTION)
    }
}

/// Typed decoding of a document. Missing fields take their defaults, so
/// legacy documents never fail to render.
pub trait Record: DeserializeOwned + Default + Clone + Send + 'static {
    /// Stores the document id on the decoded record.
    fn set_id(&mut self, id: DocId);

    /// Decodes `doc`, falling back to an empty record when its fields have
    /// the wrong shape.
    fn from_document(doc: &Document) -> Self {
        let mut record = match serde_json::from_value::<Self>(Value::Object(doc.fields.clone())) {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(id = %doc.id, %err, "document does not decode; using defaults");
                Self::default()
            }
        };
        record.set_id(doc.id.clone());
        record
    }
}

/// Serializes a draft into document fields.
pub(crate) fn fields_of(draft: &impl Serialize) -> Fields {
    match serde_json::to_value(draft) {
        Ok(Value::Object(fields)) => fields,
        Ok(_) | Err(_) => Fields::new(),
    }
}

pub(crate) fn require(ok: bool, message: &str) -> Result<(), ValidationError> {
    if ok { Ok(()) } else { Err(ValidationError::new(message)) }
}

pub(crate) fn require_text(value: &str, message: &str) -> Result<(), ValidationError> {
    require(!value.trim().is_empty(), message)
}

/// Author label of the signed-in user, if any.
pub(crate) fn author_of(identity: Option<&Identity>) -> Option<String> {
    identity.map(Identity::author_label)
}
