//! Saved Instagram reels.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    document::Fields,
    sync::{Draft, FeatureView, SyncError, ValidationError},
    types::{DocId, collections},
};

use super::{Feature, Record, fields_of};

static REEL_ID: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?:reel|p)/([A-Za-z0-9_-]+)").ok());

/// Extracts the reel id from a reel or post URL.
pub fn extract_reel_id(url: &str) -> Option<&str> {
    REEL_ID
        .as_ref()?
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// The saved-reels list.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reels;

impl Feature for Reels {
    const COLLECTION: &'static str = collections::REELS;
    const LABEL: &'static str = "Reel";
    type Record = Reel;
}

/// One saved reel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Reel {
    /// Document id.
    #[serde(skip)]
    pub id: DocId,
    /// Id extracted from the URL.
    pub reel_id: String,
    /// URL as pasted.
    pub url: String,
    /// Optional caption.
    pub name: String,
}

impl Record for Reel {
    fn set_id(&mut self, id: DocId) {
        self.id = id;
    }
}

/// Input for a new reel; the id is derived from the URL.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReel {
    /// Extracted id; `None` when the URL is not a reel.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reel_id: Option<String>,
    /// URL as pasted.
    pub url: String,
    /// Optional caption.
    pub name: String,
}

impl NewReel {
    /// Parses `url` into a draft.
    pub fn new(url: &str, name: &str) -> Self {
        Self {
            reel_id: extract_reel_id(url).map(str::to_string),
            url: url.to_string(),
            name: name.to_string(),
        }
    }
}

impl Draft for NewReel {
    fn validate(&self) -> Result<(), ValidationError> {
        match self.reel_id {
            Some(_) => Ok(()),
            None => Err(ValidationError::new("Please enter a valid Instagram Reel URL")),
        }
    }

    fn to_fields(&self) -> Fields {
        fields_of(self)
    }
}

impl FeatureView<Reels> {
    /// Saves a reel by URL.
    pub async fn add_reel(&mut self, url: &str, name: &str) -> Result<DocId, SyncError> {
        self.create(&NewReel::new(url, name)).await
    }
}
