//! Favourite things, each with an optional picture.

use serde::{Deserialize, Serialize};

use crate::{
    core::query::Query,
    document::Fields,
    sync::{Draft, FeatureView, SyncError, ValidationError},
    types::{DocId, SortDirection, TimestampMs, collections, now_ms},
};

use super::{Feature, Record, author_of, fields_of, require, require_text};

/// The favourites list, newest first.
#[derive(Debug, Clone, Copy, Default)]
pub struct Favorites;

impl Feature for Favorites {
    const COLLECTION: &'static str = collections::FAVORITES;
    const LABEL: &'static str = "Favorite";
    type Record = Favorite;

    fn query(&self) -> Query {
        Query::collection(Self::COLLECTION).order_by("timestamp", SortDirection::Desc)
    }
}

/// One favourite.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Favorite {
    /// Document id.
    #[serde(skip)]
    pub id: DocId,
    /// What it is.
    pub name: String,
    /// Picture URL; empty when none was given.
    pub image_url: String,
    /// Who added it.
    pub author: String,
    /// When it was added.
    pub timestamp: TimestampMs,
}

impl Record for Favorite {
    fn set_id(&mut self, id: DocId) {
        self.id = id;
    }
}

/// Input for a new favourite.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFavorite {
    /// Required name.
    pub name: String,
    /// Optional picture URL.
    pub image_url: String,
    /// Author label; `None` when signed out.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Creation time.
    pub timestamp: TimestampMs,
}

impl Draft for NewFavorite {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text(&self.name, "Please enter a name.")?;
        require(self.author.is_some(), "You must be logged in to add favorites.")
    }

    fn to_fields(&self) -> Fields {
        fields_of(self)
    }
}

impl FeatureView<Favorites> {
    /// Adds a favourite as the signed-in user.
    pub async fn add_favorite(&mut self, name: &str, image_url: &str) -> Result<DocId, SyncError> {
        let draft = NewFavorite {
            name: name.to_string(),
            image_url: image_url.to_string(),
            author: author_of(self.identity().as_ref()),
            timestamp: now_ms(),
        };
        self.create(&draft).await
    }
}
