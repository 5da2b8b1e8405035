//! Shared songs.

use serde::{Deserialize, Serialize};

use crate::{
    core::query::Query,
    document::Fields,
    sync::{Draft, FeatureView, SyncError, ValidationError},
    types::{DocId, SortDirection, TimestampMs, collections, now_ms},
};

use super::{Feature, Record, author_of, fields_of, require, require_text};

/// The song list, newest first.
#[derive(Debug, Clone, Copy, Default)]
pub struct Songs;

impl Feature for Songs {
    const COLLECTION: &'static str = collections::SONGS;
    const LABEL: &'static str = "Song";
    type Record = Song;

    fn query(&self) -> Query {
        Query::collection(Self::COLLECTION).order_by("timestamp", SortDirection::Desc)
    }
}

/// One song.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Song {
    /// Document id.
    #[serde(skip)]
    pub id: DocId,
    /// Title.
    pub name: String,
    /// Where to listen to it.
    pub link: String,
    /// Thumbnail URL, possibly empty.
    pub image: String,
    /// Who shared it.
    pub author: String,
    /// When it was shared.
    pub timestamp: TimestampMs,
}

impl Record for Song {
    fn set_id(&mut self, id: DocId) {
        self.id = id;
    }
}

/// Input for a new song.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSong {
    /// Required title.
    pub name: String,
    /// Required link.
    pub link: String,
    /// Optional thumbnail URL.
    pub image: String,
    /// Author label; `None` when signed out.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Creation time.
    pub timestamp: TimestampMs,
}

impl Draft for NewSong {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text(&self.name, "Please enter a song name and link.")?;
        require_text(&self.link, "Please enter a song name and link.")?;
        require(self.author.is_some(), "You must be logged in to add songs.")
    }

    fn to_fields(&self) -> Fields {
        fields_of(self)
    }
}

impl FeatureView<Songs> {
    /// Shares a song as the signed-in user.
    pub async fn add_song(&mut self, name: &str, link: &str, image: &str) -> Result<DocId, SyncError> {
        let draft = NewSong {
            name: name.to_string(),
            link: link.to_string(),
            image: image.to_string(),
            author: author_of(self.identity().as_ref()),
            timestamp: now_ms(),
        };
        self.create(&draft).await
    }
}
