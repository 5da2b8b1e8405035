//! Category boards of posts with embedded reply threads.

use serde::{Deserialize, Serialize};

use crate::{
    auth::Route,
    core::query::Query,
    document::Fields,
    sync::{Draft, FeatureView, SyncError, ValidationError},
    types::{DocId, SortDirection, TimestampMs, collections, now_ms},
};

use super::{Feature, Record, author_of, fields_of, require, require_text};

/// Array field holding a post's replies.
pub const REPLIES: &str = "replies";

/// Posts of one category, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posts {
    /// Category every post of this board carries.
    pub category: String,
}

impl Posts {
    /// Board for an arbitrary category.
    pub fn category(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
        }
    }

    /// The board rendered by `route`, if it renders one.
    pub fn for_route(route: Route) -> Option<Self> {
        let category = match route {
            Route::Home => "home",
            Route::Mistakes => "mistakes",
            Route::LikesDislikes => "likesAndDislikes",
            _ => return None,
        };
        Some(Self::category(category))
    }
}

impl Feature for Posts {
    const COLLECTION: &'static str = collections::POSTS;
    const LABEL: &'static str = "Post";
    type Record = Post;

    fn query(&self) -> Query {
        Query::collection(Self::COLLECTION)
            .where_eq("category", self.category.as_str())
            .order_by("timestamp", SortDirection::Desc)
    }
}

/// One post. Posts written before replies existed decode with none.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Post {
    /// Document id.
    #[serde(skip)]
    pub id: DocId,
    /// Post body.
    pub message: String,
    /// Board the post belongs to.
    pub category: String,
    /// Author label at posting time.
    pub author: String,
    /// Posting time.
    pub timestamp: TimestampMs,
    /// Replies in append order.
    pub replies: Vec<Reply>,
}

impl Record for Post {
    fn set_id(&mut self, id: DocId) {
        self.id = id;
    }
}

/// One reply inside a post.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Reply {
    /// Reply body.
    pub message: String,
    /// Author label at reply time.
    pub author: String,
    /// Reply time.
    pub timestamp: TimestampMs,
}

/// Input for a new post.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPost {
    /// Post body; must not be blank.
    pub message: String,
    /// Target board.
    pub category: String,
    /// Author label; `None` when signed out.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Posting time.
    pub timestamp: TimestampMs,
    /// Always empty for a new post.
    pub replies: Vec<Reply>,
}

impl Draft for NewPost {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text(&self.message, "Please enter a message.")?;
        require(self.author.is_some(), "You must be logged in to post.")
    }

    fn to_fields(&self) -> Fields {
        fields_of(self)
    }
}

/// Input for a reply appended to the selected post.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReply {
    /// Reply body; must not be blank.
    pub message: String,
    /// Author label; `None` when signed out.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Reply time.
    pub timestamp: TimestampMs,
}

impl Draft for NewReply {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text(&self.message, "Please enter a reply.")?;
        require(self.author.is_some(), "You must be logged in to reply.")
    }

    fn to_fields(&self) -> Fields {
        fields_of(self)
    }

    fn noun(&self) -> &'static str {
        "Reply"
    }
}

impl FeatureView<Posts> {
    /// Posts `message` to this board as the signed-in user.
    pub async fn add_post(&mut self, message: &str) -> Result<DocId, SyncError> {
        let draft = NewPost {
            message: message.to_string(),
            category: self.feature().category.clone(),
            author: author_of(self.identity().as_ref()),
            timestamp: now_ms(),
            replies: Vec::new(),
        };
        self.create(&draft).await
    }

    /// Replies to the open post.
    pub async fn add_reply(&mut self, message: &str) -> Result<(), SyncError> {
        let draft = NewReply {
            message: message.to_string(),
            author: author_of(self.identity().as_ref()),
            timestamp: now_ms(),
        };
        self.append_to_selected(REPLIES, &draft).await
    }
}
