//! Shared shopping list.

use serde::{Deserialize, Serialize};

use crate::{
    core::query::Query,
    document::{Fields, FieldPatch},
    sync::{Draft, FeatureView, SyncError, ValidationError},
    types::{DocId, SortDirection, TimestampMs, collections, now_ms},
};

use super::{Feature, Record, fields_of, require_text};

/// The shopping list, most recently added first.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShoppingList;

impl Feature for ShoppingList {
    const COLLECTION: &'static str = collections::SHOPPING_LIST;
    const LABEL: &'static str = "Item";
    type Record = ShoppingItem;

    fn query(&self) -> Query {
        Query::collection(Self::COLLECTION).order_by("createdAt", SortDirection::Desc)
    }
}

/// One item. Items saved before `createdAt` existed read as the epoch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ShoppingItem {
    /// Document id.
    #[serde(skip)]
    pub id: DocId,
    /// What to buy.
    pub name: String,
    /// Shop link.
    pub link: String,
    /// Picture URL, possibly empty.
    pub image: String,
    /// When it was added.
    pub created_at: TimestampMs,
}

impl Record for ShoppingItem {
    fn set_id(&mut self, id: DocId) {
        self.id = id;
    }
}

/// Input for a new item.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItem {
    /// Required name.
    pub name: String,
    /// Shop link.
    pub link: String,
    /// Optional picture URL.
    pub image: String,
    /// Creation time.
    pub created_at: TimestampMs,
}

impl NewItem {
    /// Item stamped with the current time.
    pub fn new(name: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            link: link.into(),
            image: String::new(),
            created_at: now_ms(),
        }
    }
}

impl Draft for NewItem {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text(&self.name, "Please enter an item name.")
    }

    fn to_fields(&self) -> Fields {
        fields_of(self)
    }
}

impl FeatureView<ShoppingList> {
    /// Adds an item to the list.
    pub async fn add_item(&mut self, name: &str, link: &str) -> Result<DocId, SyncError> {
        self.create(&NewItem::new(name, link)).await
    }

    /// Stamps `createdAt` onto every visible item that lacks one. Returns
    /// how many were updated; stops at the first failure.
    pub async fn backfill_created_at(&mut self) -> Result<usize, SyncError> {
        let legacy: Vec<DocId> = self
            .documents()
            .into_iter()
            .filter(|doc| doc.field("createdAt").is_none())
            .map(|doc| doc.id)
            .collect();
        for id in &legacy {
            self.patch(id, FieldPatch::new().with("createdAt", now_ms())).await?;
        }
        Ok(legacy.len())
    }
}
