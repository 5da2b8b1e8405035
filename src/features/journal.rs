//! Relationship journal: daily, special and sad events.

use serde::{Deserialize, Serialize};

use crate::{
    core::query::Query,
    document::Fields,
    sync::{Draft, FeatureView, SyncError, ValidationError},
    types::{DocId, SortDirection, TimestampMs, collections, now_ms},
};

use super::{Feature, Record, fields_of, require, require_text};

/// Journal tab an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Everyday moments.
    Daily,
    /// Milestones.
    Special,
    /// Hard days.
    Sad,
}

impl EventKind {
    /// Parses the stored spelling.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "daily" => Some(EventKind::Daily),
            "special" => Some(EventKind::Special),
            "sad" => Some(EventKind::Sad),
            _ => None,
        }
    }
}

/// All journal events, oldest first.
#[derive(Debug, Clone, Copy, Default)]
pub struct Journal;

impl Feature for Journal {
    const COLLECTION: &'static str = collections::EVENTS;
    const LABEL: &'static str = "Event";
    type Record = JournalEvent;

    fn query(&self) -> Query {
        Query::collection(Self::COLLECTION).order_by("timestamp", SortDirection::Asc)
    }
}

/// One journal event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JournalEvent {
    /// Document id.
    #[serde(skip)]
    pub id: DocId,
    /// Stored tab name; see [`EventKind`].
    #[serde(rename = "type")]
    pub kind: String,
    /// What happened.
    pub description: String,
    /// When it was written.
    pub timestamp: TimestampMs,
    /// Writer's uid.
    pub user: String,
    /// Writer's display name.
    pub username: String,
}

impl Record for JournalEvent {
    fn set_id(&mut self, id: DocId) {
        self.id = id;
    }
}

/// Events split by tab.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupedEvents {
    /// `daily` events.
    pub daily: Vec<JournalEvent>,
    /// `special` events.
    pub special: Vec<JournalEvent>,
    /// `sad` events.
    pub sad: Vec<JournalEvent>,
}

impl GroupedEvents {
    /// Events of one tab.
    pub fn of(&self, kind: EventKind) -> &[JournalEvent] {
        match kind {
            EventKind::Daily => &self.daily,
            EventKind::Special => &self.special,
            EventKind::Sad => &self.sad,
        }
    }
}

/// Splits `events` by tab, keeping their order. Events of an unknown type
/// are left out.
pub fn group_events(events: impl IntoIterator<Item = JournalEvent>) -> GroupedEvents {
    let mut grouped = GroupedEvents::default();
    for event in events {
        match EventKind::parse(&event.kind) {
            Some(EventKind::Daily) => grouped.daily.push(event),
            Some(EventKind::Special) => grouped.special.push(event),
            Some(EventKind::Sad) => grouped.sad.push(event),
            None => tracing::warn!(id = %event.id, kind = %event.kind, "unexpected event type"),
        }
    }
    grouped
}

/// Input for a journal event.
#[derive(Debug, Clone, Serialize)]
pub struct NewEvent {
    /// Target tab.
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Required text.
    pub description: String,
    /// Entry time.
    pub timestamp: TimestampMs,
    /// Writer's uid; `None` when signed out.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Writer's display name.
    pub username: String,
}

impl Draft for NewEvent {
    fn validate(&self) -> Result<(), ValidationError> {
        require(self.user.is_some(), "You must be logged in to add events!")?;
        require_text(&self.description, "Please describe the event.")
    }

    fn to_fields(&self) -> Fields {
        fields_of(self)
    }
}

impl FeatureView<Journal> {
    /// Adds an event to the `kind` tab as the signed-in user.
    pub async fn add_event(&mut self, kind: EventKind, description: &str) -> Result<DocId, SyncError> {
        let who = self.identity();
        let draft = NewEvent {
            kind,
            description: description.to_string(),
            timestamp: now_ms(),
            user: who.as_ref().map(|w| w.uid.clone()),
            username: who.and_then(|w| w.display_name).unwrap_or_default(),
        };
        self.create(&draft).await
    }

    /// Current events split by tab.
    pub fn grouped(&self) -> GroupedEvents {
        group_events(self.records())
    }
}
