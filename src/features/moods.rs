//! Daily mood check-ins and period logs.

use std::{fmt, str::FromStr};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    core::query::Query,
    document::Fields,
    sync::{Draft, FeatureView, SyncError, ValidationError},
    types::{DocId, SortDirection, TimestampMs, collections, now_ms},
};

use super::{Feature, Record, fields_of, require};

/// Timer key of the comfort flower shown after a `Down` check-in.
pub const FLOWER_TIMER: &str = "flower";

/// Check-in options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mood {
    /// Feeling good.
    Happy,
    /// Neither here nor there.
    Okay,
    /// Feeling low.
    Down,
}

impl Mood {
    /// Stored spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            Mood::Happy => "Happy",
            Mood::Okay => "Okay",
            Mood::Down => "Down",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mood {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Happy" => Ok(Mood::Happy),
            "Okay" => Ok(Mood::Okay),
            "Down" => Ok(Mood::Down),
            other => Err(ValidationError::new(format!("Unknown mood: {other}"))),
        }
    }
}

/// Mood check-ins, newest first.
#[derive(Debug, Clone, Copy, Default)]
pub struct Moods;

impl Feature for Moods {
    const COLLECTION: &'static str = collections::MOODS;
    const LABEL: &'static str = "Mood";
    type Record = MoodEntry;

    fn query(&self) -> Query {
        Query::collection(Self::COLLECTION).order_by("timestamp", SortDirection::Desc)
    }
}

/// One check-in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MoodEntry {
    /// Document id.
    #[serde(skip)]
    pub id: DocId,
    /// Stored mood text.
    pub mood: String,
    /// Check-in time.
    pub timestamp: TimestampMs,
}

impl MoodEntry {
    /// The mood, when it is one of the known options.
    pub fn mood(&self) -> Option<Mood> {
        self.mood.parse().ok()
    }
}

impl Record for MoodEntry {
    fn set_id(&mut self, id: DocId) {
        self.id = id;
    }
}

/// Input for a check-in; `mood` is `None` until the user picks one.
#[derive(Debug, Clone, Serialize)]
pub struct NewMood {
    /// Picked mood.
    pub mood: Option<Mood>,
    /// Check-in time.
    pub timestamp: TimestampMs,
}

impl Draft for NewMood {
    fn validate(&self) -> Result<(), ValidationError> {
        require(self.mood.is_some(), "Please choose a mood.")
    }

    fn to_fields(&self) -> Fields {
        fields_of(self)
    }
}

/// Check-ins per mood.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MoodCounts {
    /// `Happy` check-ins.
    pub happy: usize,
    /// `Okay` check-ins.
    pub okay: usize,
    /// `Down` check-ins.
    pub down: usize,
}

impl FeatureView<Moods> {
    /// Logs a check-in. A `Down` mood also shows the flower for the
    /// configured transient delay.
    pub async fn log_mood(&mut self, mood: Option<Mood>) -> Result<DocId, SyncError> {
        let draft = NewMood {
            mood,
            timestamp: now_ms(),
        };
        let id = self.create(&draft).await?;
        if mood == Some(Mood::Down) {
            self.schedule_transient(FLOWER_TIMER);
        }
        Ok(id)
    }

    /// True while the flower should be on screen.
    pub fn flower_visible(&self) -> bool {
        self.timers().is_pending(FLOWER_TIMER)
    }

    /// Tally of the current view, always recomputed from the mirror.
    pub fn mood_counts(&self) -> MoodCounts {
        self.records()
            .iter()
            .filter_map(MoodEntry::mood)
            .fold(MoodCounts::default(), |mut counts, mood| {
                match mood {
                    Mood::Happy => counts.happy += 1,
                    Mood::Okay => counts.okay += 1,
                    Mood::Down => counts.down += 1,
                }
                counts
            })
    }
}

/// Period logs, most recent start first.
#[derive(Debug, Clone, Copy, Default)]
pub struct Periods;

impl Feature for Periods {
    const COLLECTION: &'static str = collections::PERIODS;
    const LABEL: &'static str = "Period";
    type Record = PeriodLog;

    fn query(&self) -> Query {
        Query::collection(Self::COLLECTION).order_by("startDate", SortDirection::Desc)
    }
}

/// One logged period.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PeriodLog {
    /// Document id.
    #[serde(skip)]
    pub id: DocId,
    /// First day.
    pub start_date: Option<NaiveDate>,
    /// Last day, once known.
    pub end_date: Option<NaiveDate>,
    /// Free-text notes.
    pub notes: String,
    /// When the entry was written.
    pub timestamp: TimestampMs,
}

impl PeriodLog {
    /// Length in days, both ends included.
    pub fn length_days(&self) -> Option<i64> {
        let (start, end) = (self.start_date?, self.end_date?);
        Some((end - start).num_days() + 1)
    }
}

impl Record for PeriodLog {
    fn set_id(&mut self, id: DocId) {
        self.id = id;
    }
}

/// Input for a period log.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPeriod {
    /// Required first day.
    pub start_date: Option<NaiveDate>,
    /// Optional last day; not before the first.
    pub end_date: Option<NaiveDate>,
    /// Free-text notes.
    pub notes: String,
    /// Entry time.
    pub timestamp: TimestampMs,
}

impl Draft for NewPeriod {
    fn validate(&self) -> Result<(), ValidationError> {
        let Some(start) = self.start_date else {
            return Err(ValidationError::new("Please pick a start date."));
        };
        require(
            self.end_date.is_none_or(|end| end >= start),
            "End date cannot be before the start date.",
        )
    }

    fn to_fields(&self) -> Fields {
        fields_of(self)
    }
}

impl FeatureView<Periods> {
    /// Logs a period.
    pub async fn log_period(
        &mut self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
        notes: &str,
    ) -> Result<DocId, SyncError> {
        let draft = NewPeriod {
            start_date,
            end_date,
            notes: notes.to_string(),
            timestamp: now_ms(),
        };
        self.create(&draft).await
    }
}
