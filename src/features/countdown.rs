//! Countdowns to upcoming occasions.

use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    core::query::Query,
    document::Fields,
    sync::{Draft, FeatureView, SyncError, ValidationError},
    types::{DocId, SortDirection, collections},
};

use super::{Feature, Record, require_text};

/// Label once the target moment is reached.
pub const PASSED: &str = "Event has passed";

/// Countdown timers, soonest first.
#[derive(Debug, Clone, Copy, Default)]
pub struct Countdowns;

impl Feature for Countdowns {
    const COLLECTION: &'static str = collections::TIMERS;
    const LABEL: &'static str = "Timer";
    type Record = Countdown;

    fn query(&self) -> Query {
        Query::collection(Self::COLLECTION).order_by("targetDate", SortDirection::Asc)
    }
}

/// One countdown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Countdown {
    /// Document id.
    #[serde(skip)]
    pub id: DocId,
    /// What is being counted down to.
    pub occasion_name: String,
    /// Target moment as RFC 3339 text.
    pub target_date: String,
    /// `HH:MM` as entered, or empty for midnight.
    pub time: String,
}

impl Countdown {
    /// Target moment, when the stored text parses.
    pub fn target(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.target_date)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }

    /// Time-left label relative to `now`; unparseable targets read as
    /// passed.
    pub fn time_left(&self, now: DateTime<Utc>) -> String {
        match self.target() {
            Some(target) => time_left_label(target - now),
            None => PASSED.to_string(),
        }
    }
}

impl Record for Countdown {
    fn set_id(&mut self, id: DocId) {
        self.id = id;
    }
}

/// Coarsest non-zero unit of `remaining`: days, else hours, else minutes.
pub fn time_left_label(remaining: TimeDelta) -> String {
    if remaining <= TimeDelta::zero() {
        return PASSED.to_string();
    }
    let (days, hours) = (remaining.num_days(), remaining.num_hours() % 24);
    if days > 0 {
        format!("{days} days left")
    } else if hours > 0 {
        format!("{hours} hours left")
    } else {
        format!("{} minutes left", remaining.num_minutes() % 60)
    }
}

/// Input for a countdown: the occasion plus date and optional time as
/// typed.
#[derive(Debug, Clone, Default)]
pub struct NewCountdown {
    /// Required occasion name.
    pub occasion_name: String,
    /// Required `YYYY-MM-DD`.
    pub date: String,
    /// Optional `HH:MM`.
    pub time: String,
}

impl NewCountdown {
    /// Combined target moment, when date and time parse.
    pub fn target(&self) -> Option<DateTime<Utc>> {
        let date = NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d").ok()?;
        let time = match self.time.trim() {
            "" => NaiveTime::from_hms_opt(0, 0, 0)?,
            raw => NaiveTime::parse_from_str(raw, "%H:%M").ok()?,
        };
        Some(date.and_time(time).and_utc())
    }
}

impl Draft for NewCountdown {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text(&self.occasion_name, "Please enter occasion name and date.")?;
        require_text(&self.date, "Please enter occasion name and date.")?;
        match self.target() {
            Some(_) => Ok(()),
            None => Err(ValidationError::new("Invalid date or time provided.")),
        }
    }

    fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("occasionName".into(), Value::from(self.occasion_name.trim()));
        if let Some(target) = self.target() {
            fields.insert(
                "targetDate".into(),
                Value::from(target.to_rfc3339_opts(SecondsFormat::Millis, true)),
            );
        }
        fields.insert("time".into(), Value::from(self.time.trim()));
        fields
    }
}

impl FeatureView<Countdowns> {
    /// Adds a countdown.
    pub async fn add_countdown(&mut self, draft: &NewCountdown) -> Result<DocId, SyncError> {
        self.create(draft).await
    }

    /// Replaces a countdown's occasion and target.
    pub async fn edit_countdown(&mut self, id: &str, draft: &NewCountdown) -> Result<(), SyncError> {
        self.update(id, draft).await
    }

    /// `(countdown, label)` for every visible countdown at `now`.
    pub fn labels_at(&self, now: DateTime<Utc>) -> Vec<(Countdown, String)> {
        self.records()
            .into_iter()
            .map(|c| {
                let label = c.time_left(now);
                (c, label)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_use_the_coarsest_unit() {
        assert_eq!(time_left_label(TimeDelta::days(3) + TimeDelta::hours(5)), "3 days left");
        assert_eq!(time_left_label(TimeDelta::hours(5) + TimeDelta::minutes(1)), "5 hours left");
        assert_eq!(time_left_label(TimeDelta::minutes(42)), "42 minutes left");
        assert_eq!(time_left_label(TimeDelta::seconds(30)), "0 minutes left");
        assert_eq!(time_left_label(TimeDelta::zero()), PASSED);
        assert_eq!(time_left_label(TimeDelta::minutes(-5)), PASSED);
    }

    #[test]
    fn drafts_combine_date_and_time() {
        let draft = NewCountdown {
            occasion_name: "Anniversary".into(),
            date: "2025-02-14".into(),
            time: "19:30".into(),
        };
        assert!(draft.validate().is_ok());
        assert_eq!(draft.to_fields()["targetDate"], "2025-02-14T19:30:00.000Z");

        let bad = NewCountdown {
            time: "25:99".into(),
            ..draft.clone()
        };
        assert_eq!(
            bad.validate().map_err(|e| e.message),
            Err("Invalid date or time provided.".to_string())
        );
        let blank = NewCountdown::default();
        assert!(blank.validate().is_err());
    }

    #[test]
    fn stored_targets_round_through_labels() {
        let c = Countdown {
            target_date: "2025-02-14T19:30:00.000Z".into(),
            ..Countdown::default()
        };
        let now = DateTime::parse_from_rfc3339("2025-02-12T19:00:00Z")
            .map(|t| t.with_timezone(&Utc))
            .expect("now");
        assert_eq!(c.time_left(now), "2 days left");
        assert_eq!(Countdown::default().time_left(now), PASSED);
    }
}
