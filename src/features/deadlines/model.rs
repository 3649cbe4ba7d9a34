//! Deadline records and their persisted JSON shape
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0

use crate::core::{BotError, BotResult};
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// Identity of a recipient or origin (user, channel, group)
pub type Identity = i64;

/// Reminder lead times, in days before the due time
pub const REMINDER_OFFSETS_DAYS: [i64; 4] = [0, 1, 3, 5];

/// Format used for due dates in messages and command input
pub const DUE_DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Current local civil time
pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Drop seconds and sub-second precision
pub fn truncate_to_minute(dt: NaiveDateTime) -> NaiveDateTime {
    dt.with_second(0)
        .and_then(|d| d.with_nanosecond(0))
        .unwrap_or(dt)
}

/// A tracked deadline
///
/// Field names on the wire match the historical `deadlines_data.json` layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deadline {
    #[serde(rename = "deadline_id")]
    pub id: u64,

    pub title: String,

    pub subject: String,

    pub description: String,

    /// Local civil due time, minute precision
    #[serde(rename = "due_date", with = "due_date_format")]
    pub due_at: NaiveDateTime,

    pub is_private: bool,

    #[serde(rename = "created_by_id")]
    pub created_by: Identity,

    #[serde(rename = "created_in_chat")]
    pub created_in: Identity,

    /// Creator's display name at creation time
    #[serde(rename = "author_name", default)]
    pub author_display_name: String,
}

impl Deadline {
    /// Due at or after `now`
    pub fn is_active(&self, now: NaiveDateTime) -> bool {
        self.due_at >= now
    }

    pub fn is_expired(&self, now: NaiveDateTime) -> bool {
        self.due_at < now
    }

    /// Private deadlines are only visible to their creator
    pub fn is_visible_to(&self, viewer: Identity) -> bool {
        !self.is_private || self.created_by == viewer
    }

    /// Key used by load-time deduplication
    pub fn dedup_key(&self) -> (String, String, NaiveDateTime, String) {
        (
            self.subject.clone(),
            self.title.clone(),
            self.due_at,
            self.description.clone(),
        )
    }

    pub fn due_display(&self) -> String {
        self.due_at.format(DUE_DISPLAY_FORMAT).to_string()
    }

    pub fn kind_label(&self) -> &'static str {
        if self.is_private {
            "Personal"
        } else {
            "Shared"
        }
    }
}

/// Input for creating a deadline; the registry assigns the id
#[derive(Debug, Clone)]
pub struct NewDeadline {
    pub subject: String,
    pub title: String,
    pub description: String,
    pub due_at: NaiveDateTime,
    pub is_private: bool,
    pub created_by: Identity,
    pub created_in: Identity,
    pub author_display_name: String,
}

impl NewDeadline {
    /// Reject empty required fields and due times not after `now`
    ///
    /// The due time is checked at the minute precision it is stored with.
    pub fn validate(&self, now: NaiveDateTime) -> BotResult<()> {
        if self.subject.trim().is_empty() {
            return Err(BotError::Validation("subject must not be empty".into()));
        }
        if self.title.trim().is_empty() {
            return Err(BotError::Validation("title must not be empty".into()));
        }
        let due_at = truncate_to_minute(self.due_at);
        if due_at <= now {
            return Err(BotError::Validation(format!(
                "due date {} is not in the future",
                due_at.format(DUE_DISPLAY_FORMAT)
            )));
        }
        Ok(())
    }

    pub(crate) fn into_deadline(self, id: u64) -> Deadline {
        Deadline {
            id,
            title: self.title.trim().to_string(),
            subject: self.subject.trim().to_string(),
            description: self.description.trim().to_string(),
            due_at: truncate_to_minute(self.due_at),
            is_private: self.is_private,
            created_by: self.created_by,
            created_in: self.created_in,
            author_display_name: self.author_display_name,
        }
    }
}

/// Temporal part of a listing filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalFilter {
    /// due_at >= now
    Active,
    /// due_at < now
    Expired,
    All,
}

impl std::str::FromStr for TemporalFilter {
    type Err = BotError;

    fn from_str(s: &str) -> BotResult<Self> {
        match s.to_lowercase().as_str() {
            "active" | "actual" => Ok(TemporalFilter::Active),
            "expired" => Ok(TemporalFilter::Expired),
            "all" => Ok(TemporalFilter::All),
            other => Err(BotError::Validation(format!("unknown filter: {other}"))),
        }
    }
}

/// Listing filter: who is asking, and which deadlines by time
#[derive(Debug, Clone, Copy)]
pub struct DeadlineFilter {
    pub viewer: Identity,
    pub state: TemporalFilter,
}

impl DeadlineFilter {
    pub fn active_for(viewer: Identity) -> Self {
        Self {
            viewer,
            state: TemporalFilter::Active,
        }
    }

    pub fn matches(&self, deadline: &Deadline, now: NaiveDateTime) -> bool {
        if !deadline.is_visible_to(self.viewer) {
            return false;
        }
        match self.state {
            TemporalFilter::Active => deadline.is_active(now),
            TemporalFilter::Expired => deadline.is_expired(now),
            TemporalFilter::All => true,
        }
    }
}

/// Parse command input: `YYYY-MM-DD HH:MM`, or a bare date meaning 23:59
pub fn parse_due_input(raw: &str) -> BotResult<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, DUE_DISPLAY_FORMAT) {
        return Ok(dt);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| NaiveTime::from_hms_opt(23, 59, 0).map(|t| date.and_time(t)))
        .ok_or_else(|| {
            BotError::Validation(format!(
                "invalid date '{raw}', expected YYYY-MM-DD HH:MM or YYYY-MM-DD"
            ))
        })
}

/// ISO-8601 local timestamps without offset
///
/// Writes `%Y-%m-%dT%H:%M:%S`; reads that, fractional seconds, or a
/// space-separated variant.
pub(crate) mod due_date_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

    pub fn serialize<S: Serializer>(dt: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&dt.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    pub fn parse(raw: &str) -> Result<NaiveDateTime, String> {
        let raw = raw.trim();
        raw.parse::<NaiveDateTime>()
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M"))
            .map_err(|e| format!("invalid timestamp '{raw}': {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn sample(id: u64, is_private: bool, created_by: Identity) -> Deadline {
        Deadline {
            id,
            title: "HW1".into(),
            subject: "Math".into(),
            description: "Exercises 1-5".into(),
            due_at: at("2030-05-01 12:00"),
            is_private,
            created_by,
            created_in: 456,
            author_display_name: "Test User".into(),
        }
    }

    #[test]
    fn test_wire_format_field_names() {
        let json = serde_json::to_value(sample(1, true, 123)).unwrap();
        let obj = json.as_object().unwrap();
        let mut keys: Vec<&str> = obj.keys().map(|k| k.as_str()).collect();
        keys.sort();
        assert_eq!(
            keys,
            vec![
                "author_name",
                "created_by_id",
                "created_in_chat",
                "deadline_id",
                "description",
                "due_date",
                "is_private",
                "subject",
                "title"
            ]
        );
        assert_eq!(obj["due_date"], "2030-05-01T12:00:00");
    }

    #[test]
    fn test_reads_fractional_iso_timestamps() {
        let json = r#"{
            "deadline_id": 1, "title": "Test", "subject": "Math",
            "description": "Homework", "due_date": "2030-05-01T12:00:31.123456",
            "is_private": true, "created_by_id": 123, "created_in_chat": -456,
            "author_name": "Test User"
        }"#;
        let d: Deadline = serde_json::from_str(json).unwrap();
        assert_eq!(d.created_in, -456);
        assert_eq!(truncate_to_minute(d.due_at), at("2030-05-01 12:00"));
    }

    #[test]
    fn test_missing_author_name_defaults_empty() {
        let json = r#"{
            "deadline_id": 2, "title": "T", "subject": "S", "description": "",
            "due_date": "2030-05-01T12:00:00", "is_private": false,
            "created_by_id": 1, "created_in_chat": 1
        }"#;
        let d: Deadline = serde_json::from_str(json).unwrap();
        assert_eq!(d.author_display_name, "");
    }

    #[test]
    fn test_visibility() {
        assert!(sample(1, false, 1).is_visible_to(2));
        assert!(sample(1, true, 1).is_visible_to(1));
        assert!(!sample(1, true, 1).is_visible_to(2));
    }

    #[test]
    fn test_filter_temporal_states() {
        let d = sample(1, false, 1);
        let before = d.due_at - Duration::minutes(1);
        let after = d.due_at + Duration::minutes(1);

        let active = DeadlineFilter::active_for(9);
        assert!(active.matches(&d, before));
        assert!(active.matches(&d, d.due_at));
        assert!(!active.matches(&d, after));

        let expired = DeadlineFilter {
            viewer: 9,
            state: TemporalFilter::Expired,
        };
        assert!(!expired.matches(&d, before));
        assert!(expired.matches(&d, after));
    }

    #[test]
    fn test_validate_rejects_past_and_empty() {
        let now = at("2030-01-01 00:00");
        let mut new = NewDeadline {
            subject: "Math".into(),
            title: "HW".into(),
            description: String::new(),
            due_at: now + Duration::days(1),
            is_private: false,
            created_by: 1,
            created_in: 1,
            author_display_name: "A".into(),
        };
        assert!(new.validate(now).is_ok());

        new.due_at = now - Duration::minutes(1);
        assert!(matches!(new.validate(now), Err(BotError::Validation(_))));

        new.due_at = now;
        assert!(matches!(new.validate(now), Err(BotError::Validation(_))));

        new.due_at = now + Duration::days(1);
        new.title = "  ".into();
        assert!(matches!(new.validate(now), Err(BotError::Validation(_))));
    }

    #[test]
    fn test_validate_uses_stored_minute() {
        let now = NaiveDateTime::parse_from_str("2030-03-01 10:00:10", "%Y-%m-%d %H:%M:%S").unwrap();
        let mut new = NewDeadline {
            subject: "Math".into(),
            title: "HW".into(),
            description: String::new(),
            due_at: now + Duration::seconds(30),
            is_private: false,
            created_by: 1,
            created_in: 1,
            author_display_name: "A".into(),
        };
        // 10:00:40 would be stored as 10:00, already behind `now`
        assert!(matches!(new.validate(now), Err(BotError::Validation(_))));

        new.due_at = at("2030-03-01 10:01");
        assert!(new.validate(now).is_ok());
        assert_eq!(new.into_deadline(1).due_at, at("2030-03-01 10:01"));
    }

    #[test]
    fn test_parse_due_input() {
        assert_eq!(parse_due_input("2030-05-01 09:30").unwrap(), at("2030-05-01 09:30"));
        assert_eq!(parse_due_input("2030-05-01").unwrap(), at("2030-05-01 23:59"));
        assert!(parse_due_input("tomorrow").is_err());
        assert!(parse_due_input("01.05.2030").is_err());
    }

    #[test]
    fn test_temporal_filter_parse() {
        assert_eq!("Active".parse::<TemporalFilter>().unwrap(), TemporalFilter::Active);
        assert_eq!("expired".parse::<TemporalFilter>().unwrap(), TemporalFilter::Expired);
        assert_eq!("all".parse::<TemporalFilter>().unwrap(), TemporalFilter::All);
        assert!("soon".parse::<TemporalFilter>().is_err());
    }
}
