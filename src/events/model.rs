use crate::backend::{BackendError, BackendResult, Record};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Review state of a submitted event. Rows without one predate review and
/// are listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Pending,
    Approved,
    Rejected,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Pending => "pending",
            EventStatus::Approved => "approved",
            EventStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Free-form as entered by the host, see [`parse_event_date`].
    pub date: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub participants: u32,
    #[serde(default, alias = "image_url", skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criteria: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<EventStatus>,
    /// Host who submitted the event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl Event {
    /// Decodes a backend row. Numeric identifiers are accepted and kept as
    /// text.
    pub fn from_record(mut record: Record) -> BackendResult<Self> {
        if let Some(Value::Number(id)) = record.get("id") {
            let id = id.to_string();
            record.insert("id".into(), Value::String(id));
        }
        serde_json::from_value(Value::Object(record))
            .map_err(|e| BackendError::Decode(format!("event row: {e}")))
    }

    pub fn starts_on(&self) -> Option<NaiveDate> {
        parse_event_date(&self.date)
    }

    /// Whether the event shows up in public listings.
    pub fn is_listed(&self) -> bool {
        matches!(self.status, None | Some(EventStatus::Approved))
    }
}

/// Calendar day an event starts on.
///
/// Accepts RFC 3339 timestamps, `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM:SS`,
/// `April 15, 2025` and day ranges such as `April 15-17, 2025` (first day).
pub fn parse_event_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.date_naive());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(ts.date());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%B %d, %Y") {
        return Some(date);
    }

    let (start, rest) = raw.split_once('-')?;
    let (_, year) = rest.split_once(',')?;
    NaiveDate::parse_from_str(&format!("{},{}", start.trim_end(), year), "%B %d, %Y").ok()
}
