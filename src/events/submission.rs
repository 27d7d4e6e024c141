use super::model::{EventStatus, parse_event_date};
use crate::auth::User;
use crate::backend::{BackendError, Record};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

const MIN_TITLE: usize = 5;
const MIN_DESCRIPTION: usize = 20;
const MIN_LOCATION: usize = 3;

/// Event proposed by a host. Stored as pending until an admin reviews it.
#[derive(Debug, Clone, Deserialize)]
pub struct EventSubmission {
    pub title: String,
    pub description: String,
    pub date: String,
    pub location: String,
    #[serde(default)]
    pub criteria: Option<String>,
    #[serde(default, alias = "imageUrl")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionInvalid {
    #[error("Title must be at least 5 characters.")]
    TitleTooShort,
    #[error("Description must be at least 20 characters.")]
    DescriptionTooShort,
    #[error("Event date is required.")]
    MissingDate,
    #[error("Location must be at least 3 characters.")]
    LocationTooShort,
    #[error("Invalid URL format.")]
    InvalidImageUrl,
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Invalid(#[from] SubmissionInvalid),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

fn long_enough(text: &str, min: usize) -> bool {
    text.trim().chars().count() >= min
}

fn non_empty(text: &Option<String>) -> Option<&str> {
    text.as_deref().map(str::trim).filter(|t| !t.is_empty())
}

fn is_web_url(raw: &str) -> bool {
    ["https://", "http://"]
        .iter()
        .filter_map(|scheme| raw.strip_prefix(scheme))
        .any(|rest| rest.split('/').next().is_some_and(|host| !host.is_empty()))
}

impl EventSubmission {
    /// Checks every field, reporting the first problem in form order.
    pub fn validate(&self) -> Result<(), SubmissionInvalid> {
        if !long_enough(&self.title, MIN_TITLE) {
            return Err(SubmissionInvalid::TitleTooShort);
        }
        if !long_enough(&self.description, MIN_DESCRIPTION) {
            return Err(SubmissionInvalid::DescriptionTooShort);
        }
        if parse_event_date(&self.date).is_none() {
            return Err(SubmissionInvalid::MissingDate);
        }
        if !long_enough(&self.location, MIN_LOCATION) {
            return Err(SubmissionInvalid::LocationTooShort);
        }
        if non_empty(&self.image_url).is_some_and(|url| !is_web_url(url)) {
            return Err(SubmissionInvalid::InvalidImageUrl);
        }
        Ok(())
    }

    /// Backend row for a validated submission: pending, owned by `host`,
    /// dated as `YYYY-MM-DD`.
    pub(crate) fn into_record(self, host: &User) -> Record {
        let date = parse_event_date(&self.date)
            .map_or_else(|| self.date.trim().to_owned(), |d| d.format("%Y-%m-%d").to_string());
        let optional = |v: Option<&str>| v.map_or(Value::Null, Value::from);

        let mut record = Record::new();
        record.insert("title".into(), self.title.trim().into());
        record.insert("description".into(), self.description.trim().into());
        record.insert("date".into(), date.into());
        record.insert("location".into(), self.location.trim().into());
        record.insert("criteria".into(), optional(non_empty(&self.criteria)));
        record.insert("image_url".into(), optional(non_empty(&self.image_url)));
        record.insert("participants".into(), 0.into());
        record.insert("user_id".into(), host.id.to_string().into());
        record.insert("status".into(), EventStatus::Pending.as_str().into());
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;

    fn submission() -> EventSubmission {
        EventSubmission {
            title: "Robotics Meetup".into(),
            description: "Hands-on evening building line-following robots.".into(),
            date: "2025-09-01".into(),
            location: "Austin, TX".into(),
            criteria: Some("  ".into()),
            image_url: None,
        }
    }

    #[test]
    fn accepts_complete_submission() {
        assert_eq!(submission().validate(), Ok(()));

        let mut with_image = submission();
        with_image.image_url = Some("https://img.example/robots.png".into());
        assert_eq!(with_image.validate(), Ok(()));
    }

    #[test]
    fn reports_first_invalid_field() {
        let mut s = submission();
        s.title = "Bots".into();
        s.location = "TX".into();
        assert_eq!(s.validate(), Err(SubmissionInvalid::TitleTooShort));

        let mut s = submission();
        s.description = "Too short".into();
        assert_eq!(s.validate(), Err(SubmissionInvalid::DescriptionTooShort));

        let mut s = submission();
        s.date = "next week".into();
        assert_eq!(s.validate(), Err(SubmissionInvalid::MissingDate));

        let mut s = submission();
        s.location = " TX ".into();
        assert_eq!(s.validate(), Err(SubmissionInvalid::LocationTooShort));

        let mut s = submission();
        s.image_url = Some("robots.png".into());
        assert_eq!(s.validate(), Err(SubmissionInvalid::InvalidImageUrl));
    }

    #[test]
    fn record_is_pending_and_owned_by_host() {
        let host = User::new("Host User", "host@eventhive.com", Role::Host);
        let mut s = submission();
        s.date = "September 1, 2025".into();

        let record = s.into_record(&host);
        assert_eq!(record["status"], "pending");
        assert_eq!(record["user_id"], host.id.to_string());
        assert_eq!(record["date"], "2025-09-01");
        assert_eq!(record["criteria"], Value::Null);
        assert!(!record.contains_key("id"));
    }
}
