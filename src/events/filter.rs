//! Narrowing of event listings by free text, date window and category.
//!
//! Every dimension is an independent predicate over a single event, so the
//! result does not depend on the order in which dimensions are applied and
//! re-applying a filter to its own output changes nothing.

use super::model::Event;
use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateBucket {
    Today,
    Tomorrow,
    /// Today through seven days ahead.
    Week,
    /// Today through the same day next month.
    Month,
}

impl DateBucket {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "today" => Some(DateBucket::Today),
            "tomorrow" => Some(DateBucket::Tomorrow),
            "week" => Some(DateBucket::Week),
            "month" => Some(DateBucket::Month),
            _ => None,
        }
    }

    pub fn contains(&self, date: NaiveDate, today: NaiveDate) -> bool {
        let last = match self {
            DateBucket::Today => Some(today),
            DateBucket::Tomorrow => return today.succ_opt() == Some(date),
            DateBucket::Week => today.checked_add_days(Days::new(7)),
            DateBucket::Month => today.checked_add_months(Months::new(1)),
        };
        match last {
            Some(last) => today <= date && date <= last,
            None => today <= date,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Hackathon,
    Competition,
    Workshop,
    Webinar,
}

impl Category {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "hackathon" => Some(Category::Hackathon),
            "competition" => Some(Category::Competition),
            "workshop" => Some(Category::Workshop),
            "webinar" => Some(Category::Webinar),
            _ => None,
        }
    }

    /// Matched case-sensitively against title and description.
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Category::Hackathon => &["Hackathon", "Web3"],
            Category::Competition => &["Challenge", "Championship", "Contest", "Competition"],
            Category::Workshop => &["Innovation", "Expo"],
            Category::Webinar => &["Virtual"],
        }
    }

    fn matches(&self, event: &Event) -> bool {
        self.keywords()
            .iter()
            .any(|k| event.title.contains(k) || event.description.contains(k))
    }
}

/// A conjunction of optional predicates; `None` means "any".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EventFilter {
    search: Option<String>,
    date: Option<DateBucket>,
    category: Option<Category>,
}

impl EventFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a filter from raw query values. Empty or unrecognised values
    /// leave that dimension unfiltered.
    pub fn from_params(search: Option<&str>, date: Option<&str>, category: Option<&str>) -> Self {
        Self {
            search: search.filter(|s| !s.is_empty()).map(str::to_lowercase),
            date: date.and_then(DateBucket::parse),
            category: category.and_then(Category::parse),
        }
    }

    pub fn search(mut self, term: &str) -> Self {
        self.search = (!term.is_empty()).then(|| term.to_lowercase());
        self
    }

    pub fn date(mut self, bucket: DateBucket) -> Self {
        self.date = Some(bucket);
        self
    }

    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.search.is_none() && self.date.is_none() && self.category.is_none()
    }

    pub fn matches(&self, event: &Event, today: NaiveDate) -> bool {
        if let Some(term) = &self.search {
            let hit = event.title.to_lowercase().contains(term.as_str())
                || event.description.to_lowercase().contains(term.as_str());
            if !hit {
                return false;
            }
        }

        if let Some(bucket) = self.date {
            // undated events never fall inside a window
            match event.starts_on() {
                Some(date) if bucket.contains(date, today) => {}
                _ => return false,
            }
        }

        self.category.is_none_or(|c| c.matches(event))
    }
}

/// Events from `events` that pass `filter`, in their original order.
pub fn filter_events(events: &[Event], filter: &EventFilter, today: NaiveDate) -> Vec<Event> {
    events
        .iter()
        .filter(|e| filter.matches(e, today))
        .cloned()
        .collect()
}
