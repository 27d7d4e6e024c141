pub mod catalog;
pub mod filter;
pub mod model;
pub mod submission;

pub use catalog::EventCatalog;
pub use filter::{Category, DateBucket, EventFilter, filter_events};
pub use model::{Event, EventStatus, parse_event_date};
pub use submission::{EventSubmission, SubmissionInvalid, SubmitError};
