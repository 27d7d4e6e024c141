//! Record-oriented interface to the hosted backend.
//!
//! Business logic only ever sees [`Backend`] and [`BlobStore`]. The in-memory
//! implementations back tests and local runs; [`RestBackend`] talks to a
//! PostgREST-style service in production.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use smallvec::SmallVec;
use std::fmt;
use tokio::sync::broadcast;

mod blob;
mod error;
mod memory;
mod rest;

pub use blob::{BlobStore, MemoryBlobStore, RestBlobStore, blob_path};
pub use error::{BackendError, BackendResult};
pub use memory::MemoryBackend;
pub use rest::{RestBackend, RestConfig};

pub type Record = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Profiles,
    UserRoles,
    Events,
    Messages,
    ConversationParticipants,
    Attendances,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Profiles => "profiles",
            Collection::UserRoles => "user_roles",
            Collection::Events => "events",
            Collection::Messages => "messages",
            Collection::ConversationParticipants => "conversation_participants",
            Collection::Attendances => "attendances",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Conjunction of `field = value` predicates with an optional row limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    filters: SmallVec<[(String, Value); 2]>,
    limit: Option<usize>,
}

impl Query {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn filters(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.filters.iter().map(|(f, v)| (f.as_str(), v))
    }

    pub fn row_limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.filters
            .iter()
            .all(|(field, value)| record.get(field) == Some(value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Change {
    pub collection: Collection,
    pub kind: ChangeKind,
    pub record: Record,
}

/// Live feed of changes to one collection, narrowed by a query.
#[derive(Debug)]
pub struct Subscription {
    collection: Collection,
    query: Query,
    rx: broadcast::Receiver<Change>,
}

impl Subscription {
    pub(crate) fn new(collection: Collection, query: Query, rx: broadcast::Receiver<Change>) -> Self {
        Self {
            collection,
            query,
            rx,
        }
    }

    /// Waits for the next matching change. `None` once the feed is closed.
    pub async fn next(&mut self) -> Option<Change> {
        loop {
            match self.rx.recv().await {
                Ok(change) => {
                    if change.collection == self.collection && self.query.matches(&change.record) {
                        return Some(change);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::warn!(
                        "subscription on {} lagged, {} changes skipped",
                        self.collection,
                        skipped
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[async_trait]
pub trait Backend: Send + Sync {
    async fn query(&self, collection: Collection, query: &Query) -> BackendResult<Vec<Record>>;

    /// Inserts `record`, assigning an `id` when it has none. Returns the
    /// stored record.
    async fn insert(&self, collection: Collection, record: Record) -> BackendResult<Record>;

    /// Merges `patch` into every matching record and returns them.
    async fn update(&self, collection: Collection, query: &Query, patch: Record) -> BackendResult<Vec<Record>>;

    /// Returns the number of removed records.
    async fn delete(&self, collection: Collection, query: &Query) -> BackendResult<usize>;

    fn subscribe(&self, collection: Collection, query: Query) -> Subscription;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_matches_all_filters() {
        let record = json!({ "email": "a@x.io", "role": "host" })
            .as_object()
            .cloned()
            .unwrap();

        assert!(Query::all().matches(&record));
        assert!(Query::all().eq("email", "a@x.io").matches(&record));
        assert!(
            !Query::all()
                .eq("email", "a@x.io")
                .eq("role", "admin")
                .matches(&record)
        );
        assert!(!Query::all().eq("missing", "x").matches(&record));
    }

    #[test]
    fn collection_names() {
        assert_eq!(Collection::UserRoles.as_str(), "user_roles");
        assert_eq!(
            Collection::ConversationParticipants.to_string(),
            "conversation_participants"
        );
    }
}
