use super::{
    filter::{EventFilter, filter_events},
    model::Event,
    submission::{EventSubmission, SubmitError},
};
use crate::auth::User;
use crate::backend::{Backend, BackendResult, Collection, Query};
use chrono::NaiveDate;
use log::{debug, info, warn};
use quick_cache::sync::Cache;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::task::JoinHandle;

const ALL_EVENTS: &str = "events";

/// Event listing read from the backend and cached until the `events`
/// collection changes.
pub struct EventCatalog {
    backend: Arc<dyn Backend>,
    cache: Cache<&'static str, Arc<[Event]>>,
    generation: AtomicU64,
}

impl EventCatalog {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            cache: Cache::new(4),
            generation: AtomicU64::new(0),
        }
    }

    /// Every decodable event, pending ones included. Rows that fail to decode
    /// are skipped.
    pub async fn all(&self) -> BackendResult<Arc<[Event]>> {
        if let Some(events) = self.cache.get(ALL_EVENTS) {
            return Ok(events);
        }

        let generation = self.generation.load(Ordering::Acquire);
        let rows = self
            .backend
            .query(Collection::Events, &Query::all())
            .await?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            match Event::from_record(row) {
                Ok(event) => events.push(event),
                Err(e) => warn!("skipping event row: {}", e),
            }
        }
        let events: Arc<[Event]> = events.into();

        // a change landed while fetching, the listing may already be stale
        if self.generation.load(Ordering::Acquire) == generation {
            self.cache.insert(ALL_EVENTS, Arc::clone(&events));
        }
        Ok(events)
    }

    /// Listed events passing `filter`.
    pub async fn list(&self, filter: &EventFilter, today: NaiveDate) -> BackendResult<Vec<Event>> {
        let listed: Vec<Event> = self
            .all()
            .await?
            .iter()
            .filter(|e| e.is_listed())
            .cloned()
            .collect();
        Ok(filter_events(&listed, filter, today))
    }

    /// A listed event by id.
    pub async fn find(&self, id: &str) -> BackendResult<Option<Event>> {
        Ok(self
            .all()
            .await?
            .iter()
            .find(|e| e.id == id && e.is_listed())
            .cloned())
    }

    /// Everything `host` submitted, whatever its review state.
    pub async fn submitted_by(&self, host: &User) -> BackendResult<Vec<Event>> {
        let host_id = host.id.to_string();
        Ok(self
            .all()
            .await?
            .iter()
            .filter(|e| e.user_id.as_deref() == Some(host_id.as_str()))
            .cloned()
            .collect())
    }

    /// Validates and stores a new pending event for `host`.
    pub async fn submit(&self, submission: EventSubmission, host: &User) -> Result<Event, SubmitError> {
        submission.validate()?;

        let stored = self
            .backend
            .insert(Collection::Events, submission.into_record(host))
            .await?;
        self.invalidate();

        let event = Event::from_record(stored)?;
        info!("{} submitted event {} for review", host.email, event.id);
        Ok(event)
    }

    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.cache.remove(ALL_EVENTS);
    }

    /// Drops the cached listing whenever the backend reports a change to
    /// `events`. The task ends when the backend closes the feed.
    pub fn watch(self: &Arc<Self>) -> JoinHandle<()> {
        let mut changes = self.backend.subscribe(Collection::Events, Query::all());
        let catalog = Arc::clone(self);

        tokio::spawn(async move {
            while let Some(change) = changes.next().await {
                debug!("events changed ({:?}), dropping cached listing", change.kind);
                catalog.invalidate();
            }
            debug!("event change feed closed");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryBackend, Record};
    use crate::events::filter::DateBucket;
    use serde_json::{Value, json};
    use std::time::Duration;

    fn row(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    async fn backend() -> Arc<MemoryBackend> {
        let backend = Arc::new(MemoryBackend::new());
        backend
            .seed(
                Collection::Events,
                [
                    row(json!({ "id": "1", "title": "Web3 Hackathon 2025", "date": "2025-04-15" })),
                    row(json!({ "id": "2", "title": "Design Workshop", "date": "2025-04-16" })),
                    row(json!({ "id": "3", "description": "no title" })),
                ],
            )
            .await;
        backend
    }

    #[tokio::test]
    async fn lists_and_filters_decodable_events() {
        let catalog = EventCatalog::new(backend().await);
        let today = NaiveDate::from_ymd_opt(2025, 4, 15).unwrap();

        assert_eq!(catalog.all().await.unwrap().len(), 2);

        let found = catalog
            .list(&EventFilter::new().date(DateBucket::Today), today)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "1");

        assert!(catalog.find("2").await.unwrap().is_some());
        assert!(catalog.find("3").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn cached_until_invalidated() {
        let backend = backend().await;
        let catalog = EventCatalog::new(backend.clone());
        assert_eq!(catalog.all().await.unwrap().len(), 2);

        backend
            .seed(
                Collection::Events,
                [row(json!({ "id": "4", "title": "Late Addition", "date": "2025-05-01" }))],
            )
            .await;
        assert_eq!(catalog.all().await.unwrap().len(), 2);

        catalog.invalidate();
        assert_eq!(catalog.all().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn backend_changes_invalidate_the_cache() {
        let backend = backend().await;
        let catalog = Arc::new(EventCatalog::new(backend.clone()));
        let watcher = catalog.watch();
        assert_eq!(catalog.all().await.unwrap().len(), 2);

        backend
            .insert(
                Collection::Events,
                row(json!({ "title": "Virtual Expo", "date": "2025-05-10" })),
            )
            .await
            .unwrap();

        let mut seen = 0;
        for _ in 0..50 {
            seen = catalog.all().await.unwrap().len();
            if seen == 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(seen, 3);
        watcher.abort();
    }

    fn submission(title: &str) -> EventSubmission {
        EventSubmission {
            title: title.into(),
            description: "Hands-on evening building line-following robots.".into(),
            date: "2025-04-15".into(),
            location: "Austin, TX".into(),
            criteria: None,
            image_url: None,
        }
    }

    #[tokio::test]
    async fn submissions_stay_out_of_listings_until_approved() {
        let backend = backend().await;
        let catalog = EventCatalog::new(backend.clone());
        let today = NaiveDate::from_ymd_opt(2025, 4, 15).unwrap();
        let host = User::new("Host User", "host@eventhive.com", crate::auth::Role::Host);
        assert_eq!(catalog.list(&EventFilter::new(), today).await.unwrap().len(), 2);

        let event = catalog.submit(submission("Robotics Meetup"), &host).await.unwrap();
        assert_eq!(event.status, Some(crate::events::EventStatus::Pending));

        assert_eq!(catalog.list(&EventFilter::new(), today).await.unwrap().len(), 2);
        assert!(catalog.find(&event.id).await.unwrap().is_none());
        assert_eq!(catalog.submitted_by(&host).await.unwrap(), vec![event.clone()]);

        backend
            .update(
                Collection::Events,
                &Query::all().eq("id", event.id.clone()),
                row(json!({ "status": "approved" })),
            )
            .await
            .unwrap();
        catalog.invalidate();
        assert!(catalog.find(&event.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn invalid_submission_is_not_stored() {
        let backend = backend().await;
        let catalog = EventCatalog::new(backend.clone());
        let host = User::new("Host User", "host@eventhive.com", crate::auth::Role::Host);

        let err = catalog.submit(submission("Bots"), &host).await.unwrap_err();
        assert!(matches!(err, SubmitError::Invalid(_)));
        assert_eq!(
            backend.query(Collection::Events, &Query::all()).await.unwrap().len(),
            3
        );
    }
}
