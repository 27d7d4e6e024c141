use super::{
    Backend, BackendResult, Change, ChangeKind, Collection, Query, Record, Subscription,
};
use async_trait::async_trait;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::{RwLock, broadcast};
use uuid::Uuid;

const CHANGE_BUFFER: usize = 256;

/// In-process backend. Records live in insertion order per collection and
/// every mutation is broadcast to subscribers.
#[derive(Debug)]
pub struct MemoryBackend {
    collections: RwLock<FxHashMap<Collection, Vec<Record>>>,
    changes: broadcast::Sender<Change>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            collections: RwLock::new(FxHashMap::default()),
            changes,
        }
    }

    /// Seeds a collection without emitting change notifications.
    pub async fn seed(&self, collection: Collection, records: impl IntoIterator<Item = Record>) {
        let mut collections = self.collections.write().await;
        let rows = collections.entry(collection).or_default();
        rows.extend(records.into_iter().map(with_id));
    }

    fn publish(&self, collection: Collection, kind: ChangeKind, record: Record) {
        // no receivers is fine
        let _ = self.changes.send(Change {
            collection,
            kind,
            record,
        });
    }
}

fn with_id(mut record: Record) -> Record {
    if !record.contains_key("id") {
        record.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
    }
    record
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn query(&self, collection: Collection, query: &Query) -> BackendResult<Vec<Record>> {
        let collections = self.collections.read().await;
        let rows = collections
            .get(&collection)
            .map(|rows| rows.as_slice())
            .unwrap_or_default();

        let matching = rows.iter().filter(|r| query.matches(r)).cloned();
        Ok(match query.row_limit() {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        })
    }

    async fn insert(&self, collection: Collection, record: Record) -> BackendResult<Record> {
        let record = with_id(record);
        self.collections
            .write()
            .await
            .entry(collection)
            .or_default()
            .push(record.clone());

        self.publish(collection, ChangeKind::Insert, record.clone());
        Ok(record)
    }

    async fn update(&self, collection: Collection, query: &Query, patch: Record) -> BackendResult<Vec<Record>> {
        let mut updated = Vec::new();
        {
            let mut collections = self.collections.write().await;
            if let Some(rows) = collections.get_mut(&collection) {
                for row in rows.iter_mut().filter(|r| query.matches(r)) {
                    for (k, v) in &patch {
                        // ids are immutable
                        if k != "id" {
                            row.insert(k.clone(), v.clone());
                        }
                    }
                    updated.push(row.clone());
                }
            }
        }

        for record in &updated {
            self.publish(collection, ChangeKind::Update, record.clone());
        }
        Ok(updated)
    }

    async fn delete(&self, collection: Collection, query: &Query) -> BackendResult<usize> {
        let mut removed = Vec::new();
        {
            let mut collections = self.collections.write().await;
            if let Some(rows) = collections.get_mut(&collection) {
                let (gone, kept): (Vec<_>, Vec<_>) =
                    rows.drain(..).partition(|r| query.matches(r));
                *rows = kept;
                removed = gone;
            }
        }

        let count = removed.len();
        for record in removed {
            self.publish(collection, ChangeKind::Delete, record);
        }
        Ok(count)
    }

    fn subscribe(&self, collection: Collection, query: Query) -> Subscription {
        Subscription::new(collection, query, self.changes.subscribe())
    }
}
