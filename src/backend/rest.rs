use super::{
    Backend, BackendError, BackendResult, Change, ChangeKind, Collection, Query, Record,
    Subscription,
};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::broadcast;

const SUBSCRIPTION_BUFFER: usize = 64;

#[derive(Debug, Clone)]
pub struct RestConfig {
    /// Service root, e.g. `https://project.example.co`
    pub base_url: String,
    /// Key sent as `apikey` and bearer token
    pub api_key: String,
    /// Interval between polls backing a subscription
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl RestConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            api_key: api_key.into(),
            poll_interval: Duration::from_secs(5),
            timeout: Duration::from_secs(10),
        }
    }
}

/// PostgREST-style adapter: `GET /rest/v1/{collection}?field=eq.value`.
#[derive(Debug, Clone)]
pub struct RestBackend {
    client: Client,
    config: RestConfig,
}

impl RestBackend {
    pub fn new(config: RestConfig) -> BackendResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }

    pub(crate) fn config(&self) -> &RestConfig {
        &self.config
    }

    fn url(&self, collection: Collection) -> String {
        format!("{}/rest/v1/{}", self.config.base_url, collection)
    }

    pub(crate) fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
    }

    fn filtered(&self, builder: RequestBuilder, query: &Query) -> RequestBuilder {
        let mut params: Vec<(String, String)> = query
            .filters()
            .map(|(field, value)| (field.to_owned(), format!("eq.{}", render_value(value))))
            .collect();
        if let Some(limit) = query.row_limit() {
            params.push(("limit".into(), limit.to_string()));
        }
        builder.query(&params)
    }

    async fn rows(response: Response) -> BackendResult<Vec<Record>> {
        let response = check(response).await?;
        Ok(response.json::<Vec<Record>>().await?)
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub(crate) async fn check(response: Response) -> BackendResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    if status == StatusCode::SERVICE_UNAVAILABLE || status == StatusCode::BAD_GATEWAY {
        return Err(BackendError::Unavailable(format!("{status}: {message}")));
    }
    Err(BackendError::RequestFailed {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl Backend for RestBackend {
    async fn query(&self, collection: Collection, query: &Query) -> BackendResult<Vec<Record>> {
        let request = self.filtered(self.client.get(self.url(collection)), query);
        let response = self
            .authorize(request.query(&[("select", "*")]))
            .send()
            .await?;
        Self::rows(response).await
    }

    async fn insert(&self, collection: Collection, record: Record) -> BackendResult<Record> {
        let response = self
            .authorize(self.client.post(self.url(collection)))
            .header("Prefer", "return=representation")
            .json(&record)
            .send()
            .await?;

        Self::rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::Decode("insert returned no rows".into()))
    }

    async fn update(&self, collection: Collection, query: &Query, patch: Record) -> BackendResult<Vec<Record>> {
        let request = self.filtered(self.client.patch(self.url(collection)), query);
        let response = self
            .authorize(request)
            .header("Prefer", "return=representation")
            .json(&patch)
            .send()
            .await?;
        Self::rows(response).await
    }

    async fn delete(&self, collection: Collection, query: &Query) -> BackendResult<usize> {
        let request = self.filtered(self.client.delete(self.url(collection)), query);
        let response = self
            .authorize(request)
            .header("Prefer", "return=representation")
            .send()
            .await?;
        Ok(Self::rows(response).await?.len())
    }

    /// Polls the collection and diffs snapshots by `id`. The polling task
    /// stops once the subscription is dropped.
    fn subscribe(&self, collection: Collection, query: Query) -> Subscription {
        let (tx, rx) = broadcast::channel(SUBSCRIPTION_BUFFER);
        let backend = self.clone();
        let poll_query = query.clone();

        tokio::spawn(async move {
            let mut known: Option<FxHashMap<String, Record>> = None;
            let mut ticker = tokio::time::interval(backend.config.poll_interval);

            loop {
                ticker.tick().await;
                if tx.receiver_count() == 0 {
                    debug!("subscription on {} closed", collection);
                    break;
                }

                let rows = match backend.query(collection, &poll_query).await {
                    Ok(rows) => rows,
                    Err(e) => {
                        warn!("polling {} failed: {}", collection, e);
                        continue;
                    }
                };

                let current: FxHashMap<String, Record> = rows
                    .into_iter()
                    .filter_map(|r| r.get("id").map(render_value).map(|id| (id, r)))
                    .collect();

                if let Some(previous) = known.as_ref() {
                    for change in diff(collection, previous, &current) {
                        let _ = tx.send(change);
                    }
                }
                known = Some(current);
            }
        });

        Subscription::new(collection, query, rx)
    }
}

fn diff(
    collection: Collection,
    previous: &FxHashMap<String, Record>,
    current: &FxHashMap<String, Record>,
) -> Vec<Change> {
    let mut changes = Vec::new();
    for (id, record) in current {
        let kind = match previous.get(id) {
            None => ChangeKind::Insert,
            Some(old) if old != record => ChangeKind::Update,
            Some(_) => continue,
        };
        changes.push(Change {
            collection,
            kind,
            record: record.clone(),
        });
    }
    for (id, record) in previous {
        if !current.contains_key(id) {
            changes.push(Change {
                collection,
                kind: ChangeKind::Delete,
                record: record.clone(),
            });
        }
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(rows: &[Value]) -> FxHashMap<String, Record> {
        rows.iter()
            .map(|v| {
                let r = v.as_object().cloned().unwrap();
                (render_value(&r["id"]), r)
            })
            .collect()
    }

    #[test]
    fn diff_reports_insert_update_delete() {
        let before = snapshot(&[
            json!({ "id": "1", "title": "Expo" }),
            json!({ "id": "2", "title": "Contest" }),
        ]);
        let after = snapshot(&[
            json!({ "id": "1", "title": "Innovation Expo" }),
            json!({ "id": 3, "title": "Webinar" }),
        ]);

        let mut kinds: Vec<_> = diff(Collection::Events, &before, &after)
            .into_iter()
            .map(|c| (c.kind as u8, render_value(&c.record["id"])))
            .collect();
        kinds.sort();

        assert_eq!(
            kinds,
            vec![
                (ChangeKind::Insert as u8, "3".to_string()),
                (ChangeKind::Update as u8, "1".to_string()),
                (ChangeKind::Delete as u8, "2".to_string()),
            ]
        );
    }

    #[test]
    fn config_trims_trailing_slash() {
        let config = RestConfig::new("https://api.example.co/", "key");
        let backend = RestBackend::new(config).unwrap();
        assert_eq!(
            backend.url(Collection::Events),
            "https://api.example.co/rest/v1/events"
        );
    }

    #[tokio::test]
    async fn unreachable_service_is_unavailable() {
        let mut config = RestConfig::new("http://127.0.0.1:1", "key");
        config.timeout = Duration::from_millis(500);
        let backend = RestBackend::new(config).unwrap();

        let err = backend
            .query(Collection::Events, &Query::all())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Unavailable(_)));
    }
}
