use super::{AppState, bad_request, is_form, parse_body, require_client};
use crate::auth::Role;
use crate::backend::BackendError;
use crate::events::{EventFilter, EventSubmission, SubmitError};
use crate::handler::{Handler, Request, RequestExt, Response};
use crate::session::client_of;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Local;
use hyper::{StatusCode, header, header::HeaderValue};
use log::{info, warn};
use serde_json::json;
use std::sync::Arc;

/// Page whose access rule also governs submissions and image uploads.
const SUBMIT_PAGE: &str = "/submit-event";
/// Where hosts land after submitting.
const MANAGE_PAGE: &str = "/manage-events";

pub struct ListEvents(pub Arc<AppState>);
pub struct ShowEvent(pub Arc<AppState>);
pub struct SubmitEvent(pub Arc<AppState>);
pub struct MySubmissions(pub Arc<AppState>);
pub struct Upload(pub Arc<AppState>);
pub struct Download(pub Arc<AppState>);

/// Reports a backend failure to the client's notifications and the response.
fn backend_failure(req: &Request, res: &mut Response, title: &str, error: BackendError) {
    warn!("{}: {}", title, error);
    if let Some(client) = client_of(req) {
        client.notifications.error(title, Some(error.to_string()));
    }
    res.status(StatusCode::BAD_GATEWAY)
        .json(json!({ "error": error.to_string() }));
}

/// `GET /api/events?search=&date=&category=`
#[async_trait]
impl Handler for ListEvents {
    async fn handle(&self, req: &mut Request, res: &mut Response) {
        let query = req.query_pairs();
        let filter = EventFilter::from_params(
            query.get("search").map(String::as_str),
            query.get("date").map(String::as_str),
            query.get("category").map(String::as_str),
        );

        let today = Local::now().date_naive();
        match self.0.catalog.list(&filter, today).await {
            Ok(events) => {
                res.json(events);
            }
            Err(e) => backend_failure(req, res, "Failed to load events", e),
        }
    }
}

#[async_trait]
impl Handler for ShowEvent {
    async fn handle(&self, req: &mut Request, res: &mut Response) {
        let params = req.params();
        let Some(id) = params.get("id") else {
            return bad_request(res, "missing event id");
        };

        match self.0.catalog.find(id).await {
            Ok(Some(event)) => {
                res.json(event);
            }
            Ok(None) => {
                res.status(StatusCode::NOT_FOUND)
                    .json(json!({ "error": "Event not found" }));
            }
            Err(e) => backend_failure(req, res, "Failed to load event", e),
        }
    }
}

/// `POST /api/events`: a host proposes an event, stored as pending.
#[async_trait]
impl Handler for SubmitEvent {
    async fn handle(&self, req: &mut Request, res: &mut Response) {
        let Some(client) = require_client(req, res) else {
            return;
        };

        let Some(host) = client.session.hydrate().user().cloned() else {
            client.notifications.error(
                "Authentication required",
                Some("You need to be logged in to submit an event.".into()),
            );
            res.status(StatusCode::UNAUTHORIZED)
                .json(json!({ "ok": false, "error": "Authentication required" }));
            return;
        };
        if !self.0.policy().permits(SUBMIT_PAGE, host.role) {
            res.status(StatusCode::FORBIDDEN)
                .json(json!({ "ok": false, "error": "Only hosts can submit events" }));
            return;
        }

        let submission: EventSubmission = match parse_body(req) {
            Ok(submission) => submission,
            Err(e) => return bad_request(res, e),
        };

        match self.0.catalog.submit(submission, &host).await {
            Ok(event) => {
                client.notifications.info(
                    "Event submitted successfully",
                    Some("Your event has been submitted and is pending approval.".into()),
                );
                if is_form(req) {
                    res.see_other(HeaderValue::from_static(MANAGE_PAGE));
                } else {
                    res.status(StatusCode::CREATED)
                        .json(json!({ "ok": true, "navigate": MANAGE_PAGE, "event": event }));
                }
            }
            Err(SubmitError::Invalid(invalid)) => {
                res.status(StatusCode::UNPROCESSABLE_ENTITY)
                    .json(json!({ "ok": false, "error": invalid.to_string() }));
            }
            Err(SubmitError::Backend(e)) => backend_failure(req, res, "Failed to submit event", e),
        }
    }
}

/// `GET /api/my-events`: everything the signed-in host submitted, any status.
#[async_trait]
impl Handler for MySubmissions {
    async fn handle(&self, req: &mut Request, res: &mut Response) {
        let Some(client) = require_client(req, res) else {
            return;
        };
        let Some(host) = client.session.hydrate().user().cloned() else {
            res.status(StatusCode::UNAUTHORIZED)
                .json(json!({ "error": "Authentication required" }));
            return;
        };

        match self.0.catalog.submitted_by(&host).await {
            Ok(events) => {
                res.json(events);
            }
            Err(e) => backend_failure(req, res, "Failed to load your events", e),
        }
    }
}

fn upload_extension(req: &Request) -> String {
    if let Some(ext) = req.query_param("ext") {
        return ext;
    }
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|ct| ct.to_str().ok())
        .and_then(mime_guess::get_mime_extensions_str)
        .and_then(|exts| exts.first())
        .map_or_else(|| "bin".to_string(), |ext| ext.to_string())
}

/// `POST /api/uploads?ext=png` with the raw image as body.
#[async_trait]
impl Handler for Upload {
    async fn handle(&self, req: &mut Request, res: &mut Response) {
        let Some(client) = require_client(req, res) else {
            return;
        };

        let role = client.session.hydrate().role().unwrap_or(Role::Guest);
        if !self.0.policy().permits(SUBMIT_PAGE, role) {
            res.status(StatusCode::FORBIDDEN)
                .json(json!({ "error": "Only hosts can upload event images" }));
            return;
        }
        if req.body().is_empty() {
            return bad_request(res, "empty upload");
        }

        let body: Bytes = req.body().clone();
        let size = body.len();
        match self.0.blobs.upload(body, &upload_extension(req)).await {
            Ok(path) => {
                info!("client {} uploaded {} ({} bytes)", client.id, path, size);
                res.status(StatusCode::CREATED).json(json!({ "path": path }));
            }
            Err(e) => backend_failure(req, res, "Image upload failed", e),
        }
    }
}

#[async_trait]
impl Handler for Download {
    async fn handle(&self, req: &mut Request, res: &mut Response) {
        let params = req.params();
        let Some(path) = params.get("path") else {
            return bad_request(res, "missing upload path");
        };

        match self.0.blobs.fetch(path).await {
            Ok(Some(bytes)) => {
                let mime = mime_guess::from_path(path).first_or_octet_stream();
                if let Ok(value) = HeaderValue::from_str(mime.essence_str()) {
                    res.set(header::CONTENT_TYPE, value);
                }
                res.send(&bytes);
            }
            Ok(None) => {
                res.status(StatusCode::NOT_FOUND)
                    .json(json!({ "error": "no such upload" }));
            }
            Err(e) => backend_failure(req, res, "Image download failed", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::api::testing::{Browser, app, body_json};
    use hyper::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn lists_with_filters() {
        let t = app().await;
        let mut browser = Browser::default();

        let all = body_json(&browser.get(&t.app, "/api/events").await);
        assert_eq!(all.as_array().unwrap().len(), 2);

        let hack = body_json(&browser.get(&t.app, "/api/events?search=hack").await);
        assert_eq!(hack.as_array().unwrap().len(), 1);
        assert_eq!(hack[0]["title"], "Web3 Hackathon 2025");

        let hackathons = body_json(&browser.get(&t.app, "/api/events?category=hackathon").await);
        assert_eq!(hackathons[0]["id"], "1");

        let ignored = body_json(&browser.get(&t.app, "/api/events?date=someday&category=party").await);
        assert_eq!(ignored.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn shows_single_event() {
        let t = app().await;
        let mut browser = Browser::default();

        let event = body_json(&browser.get(&t.app, "/api/events/2").await);
        assert_eq!(event["title"], "Design Workshop");

        let res = browser.get(&t.app, "/api/events/99").await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
    }

    fn meetup() -> serde_json::Value {
        json!({
            "title": "Robotics Meetup",
            "description": "Hands-on evening building line-following robots.",
            "date": "2025-09-01",
            "location": "Austin, TX"
        })
    }

    async fn signed_in(t: &crate::api::testing::TestApp, role: &str) -> Browser {
        let mut browser = Browser::default();
        browser
            .post_json(
                &t.app,
                "/api/login",
                json!({ "email": format!("{role}@eventhive.com"), "password": "password" }),
            )
            .await;
        browser.get(&t.app, "/api/notifications").await;
        browser
    }

    #[tokio::test]
    async fn hosts_submit_pending_events() {
        let t = app().await;
        let mut host = signed_in(&t, "host").await;

        let res = host.post_json(&t.app, "/api/events", meetup()).await;
        assert_eq!(res.status_code(), StatusCode::CREATED);
        let body = body_json(&res);
        assert_eq!(body["navigate"], "/manage-events");
        assert_eq!(body["event"]["status"], "pending");

        let notes = body_json(&host.get(&t.app, "/api/notifications").await);
        assert_eq!(notes[0]["title"], "Event submitted successfully");

        let listed = body_json(&host.get(&t.app, "/api/events").await);
        assert_eq!(listed.as_array().unwrap().len(), 2);

        let mine = body_json(&host.get(&t.app, "/api/my-events").await);
        assert_eq!(mine.as_array().unwrap().len(), 1);
        assert_eq!(mine[0]["title"], "Robotics Meetup");
    }

    #[tokio::test]
    async fn submission_requires_a_host() {
        let t = app().await;

        let mut guest = Browser::default();
        let res = guest.post_json(&t.app, "/api/events", meetup()).await;
        assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
        let notes = body_json(&guest.get(&t.app, "/api/notifications").await);
        assert_eq!(notes[0]["title"], "Authentication required");

        let mut admin = signed_in(&t, "admin").await;
        let res = admin.post_json(&t.app, "/api/events", meetup()).await;
        assert_eq!(res.status_code(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn invalid_submission_is_rejected() {
        let t = app().await;
        let mut host = signed_in(&t, "host").await;

        let mut short = meetup();
        short["title"] = json!("Bots");
        let res = host.post_json(&t.app, "/api/events", short).await;
        assert_eq!(res.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_json(&res)["error"], "Title must be at least 5 characters.");

        let mine = body_json(&host.get(&t.app, "/api/my-events").await);
        assert!(mine.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn form_submission_redirects_to_management() {
        let t = app().await;
        let mut host = signed_in(&t, "host").await;

        let res = host
            .send(
                &t.app,
                Method::POST,
                "/api/events",
                Some("application/x-www-form-urlencoded"),
                "title=Robotics+Meetup&description=Hands-on+evening+building+robots.&date=2025-09-01&location=Austin",
            )
            .await;
        assert_eq!(res.status_code(), StatusCode::SEE_OTHER);
        assert_eq!(res.get("location").unwrap(), "/manage-events");
    }

    #[tokio::test]
    async fn uploads_are_for_hosts() {
        let t = app().await;
        let mut browser = Browser::default();

        let res = browser
            .send(&t.app, Method::POST, "/api/uploads?ext=png", Some("image/png"), "png-bytes")
            .await;
        assert_eq!(res.status_code(), StatusCode::FORBIDDEN);

        browser
            .post_json(
                &t.app,
                "/api/login",
                json!({ "email": "host@eventhive.com", "password": "password" }),
            )
            .await;
        let res = browser
            .send(&t.app, Method::POST, "/api/uploads", Some("image/png"), "png-bytes")
            .await;
        assert_eq!(res.status_code(), StatusCode::CREATED);
        let path = body_json(&res)["path"].as_str().unwrap().to_owned();
        assert!(path.ends_with(".png"));

        let res = browser.get(&t.app, &format!("/api/uploads/{path}")).await;
        assert_eq!(res.body(), b"png-bytes");
        assert_eq!(res.get("content-type").unwrap(), "image/png");
    }
}
