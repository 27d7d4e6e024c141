//! JSON endpoints and page routes.

use crate::access::{RolePolicy, RouteGuard};
use crate::application::App;
use crate::auth::AuthOperations;
use crate::backend::BlobStore;
use crate::events::EventCatalog;
use crate::handler::{Request, Response};
use crate::messages::Messenger;
use crate::session::{ClientState, client_of};
use hyper::{StatusCode, header};
use log::error;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use std::path::PathBuf;
use std::sync::Arc;

mod account;
mod client;
mod events;
mod messages;
mod pages;

/// Shared services behind every endpoint.
pub struct AppState {
    pub auth: AuthOperations,
    pub guard: RouteGuard,
    pub catalog: Arc<EventCatalog>,
    pub messages: Messenger,
    pub blobs: Arc<dyn BlobStore>,
    pub static_dir: PathBuf,
}

impl AppState {
    pub fn policy(&self) -> &RolePolicy {
        self.guard.policy()
    }
}

/// Registers every API endpoint plus a page route for each policy entry.
pub fn mount(app: &mut App, state: Arc<AppState>) {
    app.post("/api/login", account::Login(state.clone()))
        .post("/api/signup", account::Signup(state.clone()))
        .post("/api/logout", account::Logout(state.clone()))
        .get("/api/session", client::SessionInfo)
        .get("/api/navigation", client::NavigationMenu(state.clone()))
        .get("/api/guard", client::Guard(state.clone()))
        .get("/api/theme", client::GetTheme)
        .post("/api/theme", client::SetTheme)
        .get("/api/notifications", client::DrainNotifications)
        .delete("/api/notifications/{id}", client::DismissNotification)
        .get("/api/events", events::ListEvents(state.clone()))
        .post("/api/events", events::SubmitEvent(state.clone()))
        .get("/api/events/{id}", events::ShowEvent(state.clone()))
        .get("/api/my-events", events::MySubmissions(state.clone()))
        .get("/api/messages", messages::Conversations(state.clone()))
        .post("/api/messages", messages::OpenConversation(state.clone()))
        .get("/api/messages/{id}", messages::History(state.clone()))
        .post("/api/messages/{id}", messages::SendMessage(state.clone()))
        .get("/api/messages/{id}/next", messages::NextMessages(state.clone()))
        .post("/api/uploads", events::Upload(state.clone()))
        .get("/api/uploads/{path}", events::Download(state.clone()));

    let pages: Vec<String> = state
        .policy()
        .entries()
        .iter()
        .map(|e| e.path.clone())
        .collect();
    for path in pages {
        app.get(path, pages::Shell(state.clone()));
    }
}

/// The client attached by `ClientMiddleware`, or a 500 when it is missing.
fn require_client(req: &Request, res: &mut Response) -> Option<Arc<ClientState>> {
    let client = client_of(req);
    if client.is_none() {
        error!("no client context on {}; is ClientMiddleware installed?", req.uri().path());
        res.status(StatusCode::INTERNAL_SERVER_ERROR)
            .json(json!({ "error": "client context unavailable" }));
    }
    client
}

fn is_form(req: &Request) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"))
}

/// Decodes a JSON or url-encoded form body.
fn parse_body<T: DeserializeOwned>(req: &Request) -> Result<T, String> {
    if is_form(req) {
        let fields: Map<String, Value> = form_urlencoded::parse(req.body())
            .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
            .collect();
        serde_json::from_value(Value::Object(fields)).map_err(|e| e.to_string())
    } else {
        serde_json::from_slice(req.body()).map_err(|e| e.to_string())
    }
}

fn bad_request(res: &mut Response, message: impl Into<String>) {
    res.status(StatusCode::BAD_REQUEST)
        .json(json!({ "error": message.into() }));
}
