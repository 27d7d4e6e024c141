use super::{AppState, bad_request, parse_body, require_client};
use crate::auth::User;
use crate::handler::{Handler, Request, RequestExt, Response};
use crate::messages::MessageError;
use crate::session::ClientState;
use async_trait::async_trait;
use hyper::StatusCode;
use log::warn;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;

/// Page whose access rule governs the messaging endpoints.
const MESSAGES_PAGE: &str = "/messages";
const DEFAULT_WAIT: Duration = Duration::from_secs(25);
const MAX_WAIT: Duration = Duration::from_secs(30);

pub struct Conversations(pub Arc<AppState>);
pub struct OpenConversation(pub Arc<AppState>);
pub struct History(pub Arc<AppState>);
pub struct SendMessage(pub Arc<AppState>);
pub struct NextMessages(pub Arc<AppState>);

#[derive(Deserialize)]
struct OpenForm {
    #[serde(alias = "participantId")]
    participant_id: String,
}

#[derive(Deserialize)]
struct SendForm {
    content: String,
}

/// The signed-in member making the request. Answers 401/403 otherwise.
fn member(state: &AppState, req: &Request, res: &mut Response) -> Option<(Arc<ClientState>, User)> {
    let client = require_client(req, res)?;
    let Some(user) = client.session.hydrate().user().cloned() else {
        res.status(StatusCode::UNAUTHORIZED)
            .json(json!({ "error": "Authentication required" }));
        return None;
    };
    if !state.policy().permits(MESSAGES_PAGE, user.role) {
        res.status(StatusCode::FORBIDDEN)
            .json(json!({ "error": "Messaging is not available for this account" }));
        return None;
    }
    Some((client, user))
}

fn conversation_id(req: &Request, res: &mut Response) -> Option<String> {
    let id = req.params().get("id").map(str::to_owned);
    if id.is_none() {
        bad_request(res, "missing conversation id");
    }
    id
}

fn failure(client: &ClientState, res: &mut Response, title: &str, error: MessageError) {
    let status = match &error {
        MessageError::EmptyMessage | MessageError::SelfConversation => StatusCode::UNPROCESSABLE_ENTITY,
        MessageError::NotParticipant => StatusCode::FORBIDDEN,
        MessageError::UnknownRecipient => StatusCode::NOT_FOUND,
        MessageError::Backend(e) => {
            warn!("{}: {}", title, e);
            client.notifications.error(title, Some(e.to_string()));
            StatusCode::BAD_GATEWAY
        }
    };
    res.status(status).json(json!({ "error": error.to_string() }));
}

/// `GET /api/messages`
#[async_trait]
impl Handler for Conversations {
    async fn handle(&self, req: &mut Request, res: &mut Response) {
        let Some((client, user)) = member(&self.0, req, res) else {
            return;
        };
        match self.0.messages.conversations(&user).await {
            Ok(conversations) => {
                res.json(conversations);
            }
            Err(e) => failure(&client, res, "Failed to load conversations", e),
        }
    }
}

/// `POST /api/messages` with `{ participant_id }`.
#[async_trait]
impl Handler for OpenConversation {
    async fn handle(&self, req: &mut Request, res: &mut Response) {
        let Some((client, user)) = member(&self.0, req, res) else {
            return;
        };
        let form: OpenForm = match parse_body(req) {
            Ok(form) => form,
            Err(e) => return bad_request(res, e),
        };
        match self.0.messages.open(&user, &form.participant_id).await {
            Ok(conversation) => {
                res.json(conversation);
            }
            Err(e) => failure(&client, res, "Failed to start conversation", e),
        }
    }
}

/// `GET /api/messages/{id}?after=`
#[async_trait]
impl Handler for History {
    async fn handle(&self, req: &mut Request, res: &mut Response) {
        let Some((client, user)) = member(&self.0, req, res) else {
            return;
        };
        let Some(id) = conversation_id(req, res) else {
            return;
        };
        let after = req.query_param("after");
        match self.0.messages.history(&user, &id, after.as_deref()).await {
            Ok(messages) => {
                res.json(messages);
            }
            Err(e) => failure(&client, res, "Failed to load messages", e),
        }
    }
}

/// `POST /api/messages/{id}` with `{ content }`.
#[async_trait]
impl Handler for SendMessage {
    async fn handle(&self, req: &mut Request, res: &mut Response) {
        let Some((client, user)) = member(&self.0, req, res) else {
            return;
        };
        let Some(id) = conversation_id(req, res) else {
            return;
        };
        let form: SendForm = match parse_body(req) {
            Ok(form) => form,
            Err(e) => return bad_request(res, e),
        };
        match self.0.messages.send(&user, &id, &form.content).await {
            Ok(message) => {
                res.status(StatusCode::CREATED).json(message);
            }
            Err(e) => failure(&client, res, "Failed to send message", e),
        }
    }
}

/// `GET /api/messages/{id}/next?after=&wait=`
///
/// Long poll: answers at once with anything newer than `after`, otherwise
/// with the next message sent, or `[]` once `wait` seconds pass.
#[async_trait]
impl Handler for NextMessages {
    async fn handle(&self, req: &mut Request, res: &mut Response) {
        let Some((client, user)) = member(&self.0, req, res) else {
            return;
        };
        let Some(id) = conversation_id(req, res) else {
            return;
        };
        let after = req.query_param("after");
        let wait = req
            .query_param("wait")
            .and_then(|w| w.parse().ok())
            .map_or(DEFAULT_WAIT, Duration::from_secs)
            .min(MAX_WAIT);

        // subscribe before reading so nothing sent in between is missed
        let mut feed = match self.0.messages.watch(&user, &id).await {
            Ok(feed) => feed,
            Err(e) => return failure(&client, res, "Failed to load messages", e),
        };
        match self.0.messages.history(&user, &id, after.as_deref()).await {
            Ok(messages) if !messages.is_empty() => {
                res.json(messages);
            }
            Ok(_) => {
                let next: Vec<_> = time::timeout(wait, feed.next())
                    .await
                    .ok()
                    .flatten()
                    .into_iter()
                    .collect();
                res.json(next);
            }
            Err(e) => failure(&client, res, "Failed to load messages", e),
        }
    }
}
