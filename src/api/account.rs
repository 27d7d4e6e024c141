use super::{AppState, bad_request, is_form, parse_body, require_client};
use crate::auth::{AuthError, AuthOutcome, LoginRequest, SignupRequest};
use crate::handler::{Handler, Request, Response};
use async_trait::async_trait;
use hyper::{StatusCode, header::HeaderValue};
use log::warn;
use serde_json::json;
use std::sync::Arc;

pub struct Login(pub Arc<AppState>);
pub struct Signup(pub Arc<AppState>);
pub struct Logout(pub Arc<AppState>);

fn status_for(error: &AuthError) -> StatusCode {
    match error {
        AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        AuthError::EmailAlreadyRegistered | AuthError::Busy => StatusCode::CONFLICT,
        AuthError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AuthError::MalformedCookie => StatusCode::BAD_REQUEST,
        AuthError::Backend(_) => StatusCode::BAD_GATEWAY,
        AuthError::Session(_) | AuthError::PasswordHash => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// JSON callers get `{ ok, navigate, error }`. Plain form posts are
/// redirected: to the target on success, back to `retry` on failure.
fn reply(req: &Request, res: &mut Response, outcome: AuthOutcome, retry: &str) {
    if is_form(req) {
        let to = match &outcome {
            AuthOutcome::Navigate(nav) => nav.to.as_str(),
            AuthOutcome::Failed(_) => retry,
        };
        match HeaderValue::from_str(to) {
            Ok(location) => {
                res.see_other(location);
            }
            Err(e) => {
                warn!("cannot redirect to {}: {}", to, e);
                res.status(StatusCode::INTERNAL_SERVER_ERROR).end();
            }
        }
        return;
    }

    match outcome {
        AuthOutcome::Navigate(navigate) => {
            res.json(json!({ "ok": true, "navigate": navigate }));
        }
        AuthOutcome::Failed(error) => {
            res.status(status_for(&error))
                .json(json!({ "ok": false, "error": error.to_string() }));
        }
    }
}

#[async_trait]
impl Handler for Login {
    async fn handle(&self, req: &mut Request, res: &mut Response) {
        let Some(client) = require_client(req, res) else {
            return;
        };
        let form: LoginRequest = match parse_body(req) {
            Ok(form) => form,
            Err(e) => return bad_request(res, e),
        };

        client.session.hydrate();
        let outcome = self
            .0
            .auth
            .login(&client.session, &client.notifications, &form.email, &form.password)
            .await;
        reply(req, res, outcome, "/signin");
    }
}

#[async_trait]
impl Handler for Signup {
    async fn handle(&self, req: &mut Request, res: &mut Response) {
        let Some(client) = require_client(req, res) else {
            return;
        };
        let form: SignupRequest = match parse_body(req) {
            Ok(form) => form,
            Err(e) => return bad_request(res, e),
        };

        client.session.hydrate();
        let outcome = self
            .0
            .auth
            .signup(&client.session, &client.notifications, form)
            .await;
        reply(req, res, outcome, "/signup");
    }
}

#[async_trait]
impl Handler for Logout {
    async fn handle(&self, req: &mut Request, res: &mut Response) {
        let Some(client) = require_client(req, res) else {
            return;
        };

        client.session.hydrate();
        let outcome = self.0.auth.logout(&client.session, &client.notifications);
        reply(req, res, outcome, "/");
    }
}
