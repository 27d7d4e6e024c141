use super::{AppState, bad_request, parse_body, require_client};
use crate::access::items_for;
use crate::auth::Role;
use crate::handler::{Handler, Request, RequestExt, Response};
use crate::preferences::Theme;
use async_trait::async_trait;
use hyper::StatusCode;
use log::error;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

pub struct SessionInfo;
pub struct NavigationMenu(pub Arc<AppState>);
pub struct Guard(pub Arc<AppState>);
pub struct GetTheme;
pub struct SetTheme;
pub struct DrainNotifications;
pub struct DismissNotification;

#[async_trait]
impl Handler for SessionInfo {
    async fn handle(&self, req: &mut Request, res: &mut Response) {
        let Some(client) = require_client(req, res) else {
            return;
        };

        let mut body = serde_json::to_value(client.session.hydrate()).unwrap_or(Value::Null);
        if let Value::Object(fields) = &mut body {
            fields.insert("loading".into(), Value::Bool(client.session.is_loading()));
        }
        res.json(body);
    }
}

#[async_trait]
impl Handler for NavigationMenu {
    async fn handle(&self, req: &mut Request, res: &mut Response) {
        let Some(client) = require_client(req, res) else {
            return;
        };

        let role = client.session.hydrate().role().unwrap_or(Role::Guest);
        res.json(json!({
            "role": role,
            "items": items_for(self.0.policy(), role),
        }));
    }
}

/// `GET /api/guard?path=/dashboard`: the guard decision for a client-side
/// router.
#[async_trait]
impl Handler for Guard {
    async fn handle(&self, req: &mut Request, res: &mut Response) {
        let Some(client) = require_client(req, res) else {
            return;
        };
        let Some(path) = req.query_param("path") else {
            return bad_request(res, "missing `path` query parameter");
        };

        let snapshot = client.session.hydrate();
        res.json(self.0.guard.evaluate(&path, &snapshot));
    }
}

#[async_trait]
impl Handler for GetTheme {
    async fn handle(&self, req: &mut Request, res: &mut Response) {
        let Some(client) = require_client(req, res) else {
            return;
        };
        res.json(json!({ "theme": client.themes.load() }));
    }
}

#[derive(Debug, Deserialize)]
struct ThemeChange {
    theme: Option<Theme>,
}

/// Sets the theme given in the body, or toggles it when the body names none.
#[async_trait]
impl Handler for SetTheme {
    async fn handle(&self, req: &mut Request, res: &mut Response) {
        let Some(client) = require_client(req, res) else {
            return;
        };

        let requested = if req.body().is_empty() {
            None
        } else {
            match parse_body::<ThemeChange>(req) {
                Ok(change) => change.theme,
                Err(e) => return bad_request(res, e),
            }
        };

        let saved = match requested {
            Some(theme) => client.themes.save(theme).map(|_| theme),
            None => client.themes.toggle(),
        };
        match saved {
            Ok(theme) => {
                res.json(json!({ "theme": theme }));
            }
            Err(e) => {
                error!("failed to store theme for client {}: {}", client.id, e);
                res.status(StatusCode::INTERNAL_SERVER_ERROR)
                    .json(json!({ "error": "theme could not be saved" }));
            }
        }
    }
}

#[async_trait]
impl Handler for DrainNotifications {
    async fn handle(&self, req: &mut Request, res: &mut Response) {
        let Some(client) = require_client(req, res) else {
            return;
        };
        res.json(client.notifications.drain());
    }
}

#[async_trait]
impl Handler for DismissNotification {
    async fn handle(&self, req: &mut Request, res: &mut Response) {
        let Some(client) = require_client(req, res) else {
            return;
        };
        let Some(id) = req.params().get("id").and_then(|id| id.parse::<u64>().ok()) else {
            return bad_request(res, "notification id must be a number");
        };

        if client.notifications.dismiss(id) {
            res.status(StatusCode::NO_CONTENT).end();
        } else {
            res.status(StatusCode::NOT_FOUND)
                .json(json!({ "error": "no such notification" }));
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::api::testing::{Browser, app, body_json};
    use hyper::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn navigation_follows_role() {
        let t = app().await;
        let mut browser = Browser::default();

        let menu = body_json(&browser.get(&t.app, "/api/navigation").await);
        assert_eq!(menu["role"], "guest");
        assert_eq!(menu["items"].as_array().unwrap().len(), 3);

        browser
            .post_json(
                &t.app,
                "/api/login",
                json!({ "email": "admin@eventhive.com", "password": "password" }),
            )
            .await;
        let menu = body_json(&browser.get(&t.app, "/api/navigation").await);
        assert_eq!(menu["role"], "admin");
        let paths: Vec<&str> = menu["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|i| i["path"].as_str().unwrap())
            .collect();
        assert!(paths.contains(&"/pending-events"));
        assert!(!paths.contains(&"/submit-event"));
    }

    #[tokio::test]
    async fn guard_decision_as_json() {
        let t = app().await;
        let mut browser = Browser::default();

        let decision = body_json(&browser.get(&t.app, "/api/guard?path=/dashboard").await);
        assert_eq!(
            decision,
            json!({ "decision": "redirect", "to": "/signin", "replace": true })
        );

        let decision = body_json(&browser.get(&t.app, "/api/guard?path=/events").await);
        assert_eq!(decision, json!({ "decision": "render" }));

        let res = browser.get(&t.app, "/api/guard").await;
        assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn theme_toggles_and_sets() {
        let t = app().await;
        let mut browser = Browser::default();

        assert_eq!(body_json(&browser.get(&t.app, "/api/theme").await)["theme"], "light");

        let res = browser.send(&t.app, Method::POST, "/api/theme", None, "").await;
        assert_eq!(body_json(&res)["theme"], "dark");

        let res = browser
            .post_json(&t.app, "/api/theme", json!({ "theme": "light" }))
            .await;
        assert_eq!(body_json(&res)["theme"], "light");
        assert_eq!(body_json(&browser.get(&t.app, "/api/theme").await)["theme"], "light");
    }

    #[tokio::test]
    async fn notifications_drain_and_dismiss() {
        let t = app().await;
        let mut browser = Browser::default();

        browser
            .post_json(
                &t.app,
                "/api/login",
                json!({ "email": "nobody@eventhive.com", "password": "x" }),
            )
            .await;
        browser
            .post_json(
                &t.app,
                "/api/login",
                json!({ "email": "nobody@eventhive.com", "password": "y" }),
            )
            .await;

        let res = browser
            .send(&t.app, Method::DELETE, "/api/notifications/1", None, "")
            .await;
        assert_eq!(res.status_code(), StatusCode::NO_CONTENT);
        let res = browser
            .send(&t.app, Method::DELETE, "/api/notifications/1", None, "")
            .await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);

        let remaining = body_json(&browser.get(&t.app, "/api/notifications").await);
        assert_eq!(remaining.as_array().unwrap().len(), 1);
        assert_eq!(remaining[0]["id"], 2);
        let drained = body_json(&browser.get(&t.app, "/api/notifications").await);
        assert!(drained.as_array().unwrap().is_empty());
    }
}
