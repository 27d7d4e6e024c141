use super::policy::{Access, Resolution, RolePolicy};
use crate::handler::{
    Request, Response,
    middleware::{Middleware, MiddlewareResult, next, stop},
};
use crate::middleware::RequestId;
use crate::session::{Snapshot, client_of};
use async_trait::async_trait;
use hyper::{Method, header::HeaderValue};
use log::{debug, warn};
use serde::Serialize;
use std::sync::Arc;

/// Outcome of one navigation attempt, executed by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "lowercase")]
pub enum GuardDecision {
    /// Session not resolved yet: show nothing.
    Pending,
    /// Leave for `to`; with `replace` the guarded URL must not stay in history.
    Redirect { to: String, replace: bool },
    Render,
    NotFound,
}

#[derive(Debug, Clone)]
pub struct RouteGuard {
    policy: Arc<RolePolicy>,
    sign_in_path: String,
}

impl RouteGuard {
    pub fn new(policy: Arc<RolePolicy>, sign_in_path: impl Into<String>) -> Self {
        Self {
            policy,
            sign_in_path: sign_in_path.into(),
        }
    }

    pub fn policy(&self) -> &RolePolicy {
        &self.policy
    }

    /// Decides `path` against the given session snapshot. Never fails and does
    /// no I/O.
    pub fn evaluate(&self, path: &str, snapshot: &Snapshot) -> GuardDecision {
        let entry = match self.policy.resolve(path) {
            Resolution::Guarded(entry) => entry,
            Resolution::NotFound => return GuardDecision::NotFound,
        };

        if entry.access == Access::Public {
            return GuardDecision::Render;
        }

        match snapshot.role() {
            None => GuardDecision::Pending,
            Some(role) if entry.access.allows(role) => GuardDecision::Render,
            Some(_) => GuardDecision::Redirect {
                to: self.sign_in_path.clone(),
                replace: true,
            },
        }
    }
}

/// Guards page requests: resolves the client's session, then answers a
/// refused navigation with `303 See Other` to the sign-in page.
///
/// API and non-GET requests pass through; endpoints check their own access.
pub struct GuardMiddleware {
    guard: RouteGuard,
}

impl GuardMiddleware {
    pub fn new(guard: RouteGuard) -> Self {
        Self { guard }
    }
}

fn is_page_request(req: &Request) -> bool {
    matches!(*req.method(), Method::GET | Method::HEAD) && !req.uri().path().starts_with("/api/")
}

#[async_trait]
impl Middleware for GuardMiddleware {
    async fn call(&self, req: &mut Request, res: &mut Response) -> MiddlewareResult {
        if !is_page_request(req) {
            return next();
        }

        let snapshot = match client_of(req) {
            Some(client) => client.session.hydrate(),
            None => {
                warn!("no client context for {}, guarding as anonymous", req.uri().path());
                Snapshot::Anonymous
            }
        };

        match self.guard.evaluate(req.uri().path(), &snapshot) {
            GuardDecision::Redirect { to, .. } => {
                let seq = req.extensions().get::<RequestId>().map_or(0, |id| id.0);
                debug!("#{} guard redirected {} to {}", seq, req.uri().path(), to);
                match HeaderValue::from_str(&to) {
                    Ok(location) => {
                        res.see_other(location);
                    }
                    Err(e) => warn!("invalid redirect target {}: {}", to, e),
                }
                stop()
            }
            GuardDecision::Pending | GuardDecision::Render | GuardDecision::NotFound => next(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::user::{Role, User};
    use crate::session::{ClientContext, ClientRegistry, StorageBackend};
    use bytes::Bytes;
    use hyper::StatusCode;

    fn guard() -> RouteGuard {
        RouteGuard::new(RolePolicy::standard(), "/signin")
    }

    fn signed_in(role: Role) -> Snapshot {
        Snapshot::Authenticated(User::new("Someone", "someone@eventhive.com", role))
    }

    fn redirect() -> GuardDecision {
        GuardDecision::Redirect {
            to: "/signin".into(),
            replace: true,
        }
    }

    #[test]
    fn renders_iff_role_is_listed() {
        let guard = guard();
        let roles = [Role::Admin, Role::Host, Role::User, Role::Guest];

        for entry in guard.policy().entries() {
            if entry.access == Access::Public || entry.path.contains('{') {
                continue;
            }
            for role in roles {
                let snapshot = match role {
                    Role::Guest => Snapshot::Anonymous,
                    role => signed_in(role),
                };
                let expected = if entry.access.allows(role) {
                    GuardDecision::Render
                } else {
                    redirect()
                };
                assert_eq!(guard.evaluate(&entry.path, &snapshot), expected, "{} as {}", entry.path, role);
            }
        }
    }

    #[test]
    fn host_on_admin_dashboard_is_sent_to_sign_in() {
        assert_eq!(guard().evaluate("/dashboard", &signed_in(Role::Host)), redirect());
    }

    #[test]
    fn pending_session_renders_nothing() {
        let guard = guard();
        assert_eq!(guard.evaluate("/profile", &Snapshot::Pending), GuardDecision::Pending);
        assert_eq!(guard.evaluate("/events", &Snapshot::Pending), GuardDecision::Pending);
        // sign-in must stay reachable while loading
        assert_eq!(guard.evaluate("/signin", &Snapshot::Pending), GuardDecision::Render);
    }

    #[test]
    fn sign_in_pages_render_for_every_session() {
        let guard = guard();
        for path in ["/signin", "/signup"] {
            assert_eq!(guard.evaluate(path, &Snapshot::Anonymous), GuardDecision::Render);
            for role in [Role::Admin, Role::Host, Role::User] {
                assert_eq!(guard.evaluate(path, &signed_in(role)), GuardDecision::Render, "{path} as {role}");
            }
        }
    }

    #[test]
    fn unknown_paths_are_not_found() {
        let guard = guard();
        assert_eq!(guard.evaluate("/nope", &signed_in(Role::Admin)), GuardDecision::NotFound);
        assert_eq!(guard.evaluate("/nope", &Snapshot::Pending), GuardDecision::NotFound);
    }

    fn page(path: &str, registry: &ClientRegistry) -> Request {
        let mut req = hyper::Request::builder()
            .uri(path)
            .body(Bytes::new())
            .unwrap();
        req.extensions_mut()
            .insert(ClientContext(registry.get_or_open(None)));
        req
    }

    #[tokio::test]
    async fn middleware_redirects_with_see_other() {
        let registry = ClientRegistry::new(StorageBackend::Memory);
        let middleware = GuardMiddleware::new(guard());

        let mut req = page("/dashboard", &registry);
        let mut res = Response::new();
        assert!(middleware.call(&mut req, &mut res).await.is_stop());
        assert_eq!(res.status_code(), StatusCode::SEE_OTHER);
        assert_eq!(res.get("location").unwrap(), "/signin");
    }

    #[tokio::test]
    async fn middleware_passes_authorised_and_api_requests() {
        let registry = ClientRegistry::new(StorageBackend::Memory);
        let middleware = GuardMiddleware::new(guard());

        let mut req = page("/events", &registry);
        assert!(middleware.call(&mut req, &mut Response::new()).await.is_next());

        let mut req = page("/api/session", &registry);
        assert!(middleware.call(&mut req, &mut Response::new()).await.is_next());
    }
}
