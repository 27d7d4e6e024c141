use crate::handler::{Handler, Request, Response, request::RequestExtInternal};
use hyper::{Method, StatusCode};
use log::error;
use matchit::Router as MatchitRouter;
use route::Route;
use rustc_hash::FxHashMap;
use std::{collections::HashMap, sync::Arc};

mod route;

#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
    by_pattern: FxHashMap<String, usize>,
    matcher: MatchitRouter<usize>,
}

impl Router {
    /// Registers `handler` for `method` on `path`. Paths use matchit syntax,
    /// e.g. `/events/{id}`.
    pub fn route(&mut self, path: impl AsRef<str>, method: Method, handler: Arc<dyn Handler>) -> &mut Self {
        let path = path.as_ref();

        let index = match self.by_pattern.get(path) {
            Some(index) => *index,
            None => {
                let index = self.routes.len();
                if let Err(e) = self.matcher.insert(path, index) {
                    error!("route {} rejected: {}", path, e);
                    return self;
                }
                self.routes.push(Route::new(path));
                self.by_pattern.insert(path.to_owned(), index);
                index
            }
        };

        self.routes[index].add(method, handler);
        self
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|r| r.path.as_str())
    }

    pub async fn handle(&self, req: &mut Request, res: &mut Response) {
        let (index, params): (usize, HashMap<String, String>) = match self.matcher.at(req.uri().path()) {
            Ok(m) => (
                *m.value,
                m.params
                    .iter()
                    .map(|(k, v)| (k.to_owned(), v.to_owned()))
                    .collect(),
            ),
            Err(_) => {
                res.status(StatusCode::NOT_FOUND).send("Not Found");
                return;
            }
        };

        let Some(route) = self.routes.get(index) else {
            res.status(StatusCode::NOT_FOUND).send("Not Found");
            return;
        };

        let Some(handler) = route.handler_for(req.method()) else {
            // matching path but not method
            res.status(StatusCode::METHOD_NOT_ALLOWED)
                .send("Method Not Allowed");
            return;
        };

        req.set_params(params);
        handler.handle(req, res).await;
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.routes)
            .finish()
    }
}
