use crate::handler::{Handler, Middleware, Request, Response};
use crate::router::Router;
use crate::server::Server;
use bytes::Bytes;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Incoming;
use hyper::{Method, StatusCode};
use log::{debug, info};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

pub struct App {
    middleware: Vec<Arc<dyn Middleware>>,
    router: Router,
    max_body_bytes: usize,
}

impl Default for App {
    fn default() -> Self {
        Self {
            middleware: Vec::new(),
            router: Router::default(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_body_bytes(&mut self, limit: usize) -> &mut Self {
        self.max_body_bytes = limit;
        self
    }

    pub fn use_with<M: Middleware>(&mut self, middleware: M) -> &mut Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    pub fn route(&mut self, path: impl AsRef<str>, method: Method, handler: impl Handler) -> &mut Self {
        self.router.route(path, method, Arc::new(handler));
        self
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Runs the middleware chain then the matched route.
    pub async fn dispatch(&self, mut req: Request) -> Response {
        let mut res = Response::new();

        for middleware in &self.middleware {
            if middleware.call(&mut req, &mut res).await.is_stop() {
                return res;
            }
        }

        self.router.handle(&mut req, &mut res).await;
        res
    }

    async fn serve(
        &self,
        req: hyper::Request<Incoming>,
    ) -> Result<hyper::Response<Full<Bytes>>, Infallible> {
        let start = Instant::now();
        let method = req.method().clone();
        let path = req.uri().path().to_owned();

        let (parts, body) = req.into_parts();
        let response = match Limited::new(body, self.max_body_bytes).collect().await {
            Ok(collected) => {
                let req = Request::from_parts(parts, collected.to_bytes());
                self.dispatch(req).await
            }
            Err(e) => {
                debug!("rejected body for {} {}: {}", method, path, e);
                let mut res = Response::new();
                if e.is::<http_body_util::LengthLimitError>() {
                    res.status(StatusCode::PAYLOAD_TOO_LARGE)
                        .send("Payload too large");
                } else {
                    res.status(StatusCode::BAD_REQUEST).send("Bad Request");
                }
                res
            }
        };

        if cfg!(debug_assertions) {
            info!(
                "{} {} {} ({} ms)",
                method,
                path,
                response.status_code().as_u16(),
                start.elapsed().as_millis()
            );
        }

        Ok(response.into_hyper())
    }

    pub async fn listen<T: FnOnce(SocketAddr)>(
        self,
        port: u16,
        callback: T,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let app = Arc::new(self);

        callback(addr);

        Server::bind(addr, move |req| {
            let app = Arc::clone(&app);
            async move { app.serve(req).await }
        })
        .await
    }
}

macro_rules! generate_methods {
    (
        methods: [$($method:ident => $verb:ident),* $(,)?]
    ) => {
        impl App {
            $(
                pub fn $method(&mut self, path: impl AsRef<str>, handler: impl Handler) -> &mut Self {
                    self.route(path, Method::$verb, handler)
                }
            )*
        }
    };
}

generate_methods! {
    methods: [get => GET, post => POST, put => PUT, delete => DELETE, patch => PATCH]
}
