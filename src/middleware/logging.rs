use crate::handler::{
    Request, Response,
    middleware::{Middleware, MiddlewareResult, next},
};
use async_trait::async_trait;
use hyper::header::USER_AGENT;
use log::{Level, log};
use std::sync::atomic::{AtomicU64, Ordering};

/// Sequence number assigned to a request by [`LoggingMiddleware`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestId(pub u64);

/// Logs each incoming request and tags it with a [`RequestId`].
///
/// Page and API requests log at `info`, static assets at `debug`:
/// ```text
/// #12 GET /events (Mozilla/5.0)
/// ```
#[derive(Debug, Default)]
pub struct LoggingMiddleware {
    seq: AtomicU64,
}

impl LoggingMiddleware {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Middleware for LoggingMiddleware {
    async fn call(&self, req: &mut Request, _res: &mut Response) -> MiddlewareResult {
        let id = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        let path = req.uri().path();
        let level = if path.starts_with("/assets/") {
            Level::Debug
        } else {
            Level::Info
        };

        log!(
            level,
            "#{} {} {} ({})",
            id,
            req.method(),
            path,
            req.headers()
                .get(USER_AGENT)
                .and_then(|h| h.to_str().ok())
                .unwrap_or("-")
        );

        req.extensions_mut().insert(RequestId(id));
        next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[tokio::test]
    async fn requests_are_numbered_in_arrival_order() {
        let logging = LoggingMiddleware::new();

        let mut ids = Vec::new();
        for path in ["/events", "/assets/app.js"] {
            let mut req = hyper::Request::builder().uri(path).body(Bytes::new()).unwrap();
            assert!(logging.call(&mut req, &mut Response::new()).await.is_next());
            ids.push(*req.extensions().get::<RequestId>().unwrap());
        }

        assert_eq!(ids, [RequestId(1), RequestId(2)]);
    }
}
