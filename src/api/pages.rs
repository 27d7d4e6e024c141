use super::AppState;
use crate::handler::{Handler, Request, Response};
use async_trait::async_trait;
use hyper::header::{self, HeaderValue};
use log::debug;
use std::sync::Arc;

const FALLBACK_SHELL: &str = "<!doctype html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>EventHive</title></head>\n<body><div id=\"root\"></div></body>\n</html>\n";

/// Serves the single-page shell for a page route. Access has already been
/// decided by `GuardMiddleware`.
pub struct Shell(pub Arc<AppState>);

#[async_trait]
impl Handler for Shell {
    async fn handle(&self, _req: &mut Request, res: &mut Response) {
        let index = self.0.static_dir.join("index.html");
        let body = match tokio::fs::read(&index).await {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!("no page shell at {}: {}", index.display(), e);
                FALLBACK_SHELL.as_bytes().to_vec()
            }
        };

        res.set(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        )
        .set(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"))
        .send(body);
    }
}
