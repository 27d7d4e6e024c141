use crate::handler::{
    Request, Response,
    middleware::{Middleware, MiddlewareResult, next},
};
use async_trait::async_trait;
use hyper::header::HeaderValue;

/// Injects common HTTP security headers into every response.
///
/// Session cookies are `HttpOnly`, so the policy only needs to keep the
/// application shell from being framed or sniffed.
#[derive(Debug, Clone)]
pub struct SecurityHeadersMiddleware;

#[async_trait]
impl Middleware for SecurityHeadersMiddleware {
    async fn call(&self, _req: &mut Request, res: &mut Response) -> MiddlewareResult {
        res.header(
            "content-security-policy",
            HeaderValue::from_static(
                "default-src 'self'; img-src 'self' data: https:; style-src 'self' 'unsafe-inline';",
            ),
        );
        res.header("x-content-type-options", HeaderValue::from_static("nosniff"));
        res.header("x-frame-options", HeaderValue::from_static("DENY"));
        res.header(
            "referrer-policy",
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        );

        next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[tokio::test]
    async fn adds_headers_and_continues() {
        let mut req = hyper::Request::builder()
            .uri("/")
            .body(Bytes::new())
            .unwrap();
        let mut res = Response::new();

        let result = SecurityHeadersMiddleware.call(&mut req, &mut res).await;

        assert!(result.is_next());
        assert_eq!(res.get("x-frame-options").unwrap(), "DENY");
        assert_eq!(res.get("x-content-type-options").unwrap(), "nosniff");
    }
}
