use async_trait::async_trait;

pub mod middleware;
pub mod request;
pub mod response;

pub use middleware::{Middleware, MiddlewareResult, next, stop};
pub use request::{Request, RequestExt, RouteParams};
pub use response::Response;

/// Terminal request handler bound to a route and method.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn handle(&self, req: &mut Request, res: &mut Response);
}

/// Adapter turning a synchronous closure into a [`Handler`].
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F> Handler for FnHandler<F>
where
    F: Fn(&Request, &mut Response) + Send + Sync + 'static,
{
    async fn handle(&self, req: &mut Request, res: &mut Response) {
        (self.0)(req, res)
    }
}

pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(&Request, &mut Response) + Send + Sync + 'static,
{
    FnHandler(f)
}
