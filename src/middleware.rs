mod logging;
mod security_headers;
mod static_serve;

pub use logging::{LoggingMiddleware, RequestId};
pub use security_headers::SecurityHeadersMiddleware;
pub use static_serve::StaticServeMiddleware;
