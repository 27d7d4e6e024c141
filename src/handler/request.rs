use bytes::Bytes;
use hyper::Request as HRequest;
use std::collections::HashMap;

/// Aliased request type. Bodies are collected before dispatch.
pub type Request = HRequest<Bytes>;

/// Wrapper type for route parameters.
#[derive(Debug, Clone, Default)]
pub struct RouteParams(HashMap<String, String>);

impl RouteParams {
    /// Returns a parameter by key as `Option<&str>`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Public extension trait for reading routing data off a request.
pub trait RequestExt {
    /// Route parameters captured by the matched pattern. Empty when the
    /// request has not been routed yet.
    fn params(&self) -> RouteParams;

    /// Decoded query string pairs.
    fn query_pairs(&self) -> HashMap<String, String>;

    /// Single query parameter, `None` when absent or empty.
    fn query_param(&self, key: &str) -> Option<String> {
        self.query_pairs().remove(key).filter(|v| !v.is_empty())
    }
}

pub(crate) trait RequestExtInternal {
    fn set_params(&mut self, params: HashMap<String, String>);
}

impl RequestExt for Request {
    fn params(&self) -> RouteParams {
        self.extensions()
            .get::<RouteParams>()
            .cloned()
            .unwrap_or_default()
    }

    fn query_pairs(&self) -> HashMap<String, String> {
        self.uri()
            .query()
            .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default()
    }
}

impl RequestExtInternal for Request {
    fn set_params(&mut self, params: HashMap<String, String>) {
        self.extensions_mut().insert(RouteParams(params));
    }
}
