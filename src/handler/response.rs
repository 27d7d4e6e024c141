use bytes::{Bytes, BytesMut};
use http_body_util::Full;
use hyper::{
    HeaderMap, Response as HyperResponse, StatusCode,
    header::{self, HeaderName, HeaderValue, IntoHeaderName},
};
use log::error;
use std::str::FromStr;

#[derive(Debug, Clone, Default)]
pub struct Response {
    status: StatusCode,
    body: BytesMut,
    headers: HeaderMap,
    ended: bool,
}

impl Response {
    pub fn new() -> Self {
        Response {
            status: StatusCode::OK,
            body: BytesMut::with_capacity(512),
            headers: HeaderMap::with_capacity(8),
            ended: false,
        }
    }

    pub fn status(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    pub fn set<K: IntoHeaderName, V: Into<HeaderValue>>(&mut self, key: K, val: V) -> &mut Self {
        self.headers.insert(key, val.into());
        self
    }

    /// Alias of [`Response::set`].
    pub fn header<K: IntoHeaderName, V: Into<HeaderValue>>(&mut self, key: K, val: V) -> &mut Self {
        self.set(key, val)
    }

    /// Adds a header without replacing existing values, e.g. `Set-Cookie`.
    pub fn append<K: IntoHeaderName, V: Into<HeaderValue>>(&mut self, key: K, val: V) -> &mut Self {
        self.headers.append(key, val.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&HeaderValue> {
        HeaderName::from_str(key)
            .ok()
            .and_then(|k| self.headers.get(&k))
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn write(&mut self, data: impl AsRef<[u8]>) -> &mut Self {
        self.body.extend_from_slice(data.as_ref());
        self
    }

    pub fn send(&mut self, data: impl AsRef<[u8]>) -> &mut Self {
        let data = data.as_ref();

        self.body.clear();
        self.body.reserve(data.len());
        self.body.extend_from_slice(data);

        self.set(header::CONTENT_LENGTH, HeaderValue::from(data.len()));

        if !self.headers.contains_key(header::CONTENT_TYPE) {
            // Best guess: plain text if it's utf8
            if std::str::from_utf8(data).is_ok() {
                self.set(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("text/plain; charset=utf-8"),
                );
            } else {
                self.set(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/octet-stream"),
                );
            }
        }

        self.end()
    }

    pub fn json<T: serde::Serialize>(&mut self, value: T) -> &mut Self {
        match serde_json::to_vec(&value) {
            Ok(json) => {
                self.set(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );
                self.send(json)
            }
            Err(e) => {
                error!("failed to serialize JSON response: {}", e);
                self.status(StatusCode::INTERNAL_SERVER_ERROR)
                    .send("Internal Server Error")
            }
        }
    }

    #[inline]
    pub fn end(&mut self) -> &mut Self {
        self.ended = true;
        self
    }

    /// `303 See Other`: the browser replaces the current entry instead of
    /// keeping the redirecting URL in its history.
    pub fn see_other(&mut self, location: impl Into<HeaderValue>) -> &mut Self {
        self.status = StatusCode::SEE_OTHER;
        self.body.clear();
        self.set(header::LOCATION, location);
        self.set(header::CONTENT_LENGTH, HeaderValue::from_static("0"));
        self.end()
    }

    pub fn into_hyper(mut self) -> HyperResponse<Full<Bytes>> {
        #[inline(always)]
        fn build_error_response() -> HyperResponse<Full<Bytes>> {
            let mut res = HyperResponse::new(Full::new(Bytes::from_static(b"Internal Server Error")));
            *res.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            res
        }

        if !self.ended {
            self.end();
        }

        let body = self.body.freeze();

        let status = if body.is_empty() && self.status == StatusCode::OK {
            StatusCode::NO_CONTENT
        } else {
            self.status
        };

        let mut builder = HyperResponse::builder().status(status);
        if let Some(headers) = builder.headers_mut() {
            *headers = std::mem::take(&mut self.headers);
        }

        builder.body(Full::new(body)).unwrap_or_else(|e| {
            error!("failed to build response: {}", e);
            build_error_response()
        })
    }
}

impl From<Response> for HyperResponse<Full<Bytes>> {
    fn from(resp: Response) -> Self {
        resp.into_hyper()
    }
}
