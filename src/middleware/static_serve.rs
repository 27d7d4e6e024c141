use crate::handler::{
    Request, Response,
    middleware::{Middleware, MiddlewareResult, next, stop},
};
use async_trait::async_trait;
use bytes::Bytes;
use hyper::{Method, header, header::HeaderValue};
use log::debug;
use quick_cache::sync::Cache;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const CACHE_CAPACITY: usize = 128;
const MAX_CACHED_BYTES: usize = 512 * 1024;

#[derive(Debug)]
struct CachedFile {
    bytes: Bytes,
    content_type: String,
    last_modified: Option<String>,
}

/// Serves files from `root` for requests under `mount`, e.g. `/assets/app.js`
/// → `{root}/app.js`. Small files are kept in an in-memory cache.
#[derive(Clone)]
pub struct StaticServeMiddleware {
    mount: String,
    root: PathBuf,
    cache: Arc<Cache<PathBuf, Arc<CachedFile>>>,
}

impl StaticServeMiddleware {
    pub fn new(mount: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        let mount = format!("/{}", mount.into().trim_matches('/'));
        Self {
            mount,
            root: root.into(),
            cache: Arc::new(Cache::new(CACHE_CAPACITY)),
        }
    }

    /// Maps a request path to a file under `root`, refusing anything that
    /// would escape it.
    fn resolve(&self, uri_path: &str) -> Option<PathBuf> {
        let rest = uri_path.strip_prefix(&self.mount)?.strip_prefix('/')?;

        let mut path = self.root.clone();
        for segment in rest.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." || segment.contains('\\') {
                return None;
            }
            path.push(segment);
        }
        Some(path)
    }

    async fn load(&self, path: &Path) -> Option<Arc<CachedFile>> {
        if let Some(cached) = self.cache.get(path) {
            return Some(cached);
        }

        let metadata = tokio::fs::metadata(path).await.ok()?;
        if !metadata.is_file() {
            return None;
        }
        let data = tokio::fs::read(path).await.ok()?;

        let file = Arc::new(CachedFile {
            content_type: mime_guess::from_path(path)
                .first_or_octet_stream()
                .essence_str()
                .to_owned(),
            last_modified: metadata.modified().ok().map(httpdate::fmt_http_date),
            bytes: Bytes::from(data),
        });

        if file.bytes.len() < MAX_CACHED_BYTES {
            self.cache.insert(path.to_path_buf(), Arc::clone(&file));
        }

        Some(file)
    }
}

impl std::fmt::Debug for StaticServeMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticServeMiddleware")
            .field("mount", &self.mount)
            .field("root", &self.root)
            .finish()
    }
}

#[async_trait]
impl Middleware for StaticServeMiddleware {
    async fn call(&self, req: &mut Request, res: &mut Response) -> MiddlewareResult {
        if req.method() != Method::GET && req.method() != Method::HEAD {
            return next();
        }

        let Some(path) = self.resolve(req.uri().path()) else {
            return next();
        };

        let Some(file) = self.load(&path).await else {
            debug!("static miss: {}", path.display());
            return next();
        };

        if let Ok(value) = HeaderValue::from_str(&file.content_type) {
            res.set(header::CONTENT_TYPE, value);
        }
        if let Some(value) = file
            .last_modified
            .as_deref()
            .and_then(|v| HeaderValue::from_str(v).ok())
        {
            res.set(header::LAST_MODIFIED, value);
        }
        res.send(&file.bytes);
        stop()
    }
}
