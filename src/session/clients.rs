use super::{
    state::Session,
    storage::{FileStorage, KeyValueStore, MemoryStorage},
    store::SessionStore,
};
use crate::auth::{config::CookieConfig, cookies::CookieHandler};
use crate::handler::{
    Request, Response,
    middleware::{Middleware, MiddlewareResult, next},
};
use crate::notifications::Notifications;
use crate::preferences::ThemeStore;
use async_trait::async_trait;
use hyper::header::{HeaderValue, SET_COOKIE};
use log::{debug, warn};
use quick_cache::sync::Cache;
use std::convert::Infallible;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Where per-client key-value documents live.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StorageBackend {
    /// Lost on restart.
    #[default]
    Memory,
    /// One `<client id>.json` document per client under this directory.
    Directory(PathBuf),
}

/// Everything the server tracks for one browser.
#[derive(Debug)]
pub struct ClientState {
    pub id: Uuid,
    pub session: Session,
    pub notifications: Notifications,
    pub themes: ThemeStore,
}

impl ClientState {
    fn open(id: Uuid, storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            id,
            session: Session::new(SessionStore::new(storage.clone())),
            notifications: Notifications::new(),
            themes: ThemeStore::new(storage),
        }
    }
}

/// Live clients kept when no capacity is configured.
pub const DEFAULT_CLIENT_CAPACITY: usize = 10_000;

/// Live client states by identifier, bounded: the least useful entries are
/// evicted once `capacity` is reached. An evicted client with directory
/// storage is reopened from its document on its next request.
pub struct ClientRegistry {
    clients: Cache<Uuid, Arc<ClientState>>,
    storage: StorageBackend,
}

impl fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientRegistry")
            .field("live", &self.clients.len())
            .field("storage", &self.storage)
            .finish()
    }
}

impl ClientRegistry {
    pub fn new(storage: StorageBackend) -> Self {
        Self::with_capacity(storage, DEFAULT_CLIENT_CAPACITY)
    }

    pub fn with_capacity(storage: StorageBackend, capacity: usize) -> Self {
        Self {
            clients: Cache::new(capacity.max(1)),
            storage,
        }
    }

    /// Returns the state for `id`.
    ///
    /// A live client is returned as is. An identifier that is not live is
    /// only honoured when its storage document exists; otherwise, and for a
    /// `None` id, a new client with a fresh identifier is issued. Callers
    /// compare the returned id with the one they asked for to know whether
    /// the client cookie must be (re)issued.
    pub fn get_or_open(&self, id: Option<Uuid>) -> Arc<ClientState> {
        if let Some(id) = id {
            if let Some(client) = self.clients.get(&id) {
                return client;
            }
            if self.has_document(id) {
                return self.open(id);
            }
            debug!("client {} is not known here, issuing a new one", id);
        }
        self.open(Uuid::new_v4())
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Upper bound on live clients.
    pub fn capacity(&self) -> u64 {
        self.clients.capacity()
    }

    fn open(&self, id: Uuid) -> Arc<ClientState> {
        let opened: Result<_, Infallible> = self.clients.get_or_insert_with(&id, || {
            debug!("opening client {}", id);
            Ok(Arc::new(ClientState::open(id, self.open_storage(id))))
        });
        match opened {
            Ok(client) => client,
            Err(never) => match never {},
        }
    }

    fn document_path(dir: &Path, id: Uuid) -> PathBuf {
        dir.join(format!("{id}.json"))
    }

    fn has_document(&self, id: Uuid) -> bool {
        match &self.storage {
            StorageBackend::Memory => false,
            StorageBackend::Directory(dir) => Self::document_path(dir, id).is_file(),
        }
    }

    fn open_storage(&self, id: Uuid) -> Arc<dyn KeyValueStore> {
        match &self.storage {
            StorageBackend::Memory => Arc::new(MemoryStorage::new()),
            StorageBackend::Directory(dir) => Arc::new(FileStorage::new(Self::document_path(dir, id))),
        }
    }
}

/// Request extension carrying the resolved client.
#[derive(Debug, Clone)]
pub struct ClientContext(pub Arc<ClientState>);

pub fn client_of(req: &Request) -> Option<Arc<ClientState>> {
    req.extensions()
        .get::<ClientContext>()
        .map(|ctx| Arc::clone(&ctx.0))
}

/// Resolves the client cookie into a [`ClientState`] and attaches it to the
/// request. Clients without a usable cookie, or with one this server cannot
/// account for, get a new identifier and a `Set-Cookie` for it.
pub struct ClientMiddleware {
    registry: Arc<ClientRegistry>,
    cookies: CookieConfig,
}

impl ClientMiddleware {
    pub fn new(registry: Arc<ClientRegistry>, cookies: CookieConfig) -> Self {
        Self { registry, cookies }
    }

    fn known_client(&self, req: &Request) -> Option<Uuid> {
        let raw = match CookieHandler::get_cookie_value(req, &self.cookies.cookie_name) {
            Ok(raw) => raw?,
            Err(e) => {
                debug!("ignoring cookies: {}", e);
                return None;
            }
        };

        match Uuid::parse_str(&raw) {
            Ok(id) => Some(id),
            Err(_) => {
                warn!("discarding malformed client cookie");
                None
            }
        }
    }
}

#[async_trait]
impl Middleware for ClientMiddleware {
    async fn call(&self, req: &mut Request, res: &mut Response) -> MiddlewareResult {
        let known = self.known_client(req);
        let client = self.registry.get_or_open(known);

        if known != Some(client.id) {
            let cookie = CookieHandler::create_client_cookie(&client.id.to_string(), &self.cookies);
            match HeaderValue::from_str(&cookie.to_string()) {
                Ok(value) => {
                    res.append(SET_COOKIE, value);
                }
                Err(e) => warn!("could not encode client cookie: {}", e),
            }
        }

        req.extensions_mut().insert(ClientContext(client));
        next()
    }
}
