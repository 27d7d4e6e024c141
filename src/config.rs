use crate::auth::{config::CookieConfig, directory::SeedUser};
use crate::backend::{Record, RestConfig};
use crate::session::{DEFAULT_CLIENT_CAPACITY, StorageBackend};
use std::path::{Path, PathBuf};
use std::{env, fs, io};
use thiserror::Error;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_BUCKET: &str = "event-images";
const DEFAULT_MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} is not a valid value: {value}")]
    Invalid { var: &'static str, value: String },
    #[error("EVENTHIVE_BACKEND_URL is set but EVENTHIVE_BACKEND_KEY is missing")]
    MissingBackendKey,
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("{path} is not valid fixture JSON: {source}")]
    Fixture {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Server settings. Defaults suit a local run against the in-memory backend.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    /// SPA build output; `index.html` is the page shell.
    pub static_dir: PathBuf,
    pub storage: StorageBackend,
    /// Upper bound on clients held in memory at once.
    pub max_clients: usize,
    /// `None` runs against the in-memory backend.
    pub backend: Option<RestConfig>,
    pub blob_bucket: String,
    pub seed_users: Option<PathBuf>,
    pub seed_events: Option<PathBuf>,
    pub cookies: CookieConfig,
    pub max_body_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            static_dir: PathBuf::from("public"),
            storage: StorageBackend::Memory,
            max_clients: DEFAULT_CLIENT_CAPACITY,
            backend: None,
            blob_bucket: DEFAULT_BUCKET.to_string(),
            seed_users: None,
            seed_events: None,
            cookies: CookieConfig::default(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `EVENTHIVE_*` variables over the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(port) = var("EVENTHIVE_PORT") {
            config.port = port.trim().parse().map_err(|_| ConfigError::Invalid {
                var: "EVENTHIVE_PORT",
                value: port,
            })?;
        }
        if let Some(dir) = var("EVENTHIVE_STATIC_DIR") {
            config.static_dir = dir.into();
        }
        if let Some(dir) = var("EVENTHIVE_STORAGE_DIR") {
            config.storage = StorageBackend::Directory(dir.into());
        }
        if let Some(max) = var("EVENTHIVE_MAX_CLIENTS") {
            config.max_clients = match max.trim().parse() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "EVENTHIVE_MAX_CLIENTS",
                        value: max,
                    });
                }
            };
        }
        if let Some(url) = var("EVENTHIVE_BACKEND_URL") {
            let key = var("EVENTHIVE_BACKEND_KEY").ok_or(ConfigError::MissingBackendKey)?;
            config.backend = Some(RestConfig::new(url, key));
        }
        if let Some(bucket) = var("EVENTHIVE_BLOB_BUCKET") {
            config.blob_bucket = bucket;
        }
        config.seed_users = var("EVENTHIVE_SEED_USERS").map(PathBuf::from);
        config.seed_events = var("EVENTHIVE_SEED_EVENTS").map(PathBuf::from);

        if let Some(secure) = var("EVENTHIVE_SECURE_COOKIES") {
            config.cookies.secure_cookies = match secure.trim() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "EVENTHIVE_SECURE_COOKIES",
                        value: secure,
                    });
                }
            };
        }

        Ok(config)
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.static_dir = dir.into();
        self
    }

    pub fn storage(mut self, storage: StorageBackend) -> Self {
        self.storage = storage;
        self
    }

    pub fn max_clients(mut self, max: usize) -> Self {
        self.max_clients = max;
        self
    }

    pub fn backend(mut self, backend: RestConfig) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn seed_users(mut self, path: impl Into<PathBuf>) -> Self {
        self.seed_users = Some(path.into());
        self
    }

    pub fn seed_events(mut self, path: impl Into<PathBuf>) -> Self {
        self.seed_events = Some(path.into());
        self
    }

    pub fn cookies(mut self, cookies: CookieConfig) -> Self {
        self.cookies = cookies;
        self
    }

    /// Accounts for the in-memory directory. Empty when no fixture is set.
    pub fn load_seed_users(&self) -> Result<Vec<SeedUser>, ConfigError> {
        match &self.seed_users {
            Some(path) => read_fixture(path),
            None => Ok(Vec::new()),
        }
    }

    /// Rows for the in-memory `events` collection.
    pub fn load_seed_events(&self) -> Result<Vec<Record>, ConfigError> {
        match &self.seed_events {
            Some(path) => read_fixture(path),
            None => Ok(Vec::new()),
        }
    }
}

fn read_fixture<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let bytes = fs::read(path).map_err(|source| ConfigError::Read {
        path: path.to_owned(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| ConfigError::Fixture {
        path: path.to_owned(),
        source,
    })
}
