use crate::access::{GuardMiddleware, RolePolicy, RouteGuard};
use crate::api::{self, AppState};
use crate::application::App;
use crate::auth::{AuthError, AuthOperations, BackendDirectory, Passwords, UserDirectory};
use crate::backend::{
    Backend, BackendError, BlobStore, Collection, MemoryBackend, MemoryBlobStore, RestBackend,
    RestBlobStore,
};
use crate::config::{AppConfig, ConfigError};
use crate::events::EventCatalog;
use crate::messages::Messenger;
use crate::middleware::{LoggingMiddleware, SecurityHeadersMiddleware, StaticServeMiddleware};
use crate::session::{ClientMiddleware, ClientRegistry};
use log::{info, warn};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to seed user directory: {0}")]
    Seed(#[from] AuthError),
    #[error("backend unusable: {0}")]
    Backend(#[from] BackendError),
}

struct Services {
    backend: Arc<dyn Backend>,
    directory: Arc<dyn UserDirectory>,
    blobs: Arc<dyn BlobStore>,
}

async fn services(config: &AppConfig, passwords: &Passwords) -> Result<Services, StartupError> {
    if let Some(rest) = &config.backend {
        info!("using hosted backend at {}", rest.base_url);
        let rest = RestBackend::new(rest.clone())?;
        let backend: Arc<dyn Backend> = Arc::new(rest.clone());
        return Ok(Services {
            directory: Arc::new(BackendDirectory::new(backend.clone(), passwords.clone())),
            blobs: Arc::new(RestBlobStore::new(rest, config.blob_bucket.clone())),
            backend,
        });
    }

    info!("using in-memory backend");
    let backend = Arc::new(MemoryBackend::new());
    let events = config.load_seed_events()?;
    if !events.is_empty() {
        info!("seeded {} events", events.len());
    }
    backend.seed(Collection::Events, events).await;

    let directory = BackendDirectory::new(backend.clone(), passwords.clone());
    let added = directory.seed(config.load_seed_users()?).await?;
    if added == 0 {
        warn!("no seed users configured; only sign-up will work");
    } else {
        info!("seeded {} accounts", added);
    }

    Ok(Services {
        backend,
        directory: Arc::new(directory),
        blobs: Arc::new(MemoryBlobStore::new()),
    })
}

/// Wires the application described by `config`. Must run inside the Tokio
/// runtime: the event catalog starts its change watcher here.
pub async fn build_app(config: &AppConfig) -> Result<App, StartupError> {
    let passwords = Passwords::default();
    let Services {
        backend,
        directory,
        blobs,
    } = services(config, &passwords).await?;

    let messages = Messenger::new(backend.clone());
    let catalog = Arc::new(EventCatalog::new(backend));
    catalog.watch();

    let guard = RouteGuard::new(RolePolicy::standard(), config.cookies.sign_in_path.clone());
    let state = Arc::new(AppState {
        auth: AuthOperations::new(directory, passwords),
        guard: guard.clone(),
        catalog,
        messages,
        blobs,
        static_dir: config.static_dir.clone(),
    });
    let registry = Arc::new(ClientRegistry::with_capacity(
        config.storage.clone(),
        config.max_clients,
    ));

    let mut app = App::new();
    app.max_body_bytes(config.max_body_bytes)
        .use_with(LoggingMiddleware::new())
        .use_with(SecurityHeadersMiddleware)
        .use_with(StaticServeMiddleware::new(
            "/assets",
            config.static_dir.join("assets"),
        ))
        .use_with(ClientMiddleware::new(registry, config.cookies.clone()))
        .use_with(GuardMiddleware::new(guard));
    api::mount(&mut app, state);
    info!("{} routes registered", app.router().paths().count());

    Ok(app)
}
