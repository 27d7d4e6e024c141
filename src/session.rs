pub mod clients;
pub mod state;
pub mod storage;
pub mod store;

pub use clients::{
    ClientContext, ClientMiddleware, ClientRegistry, ClientState, DEFAULT_CLIENT_CAPACITY, StorageBackend,
    client_of,
};
pub use state::{LoadingGuard, Session, Snapshot};
pub use storage::{FileStorage, KeyValueStore, MemoryStorage, StorageError, StorageResult};
pub use store::SessionStore;
