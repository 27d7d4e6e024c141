use super::{storage::StorageResult, store::SessionStore};
use crate::auth::user::{Role, User};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};

/// What a client's session is known to be right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "user", rename_all = "lowercase")]
pub enum Snapshot {
    /// Persistent storage has not been read yet.
    Pending,
    Anonymous,
    Authenticated(User),
}

impl Snapshot {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Snapshot::Pending)
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Snapshot::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    /// Role used for access checks; anonymous clients act as guests.
    /// `None` while pending.
    pub fn role(&self) -> Option<Role> {
        match self {
            Snapshot::Pending => None,
            Snapshot::Anonymous => Some(Role::Guest),
            Snapshot::Authenticated(user) => Some(user.role),
        }
    }
}

/// The one current user of a client, shared by every reader and mutated only
/// by [`crate::auth::AuthOperations`].
#[derive(Debug)]
pub struct Session {
    store: SessionStore,
    snapshot: RwLock<Snapshot>,
    loading: AtomicBool,
}

impl Session {
    pub fn new(store: SessionStore) -> Self {
        Self {
            store,
            snapshot: RwLock::new(Snapshot::Pending),
            loading: AtomicBool::new(false),
        }
    }

    /// Resolves a pending session from storage. Already resolved sessions
    /// are returned as they are.
    pub fn hydrate(&self) -> Snapshot {
        if self.snapshot.read().is_resolved() {
            return self.snapshot();
        }

        let mut snapshot = self.snapshot.write();
        if let Snapshot::Pending = &*snapshot {
            *snapshot = match self.store.load() {
                Some(user) => Snapshot::Authenticated(user),
                None => Snapshot::Anonymous,
            };
        }
        snapshot.clone()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.read().clone()
    }

    pub fn current_user(&self) -> Option<User> {
        self.snapshot.read().user().cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(&*self.snapshot.read(), Snapshot::Authenticated(_))
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    /// Persists `user` then makes it current. The snapshot only changes once
    /// the write succeeded.
    pub(crate) fn establish(&self, user: User) -> StorageResult<()> {
        self.store.save(&user)?;
        *self.snapshot.write() = Snapshot::Authenticated(user);
        Ok(())
    }

    /// Forgets the current user. The in-memory snapshot is cleared even when
    /// storage fails, so a failed logout never leaves the client signed in.
    pub(crate) fn end(&self) -> StorageResult<()> {
        *self.snapshot.write() = Snapshot::Anonymous;
        self.store.clear()
    }

    /// Raises the loading flag for the lifetime of the returned guard.
    /// `None` when another operation already holds it.
    pub(crate) fn begin_operation(&self) -> Option<LoadingGuard<'_>> {
        self.loading
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| LoadingGuard {
                flag: &self.loading,
            })
    }
}

/// Clears the loading flag on drop, whichever way the operation ended.
#[derive(Debug)]
pub struct LoadingGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::storage::{KeyValueStore, MemoryStorage};
    use crate::session::store::SESSION_KEY;
    use std::sync::Arc;

    fn session() -> (Session, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        (Session::new(SessionStore::new(storage.clone())), storage)
    }

    #[test]
    fn starts_pending_and_hydrates_to_anonymous() {
        let (session, _) = session();
        assert_eq!(session.snapshot(), Snapshot::Pending);
        assert_eq!(session.snapshot().role(), None);

        assert_eq!(session.hydrate(), Snapshot::Anonymous);
        assert_eq!(session.snapshot().role(), Some(Role::Guest));
    }

    #[test]
    fn hydrates_stored_user_once() {
        let (session, storage) = session();
        let user = User::new("Admin User", "admin@eventhive.com", Role::Admin);
        storage
            .set(SESSION_KEY, &serde_json::to_string(&user).unwrap())
            .unwrap();

        assert_eq!(session.hydrate(), Snapshot::Authenticated(user.clone()));

        // later storage edits do not leak into a resolved snapshot
        storage.remove(SESSION_KEY).unwrap();
        assert_eq!(session.hydrate(), Snapshot::Authenticated(user));
    }

    #[test]
    fn stored_guest_hydrates_as_signed_out() {
        let (session, storage) = session();
        let visitor = User::new("Visitor", "visitor@eventhive.com", Role::Guest);
        storage
            .set(SESSION_KEY, &serde_json::to_string(&visitor).unwrap())
            .unwrap();

        assert_eq!(session.hydrate(), Snapshot::Anonymous);
        assert!(!session.is_authenticated());
    }

    #[test]
    fn establish_and_end() {
        let (session, storage) = session();
        session.hydrate();

        let user = User::new("Host User", "host@eventhive.com", Role::Host);
        session.establish(user.clone()).unwrap();
        assert_eq!(session.current_user(), Some(user));
        assert!(storage.get(SESSION_KEY).unwrap().is_some());

        session.end().unwrap();
        assert!(!session.is_authenticated());
        assert_eq!(storage.get(SESSION_KEY).unwrap(), None);
    }

    #[test]
    fn loading_guard_is_exclusive_and_resets_on_drop() {
        let (session, _) = session();

        let guard = session.begin_operation().expect("first operation");
        assert!(session.is_loading());
        assert!(session.begin_operation().is_none());

        drop(guard);
        assert!(!session.is_loading());
        assert!(session.begin_operation().is_some());
    }
}
