use super::storage::{KeyValueStore, StorageResult};
use crate::auth::user::{Role, User};
use log::warn;
use serde::Deserialize;
use std::sync::Arc;

/// Storage key holding the serialized current user.
pub const SESSION_KEY: &str = "eventhive_user";

/// Shape of a persisted session record before validation. Every field is
/// loosely typed so a bad value can be told apart from a missing one.
#[derive(Debug, Deserialize)]
struct StoredUser {
    #[serde(default)]
    id: Option<serde_json::Value>,
    name: String,
    email: String,
    role: String,
}

/// Durable cache of a client's current user.
#[derive(Debug, Clone)]
pub struct SessionStore {
    storage: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    /// Reads the persisted user.
    ///
    /// Records that cannot be decoded, whose role is unknown, or that claim
    /// the `guest` role of a signed-out visitor are removed and read as "no
    /// session". A record with a missing or malformed
    /// identifier keeps its name, email and role, gets a fresh identifier and
    /// is written back.
    pub fn load(&self) -> Option<User> {
        let raw = match self.storage.get(SESSION_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("session storage unreadable, treating as signed out: {}", e);
                return None;
            }
        };

        let stored: StoredUser = match serde_json::from_str(&raw) {
            Ok(stored) => stored,
            Err(e) => {
                warn!("malformed session record discarded: {}", e);
                self.discard();
                return None;
            }
        };

        let role: Role = match stored.role.parse() {
            Ok(Role::Guest) => {
                warn!("session record rejected: guest is not an account role");
                self.discard();
                return None;
            }
            Ok(role) => role,
            Err(e) => {
                warn!("session record rejected: {}", e);
                self.discard();
                return None;
            }
        };

        let raw_id = stored.id.as_ref().and_then(|v| v.as_str());
        let (user, repaired) = User::with_raw_id(raw_id, stored.name, stored.email, role);

        if repaired {
            warn!("session record had an invalid id, reissued as {}", user.id);
            if let Err(e) = self.save(&user) {
                warn!("failed to persist repaired session record: {}", e);
            }
        }

        Some(user)
    }

    pub fn save(&self, user: &User) -> StorageResult<()> {
        let json = serde_json::to_string(user)?;
        self.storage.set(SESSION_KEY, &json)
    }

    pub fn clear(&self) -> StorageResult<()> {
        self.storage.remove(SESSION_KEY)
    }

    fn discard(&self) {
        if let Err(e) = self.clear() {
            warn!("failed to remove session record: {}", e);
        }
    }
}
