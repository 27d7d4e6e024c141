use super::{
    error::AuthResult,
    password::Passwords,
    user::{Role, User},
};
use crate::backend::{Backend, BackendError, BackendResult, Collection, Query, Record};
use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use uuid::Uuid;

/// A user as the directory returns it: no secret, identifier unchecked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryUser {
    pub id: Option<String>,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl DirectoryUser {
    /// Converts into a session user, issuing a new identifier when the
    /// directory's one is malformed.
    pub fn into_user(self) -> User {
        let (user, repaired) = User::with_raw_id(self.id.as_deref(), self.name, self.email, self.role);
        if repaired {
            warn!("directory returned a malformed id for {}, reissued", user.email);
        }
        user
    }
}

/// Account data written at sign-up. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub user: User,
    pub password_hash: String,
}

/// Fixture format for seeding a directory. A `guest` role is registered as
/// `user`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedUser {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// The account matching both `email` and `password`, if any.
    async fn authenticate(&self, email: &str, password: &str) -> BackendResult<Option<DirectoryUser>>;

    async fn email_exists(&self, email: &str) -> BackendResult<bool>;

    async fn register(&self, account: NewAccount) -> BackendResult<()>;
}

/// Directory over a [`Backend`]: credentials in `profiles`, roles in
/// `user_roles`. Local runs point it at the in-memory backend.
pub struct BackendDirectory {
    backend: Arc<dyn Backend>,
    passwords: Passwords,
}

impl BackendDirectory {
    pub fn new(backend: Arc<dyn Backend>, passwords: Passwords) -> Self {
        Self { backend, passwords }
    }

    /// Registers fixture accounts whose email is not taken yet and returns
    /// how many were added. Malformed fixture ids are replaced once here, so
    /// an account keeps its id across sign-ins.
    pub async fn seed(&self, accounts: Vec<SeedUser>) -> AuthResult<usize> {
        let mut added = 0;
        for account in accounts {
            if self.email_exists(&account.email).await? {
                debug!("seed account {} already registered", account.email);
                continue;
            }

            let role = match account.role {
                Role::Guest => {
                    warn!("seed account {} cannot be a guest, registering as user", account.email);
                    Role::User
                }
                role => role,
            };
            let (user, repaired) =
                User::with_raw_id(account.id.as_deref(), account.name, account.email, role);
            if repaired {
                debug!("seed account {} given id {}", user.email, user.id);
            }

            let password_hash = self.passwords.hash_blocking(&account.password).await?;
            self.register(NewAccount {
                user,
                password_hash,
            })
            .await?;
            added += 1;
        }
        Ok(added)
    }

    /// Role row of `user_id`. Missing or unknown roles read as `user`, and so
    /// does `guest`, which belongs to signed-out visitors only.
    async fn role_of(&self, user_id: &Value) -> BackendResult<Role> {
        let rows = self
            .backend
            .query(
                Collection::UserRoles,
                &Query::all().eq("user_id", user_id.clone()).limit(1),
            )
            .await?;

        let role = rows
            .first()
            .and_then(|r| r.get("role"))
            .and_then(Value::as_str)
            .and_then(|r| r.parse::<Role>().ok())
            .filter(|r| *r != Role::Guest)
            .unwrap_or(Role::User);
        Ok(role)
    }
}

fn text(record: &Record, field: &str) -> BackendResult<String> {
    record
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| BackendError::Decode(format!("profile field `{field}` missing")))
}

#[async_trait]
impl UserDirectory for BackendDirectory {
    async fn authenticate(&self, email: &str, password: &str) -> BackendResult<Option<DirectoryUser>> {
        let rows = self
            .backend
            .query(Collection::Profiles, &Query::all().eq("email", email))
            .await?;

        for profile in rows {
            let Ok(hash) = text(&profile, "password_hash") else {
                continue;
            };
            if !self.passwords.verify_blocking(password, &hash).await {
                continue;
            }

            let id = profile.get("id").cloned().unwrap_or(Value::Null);
            let role = self.role_of(&id).await?;
            return Ok(Some(DirectoryUser {
                id: match &id {
                    Value::String(s) => Some(s.clone()),
                    Value::Null => None,
                    other => Some(other.to_string()),
                },
                name: text(&profile, "name")?,
                email: text(&profile, "email")?,
                role,
            }));
        }

        Ok(None)
    }

    async fn email_exists(&self, email: &str) -> BackendResult<bool> {
        let rows = self
            .backend
            .query(Collection::Profiles, &Query::all().eq("email", email).limit(1))
            .await?;
        Ok(!rows.is_empty())
    }

    async fn register(&self, account: NewAccount) -> BackendResult<()> {
        let NewAccount {
            user,
            password_hash,
        } = account;
        let id = user.id.to_string();

        let profile = json!({
            "id": id,
            "name": user.name,
            "email": user.email,
            "password_hash": password_hash,
        });
        let role = json!({
            "id": Uuid::new_v4().to_string(),
            "user_id": id,
            "role": user.role,
        });

        self.backend
            .insert(Collection::Profiles, into_record(profile)?)
            .await?;
        self.backend
            .insert(Collection::UserRoles, into_record(role)?)
            .await?;
        Ok(())
    }
}

fn into_record(value: Value) -> BackendResult<Record> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(BackendError::Decode(format!("expected object, got {other}"))),
    }
}
