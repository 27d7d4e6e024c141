use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;
use uuid::Uuid;

/// Access level of a client. Roles are not hierarchical: every permission
/// check names the roles it admits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Host,
    User,
    /// Unauthenticated visitor.
    Guest,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role `{0}`")]
pub struct UnknownRole(pub String);

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Host, Role::User, Role::Guest];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Host => "host",
            Role::User => "user",
            Role::Guest => "guest",
        }
    }

    /// Landing page after a successful sign-in.
    pub fn home_path(&self) -> &'static str {
        match self {
            Role::Admin => "/dashboard",
            Role::Host => "/manage-events",
            Role::User | Role::Guest => "/events",
        }
    }

    /// Role granted to a sign-up request. Anything other than `admin` or
    /// `host` becomes a plain `user`; nobody signs up as a guest.
    pub fn for_signup(requested: &str) -> Role {
        match requested.parse() {
            Ok(Role::Admin) => Role::Admin,
            Ok(Role::Host) => Role::Host,
            _ => Role::User,
        }
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "host" => Ok(Role::Host),
            "user" => Ok(Role::User),
            "guest" => Ok(Role::Guest),
            other => Err(UnknownRole(other.to_owned())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The signed-in user as held by a client session. Never carries a
/// credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl User {
    pub fn new(name: impl Into<String>, email: impl Into<String>, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
            role,
        }
    }

    /// Builds a user from an identifier of unknown quality, issuing a fresh
    /// one when it does not parse as a UUID.
    pub fn with_raw_id(raw_id: Option<&str>, name: String, email: String, role: Role) -> (Self, bool) {
        let parsed = raw_id.and_then(|id| Uuid::parse_str(id).ok());
        let repaired = parsed.is_none();
        let user = Self {
            id: parsed.unwrap_or_else(Uuid::new_v4),
            name,
            email,
            role,
        };
        (user, repaired)
    }
}
