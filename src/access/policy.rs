use crate::auth::user::Role;
use log::error;
use matchit::Router as MatchitRouter;
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use serde::Serialize;
use smallvec::SmallVec;
use std::sync::Arc;
use thiserror::Error;

use Role::{Admin, Guest, Host, User};

/// Who may open a route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "roles", rename_all = "lowercase")]
pub enum Access {
    /// Reachable before the session is known, e.g. the sign-in page.
    Public,
    /// Exactly these roles. `guest` admits anonymous clients.
    Roles(SmallVec<[Role; 4]>),
}

impl Access {
    pub fn roles(roles: &[Role]) -> Self {
        Access::Roles(roles.iter().copied().collect())
    }

    pub fn allows(&self, role: Role) -> bool {
        match self {
            Access::Public => true,
            Access::Roles(roles) => roles.contains(&role),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyEntry {
    pub path: String,
    pub access: Access,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution<'a> {
    Guarded(&'a PolicyEntry),
    NotFound,
}

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("route {0} is already listed")]
    Duplicate(String),
    #[error("route {path} is not a valid pattern: {message}")]
    InvalidPattern { path: String, message: String },
}

/// The one table mapping routes to the roles allowed on them.
///
/// Lookups are exact: `/events/{id}` matches a single segment and nothing is
/// inherited from a parent path. Roles are not hierarchical, so an entry lists
/// every role it admits.
#[derive(Default)]
pub struct RolePolicy {
    entries: Vec<PolicyEntry>,
    by_path: FxHashMap<String, usize>,
    matcher: MatchitRouter<usize>,
}

static STANDARD: Lazy<Arc<RolePolicy>> = Lazy::new(|| Arc::new(RolePolicy::build_standard()));

const EVERYONE: &[Role] = &[Admin, Host, User, Guest];
const SIGNED_IN: &[Role] = &[Admin, Host, User];
const HOSTS: &[Role] = &[Host];
const ORGANISERS: &[Role] = &[Admin, Host];
const ADMINS: &[Role] = &[Admin];

const STANDARD_ROUTES: &[(&str, Option<&[Role]>)] = &[
    ("/", Some(EVERYONE)),
    ("/events", Some(EVERYONE)),
    ("/events/{id}", Some(EVERYONE)),
    ("/leaderboard", Some(EVERYONE)),
    ("/signin", None),
    ("/signup", None),
    ("/profile", Some(SIGNED_IN)),
    ("/messages", Some(SIGNED_IN)),
    ("/settings", Some(SIGNED_IN)),
    ("/submit-event", Some(HOSTS)),
    ("/attendance", Some(HOSTS)),
    ("/certificates", Some(HOSTS)),
    ("/mark-attendance", Some(HOSTS)),
    ("/manage-events", Some(ORGANISERS)),
    ("/manage-attendance/{eventId}", Some(ORGANISERS)),
    ("/dashboard", Some(ADMINS)),
    ("/admin", Some(ADMINS)),
    ("/pending-events", Some(ADMINS)),
    ("/users", Some(ADMINS)),
    ("/reports", Some(ADMINS)),
];

impl RolePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// The application's route table, shared process-wide.
    pub fn standard() -> Arc<RolePolicy> {
        Arc::clone(&STANDARD)
    }

    fn build_standard() -> Self {
        let mut policy = Self::new();
        for (path, roles) in STANDARD_ROUTES {
            let access = match roles {
                Some(roles) => Access::roles(roles),
                None => Access::Public,
            };
            if let Err(e) = policy.allow(*path, access) {
                error!("route policy entry skipped: {}", e);
            }
        }
        policy
    }

    pub fn allow(&mut self, path: impl Into<String>, access: Access) -> Result<&mut Self, PolicyError> {
        let path = path.into();
        if self.by_path.contains_key(&path) {
            return Err(PolicyError::Duplicate(path));
        }

        let index = self.entries.len();
        self.matcher
            .insert(path.as_str(), index)
            .map_err(|e| PolicyError::InvalidPattern {
                path: path.clone(),
                message: e.to_string(),
            })?;
        self.by_path.insert(path.clone(), index);
        self.entries.push(PolicyEntry { path, access });
        Ok(self)
    }

    pub fn resolve(&self, path: &str) -> Resolution<'_> {
        match self.matcher.at(normalise(path)) {
            Ok(found) => self
                .entries
                .get(*found.value)
                .map_or(Resolution::NotFound, Resolution::Guarded),
            Err(_) => Resolution::NotFound,
        }
    }

    /// Whether `role` may open `path`. Unlisted paths admit nobody.
    pub fn permits(&self, path: &str, role: Role) -> bool {
        match self.resolve(path) {
            Resolution::Guarded(entry) => entry.access.allows(role),
            Resolution::NotFound => false,
        }
    }

    pub fn entries(&self) -> &[PolicyEntry] {
        &self.entries
    }
}

impl std::fmt::Debug for RolePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RolePolicy")
            .field("entries", &self.entries)
            .finish()
    }
}

fn normalise(path: &str) -> &str {
    match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}
