use super::error::{AuthError, AuthResult};
use argon2::{
    Algorithm, Argon2, Params, PasswordHasher, PasswordVerifier, Version,
    password_hash::{PasswordHash, SaltString},
};
use log::error;
use tokio::task;
use uuid::Uuid;

/// Argon2id hashing of account passwords into PHC strings.
#[derive(Clone)]
pub struct Passwords {
    argon2: Argon2<'static>,
}

impl Default for Passwords {
    fn default() -> Self {
        Self {
            argon2: Argon2::default(),
        }
    }
}

impl std::fmt::Debug for Passwords {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Passwords").finish_non_exhaustive()
    }
}

impl Passwords {
    /// Minimal-cost parameters so tests don't spend seconds per hash.
    #[cfg(test)]
    pub(crate) fn fast() -> Self {
        let params = Params::new(Params::MIN_M_COST, 1, 1, None)
            .unwrap_or_default();
        Self::with_params(params)
    }

    pub fn with_params(params: Params) -> Self {
        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }

    pub fn hash(&self, password: &str) -> AuthResult<String> {
        let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes())
            .map_err(|_| AuthError::PasswordHash)?;
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|_| AuthError::PasswordHash)
    }

    /// Malformed stored hashes never verify.
    pub fn verify(&self, password: &str, phc: &str) -> bool {
        match PasswordHash::new(phc) {
            Ok(parsed) => self
                .argon2
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }

    /// [`Passwords::hash`] on the blocking pool, off the async workers.
    pub async fn hash_blocking(&self, password: &str) -> AuthResult<String> {
        let passwords = self.clone();
        let password = password.to_owned();
        task::spawn_blocking(move || passwords.hash(&password))
            .await
            .unwrap_or_else(|e| {
                error!("password hashing task failed: {}", e);
                Err(AuthError::PasswordHash)
            })
    }

    /// [`Passwords::verify`] on the blocking pool. A failed task never
    /// verifies.
    pub async fn verify_blocking(&self, password: &str, phc: &str) -> bool {
        let passwords = self.clone();
        let password = password.to_owned();
        let phc = phc.to_owned();
        task::spawn_blocking(move || passwords.verify(&password, &phc))
            .await
            .unwrap_or_else(|e| {
                error!("password verification task failed: {}", e);
                false
            })
    }
}
