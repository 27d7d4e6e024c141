use crate::backend::BackendError;
use crate::session::storage::StorageError;
use thiserror::Error;

/// Reasons a sign-up form is refused before the directory is consulted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignupInvalid {
    #[error("Name is required")]
    MissingName,
    #[error("Please enter a valid email address")]
    InvalidEmail,
    #[error("Password must be at least {0} characters")]
    PasswordTooShort(usize),
    #[error("Passwords do not match")]
    PasswordMismatch,
}

/// Error types for authentication
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Email already in use")]
    EmailAlreadyRegistered,
    #[error(transparent)]
    Validation(#[from] SignupInvalid),
    #[error("Another sign-in request is still in progress")]
    Busy,
    #[error("Malformed cookie header")]
    MalformedCookie,
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("Failed to persist session: {0}")]
    Session(#[from] StorageError),
    #[error("Failed to hash password")]
    PasswordHash,
}

/// Result type for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;
