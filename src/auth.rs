pub mod config;
pub mod cookies;
pub mod directory;
pub mod error;
pub mod operations;
pub mod password;
pub mod user;

pub use config::CookieConfig;
pub use directory::{BackendDirectory, SeedUser, UserDirectory};
pub use error::{AuthError, AuthResult, SignupInvalid};
pub use operations::{AuthOperations, AuthOutcome, LoginRequest, Navigation, SignupRequest};
pub use password::Passwords;
pub use user::{Role, User};
