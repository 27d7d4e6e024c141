//! EventHive server: per-client sessions, role-based route guarding and event
//! listings over a hosted backend.

pub mod access;
pub mod api;
pub mod application;
pub mod auth;
pub mod backend;
pub mod config;
pub mod events;
pub mod handler;
pub mod messages;
pub mod middleware;
pub mod notifications;
pub mod preferences;
pub mod router;
pub mod session;
pub mod startup;

mod server;

pub use application::App;
pub use config::AppConfig;
pub use startup::{StartupError, build_app};
