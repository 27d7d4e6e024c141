pub mod guard;
pub mod navigation;
pub mod policy;

pub use guard::{GuardDecision, GuardMiddleware, RouteGuard};
pub use navigation::{MENU, MenuItem, items_for};
pub use policy::{Access, PolicyEntry, PolicyError, Resolution, RolePolicy};
