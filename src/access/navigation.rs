use super::policy::RolePolicy;
use crate::auth::user::Role;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MenuItem {
    pub title: &'static str,
    pub path: &'static str,
}

const fn item(title: &'static str, path: &'static str) -> MenuItem {
    MenuItem { title, path }
}

/// Sidebar entries in display order. Visibility comes from the role policy
/// alone.
pub const MENU: &[MenuItem] = &[
    item("Home", "/"),
    item("Events", "/events"),
    item("Leaderboard", "/leaderboard"),
    item("Profile", "/profile"),
    item("Dashboard", "/dashboard"),
    item("Admin Dashboard", "/admin"),
    item("Manage Events", "/manage-events"),
    item("Submit Event", "/submit-event"),
    item("Pending Approvals", "/pending-events"),
    item("Users", "/users"),
    item("Attendance", "/attendance"),
    item("Certificates", "/certificates"),
    item("Mark Attendance", "/mark-attendance"),
    item("Reports", "/reports"),
    item("Messages", "/messages"),
    item("Settings", "/settings"),
];

pub fn items_for(policy: &RolePolicy, role: Role) -> Vec<MenuItem> {
    MENU.iter()
        .filter(|item| policy.permits(item.path, role))
        .copied()
        .collect()
}
