//! Transient, dismissible notices shown to a client (the "toast" channel).
//! Failures from auth operations and backend calls end up here instead of
//! propagating as faults.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

const MAX_PENDING: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Default,
    Destructive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub id: u64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub variant: Variant,
}

#[derive(Debug, Default)]
pub struct Notifications {
    queue: Mutex<VecDeque<Notification>>,
    next_id: AtomicU64,
}

impl Notifications {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&self, title: impl Into<String>, description: Option<String>) -> u64 {
        self.push(title.into(), description, Variant::Default)
    }

    pub fn error(&self, title: impl Into<String>, description: Option<String>) -> u64 {
        self.push(title.into(), description, Variant::Destructive)
    }

    fn push(&self, title: String, description: Option<String>, variant: Variant) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let mut queue = self.queue.lock();
        if queue.len() == MAX_PENDING {
            queue.pop_front();
        }
        queue.push_back(Notification {
            id,
            title,
            description,
            variant,
        });
        id
    }

    pub fn pending(&self) -> Vec<Notification> {
        self.queue.lock().iter().cloned().collect()
    }

    /// Removes and returns everything queued, oldest first.
    pub fn drain(&self) -> Vec<Notification> {
        self.queue.lock().drain(..).collect()
    }

    /// Returns `false` when `id` was already gone.
    pub fn dismiss(&self, id: u64) -> bool {
        let mut queue = self.queue.lock();
        let before = queue.len();
        queue.retain(|n| n.id != id);
        queue.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_dismiss_drain() {
        let notifications = Notifications::new();
        let a = notifications.info("Signed in successfully", None);
        let b = notifications.error("Authentication failed", Some("nope".into()));

        assert!(notifications.dismiss(a));
        assert!(!notifications.dismiss(a));

        let drained = notifications.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].id, b);
        assert_eq!(drained[0].variant, Variant::Destructive);
        assert!(notifications.pending().is_empty());
    }

    #[test]
    fn oldest_notice_is_dropped_when_full() {
        let notifications = Notifications::new();
        for i in 0..=MAX_PENDING {
            notifications.info(format!("n{i}"), None);
        }
        let pending = notifications.pending();
        assert_eq!(pending.len(), MAX_PENDING);
        assert_eq!(pending[0].title, "n1");
    }
}
