use crate::session::storage::{KeyValueStore, StorageResult};
use log::warn;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const THEME_KEY: &str = "eventhive-theme";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

/// Per-client colour scheme preference, stored next to the session record.
#[derive(Debug, Clone)]
pub struct ThemeStore {
    storage: Arc<dyn KeyValueStore>,
}

impl ThemeStore {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    /// Missing or unreadable values fall back to the light theme.
    pub fn load(&self) -> Theme {
        match self.storage.get(THEME_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("ignoring malformed theme preference: {}", e);
                Theme::default()
            }),
            Ok(None) => Theme::default(),
            Err(e) => {
                warn!("theme preference unreadable: {}", e);
                Theme::default()
            }
        }
    }

    pub fn save(&self, theme: Theme) -> StorageResult<()> {
        self.storage.set(THEME_KEY, &serde_json::to_string(&theme)?)
    }

    pub fn toggle(&self) -> StorageResult<Theme> {
        let theme = self.load().toggled();
        self.save(theme)?;
        Ok(theme)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::storage::MemoryStorage;

    #[test]
    fn defaults_to_light_and_toggles() {
        let storage = Arc::new(MemoryStorage::new());
        let themes = ThemeStore::new(storage.clone());
        assert_eq!(themes.load(), Theme::Light);

        assert_eq!(themes.toggle().unwrap(), Theme::Dark);
        assert_eq!(storage.get(THEME_KEY).unwrap().as_deref(), Some("\"dark\""));
        assert_eq!(themes.toggle().unwrap(), Theme::Light);
    }

    #[test]
    fn malformed_value_reads_as_light() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(THEME_KEY, "purple").unwrap();
        assert_eq!(ThemeStore::new(storage).load(), Theme::Light);
    }
}
