//! Light/dark theme preference.

use core::fmt;

use crate::storage::{SharedStore, StorageError, keys};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The persisted theme flag.
pub struct ThemeStore {
    theme: Theme,
    storage: SharedStore,
}

impl fmt::Debug for ThemeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThemeStore")
            .field("theme", &self.theme)
            .finish_non_exhaustive()
    }
}

impl ThemeStore {
    /// Load the stored flag; anything but `"dark"` means light.
    #[must_use]
    pub fn hydrate(storage: SharedStore) -> Self {
        let theme = match storage.get(keys::THEME) {
            Ok(Some(value)) if value == Theme::Dark.as_str() => Theme::Dark,
            Ok(_) => Theme::Light,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read stored theme");
                Theme::Light
            }
        };
        Self { theme, storage }
    }

    #[must_use]
    pub const fn current(&self) -> Theme {
        self.theme
    }

    /// Persist and apply `theme`.
    ///
    /// # Errors
    ///
    /// Returns an error if the flag cannot be written; the theme is then
    /// left unchanged.
    pub fn set(&mut self, theme: Theme) -> Result<(), StorageError> {
        self.storage.set(keys::THEME, theme.as_str())?;
        self.theme = theme;
        Ok(())
    }

    /// Switch between light and dark, returning the new theme.
    ///
    /// # Errors
    ///
    /// Returns an error if the flag cannot be written.
    pub fn toggle(&mut self) -> Result<Theme, StorageError> {
        self.set(self.theme.toggled())?;
        Ok(self.theme)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_defaults_to_light() {
        let theme = ThemeStore::hydrate(MemoryStore::shared());
        assert_eq!(theme.current(), Theme::Light);
    }

    #[test]
    fn test_toggle_persists() {
        let storage = MemoryStore::shared();
        let mut theme = ThemeStore::hydrate(Arc::clone(&storage));
        assert_eq!(theme.toggle().unwrap(), Theme::Dark);
        assert_eq!(storage.get(keys::THEME).unwrap().as_deref(), Some("dark"));

        let restored = ThemeStore::hydrate(storage);
        assert_eq!(restored.current(), Theme::Dark);
    }

    #[test]
    fn test_unknown_value_is_light() {
        let storage = MemoryStore::shared();
        storage.set(keys::THEME, "sepia").unwrap();
        assert_eq!(ThemeStore::hydrate(storage).current(), Theme::Light);
    }
}
