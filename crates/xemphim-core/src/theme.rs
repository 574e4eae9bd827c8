//! Persisted theme preference.
//!
//! `ThemeStore` owns the user's light/dark/system choice. It is loaded once at
//! startup and only changes through its own setters, which persist before they
//! touch memory. The rendered scheme is never stored; it is derived from the
//! preference and the OS signal on every read.

use std::sync::RwLock;

use crate::error::CoreError;
use crate::models::{resolve_color_scheme, ColorScheme, ThemePreference};
use crate::storage::{KeyValueStore, THEME_KEY};

#[derive(Debug, Clone, Copy)]
struct ThemeState {
    preference: ThemePreference,
    loading: bool,
}

/// Theme preference service over a key-value store.
pub struct ThemeStore<S> {
    store: S,
    state: RwLock<ThemeState>,
}

impl<S: KeyValueStore> ThemeStore<S> {
    /// A store in the loading state with preference `System`.
    pub fn new(store: S) -> Self {
        Self {
            store,
            state: RwLock::new(ThemeState {
                preference: ThemePreference::System,
                loading: true,
            }),
        }
    }

    /// Read the persisted preference. Never fails: unreadable or unknown
    /// values leave the preference at `System`.
    pub async fn load(&self) -> ThemePreference {
        let loaded = match self.store.get(THEME_KEY).await {
            Ok(Some(raw)) => match raw.parse::<ThemePreference>() {
                Ok(pref) => Some(pref),
                Err(e) => {
                    tracing::warn!("Ignoring stored theme: {e}");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Failed to load theme preference: {e}");
                None
            }
        };

        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if let Some(pref) = loaded {
            state.preference = pref;
        }
        state.loading = false;
        tracing::debug!(preference = %state.preference, "Theme preference loaded");
        state.preference
    }

    /// Persist `pref`, then apply it. A failed write leaves memory untouched.
    pub async fn set_preference(&self, pref: ThemePreference) -> Result<(), CoreError> {
        self.store
            .set(THEME_KEY, pref.as_str())
            .await
            .map_err(|e| CoreError::StorageWrite(e.to_string()))?;

        self.state
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .preference = pref;
        tracing::debug!(preference = %pref, "Theme preference saved");
        Ok(())
    }

    /// Advance system → light → dark → system. Returns the new preference.
    pub async fn toggle(&self) -> Result<ThemePreference, CoreError> {
        let next = self.preference().next();
        self.set_preference(next).await?;
        Ok(next)
    }

    /// Drop the persisted value and fall back to `System`.
    pub async fn reset(&self) -> Result<(), CoreError> {
        self.store
            .remove(THEME_KEY)
            .await
            .map_err(|e| CoreError::StorageWrite(e.to_string()))?;

        self.state
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .preference = ThemePreference::System;
        Ok(())
    }

    pub fn preference(&self) -> ThemePreference {
        self.state.read().unwrap_or_else(|e| e.into_inner()).preference
    }

    /// True until `load` has completed once.
    pub fn is_loading(&self) -> bool {
        self.state.read().unwrap_or_else(|e| e.into_inner()).loading
    }

    /// Effective scheme for the given OS signal.
    pub fn color_scheme(&self, os: Option<ColorScheme>) -> ColorScheme {
        resolve_color_scheme(self.preference(), os)
    }
}

/// OS-reported color scheme, if the platform exposes one.
pub fn system_color_scheme() -> Option<ColorScheme> {
    match dark_light::detect() {
        Ok(dark_light::Mode::Dark) => Some(ColorScheme::Dark),
        Ok(dark_light::Mode::Light) => Some(ColorScheme::Light),
        Ok(dark_light::Mode::Unspecified) => None,
        Err(e) => {
            tracing::debug!("OS color scheme unavailable: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Clone, Default)]
    struct MemoryStore {
        values: Arc<Mutex<HashMap<String, String>>>,
    }

    impl KeyValueStore for MemoryStore {
        async fn get(&self, key: &str) -> Result<Option<String>, CoreError> {
            Ok(self.values.lock().unwrap().get(key).cloned())
        }

        async fn set(&self, key: &str, value: &str) -> Result<(), CoreError> {
            self.values
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn remove(&self, key: &str) -> Result<(), CoreError> {
            self.values.lock().unwrap().remove(key);
            Ok(())
        }
    }

    /// Reads succeed with a fixed value; every write fails.
    struct BrokenStore {
        stored: Option<String>,
        fail_reads: bool,
    }

    impl KeyValueStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, CoreError> {
            if self.fail_reads {
                Err(CoreError::StorageRead("disk unavailable".into()))
            } else {
                Ok(self.stored.clone())
            }
        }

        async fn set(&self, _key: &str, _value: &str) -> Result<(), CoreError> {
            Err(CoreError::StorageWrite("read-only".into()))
        }

        async fn remove(&self, _key: &str) -> Result<(), CoreError> {
            Err(CoreError::StorageWrite("read-only".into()))
        }
    }

    #[tokio::test]
    async fn test_roundtrip_into_fresh_store() {
        for pref in ThemePreference::ALL {
            let backing = MemoryStore::default();
            let first = ThemeStore::new(backing.clone());
            first.load().await;
            first.set_preference(*pref).await.unwrap();

            let second = ThemeStore::new(backing);
            assert_eq!(second.load().await, *pref);
        }
    }

    #[tokio::test]
    async fn test_load_unknown_value_defaults_to_system() {
        let backing = MemoryStore::default();
        backing.set(THEME_KEY, "sepia").await.unwrap();
        let store = ThemeStore::new(backing);
        assert_eq!(store.load().await, ThemePreference::System);
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn test_load_read_error_defaults_to_system() {
        let store = ThemeStore::new(BrokenStore {
            stored: None,
            fail_reads: true,
        });
        assert!(store.is_loading());
        assert_eq!(store.load().await, ThemePreference::System);
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn test_toggle_cycles() {
        let store = ThemeStore::new(MemoryStore::default());
        store.load().await;
        assert_eq!(store.toggle().await.unwrap(), ThemePreference::Light);
        assert_eq!(store.toggle().await.unwrap(), ThemePreference::Dark);
        assert_eq!(store.toggle().await.unwrap(), ThemePreference::System);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_memory_unchanged() {
        let store = ThemeStore::new(BrokenStore {
            stored: Some("dark".into()),
            fail_reads: false,
        });
        store.load().await;
        assert_eq!(store.preference(), ThemePreference::Dark);

        let err = store.set_preference(ThemePreference::Light).await.unwrap_err();
        assert!(matches!(err, CoreError::StorageWrite(_)));
        assert_eq!(store.preference(), ThemePreference::Dark);

        assert!(store.toggle().await.is_err());
        assert_eq!(store.preference(), ThemePreference::Dark);

        assert!(store.reset().await.is_err());
        assert_eq!(store.preference(), ThemePreference::Dark);
    }

    #[tokio::test]
    async fn test_reset_clears_persisted_value() {
        let backing = MemoryStore::default();
        let store = ThemeStore::new(backing.clone());
        store.set_preference(ThemePreference::Dark).await.unwrap();
        store.reset().await.unwrap();
        assert_eq!(store.preference(), ThemePreference::System);
        assert_eq!(backing.get(THEME_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_color_scheme_tracks_preference_live() {
        let store = ThemeStore::new(MemoryStore::default());
        store.load().await;
        assert_eq!(store.color_scheme(Some(ColorScheme::Dark)), ColorScheme::Dark);
        assert_eq!(store.color_scheme(None), ColorScheme::Light);

        store.set_preference(ThemePreference::Light).await.unwrap();
        assert_eq!(store.color_scheme(Some(ColorScheme::Dark)), ColorScheme::Light);
    }
}
