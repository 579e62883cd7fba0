// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory config store fake for testing without filesystem I/O.

use geochain_app_core::config::{ConfigError, ConfigStore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// In-memory implementation of [`ConfigStore`] for testing.
///
/// Clones share state, so a test can hand one clone to a
/// [`ConfigService`](geochain_app_core::ConfigService) and inspect the other.
///
/// # Example
///
/// ```
/// use geochain_dry_tests::InMemoryConfigStore;
/// use geochain_app_core::{ConfigService, ServicePrefs, PREFS_KEY};
///
/// let store = InMemoryConfigStore::new();
/// let service = ConfigService::new(store.clone());
///
/// let prefs: ServicePrefs = service.load_or_default(PREFS_KEY).unwrap();
/// assert_eq!(prefs, ServicePrefs::default());
/// assert_eq!(store.load_count(), 1);
/// ```
#[derive(Clone, Default)]
pub struct InMemoryConfigStore {
    inner: Arc<Mutex<InMemoryConfigStoreInner>>,
}

#[derive(Default)]
struct InMemoryConfigStoreInner {
    data: HashMap<String, Vec<u8>>,
    load_count: usize,
    save_count: usize,
    fail_on_load: bool,
    fail_on_save: bool,
}

impl InMemoryConfigStore {
    /// Create a new empty in-memory config store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding one raw blob under `key`.
    pub fn with_entry(key: &str, data: &[u8]) -> Self {
        let store = Self::new();
        store
            .inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .data
            .insert(key.to_string(), data.to_vec());
        store
    }

    /// Configure the store to fail on load operations.
    pub fn set_fail_on_load(&self, fail: bool) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.fail_on_load = fail;
    }

    /// Configure the store to fail on save operations.
    pub fn set_fail_on_save(&self, fail: bool) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.fail_on_save = fail;
    }

    /// Number of `load_raw` attempts, failed ones included.
    pub fn load_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .load_count
    }

    /// Number of `save_raw` attempts, failed ones included.
    pub fn save_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .save_count
    }

    /// Check if a key exists in the store.
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .data
            .contains_key(key)
    }

    /// Raw blob stored under `key`.
    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .data
            .get(key)
            .cloned()
    }
}

impl ConfigStore for InMemoryConfigStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.load_count += 1;

        if inner.fail_on_load {
            return Err(ConfigError::Other("simulated load failure".into()));
        }

        inner.data.get(key).cloned().ok_or(ConfigError::NotFound)
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.save_count += 1;

        if inner.fail_on_save {
            return Err(ConfigError::Other("simulated save failure".into()));
        }

        inner.data.insert(key.to_string(), data.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geochain_app_core::{ConfigService, ServicePrefs, PREFS_KEY};

    #[test]
    fn load_missing_key_returns_not_found() {
        let store = InMemoryConfigStore::new();
        assert!(matches!(store.load_raw("missing"), Err(ConfigError::NotFound)));
    }

    #[test]
    fn failed_attempts_are_counted() {
        let store = InMemoryConfigStore::new();
        store.set_fail_on_load(true);
        store.set_fail_on_save(true);
        let _ = store.load_raw("key");
        let _ = store.save_raw("key", b"value");
        assert_eq!(store.load_count(), 1);
        assert_eq!(store.save_count(), 1);
        assert!(!store.contains_key("key"));
    }

    #[test]
    fn clone_shares_state_between_instances() {
        let store1 = InMemoryConfigStore::new();
        let store2 = store1.clone();
        store1.save_raw("shared", b"value").unwrap();
        assert_eq!(store2.load_raw("shared").unwrap(), b"value");
        assert_eq!(store2.save_count(), 1);
    }

    #[test]
    fn missing_prefs_fall_back_without_writing() {
        let store = InMemoryConfigStore::new();
        let service = ConfigService::new(store.clone());

        let prefs: ServicePrefs = service.load_or_default(PREFS_KEY).unwrap();

        assert_eq!(prefs, ServicePrefs::default());
        assert_eq!(store.save_count(), 0);
        assert!(!store.contains_key(PREFS_KEY));
    }

    #[test]
    fn saved_prefs_are_stored_as_json() {
        let store = InMemoryConfigStore::new();
        let service = ConfigService::new(store.clone());
        let prefs = ServicePrefs {
            address: "engine.internal:443".into(),
            ..ServicePrefs::default()
        };

        service.save(PREFS_KEY, &prefs).unwrap();

        let saved: ServicePrefs = serde_json::from_slice(&store.raw(PREFS_KEY).unwrap()).unwrap();
        assert_eq!(saved, prefs);
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn stored_prefs_are_not_overwritten() {
        let store = InMemoryConfigStore::with_entry(
            PREFS_KEY,
            br#"{"address":"engine.internal:443","request_timeout_ms":5000}"#,
        );
        let service = ConfigService::new(store.clone());

        let prefs: ServicePrefs = service.load_or_default(PREFS_KEY).unwrap();

        assert_eq!(prefs.address, "engine.internal:443");
        assert_eq!(prefs.request_timeout_ms, 5000);
        assert_eq!(prefs.connect_timeout_ms, ServicePrefs::default().connect_timeout_ms);
        assert_eq!(store.save_count(), 0);
    }

    #[test]
    fn load_failure_surfaces() {
        let store = InMemoryConfigStore::new();
        store.set_fail_on_load(true);
        let service = ConfigService::new(store);

        let result: Result<ServicePrefs, _> = service.load_or_default(PREFS_KEY);
        assert!(matches!(result, Err(ConfigError::Other(_))));
    }
}
