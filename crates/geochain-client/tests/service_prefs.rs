// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Prefs lookup used by the connection bootstrap.

use geochain_app_core::{ConfigService, ServicePrefs, PREFS_KEY};
use geochain_client::connect::load_prefs;
use geochain_dry_tests::InMemoryConfigStore;

#[test]
fn absent_prefs_are_not_written_back() {
    let store = InMemoryConfigStore::new();

    let prefs = load_prefs(&ConfigService::new(store.clone()));

    assert_eq!(prefs, ServicePrefs::default());
    assert_eq!(store.load_count(), 1);
    assert_eq!(store.save_count(), 0);
    assert!(!store.contains_key(PREFS_KEY));
}

#[test]
fn stored_prefs_are_used_as_is() {
    let store = InMemoryConfigStore::with_entry(PREFS_KEY, br#"{"address":"engine.internal:443"}"#);

    let prefs = load_prefs(&ConfigService::new(store.clone()));

    assert_eq!(prefs.address, "engine.internal:443");
    assert_eq!(store.save_count(), 0);
}

#[test]
fn unreadable_prefs_fall_back_to_defaults() {
    let store = InMemoryConfigStore::with_entry(PREFS_KEY, b"{ not json");

    let prefs = load_prefs(&ConfigService::new(store.clone()));

    assert_eq!(prefs, ServicePrefs::default());
    assert_eq!(store.save_count(), 0);
}
