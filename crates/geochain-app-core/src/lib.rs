// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared application services for geochain clients (config port, service prefs).
//! Storage adapters live in their own crates; nothing here touches the filesystem.

pub mod config;
pub mod prefs;

pub use config::{ConfigError, ConfigService, ConfigStore};
pub use prefs::{ServicePrefs, PREFS_KEY};
