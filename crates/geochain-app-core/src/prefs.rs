// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Connection preferences for the remote geometry service.
//!
//! Resolution order is stored prefs (or defaults), then environment overrides.
//! Overrides go through a lookup closure so callers and tests can supply their
//! own source instead of the process environment.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Config key under which [`ServicePrefs`] are persisted.
pub const PREFS_KEY: &str = "geometry_service";
/// Default service address when nothing else is configured.
pub const DEFAULT_ADDRESS: &str = "localhost:8980";
/// Environment override for the service address (`host:port` or a full URI).
pub const ADDRESS_ENV: &str = "GEOMETRY_SERVICE_HOST";
/// Environment override for a PEM CA certificate path; enables TLS.
pub const TLS_CA_ENV: &str = "GEOMETRY_SERVICE_TLS_CA";
/// Environment override for the TLS server name.
pub const TLS_DOMAIN_ENV: &str = "GEOMETRY_SERVICE_TLS_DOMAIN";

/// How to reach the geometry service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServicePrefs {
    /// `host:port`, or a URI with an explicit scheme.
    pub address: String,
    /// PEM CA certificate; TLS is used when set.
    pub tls_ca_path: Option<PathBuf>,
    /// Server name to verify instead of the address host.
    pub tls_domain: Option<String>,
    /// Dial timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Per-request deadline in milliseconds.
    pub request_timeout_ms: u64,
    /// Largest message accepted or sent, in bytes.
    pub max_message_bytes: usize,
}

impl Default for ServicePrefs {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            tls_ca_path: None,
            tls_domain: None,
            connect_timeout_ms: 20_000,
            request_timeout_ms: 60_000,
            max_message_bytes: 64 * 1024 * 1024,
        }
    }
}

impl ServicePrefs {
    /// Apply overrides from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`. Empty values are ignored.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        if let Some(address) = lookup(ADDRESS_ENV) {
            self.address = address;
        }
        if let Some(path) = lookup(TLS_CA_ENV) {
            self.tls_ca_path = Some(PathBuf::from(path));
        }
        if let Some(domain) = lookup(TLS_DOMAIN_ENV) {
            self.tls_domain = Some(domain);
        }
        self
    }

    /// True when a CA certificate is configured.
    pub const fn tls_enabled(&self) -> bool {
        self.tls_ca_path.is_some()
    }

    /// Address as a URI, adding `http://` or `https://` when no scheme is given.
    pub fn endpoint_uri(&self) -> String {
        if self.address.contains("://") {
            return self.address.clone();
        }
        let scheme = if self.tls_enabled() { "https" } else { "http" };
        format!("{scheme}://{}", self.address)
    }

    /// Dial timeout.
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Per-request deadline.
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_point_at_local_service() {
        let prefs = ServicePrefs::default();
        assert_eq!(prefs.address, "localhost:8980");
        assert_eq!(prefs.endpoint_uri(), "http://localhost:8980");
        assert_eq!(prefs.request_timeout(), Duration::from_secs(60));
        assert!(!prefs.tls_enabled());
    }

    #[test]
    fn address_override_replaces_default() {
        let prefs =
            ServicePrefs::default().with_overrides(lookup(&[(ADDRESS_ENV, "geo.internal:443")]));
        assert_eq!(prefs.address, "geo.internal:443");
    }

    #[test]
    fn blank_override_is_ignored() {
        let prefs = ServicePrefs::default().with_overrides(lookup(&[(ADDRESS_ENV, "  ")]));
        assert_eq!(prefs.address, DEFAULT_ADDRESS);
    }

    #[test]
    fn tls_overrides_switch_scheme() {
        let prefs = ServicePrefs::default().with_overrides(lookup(&[
            (TLS_CA_ENV, "/etc/geo/ca.pem"),
            (TLS_DOMAIN_ENV, "geometry.example.org"),
        ]));
        assert!(prefs.tls_enabled());
        assert_eq!(prefs.tls_domain.as_deref(), Some("geometry.example.org"));
        assert_eq!(prefs.endpoint_uri(), "https://localhost:8980");
    }

    #[test]
    fn explicit_scheme_is_kept() {
        let prefs = ServicePrefs {
            address: "http://10.0.0.5:8980".into(),
            ..ServicePrefs::default()
        };
        assert_eq!(prefs.endpoint_uri(), "http://10.0.0.5:8980");
    }

    #[test]
    fn partial_json_fills_defaults() {
        let prefs: ServicePrefs = serde_json::from_str(r#"{"address":"geo:9000"}"#).unwrap();
        assert_eq!(prefs.address, "geo:9000");
        assert_eq!(prefs.connect_timeout_ms, 20_000);
        assert_eq!(prefs.tls_ca_path, None);
    }
}
