// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Service bootstrap: resolve prefs, dial, hand out a client.

use crate::error::{ChainError, Result};
use crate::executor::GeometryClient;
use crate::transport::GrpcTransport;
use geochain_app_core::prefs::PREFS_KEY;
use geochain_app_core::{ConfigService, ConfigStore, ServicePrefs};
use geochain_config_fs::FsConfigStore;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tonic::transport::{Certificate, ClientTlsConfig, Endpoint};
use tracing::{info, warn};

static SHARED: OnceCell<ServiceHandle> = OnceCell::const_new();

/// Connected service plus the client built on it.
#[derive(Debug)]
pub struct ServiceHandle {
    client: GeometryClient,
    address: String,
}

impl ServiceHandle {
    /// Client for building chains and streams. Clone freely.
    pub const fn client(&self) -> &GeometryClient {
        &self.client
    }

    /// Address this handle dialed.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Release the handle. The connection closes once every client clone is gone.
    ///
    /// Not available for the handle from [`shared`], which is never released.
    pub fn close(self) {
        info!(address = %self.address, "closing geometry service handle");
    }
}

/// Prefs from the config dir if a prefs file exists, else defaults, then
/// environment overrides. Reads only; nothing is written.
pub fn resolve_prefs() -> ServicePrefs {
    let prefs = match FsConfigStore::new() {
        Ok(store) => load_prefs(&ConfigService::new(store)),
        Err(err) => {
            warn!(%err, "config dir unavailable; using default service prefs");
            ServicePrefs::default()
        }
    };
    prefs.with_env_overrides()
}

/// Stored prefs, or defaults when they are absent or unreadable.
pub fn load_prefs<S: ConfigStore>(config: &ConfigService<S>) -> ServicePrefs {
    match config.load_or_default::<ServicePrefs>(PREFS_KEY) {
        Ok(prefs) => prefs,
        Err(err) => {
            warn!(%err, "service prefs unreadable; using defaults");
            ServicePrefs::default()
        }
    }
}

/// Dial the service described by `prefs`.
pub async fn connect(prefs: &ServicePrefs) -> Result<ServiceHandle> {
    let endpoint = endpoint(prefs).await?;
    let channel = endpoint
        .connect()
        .await
        .map_err(|err| ChainError::ServiceUnavailable(format!("{}: {err}", prefs.address)))?;
    info!(
        address = %prefs.address,
        tls = prefs.tls_enabled(),
        "connected to geometry service"
    );
    let transport = GrpcTransport::from_channel(channel, prefs.max_message_bytes);
    Ok(ServiceHandle {
        client: GeometryClient::new(Arc::new(transport)),
        address: prefs.address.clone(),
    })
}

/// Process-wide handle, dialed on first use with [`resolve_prefs`].
///
/// Prefer passing a [`GeometryClient`] explicitly; this exists for callers
/// without a natural place to keep one.
///
/// The handle lives for the rest of the process. [`ServiceHandle::close`]
/// takes the handle by value, so it cannot be called on this one, and the
/// channel stays open until exit. A failed dial is not cached; the next call
/// dials again.
pub async fn shared() -> Result<&'static ServiceHandle> {
    SHARED
        .get_or_try_init(|| async { connect(&resolve_prefs_blocking().await).await })
        .await
}

/// [`resolve_prefs`] on the blocking pool, keeping file reads off the runtime.
async fn resolve_prefs_blocking() -> ServicePrefs {
    match tokio::task::spawn_blocking(resolve_prefs).await {
        Ok(prefs) => prefs,
        Err(err) => {
            warn!(%err, "service prefs lookup did not finish; using defaults");
            ServicePrefs::default().with_env_overrides()
        }
    }
}

async fn endpoint(prefs: &ServicePrefs) -> Result<Endpoint> {
    let uri = prefs.endpoint_uri();
    let mut endpoint = Endpoint::from_shared(uri.clone())
        .map_err(|err| ChainError::ServiceUnavailable(format!("{uri}: {err}")))?
        .connect_timeout(prefs.connect_timeout())
        .timeout(prefs.request_timeout());
    if let Some(ca_path) = &prefs.tls_ca_path {
        let pem = tokio::fs::read(ca_path).await.map_err(|err| {
            ChainError::ServiceUnavailable(format!("TLS CA {}: {err}", ca_path.display()))
        })?;
        let mut tls = ClientTlsConfig::new().ca_certificate(Certificate::from_pem(pem));
        if let Some(domain) = &prefs.tls_domain {
            tls = tls.domain_name(domain.clone());
        }
        endpoint = endpoint
            .tls_config(tls)
            .map_err(|err| ChainError::ServiceUnavailable(format!("{uri}: {err}")))?;
    }
    Ok(endpoint)
}
