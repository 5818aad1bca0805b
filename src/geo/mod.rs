//! Visitor geolocation
//!
//! Recording a visit needs an IP-to-location answer from somewhere: an ipapi.co-style HTTP
//! service by default, or a local MaxMind City database. Providers report failure as a value,
//! never by panicking, because a failed lookup only means the visit goes unrecorded.

pub mod cached;
pub mod client;
pub mod geoip;
pub mod ip_extractor;

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::{GeoConfig, GeoProvider};
use crate::models::GeoInfo;

pub use cached::CachedGeoLookup;
pub use client::IpApiClient;
pub use geoip::GeoIpService;
pub use ip_extractor::{extract_client_ip, forwardable_client_ip};

#[derive(Debug, Error)]
pub enum LookupUnavailable {
    #[error("geolocation request failed: {0}")]
    Network(#[source] reqwest::Error),
    #[error("geolocation service answered with status {0}")]
    Status(u16),
    #[error("geolocation service refused the lookup: {0}")]
    Rejected(String),
    #[error("unexpected geolocation response: {0}")]
    Malformed(String),
    #[error("no visitor address to look up")]
    NoClientAddress,
}

#[async_trait]
pub trait GeoLookup: Send + Sync {
    /// Geolocate `client_ip`, or whoever the provider sees calling when `None`.
    async fn lookup(&self, client_ip: Option<IpAddr>) -> Result<GeoInfo, LookupUnavailable>;
}

/// Build the configured provider, wrapped in a cache when a TTL is set
pub fn from_config(config: &GeoConfig) -> Result<Arc<dyn GeoLookup>> {
    let provider: Arc<dyn GeoLookup> = match config.provider {
        GeoProvider::IpApi => Arc::new(IpApiClient::new(&config.endpoint, &config.ip_endpoint)?),
        GeoProvider::MaxMind => {
            let path = config
                .geoip_db_path
                .as_deref()
                .context("GEOIP_DB_PATH is required for the maxmind provider")?;
            Arc::new(GeoIpService::new(path)?)
        }
    };

    if config.cache_ttl_secs == 0 {
        return Ok(provider);
    }

    Ok(Arc::new(CachedGeoLookup::new(
        provider,
        config.cache_max_entries,
        Duration::from_secs(config.cache_ttl_secs),
    )))
}
