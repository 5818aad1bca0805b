//! GeoIP lookups against a local MaxMind GeoLite2/GeoIP2 City database
//!
//! The database is memory-mapped once and shared between clones.

use anyhow::{Context, Result};
use async_trait::async_trait;
use maxminddb::{geoip2, Mmap, Reader};
use std::net::IpAddr;
use std::sync::Arc;

use crate::geo::{GeoLookup, LookupUnavailable};
use crate::models::GeoInfo;

#[derive(Clone)]
pub struct GeoIpService {
    city_reader: Arc<Reader<Mmap>>,
}

impl GeoIpService {
    /// Open the City database at `city_path`
    pub fn new(city_path: &str) -> Result<Self> {
        let reader = unsafe { Reader::open_mmap(city_path) }
            .with_context(|| format!("Failed to open GeoIP City database at {}", city_path))?;

        Ok(Self {
            city_reader: Arc::new(reader),
        })
    }

    fn lookup_ip(&self, ip: IpAddr) -> GeoInfo {
        let mut info = GeoInfo {
            ip: Some(ip.to_string()),
            ..Default::default()
        };

        if let Ok(result) = self.city_reader.lookup(ip) {
            if let Ok(Some(city)) = result.decode::<geoip2::City>() {
                info.country = city.country.names.english.map(|s| s.to_string());
                if let Some(subdivision) = city.subdivisions.first() {
                    info.region = subdivision.names.english.map(|s| s.to_string());
                }
                info.city = city.city.names.english.map(|s| s.to_string());
            } else if let Ok(Some(country)) = result.decode::<geoip2::Country>() {
                // The City database is a superset of Country data; some networks only carry
                // the country part.
                info.country = country.country.names.english.map(|s| s.to_string());
            }
        }

        info
    }
}

#[async_trait]
impl GeoLookup for GeoIpService {
    async fn lookup(&self, client_ip: Option<IpAddr>) -> Result<GeoInfo, LookupUnavailable> {
        // A local database cannot infer who is asking.
        let ip = client_ip.ok_or(LookupUnavailable::NoClientAddress)?;
        Ok(self.lookup_ip(ip))
    }
}
