use async_trait::async_trait;
use moka::future::Cache;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::geo::{GeoLookup, LookupUnavailable};
use crate::models::GeoInfo;

/// Lookup wrapper that remembers successful answers per visitor address.
///
/// Lookups without a forwarded address always go to the provider: the answer depends on who
/// the provider sees, not on anything we could key on.
pub struct CachedGeoLookup {
    inner: Arc<dyn GeoLookup>,
    cache: Cache<IpAddr, GeoInfo>,
}

impl CachedGeoLookup {
    pub fn new(inner: Arc<dyn GeoLookup>, max_entries: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();

        Self { inner, cache }
    }
}

#[async_trait]
impl GeoLookup for CachedGeoLookup {
    async fn lookup(&self, client_ip: Option<IpAddr>) -> Result<GeoInfo, LookupUnavailable> {
        let Some(ip) = client_ip else {
            return self.inner.lookup(None).await;
        };

        if let Some(hit) = self.cache.get(&ip).await {
            tracing::trace!(%ip, "geolocation cache hit");
            return Ok(hit);
        }

        let info = self.inner.lookup(Some(ip)).await?;
        self.cache.insert(ip, info.clone()).await;
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingLookup {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl GeoLookup for CountingLookup {
        async fn lookup(&self, client_ip: Option<IpAddr>) -> Result<GeoInfo, LookupUnavailable> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(LookupUnavailable::Status(503));
            }
            Ok(GeoInfo {
                ip: client_ip.map(|ip| ip.to_string()),
                city: Some("Testville".to_string()),
                ..Default::default()
            })
        }
    }

    fn counting(fail: bool) -> Arc<CountingLookup> {
        Arc::new(CountingLookup {
            calls: AtomicUsize::new(0),
            fail,
        })
    }

    #[tokio::test]
    async fn test_repeated_address_hits_cache() {
        let inner = counting(false);
        let cached = CachedGeoLookup::new(inner.clone(), 100, Duration::from_secs(60));
        let ip: IpAddr = "8.8.8.8".parse().unwrap();

        let first = cached.lookup(Some(ip)).await.unwrap();
        let second = cached.lookup(Some(ip)).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_inferred_lookups_and_failures_are_not_cached() {
        let inner = counting(false);
        let cached = CachedGeoLookup::new(inner.clone(), 100, Duration::from_secs(60));
        cached.lookup(None).await.unwrap();
        cached.lookup(None).await.unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);

        let failing = counting(true);
        let cached = CachedGeoLookup::new(failing.clone(), 100, Duration::from_secs(60));
        let ip: IpAddr = "8.8.4.4".parse().unwrap();
        assert!(cached.lookup(Some(ip)).await.is_err());
        assert!(cached.lookup(Some(ip)).await.is_err());
        assert_eq!(failing.calls.load(Ordering::SeqCst), 2);
    }
}
