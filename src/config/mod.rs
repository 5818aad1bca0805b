use anyhow::Context;
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub tracker: TrackerConfig,
    pub geo: GeoConfig,
    pub frontend: FrontendConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Memory,
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Address tracking links are built on. Derived from the Host header when unset.
    pub public_base_url: Option<String>,
    /// Grace period between the notice page and navigation
    #[serde(default = "TrackerConfig::default_redirect_delay_ms")]
    pub redirect_delay_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeoProvider {
    /// HTTP geolocation service (ipapi.co compatible)
    IpApi,
    /// Local MaxMind GeoLite2/GeoIP2 City database
    MaxMind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustedProxyMode {
    /// Use the socket peer address
    None,
    /// Forwarded / X-Forwarded-For
    Standard,
    /// CF-Connecting-IP
    Cloudflare,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoConfig {
    pub provider: GeoProvider,
    /// Endpoint that geolocates the caller of the request
    pub endpoint: String,
    /// Endpoint for an explicit address; `{ip}` is substituted
    pub ip_endpoint: String,
    pub geoip_db_path: Option<String>,
    /// Send the visitor's address to the provider instead of letting it infer ours
    pub forward_client_ip: bool,
    pub ip_anonymization: bool,
    pub trusted_proxy_mode: TrustedProxyMode,
    pub trusted_proxies: Vec<IpNet>,
    pub num_trusted_proxies: Option<usize>,
    /// 0 disables the lookup cache
    pub cache_ttl_secs: u64,
    pub cache_max_entries: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontendConfig {
    /// Directory overriding the embedded stylesheet and assets
    pub static_dir: Option<String>,
}

impl TrackerConfig {
    const fn default_redirect_delay_ms() -> u64 {
        800
    }

    pub fn redirect_delay(&self) -> Duration {
        Duration::from_millis(self.redirect_delay_ms)
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            public_base_url: None,
            redirect_delay_ms: Self::default_redirect_delay_ms(),
        }
    }
}

impl GeoConfig {
    pub const DEFAULT_ENDPOINT: &'static str = "https://ipapi.co/json/";
    pub const DEFAULT_IP_ENDPOINT: &'static str = "https://ipapi.co/{ip}/json/";
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            provider: GeoProvider::IpApi,
            endpoint: Self::DEFAULT_ENDPOINT.to_string(),
            ip_endpoint: Self::DEFAULT_IP_ENDPOINT.to_string(),
            geoip_db_path: None,
            forward_client_ip: true,
            ip_anonymization: false,
            trusted_proxy_mode: TrustedProxyMode::None,
            trusted_proxies: Vec::new(),
            num_trusted_proxies: None,
            cache_ttl_secs: 0,
            cache_max_entries: 10_000,
        }
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let backend_str =
            std::env::var("DATABASE_BACKEND").unwrap_or_else(|_| "sqlite".to_string());

        let backend = match backend_str.to_lowercase().as_str() {
            "postgres" | "postgresql" => DatabaseBackend::Postgres,
            "memory" => DatabaseBackend::Memory,
            "sqlite" => DatabaseBackend::Sqlite,
            other => {
                tracing::warn!(
                    "Unknown DATABASE_BACKEND '{other}', falling back to 'sqlite'. Supported values: memory, sqlite, postgres"
                );
                DatabaseBackend::Sqlite
            }
        };

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./trackly.db".to_string());
        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u32>()
            .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?;

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .context("PORT must be a valid port number")?;

        let public_base_url = std::env::var("PUBLIC_BASE_URL").ok();
        if let Some(ref base) = public_base_url {
            url::Url::parse(base)
                .with_context(|| format!("PUBLIC_BASE_URL is not a valid URL: {base}"))?;
        }
        let redirect_delay_ms = match std::env::var("REDIRECT_DELAY_MS") {
            Ok(v) => v
                .parse::<u64>()
                .context("REDIRECT_DELAY_MS must be a number of milliseconds")?,
            Err(_) => TrackerConfig::default_redirect_delay_ms(),
        };

        let geoip_db_path = std::env::var("GEOIP_DB_PATH").ok();
        let provider = match std::env::var("GEO_PROVIDER") {
            Ok(v) => match v.to_lowercase().as_str() {
                "ipapi" => GeoProvider::IpApi,
                "maxmind" => GeoProvider::MaxMind,
                other => {
                    tracing::warn!(
                        "Unknown GEO_PROVIDER '{other}', falling back to 'ipapi'. Supported values: ipapi, maxmind"
                    );
                    GeoProvider::IpApi
                }
            },
            // A configured database implies the local provider.
            Err(_) if geoip_db_path.is_some() => GeoProvider::MaxMind,
            Err(_) => GeoProvider::IpApi,
        };
        if provider == GeoProvider::MaxMind && geoip_db_path.is_none() {
            anyhow::bail!("GEOIP_DB_PATH must be set when GEO_PROVIDER=maxmind");
        }

        let trusted_proxy_mode = match std::env::var("TRUSTED_PROXY_MODE")
            .unwrap_or_else(|_| "none".to_string())
            .to_lowercase()
            .as_str()
        {
            "none" => TrustedProxyMode::None,
            "standard" => TrustedProxyMode::Standard,
            "cloudflare" => TrustedProxyMode::Cloudflare,
            other => {
                tracing::warn!(
                    "Unknown TRUSTED_PROXY_MODE '{other}', falling back to 'none'. Supported values: none, standard, cloudflare"
                );
                TrustedProxyMode::None
            }
        };

        let trusted_proxies = std::env::var("TRUSTED_PROXIES")
            .ok()
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| {
                        s.parse::<IpNet>()
                            .or_else(|_| s.parse::<std::net::IpAddr>().map(IpNet::from))
                            .with_context(|| format!("Invalid entry in TRUSTED_PROXIES: {s}"))
                    })
                    .collect::<anyhow::Result<Vec<_>>>()
            })
            .transpose()?
            .unwrap_or_default();

        let num_trusted_proxies = std::env::var("NUM_TRUSTED_PROXIES")
            .ok()
            .map(|v| v.parse::<usize>())
            .transpose()
            .context("NUM_TRUSTED_PROXIES must be a non-negative integer")?;

        let defaults = GeoConfig::default();
        let cache_ttl_secs = std::env::var("GEO_CACHE_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults.cache_ttl_secs);
        let cache_max_entries = std::env::var("GEO_CACHE_MAX_ENTRIES")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults.cache_max_entries);

        let frontend_static_dir = std::env::var("FRONTEND_STATIC_DIR").ok();

        Ok(Config {
            database: DatabaseConfig {
                backend,
                url: database_url,
                max_connections,
            },
            server: ServerConfig { host, port },
            tracker: TrackerConfig {
                public_base_url,
                redirect_delay_ms,
            },
            geo: GeoConfig {
                provider,
                endpoint: std::env::var("GEO_ENDPOINT").unwrap_or(defaults.endpoint),
                ip_endpoint: std::env::var("GEO_IP_ENDPOINT").unwrap_or(defaults.ip_endpoint),
                geoip_db_path,
                forward_client_ip: env_flag("GEO_FORWARD_CLIENT_IP", defaults.forward_client_ip),
                ip_anonymization: env_flag("IP_ANONYMIZATION", defaults.ip_anonymization),
                trusted_proxy_mode,
                trusted_proxies,
                num_trusted_proxies,
                cache_ttl_secs,
                cache_max_entries,
            },
            frontend: FrontendConfig {
                static_dir: frontend_static_dir,
            },
        })
    }
}
