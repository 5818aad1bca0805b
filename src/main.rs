use anyhow::Result;
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::EnvFilter;

use trackly::config::{Config, GeoProvider};
use trackly::{create_app, geo, open_store};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("trackly=info,tower_http=info")),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration");

    let store = open_store(&config).await?;
    info!("Visit store initialized");

    let geo_lookup = geo::from_config(&config.geo)?;
    match config.geo.provider {
        GeoProvider::IpApi => info!(
            "🌍 Geolocation via {} (forward client IP: {})",
            config.geo.ip_endpoint, config.geo.forward_client_ip
        ),
        GeoProvider::MaxMind => info!(
            "🌍 Geolocation via MaxMind database {}",
            config.geo.geoip_db_path.as_deref().unwrap_or_default()
        ),
    }
    if config.geo.cache_ttl_secs > 0 {
        info!("   - lookup cache TTL: {}s", config.geo.cache_ttl_secs);
    }

    if let Some(ref static_dir) = config.frontend.static_dir {
        info!("🎨 Serving assets from directory: {}", static_dir);
    } else {
        info!("🎨 Serving embedded assets");
    }

    let app = create_app(
        store,
        geo_lookup,
        config.tracker.clone(),
        config.geo.clone(),
        config.frontend.static_dir.as_deref(),
    );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🚀 Trackly listening on http://{}", addr);
    info!("   - Tracking links: http://{}/?url=...", addr);
    info!("   - API endpoints available at http://{}/api/...", addr);
    if let Some(ref base) = config.tracker.public_base_url {
        info!("   - Public base URL: {}", base);
    }

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
