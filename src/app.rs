use anyhow::Result;
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::{self, AppState};
use crate::config::{Config, DatabaseBackend, GeoConfig, TrackerConfig};
use crate::geo::GeoLookup;
use crate::redirect::{self, RedirectController, RedirectState};
use crate::storage::{
    KeyValueBackend, MemoryBackend, NamespacedVisitStore, PostgresBackend, SqliteBackend,
    VisitStore,
};

/// Open the configured backend and wrap it in the namespaced visit store
pub async fn open_store(config: &Config) -> Result<Arc<NamespacedVisitStore>> {
    let database = &config.database;
    let backend: Arc<dyn KeyValueBackend> = match database.backend {
        DatabaseBackend::Memory => {
            info!("Using in-memory storage; visits are lost on restart");
            Arc::new(MemoryBackend::new())
        }
        DatabaseBackend::Sqlite => {
            info!("Using SQLite storage: {}", database.url);
            Arc::new(SqliteBackend::new(&database.url, database.max_connections).await?)
        }
        DatabaseBackend::Postgres => {
            info!("Using PostgreSQL storage: {}", database.url);
            Arc::new(PostgresBackend::new(&database.url, database.max_connections).await?)
        }
    };

    let store = NamespacedVisitStore::new(backend);
    store.init().await?;
    Ok(Arc::new(store))
}

/// Assemble the page, form, API and asset routes
pub fn create_app(
    store: Arc<dyn VisitStore>,
    geo: Arc<dyn GeoLookup>,
    tracker: TrackerConfig,
    geo_config: GeoConfig,
    static_dir: Option<&str>,
) -> Router {
    let controller = RedirectController::new(Arc::clone(&store), geo, tracker.redirect_delay());

    let redirect_state = Arc::new(RedirectState {
        store: Arc::clone(&store),
        controller,
        tracker: tracker.clone(),
        geo: geo_config,
    });
    let api_state = Arc::new(AppState { store, tracker });

    redirect::create_redirect_router(redirect_state)
        .merge(api::create_api_router(api_state, static_dir))
        .layer(TraceLayer::new_for_http())
}
