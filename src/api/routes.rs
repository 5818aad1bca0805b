use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use super::handlers::{create_link, health_check, list_visits, AppState};
use super::static_files::assets_router;

pub fn create_api_router(state: Arc<AppState>, static_dir: Option<&str>) -> Router {
    let api_routes = Router::new()
        .route("/api/links", post(create_link))
        .route("/api/visits", get(list_visits))
        .layer(CorsLayer::permissive())
        .with_state(state);

    Router::new()
        .route("/health", get(health_check))
        .merge(api_routes)
        .merge(assets_router(static_dir))
}
