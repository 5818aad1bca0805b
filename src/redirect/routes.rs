use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers::{create_link_form, page, RedirectState};

pub fn create_redirect_router(state: Arc<RedirectState>) -> Router {
    Router::new()
        .route("/", get(page))
        .route("/links", post(create_link_form))
        .with_state(state)
}
