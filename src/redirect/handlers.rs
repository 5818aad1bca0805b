use axum::{
    extract::{ConnectInfo, RawQuery, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    Form,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;

use super::controller::{PageLoad, RedirectController};
use super::pages::{render_authoring, render_notice};
use crate::composer::{base_address, AuthoringState};
use crate::config::{GeoConfig, TrackerConfig};
use crate::dashboard;
use crate::geo::forwardable_client_ip;
use crate::storage::VisitStore;

pub struct RedirectState {
    pub store: Arc<dyn VisitStore>,
    pub controller: RedirectController,
    pub tracker: TrackerConfig,
    pub geo: GeoConfig,
}

#[derive(Debug, Deserialize)]
pub struct CreateLinkForm {
    #[serde(default)]
    pub destination: String,
}

/// The page: redirect mode when `?url=` is present, authoring mode otherwise
pub async fn page(
    State(state): State<Arc<RedirectState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Response {
    let client_ip = forwardable_client_ip(&headers, addr.ip(), &state.geo);

    match state.controller.on_page_load(query.as_deref(), client_ip) {
        PageLoad::Redirect(redirect) => {
            // `redirect.recording` is dropped here: the task keeps running detached.
            let body = render_notice(&redirect.destination, redirect.delay);
            (
                [
                    (header::CACHE_CONTROL, "no-store"),
                    (header::REFERRER_POLICY, "no-referrer"),
                ],
                Html(body),
            )
                .into_response()
        }
        PageLoad::Authoring { .. } => {
            render_authoring_page(&state, &AuthoringState::default(), StatusCode::OK).await
        }
    }
}

/// Form submission from the authoring page
pub async fn create_link_form(
    State(state): State<Arc<RedirectState>>,
    headers: HeaderMap,
    Form(form): Form<CreateLinkForm>,
) -> Response {
    let Some(base) = base_address(state.tracker.public_base_url.as_deref(), &headers) else {
        return (StatusCode::BAD_REQUEST, "Cannot determine the page address").into_response();
    };

    let authoring = AuthoringState::submit(&base, &form.destination);
    let status = match &authoring.link {
        Some(link) => {
            tracing::info!(link = %link, "created tracking link");
            StatusCode::OK
        }
        None => StatusCode::BAD_REQUEST,
    };

    render_authoring_page(&state, &authoring, status).await
}

async fn render_authoring_page(
    state: &RedirectState,
    authoring: &AuthoringState,
    status: StatusCode,
) -> Response {
    match dashboard::build(state.store.as_ref()).await {
        Ok(view) => (status, Html(render_authoring(authoring, &view))).into_response(),
        Err(e) => {
            tracing::error!("Failed to load visit history: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load visit history",
            )
                .into_response()
        }
    }
}
