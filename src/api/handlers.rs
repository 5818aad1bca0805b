use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::composer::{
    base_address, compose_tracking_link, validate, TrackingLink, ValidationError,
};
use crate::config::TrackerConfig;
use crate::dashboard::{self, DestinationGroup};
use crate::storage::VisitStore;

pub struct AppState {
    pub store: Arc<dyn VisitStore>,
    pub tracker: TrackerConfig,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<ValidationError>,
}

impl ErrorResponse {
    fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            reason: None,
        }
    }
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateLinkRequest {
    pub destination: String,
}

#[derive(Debug, Serialize)]
pub struct CreateLinkResponse {
    pub tracking_link: TrackingLink,
}

#[derive(Debug, Serialize)]
pub struct VisitsResponse {
    pub total_visits: usize,
    pub destinations: Vec<DestinationGroup>,
}

/// Create a tracking link
pub async fn create_link(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<CreateLinkRequest>,
) -> Result<(StatusCode, Json<CreateLinkResponse>), (StatusCode, Json<ErrorResponse>)> {
    if let Err(reason) = validate(&payload.destination) {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: reason.to_string(),
                reason: Some(reason),
            }),
        ));
    }

    let Some(base) = base_address(state.tracker.public_base_url.as_deref(), &headers) else {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(
                "Cannot determine the page address; set PUBLIC_BASE_URL or send a Host header",
            )),
        ));
    };

    let tracking_link = compose_tracking_link(&base, &payload.destination);
    tracing::info!(link = %tracking_link, "created tracking link");

    Ok((StatusCode::CREATED, Json(CreateLinkResponse { tracking_link })))
}

/// Every recorded visit, grouped by destination
pub async fn list_visits(State(state): State<Arc<AppState>>) -> Response {
    match dashboard::build(state.store.as_ref()).await {
        Ok(view) => Json(VisitsResponse {
            total_visits: view.total_visits(),
            destinations: view.into_groups(),
        })
        .into_response(),
        Err(e) => {
            tracing::error!("Failed to list visits: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to list visits")),
            )
                .into_response()
        }
    }
}

/// Health check endpoint
pub async fn health_check() -> Json<SuccessResponse> {
    Json(SuccessResponse {
        message: "OK".to_string(),
    })
}
