//! API route handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use crate::config::FEATURE_NAMES;
use crate::context::AppContext;
use crate::error::DashboardError;
use crate::model::NUM_FEATURES;
use crate::types::{
    ErrorResponse, HealthResponse, HistoryResponse, Leaderboard, LeaderboardQuery,
    ModelInfoResponse, RaceContext,
};

/// Application state shared across handlers.
pub type AppState = Arc<AppContext>;

/// Error type for API handlers.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<DashboardError> for ApiError {
    fn from(err: DashboardError) -> Self {
        let status = match &err {
            DashboardError::ModelInput(_) | DashboardError::DegenerateScore(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            DashboardError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            DashboardError::MissingArtifact { .. }
            | DashboardError::InvalidArtifact { .. }
            | DashboardError::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::warn!("Request failed: {}", err);
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(ErrorResponse {
            error: status.to_string(),
            message: self.message,
        });
        (status, body).into_response()
    }
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Model info endpoint.
pub async fn model_info(State(state): State<AppState>) -> Json<ModelInfoResponse> {
    Json(ModelInfoResponse {
        model_path: state.config.model.path.clone(),
        num_features: NUM_FEATURES,
        feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
        num_horses: state.features.len(),
    })
}

/// Leaderboard endpoint. Inference runs on the blocking pool.
pub async fn leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<Leaderboard>, ApiError> {
    let context = resolve_context(&state.config.race, &query)?;
    let board = tokio::task::spawn_blocking(move || state.leaderboard(&context))
        .await
        .map_err(|e| ApiError::internal(format!("scoring task failed: {}", e)))??;
    Ok(Json(board))
}

/// Race history endpoint. Always succeeds; store problems are reported in
/// the body.
pub async fn history(
    State(state): State<AppState>,
    Path(horse): Path<String>,
) -> Json<HistoryResponse> {
    let view = state.history(&horse);
    Json(HistoryResponse { horse, view })
}

/// Fill unspecified query parameters from the configured defaults.
fn resolve_context(defaults: &RaceContext, query: &LeaderboardQuery) -> Result<RaceContext, ApiError> {
    let distance = match query.distance {
        Some(d) => RaceContext::check_distance(d).map_err(ApiError::bad_request)?,
        None => defaults.distance,
    };

    Ok(RaceContext {
        distance,
        grade: query.grade.unwrap_or(defaults.grade),
        course: query.course.unwrap_or(defaults.course),
        track: query.track.unwrap_or(defaults.track),
        runners: defaults.runners,
    })
}
