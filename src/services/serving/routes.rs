//! HTTP surface consumed by the presentation layer.

use crate::error::RecError;
use crate::models::*;
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("User {0} not found in training set")]
    UserNotFound(u32),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Transition model not loaded")]
    TransitionsUnavailable,

    #[error("Internal error: {0}")]
    Internal(#[from] RecError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::UserNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::TransitionsUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NoHistoryResponse {
    pub user_id: u32,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct PredictQuery {
    pub k: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub state: String,
    pub predictions: Vec<StatePrediction>,
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.serving_service.health_check())
}

async fn get_serving_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.serving_service.get_serving_stats())
}

async fn recommend(
    State(state): State<AppState>,
    payload: std::result::Result<Json<RecommendationRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(|rejection| ApiError::InvalidRequest(rejection.body_text()))?;
    let top_k = request
        .top_k
        .unwrap_or(state.config.recommendation.default_top_k);
    crate::utils::validation::validate_top_k(top_k).map_err(|e| ApiError::InvalidRequest(e.to_string()))?;

    match state.serving_service.serve_recommendations(request.user_id, top_k)? {
        RecommendOutcome::Recommended(response) => Ok(Json(response).into_response()),
        RecommendOutcome::NotFound => Err(ApiError::UserNotFound(request.user_id)),
        RecommendOutcome::NoHistory => Ok(Json(NoHistoryResponse {
            user_id: request.user_id,
            message: "User has no likes, returning popular items".to_string(),
        })
        .into_response()),
    }
}

async fn predict_next(
    State(state): State<AppState>,
    Path(current): Path<String>,
    Query(params): Query<PredictQuery>,
) -> Result<Json<PredictResponse>, ApiError> {
    let k = params.k.unwrap_or(3);
    let predictions = state
        .serving_service
        .predict_next(&current, k)
        .ok_or(ApiError::TransitionsUnavailable)?;

    Ok(Json(PredictResponse {
        state: current,
        predictions,
    }))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .route("/stats", get(get_serving_stats))
        .route("/recommend", post(recommend))
        .route("/predict/:state", get(predict_next))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
