//! Vibes service routes

use axum::{
    Extension, Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use common::{
    database,
    envelope::{ApiError, ApiResult, Envelope},
    middleware::{AuthUser, require_token},
};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::{
    AppState,
    models::{CreateVibeRequest, HistoryParams, UpdateStatusRequest, VibeView},
};

/// Create the router for the vibes service
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/v1/create-vibe", post(create_vibe))
        .route("/api/v1/vibe-history", get(vibe_history))
        .route("/api/v1/vibe/:vibe_id/update-status", post(update_status))
        .route("/api/v1/current-vibe", get(current_vibe))
        .route_layer(from_fn_with_state(state.sessions.clone(), require_token));

    Router::new()
        .route("/health", get(health_check))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = match &state.db_pool {
        Some(pool) => match database::health_check(pool).await {
            Ok(true) => "ok",
            _ => "unavailable",
        },
        None => "not configured",
    };

    Json(json!({
        "status": "ok",
        "service": "vibes-service",
        "database": database,
    }))
}

/// Create-vibe endpoint
pub async fn create_vibe(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    payload: Result<Json<CreateVibeRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = payload?;

    let vibe = state.lifecycle.create(&caller, &request, Utc::now()).await?;

    Ok(Envelope::success("Vibe created successfully")
        .with_data(VibeView::from(&vibe))
        .respond(StatusCode::CREATED))
}

/// Filtered vibe history of the caller
pub async fn vibe_history(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    params: Result<Query<HistoryParams>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(params) = params?;

    let vibes = state.lifecycle.history(&caller, &params, Utc::now()).await?;
    let views: Vec<VibeView> = vibes.iter().map(VibeView::from).collect();

    Ok(Envelope::success("Vibe history fetched successfully")
        .with_data(json!({ "count": views.len(), "vibes": views }))
        .respond(StatusCode::OK))
}

/// Expire or cancel one of the caller's vibes
pub async fn update_status(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(vibe_id): Path<String>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let vibe_id: i64 = vibe_id
        .parse()
        .map_err(|_| ApiError::not_found("Not Found", "Vibe not found."))?;
    let Json(request) = payload?;

    let vibe = state
        .lifecycle
        .update_status(&caller, vibe_id, &request, Utc::now())
        .await?;

    Ok(Envelope::success("Vibe status updated successfully")
        .with_data(VibeView::from(&vibe))
        .respond(StatusCode::OK))
}

/// The caller's running vibe
pub async fn current_vibe(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
) -> ApiResult<Response> {
    let vibe = state.lifecycle.current(&caller, Utc::now()).await?;

    Ok(Envelope::success("Current vibe fetched successfully")
        .with_data(VibeView::from(&vibe))
        .respond(StatusCode::OK))
}
