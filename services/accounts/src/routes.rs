//! Accounts service routes

use axum::{
    Extension, Json, Router,
    extract::{Multipart, State, multipart::MultipartRejection, rejection::JsonRejection},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use common::{
    database,
    envelope::{ApiError, ApiResult, Envelope},
    middleware::{AuthUser, require_token},
    validation::Presentation,
};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::{
    AppState,
    avatar::AvatarUpload,
    credentials::{LoginRequest, RegisterRequest},
    service::{AppleLoginRequest, ChangePasswordRequest, ProfileUpdate},
};

/// Create the router for the accounts service
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/v1/logout", post(logout))
        .route("/api/v1/update-profile", put(update_profile))
        .route("/api/v1/change-password", post(change_password))
        .route_layer(from_fn_with_state(
            state.service.sessions().clone(),
            require_token,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/register", post(register))
        .route("/api/v1/login", post(login))
        .route("/api/v1/apple-login", post(apple_login))
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

    Json(serde_json::json!({
        "status": "ok",
        "service": "accounts-service",
        "database": database,
    }))
}

/// Registration endpoint
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = payload?;
    info!("Registration attempt for user: {:?}", request.username);

    let signed_in = state
        .service
        .register(&request)
        .await
        .map_err(|e| e.into_api(Presentation::Registration))?;

    Ok(Envelope::success("Registered Successfully")
        .with_data(signed_in.account)
        .with_token(signed_in.token)
        .respond(StatusCode::CREATED))
}

/// Email/password or external-identity login endpoint
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = payload?;

    let signed_in = state.service.login(&request).await?;

    Ok(Envelope::success("Login successful")
        .with_data(signed_in.account)
        .with_token(signed_in.token)
        .respond(StatusCode::OK))
}

/// External-identity register-or-login endpoint
pub async fn apple_login(
    State(state): State<AppState>,
    payload: Result<Json<AppleLoginRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = payload?;

    let outcome = state.service.apple_login(&request).await?;
    let message = if outcome.registered {
        "User registered successfully"
    } else {
        "User logged in successfully"
    };

    Ok(Envelope::success(message)
        .with_data(outcome.signed_in.account)
        .with_token(outcome.signed_in.token)
        .respond(StatusCode::OK))
}

/// Logout endpoint
pub async fn logout(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
) -> ApiResult<Response> {
    let username = state.service.logout(&caller).await?;

    Ok(Envelope::success(format!("User '{}' logged out successfully", username))
        .respond(StatusCode::OK))
}

/// Profile update endpoint (multipart form, optional `avatar` file)
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Response> {
    let mut multipart =
        multipart.map_err(|e| ApiError::bad_request("Validation Error", e.body_text()))?;
    let update = read_profile_form(&mut multipart).await?;

    let account = state.service.update_profile(&caller, &update).await?;

    Ok(Envelope::success("Profile updated successfully.")
        .with_data(account.summary())
        .respond(StatusCode::OK))
}

/// Change-password endpoint
pub async fn change_password(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = payload?;

    state.service.change_password(&caller, &request).await?;

    Ok(Envelope::success("Password changed successfully").respond(StatusCode::OK))
}

async fn read_profile_form(multipart: &mut Multipart) -> ApiResult<ProfileUpdate> {
    let mut update = ProfileUpdate::default();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        error!("Multipart error: {}", e);
        ApiError::bad_request("Validation Error", format!("Multipart error: {}", e))
    })? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == "avatar" {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request("Validation Error", e.body_text()))?;
            update.avatar = Some(AvatarUpload {
                file_name,
                bytes: bytes.to_vec(),
            });
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| ApiError::bad_request("Validation Error", e.body_text()))?;
            update.set(&name, value);
        }
    }

    Ok(update)
}
