//! Authentication middleware for session token validation

use axum::{
    body::Body,
    extract::State,
    http::{Request, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use tracing::{error, warn};
use uuid::Uuid;

use crate::{envelope::ApiError, session::SessionIssuer};

/// Authenticated caller, inserted into request extensions by [`require_token`]
///
/// Handlers take it as `Extension<AuthUser>` and pass it on explicitly to
/// every operation that needs to know who is asking.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub token: String,
}

/// Extract the key from an `Authorization: Token <key>` or `Bearer <key>` header
pub fn token_from_header(value: &str) -> Option<&str> {
    let (scheme, key) = value.trim().split_once(' ')?;
    let key = key.trim();
    let known_scheme = scheme.eq_ignore_ascii_case("token") || scheme.eq_ignore_ascii_case("bearer");
    (known_scheme && !key.is_empty()).then_some(key)
}

/// Reject requests without a valid session token
pub async fn require_token(
    State(sessions): State<SessionIssuer>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or_else(|| {
            ApiError::unauthorized(
                "Authentication Failed",
                "Authentication credentials were not provided.",
            )
        })?;

    let key = token_from_header(header).ok_or_else(|| {
        ApiError::unauthorized("Authentication Failed", "Invalid token header.")
    })?;

    let token = sessions
        .authenticate(key)
        .await
        .map_err(|e| {
            error!("Failed to look up session token: {}", e);
            ApiError::unexpected(e)
        })?
        .ok_or_else(|| {
            warn!("Rejected unknown session token");
            ApiError::unauthorized("Authentication Failed", "Invalid token.")
        })?;

    req.extensions_mut().insert(AuthUser {
        user_id: token.user_id,
        token: token.key,
    });

    Ok(next.run(req).await)
}
