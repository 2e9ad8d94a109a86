use axum::{extract::State, http::HeaderMap, response::Json};
use serde_json::{json, Value};

use crate::errors::{AppError, Result};
use crate::middleware::auth::{bearer_claims, issue_token};
use crate::models::user::{AuthResponse, LoginUser, SessionStatusResponse};
use crate::state::AppState;

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginUser>,
) -> Result<Json<AuthResponse>> {
    let user = match state.authenticator.authenticate(&payload.email, &payload.password).await {
        Ok(user) => user,
        Err(e) => {
            tracing::warn!("🚫 Sign-in rejected for {}: {}", payload.email, e);
            return Err(e);
        }
    };

    let session = state.session.login(user).await?;
    let token = issue_token(&state.jwt_secret, &session)?;

    Ok(Json(AuthResponse {
        user: session.user,
        token,
        expires_at: session.expires_at,
    }))
}

pub async fn logout(State(state): State<AppState>) -> Result<Json<Value>> {
    state.session.logout().await?;

    Ok(Json(json!({
        "success": true,
        "message": "Signed out",
    })))
}

/// Whether the caller's token still maps to the live session. Never an error
/// for a missing, stale or expired session.
pub async fn session_status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SessionStatusResponse>> {
    let signed_out = SessionStatusResponse {
        authenticated: false,
        user: None,
        expires_at: None,
    };

    let Ok(claims) = bearer_claims(&headers, &state.jwt_secret) else {
        return Ok(Json(signed_out));
    };

    match state.session.authorize().await {
        Ok(session) if session.id.to_string() == claims.sid => Ok(Json(SessionStatusResponse {
            authenticated: true,
            user: Some(session.user),
            expires_at: Some(session.expires_at),
        })),
        Ok(_) | Err(AppError::Unauthorized) | Err(AppError::SessionExpired) => Ok(Json(signed_out)),
        Err(e) => Err(e),
    }
}
