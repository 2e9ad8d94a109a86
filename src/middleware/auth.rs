use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::errors::{AppError, Result};
use crate::models::session::Session;
use crate::models::user::Claims;
use crate::state::AppState;

/// Bearer token for `session`, expiring with it.
pub fn issue_token(secret: &str, session: &Session) -> Result<String> {
    let claims = Claims {
        sub: session.user.id.clone(),
        sid: session.id.to_string(),
        email: session.user.email.clone(),
        role: session.user.role.clone(),
        iat: session.issued_at.timestamp().max(0) as usize,
        exp: session.expires_at.timestamp().max(0) as usize,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_ref()))
        .map_err(|e| AppError::configuration(format!("cannot sign token: {}", e)))
}

pub fn bearer_claims(headers: &HeaderMap, secret: &str) -> Result<Claims> {
    let token = headers
        .get("authorization")
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthorized)?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::new(Algorithm::HS256),
    )?;

    Ok(token_data.claims)
}

/// Admin routes need a valid token *and* the live session it was issued for.
pub async fn require_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let claims = bearer_claims(&headers, &state.jwt_secret)?;
    let session = state.session.authorize().await?;

    if claims.sid != session.id.to_string() || claims.sub != session.user.id {
        tracing::warn!("🚫 Token for {} does not match the live session", claims.email);
        return Err(AppError::Unauthorized);
    }

    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}
