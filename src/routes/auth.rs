use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};

use crate::middleware::auth::require_session;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    let signed_in = Router::new()
        .route("/logout", post(crate::handlers::auth::logout))
        .route_layer(from_fn_with_state(state, require_session));

    Router::new()
        .route("/login", post(crate::handlers::auth::login))
        .route("/session", get(crate::handlers::auth::session_status))
        .merge(signed_in)
}
