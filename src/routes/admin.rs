use axum::{
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};

use crate::handlers::{payouts, resources, settings, transactions};
use crate::middleware::auth::require_session;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/transactions", get(transactions::list_transactions))
        .route("/transactions/stats", get(transactions::transaction_stats))
        .route("/payouts", get(payouts::list_payouts))
        .route("/payouts/stats", get(payouts::payout_stats))
        .route("/payouts/:id/pay", post(payouts::mark_payout_paid))
        .route("/settings", get(settings::get_settings).put(settings::update_settings))
        .route(
            "/resources/:resource",
            get(resources::list_resource).post(resources::create_resource),
        )
        .route(
            "/resources/:resource/:id",
            put(resources::update_resource).delete(resources::delete_resource),
        )
        .route_layer(from_fn_with_state(state, require_session))
}
