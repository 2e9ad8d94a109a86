use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    response::Json,
};
use serde_json::Value;

use crate::errors::Result;
use crate::handlers::{list_query_from_params, page_json};
use crate::models::transaction::TRANSACTIONS_COLLECTION;
use crate::services::calendar::MonthWindow;
use crate::services::pagination::{ListEngine, Page};
use crate::services::stats_aggregator::{StatsAggregator, StatsReport};
use crate::state::AppState;
use crate::store::{Direction, StoreQuery};

const SEARCH_FIELDS: &[&str] = &["user_id", "description", "payment_purpose"];
const FILTERS: &[&str] = &["status", "type", "currency"];

pub async fn list_transactions(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Page<Value>>> {
    let query = list_query_from_params(&params, FILTERS)?;
    let base = StoreQuery::new().order_by("created_at", Direction::Descending);

    let page = ListEngine::new(SEARCH_FIELDS)
        .fetch(state.store.as_ref(), TRANSACTIONS_COLLECTION, base, &query)
        .await?;

    tracing::debug!("transactions page {}/{} ({} matches)", page.page, page.total_pages, page.total_items);
    Ok(Json(page_json(page)))
}

pub async fn transaction_stats(State(state): State<AppState>) -> Result<Json<StatsReport>> {
    let window = MonthWindow::containing(&state.clock.local())?;
    let report = StatsAggregator::new(state.store.clone()).transaction_stats(window).await?;

    Ok(Json(report))
}
