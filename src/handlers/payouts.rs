use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use mongodb::bson::{self, doc, oid::ObjectId, Bson, Document};
use serde_json::{json, Value};

use crate::errors::{AppError, Result};
use crate::handlers::{list_query_from_params, page_json, parse_object_id, ANY};
use crate::models::driver::{PayoutFrequency, DRIVERS_COLLECTION};
use crate::models::earning::{EarningStatus, EARNINGS_COLLECTION};
use crate::services::pagination::{equality_filter, ListEngine, Page};
use crate::services::payout_stats::{
    driver_ids_with_frequency, period_span, span_filters, PayoutStats, PayoutStatsService, PayoutWindow,
};
use crate::state::AppState;
use crate::store::{DataStore, Direction, Filter, Mutation, StoreQuery};

const SEARCH_FIELDS: &[&str] = &["driver.full_name", "driver.plate_number", "driver.phone"];
const FILTERS: &[&str] = &["status"];

/// Attach each earning's driver under `driver`, read in one batch.
async fn with_drivers(store: &dyn DataStore, earnings: Vec<Document>) -> Result<Vec<Document>> {
    let mut ids: Vec<ObjectId> = earnings
        .iter()
        .filter_map(|earning| earning.get_str("driver_id").ok())
        .filter_map(|id| ObjectId::parse_str(id).ok())
        .collect();
    ids.sort();
    ids.dedup();

    if ids.is_empty() {
        return Ok(earnings);
    }

    let query = StoreQuery::new().filter(Filter::is_in("_id", ids.into_iter().map(Bson::ObjectId).collect()));
    let drivers: HashMap<String, Document> = store
        .query(DRIVERS_COLLECTION, &query)
        .await?
        .into_iter()
        .filter_map(|driver| {
            let id = driver.get_object_id("_id").ok()?.to_hex();
            Some((id, driver))
        })
        .collect();

    Ok(earnings
        .into_iter()
        .map(|mut earning| {
            let driver = earning
                .get_str("driver_id")
                .ok()
                .and_then(|id| drivers.get(id))
                .cloned();
            if let Some(driver) = driver {
                earning.insert("driver", driver);
            }
            earning
        })
        .collect())
}

/// `period` narrows the list to one payout tab: drivers paid out at that
/// frequency, earnings created within the current period.
fn requested_period(params: &HashMap<String, String>) -> Result<Option<PayoutFrequency>> {
    match params.get("period").map(|raw| raw.trim()) {
        None | Some("") | Some(ANY) => Ok(None),
        Some(raw) => PayoutFrequency::ALL
            .into_iter()
            .find(|period| period.as_str() == raw)
            .map(Some)
            .ok_or_else(|| AppError::invalid_data(format!("unknown payout period '{}'", raw))),
    }
}

pub async fn list_payouts(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Page<Value>>> {
    let query = list_query_from_params(&params, FILTERS)?;
    let mut base = StoreQuery::new()
        .filters(query.filters().iter().map(|(field, value)| equality_filter(field, value)))
        .order_by("created_at", Direction::Descending);

    if let Some(period) = requested_period(&params)? {
        let drivers = driver_ids_with_frequency(state.store.as_ref(), period).await?;
        if drivers.is_empty() {
            return Ok(Json(page_json(Page::from_window(Vec::new(), 0, &query))));
        }
        let span = period_span(period, &state.clock.local())?;
        base = base
            .filter(Filter::is_in("driver_id", drivers))
            .filters(span_filters("created_at", span));
    }

    let earnings = state.store.query(EARNINGS_COLLECTION, &base).await?;
    let joined = with_drivers(state.store.as_ref(), earnings).await?;
    let page = ListEngine::new(SEARCH_FIELDS).paginate(&joined, &query);

    Ok(Json(page_json(page)))
}

pub async fn payout_stats(State(state): State<AppState>) -> Result<Json<PayoutStats>> {
    let window = PayoutWindow::containing(&state.clock.local())?;
    let stats = PayoutStatsService::new(state.store.clone()).stats(window).await?;

    Ok(Json(stats))
}

/// Move one earning from pending to paid. Paying twice is a conflict.
pub async fn mark_payout_paid(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let id = parse_object_id(&id)?;
    let paid_at = state.clock.utc();

    let matched = state
        .store
        .mutate(
            EARNINGS_COLLECTION,
            Mutation::Update {
                filters: vec![
                    Filter::eq("_id", id),
                    Filter::eq("status", EarningStatus::Pending.as_str()),
                ],
                set: doc! {
                    "status": EarningStatus::Paid.as_str(),
                    "paid_at": bson::DateTime::from_chrono(paid_at),
                },
            },
        )
        .await?;

    if matched == 0 {
        let exists = state.store.count(EARNINGS_COLLECTION, &[Filter::eq("_id", id)]).await?;
        return Err(if exists == 0 {
            AppError::DocumentNotFound
        } else {
            AppError::conflict("payout already paid")
        });
    }

    tracing::info!("💸 Payout {} marked paid", id.to_hex());
    Ok(Json(json!({
        "success": true,
        "id": id.to_hex(),
        "status": EarningStatus::Paid.as_str(),
        "paid_at": paid_at.to_rfc3339(),
    })))
}
