use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, TimeZone};
use mongodb::bson::{self, Bson};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::errors::{AppError, Result};
use crate::models::driver::{DriverRecord, PayoutFrequency, DRIVERS_COLLECTION};
use crate::models::earning::{EarningRecord, EarningStatus, EARNINGS_COLLECTION};
use crate::services::calendar::{day_span, month_span, week_span, MonthWindow, Span};
use crate::services::stats_aggregator::{StatsAggregator, StatsReport};
use crate::store::{DataStore, Filter, StoreQuery};

/// Local-time range a payout period covers around `now`.
pub fn period_span<Tz: TimeZone>(period: PayoutFrequency, now: &DateTime<Tz>) -> Result<Span> {
    match period {
        PayoutFrequency::Daily => day_span(now),
        PayoutFrequency::Weekly => week_span(now),
        PayoutFrequency::Monthly => month_span(now),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PeriodTotals {
    pub unpaid: Decimal,
    pub paid: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayoutStats {
    pub overall: StatsReport,
    pub periods: BTreeMap<PayoutFrequency, PeriodTotals>,
}

/// Everything the payout screen needs for one `now`, resolved up front so the
/// async part only deals in UTC instants.
#[derive(Debug, Clone)]
pub struct PayoutWindow {
    pub month: MonthWindow,
    pub periods: Vec<(PayoutFrequency, Span)>,
}

impl PayoutWindow {
    pub fn containing<Tz: TimeZone>(now: &DateTime<Tz>) -> Result<Self> {
        let periods = PayoutFrequency::ALL
            .into_iter()
            .map(|period| period_span(period, now).map(|span| (period, span)))
            .collect::<Result<Vec<_>>>()?;

        Ok(PayoutWindow {
            month: MonthWindow::containing(now)?,
            periods,
        })
    }
}

pub fn span_filters(field: &str, span: Span) -> [Filter; 2] {
    [
        Filter::gte(field, Bson::DateTime(bson::DateTime::from_chrono(span.start))),
        Filter::lt(field, Bson::DateTime(bson::DateTime::from_chrono(span.end))),
    ]
}

/// Hex ids of the drivers paid out at `frequency`.
pub async fn driver_ids_with_frequency(store: &dyn DataStore, frequency: PayoutFrequency) -> Result<Vec<Bson>> {
    let query = StoreQuery::new().filter(Filter::eq("payout_frequency", frequency.as_str()));
    let drivers = store.query(DRIVERS_COLLECTION, &query).await?;

    drivers
        .into_iter()
        .map(|document| {
            bson::from_document::<DriverRecord>(document)
                .map(|driver| Bson::String(driver.id.to_hex()))
                .map_err(|e| AppError::data_unavailable(format!("malformed driver record: {}", e)))
        })
        .collect()
}

#[derive(Clone)]
pub struct PayoutStatsService {
    store: Arc<dyn DataStore>,
    aggregator: StatsAggregator,
}

impl PayoutStatsService {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        PayoutStatsService {
            aggregator: StatsAggregator::new(store.clone()),
            store,
        }
    }

    pub async fn stats(&self, window: PayoutWindow) -> Result<PayoutStats> {
        let period_reads = window
            .periods
            .iter()
            .map(|(period, span)| async move {
                self.period_totals(*period, *span).await.map(|totals| (*period, totals))
            });

        let (overall, periods) = futures::try_join!(
            self.aggregator.earning_stats(window.month),
            futures::future::try_join_all(period_reads),
        )?;

        Ok(PayoutStats {
            overall,
            periods: periods.into_iter().collect(),
        })
    }

    /// Unpaid and paid earnings created within `span` by drivers whose payout
    /// frequency is `period`.
    pub async fn period_totals(&self, period: PayoutFrequency, span: Span) -> Result<PeriodTotals> {
        let driver_ids = driver_ids_with_frequency(self.store.as_ref(), period).await?;
        if driver_ids.is_empty() {
            return Ok(PeriodTotals::default());
        }

        let query = StoreQuery::new()
            .filter(Filter::is_in("driver_id", driver_ids))
            .filters(span_filters("created_at", span));
        let earnings = self.store.query(EARNINGS_COLLECTION, &query).await?;

        earnings.into_iter().try_fold(PeriodTotals::default(), |mut totals, document| {
            let earning: EarningRecord = bson::from_document(document)
                .map_err(|e| AppError::data_unavailable(format!("malformed earning record: {}", e)))?;
            let bucket = match earning.status {
                EarningStatus::Pending => &mut totals.unpaid,
                EarningStatus::Paid => &mut totals.paid,
            };
            *bucket = bucket.checked_add(earning.amount).ok_or(AppError::AmountOverflow)?;
            Ok(totals)
        })
    }
}
