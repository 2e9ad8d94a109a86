//! Financial summary figures computed on our side from plain filtered reads.
//!
//! Every figure comes from its own read against the store; the reads are
//! fanned out and joined, and a single failed read fails the whole report.
//! Sums use decimal arithmetic so many small currency values do not drift.

use std::sync::Arc;

use mongodb::bson::{self, Bson};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::{AppError, Result};
use crate::models::earning::{EarningRecord, EarningStatus, EARNINGS_COLLECTION};
use crate::models::transaction::{
    TransactionKind, TransactionRecord, TransactionStatus, TRANSACTIONS_COLLECTION,
};
use crate::services::calendar::MonthWindow;
use crate::store::{DataStore, Filter, StoreQuery};

/// A stored record carrying a monetary amount.
pub trait LedgerRecord: DeserializeOwned {
    fn amount(&self) -> Decimal;
}

/// Which collection to read and how its status vocabulary maps onto the
/// report's pending/settled/refunded buckets.
#[derive(Debug, Clone)]
pub struct Ledger {
    pub collection: &'static str,
    pub status_field: &'static str,
    pub created_at_field: &'static str,
    pub pending_status: &'static str,
    pub settled_status: &'static str,
    pub refunded_status: Option<&'static str>,
    /// Applied to every amount read, e.g. only credits count as revenue.
    pub base_filters: Vec<Filter>,
    /// Whether `total_amount` also counts pending records.
    pub total_includes_pending: bool,
    /// Whether `pending_count` is narrowed by `base_filters` too.
    pub pending_count_uses_base_filters: bool,
}

impl Ledger {
    pub fn transactions() -> Self {
        Ledger {
            collection: TRANSACTIONS_COLLECTION,
            status_field: "status",
            created_at_field: "created_at",
            pending_status: TransactionStatus::Pending.as_str(),
            settled_status: TransactionStatus::Completed.as_str(),
            refunded_status: Some(TransactionStatus::Refunded.as_str()),
            base_filters: vec![Filter::eq("type", TransactionKind::Credit.as_str())],
            total_includes_pending: false,
            pending_count_uses_base_filters: false,
        }
    }

    pub fn driver_earnings() -> Self {
        Ledger {
            collection: EARNINGS_COLLECTION,
            status_field: "status",
            created_at_field: "created_at",
            pending_status: EarningStatus::Pending.as_str(),
            settled_status: EarningStatus::Paid.as_str(),
            refunded_status: None,
            base_filters: Vec::new(),
            total_includes_pending: true,
            pending_count_uses_base_filters: true,
        }
    }

    fn with_status(&self, status: &str) -> Vec<Filter> {
        let mut filters = self.base_filters.clone();
        filters.push(Filter::eq(self.status_field, status));
        filters
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsReport {
    /// Settled records only for transactions (revenue); pending plus paid for
    /// earnings. Failed and refunded records never count.
    pub total_amount: Decimal,
    pub pending_amount: Decimal,
    pub paid_or_completed_amount: Decimal,
    pub refunded_amount: Option<Decimal>,
    pub pending_count: u64,
    pub current_month_amount: Decimal,
    pub previous_month_amount: Decimal,
    pub monthly_growth_percent: Decimal,
}

/// Month-over-month growth in percent, rounded to two places. Moving from
/// zero to any positive revenue reports exactly 100.
pub fn monthly_growth(current: Decimal, previous: Decimal) -> Result<Decimal> {
    if previous > Decimal::ZERO {
        let growth = current
            .checked_sub(previous)
            .and_then(|delta| delta.checked_mul(Decimal::ONE_HUNDRED))
            .and_then(|scaled| scaled.checked_div(previous))
            .ok_or(AppError::AmountOverflow)?;
        Ok(growth.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
    } else if current > Decimal::ZERO {
        Ok(Decimal::ONE_HUNDRED)
    } else {
        Ok(Decimal::ZERO)
    }
}

#[derive(Clone)]
pub struct StatsAggregator {
    store: Arc<dyn DataStore>,
}

impl StatsAggregator {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        StatsAggregator { store }
    }

    pub async fn transaction_stats(&self, window: MonthWindow) -> Result<StatsReport> {
        self.report::<TransactionRecord>(&Ledger::transactions(), window).await
    }

    pub async fn earning_stats(&self, window: MonthWindow) -> Result<StatsReport> {
        self.report::<EarningRecord>(&Ledger::driver_earnings(), window).await
    }

    pub async fn report<R: LedgerRecord>(&self, ledger: &Ledger, window: MonthWindow) -> Result<StatsReport> {
        let created_at = ledger.created_at_field;
        let settled = ledger.with_status(ledger.settled_status);
        let pending = ledger.with_status(ledger.pending_status);
        let pending_for_count = if ledger.pending_count_uses_base_filters {
            pending.clone()
        } else {
            vec![Filter::eq(ledger.status_field, ledger.pending_status)]
        };

        let mut current_month = settled.clone();
        current_month.push(Filter::gte(created_at, Bson::DateTime(bson::DateTime::from_chrono(window.current_start))));
        current_month.push(Filter::lte(created_at, Bson::DateTime(bson::DateTime::from_chrono(window.now))));

        let mut previous_month = settled.clone();
        previous_month.push(Filter::gte(created_at, Bson::DateTime(bson::DateTime::from_chrono(window.previous_start))));
        previous_month.push(Filter::lt(created_at, Bson::DateTime(bson::DateTime::from_chrono(window.current_start))));

        let refunded = async {
            match ledger.refunded_status {
                Some(status) => self.sum::<R>(ledger.collection, ledger.with_status(status)).await.map(Some),
                None => Ok(None),
            }
        };
        let pending_count = async {
            self.store
                .count(ledger.collection, &pending_for_count)
                .await
                .map_err(AppError::from)
        };

        let (paid_or_completed_amount, pending_amount, pending_count, refunded_amount, current, previous) =
            futures::try_join!(
                self.sum::<R>(ledger.collection, settled),
                self.sum::<R>(ledger.collection, pending),
                pending_count,
                refunded,
                self.sum::<R>(ledger.collection, current_month),
                self.sum::<R>(ledger.collection, previous_month),
            )?;

        let total_amount = if ledger.total_includes_pending {
            pending_amount
                .checked_add(paid_or_completed_amount)
                .ok_or(AppError::AmountOverflow)?
        } else {
            paid_or_completed_amount
        };

        let report = StatsReport {
            total_amount,
            pending_amount,
            paid_or_completed_amount,
            refunded_amount,
            pending_count,
            current_month_amount: current,
            previous_month_amount: previous,
            monthly_growth_percent: monthly_growth(current, previous)?,
        };

        tracing::info!(
            "📊 {} stats: total {} pending {} ({} records) growth {}%",
            ledger.collection,
            report.total_amount,
            report.pending_amount,
            report.pending_count,
            report.monthly_growth_percent
        );
        Ok(report)
    }

    /// Read every record matching `filters` and add up the amounts. A record
    /// that does not decode, or carries a negative amount, fails the read.
    pub async fn sum<R: LedgerRecord>(&self, collection: &str, filters: Vec<Filter>) -> Result<Decimal> {
        let query = StoreQuery::new().filters(filters);
        let records = self.store.query(collection, &query).await?;

        records.into_iter().try_fold(Decimal::ZERO, |total, document| {
            let record: R = bson::from_document(document).map_err(|e| {
                AppError::data_unavailable(format!("malformed record in {}: {}", collection, e))
            })?;
            let amount = record.amount();
            if amount < Decimal::ZERO {
                return Err(AppError::data_unavailable(format!(
                    "negative amount {} in {}",
                    amount, collection
                )));
            }
            total.checked_add(amount).ok_or(AppError::AmountOverflow)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, MockDataStore, StoreError};
    use chrono::{DateTime, FixedOffset, TimeZone, Utc};
    use mongodb::bson::{doc, Document};
    use rstest::rstest;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn transaction(amount: &str, kind: &str, status: &str, created_at: DateTime<Utc>) -> Document {
        doc! {
            "user_id": "rider-1",
            "amount": amount,
            "currency": "NGN",
            "type": kind,
            "status": status,
            "created_at": bson::DateTime::from_chrono(created_at),
        }
    }

    fn window() -> MonthWindow {
        MonthWindow::containing(&at(2024, 3, 15, 12)).unwrap()
    }

    async fn seeded() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .seed(
                TRANSACTIONS_COLLECTION,
                vec![
                    transaction("100.10", "credit", "completed", at(2024, 3, 2, 9)),
                    transaction("49.90", "credit", "completed", at(2024, 3, 10, 9)),
                    transaction("200.00", "credit", "completed", at(2024, 2, 20, 9)),
                    transaction("75.25", "credit", "pending", at(2024, 3, 11, 9)),
                    transaction("30.00", "credit", "refunded", at(2024, 3, 5, 9)),
                    transaction("999.99", "debit", "completed", at(2024, 3, 5, 9)),
                    transaction("12.00", "credit", "failed", at(2024, 3, 6, 9)),
                ],
            )
            .await;
        store
    }

    #[rstest]
    #[case(0, 0, 0)]
    #[case(150, 0, 100)]
    #[case(150, 200, -25)]
    #[case(300, 200, 50)]
    fn growth_edge_cases(#[case] current: i64, #[case] previous: i64, #[case] expected: i64) {
        let growth = monthly_growth(Decimal::from(current), Decimal::from(previous)).unwrap();
        assert_eq!(growth, Decimal::from(expected));
    }

    #[test]
    fn growth_is_rounded_to_two_places() {
        let growth = monthly_growth(Decimal::from(100), Decimal::from(300)).unwrap();
        assert_eq!(growth.to_string(), "-66.67");
    }

    #[tokio::test]
    async fn reduces_transactions_into_a_report() {
        let store = seeded().await;
        let aggregator = StatsAggregator::new(store);

        let report = aggregator.transaction_stats(window()).await.unwrap();

        assert_eq!(report.paid_or_completed_amount, Decimal::new(35000, 2));
        assert_eq!(report.pending_amount, Decimal::new(7525, 2));
        assert_eq!(report.total_amount, Decimal::new(35000, 2));
        assert_eq!(report.refunded_amount, Some(Decimal::new(3000, 2)));
        assert_eq!(report.pending_count, 1);
        assert_eq!(report.current_month_amount, Decimal::new(15000, 2));
        assert_eq!(report.previous_month_amount, Decimal::new(20000, 2));
        assert_eq!(report.monthly_growth_percent, Decimal::from(-25));
    }

    #[tokio::test]
    async fn revenue_is_settled_credits_and_pending_count_spans_every_kind() {
        let store = Arc::new(MemoryStore::new());
        store
            .seed(
                TRANSACTIONS_COLLECTION,
                vec![
                    transaction("100", "credit", "completed", at(2024, 3, 3, 10)),
                    transaction("40", "credit", "pending", at(2024, 3, 4, 10)),
                    transaction("25", "debit", "pending", at(2024, 3, 5, 10)),
                ],
            )
            .await;

        let report = StatsAggregator::new(store).transaction_stats(window()).await.unwrap();

        assert_eq!(report.total_amount, Decimal::from(100));
        assert_eq!(report.paid_or_completed_amount, Decimal::from(100));
        assert_eq!(report.pending_amount, Decimal::from(40));
        assert_eq!(report.pending_count, 2);
    }

    #[tokio::test]
    async fn aggregation_is_idempotent() {
        let store = seeded().await;
        let aggregator = StatsAggregator::new(store);

        let first = aggregator.transaction_stats(window()).await.unwrap();
        let second = aggregator.transaction_stats(window()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[tokio::test]
    async fn month_start_instant_belongs_to_the_current_month_only() {
        let offset = FixedOffset::east_opt(3600).unwrap();
        let now = offset.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
        let window = MonthWindow::containing(&now).unwrap();
        let store = Arc::new(MemoryStore::new());
        store
            .seed(
                TRANSACTIONS_COLLECTION,
                vec![
                    transaction("10", "credit", "completed", window.current_start),
                    transaction("5", "credit", "completed", window.current_start - chrono::TimeDelta::milliseconds(1)),
                ],
            )
            .await;

        let report = StatsAggregator::new(store).transaction_stats(window).await.unwrap();

        assert_eq!(report.current_month_amount, Decimal::from(10));
        assert_eq!(report.previous_month_amount, Decimal::from(5));
    }

    #[tokio::test]
    async fn zero_previous_month_reports_full_growth() {
        let store = Arc::new(MemoryStore::new());
        store
            .seed(
                TRANSACTIONS_COLLECTION,
                vec![transaction("150", "credit", "completed", at(2024, 3, 3, 10))],
            )
            .await;

        let report = StatsAggregator::new(store).transaction_stats(window()).await.unwrap();

        assert_eq!(report.monthly_growth_percent, Decimal::ONE_HUNDRED);
    }

    #[tokio::test]
    async fn earnings_have_no_refund_bucket() {
        let store = Arc::new(MemoryStore::new());
        store
            .seed(
                EARNINGS_COLLECTION,
                vec![
                    doc! { "driver_id": "d-1", "amount": 1200.5, "status": "pending", "created_at": bson::DateTime::from_chrono(at(2024, 3, 1, 8)) },
                    doc! { "driver_id": "d-2", "amount": 800, "status": "paid", "created_at": bson::DateTime::from_chrono(at(2024, 3, 2, 8)) },
                ],
            )
            .await;

        let report = StatsAggregator::new(store).earning_stats(window()).await.unwrap();

        assert_eq!(report.total_amount, Decimal::new(20005, 1));
        assert_eq!(report.pending_amount, Decimal::new(12005, 1));
        assert_eq!(report.paid_or_completed_amount, Decimal::from(800));
        assert_eq!(report.refunded_amount, None);
    }

    #[tokio::test]
    async fn failed_pending_count_fails_the_whole_report() {
        let mut store = MockDataStore::new();
        store.expect_query().returning(|_, _| Ok(Vec::new()));
        store
            .expect_count()
            .returning(|_, _| Err(StoreError::Backend("permission denied".to_string())));

        let result = StatsAggregator::new(Arc::new(store)).transaction_stats(window()).await;

        assert!(matches!(result, Err(AppError::DataUnavailable(message)) if message.contains("permission denied")));
    }

    #[tokio::test]
    async fn malformed_amounts_fail_instead_of_counting_as_zero() {
        let store = Arc::new(MemoryStore::new());
        store
            .seed(
                TRANSACTIONS_COLLECTION,
                vec![doc! { "user_id": "rider-1", "type": "credit", "status": "completed", "created_at": bson::DateTime::from_chrono(at(2024, 3, 3, 10)) }],
            )
            .await;

        let result = StatsAggregator::new(store).transaction_stats(window()).await;

        assert!(matches!(result, Err(AppError::DataUnavailable(_))));
    }

    #[tokio::test]
    async fn negative_amounts_are_rejected() {
        let store = Arc::new(MemoryStore::new());
        store
            .seed(
                TRANSACTIONS_COLLECTION,
                vec![transaction("-5.00", "credit", "pending", at(2024, 3, 3, 10))],
            )
            .await;

        let result = StatsAggregator::new(store).transaction_stats(window()).await;

        assert!(matches!(result, Err(AppError::DataUnavailable(_))));
    }
}
