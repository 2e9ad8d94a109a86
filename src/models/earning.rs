use chrono::{DateTime, Utc};
use mongodb::bson::{self, oid::ObjectId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::services::stats_aggregator::LedgerRecord;

pub const EARNINGS_COLLECTION: &str = "driver_earnings";

/// pending -> paid, exactly once, by an admin payout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EarningStatus {
    Pending,
    Paid,
}

impl EarningStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EarningStatus::Pending => "pending",
            EarningStatus::Paid => "paid",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarningRecord {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    pub driver_id: String,
    pub amount: Decimal,
    pub status: EarningStatus,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<bson::DateTime>,
}

impl LedgerRecord for EarningRecord {
    fn amount(&self) -> Decimal {
        self.amount
    }
}
