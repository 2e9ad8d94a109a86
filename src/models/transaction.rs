// models/transaction.rs
use chrono::{DateTime, Utc};
use mongodb::bson::{self, oid::ObjectId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::services::stats_aggregator::LedgerRecord;

pub const TRANSACTIONS_COLLECTION: &str = "transactions";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Credit,
    Debit,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionKind::Credit => "credit",
            TransactionKind::Debit => "debit",
        }
    }
}

/// pending -> completed | failed | refunded. Completed records are immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl TransactionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Refunded => "refunded",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    pub user_id: String,
    pub amount: Decimal,

    #[serde(default = "default_currency")]
    pub currency: String,

    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub status: TransactionStatus,

    #[serde(default)]
    pub payment_purpose: Option<String>,
    #[serde(default)]
    pub description: Option<String>,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

fn default_currency() -> String {
    "NGN".to_string()
}

impl LedgerRecord for TransactionRecord {
    fn amount(&self) -> Decimal {
        self.amount
    }
}
