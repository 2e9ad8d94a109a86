use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

pub const DRIVERS_COLLECTION: &str = "drivers";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayoutFrequency {
    Daily,
    Weekly,
    Monthly,
}

impl PayoutFrequency {
    pub const ALL: [PayoutFrequency; 3] = [
        PayoutFrequency::Daily,
        PayoutFrequency::Weekly,
        PayoutFrequency::Monthly,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PayoutFrequency::Daily => "daily",
            PayoutFrequency::Weekly => "weekly",
            PayoutFrequency::Monthly => "monthly",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverRecord {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub plate_number: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    pub payout_frequency: PayoutFrequency,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}
