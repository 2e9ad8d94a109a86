use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const SETTINGS_COLLECTION: &str = "app_settings";
pub const SETTINGS_ID: &str = "global";

/// Fare and commission settings shown on the console's settings panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    pub base_fare: Decimal,
    pub per_km_rate: Decimal,
    pub minimum_fare: Decimal,
    pub max_distance: Decimal,
    pub referral_bonus: Decimal,
    pub commission_rate: Decimal,
}

impl Default for AppSettings {
    fn default() -> Self {
        AppSettings {
            base_fare: Decimal::from(50),
            per_km_rate: Decimal::from(10),
            minimum_fare: Decimal::from(30),
            max_distance: Decimal::from(20),
            referral_bonus: Decimal::from(100),
            commission_rate: Decimal::from(15),
        }
    }
}
