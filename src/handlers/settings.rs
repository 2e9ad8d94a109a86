use axum::{extract::State, response::Json};
use mongodb::bson;
use rust_decimal::Decimal;

use crate::errors::{AppError, Result};
use crate::models::settings::{AppSettings, SETTINGS_COLLECTION, SETTINGS_ID};
use crate::state::AppState;
use crate::store::{DataStore, Filter, Mutation, StoreQuery};

pub async fn load_settings(store: &dyn DataStore) -> Result<AppSettings> {
    let query = StoreQuery::new().filter(Filter::eq("_id", SETTINGS_ID)).limit(1);
    match store.query(SETTINGS_COLLECTION, &query).await?.into_iter().next() {
        Some(document) => bson::from_document(document)
            .map_err(|e| AppError::data_unavailable(format!("malformed settings: {}", e))),
        None => Ok(AppSettings::default()),
    }
}

fn validate(settings: &AppSettings) -> Result<()> {
    let amounts = [
        ("base_fare", settings.base_fare),
        ("per_km_rate", settings.per_km_rate),
        ("minimum_fare", settings.minimum_fare),
        ("max_distance", settings.max_distance),
        ("referral_bonus", settings.referral_bonus),
        ("commission_rate", settings.commission_rate),
    ];
    if let Some((field, _)) = amounts.iter().find(|(_, value)| value.is_sign_negative()) {
        return Err(AppError::invalid_data(format!("{} must not be negative", field)));
    }
    if settings.commission_rate > Decimal::ONE_HUNDRED {
        return Err(AppError::invalid_data("commission_rate is a percentage"));
    }
    Ok(())
}

pub async fn get_settings(State(state): State<AppState>) -> Result<Json<AppSettings>> {
    Ok(Json(load_settings(state.store.as_ref()).await?))
}

pub async fn update_settings(
    State(state): State<AppState>,
    Json(settings): Json<AppSettings>,
) -> Result<Json<AppSettings>> {
    validate(&settings)?;
    let set = bson::to_document(&settings).map_err(|e| AppError::invalid_data(e.to_string()))?;

    let matched = state
        .store
        .mutate(
            SETTINGS_COLLECTION,
            Mutation::Update {
                filters: vec![Filter::eq("_id", SETTINGS_ID)],
                set: set.clone(),
            },
        )
        .await?;

    if matched == 0 {
        let mut document = set;
        document.insert("_id", SETTINGS_ID);
        state.store.mutate(SETTINGS_COLLECTION, Mutation::Insert(document)).await?;
    }

    tracing::info!("⚙️ Settings updated");
    Ok(Json(settings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn missing_settings_fall_back_to_defaults() {
        let store = MemoryStore::new();

        assert_eq!(load_settings(&store).await.unwrap(), AppSettings::default());
    }

    #[test]
    fn rejects_negative_fares() {
        let settings = AppSettings {
            base_fare: Decimal::from(-1),
            ..AppSettings::default()
        };

        assert!(matches!(validate(&settings), Err(AppError::ValidationError(message)) if message.contains("base_fare")));
    }
}
