use mongodb::{Client, Database};

use crate::config::AppConfig;
use crate::errors::{AppError, Result};

pub async fn get_db_client(config: &AppConfig) -> Result<Database> {
    let client = Client::with_uri_str(&config.database_url)
        .await
        .map_err(|e| AppError::configuration(format!("Failed to connect to MongoDB: {}", e)))?;

    let db = client.database(&config.database_name);

    // Listing collections forces a round trip, so a bad URL shows up at startup.
    match db.list_collection_names().await {
        Ok(collections) => {
            tracing::info!("✅ Connected to database: {}", config.database_name);
            tracing::info!("📂 Collections found: {:?}", collections);
        }
        Err(e) => {
            tracing::error!("❌ Database '{}' may not exist or is inaccessible: {}", config.database_name, e);
        }
    }

    Ok(db)
}
