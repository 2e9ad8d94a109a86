// config.rs
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::{AppError, Result};
use crate::services::session_timer::MAX_CHECK_INTERVAL;

/// Where the signed-in session is persisted between restarts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStoreConfig {
    File(PathBuf),
    Redis(String),
    Memory,
}

impl SessionStoreConfig {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw == "memory" {
            return Ok(SessionStoreConfig::Memory);
        }
        if raw.starts_with("redis://") || raw.starts_with("rediss://") {
            return Ok(SessionStoreConfig::Redis(raw.to_string()));
        }
        match raw.strip_prefix("file:") {
            Some(path) if !path.is_empty() => Ok(SessionStoreConfig::File(PathBuf::from(path))),
            _ => Err(AppError::configuration(format!(
                "SESSION_STORE must be file:<path>, redis://... or memory, got {:?}",
                raw
            ))),
        }
    }
}

impl Default for SessionStoreConfig {
    fn default() -> Self {
        SessionStoreConfig::File(PathBuf::from(".session.json"))
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_name: String,
    pub jwt_secret: String,
    pub host: String,
    pub port: u16,
    pub session_store: SessionStoreConfig,
    pub session_check_interval: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| AppError::configuration(format!("{} must be set", key)))
        };

        let port = match lookup("PORT") {
            Some(port) => port
                .parse()
                .map_err(|_| AppError::configuration(format!("PORT must be a number, got {:?}", port)))?,
            None => 10000,
        };

        let session_store = match lookup("SESSION_STORE") {
            Some(raw) => SessionStoreConfig::parse(&raw)?,
            None => SessionStoreConfig::default(),
        };

        let check_secs = match lookup("SESSION_CHECK_INTERVAL_SECS") {
            Some(raw) => raw.parse::<u64>().map_err(|_| {
                AppError::configuration(format!("SESSION_CHECK_INTERVAL_SECS must be a number, got {:?}", raw))
            })?,
            None => MAX_CHECK_INTERVAL.as_secs(),
        };

        Ok(AppConfig {
            database_url: required("DATABASE_URL")?,
            database_name: lookup("DATABASE_NAME").unwrap_or_else(|| "cityride".to_string()),
            jwt_secret: required("JWT_SECRET")?,
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            session_store,
            session_check_interval: Duration::from_secs(check_secs.clamp(1, MAX_CHECK_INTERVAL.as_secs())),
        })
    }
}
