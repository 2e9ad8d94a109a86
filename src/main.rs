use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use mockable::{Clock, DefaultClock};
use tracing_subscriber::EnvFilter;

use city_ride_admin::config::AppConfig;
use city_ride_admin::database::connection::get_db_client;
use city_ride_admin::routes::build_router;
use city_ride_admin::services::authenticator::StoreAuthenticator;
use city_ride_admin::services::session_store::open_session_store;
use city_ride_admin::services::session_timer::SessionTimer;
use city_ride_admin::state::AppState;
use city_ride_admin::store::{DataStore, MongoStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env().context("loading configuration")?;
    let app_state = initialize_app_state(&config).await?;

    let app = build_router(app_state);
    start_server(app, &config).await
}

async fn initialize_app_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let db = get_db_client(config).await?;
    let store: Arc<dyn DataStore> = Arc::new(MongoStore::new(db));

    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let session_store = open_session_store(&config.session_store)
        .await
        .context("opening session store")?;
    let session = Arc::new(SessionTimer::restore(session_store, clock.clone()).await);

    session.clone().spawn_expiry_task(config.session_check_interval);
    tracing::info!("⏱️ Session expiry checked every {:?}", config.session_check_interval);

    Ok(AppState::new(
        store.clone(),
        session,
        Arc::new(StoreAuthenticator::new(store)),
        clock,
        config.jwt_secret.clone(),
    ))
}

async fn start_server(app: Router, config: &AppConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", config.host, config.port))?;

    tracing::info!("🚀 Server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
