use axum::{extract::State, http::Method, response::Json, routing::get, Router};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub mod admin;
pub mod auth;

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .allow_credentials(false);

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_check))
        .route("/api/health", get(api_health_check))
        .nest("/api/auth", auth::routes(state.clone()))
        .nest("/api/admin", admin::routes(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn root_handler() -> &'static str {
    "🚕 City Ride Admin API"
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn api_health_check(State(state): State<AppState>) -> Json<Value> {
    let db_status = match state.store.ping().await {
        Ok(()) => "connected",
        Err(e) => {
            tracing::warn!("Store ping failed: {}", e);
            "disconnected"
        }
    };

    Json(json!({
        "status": "healthy",
        "database": db_status,
        "session": state.session.current().await.session().is_some(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::{DateTime, Local, Utc};
    use mockable::Clock;
    use mongodb::bson::{self, doc, oid::ObjectId};
    use tower::ServiceExt;

    use crate::models::earning::EARNINGS_COLLECTION;
    use crate::models::transaction::TRANSACTIONS_COLLECTION;
    use crate::models::user::USERS_COLLECTION;
    use crate::services::authenticator::StoreAuthenticator;
    use crate::services::session_store::MemorySessionStore;
    use crate::services::session_timer::SessionTimer;
    use crate::store::MemoryStore;

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn local(&self) -> DateTime<Local> {
            self.0.with_timezone(&Local)
        }

        fn utc(&self) -> DateTime<Utc> {
            self.0
        }
    }

    async fn app() -> (Router, ObjectId) {
        // Tokens are checked against the wall clock, so the fixture lives at "now".
        let now = Utc::now();
        let earning_id = ObjectId::new();
        let store = Arc::new(MemoryStore::new());
        store
            .seed(
                USERS_COLLECTION,
                vec![doc! {
                    "email": "ops@cityride.ng",
                    "name": "Ops",
                    "role": "admin",
                    "password_hash": bcrypt::hash("s3cret!", 4).unwrap(),
                }],
            )
            .await;
        store
            .seed(
                TRANSACTIONS_COLLECTION,
                vec![doc! {
                    "user_id": "u-1",
                    "amount": "2500.00",
                    "type": "credit",
                    "status": "completed",
                    "created_at": bson::DateTime::from_chrono(now),
                }],
            )
            .await;
        store
            .seed(
                EARNINGS_COLLECTION,
                vec![doc! {
                    "_id": earning_id,
                    "driver_id": ObjectId::new().to_hex(),
                    "amount": "900",
                    "status": "pending",
                    "created_at": bson::DateTime::from_chrono(now),
                }],
            )
            .await;

        let clock: Arc<dyn Clock> = Arc::new(FixedClock(now));
        let session = Arc::new(SessionTimer::new(Arc::new(MemorySessionStore::new()), clock.clone()));
        let state = AppState::new(
            store.clone(),
            session,
            Arc::new(StoreAuthenticator::new(store)),
            clock,
            "test-secret",
        );
        (build_router(state), earning_id)
    }

    async fn send(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header("authorization", format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => {
                request = request.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = app.clone().oneshot(request.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    async fn login(app: &Router) -> String {
        let (status, body) = send(
            app,
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "ops@cityride.ng", "password": "s3cret!" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_is_public() {
        let (app, _) = app().await;

        let (status, body) = send(&app, "GET", "/api/health", None, None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["database"], "connected");
    }

    #[tokio::test]
    async fn admin_routes_need_a_session() {
        let (app, _) = app().await;

        let (status, body) = send(&app, "GET", "/api/admin/transactions/stats", None, None).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let (app, _) = app().await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "ops@cityride.ng", "password": "nope" })),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid credentials");
    }

    #[tokio::test]
    async fn signed_in_admin_reads_stats_pays_out_and_signs_out() {
        let (app, earning_id) = app().await;
        let token = login(&app).await;

        let (status, stats) = send(&app, "GET", "/api/admin/transactions/stats", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats["total_amount"], "2500.00");
        assert_eq!(stats["monthly_growth_percent"], "100");

        let pay = format!("/api/admin/payouts/{}/pay", earning_id.to_hex());
        let (status, _) = send(&app, "POST", &pay, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, "POST", &pay, Some(&token), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, session) = send(&app, "GET", "/api/auth/session", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(session["authenticated"], true);

        let (status, _) = send(&app, "POST", "/api/auth/logout", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, "GET", "/api/admin/payouts", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn resources_support_create_list_and_delete() {
        let (app, _) = app().await;
        let token = login(&app).await;

        let (status, created) = send(
            &app,
            "POST",
            "/api/admin/resources/ride_types",
            Some(&token),
            Some(json!({ "name": "Keke", "description": "Tricycle", "active": "true" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_str().unwrap().to_string();

        let (status, page) = send(&app, "GET", "/api/admin/resources/ride_types?search=keke", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["total_items"], 1);
        assert_eq!(page["items"][0]["name"], "Keke");

        let uri = format!("/api/admin/resources/ride_types/{}", id);
        let (status, _) = send(&app, "DELETE", &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, "DELETE", &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn user_listing_hides_password_hashes() {
        let (app, _) = app().await;
        let token = login(&app).await;

        let (status, page) = send(&app, "GET", "/api/admin/resources/users", Some(&token), None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["items"][0]["email"], "ops@cityride.ng");
        assert!(page["items"][0].get("password_hash").is_none());
    }
}
