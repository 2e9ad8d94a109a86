//! Owns the console's signed-in session: issue, persist, reload, expire.

use std::sync::Arc;
use std::time::Duration;

use mockable::Clock;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::errors::{AppError, Result};
use crate::models::session::{Session, SessionState, SessionUser};
use crate::services::session_store::SessionStore;

pub const SESSION_KEY: &str = "admin_session";

/// Upper bound on the scheduled expiry check period.
pub const MAX_CHECK_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryCheck {
    SignedOut,
    Active,
    Expired,
}

pub struct SessionTimer {
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    state: RwLock<SessionState>,
}

impl SessionTimer {
    pub fn new(store: Arc<dyn SessionStore>, clock: Arc<dyn Clock>) -> Self {
        SessionTimer {
            store,
            clock,
            state: RwLock::new(SessionState::Unauthenticated),
        }
    }

    /// Build a timer from whatever the store holds. Never fails: an expired,
    /// unreadable or unreachable record leaves the console signed out.
    pub async fn restore(store: Arc<dyn SessionStore>, clock: Arc<dyn Clock>) -> Self {
        let timer = SessionTimer::new(store, clock);
        let restored = timer.load_persisted().await;
        *timer.state.write().await = match restored {
            Some(session) => {
                tracing::info!("🔑 Restored session for {} (expires {})", session.user.email, session.expires_at);
                SessionState::Authenticated(session)
            }
            None => SessionState::Unauthenticated,
        };
        timer
    }

    async fn load_persisted(&self) -> Option<Session> {
        let raw = match self.store.get(SESSION_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e @ AppError::CorruptSessionData(_)) => {
                tracing::warn!("⚠️ {}", e);
                self.purge().await;
                return None;
            }
            Err(e) => {
                tracing::warn!("⚠️ Session store unreadable, starting signed out: {}", e);
                return None;
            }
        };

        match serde_json::from_str::<Session>(&raw) {
            Ok(session) if session.is_expired_at(self.clock.utc()) => {
                tracing::info!("⌛ Stored session for {} has expired", session.user.email);
                self.purge().await;
                None
            }
            Ok(session) => Some(session),
            Err(e) => {
                tracing::warn!("⚠️ {}", AppError::CorruptSessionData(e.to_string()));
                self.purge().await;
                None
            }
        }
    }

    async fn purge(&self) {
        if let Err(e) = self.store.remove(SESSION_KEY).await {
            tracing::error!("❌ Failed to purge stored session: {}", e);
        }
    }

    /// Start a fresh 24h session for `user`, replacing any current one.
    pub async fn login(&self, user: SessionUser) -> Result<Session> {
        let session = Session::issue(user, self.clock.utc());
        let raw = serde_json::to_string(&session)
            .map_err(|e| AppError::session_store(format!("encode session: {}", e)))?;

        let mut state = self.state.write().await;
        self.store.set(SESSION_KEY, raw).await?;
        *state = SessionState::Authenticated(session.clone());

        tracing::info!("✅ {} signed in until {}", session.user.email, session.expires_at);
        Ok(session)
    }

    pub async fn logout(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if let SessionState::Authenticated(session) = &*state {
            tracing::info!("👋 {} signed out", session.user.email);
        }
        *state = SessionState::Unauthenticated;
        self.store.remove(SESSION_KEY).await
    }

    pub async fn current(&self) -> SessionState {
        self.state.read().await.clone()
    }

    /// The live session, or why there is none. An elapsed session is expired
    /// on the spot rather than waiting for the next scheduled check.
    pub async fn authorize(&self) -> Result<Session> {
        let session = match &*self.state.read().await {
            SessionState::Unauthenticated => return Err(AppError::Unauthorized),
            SessionState::Authenticated(session) => session.clone(),
        };

        if session.is_expired_at(self.clock.utc()) {
            self.expire(session.id).await;
            return Err(AppError::SessionExpired);
        }
        Ok(session)
    }

    pub async fn check_expiry(&self) -> ExpiryCheck {
        match self.authorize().await {
            Ok(_) => ExpiryCheck::Active,
            Err(AppError::SessionExpired) => ExpiryCheck::Expired,
            Err(_) => ExpiryCheck::SignedOut,
        }
    }

    async fn expire(&self, session_id: uuid::Uuid) {
        let mut state = self.state.write().await;
        // A login may have replaced the session since it was read.
        let still_current = matches!(&*state, SessionState::Authenticated(session) if session.id == session_id);
        if !still_current {
            return;
        }
        *state = SessionState::Unauthenticated;
        tracing::info!("⌛ Session expired, signing out");
        self.purge().await;
    }

    /// Periodically force expiry. `every` is clamped to at most one minute.
    pub fn spawn_expiry_task(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        let period = every.clamp(Duration::from_secs(1), MAX_CHECK_INTERVAL);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if self.check_expiry().await == ExpiryCheck::Expired {
                    tracing::debug!("scheduled check expired the session");
                }
            }
        })
    }
}
