use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const SESSION_TTL_HOURS: i64 = 24;

pub fn session_ttl() -> TimeDelta {
    TimeDelta::hours(SESSION_TTL_HOURS)
}

/// Identity handed over by the authentication check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub user: SessionUser,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn issue(user: SessionUser, now: DateTime<Utc>) -> Self {
        Session {
            id: Uuid::new_v4(),
            user,
            issued_at: now,
            expires_at: now + session_ttl(),
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated(Session),
}

impl SessionState {
    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionState::Unauthenticated => None,
            SessionState::Authenticated(session) => Some(session),
        }
    }
}
