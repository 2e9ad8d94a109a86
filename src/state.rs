use std::sync::Arc;

use mockable::Clock;

use crate::services::authenticator::Authenticator;
use crate::services::session_timer::SessionTimer;
use crate::store::DataStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DataStore>,
    pub session: Arc<SessionTimer>,
    pub authenticator: Arc<dyn Authenticator>,
    pub clock: Arc<dyn Clock>,
    pub jwt_secret: String,
}

impl AppState {
    pub fn new(
        store: Arc<dyn DataStore>,
        session: Arc<SessionTimer>,
        authenticator: Arc<dyn Authenticator>,
        clock: Arc<dyn Clock>,
        jwt_secret: impl Into<String>,
    ) -> Self {
        AppState {
            store,
            session,
            authenticator,
            clock,
            jwt_secret: jwt_secret.into(),
        }
    }
}
