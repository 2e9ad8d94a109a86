use std::sync::Arc;

use async_trait::async_trait;
use mongodb::bson;

use crate::errors::{AppError, Result};
use crate::models::session::SessionUser;
use crate::models::user::{User, USERS_COLLECTION};
use crate::store::{DataStore, Filter, StoreQuery};

pub const ADMIN_ROLE: &str = "admin";

/// Credentials in, identity out.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, email: &str, password: &str) -> Result<SessionUser>;
}

/// Checks admin accounts kept in the `users` collection.
pub struct StoreAuthenticator {
    store: Arc<dyn DataStore>,
}

impl StoreAuthenticator {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        StoreAuthenticator { store }
    }
}

#[async_trait]
impl Authenticator for StoreAuthenticator {
    async fn authenticate(&self, email: &str, password: &str) -> Result<SessionUser> {
        let email = email.trim().to_lowercase();
        let query = StoreQuery::new().filter(Filter::eq("email", email.as_str())).limit(1);
        let document = self
            .store
            .query(USERS_COLLECTION, &query)
            .await?
            .into_iter()
            .next()
            .ok_or(AppError::InvalidCredentials)?;

        let user: User = bson::from_document(document)
            .map_err(|e| AppError::data_unavailable(format!("malformed user record: {}", e)))?;

        if user.role != ADMIN_ROLE {
            tracing::warn!("🚫 Non-admin sign-in attempt for {}", email);
            return Err(AppError::InvalidCredentials);
        }

        let valid = bcrypt::verify(password, &user.password_hash).map_err(|e| {
            tracing::warn!("Unusable password hash for {}: {}", email, e);
            AppError::InvalidCredentials
        })?;
        if !valid {
            return Err(AppError::InvalidCredentials);
        }

        Ok(SessionUser {
            id: user._id.map(|id| id.to_hex()).unwrap_or_default(),
            email: user.email,
            name: user.name,
            role: user.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use mongodb::bson::doc;
    use rstest::rstest;

    async fn seeded() -> StoreAuthenticator {
        let store = Arc::new(MemoryStore::new());
        store
            .seed(
                USERS_COLLECTION,
                vec![
                    doc! {
                        "email": "ops@cityride.ng",
                        "name": "Ops",
                        "role": "admin",
                        "password_hash": bcrypt::hash("s3cret!", 4).unwrap(),
                    },
                    doc! {
                        "email": "rider@cityride.ng",
                        "role": "rider",
                        "password_hash": bcrypt::hash("s3cret!", 4).unwrap(),
                    },
                ],
            )
            .await;
        StoreAuthenticator::new(store)
    }

    #[tokio::test]
    async fn admin_with_the_right_password_signs_in() {
        let user = seeded().await.authenticate(" OPS@cityride.ng ", "s3cret!").await.unwrap();

        assert_eq!(user.email, "ops@cityride.ng");
        assert_eq!(user.role, "admin");
        assert_eq!(user.id.len(), 24);
    }

    #[rstest]
    #[case("ops@cityride.ng", "wrong")]
    #[case("nobody@cityride.ng", "s3cret!")]
    #[case("rider@cityride.ng", "s3cret!")]
    #[tokio::test]
    async fn everything_else_is_invalid_credentials(#[case] email: &str, #[case] password: &str) {
        let result = seeded().await.authenticate(email, password).await;

        assert!(matches!(result, Err(AppError::InvalidCredentials)));
    }
}
