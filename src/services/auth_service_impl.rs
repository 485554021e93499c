//! `SeaORM` implementation of the `AuthService` trait.

use crate::db::{Store, User, UserStoreError};
use crate::domain::nickname::base_nickname;
use crate::domain::{IdentityResponse, UserId};
use crate::services::auth_service::{AuthError, AuthService, LoginOutcome};
use async_trait::async_trait;
use tracing::{info, warn};

pub struct SeaOrmAuthService {
    store: Store,
}

impl SeaOrmAuthService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn load_user(&self, id: UserId) -> Result<Option<User>, AuthError> {
        Ok(self.store.get_user(id).await?)
    }

    async fn record_visit(&self, id: UserId) -> Result<(), AuthError> {
        self.store.touch_user_last_seen(id).await?;
        Ok(())
    }

    async fn complete_login(
        &self,
        identity: &IdentityResponse,
    ) -> Result<LoginOutcome, AuthError> {
        let Some(email) = identity.verified_email() else {
            warn!("Identity response without email rejected");
            return Err(AuthError::InvalidIdentity);
        };

        if let Some(user) = self.store.get_user_by_email(email).await? {
            info!(user_id = %user.id, nickname = %user.nickname, "Returning user logged in");
            return Ok(LoginOutcome {
                user,
                created: false,
            });
        }

        let base = base_nickname(identity.nickname.as_deref(), email);

        match self
            .store
            .create_user_with_unique_nickname(&base, email)
            .await
        {
            Ok(user) => {
                info!(user_id = %user.id, nickname = %user.nickname, "New account created");
                Ok(LoginOutcome {
                    user,
                    created: true,
                })
            }
            // A parallel first login for the same identity won the insert.
            Err(UserStoreError::EmailTaken(_)) => {
                let user = self
                    .store
                    .get_user_by_email(email)
                    .await?
                    .ok_or_else(|| AuthError::Internal(format!("User {email} vanished")))?;
                Ok(LoginOutcome {
                    user,
                    created: false,
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}
