//! Domain service for federated login and per-request user resolution.
//!
//! The web layer calls these at fixed points instead of registering framework hooks:
//! [`AuthService::load_user`] when a session carries a user id,
//! [`AuthService::record_visit`] once per authenticated request, and
//! [`AuthService::complete_login`] after the identity provider vouched for someone.

use serde::Serialize;
use thiserror::Error;

use crate::db::{User, UserStoreError};
use crate::domain::{IdentityResponse, UserId};

/// Errors specific to authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Identity provider did not supply a usable email")]
    InvalidIdentity,

    #[error("No free nickname could be derived from '{0}'")]
    NicknameExhausted(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<UserStoreError> for AuthError {
    fn from(err: UserStoreError) -> Self {
        match err {
            UserStoreError::NicknameExhausted(base) => Self::NicknameExhausted(base),
            UserStoreError::Database(e) => Self::Database(e.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

/// Result of a completed login.
#[derive(Debug, Clone, Serialize)]
pub struct LoginOutcome {
    pub user: User,
    /// Whether this login provisioned the account.
    pub created: bool,
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Resolves the user id stored in a session.
    async fn load_user(&self, id: UserId) -> Result<Option<User>, AuthError>;

    /// Records that the user made a request just now.
    async fn record_visit(&self, id: UserId) -> Result<(), AuthError>;

    /// Finds the account matching a verified identity, creating it on first login.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidIdentity`] if the response carries no email; nothing is
    /// written in that case.
    async fn complete_login(&self, identity: &IdentityResponse)
    -> Result<LoginOutcome, AuthError>;
}
