//! Domain service for viewing and editing user profiles.

use serde::Deserialize;
use thiserror::Error;

use crate::db::{User, UserStoreError};

/// Errors specific to profile operations.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("User {0} not found.")]
    NotFound(String),

    /// A single form field failed validation.
    #[error("{field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("Nickname '{0}' is already in use")]
    NicknameTaken(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProfileError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }
}

impl From<sea_orm::DbErr> for ProfileError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for ProfileError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<UserStoreError> for ProfileError {
    fn from(err: UserStoreError) -> Self {
        match err {
            UserStoreError::NicknameTaken(nickname) => Self::NicknameTaken(nickname),
            UserStoreError::NotFound(id) => Self::NotFound(id.to_string()),
            UserStoreError::Database(e) => Self::Database(e.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

/// Fields submitted by the edit-profile form.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileUpdate {
    pub nickname: String,
    #[serde(default)]
    pub about_me: Option<String>,
}

/// Domain service trait for profiles.
#[async_trait::async_trait]
pub trait ProfileService: Send + Sync {
    /// Looks up a profile by its nickname.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::NotFound`] when nobody uses that nickname.
    async fn get_profile(&self, nickname: &str) -> Result<User, ProfileError>;

    /// Applies an edit to `current`'s own profile.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::Validation`] or [`ProfileError::NicknameTaken`] without
    /// changing anything.
    async fn update_profile(
        &self,
        current: &User,
        update: ProfileUpdate,
    ) -> Result<User, ProfileError>;
}
