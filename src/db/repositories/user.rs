use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, Set, SqlErr, TransactionTrait,
};
use sea_orm::sea_query::Expr;
use serde::Serialize;
use md5::{Digest, Md5};
use thiserror::Error;
use tracing::{debug, warn};

use crate::constants::user::{MAX_NICKNAME_SUFFIX, MAX_PROVISION_ATTEMPTS, NICKNAME_MAX_LEN};
use crate::domain::UserId;
use crate::domain::nickname::{truncate_chars, with_suffix};
use crate::entities::users;

/// User data returned from the repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    pub nickname: String,
    pub email: String,
    pub about_me: Option<String>,
    pub last_seen: Option<String>,
    pub created_at: String,
}

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: UserId::new(model.id),
            nickname: model.nickname,
            email: model.email,
            about_me: model.about_me,
            last_seen: model.last_seen,
            created_at: model.created_at,
        }
    }
}

impl User {
    /// Gravatar URL for this user's email at the given pixel size.
    #[must_use]
    pub fn avatar(&self, size: u32) -> String {
        let digest = Md5::digest(self.email.trim().to_lowercase().as_bytes());
        format!(
            "https://www.gravatar.com/avatar/{}?d=mm&s={size}",
            hex::encode(digest)
        )
    }
}

/// Write outcomes the callers are expected to branch on.
#[derive(Debug, Error)]
pub enum UserStoreError {
    #[error("Nickname '{0}' is already in use")]
    NicknameTaken(String),

    #[error("Email '{0}' is already registered")]
    EmailTaken(String),

    #[error("No free nickname could be derived from '{0}'")]
    NicknameExhausted(String),

    #[error("User {0} not found")]
    NotFound(UserId),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// Maps unique-constraint violations onto the column that caused them.
fn classify_write_error(err: DbErr, nickname: &str, email: &str) -> UserStoreError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) if detail.contains("email") => {
            UserStoreError::EmailTaken(email.to_string())
        }
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            UserStoreError::NicknameTaken(nickname.to_string())
        }
        _ => UserStoreError::Database(err),
    }
}

pub async fn nickname_exists<C: ConnectionTrait>(conn: &C, nickname: &str) -> Result<bool, DbErr> {
    let count = users::Entity::find()
        .filter(users::Column::Nickname.eq(nickname))
        .count(conn)
        .await?;

    Ok(count > 0)
}

/// Returns `base` if it is free, otherwise the first free `base2`, `base3`, ...
///
/// The probe is only advisory: a concurrent writer can still claim the result before it
/// is inserted, which the unique constraint on `users.nickname` catches.
pub async fn make_unique_nickname<C: ConnectionTrait>(
    conn: &C,
    base: &str,
) -> Result<String, UserStoreError> {
    let base = truncate_chars(base, NICKNAME_MAX_LEN);

    if !nickname_exists(conn, &base).await? {
        return Ok(base);
    }

    for suffix in 2..=MAX_NICKNAME_SUFFIX {
        let candidate = with_suffix(&base, suffix);
        if !nickname_exists(conn, &candidate).await? {
            debug!(base = %base, nickname = %candidate, "Resolved nickname collision");
            return Ok(candidate);
        }
    }

    Err(UserStoreError::NicknameExhausted(base))
}

pub async fn insert_user<C: ConnectionTrait>(
    conn: &C,
    nickname: &str,
    email: &str,
) -> Result<User, UserStoreError> {
    let active = users::ActiveModel {
        nickname: Set(nickname.to_string()),
        email: Set(email.to_string()),
        about_me: Set(None),
        last_seen: Set(None),
        created_at: Set(chrono::Utc::now().to_rfc3339()),
        ..Default::default()
    };

    let model = active
        .insert(conn)
        .await
        .map_err(|e| classify_write_error(e, nickname, email))?;

    Ok(User::from(model))
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>> {
        let user = users::Entity::find_by_id(id.value())
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")?;

        Ok(user.map(User::from))
    }

    /// Get user by exact email match
    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.conn)
            .await
            .context("Failed to query user by email")?;

        Ok(user.map(User::from))
    }

    pub async fn get_by_nickname(&self, nickname: &str) -> Result<Option<User>> {
        let user = users::Entity::find()
            .filter(users::Column::Nickname.eq(nickname))
            .one(&self.conn)
            .await
            .context("Failed to query user by nickname")?;

        Ok(user.map(User::from))
    }

    pub async fn nickname_exists(&self, nickname: &str) -> Result<bool> {
        nickname_exists(&self.conn, nickname)
            .await
            .context("Failed to check nickname")
    }

    pub async fn make_unique_nickname(&self, base: &str) -> Result<String, UserStoreError> {
        make_unique_nickname(&self.conn, base).await
    }

    /// Inserts a user with exactly this nickname; collisions are reported, not resolved.
    pub async fn create(&self, nickname: &str, email: &str) -> Result<User, UserStoreError> {
        insert_user(&self.conn, nickname, email).await
    }

    /// Creates a user whose nickname is derived from `base`, re-probing whenever a
    /// concurrent request claims the probed nickname first.
    ///
    /// Probe and insert run outside a transaction: a racing insert must wait on the
    /// busy timeout and then fail on the unique constraint, never on a lock upgrade.
    pub async fn create_with_unique_nickname(
        &self,
        base: &str,
        email: &str,
    ) -> Result<User, UserStoreError> {
        for attempt in 1..=MAX_PROVISION_ATTEMPTS {
            let nickname = make_unique_nickname(&self.conn, base).await?;

            match insert_user(&self.conn, &nickname, email).await {
                Ok(user) => return Ok(user),
                Err(UserStoreError::NicknameTaken(nickname)) => {
                    warn!(attempt, nickname = %nickname, "Nickname claimed concurrently, retrying");
                }
                Err(e) => return Err(e),
            }
        }

        Err(UserStoreError::NicknameExhausted(base.to_string()))
    }

    /// Stamp `last_seen` with the current time
    pub async fn touch_last_seen(&self, id: UserId) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();

        users::Entity::update_many()
            .col_expr(
                users::Column::LastSeen,
                Expr::value(now),
            )
            .filter(users::Column::Id.eq(id.value()))
            .exec(&self.conn)
            .await
            .context("Failed to update last_seen")?;

        Ok(())
    }

    /// Rename and/or rewrite the bio in one transaction.
    ///
    /// Keeping the current nickname is always allowed; taking another user's is not.
    pub async fn update_profile(
        &self,
        id: UserId,
        nickname: &str,
        about_me: Option<&str>,
    ) -> Result<User, UserStoreError> {
        let txn = self.conn.begin().await?;

        match Self::update_profile_in(&txn, id, nickname, about_me).await {
            Ok(user) => {
                txn.commit()
                    .await
                    .map_err(|e| classify_write_error(e, nickname, &user.email))?;
                Ok(user)
            }
            Err(e) => {
                txn.rollback().await?;
                Err(e)
            }
        }
    }

    /// Writes before reading, so the transaction takes the write lock up front and a
    /// concurrent rename shows up as a unique violation.
    async fn update_profile_in<C: ConnectionTrait>(
        conn: &C,
        id: UserId,
        nickname: &str,
        about_me: Option<&str>,
    ) -> Result<User, UserStoreError> {
        let result = users::Entity::update_many()
            .col_expr(users::Column::Nickname, Expr::value(nickname))
            .col_expr(users::Column::AboutMe, Expr::value(about_me.map(str::to_string)))
            .filter(users::Column::Id.eq(id.value()))
            .exec(conn)
            .await
            .map_err(|e| match e.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => {
                    UserStoreError::NicknameTaken(nickname.to_string())
                }
                _ => UserStoreError::Database(e),
            })?;

        if result.rows_affected == 0 {
            return Err(UserStoreError::NotFound(id));
        }

        let model = users::Entity::find_by_id(id.value())
            .one(conn)
            .await?
            .ok_or(UserStoreError::NotFound(id))?;

        Ok(User::from(model))
    }
}
