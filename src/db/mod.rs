use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::domain::UserId;

pub mod migrator;
pub mod repositories;

pub use repositories::user::{User, UserStoreError};

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        let in_memory = db_url.contains(":memory:");

        if !in_memory {
            let path_str = db_url.trim_start_matches("sqlite:").trim_start_matches("//");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        // Every pooled connection to an in-memory database sees its own empty database.
        let (max_connections, min_connections) = if in_memory {
            (1, 1)
        } else {
            (max_connections, min_connections)
        };

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .sqlx_logging(false);

        if !in_memory {
            opt.idle_timeout(Duration::from_secs(300))
                .max_lifetime(Duration::from_secs(600));
        }

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    // ========== User Repository Methods ==========

    #[must_use]
    pub fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    pub async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.user_repo().get_by_email(email).await
    }

    pub async fn get_user_by_nickname(&self, nickname: &str) -> Result<Option<User>> {
        self.user_repo().get_by_nickname(nickname).await
    }

    pub async fn nickname_exists(&self, nickname: &str) -> Result<bool> {
        self.user_repo().nickname_exists(nickname).await
    }

    pub async fn make_unique_nickname(&self, base: &str) -> Result<String, UserStoreError> {
        self.user_repo().make_unique_nickname(base).await
    }

    pub async fn create_user(&self, nickname: &str, email: &str) -> Result<User, UserStoreError> {
        self.user_repo().create(nickname, email).await
    }

    pub async fn create_user_with_unique_nickname(
        &self,
        base: &str,
        email: &str,
    ) -> Result<User, UserStoreError> {
        self.user_repo()
            .create_with_unique_nickname(base, email)
            .await
    }

    pub async fn touch_user_last_seen(&self, id: UserId) -> Result<()> {
        self.user_repo().touch_last_seen(id).await
    }

    pub async fn update_user_profile(
        &self,
        id: UserId,
        nickname: &str,
        about_me: Option<&str>,
    ) -> Result<User, UserStoreError> {
        self.user_repo()
            .update_profile(id, nickname, about_me)
            .await
    }
}
