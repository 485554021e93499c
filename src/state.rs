use std::sync::Arc;

use crate::clients::{IdentityProvider, OpenIdClient};
use crate::config::Config;
use crate::db::Store;
use crate::services::{AuthService, ProfileService, SeaOrmAuthService, SeaOrmProfileService};

/// Build the HTTP client used for direct verification with identity providers.
fn build_shared_http_client(timeout_seconds: u64) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_seconds))
        .user_agent(concat!("microblog/", env!("CARGO_PKG_VERSION")))
        .pool_max_idle_per_host(10)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build shared HTTP client: {e}"))
}

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<Config>,

    pub store: Store,

    pub identity: Arc<dyn IdentityProvider>,

    pub auth_service: Arc<dyn AuthService>,

    pub profile_service: Arc<dyn ProfileService>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let http_client = build_shared_http_client(config.openid.request_timeout_seconds)?;
        let identity = Arc::new(OpenIdClient::with_shared_client(
            http_client,
            config.login_return_url()?,
        )) as Arc<dyn IdentityProvider>;

        Self::with_identity_provider(config, identity).await
    }

    /// Same as [`SharedState::new`] with a caller-supplied identity provider.
    pub async fn with_identity_provider(
        config: Config,
        identity: Arc<dyn IdentityProvider>,
    ) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let auth_service = Arc::new(SeaOrmAuthService::new(store.clone())) as Arc<dyn AuthService>;
        let profile_service =
            Arc::new(SeaOrmProfileService::new(store.clone())) as Arc<dyn ProfileService>;

        Ok(Self {
            config: Arc::new(config),
            store,
            identity,
            auth_service,
            profile_service,
        })
    }
}
