use axum::{Router, middleware, routing::get};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, SessionManagerLayer, cookie::SameSite};
use tower_sessions_sqlx_store::SqliteStore;

use crate::clients::IdentityProvider;
use crate::config::Config;
use crate::db::Store;
use crate::services::{AuthService, ProfileService};
use crate::state::SharedState;

pub mod auth;
mod error;
pub mod flash;
mod observability;
mod pages;
mod types;
mod validation;

pub use error::ApiError;
pub use types::*;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    /// Sessions live in the application database.
    pub session_store: SqliteStore,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &Store {
        &self.shared.store
    }

    #[must_use]
    pub fn identity(&self) -> &Arc<dyn IdentityProvider> {
        &self.shared.identity
    }

    #[must_use]
    pub fn auth_service(&self) -> &Arc<dyn AuthService> {
        &self.shared.auth_service
    }

    #[must_use]
    pub fn profile_service(&self) -> &Arc<dyn ProfileService> {
        &self.shared.profile_service
    }
}

pub async fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let pool = shared.store.conn.get_sqlite_connection_pool().clone();
    let session_store = SqliteStore::new(pool);
    session_store
        .migrate()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to prepare session table: {e}"))?;

    Ok(Arc::new(AppState {
        shared,
        session_store,
        prometheus_handle,
    }))
}

pub async fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config).await?);
    create_app_state(shared, prometheus_handle).await
}

/// Builds state around a caller-supplied identity provider instead of OpenID.
pub async fn create_app_state_with_identity(
    config: Config,
    identity: Arc<dyn IdentityProvider>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::with_identity_provider(config, identity).await?);
    create_app_state(shared, None).await
}

pub fn router(state: Arc<AppState>) -> Router {
    let server = &state.config().server;
    let session_layer = SessionManagerLayer::new(state.session_store.clone())
        .with_secure(server.secure_cookies)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(
            server.session_inactivity_minutes,
        )));

    Router::new()
        .merge(create_protected_router())
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/login/complete", get(auth::complete_login))
        .route("/logout", get(auth::logout))
        .route("/flashes", get(flash::get_flashes))
        .route("/metrics", get(observability::get_metrics))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::load_current_user,
        ))
        .layer(session_layer)
        .layer(middleware::from_fn(observability::security_headers_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::logging_middleware))
        .with_state(state)
}

fn create_protected_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(pages::index))
        .route("/index", get(pages::index))
        .route("/user/{nickname}", get(pages::user_page))
        .route("/edit", get(pages::edit_form).post(pages::edit_profile))
        .route_layer(middleware::from_fn(auth::require_login))
}
