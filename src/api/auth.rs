use axum::{
    Form, Json,
    extract::{FromRequestParts, Query, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use tower_sessions::{Expiry, Session};
use url::Url;

use super::flash::flash;
use super::validation::{safe_next, validate_openid};
use super::{ApiError, ApiResponse, AppState, LoginPageDto};
use crate::clients::{Attribute, endpoint_of};
use crate::constants::{messages, routes, session as keys};
use crate::db::User;
use crate::domain::UserId;
use crate::services::AuthError;

// ============================================================================
// Request extractors
// ============================================================================

/// The authenticated user for this request, resolved by [`load_current_user`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))
    }
}

/// Like [`CurrentUser`] but for routes that anonymous visitors may reach.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

impl<S: Send + Sync> FromRequestParts<S> for MaybeUser {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<CurrentUser>().map(|u| u.0.clone())))
    }
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct LoginQuery {
    pub next: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub openid: String,
    #[serde(default, deserialize_with = "checkbox")]
    pub remember_me: bool,
    pub next: Option<String>,
}

/// HTML checkboxes submit a value only when ticked, and that value varies.
fn checkbox<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.is_some_and(|v| {
        matches!(
            v.to_ascii_lowercase().as_str(),
            "y" | "yes" | "on" | "true" | "1"
        )
    }))
}

// ============================================================================
// Middleware
// ============================================================================

/// Resolves the session's user and stamps `last_seen` once per request.
pub async fn load_current_user(
    State(state): State<Arc<AppState>>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(id) = session.get::<UserId>(keys::USER_ID).await? {
        // Stamp first so handlers see this visit in `last_seen`.
        state.auth_service().record_visit(id).await?;

        match state.auth_service().load_user(id).await? {
            Some(user) => {
                tracing::Span::current().record("user_id", user.id.value());
                request.extensions_mut().insert(CurrentUser(user));
            }
            None => {
                tracing::warn!(user_id = %id, "Session refers to a missing user, clearing it");
                session.remove::<UserId>(keys::USER_ID).await?;
            }
        }
    }

    Ok(next.run(request).await)
}

/// Sends anonymous visitors to the login page, remembering where they were going.
pub async fn require_login(request: Request, next: Next) -> Response {
    if request.extensions().get::<CurrentUser>().is_some() {
        return next.run(request).await;
    }

    let wanted = request
        .uri()
        .path_and_query()
        .map_or("/", |pq| pq.as_str());
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("next", wanted)
        .finish();

    Redirect::to(&format!("{}?{query}", routes::LOGIN)).into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /login
/// Lists the configured identity providers
pub async fn login_page(
    State(state): State<Arc<AppState>>,
    MaybeUser(user): MaybeUser,
    Query(query): Query<LoginQuery>,
) -> Response {
    if user.is_some() {
        return Redirect::to(routes::INDEX).into_response();
    }

    Json(ApiResponse::success(LoginPageDto {
        providers: state.config().openid.providers.clone(),
        next: query.next.as_deref().and_then(safe_next).map(str::to_string),
    }))
    .into_response()
}

/// POST /login
/// Starts the identity handshake by redirecting to the provider
pub async fn login(
    State(state): State<Arc<AppState>>,
    session: Session,
    MaybeUser(user): MaybeUser,
    Form(form): Form<LoginForm>,
) -> Result<Response, ApiError> {
    if user.is_some() {
        return Ok(Redirect::to(routes::INDEX).into_response());
    }

    let openid = validate_openid(&form.openid)?;
    let return_to = state.config().login_return_url()?;
    let provider_url = state.identity().begin(
        openid,
        &[Attribute::Nickname, Attribute::Email],
        &return_to,
    )?;

    session
        .insert(keys::ENDPOINT, endpoint_of(&provider_url).as_str())
        .await?;
    session.insert(keys::REMEMBER_ME, form.remember_me).await?;
    match form.next.as_deref().and_then(safe_next) {
        Some(next) => session.insert(keys::NEXT, next).await?,
        None => {
            session.remove::<String>(keys::NEXT).await?;
        }
    }

    tracing::info!(provider = %provider_url.host_str().unwrap_or_default(), "Login requested");

    Ok(Redirect::to(provider_url.as_str()).into_response())
}

/// GET /login/complete
/// Provider callback: verify, find or create the account, then sign in
pub async fn complete_login(
    State(state): State<Arc<AppState>>,
    session: Session,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    // The pending login is consumed whatever the outcome.
    let endpoint = session.remove::<String>(keys::ENDPOINT).await?;
    let remember_me = session
        .remove::<bool>(keys::REMEMBER_ME)
        .await?
        .unwrap_or(false);
    let next = session.remove::<String>(keys::NEXT).await?;

    let Some(endpoint) = endpoint.as_deref().and_then(|e| Url::parse(e).ok()) else {
        tracing::warn!("Login callback without a pending login");
        return reject_login(&session).await;
    };

    let identity = match state.identity().complete(&params, &endpoint).await {
        Ok(identity) => identity,
        Err(e) => {
            tracing::warn!(error = %e, "Identity verification failed");
            return reject_login(&session).await;
        }
    };

    let outcome = match state.auth_service().complete_login(&identity).await {
        Ok(outcome) => outcome,
        Err(AuthError::InvalidIdentity) => return reject_login(&session).await,
        Err(e) => return Err(e.into()),
    };

    session.cycle_id().await?;
    session.insert(keys::USER_ID, outcome.user.id).await?;

    let server = &state.config().server;
    session.set_expiry(Some(if remember_me {
        Expiry::OnInactivity(time::Duration::days(server.remember_me_days))
    } else {
        Expiry::OnSessionEnd
    }));

    tracing::info!(
        user_id = %outcome.user.id,
        nickname = %outcome.user.nickname,
        created = outcome.created,
        remember_me,
        "User logged in"
    );

    let target = next
        .as_deref()
        .and_then(safe_next)
        .unwrap_or(routes::INDEX)
        .to_string();

    Ok(Redirect::to(&target).into_response())
}

async fn reject_login(session: &Session) -> Result<Response, ApiError> {
    flash(session, messages::INVALID_LOGIN).await?;
    Ok(Redirect::to(routes::LOGIN).into_response())
}

/// GET /logout
/// Invalidate the current session
pub async fn logout(session: Session) -> Result<Redirect, ApiError> {
    session.flush().await?;
    Ok(Redirect::to(routes::INDEX))
}
