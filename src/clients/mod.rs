pub mod openid;

pub use openid::OpenIdClient;

use std::collections::HashMap;
use thiserror::Error;
use url::Url;

use crate::domain::IdentityResponse;

/// Profile attributes an identity provider can be asked to release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    Nickname,
    Email,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Invalid identity URL: {0}")]
    InvalidUrl(String),

    #[error("Login was cancelled at the provider")]
    Cancelled,

    #[error("Malformed provider response: {0}")]
    Malformed(String),

    #[error("Provider rejected the assertion")]
    Rejected,

    #[error("Provider request failed: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for IdentityError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Federated identity handshake.
///
/// `begin` produces the URL the browser is sent to; the provider later redirects the
/// browser to `return_to`, whose query parameters are handed to `complete` together with
/// the endpoint recorded when the login started. Assertions from any other endpoint are
/// refused.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    fn begin(
        &self,
        identity_url: &str,
        ask_for: &[Attribute],
        return_to: &Url,
    ) -> Result<Url, IdentityError>;

    async fn complete(
        &self,
        params: &HashMap<String, String>,
        endpoint: &Url,
    ) -> Result<IdentityResponse, IdentityError>;
}

/// The provider endpoint behind a URL returned by [`IdentityProvider::begin`].
#[must_use]
pub fn endpoint_of(url: &Url) -> Url {
    let mut endpoint = url.clone();
    endpoint.set_query(None);
    endpoint.set_fragment(None);
    endpoint
}
