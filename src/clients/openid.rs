//! OpenID 2.0 relying-party subset: `checkid_setup` requests and direct verification.
//!
//! Discovery is not performed; the identity URL is used as the provider endpoint.
//! Attributes are requested through both Simple Registration and Attribute Exchange,
//! since providers tend to support only one of them.

use reqwest::Client;
use std::collections::HashMap;
use tracing::{debug, warn};
use url::Url;

use super::{Attribute, IdentityError, IdentityProvider, endpoint_of};
use crate::domain::IdentityResponse;

const OPENID_NS: &str = "http://specs.openid.net/auth/2.0";
const IDENTIFIER_SELECT: &str = "http://specs.openid.net/auth/2.0/identifier_select";
const SREG_NS: &str = "http://openid.net/extensions/sreg/1.1";
const AX_NS: &str = "http://openid.net/srv/ax/1.0";

const fn sreg_name(attr: Attribute) -> &'static str {
    match attr {
        Attribute::Nickname => "nickname",
        Attribute::Email => "email",
    }
}

const fn ax_type(attr: Attribute) -> &'static str {
    match attr {
        Attribute::Nickname => "http://axschema.org/namePerson/friendly",
        Attribute::Email => "http://axschema.org/contact/email",
    }
}

#[derive(Clone)]
pub struct OpenIdClient {
    client: Client,
    return_to: Url,
}

impl OpenIdClient {
    /// `return_to` is where providers must send the browser back to; assertions
    /// addressed anywhere else are refused.
    #[must_use]
    pub const fn with_shared_client(client: Client, return_to: Url) -> Self {
        Self { client, return_to }
    }

    /// Direct verification against the endpoint the login was started with.
    async fn verify(
        &self,
        params: &HashMap<String, String>,
        endpoint: &Url,
    ) -> Result<(), IdentityError> {
        let claimed = params
            .get("openid.op_endpoint")
            .ok_or_else(|| IdentityError::Malformed("missing openid.op_endpoint".to_string()))?;
        let claimed = Url::parse(claimed)
            .map_err(|e| IdentityError::Malformed(format!("bad op_endpoint: {e}")))?;

        if endpoint_of(&claimed) != endpoint_of(endpoint) {
            warn!(claimed = %claimed, expected = %endpoint, "Assertion from unexpected endpoint");
            return Err(IdentityError::Rejected);
        }

        let mut form: Vec<(&str, &str)> = params
            .iter()
            .filter(|(k, _)| k.starts_with("openid.") && k.as_str() != "openid.mode")
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        form.push(("openid.mode", "check_authentication"));

        debug!(endpoint = %endpoint, "Verifying assertion with provider");

        let body = self
            .client
            .post(endpoint.clone())
            .form(&form)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let fields = parse_key_value(&body);
        if fields.get("is_valid").map(String::as_str) == Some("true") {
            Ok(())
        } else {
            warn!("Provider did not confirm assertion");
            Err(IdentityError::Rejected)
        }
    }
}

#[async_trait::async_trait]
impl IdentityProvider for OpenIdClient {
    fn begin(
        &self,
        identity_url: &str,
        ask_for: &[Attribute],
        return_to: &Url,
    ) -> Result<Url, IdentityError> {
        checkid_setup_url(identity_url, ask_for, return_to)
    }

    async fn complete(
        &self,
        params: &HashMap<String, String>,
        endpoint: &Url,
    ) -> Result<IdentityResponse, IdentityError> {
        match params.get("openid.mode").map(String::as_str) {
            Some("id_res") => {}
            Some("cancel") => return Err(IdentityError::Cancelled),
            Some(other) => {
                return Err(IdentityError::Malformed(format!(
                    "unexpected openid.mode '{other}'"
                )));
            }
            None => return Err(IdentityError::Malformed("missing openid.mode".to_string())),
        }

        let return_to = params
            .get("openid.return_to")
            .ok_or_else(|| IdentityError::Malformed("missing openid.return_to".to_string()))?;
        if !return_to.starts_with(self.return_to.as_str()) {
            return Err(IdentityError::Malformed(format!(
                "assertion addressed to {return_to}"
            )));
        }

        self.verify(params, endpoint).await?;

        Ok(extract_attributes(params))
    }
}

/// Accepts bare hosts (`me.yahoo.com`) as well as full URLs.
pub fn normalize_identity_url(raw: &str) -> Result<Url, IdentityError> {
    let trimmed = raw.trim();

    if trimmed.is_empty() {
        return Err(IdentityError::InvalidUrl("identity URL is empty".to_string()));
    }

    if trimmed.contains("<username>") {
        return Err(IdentityError::InvalidUrl(
            "replace <username> with your account name".to_string(),
        ));
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let url =
        Url::parse(&candidate).map_err(|e| IdentityError::InvalidUrl(format!("{trimmed}: {e}")))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(IdentityError::InvalidUrl(format!(
            "unsupported scheme '{other}'"
        ))),
    }
}

pub fn checkid_setup_url(
    identity_url: &str,
    ask_for: &[Attribute],
    return_to: &Url,
) -> Result<Url, IdentityError> {
    let mut url = normalize_identity_url(identity_url)?;
    let realm = format!("{}/", return_to.origin().ascii_serialization());
    let required = ask_for
        .iter()
        .map(|attr| sreg_name(*attr))
        .collect::<Vec<_>>()
        .join(",");

    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("openid.ns", OPENID_NS)
            .append_pair("openid.mode", "checkid_setup")
            .append_pair("openid.claimed_id", IDENTIFIER_SELECT)
            .append_pair("openid.identity", IDENTIFIER_SELECT)
            .append_pair("openid.return_to", return_to.as_str())
            .append_pair("openid.realm", &realm);

        if !ask_for.is_empty() {
            query
                .append_pair("openid.ns.sreg", SREG_NS)
                .append_pair("openid.sreg.required", &required)
                .append_pair("openid.ns.ax", AX_NS)
                .append_pair("openid.ax.mode", "fetch_request");
            for attr in ask_for {
                query.append_pair(&format!("openid.ax.type.{}", sreg_name(*attr)), ax_type(*attr));
            }
            query.append_pair("openid.ax.required", &required);
        }
    }

    Ok(url)
}

/// Finds the alias a response declared for an extension namespace.
fn extension_alias<'a>(params: &'a HashMap<String, String>, namespace: &str) -> Option<&'a str> {
    params.iter().find_map(|(key, value)| {
        if value.as_str() == namespace {
            key.strip_prefix("openid.ns.")
        } else {
            None
        }
    })
}

fn lookup_attribute(params: &HashMap<String, String>, attr: Attribute) -> Option<String> {
    let from_sreg = extension_alias(params, SREG_NS)
        .and_then(|alias| params.get(&format!("openid.{alias}.{}", sreg_name(attr))));

    let from_ax = extension_alias(params, AX_NS).and_then(|alias| {
        let type_prefix = format!("openid.{alias}.type.");
        params.iter().find_map(|(key, value)| {
            let name = key.strip_prefix(&type_prefix)?;
            if value.as_str() == ax_type(attr) {
                params.get(&format!("openid.{alias}.value.{name}"))
            } else {
                None
            }
        })
    });

    from_sreg
        .or(from_ax)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[must_use]
pub fn extract_attributes(params: &HashMap<String, String>) -> IdentityResponse {
    IdentityResponse {
        email: lookup_attribute(params, Attribute::Email),
        nickname: lookup_attribute(params, Attribute::Nickname),
    }
}

/// Parses the `key:value` line format of direct verification responses.
#[must_use]
pub fn parse_key_value(body: &str) -> HashMap<String, String> {
    body.lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}
