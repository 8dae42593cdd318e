//! Session bootstrap against the control plane's `/api/sessions` endpoint.

use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::{
    StatusCode,
    header::{ACCEPT, AUTHORIZATION},
};
use url::Url;

use super::{AuthError, AuthPhase, metadata::truncate_body};

/// Response header carrying the bearer token, and the request header that
/// presents it on later API calls.
pub const VCLOUD_AUTHORIZATION: &str = "X-Vcloud-Authorization";

/// `Accept` value selecting an API version.
pub fn accept_media_type(api_version: &str) -> String {
    format!("application/*+xml;version={api_version}")
}

/// `SIGN` scheme value for an encoded assertion.
pub fn sign_authorization(encoded_token: &str, org: &str) -> String {
    format!(r#"SIGN token="{encoded_token}",org="{org}""#)
}

/// HTTP Basic value for `user@org` integrated login.
pub fn basic_authorization(user: &str, org: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{user}@{org}:{password}")))
}

pub fn sessions_url(base: &Url) -> Result<Url, AuthError> {
    base.join("/api/sessions").map_err(|e| {
        AuthError::protocol(
            AuthPhase::SessionBootstrap,
            format!("cannot build session URL: {e}"),
        )
    })
}

/// Open a session and return the bearer token from `X-Vcloud-Authorization`.
///
/// A non-success status is a rejection even if the header is present, and an
/// empty or missing header on success is a protocol failure: the caller never
/// receives a handle with an empty token.
pub async fn bootstrap_session(
    client: &reqwest::Client,
    base: &Url,
    authorization: &str,
    api_version: &str,
) -> Result<String, AuthError> {
    let url = sessions_url(base)?;

    tracing::debug!(url = %url, api_version = %api_version, "Opening session");

    let response = client
        .post(url.clone())
        .header(ACCEPT, accept_media_type(api_version))
        .header(AUTHORIZATION, authorization)
        .send()
        .await
        .map_err(|e| AuthError::transport(AuthPhase::SessionBootstrap, &url, e))?;

    let status = response.status();
    let token = response
        .headers()
        .get(VCLOUD_AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string());

    tracing::trace!(status = %status, has_token = token.is_some(), "Session response");

    if !status.is_success() {
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!(error = %e, "Failed to read session rejection body");
                String::new()
            }
        };
        tracing::warn!(status = %status, "Control plane rejected session request");
        return Err(AuthError::RemoteRejection {
            phase: AuthPhase::SessionBootstrap,
            url: url.to_string(),
            status,
            reason: rejection_reason(status, &body),
        });
    }

    match token {
        Some(token) if !token.is_empty() => Ok(token),
        Some(_) => Err(AuthError::protocol(
            AuthPhase::SessionBootstrap,
            format!("{url} returned {status} with an empty {VCLOUD_AUTHORIZATION} header"),
        )),
        None => Err(AuthError::protocol(
            AuthPhase::SessionBootstrap,
            format!("{url} returned {status} without an {VCLOUD_AUTHORIZATION} header"),
        )),
    }
}

/// Reason text for a rejected session request: the body when there is one,
/// otherwise the status line.
fn rejection_reason(status: StatusCode, body: &str) -> String {
    if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("no response body")
            .to_string()
    } else {
        truncate_body(body)
    }
}
