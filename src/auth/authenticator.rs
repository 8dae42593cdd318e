use async_trait::async_trait;
use url::Url;

use super::{
    AuthError, metadata, redirect,
    session::{self, basic_authorization, sign_authorization},
    token::encode_assertion,
    wstrust,
};
use crate::{
    client::AuthenticatedClient,
    config::{AuthType, ConnectionParameters, HttpClientConfig},
};

/// Produces an authenticated client from connection parameters.
///
/// The connector only depends on this trait, so the session cache can be
/// exercised without a control plane.
#[async_trait]
pub trait Authenticate: Send + Sync {
    async fn authenticate(
        &self,
        params: &ConnectionParameters,
    ) -> Result<AuthenticatedClient, AuthError>;
}

/// Authenticates against the control plane using the method selected by
/// `auth_type`.
#[derive(Debug, Clone, Default)]
pub struct SamlAuthenticator {
    http: HttpClientConfig,
}

impl SamlAuthenticator {
    pub fn new(http: HttpClientConfig) -> Self {
        Self { http }
    }

    /// The full ADFS pipeline. Returns the bearer token.
    async fn saml_adfs(
        &self,
        api: &reqwest::Client,
        base: &Url,
        params: &ConnectionParameters,
    ) -> Result<String, AuthError> {
        let org = params.login_org();
        let password = required_password(params)?;

        // Per-handshake client, so concurrent handshakes never share a
        // redirect policy
        let walker = self
            .http
            .build_no_redirect_client(params.allow_unverified_ssl)
            .map_err(|e| AuthError::Config(format!("cannot build HTTP client: {e}")))?;

        let endpoint = redirect::discover_wstrust_endpoint(
            &walker,
            base,
            org,
            params.saml_adfs_cookie.as_deref(),
            self.http.max_redirect_hops,
        )
        .await?;

        let relying_party = match params.saml_adfs_rpt_id.as_deref() {
            Some(rpt_id) if !rpt_id.is_empty() => {
                tracing::debug!(rpt_id = %rpt_id, "Using configured relying party identifier");
                rpt_id.to_string()
            }
            _ => metadata::fetch_entity_id(api, base, org).await?,
        };

        let assertion =
            wstrust::request_security_token(api, &endpoint, &params.user, password, &relying_party)
                .await?;
        tracing::debug!(assertion_len = assertion.len(), "Received security token");

        let encoded = encode_assertion(&assertion)?;

        session::bootstrap_session(
            api,
            base,
            &sign_authorization(&encoded, org),
            &params.api_version,
        )
        .await
    }

    async fn integrated(
        &self,
        api: &reqwest::Client,
        base: &Url,
        params: &ConnectionParameters,
    ) -> Result<String, AuthError> {
        let password = required_password(params)?;
        session::bootstrap_session(
            api,
            base,
            &basic_authorization(&params.user, params.login_org(), password),
            &params.api_version,
        )
        .await
    }
}

#[async_trait]
impl Authenticate for SamlAuthenticator {
    async fn authenticate(
        &self,
        params: &ConnectionParameters,
    ) -> Result<AuthenticatedClient, AuthError> {
        params.validate()?;
        let base = params.base_url()?;

        let api = self
            .http
            .build_client(params.allow_unverified_ssl)
            .map_err(|e| AuthError::Config(format!("cannot build HTTP client: {e}")))?;

        tracing::debug!(
            url = %base,
            org = %params.login_org(),
            auth_type = %params.auth_type,
            "Authenticating"
        );

        let token = match params.auth_type {
            AuthType::SamlAdfs => self.saml_adfs(&api, &base, params).await?,
            AuthType::Integrated => self.integrated(&api, &base, params).await?,
            AuthType::Token => params
                .token
                .clone()
                .ok_or_else(|| AuthError::Config("connection.token is not set".into()))?,
        };

        tracing::info!(
            org = %params.login_org(),
            auth_type = %params.auth_type,
            "Authenticated to control plane"
        );

        AuthenticatedClient::new(api, params, token)
    }
}

fn required_password(params: &ConnectionParameters) -> Result<&str, AuthError> {
    params
        .password
        .as_deref()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| {
            AuthError::Config(format!(
                "connection.password is required for auth_type = \"{}\"",
                params.auth_type
            ))
        })
}
