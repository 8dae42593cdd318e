use std::{fmt, time::Duration};

use reqwest::{Method, RequestBuilder, header::ACCEPT};
use url::Url;

use crate::{
    auth::{AuthError, AuthPhase, accept_media_type, session::VCLOUD_AUTHORIZATION},
    config::ConnectionParameters,
};

/// An HTTP client bound to an authenticated control-plane session.
///
/// Created once per successful handshake and shared (via `Arc`) by every API
/// call made through it. Requests built with [`request`](Self::request) carry
/// the bearer token and the API version automatically.
#[derive(Clone)]
pub struct AuthenticatedClient {
    http: reqwest::Client,
    base: Url,
    token: String,
    org: String,
    vdc: Option<String>,
    api_version: String,
    max_retry_timeout: Duration,
}

impl AuthenticatedClient {
    pub fn new(
        http: reqwest::Client,
        params: &ConnectionParameters,
        token: String,
    ) -> Result<Self, AuthError> {
        Ok(Self {
            http,
            base: params.base_url()?,
            token,
            org: params.org.clone(),
            vdc: params.vdc.clone(),
            api_version: params.api_version.clone(),
            max_retry_timeout: params.max_retry_timeout(),
        })
    }

    /// Build a request to `path`, resolved against the base endpoint.
    ///
    /// Relative paths are joined onto the base URL (`vms` against
    /// `https://host/api/` gives `https://host/api/vms`); absolute paths
    /// replace its path.
    pub fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, AuthError> {
        let url = self.url(path)?;
        Ok(self
            .http
            .request(method, url)
            .header(VCLOUD_AUTHORIZATION, &self.token)
            .header(ACCEPT, accept_media_type(&self.api_version)))
    }

    pub fn get(&self, path: &str) -> Result<RequestBuilder, AuthError> {
        self.request(Method::GET, path)
    }

    fn url(&self, path: &str) -> Result<Url, AuthError> {
        let mut base = self.base.clone();
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        base.join(path).map_err(|e| {
            AuthError::protocol(
                AuthPhase::SessionBootstrap,
                format!("cannot build request URL for '{path}': {e}"),
            )
        })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    pub fn vdc(&self) -> Option<&str> {
        self.vdc.as_deref()
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// How long callers should keep retrying operations that the control
    /// plane reports as busy.
    pub fn max_retry_timeout(&self) -> Duration {
        self.max_retry_timeout
    }
}

impl fmt::Debug for AuthenticatedClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatedClient")
            .field("base", &self.base.as_str())
            .field("token", &"<redacted>")
            .field("org", &self.org)
            .field("vdc", &self.vdc)
            .field("api_version", &self.api_version)
            .field("max_retry_timeout", &self.max_retry_timeout)
            .finish()
    }
}
