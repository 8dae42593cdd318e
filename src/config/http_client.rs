use std::time::Duration;

use reqwest::redirect::Policy;
use serde::{Deserialize, Serialize};

use super::ConfigError;

/// HTTP client configuration for outbound requests to the control plane and
/// the federation provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpClientConfig {
    /// Per-request timeout in seconds. Bounds every individual hop of the
    /// handshake; there is no overall handshake deadline.
    #[serde(default = "default_http_client_timeout")]
    pub timeout_secs: u64,

    /// Connection timeout in seconds.
    #[serde(default = "default_http_client_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Enable verbose connection logging for debugging.
    #[serde(default)]
    pub verbose: bool,

    /// Maximum number of redirects followed while discovering the federation
    /// endpoint.
    #[serde(default = "default_max_redirect_hops")]
    pub max_redirect_hops: usize,

    /// User-Agent header to send with requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_http_client_timeout(),
            connect_timeout_secs: default_http_client_connect_timeout(),
            verbose: false,
            max_redirect_hops: default_max_redirect_hops(),
            user_agent: default_user_agent(),
        }
    }
}

impl HttpClientConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_redirect_hops == 0 {
            return Err(ConfigError::Validation(
                "http_client.max_redirect_hops must be greater than 0".into(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "http_client.timeout_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Build the client used for API calls and the non-redirect steps of the
    /// handshake.
    pub fn build_client(&self, accept_invalid_certs: bool) -> Result<reqwest::Client, reqwest::Error> {
        self.builder(accept_invalid_certs).build()
    }

    /// Build a client that never follows redirects, so each hop's `Location`
    /// header can be inspected. Each handshake gets its own instance.
    pub fn build_no_redirect_client(
        &self,
        accept_invalid_certs: bool,
    ) -> Result<reqwest::Client, reqwest::Error> {
        self.builder(accept_invalid_certs)
            .redirect(Policy::none())
            .build()
    }

    fn builder(&self, accept_invalid_certs: bool) -> reqwest::ClientBuilder {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .connection_verbose(self.verbose)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .user_agent(&self.user_agent)
    }
}

// Default: 2 minutes; IdPs can be slow to answer WS-Trust requests
fn default_http_client_timeout() -> u64 {
    120
}

// Default: 10 seconds to establish connection
fn default_http_client_connect_timeout() -> u64 {
    10
}

fn default_max_redirect_hops() -> usize {
    10
}

fn default_user_agent() -> String {
    format!("vcd-saml-auth/{}", env!("CARGO_PKG_VERSION"))
}
