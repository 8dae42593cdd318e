use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};
use url::Url;

use super::ConfigError;

/// How the client proves its identity to the control plane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    /// HTTP Basic credentials posted straight to the session endpoint.
    #[default]
    Integrated,
    /// A pre-issued bearer token; no handshake is performed.
    Token,
    /// Username/password exchanged for a SAML assertion at the federation
    /// provider (WS-Trust), then traded for a bearer token.
    SamlAdfs,
}

impl AuthType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthType::Integrated => "integrated",
            AuthType::Token => "token",
            AuthType::SamlAdfs => "saml_adfs",
        }
    }
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Endpoint and credentials for one control plane tenant.
///
/// Immutable once loaded. The credential fields feed the session cache
/// fingerprint, so two parameter sets that differ in any of them never share
/// a cached session.
#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionParameters {
    /// Principal identifier (user name or UPN).
    #[serde(default)]
    pub user: String,

    /// Password for `integrated` and `saml_adfs` authentication.
    #[serde(default)]
    pub password: Option<String>,

    /// Static bearer token for `token` authentication.
    #[serde(default)]
    pub token: Option<String>,

    /// Organization the user logs into.
    #[serde(default)]
    pub sysorg: String,

    /// Default organization for API calls issued through the handle.
    pub org: String,

    /// Default virtual datacenter for API calls issued through the handle.
    #[serde(default)]
    pub vdc: Option<String>,

    /// Base endpoint URL, e.g. `https://vcd.example.com/api`.
    pub url: String,

    /// Upper bound for task polling in the surrounding system.
    #[serde(default = "default_max_retry_timeout")]
    pub max_retry_timeout_secs: u64,

    /// Skip TLS certificate verification.
    #[serde(default)]
    pub allow_unverified_ssl: bool,

    #[serde(default)]
    pub auth_type: AuthType,

    /// Relying party trust identifier to use instead of the one published in
    /// the control plane's SAML metadata.
    #[serde(default)]
    pub saml_adfs_rpt_id: Option<String>,

    /// Cookie sent with the first redirect-discovery request. `{org}` is
    /// replaced with the login organization.
    #[serde(default)]
    pub saml_adfs_cookie: Option<String>,

    /// API version requested in the `Accept` header.
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

impl ConnectionParameters {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.base_url()?;

        if self.org.is_empty() {
            return Err(ConfigError::Validation(
                "connection.org cannot be empty".into(),
            ));
        }

        match self.auth_type {
            AuthType::Integrated | AuthType::SamlAdfs => {
                if self.user.is_empty() {
                    return Err(ConfigError::Validation(format!(
                        "connection.user is required for auth_type = \"{}\"",
                        self.auth_type
                    )));
                }
                if self.password.as_deref().is_none_or(str::is_empty) {
                    return Err(ConfigError::Validation(format!(
                        "connection.password is required for auth_type = \"{}\"",
                        self.auth_type
                    )));
                }
            }
            AuthType::Token => {
                if self.token.as_deref().is_none_or(str::is_empty) {
                    return Err(ConfigError::Validation(
                        "connection.token is required for auth_type = \"token\"".into(),
                    ));
                }
            }
        }

        Ok(())
    }

    /// Parse the configured endpoint, rejecting anything that isn't HTTP(S).
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.url).map_err(|e| {
            ConfigError::Validation(format!("connection.url '{}' is invalid: {e}", self.url))
        })?;

        match url.scheme() {
            "http" | "https" if url.host_str().is_some() => Ok(url),
            _ => Err(ConfigError::Validation(format!(
                "connection.url '{}' must be an http(s) URL with a host",
                self.url
            ))),
        }
    }

    /// The org used to log in: `sysorg` when set, otherwise the default org.
    pub fn login_org(&self) -> &str {
        if self.sysorg.is_empty() {
            &self.org
        } else {
            &self.sysorg
        }
    }

    pub fn max_retry_timeout(&self) -> Duration {
        Duration::from_secs(self.max_retry_timeout_secs)
    }
}

impl fmt::Debug for ConnectionParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParameters")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("sysorg", &self.sysorg)
            .field("org", &self.org)
            .field("vdc", &self.vdc)
            .field("url", &self.url)
            .field("max_retry_timeout_secs", &self.max_retry_timeout_secs)
            .field("allow_unverified_ssl", &self.allow_unverified_ssl)
            .field("auth_type", &self.auth_type)
            .field("saml_adfs_rpt_id", &self.saml_adfs_rpt_id)
            .field("saml_adfs_cookie", &self.saml_adfs_cookie)
            .field("api_version", &self.api_version)
            .finish()
    }
}

fn default_max_retry_timeout() -> u64 {
    60
}

fn default_api_version() -> String {
    "37.0".to_string()
}

#[cfg(test)]
pub(crate) fn test_params(url: &str) -> ConnectionParameters {
    ConnectionParameters {
        user: "alice@corp.example.com".to_string(),
        password: Some("p@ss<word>&".to_string()),
        token: None,
        sysorg: "acme".to_string(),
        org: "acme".to_string(),
        vdc: Some("acme-vdc".to_string()),
        url: url.to_string(),
        max_retry_timeout_secs: default_max_retry_timeout(),
        allow_unverified_ssl: false,
        auth_type: AuthType::SamlAdfs,
        saml_adfs_rpt_id: None,
        saml_adfs_cookie: None,
        api_version: default_api_version(),
    }
}
