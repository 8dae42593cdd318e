use std::fmt;

use reqwest::StatusCode;

/// Step of the authentication pipeline an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    /// Following the tenant login redirects to the federation provider.
    RedirectDiscovery,
    /// Reading the relying party identifier from the SP metadata.
    EntityId,
    /// RequestSecurityToken exchange with the federation provider.
    WsTrust,
    /// Compressing and encoding the assertion.
    TokenTransform,
    /// Trading credentials or the assertion for a bearer token.
    SessionBootstrap,
}

impl AuthPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthPhase::RedirectDiscovery => "redirect discovery",
            AuthPhase::EntityId => "entity ID resolution",
            AuthPhase::WsTrust => "WS-Trust token request",
            AuthPhase::TokenTransform => "token transform",
            AuthPhase::SessionBootstrap => "session bootstrap",
        }
    }
}

impl fmt::Display for AuthPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authentication failure.
///
/// Every step fails fast; there is no partial success. The message always
/// names the phase that failed.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Network-level failure talking to the control plane or IdP.
    #[error("{phase} failed: request to {url} failed: {source}")]
    Transport {
        phase: AuthPhase,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Missing redirect target, unparsable XML, missing attribute or header.
    #[error("{phase} failed: {message}")]
    Protocol { phase: AuthPhase, message: String },

    /// The remote side answered with a non-success status.
    #[error("{phase} failed: {url} returned {status}: {reason}")]
    RemoteRejection {
        phase: AuthPhase,
        url: String,
        status: StatusCode,
        reason: String,
    },

    /// Compression or encoding of the assertion failed.
    #[error("{phase} failed: {source}")]
    Transform {
        phase: AuthPhase,
        #[source]
        source: std::io::Error,
    },

    /// The connection parameters cannot be used for the requested method.
    #[error("Invalid connection parameters: {0}")]
    Config(String),
}

impl AuthError {
    pub fn transport(phase: AuthPhase, url: impl fmt::Display, source: reqwest::Error) -> Self {
        AuthError::Transport {
            phase,
            url: url.to_string(),
            source,
        }
    }

    pub fn protocol(phase: AuthPhase, message: impl Into<String>) -> Self {
        AuthError::Protocol {
            phase,
            message: message.into(),
        }
    }

    /// The phase this error came from, if it came from the pipeline.
    pub fn phase(&self) -> Option<AuthPhase> {
        match self {
            AuthError::Transport { phase, .. }
            | AuthError::Protocol { phase, .. }
            | AuthError::RemoteRejection { phase, .. }
            | AuthError::Transform { phase, .. } => Some(*phase),
            AuthError::Config(_) => None,
        }
    }
}

impl From<crate::config::ConfigError> for AuthError {
    fn from(e: crate::config::ConfigError) -> Self {
        AuthError::Config(e.to_string())
    }
}
