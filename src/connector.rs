use std::sync::Arc;

use crate::{
    auth::{Authenticate, AuthError, SamlAuthenticator},
    cache::{CacheFingerprint, SessionCache},
    client::AuthenticatedClient,
    config::{AuthClientConfig, ConnectionParameters, SessionCacheConfig},
};

/// Hands out authenticated clients, reusing cached sessions when enabled.
///
/// With the cache enabled, a live session for the same credentials is
/// returned without contacting the control plane. With it disabled every call
/// authenticates, and the result is stored only if `record_when_disabled` is
/// set. Concurrent misses for the same credentials each authenticate; the
/// last one to finish wins the cache slot.
pub struct Connector {
    cache: Arc<SessionCache>,
    config: SessionCacheConfig,
    authenticator: Arc<dyn Authenticate>,
}

impl Connector {
    pub fn new(
        config: SessionCacheConfig,
        cache: Arc<SessionCache>,
        authenticator: Arc<dyn Authenticate>,
    ) -> Self {
        Self {
            cache,
            config,
            authenticator,
        }
    }

    /// Connector using the real authenticator and a fresh cache.
    pub fn from_config(config: &AuthClientConfig) -> Self {
        Self::new(
            config.cache.clone(),
            Arc::new(SessionCache::new(config.cache.ttl())),
            Arc::new(SamlAuthenticator::new(config.http_client.clone())),
        )
    }

    pub fn cache(&self) -> &Arc<SessionCache> {
        &self.cache
    }

    /// Return an authenticated client for `params`.
    pub async fn client(
        &self,
        params: &ConnectionParameters,
    ) -> Result<Arc<AuthenticatedClient>, AuthError> {
        let fingerprint = CacheFingerprint::of(params);

        if self.config.enabled {
            if let Some(client) = self.cache.lookup(&fingerprint) {
                tracing::debug!(
                    fingerprint = %fingerprint,
                    served = self.cache.served(),
                    "Reusing cached session"
                );
                return Ok(client);
            }
            tracing::debug!(fingerprint = %fingerprint, "No cached session");
        }

        let client = match self.authenticator.authenticate(params).await {
            Ok(client) => Arc::new(client),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    phase = ?e.phase(),
                    org = %params.login_org(),
                    "Authentication failed"
                );
                return Err(e);
            }
        };

        if self.config.should_record() {
            self.cache.store(fingerprint, Arc::clone(&client));
        }

        Ok(client)
    }
}
