//! Federation endpoint discovery.
//!
//! The control plane redirects a tenant login to its identity provider
//! through a chain of hops whose length depends on the IdP topology. Each
//! hop's `Location` header is followed by hand until it points at another
//! host (or port); that target belongs to the IdP, and its WS-Trust endpoint
//! lives at a well-known path on the same host. A scheme change alone, such
//! as an http to https upgrade, stays on the control plane.

use reqwest::header::{COOKIE, LOCATION};
use url::Url;

use super::{AuthError, AuthPhase};

/// WS-Trust 1.3 username/password endpoint on an ADFS host.
pub const WSTRUST_USERNAME_MIXED_PATH: &str = "/adfs/services/trust/13/usernamemixed";

/// Tenant login entry point: `<scheme>://<host>/tenant/<org>`.
pub fn tenant_login_url(base: &Url, org: &str) -> Result<Url, AuthError> {
    base.join(&format!("/tenant/{org}")).map_err(|e| {
        AuthError::protocol(
            AuthPhase::RedirectDiscovery,
            format!("cannot build tenant login URL for org '{org}': {e}"),
        )
    })
}

/// Derive the WS-Trust endpoint from a URL on the IdP host.
pub fn wstrust_endpoint(idp_url: &Url) -> Url {
    let mut endpoint = idp_url.clone();
    endpoint.set_path(WSTRUST_USERNAME_MIXED_PATH);
    endpoint.set_query(None);
    endpoint.set_fragment(None);
    endpoint
}

/// Whether `url` is served by the same host as `base`.
///
/// Compares host and explicit port only, so an http to https upgrade on the
/// control plane is not mistaken for the IdP.
pub fn same_host(base: &Url, url: &Url) -> bool {
    base.host_str() == url.host_str() && base.port() == url.port()
}

/// Walk the tenant login redirects and return the IdP's WS-Trust endpoint.
///
/// `client` must not follow redirects itself; see
/// [`HttpClientConfig::build_no_redirect_client`](crate::config::HttpClientConfig::build_no_redirect_client).
/// `cookie` is sent on the first request only.
pub async fn discover_wstrust_endpoint(
    client: &reqwest::Client,
    base: &Url,
    org: &str,
    cookie: Option<&str>,
    max_hops: usize,
) -> Result<Url, AuthError> {
    let mut current = tenant_login_url(base, org)?;

    for hop in 1..=max_hops {
        let mut request = client.get(current.clone());
        if hop == 1
            && let Some(cookie) = cookie
        {
            request = request.header(COOKIE, cookie.replace("{org}", org));
        }

        let response = request
            .send()
            .await
            .map_err(|e| AuthError::transport(AuthPhase::RedirectDiscovery, &current, e))?;

        let status = response.status();
        tracing::trace!(hop, url = %current, status = %status, "Redirect discovery hop");

        let location = response.headers().get(LOCATION).ok_or_else(|| {
            AuthError::protocol(
                AuthPhase::RedirectDiscovery,
                format!("hop {hop} ({current}) returned {status} without a Location header"),
            )
        })?;

        let location = location.to_str().map_err(|e| {
            AuthError::protocol(
                AuthPhase::RedirectDiscovery,
                format!("hop {hop} ({current}) returned an unreadable Location header: {e}"),
            )
        })?;

        let next = current.join(location).map_err(|e| {
            AuthError::protocol(
                AuthPhase::RedirectDiscovery,
                format!("hop {hop} ({current}) redirected to unparsable location '{location}': {e}"),
            )
        })?;

        if !same_host(base, &next) {
            let endpoint = wstrust_endpoint(&next);
            tracing::debug!(
                hops = hop,
                endpoint = %endpoint,
                "Discovered federation endpoint"
            );
            return Ok(endpoint);
        }

        current = next;
    }

    Err(AuthError::protocol(
        AuthPhase::RedirectDiscovery,
        format!(
            "no redirect left {} after {max_hops} hops",
            base.host_str().unwrap_or_default()
        ),
    ))
}
