//! Relying party identifier lookup.
//!
//! The WS-Trust request must name the control plane as the relying party.
//! The identifier is published as the `entityID` attribute of the control
//! plane's SAML service provider metadata for the org. It is fetched fresh
//! for every handshake.

use quick_xml::{Reader, events::Event};
use url::Url;

use super::{AuthError, AuthPhase};

/// SP metadata location: `<scheme>://<host>/cloud/org/<org>/saml/metadata/alias/vcd`.
pub fn metadata_url(base: &Url, org: &str) -> Result<Url, AuthError> {
    base.join(&format!("/cloud/org/{org}/saml/metadata/alias/vcd"))
        .map_err(|e| {
            AuthError::protocol(
                AuthPhase::EntityId,
                format!("cannot build metadata URL for org '{org}': {e}"),
            )
        })
}

/// Fetch the SP metadata and return its `entityID`.
pub async fn fetch_entity_id(
    client: &reqwest::Client,
    base: &Url,
    org: &str,
) -> Result<String, AuthError> {
    let url = metadata_url(base, org)?;

    tracing::debug!(url = %url, "Fetching SAML service provider metadata");

    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| AuthError::transport(AuthPhase::EntityId, &url, e))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| AuthError::transport(AuthPhase::EntityId, &url, e))?;

    tracing::trace!(status = %status, body_len = body.len(), "SAML metadata response");

    if !status.is_success() {
        return Err(AuthError::RemoteRejection {
            phase: AuthPhase::EntityId,
            url: url.to_string(),
            status,
            reason: truncate_body(&body),
        });
    }

    parse_entity_id(&body)
}

/// Extract the `entityID` attribute of the root `EntityDescriptor`.
pub fn parse_entity_id(xml: &str) -> Result<String, AuthError> {
    let mut reader = Reader::from_str(xml);

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let local = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if local != "EntityDescriptor" {
                    return Err(AuthError::protocol(
                        AuthPhase::EntityId,
                        format!("metadata root element is <{local}>, expected <EntityDescriptor>"),
                    ));
                }

                let attr = e
                    .try_get_attribute("entityID")
                    .map_err(|e| {
                        AuthError::protocol(
                            AuthPhase::EntityId,
                            format!("malformed EntityDescriptor attributes: {e}"),
                        )
                    })?
                    .ok_or_else(|| {
                        AuthError::protocol(
                            AuthPhase::EntityId,
                            "EntityDescriptor has no entityID attribute",
                        )
                    })?;

                let entity_id = attr.unescape_value().map_err(|e| {
                    AuthError::protocol(AuthPhase::EntityId, format!("invalid entityID value: {e}"))
                })?;

                if entity_id.trim().is_empty() {
                    return Err(AuthError::protocol(
                        AuthPhase::EntityId,
                        "EntityDescriptor has an empty entityID attribute",
                    ));
                }

                return Ok(entity_id.into_owned());
            }
            Ok(Event::Eof) => {
                return Err(AuthError::protocol(
                    AuthPhase::EntityId,
                    "metadata document has no root element",
                ));
            }
            Err(e) => {
                return Err(AuthError::protocol(
                    AuthPhase::EntityId,
                    format!("metadata is not valid XML: {e}"),
                ));
            }
            // Declaration, comments, whitespace
            _ => {}
        }
    }
}

/// Keep error messages readable when the remote returns a full HTML page.
pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 512;
    let body = body.trim();
    if body.len() <= MAX {
        return body.to_string();
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
