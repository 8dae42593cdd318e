//! WS-Trust 1.3 RequestSecurityToken exchange.
//!
//! Posts a SOAP 1.2 envelope carrying a WS-Security `UsernameToken` to the
//! IdP's `usernamemixed` endpoint and pulls the issued token out of the
//! `RequestSecurityTokenResponse`. The issued token is captured as raw inner
//! XML and forwarded without interpretation.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use quick_xml::{Reader, escape::escape, events::Event};
use reqwest::header::CONTENT_TYPE;
use url::Url;

use super::{AuthError, AuthPhase, metadata::truncate_body, token::SecurityAssertion};

pub const SOAP_CONTENT_TYPE: &str = "application/soap+xml";

/// Validity window of the token request itself. ADFS rejects requests whose
/// timestamp window differs from what it expects.
const REQUEST_LIFETIME_MINUTES: i64 = 1;

/// Render the RequestSecurityToken envelope.
///
/// All substituted values are XML-escaped.
pub fn render_rst(
    endpoint: &str,
    username: &str,
    password: &str,
    relying_party: &str,
    created: DateTime<Utc>,
) -> String {
    let expires = created + Duration::minutes(REQUEST_LIFETIME_MINUTES);
    let created = created.to_rfc3339_opts(SecondsFormat::Secs, true);
    let expires = expires.to_rfc3339_opts(SecondsFormat::Secs, true);
    let endpoint = escape(endpoint);
    let username = escape(username);
    let password = escape(password);
    let relying_party = escape(relying_party);

    format!(
        r#"<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope" xmlns:a="http://www.w3.org/2005/08/addressing" xmlns:u="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd">
  <s:Header>
    <a:Action s:mustUnderstand="1">http://docs.oasis-open.org/ws-sx/ws-trust/200512/RST/Issue</a:Action>
    <a:ReplyTo>
      <a:Address>http://www.w3.org/2005/08/addressing/anonymous</a:Address>
    </a:ReplyTo>
    <a:To s:mustUnderstand="1">{endpoint}</a:To>
    <o:Security s:mustUnderstand="1" xmlns:o="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd">
      <u:Timestamp u:Id="_0">
        <u:Created>{created}</u:Created>
        <u:Expires>{expires}</u:Expires>
      </u:Timestamp>
      <o:UsernameToken>
        <o:Username>{username}</o:Username>
        <o:Password o:Type="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-username-token-profile-1.0#PasswordText">{password}</o:Password>
      </o:UsernameToken>
    </o:Security>
  </s:Header>
  <s:Body>
    <trust:RequestSecurityToken xmlns:trust="http://docs.oasis-open.org/ws-sx/ws-trust/200512">
      <wsp:AppliesTo xmlns:wsp="http://schemas.xmlsoap.org/ws/2004/09/policy">
        <a:EndpointReference>
          <a:Address>{relying_party}</a:Address>
        </a:EndpointReference>
      </wsp:AppliesTo>
      <trust:KeySize>0</trust:KeySize>
      <trust:KeyType>http://docs.oasis-open.org/ws-sx/ws-trust/200512/Bearer</trust:KeyType>
      <i:RequestDisplayToken xml:lang="en" xmlns:i="http://schemas.xmlsoap.org/ws/2005/05/identity"/>
      <trust:RequestType>http://docs.oasis-open.org/ws-sx/ws-trust/200512/Issue</trust:RequestType>
      <trust:TokenType>http://docs.oasis-open.org/wss/oasis-wss-saml-token-profile-1.1#SAMLV2.0</trust:TokenType>
    </trust:RequestSecurityToken>
  </s:Body>
</s:Envelope>"#
    )
}

/// Request a security token for `relying_party` from the IdP at `endpoint`.
pub async fn request_security_token(
    client: &reqwest::Client,
    endpoint: &Url,
    username: &str,
    password: &str,
    relying_party: &str,
) -> Result<SecurityAssertion, AuthError> {
    let body = render_rst(endpoint.as_str(), username, password, relying_party, Utc::now());

    tracing::debug!(endpoint = %endpoint, relying_party = %relying_party, "Requesting security token");

    let response = client
        .post(endpoint.clone())
        .header(CONTENT_TYPE, SOAP_CONTENT_TYPE)
        .body(body)
        .send()
        .await
        .map_err(|e| AuthError::transport(AuthPhase::WsTrust, endpoint, e))?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| AuthError::transport(AuthPhase::WsTrust, endpoint, e))?;

    tracing::trace!(status = %status, body_len = text.len(), "WS-Trust response");

    if !status.is_success() {
        let reason = match parse_soap_fault(&text) {
            Some(reason) => reason,
            None if text.trim().is_empty() => status
                .canonical_reason()
                .unwrap_or("no response body")
                .to_string(),
            None => truncate_body(&text),
        };
        tracing::warn!(status = %status, reason = %reason, "IdP rejected security token request");
        return Err(AuthError::RemoteRejection {
            phase: AuthPhase::WsTrust,
            url: endpoint.to_string(),
            status,
            reason,
        });
    }

    extract_requested_token(&text)
}

/// Human-readable reason of a SOAP fault, if `xml` is one.
///
/// Understands SOAP 1.2 (`Fault/Reason/Text`) and SOAP 1.1 (`faultstring`).
/// Returns `None` for anything that can't be read as a fault.
pub fn parse_soap_fault(xml: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    let mut path: Vec<String> = Vec::new();
    let mut in_fault = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let local = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if local == "Fault" {
                    in_fault = true;
                }
                path.push(local);
            }
            Ok(Event::End(_)) => {
                if path.pop().as_deref() == Some("Fault") {
                    in_fault = false;
                }
            }
            Ok(Event::Text(e)) if in_fault => {
                let is_reason = match path.as_slice() {
                    [.., parent, last] => {
                        (parent == "Reason" && last == "Text") || last == "faultstring"
                    }
                    [last] => last == "faultstring",
                    [] => false,
                };
                if is_reason {
                    let text = e.unescape().ok()?.trim().to_string();
                    if !text.is_empty() {
                        return Some(text);
                    }
                }
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
    }
}

/// Raw inner XML of the `RequestedSecurityToken` element of an RSTR.
pub fn extract_requested_token(xml: &str) -> Result<SecurityAssertion, AuthError> {
    let mut reader = Reader::from_str(xml);

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"RequestedSecurityToken" => {
                let end = e.to_end().into_owned();
                let inner = reader.read_text(end.name()).map_err(|e| {
                    AuthError::protocol(
                        AuthPhase::WsTrust,
                        format!("unterminated RequestedSecurityToken: {e}"),
                    )
                })?;

                if inner.trim().is_empty() {
                    return Err(AuthError::protocol(
                        AuthPhase::WsTrust,
                        "RequestedSecurityToken is empty",
                    ));
                }

                tracing::trace!(token_len = inner.len(), "Extracted requested security token");
                return Ok(SecurityAssertion::new(inner.into_owned()));
            }
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"RequestedSecurityToken" => {
                return Err(AuthError::protocol(
                    AuthPhase::WsTrust,
                    "RequestedSecurityToken is empty",
                ));
            }
            Ok(Event::Eof) => {
                return Err(AuthError::protocol(
                    AuthPhase::WsTrust,
                    "response has no RequestedSecurityToken element",
                ));
            }
            Err(e) => {
                return Err(AuthError::protocol(
                    AuthPhase::WsTrust,
                    format!("response is not valid XML: {e}"),
                ));
            }
            _ => {}
        }
    }
}

#[cfg(test)]
pub(crate) fn rstr_envelope(token_xml: &str) -> String {
    format!(
        r#"<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope" xmlns:a="http://www.w3.org/2005/08/addressing" xmlns:u="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd"><s:Header><a:Action s:mustUnderstand="1">http://docs.oasis-open.org/ws-sx/ws-trust/200512/RSTRC/IssueFinal</a:Action></s:Header><s:Body><trust:RequestSecurityTokenResponseCollection xmlns:trust="http://docs.oasis-open.org/ws-sx/ws-trust/200512"><trust:RequestSecurityTokenResponse><trust:Lifetime><wsu:Created xmlns:wsu="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd">2026-10-16T10:00:00.000Z</wsu:Created></trust:Lifetime><trust:RequestedSecurityToken>{token_xml}</trust:RequestedSecurityToken><trust:TokenType>urn:oasis:names:tc:SAML:2.0:assertion</trust:TokenType></trust:RequestSecurityTokenResponse></trust:RequestSecurityTokenResponseCollection></s:Body></s:Envelope>"#
    )
}

#[cfg(test)]
pub(crate) fn soap_fault(reason: &str) -> String {
    format!(
        r#"<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope" xmlns:a="http://www.w3.org/2005/08/addressing"><s:Header><a:Action s:mustUnderstand="1">http://www.w3.org/2005/08/addressing/soap/fault</a:Action></s:Header><s:Body><s:Fault><s:Code><s:Value>s:Sender</s:Value><s:Subcode><s:Value xmlns:a="http://docs.oasis-open.org/ws-sx/ws-trust/200512">a:FailedAuthentication</s:Value></s:Subcode></s:Code><s:Reason><s:Text xml:lang="en-US">{reason}</s:Text></s:Reason></s:Fault></s:Body></s:Envelope>"#
    )
}
