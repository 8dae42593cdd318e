//! End-to-end login tests using wiremock.
//!
//! The control plane and the identity provider run as separate mock servers,
//! so the redirect walk really crosses origins. Every scenario goes through
//! [`Connector::client`] with a config parsed from TOML, exactly as the
//! binary does.

use std::sync::Arc;

use wiremock::{
    Mock, MockServer, Request, ResponseTemplate,
    matchers::{body_string_contains, header, method, path},
};

use crate::{
    auth::{
        SecurityAssertion, encode_assertion,
        redirect::WSTRUST_USERNAME_MIXED_PATH,
        session::{VCLOUD_AUTHORIZATION, sign_authorization},
        wstrust::{SOAP_CONTENT_TYPE, rstr_envelope, soap_fault},
    },
    config::AuthClientConfig,
    connector::Connector,
};

const ASSERTION: &str = "dGVzdA==";
const BEARER: &str = "tok-123";

// =============================================================================
// Harness
// =============================================================================

struct LoginHarness {
    control_plane: MockServer,
    idp: MockServer,
}

impl LoginHarness {
    async fn new() -> Self {
        Self {
            control_plane: MockServer::start().await,
            idp: MockServer::start().await,
        }
    }

    fn config(&self, cache_enabled: bool) -> AuthClientConfig {
        let toml = format!(
            r#"
[connection]
url = "{}/api"
user = "alice@corp.example.com"
password = "p@ss<word>&"
sysorg = "acme"
org = "acme"
vdc = "acme-vdc"
auth_type = "saml_adfs"

[cache]
enabled = {cache_enabled}
"#,
            self.control_plane.uri()
        );
        AuthClientConfig::from_str(&toml).expect("Failed to parse test config")
    }

    fn entity_id(&self) -> String {
        format!(
            "{}/cloud/org/acme/saml/metadata/alias/vcd",
            self.control_plane.uri()
        )
    }

    /// Three hops on the control plane; the last one points at the IdP.
    async fn mount_redirects(&self, expected_calls: u64) {
        let cp = self.control_plane.uri();
        let idp = self.idp.uri();
        for (from, to) in [
            ("/tenant/acme", "/login/oauth?service=tenant:acme".to_string()),
            ("/login/oauth", format!("{cp}/login/saml/acme")),
            ("/login/saml/acme", format!("{idp}/adfs/ls/?SAMLRequest=fZJNb9sw")),
        ] {
            Mock::given(method("GET"))
                .and(path(from))
                .respond_with(ResponseTemplate::new(302).insert_header("Location", to.as_str()))
                .expect(expected_calls)
                .mount(&self.control_plane)
                .await;
        }
    }

    async fn mount_metadata(&self, expected_calls: u64) {
        let body = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><md:EntityDescriptor xmlns:md="urn:oasis:names:tc:SAML:2.0:metadata" entityID="{}"><md:SPSSODescriptor protocolSupportEnumeration="urn:oasis:names:tc:SAML:2.0:protocol"/></md:EntityDescriptor>"#,
            self.entity_id()
        );
        Mock::given(method("GET"))
            .and(path("/cloud/org/acme/saml/metadata/alias/vcd"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(expected_calls)
            .mount(&self.control_plane)
            .await;
    }

    async fn mount_wstrust(&self, response: ResponseTemplate, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path(WSTRUST_USERNAME_MIXED_PATH))
            .and(header("content-type", SOAP_CONTENT_TYPE))
            .and(body_string_contains(
                "<o:Username>alice@corp.example.com</o:Username>",
            ))
            .and(body_string_contains("p@ss&lt;word&gt;&amp;"))
            .and(body_string_contains(format!(
                "<a:Address>{}</a:Address>",
                self.entity_id()
            )))
            .respond_with(response)
            .expect(expected_calls)
            .mount(&self.idp)
            .await;
    }

    async fn mount_sessions(&self, token: &'static str, expected_calls: u64) {
        let encoded = encode_assertion(&SecurityAssertion::new(ASSERTION)).unwrap();
        let expected_auth = sign_authorization(&encoded, "acme");

        Mock::given(method("POST"))
            .and(path("/api/sessions"))
            .and(header("accept", "application/*+xml;version=37.0"))
            .and(move |req: &Request| {
                req.headers
                    .get("authorization")
                    .is_some_and(|v| v.as_bytes() == expected_auth.as_bytes())
            })
            .respond_with(ResponseTemplate::new(200).insert_header(VCLOUD_AUTHORIZATION, token))
            .expect(expected_calls)
            .mount(&self.control_plane)
            .await;
    }

    async fn mount_happy_path(&self, expected_calls: u64) {
        self.mount_redirects(expected_calls).await;
        self.mount_metadata(expected_calls).await;
        self.mount_wstrust(
            ResponseTemplate::new(200).set_body_string(rstr_envelope(ASSERTION)),
            expected_calls,
        )
        .await;
        self.mount_sessions(BEARER, expected_calls).await;
    }

    /// Happy path with no call-count expectations.
    async fn mount_happy_path_unbounded(&self) {
        let cp = self.control_plane.uri();
        let idp = self.idp.uri();
        for (from, to) in [
            ("/tenant/acme", "/login/oauth?service=tenant:acme".to_string()),
            ("/login/oauth", format!("{cp}/login/saml/acme")),
            ("/login/saml/acme", format!("{idp}/adfs/ls/")),
        ] {
            Mock::given(method("GET"))
                .and(path(from))
                .respond_with(ResponseTemplate::new(302).insert_header("Location", to.as_str()))
                .mount(&self.control_plane)
                .await;
        }
        Mock::given(method("GET"))
            .and(path("/cloud/org/acme/saml/metadata/alias/vcd"))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                r#"<EntityDescriptor entityID="{}"/>"#,
                self.entity_id()
            )))
            .mount(&self.control_plane)
            .await;
        Mock::given(method("POST"))
            .and(path(WSTRUST_USERNAME_MIXED_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string(rstr_envelope(ASSERTION)))
            .mount(&self.idp)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/sessions"))
            .respond_with(ResponseTemplate::new(200).insert_header(VCLOUD_AUTHORIZATION, BEARER))
            .mount(&self.control_plane)
            .await;
    }
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_saml_login_end_to_end() {
    let harness = LoginHarness::new().await;
    harness.mount_happy_path(1).await;

    let config = harness.config(true);
    let connector = Connector::from_config(&config);
    let params = config.connection;

    let client = connector.client(&params).await.unwrap();
    assert_eq!(client.token(), BEARER);
    assert_eq!(client.org(), "acme");
    assert_eq!(client.vdc(), Some("acme-vdc"));

    // Served from the cache; every mock expects exactly one call
    let again = connector.client(&params).await.unwrap();
    assert!(Arc::ptr_eq(&client, &again));
    assert_eq!(connector.cache().served(), 1);
}

#[tokio::test]
async fn test_disabled_cache_repeats_handshake() {
    let harness = LoginHarness::new().await;
    harness.mount_happy_path(2).await;

    let config = harness.config(false);
    let connector = Connector::from_config(&config);

    let first = connector.client(&config.connection).await.unwrap();
    let second = connector.client(&config.connection).await.unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(second.token(), BEARER);
    assert!(connector.cache().is_empty());
}

#[tokio::test]
async fn test_idp_fault_reason_reaches_caller() {
    let harness = LoginHarness::new().await;
    harness.mount_redirects(1).await;
    harness.mount_metadata(1).await;
    harness
        .mount_wstrust(
            ResponseTemplate::new(500).set_body_string(soap_fault("Bad credentials")),
            1,
        )
        .await;
    harness.mount_sessions(BEARER, 0).await;

    let config = harness.config(true);
    let connector = Connector::from_config(&config);

    let err = connector.client(&config.connection).await.unwrap_err();
    assert!(err.to_string().contains("Bad credentials"), "got: {err}");
    assert!(connector.cache().is_empty());
}

#[tokio::test]
async fn test_api_calls_carry_bearer_token() {
    let harness = LoginHarness::new().await;
    harness.mount_happy_path(1).await;
    Mock::given(method("GET"))
        .and(path("/api/org"))
        .and(header(VCLOUD_AUTHORIZATION, BEARER))
        .respond_with(ResponseTemplate::new(200).set_body_string("<OrgList/>"))
        .expect(2)
        .mount(&harness.control_plane)
        .await;

    let config = harness.config(true);
    let connector = Connector::from_config(&config);

    for _ in 0..2 {
        let client = connector.client(&config.connection).await.unwrap();
        let response = client.get("org").unwrap().send().await.unwrap();
        assert!(response.status().is_success());
    }
}

#[tokio::test]
async fn test_concurrent_logins_share_one_cache_slot() {
    let harness = LoginHarness::new().await;
    // Concurrent misses may each run the handshake
    harness.mount_happy_path_unbounded().await;

    let config = harness.config(true);
    let connector = Connector::from_config(&config);

    let results = futures::future::join_all(
        (0..4).map(|_| connector.client(&config.connection)),
    )
    .await;

    for result in results {
        assert_eq!(result.unwrap().token(), BEARER);
    }
    assert_eq!(connector.cache().len(), 1);
}
