//! Assertion transport encoding.
//!
//! The control plane's `SIGN` authorization scheme expects the assertion
//! gzip-compressed and then base64-encoded with the standard alphabet.

use std::{fmt, io::Write};

use base64::{engine::general_purpose::STANDARD, write::EncoderStringWriter};
use flate2::{Compression, write::GzEncoder};

use super::{AuthError, AuthPhase};

/// The security token returned by the federation provider.
///
/// Opaque: the content (typically an encrypted SAML assertion) is never
/// parsed, only forwarded exactly as received.
#[derive(Clone, PartialEq, Eq)]
pub struct SecurityAssertion(String);

impl SecurityAssertion {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecurityAssertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecurityAssertion(<{} bytes>)", self.0.len())
    }
}

/// Compress `assertion` with gzip and base64-encode the result.
///
/// Deterministic: the gzip header carries no timestamp or file name, so the
/// same input always yields the same string. The compressor writes straight
/// into the base64 encoder, so only the final string is buffered.
pub fn encode_assertion(assertion: &SecurityAssertion) -> Result<String, AuthError> {
    encode_bytes(assertion.as_str().as_bytes()).map_err(|source| AuthError::Transform {
        phase: AuthPhase::TokenTransform,
        source,
    })
}

fn encode_bytes(bytes: &[u8]) -> std::io::Result<String> {
    let b64 = EncoderStringWriter::new(&STANDARD);
    let mut gz = GzEncoder::new(b64, Compression::default());
    gz.write_all(bytes)?;
    let b64 = gz.finish()?;
    Ok(b64.into_inner())
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use base64::Engine;
    use flate2::read::GzDecoder;

    use super::*;

    fn decode(encoded: &str) -> String {
        let compressed = STANDARD.decode(encoded).unwrap();
        let mut out = String::new();
        GzDecoder::new(compressed.as_slice())
            .read_to_string(&mut out)
            .unwrap();
        out
    }

    #[test]
    fn test_encode_is_deterministic() {
        let assertion = SecurityAssertion::new("dGVzdA==");
        let first = encode_assertion(&assertion).unwrap();
        let second = encode_assertion(&assertion).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_output_is_gzip_in_standard_base64() {
        let encoded = encode_assertion(&SecurityAssertion::new("<xenc:EncryptedData/>")).unwrap();
        let compressed = STANDARD.decode(&encoded).unwrap();
        // gzip magic
        assert_eq!(&compressed[..2], &[0x1f, 0x8b]);
        assert!(!encoded.contains('-') && !encoded.contains('_'));
    }

    #[test]
    fn test_round_trip() {
        let text = r#"<xenc:EncryptedData xmlns:xenc="http://www.w3.org/2001/04/xmlenc#">abc</xenc:EncryptedData>"#;
        let encoded = encode_assertion(&SecurityAssertion::new(text)).unwrap();
        assert_eq!(decode(&encoded), text);
    }

    #[test]
    fn test_round_trip_empty() {
        let encoded = encode_assertion(&SecurityAssertion::new("")).unwrap();
        assert!(!encoded.is_empty());
        assert_eq!(decode(&encoded), "");
    }

    #[test]
    fn test_round_trip_large_payload() {
        let text: String = (0..200_000u32)
            .map(|i| format!("{:x}", i.wrapping_mul(2_654_435_761u32)))
            .collect();
        assert!(text.len() > 1024 * 1024);

        let encoded = encode_assertion(&SecurityAssertion::new(text.clone())).unwrap();
        assert_eq!(decode(&encoded), text);
    }

    #[test]
    fn test_round_trip_arbitrary_bytes() {
        let bytes: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
        let encoded = encode_bytes(&bytes).unwrap();

        let compressed = STANDARD.decode(encoded).unwrap();
        let mut out = Vec::new();
        GzDecoder::new(compressed.as_slice())
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(out, bytes);
    }

    #[test]
    fn test_debug_hides_content() {
        let assertion = SecurityAssertion::new("secret-assertion");
        let debug = format!("{:?}", assertion);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("16 bytes"));
    }
}
