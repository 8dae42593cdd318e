use std::fmt;

use sha2::{Digest, Sha256};

use crate::config::ConnectionParameters;

/// Session cache key derived from the credential-bearing connection fields.
///
/// Covers the user, password, static token, system org and endpoint URL.
/// Each field is length-prefixed, so moving bytes between adjacent fields
/// changes the digest.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CacheFingerprint(String);

impl CacheFingerprint {
    pub fn of(params: &ConnectionParameters) -> Self {
        let mut hasher = Sha256::new();

        for (label, value) in [
            ("user", params.user.as_str()),
            ("password", params.password.as_deref().unwrap_or_default()),
            ("token", params.token.as_deref().unwrap_or_default()),
            ("sysorg", params.sysorg.as_str()),
            ("url", params.url.as_str()),
        ] {
            hasher.update(label.as_bytes());
            hasher.update((value.len() as u64).to_le_bytes());
            hasher.update(value.as_bytes());
        }

        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CacheFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheFingerprint({})", &self.0[..12])
    }
}

impl fmt::Display for CacheFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0[..12])
    }
}
