mod fingerprint;
mod session_cache;

pub use fingerprint::CacheFingerprint;
pub use session_cache::SessionCache;
