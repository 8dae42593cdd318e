use std::{collections::HashMap, sync::Arc, time::Duration};

use parking_lot::Mutex;
use tokio::time::Instant;

use super::CacheFingerprint;
use crate::client::AuthenticatedClient;

struct CachedSession {
    created_at: Instant,
    client: Arc<AuthenticatedClient>,
}

impl CachedSession {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() > ttl
    }
}

#[derive(Default)]
struct Inner {
    sessions: HashMap<CacheFingerprint, CachedSession>,
    served: u64,
}

/// Authenticated clients keyed by connection fingerprint.
///
/// Entries expire `ttl` after they were stored. Expiry is lazy: the lookup
/// that finds an expired entry removes it and reports a miss. All state,
/// the serving counter included, lives behind one lock, and every operation
/// holds it for its whole check-and-mutate sequence.
///
/// One instance is created per process and shared by reference; tests build
/// their own.
pub struct SessionCache {
    inner: Mutex<Inner>,
    ttl: Duration,
}

impl SessionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the live session for `fingerprint`, evicting it if expired.
    pub fn lookup(&self, fingerprint: &CacheFingerprint) -> Option<Arc<AuthenticatedClient>> {
        let mut inner = self.inner.lock();

        let expired = match inner.sessions.get(fingerprint) {
            None => return None,
            Some(entry) => entry.is_expired(self.ttl),
        };

        if expired {
            inner.sessions.remove(fingerprint);
            tracing::debug!(fingerprint = %fingerprint, "Evicted expired session");
            return None;
        }

        inner.served += 1;
        inner
            .sessions
            .get(fingerprint)
            .map(|entry| Arc::clone(&entry.client))
    }

    /// Store a freshly authenticated session, replacing any previous one.
    pub fn store(&self, fingerprint: CacheFingerprint, client: Arc<AuthenticatedClient>) {
        let mut inner = self.inner.lock();
        tracing::debug!(fingerprint = %fingerprint, "Stored session");
        inner.sessions.insert(
            fingerprint,
            CachedSession {
                created_at: Instant::now(),
                client,
            },
        );
    }

    pub fn remove(&self, fingerprint: &CacheFingerprint) -> bool {
        self.inner.lock().sessions.remove(fingerprint).is_some()
    }

    /// Number of stored entries, expired ones included until looked up.
    pub fn len(&self) -> usize {
        self.inner.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How many lookups were answered from the cache.
    pub fn served(&self) -> u64 {
        self.inner.lock().served
    }

    pub fn clear(&self) {
        self.inner.lock().sessions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_params;

    const TTL: Duration = Duration::from_secs(20 * 60);

    fn session(token: &str) -> Arc<AuthenticatedClient> {
        Arc::new(
            AuthenticatedClient::new(
                reqwest::Client::new(),
                &test_params("https://vcd.example.com/api"),
                token.to_string(),
            )
            .unwrap(),
        )
    }

    fn fingerprint(user: &str) -> CacheFingerprint {
        let mut params = test_params("https://vcd.example.com/api");
        params.user = user.to_string();
        CacheFingerprint::of(&params)
    }

    #[tokio::test]
    async fn test_lookup_miss() {
        let cache = SessionCache::new(TTL);
        assert!(cache.lookup(&fingerprint("alice")).is_none());
        assert_eq!(cache.served(), 0);
    }

    #[tokio::test]
    async fn test_store_then_lookup() {
        let cache = SessionCache::new(TTL);
        let client = session("tok-1");
        cache.store(fingerprint("alice"), Arc::clone(&client));

        let hit = cache.lookup(&fingerprint("alice")).unwrap();
        assert!(Arc::ptr_eq(&hit, &client));
        assert!(cache.lookup(&fingerprint("bob")).is_none());
        assert_eq!(cache.served(), 1);
    }

    #[tokio::test]
    async fn test_store_replaces_entry() {
        let cache = SessionCache::new(TTL);
        cache.store(fingerprint("alice"), session("old"));
        cache.store(fingerprint("alice"), session("new"));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.lookup(&fingerprint("alice")).unwrap().token(), "new");
    }

    #[tokio::test(start_paused = true)]
    async fn test_served_just_before_ttl() {
        let cache = SessionCache::new(TTL);
        cache.store(fingerprint("alice"), session("tok"));

        tokio::time::advance(TTL - Duration::from_millis(1)).await;

        assert!(cache.lookup(&fingerprint("alice")).is_some());
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_evicted_just_after_ttl() {
        let cache = SessionCache::new(TTL);
        cache.store(fingerprint("alice"), session("tok"));

        tokio::time::advance(TTL + Duration::from_millis(1)).await;

        // Still stored until a lookup notices
        assert_eq!(cache.len(), 1);
        assert!(cache.lookup(&fingerprint("alice")).is_none());
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.served(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_after_expiry_resets_clock() {
        let cache = SessionCache::new(TTL);
        cache.store(fingerprint("alice"), session("first"));
        tokio::time::advance(TTL + Duration::from_secs(1)).await;
        assert!(cache.lookup(&fingerprint("alice")).is_none());

        cache.store(fingerprint("alice"), session("second"));
        tokio::time::advance(TTL / 2).await;
        assert_eq!(cache.lookup(&fingerprint("alice")).unwrap().token(), "second");
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let cache = SessionCache::new(TTL);
        cache.store(fingerprint("alice"), session("a"));
        cache.store(fingerprint("bob"), session("b"));

        assert!(cache.remove(&fingerprint("alice")));
        assert!(!cache.remove(&fingerprint("alice")));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_lookup_and_store() {
        let cache = Arc::new(SessionCache::new(TTL));
        let fp = fingerprint("alice");

        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let cache = Arc::clone(&cache);
                let fp = fp.clone();
                tokio::spawn(async move {
                    match cache.lookup(&fp) {
                        Some(hit) => hit.token().to_string(),
                        None => {
                            let token = format!("tok-{i}");
                            cache.store(fp, session(&token));
                            token
                        }
                    }
                })
            })
            .collect();

        for task in futures::future::join_all(tasks).await {
            assert!(task.unwrap().starts_with("tok-"));
        }

        assert_eq!(cache.len(), 1);
        let stored = cache.lookup(&fp).unwrap();
        assert!(stored.token().starts_with("tok-"));
    }
}
