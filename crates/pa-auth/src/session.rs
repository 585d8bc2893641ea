use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::{PaAuthError, Result};
use crate::store::SecretStore;

/// Secret name under which a service's cached session is stored
pub const SESSION_SECRET: &str = "session";

/// Cached portal session with its absolute expiry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl SessionToken {
    /// Token expiring `ttl` after `now`; fails when the expiry is not representable
    pub fn new(token: String, now: DateTime<Utc>, ttl: Duration) -> Result<Self> {
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|delta| now.checked_add_signed(delta))
            .ok_or(PaAuthError::TtlOutOfRange(ttl))?;

        Ok(Self { token, expires_at })
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Time source for expiry checks
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Time-boxed session tokens on top of a [`SecretStore`].
///
/// Expiry is checked lazily: an expired entry is deleted by the read that
/// finds it.
#[derive(Clone)]
pub struct SessionCache {
    store: Arc<dyn SecretStore>,
    clock: Arc<dyn Clock>,
}

impl SessionCache {
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn SecretStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn get(&self, service: &str) -> Result<Option<String>> {
        let Some(raw) = self.store.get(service, SESSION_SECRET).await? else {
            return Ok(None);
        };

        let session: SessionToken = match serde_json::from_str(&raw) {
            Ok(session) => session,
            Err(e) => {
                warn!(service, "Discarding unreadable cached session: {}", e);
                self.delete(service).await?;
                return Ok(None);
            }
        };

        if session.is_expired(self.clock.now()) {
            debug!(service, expired_at = %session.expires_at, "Cached session expired");
            self.delete(service).await?;
            return Ok(None);
        }

        Ok(Some(session.token))
    }

    pub async fn set(&self, service: &str, token: &str, ttl: Duration) -> Result<()> {
        let session = SessionToken::new(token.to_string(), self.clock.now(), ttl)?;
        let payload = serde_json::to_string(&session)?;
        self.store.set(service, SESSION_SECRET, &payload).await?;
        debug!(service, expires_at = %session.expires_at, "Cached session");
        Ok(())
    }

    pub async fn delete(&self, service: &str) -> Result<()> {
        self.store.delete(service, SESSION_SECRET).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemorySecretStore;
    use std::sync::Mutex;

    struct ManualClock(Mutex<DateTime<Utc>>);

    impl ManualClock {
        fn advance(&self, by: chrono::Duration) {
            let mut now = self.0.lock().unwrap();
            *now += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    fn cache() -> (SessionCache, Arc<ManualClock>, MemorySecretStore) {
        let store = MemorySecretStore::new();
        let clock = Arc::new(ManualClock(Mutex::new(Utc::now())));
        let cache = SessionCache::with_clock(Arc::new(store.clone()), clock.clone());
        (cache, clock, store)
    }

    const TTL: Duration = Duration::from_secs(30 * 60);

    #[tokio::test]
    async fn test_get_within_ttl() {
        let (cache, clock, _) = cache();
        cache.set("monidenum", "abc123", TTL).await.unwrap();
        assert_eq!(cache.get("monidenum").await.unwrap().as_deref(), Some("abc123"));

        clock.advance(chrono::Duration::minutes(30));
        assert_eq!(cache.get("monidenum").await.unwrap().as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn test_expired_read_evicts() {
        let (cache, clock, store) = cache();
        cache.set("monidenum", "abc123", TTL).await.unwrap();

        clock.advance(chrono::Duration::minutes(31));
        assert_eq!(cache.get("monidenum").await.unwrap(), None);
        assert!(store.get("monidenum", SESSION_SECRET).await.unwrap().is_none());

        clock.advance(chrono::Duration::minutes(-31));
        assert_eq!(cache.get("monidenum").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_absent() {
        let (cache, _, store) = cache();
        store.set("monidenum", SESSION_SECRET, "not json").await.unwrap();

        assert_eq!(cache.get("monidenum").await.unwrap(), None);
        assert!(store.get("monidenum", SESSION_SECRET).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unrepresentable_ttl_is_refused() {
        let (cache, _, store) = cache();
        cache.set("monidenum", "abc123", TTL).await.unwrap();

        let err = cache
            .set("monidenum", "def456", Duration::from_secs(1_000_000_000_000 * 60))
            .await
            .unwrap_err();
        assert!(matches!(err, PaAuthError::TtlOutOfRange(_)));

        let err = cache.set("monidenum", "def456", Duration::MAX).await.unwrap_err();
        assert!(matches!(err, PaAuthError::TtlOutOfRange(_)));

        assert!(store.get("monidenum", SESSION_SECRET).await.unwrap().is_some());
        assert_eq!(cache.get("monidenum").await.unwrap().as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn test_delete_clears() {
        let (cache, _, _) = cache();
        cache.set("monidenum", "abc123", TTL).await.unwrap();
        cache.delete("monidenum").await.unwrap();
        cache.delete("monidenum").await.unwrap();
        assert_eq!(cache.get("monidenum").await.unwrap(), None);
    }
}
