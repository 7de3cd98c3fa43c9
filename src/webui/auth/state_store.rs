use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// How long an issued `state` value stays redeemable.
pub const STATE_TTL: Duration = Duration::from_secs(10 * 60);

/// Upper bound on outstanding tokens. Past it the oldest are evicted.
pub const MAX_PENDING_STATES: usize = 10_000;

/// How often the background sweeper drops expired tokens.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Default)]
struct Pending {
    issued: HashMap<String, Instant>,
    // Issue order. May hold entries already taken; those are skipped on pop.
    order: VecDeque<(String, Instant)>,
}

impl Pending {
    fn is_live(&self, state: &str, at: Instant) -> bool {
        self.issued.get(state) == Some(&at)
    }

    fn pop_oldest(&mut self) -> Option<String> {
        while let Some((state, at)) = self.order.pop_front() {
            if self.is_live(&state, at) {
                self.issued.remove(&state);
                return Some(state);
            }
        }
        None
    }

    fn expire(&mut self, ttl: Duration) -> usize {
        let mut removed = 0;
        while let Some((state, at)) = self.order.front() {
            if at.elapsed() < ttl {
                break;
            }
            if self.is_live(state, *at) {
                self.issued.remove(state);
                removed += 1;
            }
            self.order.pop_front();
        }
        removed
    }
}

/// Pending anti-forgery tokens keyed by value. Each token is single-use.
#[derive(Clone)]
pub struct StateStore {
    inner: Arc<Mutex<Pending>>,
    ttl: Duration,
    max_pending: usize,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new(STATE_TTL)
    }
}

impl StateStore {
    pub fn new(ttl: Duration) -> Self {
        Self::with_limit(ttl, MAX_PENDING_STATES)
    }

    pub fn with_limit(ttl: Duration, max_pending: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Pending::default())),
            ttl,
            max_pending: max_pending.max(1),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Record a freshly issued token. Expired tokens go first, then the oldest
    /// live ones if the store is still full.
    pub async fn insert(&self, state: String) {
        let mut pending = self.inner.lock().await;
        pending.expire(self.ttl);

        let mut evicted = 0;
        while pending.issued.len() >= self.max_pending {
            if pending.pop_oldest().is_none() {
                break;
            }
            evicted += 1;
        }
        if evicted > 0 {
            warn!(evicted, limit = self.max_pending, "OAuth state store full, evicted oldest");
        }

        if pending.order.len() >= self.max_pending * 2 {
            let Pending { issued, order } = &mut *pending;
            order.retain(|(s, at)| issued.get(s) == Some(at));
        }

        let now = Instant::now();
        pending.order.push_back((state.clone(), now));
        pending.issued.insert(state, now);
    }

    /// Consume a token. Returns `true` only if it was issued here and has not expired.
    pub async fn take(&self, state: &str) -> bool {
        let issued = self.inner.lock().await.issued.remove(state);
        matches!(issued, Some(issued) if issued.elapsed() < self.ttl)
    }

    pub async fn purge_expired(&self) -> usize {
        self.inner.lock().await.expire(self.ttl)
    }

    pub(crate) async fn len(&self) -> usize {
        self.inner.lock().await.issued.len()
    }
}

/// Spawn the background task that drops expired tokens every `interval`.
pub fn spawn_sweeper(store: StateStore, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let purged = store.purge_expired().await;
            if purged > 0 {
                debug!(purged, "Purged expired OAuth states");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_take_is_single_use() {
        let store = StateStore::default();
        store.insert("abc".to_string()).await;
        assert!(store.take("abc").await);
        assert!(!store.take("abc").await);
    }

    #[tokio::test]
    async fn test_unknown_state_rejected() {
        let store = StateStore::default();
        assert!(!store.take("never-issued").await);
    }

    #[tokio::test]
    async fn test_expired_state_rejected_and_removed() {
        let store = StateStore::new(Duration::ZERO);
        store.insert("abc".to_string()).await;
        assert!(!store.take("abc").await);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let store = StateStore::new(Duration::ZERO);
        store.insert("a".to_string()).await;
        assert_eq!(store.purge_expired().await, 1);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_full_store_evicts_oldest() {
        let store = StateStore::with_limit(STATE_TTL, 3);
        for state in ["s1", "s2", "s3", "s4", "s5"] {
            store.insert(state.to_string()).await;
        }
        assert_eq!(store.len().await, 3);
        assert!(!store.take("s1").await);
        assert!(!store.take("s2").await);
        assert!(store.take("s3").await);
        assert!(store.take("s5").await);
    }

    #[tokio::test]
    async fn test_taken_states_do_not_count_against_limit() {
        let store = StateStore::with_limit(STATE_TTL, 2);
        for i in 0..50 {
            let state = format!("s{i}");
            store.insert(state.clone()).await;
            assert!(store.take(&state).await);
        }
        store.insert("keep".to_string()).await;
        store.insert("also".to_string()).await;
        assert_eq!(store.len().await, 2);
        assert!(store.take("keep").await);
        assert!(store.inner.lock().await.order.len() <= 4);
    }

    #[tokio::test]
    async fn test_sweeper_purges_expired() {
        let store = StateStore::new(Duration::ZERO);
        store.insert("a".to_string()).await;
        let sweeper = spawn_sweeper(store.clone(), Duration::from_millis(10));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(store.len().await, 0);
        sweeper.abort();
    }
}
