use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::sync::watch;

use crate::error::{AppError, AppResult};
use crate::models::{Recommendation, UserId};

/// Everything that shapes a recommendation result; two requests with equal
/// keys may share a cache entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub user_id: UserId,
    pub geo_bucket: (i32, i32),
    pub category: Option<String>,
    pub page: usize,
    pub page_size: usize,
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "rec:{}:{}:{}:{}:{}:{}",
            self.user_id,
            self.geo_bucket.0,
            self.geo_bucket.1,
            self.category.as_deref().unwrap_or("*"),
            self.page,
            self.page_size
        )
    }
}

type SharedResult = AppResult<Recommendation>;

enum Entry {
    Ready {
        value: Recommendation,
        expires_at: Instant,
    },
    InFlight {
        rx: watch::Receiver<Option<SharedResult>>,
        token: u64,
    },
}

/// Memoizes ranked results and coalesces concurrent identical computations
///
/// At most one computation runs per key: the first caller spawns it, later
/// callers subscribe to the same watch channel, and everyone receives the one
/// shared outcome. Computations run on a detached task so a caller that hangs
/// up cannot abort a result other waiters are relying on. Failures reach every
/// waiter and are never cached.
#[derive(Clone)]
pub struct RecommendationCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    ttl: Duration,
    entries: Mutex<HashMap<CacheKey, Entry>>,
    next_token: AtomicU64,
}

impl RecommendationCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                ttl,
                entries: Mutex::new(HashMap::new()),
                next_token: AtomicU64::new(0),
            }),
        }
    }

    pub async fn get_or_compute<F, Fut>(&self, key: CacheKey, compute: F) -> SharedResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SharedResult> + Send + 'static,
    {
        let mut rx = {
            let mut entries = self.inner.lock_entries();
            match entries.get(&key) {
                Some(Entry::Ready { value, expires_at }) if *expires_at > Instant::now() => {
                    tracing::debug!(key = %key, "Cache hit");
                    return Ok(value.clone());
                }
                Some(Entry::InFlight { rx, .. }) => {
                    tracing::debug!(key = %key, "Joining in-flight computation");
                    rx.clone()
                }
                _ => {
                    // Miss or expired: this caller starts the one computation
                    tracing::debug!(key = %key, "Cache miss, computing");
                    let token = self.inner.next_token.fetch_add(1, Ordering::Relaxed);
                    let (tx, rx) = watch::channel(None);
                    entries.insert(
                        key.clone(),
                        Entry::InFlight {
                            rx: rx.clone(),
                            token,
                        },
                    );
                    drop(entries);

                    let inner = Arc::clone(&self.inner);
                    let fut = compute();
                    tokio::spawn(async move {
                        let result = fut.await;
                        inner.settle(&key, token, &result);
                        // Waiters may all be gone; that is fine
                        let _ = tx.send(Some(result));
                    });
                    rx
                }
            }
        };

        loop {
            if let Some(result) = rx.borrow_and_update().clone() {
                return result;
            }
            if rx.changed().await.is_err() {
                // Computation task died without publishing
                return Err(AppError::Internal(
                    "recommendation computation was aborted".to_string(),
                ));
            }
        }
    }

    /// Drops every cached entry for one user; called when a new interaction
    /// is recorded. Other users' keys are untouched.
    pub fn invalidate_user(&self, user_id: UserId) {
        let mut entries = self.inner.lock_entries();
        let before = entries.len();
        entries.retain(|key, _| key.user_id != user_id);
        let dropped = before - entries.len();
        if dropped > 0 {
            tracing::debug!(user_id = %user_id, dropped, "Invalidated cached recommendations");
        }
    }

    #[cfg(test)]
    fn entry_count(&self) -> usize {
        self.inner.lock_entries().len()
    }
}

impl CacheInner {
    fn lock_entries(&self) -> MutexGuard<'_, HashMap<CacheKey, Entry>> {
        // The map is only touched between awaits; recover from poisoning
        // instead of propagating a panic from an unrelated task
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Records the outcome of an in-flight computation, unless the slot was
    /// invalidated or replaced while it ran
    fn settle(&self, key: &CacheKey, token: u64, result: &SharedResult) {
        let mut entries = self.lock_entries();
        let still_ours = matches!(
            entries.get(key),
            Some(Entry::InFlight { token: t, .. }) if *t == token
        );
        if !still_ours {
            return;
        }
        match result {
            Ok(value) => {
                entries.insert(
                    key.clone(),
                    Entry::Ready {
                        value: value.clone(),
                        expires_at: Instant::now() + self.ttl,
                    },
                );
            }
            // No negative caching: the next caller recomputes
            Err(_) => {
                entries.remove(key);
            }
        }
    }
}
