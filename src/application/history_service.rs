// History service - cached, de-duplicated access to historical samples
use crate::application::history_cache::{cache_key, HistoryCache};
use crate::application::host::HistorySource;
use crate::domain::telemetry::HistorySample;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HistoryError {
    #[error("history fetch failed: {0}")]
    Fetch(String),
    #[error("no entity id given")]
    EmptyEntity,
}

pub type HistoryResult = Result<Arc<Vec<HistorySample>>, HistoryError>;

type PendingFetch = Shared<BoxFuture<'static, HistoryResult>>;

struct CoordinatorState {
    cache: HistoryCache,
    inflight: HashMap<String, PendingFetch>,
}

struct Inner {
    source: Arc<dyn HistorySource>,
    state: Mutex<CoordinatorState>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, CoordinatorState> {
        // The state is left consistent between statements, so a poisoned
        // lock is still usable.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Single owner of the history cache. Cloning shares the same cache.
#[derive(Clone)]
pub struct HistoryService {
    inner: Arc<Inner>,
}

impl HistoryService {
    pub fn new(source: Arc<dyn HistorySource>, capacity: usize, freshness: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                state: Mutex::new(CoordinatorState {
                    cache: HistoryCache::new(capacity, freshness),
                    inflight: HashMap::new(),
                }),
            }),
        }
    }

    /// Samples for `entity_id` over the last `hours`.
    ///
    /// Served from cache while fresh; concurrent callers for the same key share
    /// one host fetch. Failures are returned to every waiting caller and are
    /// not cached.
    pub async fn get_history(&self, entity_id: &str, hours: u32) -> HistoryResult {
        if entity_id.trim().is_empty() {
            return Err(HistoryError::EmptyEntity);
        }
        let key = cache_key(entity_id, hours);

        let pending = {
            let mut state = self.inner.lock();
            if let Some(points) = state.cache.get_fresh(&key, Instant::now()) {
                tracing::debug!("History cache hit for {}", key);
                return Ok(points);
            }
            match state.inflight.get(&key) {
                Some(pending) => {
                    tracing::debug!("Joining in-flight history fetch for {}", key);
                    pending.clone()
                }
                None => {
                    let pending = self.start_fetch(key.clone(), entity_id.to_string(), hours);
                    state.inflight.insert(key, pending.clone());
                    pending
                }
            }
        };

        pending.await
    }

    fn start_fetch(&self, key: String, entity_id: String, hours: u32) -> PendingFetch {
        let inner = self.inner.clone();
        async move {
            let end = chrono::Utc::now();
            let start = end - chrono::Duration::hours(i64::from(hours));
            tracing::debug!("Fetching {}h of history for {}", hours, entity_id);

            let result = inner.source.fetch_history(&entity_id, start, end).await;

            let mut state = inner.lock();
            state.inflight.remove(&key);
            match result {
                Ok(samples) => {
                    let points = Arc::new(samples);
                    let evicted = state.cache.insert(key, points.clone(), Instant::now());
                    for old in evicted {
                        tracing::debug!("Evicted history cache entry {}", old);
                    }
                    Ok(points)
                }
                Err(e) => {
                    tracing::warn!("History fetch for {} failed: {:#}", entity_id, e);
                    Err(HistoryError::Fetch(e.to_string()))
                }
            }
        }
        .boxed()
        .shared()
    }

    pub fn cached_entries(&self) -> usize {
        self.inner.lock().cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts host calls; each fetch takes 50ms of (paused) time.
    struct CountingSource {
        calls: AtomicUsize,
        fail_first: bool,
    }

    impl CountingSource {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail_first: false,
            })
        }

        fn failing_once() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail_first: true,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HistorySource for CountingSource {
        async fn fetch_history(
            &self,
            entity_id: &str,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> anyhow::Result<Vec<HistorySample>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            if self.fail_first && n == 0 {
                anyhow::bail!("host unavailable");
            }
            Ok(vec![
                HistorySample::new(entity_id.len() as f64, Some("2024-03-01T09:00:00Z")),
                HistorySample::new(1.0, Some("2024-03-01T10:00:00Z")),
            ])
        }
    }

    fn service(source: Arc<CountingSource>, capacity: usize) -> HistoryService {
        HistoryService::new(source, capacity, Duration::from_secs(60))
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_calls_share_one_fetch() {
        let source = CountingSource::new();
        let svc = service(source.clone(), 30);

        let (a, b) = tokio::join!(
            svc.get_history("sensor.co2", 24),
            svc.get_history("sensor.co2", 24)
        );

        assert_eq!(source.calls(), 1);
        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_different_keys_fetch_independently() {
        let source = CountingSource::new();
        let svc = service(source.clone(), 30);

        let (a, b) = tokio::join!(
            svc.get_history("sensor.co2", 24),
            svc.get_history("sensor.co2", 6)
        );

        assert!(a.is_ok() && b.is_ok());
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_entry_skips_host() {
        let source = CountingSource::new();
        let svc = service(source.clone(), 30);

        svc.get_history("sensor.co2", 24).await.unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;
        svc.get_history("sensor.co2", 24).await.unwrap();
        assert_eq!(source.calls(), 1);

        tokio::time::advance(Duration::from_secs(31)).await;
        svc.get_history("sensor.co2", 24).await.unwrap();
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lru_eviction_triggers_refetch() {
        let source = CountingSource::new();
        let svc = service(source.clone(), 2);

        svc.get_history("A", 24).await.unwrap();
        svc.get_history("B", 24).await.unwrap();
        svc.get_history("C", 24).await.unwrap();
        assert_eq!(source.calls(), 3);
        assert_eq!(svc.cached_entries(), 2);

        svc.get_history("A", 24).await.unwrap();
        assert_eq!(source.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_not_cached() {
        let source = CountingSource::failing_once();
        let svc = service(source.clone(), 30);

        let first = svc.get_history("sensor.co2", 24).await;
        assert!(matches!(first, Err(HistoryError::Fetch(_))));
        assert_eq!(svc.cached_entries(), 0);

        let second = svc.get_history("sensor.co2", 24).await;
        assert_eq!(second.unwrap().len(), 2);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_reaches_every_joined_caller() {
        let source = CountingSource::failing_once();
        let svc = service(source.clone(), 30);

        let (a, b) = tokio::join!(
            svc.get_history("sensor.co2", 24),
            svc.get_history("sensor.co2", 24)
        );
        assert!(a.is_err() && b.is_err());
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_entity_is_rejected() {
        let source = CountingSource::new();
        let svc = service(source.clone(), 30);
        assert_eq!(svc.get_history("  ", 24).await, Err(HistoryError::EmptyEntity));
        assert_eq!(source.calls(), 0);
    }
}
