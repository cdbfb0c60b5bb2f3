use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use lru::LruCache;
use tokio::sync::{Notify, RwLock};

use super::{Fetcher, Locator};
use crate::error::IoError;

/// Default capacity in number of chunks.
pub const DEFAULT_CHUNK_CAPACITY: usize = 256;

type InFlight = Mutex<HashMap<Locator, Arc<Notify>>>;

/// LRU cache of fetched chunks, keyed by chunk locator.
///
/// - Concurrent requests for the same chunk share one fetch (singleflight)
/// - Failed fetches are not cached, so a missing chunk is re-requested
///   and reported again on every read
/// - A fetch whose caller goes away releases its waiters, one of which
///   takes over the fetch
pub struct ChunkCache {
    fetcher: Arc<dyn Fetcher>,
    cache: RwLock<LruCache<Locator, Bytes>>,

    /// Never held across an await
    in_flight: InFlight,
}

impl ChunkCache {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self::with_capacity(fetcher, DEFAULT_CHUNK_CAPACITY)
    }

    pub fn with_capacity(fetcher: Arc<dyn Fetcher>, capacity: usize) -> Self {
        Self {
            fetcher,
            cache: RwLock::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn fetcher(&self) -> &Arc<dyn Fetcher> {
        &self.fetcher
    }

    /// Get a chunk from the cache or fetch it.
    pub async fn get(&self, locator: &Locator) -> Result<Bytes, IoError> {
        loop {
            {
                let mut cache = self.cache.write().await;
                if let Some(data) = cache.get(locator) {
                    return Ok(data.clone());
                }
            }

            let pending = {
                let mut in_flight = lock(&self.in_flight);
                match in_flight.get(locator) {
                    Some(notify) => Some(notify.clone()),
                    None => {
                        in_flight.insert(locator.clone(), Arc::new(Notify::new()));
                        None
                    }
                }
            };

            if let Some(notify) = pending {
                let notified = notify.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                // The leader removes its entry before notifying, so an entry
                // still present means the wakeup is yet to come
                let still_pending = lock(&self.in_flight)
                    .get(locator)
                    .is_some_and(|current| Arc::ptr_eq(current, &notify));
                if still_pending {
                    notified.await;
                }
                continue;
            }

            let guard = InFlightGuard {
                in_flight: &self.in_flight,
                locator,
            };
            let result = self.fetcher.fetch_binary(locator, None).await;
            if let Ok(ref data) = result {
                self.cache.write().await.put(locator.clone(), data.clone());
            }
            drop(guard);

            // Waiters on a failed fetch retry and observe the error themselves
            return result;
        }
    }

    /// Number of cached chunks.
    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn lock(in_flight: &InFlight) -> MutexGuard<'_, HashMap<Locator, Arc<Notify>>> {
    in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Clears an in-flight entry and wakes its waiters, also when the fetching
/// future is dropped before completion.
struct InFlightGuard<'a> {
    in_flight: &'a InFlight,
    locator: &'a Locator,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let Some(notify) = lock(self.in_flight).remove(self.locator) {
            notify.notify_waiters();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::Progress;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::time::{sleep, Duration};

    /// Mock fetcher serving `chunk-N` keys and counting requests
    struct MockFetcher {
        fetch_count: AtomicUsize,
        is_fetching: AtomicBool,
        delay: Duration,
    }

    impl MockFetcher {
        fn new(delay: Duration) -> Self {
            Self {
                fetch_count: AtomicUsize::new(0),
                is_fetching: AtomicBool::new(false),
                delay,
            }
        }

        fn fetch_count(&self) -> usize {
            self.fetch_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetcher for MockFetcher {
        async fn fetch_binary(
            &self,
            locator: &Locator,
            _progress: Option<Progress<'_>>,
        ) -> Result<Bytes, IoError> {
            let was_fetching = self.is_fetching.swap(true, Ordering::SeqCst);
            assert!(!was_fetching, "concurrent fetches, singleflight failed");
            self.fetch_count.fetch_add(1, Ordering::SeqCst);
            sleep(self.delay).await;
            self.is_fetching.store(false, Ordering::SeqCst);

            let name = locator.file_name();
            if name.starts_with("missing") {
                return Err(IoError::NotFound(name));
            }
            Ok(Bytes::from(name))
        }
    }

    fn chunk(key: &str) -> Locator {
        Locator::S3 {
            bucket: "bucket".to_string(),
            key: key.to_string(),
        }
    }

    #[tokio::test]
    async fn test_cache_hit() {
        let fetcher = Arc::new(MockFetcher::new(Duration::ZERO));
        let cache = ChunkCache::with_capacity(fetcher.clone(), 4);

        assert_eq!(cache.get(&chunk("chunk-0")).await.unwrap(), "chunk-0");
        assert_eq!(cache.get(&chunk("chunk-0")).await.unwrap(), "chunk-0");
        assert_eq!(fetcher.fetch_count(), 1);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_eviction() {
        let fetcher = Arc::new(MockFetcher::new(Duration::ZERO));
        let cache = ChunkCache::with_capacity(fetcher.clone(), 2);

        cache.get(&chunk("chunk-0")).await.unwrap();
        cache.get(&chunk("chunk-1")).await.unwrap();
        cache.get(&chunk("chunk-2")).await.unwrap();
        assert_eq!(fetcher.fetch_count(), 3);

        cache.get(&chunk("chunk-2")).await.unwrap();
        assert_eq!(fetcher.fetch_count(), 3);

        cache.get(&chunk("chunk-0")).await.unwrap();
        assert_eq!(fetcher.fetch_count(), 4);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let fetcher = Arc::new(MockFetcher::new(Duration::ZERO));
        let cache = ChunkCache::with_capacity(fetcher.clone(), 4);

        assert!(matches!(
            cache.get(&chunk("missing-0")).await,
            Err(IoError::NotFound(_))
        ));
        assert!(cache.get(&chunk("missing-0")).await.is_err());
        assert_eq!(fetcher.fetch_count(), 2);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_concurrent_gets_singleflight() {
        let fetcher = Arc::new(MockFetcher::new(Duration::from_millis(50)));
        let cache = Arc::new(ChunkCache::with_capacity(fetcher.clone(), 4));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache.get(&chunk("chunk-7")).await.unwrap()
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), "chunk-7");
        }
        assert_eq!(fetcher.fetch_count(), 1);
    }

    /// Stalls on the first request, answers every later one at once.
    struct StallOnceFetcher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Fetcher for StallOnceFetcher {
        async fn fetch_binary(
            &self,
            locator: &Locator,
            _progress: Option<Progress<'_>>,
        ) -> Result<Bytes, IoError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                sleep(Duration::from_secs(3600)).await;
            }
            Ok(Bytes::from(locator.file_name()))
        }
    }

    #[tokio::test]
    async fn test_cancelled_fetch_does_not_wedge_later_gets() {
        let fetcher = Arc::new(StallOnceFetcher {
            calls: AtomicUsize::new(0),
        });
        let cache = ChunkCache::with_capacity(fetcher.clone(), 4);

        let first = tokio::time::timeout(Duration::from_millis(50), cache.get(&chunk("chunk-3"))).await;
        assert!(first.is_err());

        let second = tokio::time::timeout(Duration::from_secs(2), cache.get(&chunk("chunk-3")))
            .await
            .expect("second get must not hang");
        assert_eq!(second.unwrap(), "chunk-3");
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_waiter_takes_over_aborted_fetch() {
        let fetcher = Arc::new(StallOnceFetcher {
            calls: AtomicUsize::new(0),
        });
        let cache = Arc::new(ChunkCache::with_capacity(fetcher.clone(), 4));

        let leader = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get(&chunk("chunk-5")).await })
        };
        sleep(Duration::from_millis(20)).await;
        let waiter = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get(&chunk("chunk-5")).await })
        };
        sleep(Duration::from_millis(20)).await;
        leader.abort();

        let data = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("waiter must be released")
            .unwrap()
            .unwrap();
        assert_eq!(data, "chunk-5");
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }
}
