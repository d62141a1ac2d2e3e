//! Batched writes with bounded retry.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio_retry::strategy::ExponentialBackoff;
use tracing::warn;

use super::{Datastore, Key, StoreError};

/// Entries buffered before an automatic mid-batch flush.
pub const DEFAULT_BATCH_MAX_SIZE: usize = 64;

const DEFAULT_COMMIT_RETRIES: usize = 5;
const DEFAULT_RETRY_BASE_MS: u64 = 10;
const MAX_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Tuning for [`Batch`] flushing and commit retry behavior.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct BatchConfig {
    /// Buffered entries that trigger an automatic flush.
    #[serde(default = "default_max_size")]
    pub max_size: usize,
    /// Retries of a failed commit before the error is surfaced.
    #[serde(default = "default_commit_retries")]
    pub commit_retries: usize,
    /// Base of the exponential backoff between commit retries, in
    /// milliseconds.
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
}

const fn default_max_size() -> usize {
    DEFAULT_BATCH_MAX_SIZE
}

const fn default_commit_retries() -> usize {
    DEFAULT_COMMIT_RETRIES
}

const fn default_retry_base_ms() -> u64 {
    DEFAULT_RETRY_BASE_MS
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_size: default_max_size(),
            commit_retries: default_commit_retries(),
            retry_base_ms: default_retry_base_ms(),
        }
    }
}

/// Write batch over a [`Datastore`].
///
/// Writes are buffered and flushed once `max_size` entries accumulate;
/// `commit` flushes the rest, retrying transient backend failures with
/// exponential backoff up to `commit_retries` attempts. Entries are
/// plain upserts, so a retried flush re-applying already-written
/// entries is harmless.
#[derive(Debug)]
pub struct Batch<D> {
    store: Arc<D>,
    config: BatchConfig,
    pending: Vec<(Key, Vec<u8>)>,
}

impl<D: Datastore> Batch<D> {
    /// Creates an empty batch writing through to `store`.
    pub fn new(store: Arc<D>, config: BatchConfig) -> Self {
        Self { store, config, pending: Vec::new() }
    }

    /// Buffers a write, flushing if the batch is full.
    ///
    /// A failed mid-batch flush keeps the entries buffered; they are
    /// retried by [`Batch::commit`].
    pub async fn put(&mut self, key: Key, value: Vec<u8>) {
        self.pending.push((key, value));
        if self.pending.len() >= self.config.max_size {
            match self.write_pending().await {
                Ok(()) => self.pending.clear(),
                Err(e) => warn!(error = %e, "mid-batch flush failed, keeping entries for commit"),
            }
        }
    }

    /// Flushes all buffered entries, retrying transient failures.
    pub async fn commit(&mut self) -> Result<(), StoreError> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let mut delays = ExponentialBackoff::from_millis(self.config.retry_base_ms)
            .max_delay(MAX_RETRY_DELAY)
            .take(self.config.commit_retries);

        loop {
            match self.write_pending().await {
                Ok(()) => {
                    self.pending.clear();
                    return Ok(());
                }
                Err(e) => match delays.next() {
                    Some(delay) => {
                        warn!(
                            error = %e,
                            delayMs = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            "batch commit failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => return Err(e),
                },
            }
        }
    }

    /// Buffered entries not yet flushed.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether the batch has no buffered entries.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    async fn write_pending(&self) -> Result<(), StoreError> {
        for (key, value) in &self.pending {
            self.store.put(key.clone(), value.clone()).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::store::MemoryDatastore;

    /// Datastore that fails the first `failures` puts, then delegates.
    #[derive(Debug, Default)]
    struct FlakyDatastore {
        inner: MemoryDatastore,
        failures: AtomicUsize,
    }

    impl FlakyDatastore {
        fn failing(failures: usize) -> Self {
            Self { inner: MemoryDatastore::new(), failures: AtomicUsize::new(failures) }
        }
    }

    #[async_trait]
    impl Datastore for FlakyDatastore {
        async fn get(&self, key: &Key) -> Result<Option<Vec<u8>>, StoreError> {
            self.inner.get(key).await
        }

        async fn put(&self, key: Key, value: Vec<u8>) -> Result<(), StoreError> {
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(StoreError::Backend("transient write failure".to_string()));
            }
            self.inner.put(key, value).await
        }

        async fn has(&self, key: &Key) -> Result<bool, StoreError> {
            self.inner.has(key).await
        }

        async fn delete(&self, key: &Key) -> Result<(), StoreError> {
            self.inner.delete(key).await
        }
    }

    fn fast_config(commit_retries: usize) -> BatchConfig {
        BatchConfig { max_size: 64, commit_retries, retry_base_ms: 1 }
    }

    #[tokio::test]
    async fn commit_writes_all_entries() {
        let store = Arc::new(MemoryDatastore::new());
        let mut batch = Batch::new(Arc::clone(&store), BatchConfig::default());

        batch.put(Key::new("/a"), vec![1]).await;
        batch.put(Key::new("/b"), vec![2]).await;
        batch.commit().await.unwrap();

        assert_eq!(store.get(&Key::new("/a")).await.unwrap(), Some(vec![1]));
        assert_eq!(store.get(&Key::new("/b")).await.unwrap(), Some(vec![2]));
        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn full_batch_flushes_on_put() {
        let store = Arc::new(MemoryDatastore::new());
        let config = BatchConfig { max_size: 2, ..fast_config(0) };
        let mut batch = Batch::new(Arc::clone(&store), config);

        batch.put(Key::new("/a"), vec![1]).await;
        assert_eq!(batch.len(), 1);
        batch.put(Key::new("/b"), vec![2]).await;
        assert!(batch.is_empty());
        assert_eq!(store.get(&Key::new("/b")).await.unwrap(), Some(vec![2]));
    }

    #[tokio::test]
    async fn commit_retries_transient_failures() {
        let store = Arc::new(FlakyDatastore::failing(2));
        let mut batch = Batch::new(Arc::clone(&store), fast_config(5));

        batch.put(Key::new("/a"), vec![1]).await;
        batch.commit().await.unwrap();

        assert_eq!(store.get(&Key::new("/a")).await.unwrap(), Some(vec![1]));
    }

    #[tokio::test]
    async fn commit_gives_up_after_bounded_retries() {
        let store = Arc::new(FlakyDatastore::failing(usize::MAX));
        let mut batch = Batch::new(Arc::clone(&store), fast_config(2));

        batch.put(Key::new("/a"), vec![1]).await;
        let err = batch.commit().await.unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
    }
}
