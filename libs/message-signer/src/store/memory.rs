//! In-memory datastore backend.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use super::{Datastore, Key, StoreError};

/// Hash map backed [`Datastore`].
///
/// Durable only for the process lifetime. Suitable for tests and for
/// nodes whose local cache does not need to survive restarts.
#[derive(Debug, Default)]
pub struct MemoryDatastore {
    inner: RwLock<HashMap<Key, Vec<u8>>>,
}

impl MemoryDatastore {
    /// Creates an empty datastore.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Datastore for MemoryDatastore {
    async fn get(&self, key: &Key) -> Result<Option<Vec<u8>>, StoreError> {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(map.get(key).cloned())
    }

    async fn put(&self, key: Key, value: Vec<u8>) -> Result<(), StoreError> {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        map.insert(key, value);
        Ok(())
    }

    async fn has(&self, key: &Key) -> Result<bool, StoreError> {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(map.contains_key(key))
    }

    async fn delete(&self, key: &Key) -> Result<(), StoreError> {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        map.remove(key);
        Ok(())
    }
}
