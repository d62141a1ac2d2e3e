//! Local datastore contract and backends.
//!
//! The signer only needs a small slice of a key/value store: point reads,
//! point writes, and batched writes with bounded retry. The production
//! column-store backend lives outside this crate; [`MemoryDatastore`] is
//! the in-tree implementation used by nodes without one and by tests.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod batch;
pub mod memory;

pub use batch::{Batch, BatchConfig};
pub use memory::MemoryDatastore;

/// Namespace prefix under which the signer keeps all of its local keys.
pub const SIGNER_NAMESPACE: &str = "/message-signer";

/// Key into the local datastore.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(String);

impl Key {
    /// Creates a key from its raw path form.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Key nested one segment below this one.
    pub fn child(&self, segment: &str) -> Self {
        Self(format!("{}/{segment}", self.0))
    }

    /// Raw path form of the key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors surfaced by datastore backends.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreError {
    /// The backend failed to serve the request.
    #[error("datastore backend error: {0}")]
    Backend(String),

    /// A stored value did not decode as expected.
    #[error("malformed value under {key}: {reason}")]
    InvalidValue {
        /// Key the malformed value was read from.
        key: String,
        /// Why decoding failed.
        reason: String,
    },
}

/// Contract consumed from the local storage collaborator.
///
/// Implementations must be safe for concurrent use; the signer issues
/// reads and writes from multiple tasks.
#[async_trait]
pub trait Datastore: Send + Sync + 'static {
    /// Reads the value under `key`, `None` if absent.
    async fn get(&self, key: &Key) -> Result<Option<Vec<u8>>, StoreError>;

    /// Writes `value` under `key`, replacing any previous value.
    async fn put(&self, key: Key, value: Vec<u8>) -> Result<(), StoreError>;

    /// Whether a value exists under `key`.
    async fn has(&self, key: &Key) -> Result<bool, StoreError>;

    /// Removes the value under `key`, if any.
    async fn delete(&self, key: &Key) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_keys_nest_under_parent() {
        let root = Key::new(SIGNER_NAMESPACE);
        let nested = root.child("nonce").child("0xabc");
        assert_eq!(nested.as_str(), "/message-signer/nonce/0xabc");
    }
}
