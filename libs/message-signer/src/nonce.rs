//! Durable per-address nonce tracking.

use std::sync::Arc;

use alloy_primitives::Address;
use tracing::trace;

use crate::store::{Datastore, Key, StoreError, SIGNER_NAMESPACE};

/// Datastore key holding the next nonce for `address`.
pub(crate) fn nonce_key(address: &Address) -> Key {
    Key::new(format!("{SIGNER_NAMESPACE}/nonce/{address}"))
}

/// Fixed-width big-endian encoding of a stored nonce.
pub(crate) fn encode_nonce(nonce: u64) -> Vec<u8> {
    nonce.to_be_bytes().to_vec()
}

pub(crate) fn decode_nonce(key: &Key, raw: &[u8]) -> Result<u64, StoreError> {
    let bytes: [u8; 8] = raw.try_into().map_err(|_| StoreError::InvalidValue {
        key: key.to_string(),
        reason: format!("expected 8 bytes, got {}", raw.len()),
    })?;
    Ok(u64::from_be_bytes(bytes))
}

/// Map from sender address to the next nonce to use, backed by the
/// local datastore.
///
/// The store itself provides no exclusivity; callers serialize
/// read-increment cycles (see the base signer's lock). An address never
/// written before starts at nonce 0.
#[derive(Debug)]
pub struct NonceStore<D> {
    store: Arc<D>,
}

impl<D: Datastore> NonceStore<D> {
    /// Creates a nonce store over `store`.
    pub fn new(store: Arc<D>) -> Self {
        Self { store }
    }

    /// The next nonce to assign for `address`.
    pub async fn next_nonce(&self, address: Address) -> Result<u64, StoreError> {
        let key = nonce_key(&address);
        let next = match self.store.get(&key).await? {
            Some(raw) => decode_nonce(&key, &raw)?,
            None => 0,
        };
        trace!(address = %address, nonce = next, "read next nonce");
        Ok(next)
    }

    /// Records that `assigned` was consumed for `address`; the next
    /// call to [`NonceStore::next_nonce`] returns `assigned + 1`.
    pub async fn save_nonce(&self, address: Address, assigned: u64) -> Result<(), StoreError> {
        self.reset_next(address, assigned + 1).await
    }

    /// Overwrites the next nonce for `address`.
    ///
    /// Used to roll a consumed nonce back when its signing operation
    /// never reached the replicated log, and to raise the local
    /// sequence to the cluster-agreed floor after a leadership change.
    pub async fn reset_next(&self, address: Address, next: u64) -> Result<(), StoreError> {
        trace!(address = %address, nonce = next, "storing next nonce");
        self.store.put(nonce_key(&address), encode_nonce(next)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryDatastore;

    fn address(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    #[tokio::test]
    async fn fresh_address_starts_at_zero() {
        let nonces = NonceStore::new(Arc::new(MemoryDatastore::new()));
        assert_eq!(nonces.next_nonce(address(1)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn save_nonce_advances_by_one() {
        let nonces = NonceStore::new(Arc::new(MemoryDatastore::new()));
        let addr = address(1);

        nonces.save_nonce(addr, 0).await.unwrap();
        assert_eq!(nonces.next_nonce(addr).await.unwrap(), 1);
        nonces.save_nonce(addr, 1).await.unwrap();
        assert_eq!(nonces.next_nonce(addr).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn addresses_are_tracked_independently() {
        let nonces = NonceStore::new(Arc::new(MemoryDatastore::new()));

        nonces.save_nonce(address(1), 5).await.unwrap();
        assert_eq!(nonces.next_nonce(address(1)).await.unwrap(), 6);
        assert_eq!(nonces.next_nonce(address(2)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn reset_next_overwrites() {
        let nonces = NonceStore::new(Arc::new(MemoryDatastore::new()));
        let addr = address(1);

        nonces.save_nonce(addr, 4).await.unwrap();
        nonces.reset_next(addr, 2).await.unwrap();
        assert_eq!(nonces.next_nonce(addr).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn malformed_value_is_rejected() {
        let store = Arc::new(MemoryDatastore::new());
        let addr = address(1);
        store.put(nonce_key(&addr), vec![1, 2, 3]).await.unwrap();

        let nonces = NonceStore::new(store);
        let err = nonces.next_nonce(addr).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidValue { .. }));
    }

    #[tokio::test]
    async fn nonces_survive_store_reuse() {
        let store = Arc::new(MemoryDatastore::new());
        let addr = address(1);

        let nonces = NonceStore::new(Arc::clone(&store));
        nonces.save_nonce(addr, 7).await.unwrap();
        drop(nonces);

        let reopened = NonceStore::new(store);
        assert_eq!(reopened.next_nonce(addr).await.unwrap(), 8);
    }
}
