//! Wallet abstraction over private key material.

use std::collections::HashMap;

use alloy_primitives::{Address, Signature, B256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

/// Trait for producing signatures over message payloads.
///
/// This trait abstracts over key management backends, allowing the
/// signer to use an in-process key map or a remote wallet service.
#[async_trait]
pub trait Wallet: Send + Sync + 'static {
    /// Sign `payload` on behalf of `address`.
    ///
    /// The payload is SHA-256 hashed before the ECDSA signature is
    /// produced, so callers hand over the raw canonical bytes.
    async fn sign(&self, address: Address, payload: &[u8]) -> Result<Signature, WalletError>;
}

/// In-process wallet holding one private key per address.
#[derive(Debug, Default)]
pub struct LocalWallet {
    keys: HashMap<Address, PrivateKeySigner>,
}

impl LocalWallet {
    /// Creates an empty wallet.
    pub fn new() -> Self {
        Self { keys: HashMap::new() }
    }

    /// Imports a private key and returns the address it signs for.
    pub fn import(&mut self, signer: PrivateKeySigner) -> Address {
        let address = signer.address();
        self.keys.insert(address, signer);
        address
    }

    /// Addresses this wallet can sign for.
    pub fn addresses(&self) -> Vec<Address> {
        self.keys.keys().copied().collect()
    }
}

#[async_trait]
impl Wallet for LocalWallet {
    async fn sign(&self, address: Address, payload: &[u8]) -> Result<Signature, WalletError> {
        let signer = self
            .keys
            .get(&address)
            .ok_or(WalletError::UnknownAddress(address))?;

        let digest = B256::from_slice(Sha256::digest(payload).as_slice());
        debug!(
            address = %address,
            payloadLen = payload.len(),
            "signing message digest"
        );

        signer
            .sign_hash_sync(&digest)
            .map_err(|e| WalletError::Signing(e.to_string()))
    }
}

/// Errors that can occur during wallet operations.
#[derive(Debug, Error)]
pub enum WalletError {
    /// The wallet holds no key for the requested sender.
    #[error("no key for address {0}")]
    UnknownAddress(Address),

    /// The underlying key failed to produce a signature.
    #[error("signing error: {0}")]
    Signing(String),
}
