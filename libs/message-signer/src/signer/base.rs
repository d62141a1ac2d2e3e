//! The local base signer: nonce assignment, wallet invocation, and
//! local persistence. No cluster awareness; run directly it is safe
//! only for a single authoritative writer.

use std::sync::Arc;

use alloy_primitives::Address;
use async_trait::async_trait;
use tracing::{debug, error};
use uuid::Uuid;

use super::{MsgSigner, PreCommitCallback};
use crate::error::MessageSignerError;
use crate::message::{Message, SendSpec, SignedMessage};
use crate::nonce::{encode_nonce, nonce_key, NonceStore};
use crate::store::{Batch, BatchConfig, Datastore, Key, StoreError, SIGNER_NAMESPACE};
use crate::wallet::Wallet;

/// Datastore key caching the signed message for an idempotency key.
pub(crate) fn signed_message_key(key: Uuid) -> Key {
    Key::new(format!("{SIGNER_NAMESPACE}/msg/{key}"))
}

/// Signs messages with locally assigned nonces.
///
/// A single lock serializes nonce read-increment cycles: no two local
/// calls can observe the same next-nonce. The nonce advance and the
/// signed message are persisted together through a write batch, and
/// only after the caller's pre-commit callback has accepted the result.
#[derive(Debug)]
pub struct MessageSigner<D, W> {
    wallet: Arc<W>,
    store: Arc<D>,
    nonces: NonceStore<D>,
    batch_config: BatchConfig,
    lk: tokio::sync::Mutex<()>,
}

impl<D: Datastore, W: Wallet> MessageSigner<D, W> {
    /// Creates a signer over `wallet` and the local `store`.
    pub fn new(wallet: Arc<W>, store: Arc<D>, batch_config: BatchConfig) -> Self {
        Self {
            wallet,
            nonces: NonceStore::new(Arc::clone(&store)),
            store,
            batch_config,
            lk: tokio::sync::Mutex::new(()),
        }
    }

    /// Signs `msg`, assigning the next nonce for `msg.from` if the
    /// caller did not set one.
    ///
    /// When `pre_commit` returns an error the call aborts before
    /// anything is persisted, so the nonce store does not advance.
    #[tracing::instrument(skip(self, msg, pre_commit), fields(from = %msg.from, key = %spec.msg_uuid))]
    pub async fn sign_message(
        &self,
        mut msg: Message,
        spec: &SendSpec,
        pre_commit: Option<PreCommitCallback>,
    ) -> Result<SignedMessage, MessageSignerError> {
        let _guard = self.lk.lock().await;

        let assigned_here = msg.nonce.is_none();
        let nonce = match msg.nonce {
            Some(nonce) => nonce,
            None => self.nonces.next_nonce(msg.from).await?,
        };
        msg.nonce = Some(nonce);
        debug!(nonce, assignedHere = assigned_here, "nonce selected");

        let payload = msg.canonical_bytes()?;
        let signature = self.wallet.sign(msg.from, &payload).await.map_err(|e| {
            error!(nonce, error = %e, "wallet failed to sign message");
            MessageSignerError::SigningFailed(e.to_string())
        })?;
        let signed = SignedMessage { message: msg, signature };

        if let Some(callback) = pre_commit {
            // Nonce store untouched on abort: persistence happens below.
            callback(&signed).map_err(|reason| {
                debug!(nonce, reason = %reason, "pre-commit callback aborted signing");
                MessageSignerError::PreCommitAborted(reason)
            })?;
        }

        let encoded = serde_json::to_vec(&signed)
            .map_err(|e| MessageSignerError::Encoding(e.to_string()))?;
        let mut batch = Batch::new(Arc::clone(&self.store), self.batch_config.clone());
        if assigned_here {
            batch
                .put(nonce_key(&signed.message.from), encode_nonce(nonce + 1))
                .await;
        }
        batch.put(signed_message_key(spec.msg_uuid), encoded).await;
        batch.commit().await?;

        debug!(
            nonce,
            signature = %hex::encode(signed.signature.as_bytes()),
            "message signed and persisted"
        );
        Ok(signed)
    }

    /// Caches a signed message under an idempotency key.
    pub async fn store_signed_message(
        &self,
        key: Uuid,
        signed: &SignedMessage,
    ) -> Result<(), MessageSignerError> {
        let encoded = serde_json::to_vec(signed)
            .map_err(|e| MessageSignerError::Encoding(e.to_string()))?;
        self.store.put(signed_message_key(key), encoded).await?;
        Ok(())
    }

    /// The locally cached signed message for an idempotency key.
    pub async fn get_local_signed_message(
        &self,
        key: Uuid,
    ) -> Result<SignedMessage, MessageSignerError> {
        let raw = self
            .store
            .get(&signed_message_key(key))
            .await?
            .ok_or(MessageSignerError::NotFound(key))?;
        serde_json::from_slice(&raw).map_err(|e| MessageSignerError::Encoding(e.to_string()))
    }

    /// Raises the local nonce sequence for `address` to at least
    /// `floor`, so locally assigned nonces never fall below what the
    /// cluster has already committed.
    pub async fn ensure_nonce_at_least(
        &self,
        address: Address,
        floor: u64,
    ) -> Result<(), StoreError> {
        let _guard = self.lk.lock().await;
        if self.nonces.next_nonce(address).await? < floor {
            self.nonces.reset_next(address, floor).await?;
        }
        Ok(())
    }

    /// Rolls the nonce store back so `nonce` is handed out again.
    ///
    /// Called when the signing operation that consumed `nonce` never
    /// reached the replicated log; keeps the committed sequence
    /// gap-free.
    pub(crate) async fn rollback_nonce(
        &self,
        address: Address,
        nonce: u64,
    ) -> Result<(), StoreError> {
        let _guard = self.lk.lock().await;
        self.nonces.reset_next(address, nonce).await
    }
}

#[async_trait]
impl<D: Datastore, W: Wallet> MsgSigner for MessageSigner<D, W> {
    async fn sign_message(
        &self,
        msg: Message,
        spec: &SendSpec,
        pre_commit: Option<PreCommitCallback>,
    ) -> Result<SignedMessage, MessageSignerError> {
        Self::sign_message(self, msg, spec, pre_commit).await
    }

    async fn get_signed_message(&self, key: Uuid) -> Result<SignedMessage, MessageSignerError> {
        self.get_local_signed_message(key).await
    }
}
