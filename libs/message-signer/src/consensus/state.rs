//! The replicated signing state machine.
//!
//! A deterministic fold over the committed log of signing operations.
//! Every replica that applies the same log prefix holds the same
//! [`ReplicatedState`], which is what makes cross-replica idempotent
//! lookups sound.

use std::collections::HashMap;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use tracing::trace;
use uuid::Uuid;

use crate::message::SignedMessage;

/// One committed signing decision, the unit appended to the replicated
/// log. Immutable once created; ownership passes to the consensus
/// engine on submission.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SigningOperation {
    /// Nonce the leader assigned to the message.
    pub nonce: u64,
    /// Idempotency key of the logical signing request.
    pub uuid: Uuid,
    /// Sender the nonce was assigned for.
    pub from: Address,
    /// The signed message replicated to every peer.
    pub signed_message: SignedMessage,
}

/// Cluster-agreed signing state.
///
/// Mutated only by [`ReplicatedState::apply`] in committed log order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplicatedState {
    /// Highest committed nonce per sender.
    pub nonce_by_address: HashMap<Address, u64>,
    /// Committed signed message per idempotency key.
    pub message_by_key: HashMap<Uuid, SignedMessage>,
}

impl ReplicatedState {
    /// Empty state, the starting point of every replica.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a committed operation.
    ///
    /// Re-applying an operation whose idempotency key is already
    /// present is a no-op; this is what makes retried commits of the
    /// same operation harmless.
    pub fn apply(&mut self, op: &SigningOperation) {
        if self.message_by_key.contains_key(&op.uuid) {
            trace!(key = %op.uuid, "operation already applied, skipping");
            return;
        }
        self.message_by_key.insert(op.uuid, op.signed_message.clone());
        let nonce = self.nonce_by_address.entry(op.from).or_insert(op.nonce);
        *nonce = (*nonce).max(op.nonce);
    }

    /// The signed message committed under `key`, if any.
    pub fn query(&self, key: &Uuid) -> Option<&SignedMessage> {
        self.message_by_key.get(key)
    }

    /// Highest committed nonce for `address`, if any operation for it
    /// has been applied.
    pub fn latest_nonce(&self, address: &Address) -> Option<u64> {
        self.nonce_by_address.get(address).copied()
    }

    /// Full copy of the state, for the consensus engine's state
    /// transfer and recovery paths.
    pub fn snapshot(&self) -> Self {
        self.clone()
    }
}
