//! Signer implementations.
//!
//! [`MessageSigner`] is the local sign-and-bump-nonce primitive, safe
//! only for a single authoritative writer. [`ConsensusMessageSigner`]
//! wraps it into the replicated, leader-serialized, idempotent
//! operation exposed to the node RPC layer.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::MessageSignerError;
use crate::message::{Message, SendSpec, SignedMessage};

pub mod base;
pub mod consensus;

pub use base::MessageSigner;
pub use consensus::{ConsensusMessageSigner, SignRequest, SIGN_MESSAGE_METHOD};

/// Callback invoked with the freshly signed message before any local
/// state is persisted. Returning an error aborts the call without
/// advancing the nonce store.
pub type PreCommitCallback = Box<dyn FnOnce(&SignedMessage) -> Result<(), String> + Send>;

/// Common surface of the local and consensus-coordinated signers.
#[async_trait]
pub trait MsgSigner: Send + Sync + 'static {
    /// Signs `msg`, assigning a nonce if it has none.
    async fn sign_message(
        &self,
        msg: Message,
        spec: &SendSpec,
        pre_commit: Option<PreCommitCallback>,
    ) -> Result<SignedMessage, MessageSignerError>;

    /// The signed message associated with an idempotency key.
    async fn get_signed_message(&self, key: Uuid) -> Result<SignedMessage, MessageSignerError>;
}
