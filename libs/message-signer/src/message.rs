//! Chain message types and the canonical encoding that gets signed.

use alloy_primitives::{Address, Signature};
use borsh::BorshSerialize;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// An unsigned outgoing chain message.
///
/// The signer only interprets `from` and `nonce`; every other field is
/// opaque payload carried through signing untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Sender address. Nonce assignment and key lookup are scoped to it.
    pub from: Address,
    /// Recipient address.
    pub to: Address,
    /// Value transferred; opaque to the signer.
    pub value: u128,
    /// Method selector; opaque to the signer.
    pub method: u64,
    /// Call parameters; opaque to the signer.
    pub params: Vec<u8>,
    /// Sequence number. `None` until the signer assigns one.
    pub nonce: Option<u64>,
}

/// Borsh view of a [`Message`] with the nonce populated. Borsh gives a
/// deterministic byte layout, so every replica signs and verifies the
/// same bytes for the same logical message.
#[derive(BorshSerialize)]
struct CanonicalMessage<'a> {
    from: [u8; 20],
    to: [u8; 20],
    value: u128,
    method: u64,
    params: &'a [u8],
    nonce: u64,
}

impl Message {
    /// Canonical signing bytes of the nonce-populated message.
    ///
    /// The encoding is only defined once the nonce is set; signing a
    /// message without a nonce would make the signature ambiguous.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, MessageError> {
        let nonce = self.nonce.ok_or(MessageError::MissingNonce)?;
        let canonical = CanonicalMessage {
            from: self.from.0 .0,
            to: self.to.0 .0,
            value: self.value,
            method: self.method,
            params: &self.params,
            nonce,
        };
        borsh::to_vec(&canonical).map_err(|e| MessageError::Encode(e.to_string()))
    }
}

/// A message with its nonce populated plus the signature over its
/// canonical encoding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignedMessage {
    /// The signed message; `message.nonce` is always set.
    pub message: Message,
    /// Signature over [`Message::canonical_bytes`].
    pub signature: Signature,
}

/// Caller-supplied options for one logical signing request.
///
/// The idempotency key is what makes retried requests safe: the cluster
/// associates at most one [`SignedMessage`] with a given key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendSpec {
    /// Idempotency key identifying the logical signing request.
    pub msg_uuid: Uuid,
}

impl SendSpec {
    /// Spec with a freshly generated idempotency key.
    pub fn new() -> Self {
        Self { msg_uuid: Uuid::new_v4() }
    }

    /// Spec carrying a caller-chosen idempotency key.
    pub const fn with_key(msg_uuid: Uuid) -> Self {
        Self { msg_uuid }
    }
}

impl Default for SendSpec {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors producing the canonical message encoding.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MessageError {
    /// The message has no nonce; its canonical encoding is undefined.
    #[error("message has no nonce, canonical encoding is undefined")]
    MissingNonce,

    /// Borsh serialization failed.
    #[error("failed to encode message: {0}")]
    Encode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(nonce: Option<u64>) -> Message {
        Message {
            from: Address::repeat_byte(0x11),
            to: Address::repeat_byte(0x22),
            value: 42,
            method: 0,
            params: vec![1, 2, 3],
            nonce,
        }
    }

    #[test]
    fn canonical_bytes_requires_nonce() {
        let err = message(None).canonical_bytes().unwrap_err();
        assert_eq!(err, MessageError::MissingNonce);
    }

    #[test]
    fn canonical_bytes_is_deterministic() {
        let a = message(Some(7)).canonical_bytes().unwrap();
        let b = message(Some(7)).canonical_bytes().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn canonical_bytes_covers_the_nonce() {
        let a = message(Some(0)).canonical_bytes().unwrap();
        let b = message(Some(1)).canonical_bytes().unwrap();
        assert_ne!(a, b);
    }
}
