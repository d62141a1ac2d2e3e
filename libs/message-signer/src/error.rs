use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::message::MessageError;
use crate::store::StoreError;

/// Errors that can occur while signing or looking up messages.
///
/// Serializable so that a leader's error travels back verbatim over the
/// redirect path. No variant is retried internally except the storage
/// batch layer's bounded backoff; consensus-path failures are surfaced
/// so the caller can retry with the same idempotency key.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageSignerError {
    /// The wallet failed to produce a signature. Not retried.
    #[error("signing failed: {0}")]
    SigningFailed(String),

    /// The replicated log did not durably accept the operation. The
    /// message is not guaranteed visible cluster-wide; retry the whole
    /// call with the same idempotency key.
    #[error("commit failed: {0}")]
    CommitFailed(String),

    /// A follower could not reach the current leader.
    #[error("redirect to leader failed: {0}")]
    RedirectFailed(String),

    /// No signed message is committed under the idempotency key. Not
    /// an error for callers that are merely polling.
    #[error("no signed message for idempotency key {0}")]
    NotFound(Uuid),

    /// Local persistence failed in the nonce store or message cache.
    /// Fatal for the affected call; the replicated state is unaffected.
    #[error("local storage failed: {0}")]
    StorageFailed(#[from] StoreError),

    /// The caller's pre-commit callback rejected the signed message;
    /// nothing was persisted and the nonce was not advanced.
    #[error("pre-commit callback aborted signing: {0}")]
    PreCommitAborted(String),

    /// The consensus engine could not produce a state snapshot.
    #[error("replicated state unavailable: {0}")]
    StateUnavailable(String),

    /// A message or wire payload failed to encode or decode.
    #[error("encoding failed: {0}")]
    Encoding(String),
}

impl From<MessageError> for MessageSignerError {
    fn from(value: MessageError) -> Self {
        Self::Encoding(value.to_string())
    }
}
