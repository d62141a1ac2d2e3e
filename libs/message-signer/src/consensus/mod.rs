//! Contract consumed from the external consensus engine.
//!
//! The engine elects a leader among a fixed peer set, orders and
//! durably commits signing operations, applies them to the replicated
//! signing state machine on every replica, and can forward a call to
//! whichever node is currently leader. This crate consumes that
//! capability; it never reimplements election or log replication.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

pub mod state;

pub use state::{ReplicatedState, SigningOperation};

/// Identity of a peer in the fixed replica set.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PeerId(String);

impl PeerId {
    /// Creates a peer identity from its string form.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// String form of the identity.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors surfaced by the consensus engine.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConsensusError {
    /// No leader is currently known (an election may be in progress).
    #[error("leader unknown: {0}")]
    LeaderUnknown(String),

    /// The RPC forwarding a call to the leader failed.
    #[error("redirect rpc failed: {0}")]
    Rpc(String),

    /// The operation was not durably committed to the replicated log.
    #[error("commit failed: {0}")]
    Commit(String),

    /// The applied state snapshot could not be produced.
    #[error("replicated state unavailable: {0}")]
    State(String),
}

/// Capability interface over the external replicated-log engine.
///
/// Any correct leader-electing replicated-log implementation satisfies
/// this contract; tests use an in-memory fake. Leadership is a moment-
/// in-time observation and must never be cached between calls.
#[async_trait]
pub trait ConsensusEngine: Send + Sync + 'static {
    /// Whether this node is the leader right now.
    async fn is_leader(&self) -> bool;

    /// Identity of the current leader.
    async fn leader(&self) -> Result<PeerId, ConsensusError>;

    /// Forwards `method` with the encoded `arg` to the current leader
    /// and returns its encoded reply.
    ///
    /// Returns `Ok(None)` when no redirect was performed because this
    /// node is itself the leader.
    async fn redirect_to_leader(
        &self,
        method: &str,
        arg: Vec<u8>,
    ) -> Result<Option<Vec<u8>>, ConsensusError>;

    /// Appends `op` to the replicated log and blocks until a quorum
    /// has durably committed it. After `Ok(())` the operation will be
    /// applied, in commit order, by every live replica.
    async fn commit(&self, op: SigningOperation) -> Result<(), ConsensusError>;

    /// Snapshot of the currently applied replicated state.
    async fn state(&self) -> Result<ReplicatedState, ConsensusError>;
}
