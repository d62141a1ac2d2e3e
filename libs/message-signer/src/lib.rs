#![deny(clippy::nursery, clippy::pedantic, warnings, missing_docs)]

//! Consensus-Coordinated Message Signer
//!
//! Signing subsystem for a multi-replica node cluster. Any replica can
//! receive a signing request, but only the current leader assigns
//! nonces and signs: followers forward the whole call to the leader,
//! and every signing decision is committed to the external replicated
//! log before the caller sees a result. Requests carry an idempotency
//! key, so a caller that never learned whether its request committed
//! can retry on any replica and receive the one signed message the
//! cluster agreed on, rather than a second signature under a fresh
//! nonce.
//!
//! The replicated-log / leader-election engine itself is a collaborator
//! behind [`consensus::ConsensusEngine`]; this crate supplies the
//! deterministic state machine the log applies and the signer
//! implementations around it.

/// Configuration structures and loading
pub mod config;
/// External consensus engine contract and the replicated signing state machine
pub mod consensus;
/// Logging and observability setup
pub mod logging;
/// Chain message types and the canonical signing encoding
pub mod message;
/// Durable per-address nonce tracking
pub mod nonce;
/// Signer implementations: the local base signer and the consensus-coordinated wrapper
pub mod signer;
/// Local datastore contract, in-memory backend, and batched writes
pub mod store;
/// Wallet abstraction over private key material
pub mod wallet;

mod error;

pub use error::MessageSignerError;
