//! The consensus-coordinated signer.
//!
//! Wraps the local [`MessageSigner`] into a replicated operation: only
//! the leader originates signing operations, every operation is
//! committed to the replicated log before the caller sees a result,
//! and repeated requests with the same idempotency key short-circuit
//! to the already-committed signed message on any replica.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::{base::MessageSigner, MsgSigner, PreCommitCallback};
use crate::config::RedirectConfig;
use crate::consensus::{ConsensusEngine, PeerId, SigningOperation};
use crate::error::MessageSignerError;
use crate::message::{Message, SendSpec, SignedMessage};
use crate::store::Datastore;
use crate::wallet::Wallet;

/// Method name under which the node RPC layer dispatches redirected
/// signing calls to [`ConsensusMessageSigner::handle_sign_request`].
pub const SIGN_MESSAGE_METHOD: &str = "SignMessage";

/// Wire form of a signing call forwarded to the leader.
///
/// Pre-commit callbacks do not travel: a redirected request is signed
/// under whatever hooks the leader itself applies.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignRequest {
    /// The message to sign.
    pub message: Message,
    /// Idempotency spec of the request.
    pub spec: SendSpec,
}

type SignOutcome = Result<SignedMessage, MessageSignerError>;

/// Replicated, leader-serialized, idempotent signer.
///
/// Leadership is observed from the consensus engine on every call and
/// never cached; elections change it asynchronously.
#[derive(Debug)]
pub struct ConsensusMessageSigner<D, W, C> {
    inner: MessageSigner<D, W>,
    consensus: Arc<C>,
    redirect: RedirectConfig,
    /// Serializes the leader-side lookup+sign+commit section so two
    /// near-simultaneous calls with the same key cannot both miss the
    /// idempotency lookup and consume two nonces.
    commit_lk: tokio::sync::Mutex<()>,
}

impl<D, W, C> ConsensusMessageSigner<D, W, C>
where
    D: Datastore,
    W: Wallet,
    C: ConsensusEngine,
{
    /// Wraps a local signer with consensus coordination.
    pub fn new(inner: MessageSigner<D, W>, consensus: Arc<C>, redirect: RedirectConfig) -> Self {
        Self {
            inner,
            consensus,
            redirect,
            commit_lk: tokio::sync::Mutex::new(()),
        }
    }

    /// Whether this replica is currently the leader.
    pub async fn is_leader(&self) -> bool {
        self.consensus.is_leader().await
    }

    /// Identity of the current leader.
    pub async fn leader(&self) -> Result<PeerId, MessageSignerError> {
        self.consensus
            .leader()
            .await
            .map_err(|e| MessageSignerError::RedirectFailed(e.to_string()))
    }

    /// Forwards an encoded call to the current leader, for the node RPC
    /// layer to reuse the engine's forwarding path.
    ///
    /// Returns `Ok(None)` when this node is itself the leader and the
    /// caller should dispatch locally instead.
    pub async fn redirect_to_leader(
        &self,
        method: &str,
        arg: Vec<u8>,
    ) -> Result<Option<Vec<u8>>, MessageSignerError> {
        self.consensus
            .redirect_to_leader(method, arg)
            .await
            .map_err(|e| MessageSignerError::RedirectFailed(e.to_string()))
    }

    /// Signs `msg` exactly once cluster-wide for `spec.msg_uuid`.
    ///
    /// Followers forward the call to the leader and return its result
    /// verbatim, errors included. On the leader, a request whose key is
    /// already committed returns the existing signed message without
    /// consuming a nonce; otherwise the message is signed locally and
    /// the resulting operation is committed to the replicated log
    /// before this returns. A [`MessageSignerError::CommitFailed`]
    /// leaves the message not-yet-final: retry the whole call with the
    /// same idempotency key.
    #[tracing::instrument(skip(self, msg, pre_commit), fields(from = %msg.from, key = %spec.msg_uuid))]
    pub async fn sign_message(
        &self,
        msg: Message,
        spec: &SendSpec,
        pre_commit: Option<PreCommitCallback>,
    ) -> SignOutcome {
        // Role is observed per call; it can change between calls.
        if !self.consensus.is_leader().await {
            match self.redirect_sign(&msg, spec).await? {
                Some(signed) => return Ok(signed),
                // The engine reported this node as leader after all;
                // fall through and sign locally.
                None => debug!("redirect declined, node became leader"),
            }
        }
        self.sign_as_leader(msg, spec, pre_commit).await
    }

    /// The signed message committed under `key`, served from this
    /// replica's applied state. Works on leader and followers alike.
    pub async fn get_signed_message(&self, key: Uuid) -> SignOutcome {
        let state = self
            .consensus
            .state()
            .await
            .map_err(|e| MessageSignerError::StateUnavailable(e.to_string()))?;
        state
            .query(&key)
            .cloned()
            .ok_or(MessageSignerError::NotFound(key))
    }

    /// Server half of the redirect path: decodes a forwarded
    /// [`SignRequest`], signs it, and encodes the outcome for the wire.
    ///
    /// The node RPC layer dispatches [`SIGN_MESSAGE_METHOD`] here.
    pub async fn handle_sign_request(&self, arg: &[u8]) -> Result<Vec<u8>, MessageSignerError> {
        let request: SignRequest = serde_json::from_slice(arg)
            .map_err(|e| MessageSignerError::Encoding(e.to_string()))?;
        let outcome = self.sign_message(request.message, &request.spec, None).await;
        serde_json::to_vec(&outcome).map_err(|e| MessageSignerError::Encoding(e.to_string()))
    }

    async fn redirect_sign(
        &self,
        msg: &Message,
        spec: &SendSpec,
    ) -> Result<Option<SignedMessage>, MessageSignerError> {
        let request = SignRequest { message: msg.clone(), spec: spec.clone() };
        let arg = serde_json::to_vec(&request)
            .map_err(|e| MessageSignerError::Encoding(e.to_string()))?;

        // Bounded attempts: an unbounded redirect loop would amplify
        // load during a leader election.
        let attempts = self.redirect.max_attempts.max(1);
        let mut last_error = MessageSignerError::RedirectFailed("no attempt made".to_string());
        for attempt in 1..=attempts {
            match self
                .consensus
                .redirect_to_leader(SIGN_MESSAGE_METHOD, arg.clone())
                .await
            {
                Ok(None) => return Ok(None),
                Ok(Some(raw)) => {
                    let outcome: SignOutcome = serde_json::from_slice(&raw)
                        .map_err(|e| MessageSignerError::Encoding(e.to_string()))?;
                    // The leader's result, errors included, verbatim.
                    return outcome.map(Some);
                }
                Err(e) => {
                    warn!(attempt, error = %e, "redirect to leader failed");
                    last_error = MessageSignerError::RedirectFailed(e.to_string());
                }
            }
        }
        Err(last_error)
    }

    async fn sign_as_leader(
        &self,
        msg: Message,
        spec: &SendSpec,
        pre_commit: Option<PreCommitCallback>,
    ) -> SignOutcome {
        let _guard = self.commit_lk.lock().await;

        let state = self
            .consensus
            .state()
            .await
            .map_err(|e| MessageSignerError::StateUnavailable(e.to_string()))?;

        // Idempotent short-circuit: a retried request returns the
        // committed message instead of consuming a second nonce.
        if let Some(existing) = state.query(&spec.msg_uuid) {
            debug!("idempotency key already committed, returning existing message");
            return Ok(existing.clone());
        }

        // Keep the local sequence at or above what the cluster has
        // already committed; a fresh leader's local store may be behind.
        if let Some(latest) = state.latest_nonce(&msg.from) {
            self.inner.ensure_nonce_at_least(msg.from, latest + 1).await?;
        }

        // A caller-supplied nonce never advances the local store, so a
        // failed commit must not roll it back either.
        let nonce_assigned_locally = msg.nonce.is_none();
        let signed = self.inner.sign_message(msg, spec, pre_commit).await?;
        let nonce = signed.message.nonce.ok_or_else(|| {
            MessageSignerError::Encoding("signed message is missing its nonce".to_string())
        })?;

        let op = SigningOperation {
            nonce,
            uuid: spec.msg_uuid,
            from: signed.message.from,
            signed_message: signed.clone(),
        };
        if let Err(commit_err) = self.consensus.commit(op).await {
            error!(nonce, error = %commit_err, "commit of signing operation failed");
            // Hand a locally assigned nonce back so the committed
            // sequence stays gap-free; the retry will re-assign it.
            if nonce_assigned_locally {
                if let Err(rollback_err) =
                    self.inner.rollback_nonce(signed.message.from, nonce).await
                {
                    error!(nonce, error = %rollback_err, "nonce rollback after failed commit failed");
                }
            }
            return Err(MessageSignerError::CommitFailed(commit_err.to_string()));
        }

        Ok(signed)
    }
}

#[async_trait]
impl<D, W, C> MsgSigner for ConsensusMessageSigner<D, W, C>
where
    D: Datastore,
    W: Wallet,
    C: ConsensusEngine,
{
    async fn sign_message(
        &self,
        msg: Message,
        spec: &SendSpec,
        pre_commit: Option<PreCommitCallback>,
    ) -> Result<SignedMessage, MessageSignerError> {
        Self::sign_message(self, msg, spec, pre_commit).await
    }

    async fn get_signed_message(&self, key: Uuid) -> Result<SignedMessage, MessageSignerError> {
        Self::get_signed_message(self, key).await
    }
}
