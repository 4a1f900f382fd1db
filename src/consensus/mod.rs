//! Consensus rules and the collaborator seams they read through
//!
//! The worker never touches storage or execution directly. Everything it
//! needs from the rest of the node comes through the traits below, shared as
//! `Arc<dyn ...>` and treated as read-only.

use crate::core::{Address, Cid, MessageReceipt, Signature, SignedMessage, TipSet, Weight};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub mod challenge;
pub mod election;
pub mod expected;
pub mod ticket;

pub use challenge::create_challenge_seed;
pub use election::{compare_ticket_power, is_winning_ticket, ElectionParams};
pub use expected::{ExpectedConsensus, WeightParams};
pub use ticket::{create_ticket, verify_round_ticket, verify_ticket};

/// Handle to the actor state at some point of the chain
pub trait StateTree: Send + Sync {
    /// Root of the state
    fn root(&self) -> Cid;
}

/// Resolves the state a tipset's successors build on
#[async_trait]
pub trait StateAccessor: Send + Sync {
    /// State tree of `tipset`
    async fn state_tree(&self, tipset: &TipSet) -> Result<Arc<dyn StateTree>>;
}

/// Content-addressed storage
pub trait Blockstore: Send + Sync {
    /// Fetch a value by cid
    fn get(&self, cid: &Cid) -> Result<Option<Vec<u8>>>;

    /// Check whether a value is stored
    fn has(&self, cid: &Cid) -> Result<bool>;

    /// Store a value, returning its cid
    fn put(&self, data: &[u8]) -> Result<Cid>;
}

/// Read-only view of storage power
#[async_trait]
pub trait PowerTableView: Send + Sync {
    /// Total power committed to the network
    async fn total(&self, state: Option<&dyn StateTree>, blockstore: &dyn Blockstore) -> Result<u64>;

    /// Power committed by `miner`
    async fn miner(
        &self,
        state: Option<&dyn StateTree>,
        blockstore: &dyn Blockstore,
        miner: &Address,
    ) -> Result<u64>;
}

/// Signing capability for miner addresses
pub trait Signer: Send + Sync {
    /// Sign `data` with the key behind `address`
    fn sign_bytes(&self, data: &[u8], address: &Address) -> Result<Signature>;
}

/// Outcome of applying one successful message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationResult {
    /// Receipt recorded in the block
    pub receipt: MessageReceipt,
    /// Non-fatal execution error reported by the actor
    pub execution_error: Option<String>,
}

/// Outcome of applying a batch of messages on top of a state
#[derive(Debug, Clone, Default)]
pub struct ApplyMessagesResponse {
    /// One result per entry of `successful_messages`, same order
    pub results: Vec<ApplicationResult>,
    /// Messages included in the block
    pub successful_messages: Vec<SignedMessage>,
    /// Messages that can never be applied and should leave the pool
    pub permanent_failures: Vec<SignedMessage>,
    /// Messages that may apply in a later round
    pub temporary_failures: Vec<SignedMessage>,
    /// State root after application and block reward
    pub state_root: Cid,
}

/// Message execution
#[async_trait]
pub trait MessageApplier: Send + Sync {
    /// Apply `messages` to `state` and pay the block reward to `miner`
    async fn apply_messages_and_pay_rewards(
        &self,
        state: &dyn StateTree,
        messages: Vec<SignedMessage>,
        miner: &Address,
        height: u64,
    ) -> Result<ApplyMessagesResponse>;
}

/// Chain weight function used for fork choice and block assembly
#[async_trait]
pub trait ChainWeigher: Send + Sync {
    /// Weight of the chain ending at `tipset`
    async fn weight(&self, tipset: &TipSet, state: Option<&dyn StateTree>) -> Result<Weight>;
}
