//! Mining worker
//!
//! One call to [`Worker::mine`] is one attempt to extend a base tipset after
//! some number of empty rounds. An attempt walks a fixed state machine:
//!
//! ```text
//! Idle -> ComputingState -> AwaitingProof -> CheckingWin -> Assembling -> Done
//!                                                      \-> NotWinner -> Done
//! ```
//!
//! Cancellation can end the attempt in `Cancelled` up to the point assembly
//! begins. Each attempt emits at most one [`Output`].

use crate::consensus::{
    create_challenge_seed, create_ticket, is_winning_ticket, Blockstore, ChainWeigher, ElectionParams,
    MessageApplier, PowerTableView, Signer, StateAccessor,
};
use crate::core::{Address, Block, TipSet};
use crate::mempool::MessagePool;
use crate::utils::LogContext;
use crate::{log_worker_state, Error, Result, SigningFault};
use async_trait::async_trait;
use std::cell::Cell;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

pub mod generate;
pub mod prover;

pub use prover::{ConstantDelayProver, ProofGenerator};

/// Result of an attempt that has something to report
#[derive(Debug)]
pub enum Output {
    /// The miner won and assembled a block
    NewBlock(Block),
    /// The attempt failed with a recoverable error
    Failed(Error),
}

impl Output {
    /// The block, if one was produced
    pub fn block(&self) -> Option<&Block> {
        match self {
            Output::NewBlock(block) => Some(block),
            Output::Failed(_) => None,
        }
    }

    /// The error, if the attempt failed
    pub fn error(&self) -> Option<&Error> {
        match self {
            Output::NewBlock(_) => None,
            Output::Failed(err) => Some(err),
        }
    }

    /// Convert into a `Result`
    pub fn into_result(self) -> Result<Block> {
        match self {
            Output::NewBlock(block) => Ok(block),
            Output::Failed(err) => Err(err),
        }
    }
}

/// States of a mining attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MiningState {
    Idle,
    ComputingState,
    AwaitingProof,
    CheckingWin,
    Assembling,
    NotWinner,
    Done,
    Cancelled,
}

impl MiningState {
    /// Whether the attempt is over
    pub fn is_terminal(&self) -> bool {
        matches!(self, MiningState::Done | MiningState::Cancelled)
    }
}

impl fmt::Display for MiningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MiningState::Idle => "idle",
            MiningState::ComputingState => "computing-state",
            MiningState::AwaitingProof => "awaiting-proof",
            MiningState::CheckingWin => "checking-win",
            MiningState::Assembling => "assembling",
            MiningState::NotWinner => "not-winner",
            MiningState::Done => "done",
            MiningState::Cancelled => "cancelled",
        };
        write!(f, "{}", name)
    }
}

/// Mining worker trait
#[async_trait]
pub trait Worker: Send + Sync {
    /// Try to mine a block on `base` after `null_block_count` empty rounds.
    ///
    /// Returns `Ok(true)` when this miner won the round, whether or not the
    /// block could be assembled. Recoverable failures are sent on `out`;
    /// losing and cancellation are silent. A broken signer is returned as
    /// `Err` and nothing is sent.
    async fn mine(
        &self,
        cancel: CancellationToken,
        base: &TipSet,
        null_block_count: u64,
        out: &mpsc::Sender<Output>,
    ) -> std::result::Result<bool, SigningFault>;
}

/// Collaborators the worker reads through
#[derive(Clone)]
pub struct WorkerDeps {
    pub state_accessor: Arc<dyn StateAccessor>,
    pub power_table: Arc<dyn PowerTableView>,
    pub blockstore: Arc<dyn Blockstore>,
    pub weigher: Arc<dyn ChainWeigher>,
    pub applier: Arc<dyn MessageApplier>,
    pub message_pool: Arc<MessagePool>,
    pub election: ElectionParams,
}

/// Worker mining for a single miner address
pub struct DefaultWorker {
    deps: WorkerDeps,
    miner: Address,
    signer: Arc<dyn Signer>,
    prover: Arc<dyn ProofGenerator>,
    state_tx: Option<mpsc::UnboundedSender<MiningState>>,
}

impl DefaultWorker {
    /// Create a worker whose proofs take `block_time`
    pub fn new(deps: WorkerDeps, miner: Address, signer: Arc<dyn Signer>, block_time: Duration) -> Self {
        Self {
            deps,
            miner,
            signer,
            prover: Arc::new(ConstantDelayProver::new(block_time)),
            state_tx: None,
        }
    }

    /// Replace the proof generator
    pub fn with_prover(mut self, prover: Arc<dyn ProofGenerator>) -> Self {
        self.prover = prover;
        self
    }

    /// Report every state transition on `tx`
    pub fn with_state_reporter(mut self, tx: mpsc::UnboundedSender<MiningState>) -> Self {
        self.state_tx = Some(tx);
        self
    }

    /// Address this worker mines for
    pub fn miner(&self) -> &Address {
        &self.miner
    }

    async fn emit(&self, out: &mpsc::Sender<Output>, output: Output) {
        if let Err(e) = out.send(output).await {
            warn!("Output receiver dropped, discarding {:?}", e.0);
        }
    }
}

/// Tracks the current state of one attempt and reports transitions
struct Transitions<'a> {
    state: Cell<MiningState>,
    tx: Option<&'a mpsc::UnboundedSender<MiningState>>,
}

impl<'a> Transitions<'a> {
    fn start(tx: Option<&'a mpsc::UnboundedSender<MiningState>>) -> Self {
        if let Some(tx) = tx {
            let _ = tx.send(MiningState::Idle);
        }
        Self {
            state: Cell::new(MiningState::Idle),
            tx,
        }
    }

    fn to(&self, next: MiningState) {
        let previous = self.state.replace(next);
        log_worker_state!(previous, next);
        if let Some(tx) = self.tx {
            let _ = tx.send(next);
        }
    }
}

#[async_trait]
impl Worker for DefaultWorker {
    async fn mine(
        &self,
        cancel: CancellationToken,
        base: &TipSet,
        null_block_count: u64,
        out: &mpsc::Sender<Output>,
    ) -> std::result::Result<bool, SigningFault> {
        let context = LogContext::for_attempt(&self.miner, base, null_block_count);
        let span = context.span();
        self.attempt(cancel, base, null_block_count, out)
            .instrument(span)
            .await
    }
}

impl DefaultWorker {
    async fn attempt(
        &self,
        cancel: CancellationToken,
        base: &TipSet,
        null_block_count: u64,
        out: &mpsc::Sender<Output>,
    ) -> std::result::Result<bool, SigningFault> {
        let states = Transitions::start(self.state_tx.as_ref());
        info!("Starting mining attempt with {}", self.prover.prover_type());

        if base.is_empty() {
            warn!("Refusing to mine on an empty base tipset");
            self.emit(out, Output::Failed(Error::empty_tipset("mine"))).await;
            states.to(MiningState::Done);
            return Ok(false);
        }

        states.to(MiningState::ComputingState);
        let state = match self.deps.state_accessor.state_tree(base).await {
            Ok(state) => state,
            Err(e) => {
                error!(category = e.category(), "Failed to load base state: {}", e);
                self.emit(out, Output::Failed(e)).await;
                states.to(MiningState::Done);
                return Ok(false);
            }
        };

        if cancel.is_cancelled() {
            warn!("Mining attempt cancelled before proof generation");
            states.to(MiningState::Cancelled);
            return Ok(false);
        }

        let seed = match create_challenge_seed(base, null_block_count) {
            Ok(seed) => seed,
            Err(e) => {
                error!("Failed to derive challenge seed: {}", e);
                self.emit(out, Output::Failed(e)).await;
                states.to(MiningState::Done);
                return Ok(false);
            }
        };

        states.to(MiningState::AwaitingProof);
        let prover = Arc::clone(&self.prover);
        let proof_cancel = cancel.child_token();
        let proof_task = tokio::spawn(async move { prover.create_proof(seed, proof_cancel).await });

        let proof = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Mining attempt cancelled while waiting for proof");
                states.to(MiningState::Cancelled);
                return Ok(false);
            }
            joined = proof_task => match joined {
                Ok(Ok(proof)) => proof,
                Ok(Err(e)) if e.is_cancelled() => {
                    info!("Proof generation cancelled");
                    states.to(MiningState::Cancelled);
                    return Ok(false);
                }
                Ok(Err(e)) => {
                    error!("Proof generation failed: {}", e);
                    self.emit(out, Output::Failed(e)).await;
                    states.to(MiningState::Done);
                    return Ok(false);
                }
                Err(e) => {
                    error!("Proof task failed: {}", e);
                    self.emit(out, Output::Failed(Error::proof_generation(format!("proof task failed: {}", e)))).await;
                    states.to(MiningState::Done);
                    return Ok(false);
                }
            }
        };

        let ticket = match create_ticket(&proof, &self.miner, self.signer.as_ref()) {
            Ok(ticket) => ticket,
            Err(fault) => {
                error!("Signer cannot sign for the miner: {}", fault);
                states.to(MiningState::Done);
                return Err(fault);
            }
        };

        states.to(MiningState::CheckingWin);
        let won = is_winning_ticket(
            self.deps.blockstore.as_ref(),
            self.deps.power_table.as_ref(),
            Some(state.as_ref()),
            &ticket,
            &self.miner,
            &self.deps.election,
        )
        .await;

        match won {
            Err(e) => {
                error!(category = e.category(), "Win check failed: {}", e);
                self.emit(out, Output::Failed(e)).await;
                states.to(MiningState::Done);
                Ok(false)
            }
            Ok(false) => {
                debug!("Ticket did not win this round");
                states.to(MiningState::NotWinner);
                states.to(MiningState::Done);
                Ok(false)
            }
            Ok(true) => {
                states.to(MiningState::Assembling);
                let output = match self.generate(base, state.as_ref(), ticket, proof, null_block_count).await {
                    Ok(block) => {
                        info!(height = block.height, cid = %block.cid(), "Mined new block");
                        Output::NewBlock(block)
                    }
                    Err(e) => {
                        error!(category = e.category(), "Won the round but failed to assemble a block: {}", e);
                        Output::Failed(e)
                    }
                };
                self.emit(out, output).await;
                states.to(MiningState::Done);
                Ok(true)
            }
        }
    }
}
