//! Proof-of-spacetime generation
//!
//! Real proofs are out of scope. The worker depends only on the
//! [`ProofGenerator`] seam; [`ConstantDelayProver`] stands in for a prover by
//! taking a fixed amount of time per round.

use crate::core::{ChallengeSeed, Proof};
use crate::{Error, Result};
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Produces the proof a ticket is signed over
#[async_trait]
pub trait ProofGenerator: Send + Sync {
    /// Name for logging
    fn prover_type(&self) -> &'static str;

    /// Produce a proof for `seed`.
    ///
    /// Must return [`Error::Cancelled`] promptly once `cancel` fires.
    async fn create_proof(&self, seed: ChallengeSeed, cancel: CancellationToken) -> Result<Proof>;
}

/// Prover that waits one block time and returns the placeholder proof
#[derive(Debug, Clone)]
pub struct ConstantDelayProver {
    block_time: Duration,
}

impl ConstantDelayProver {
    /// Create a prover taking `block_time` per proof
    pub fn new(block_time: Duration) -> Self {
        info!("Creating constant delay prover with block time: {:?}", block_time);
        Self { block_time }
    }

    /// Configured delay
    pub fn block_time(&self) -> Duration {
        self.block_time
    }
}

#[async_trait]
impl ProofGenerator for ConstantDelayProver {
    fn prover_type(&self) -> &'static str {
        "constant-delay"
    }

    async fn create_proof(&self, seed: ChallengeSeed, cancel: CancellationToken) -> Result<Proof> {
        let start_time = Instant::now();
        debug!(seed = %seed, "Waiting {:?} before producing proof", self.block_time);

        tokio::select! {
            _ = sleep(self.block_time) => {
                debug!("Constant delay prover finished after {:?}", start_time.elapsed());
                Ok(Proof::from_seed(&seed))
            }
            _ = cancel.cancelled() => {
                debug!("Constant delay proof cancelled");
                Err(Error::cancelled("constant delay proof"))
            }
        }
    }
}
