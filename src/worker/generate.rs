//! Block assembly for a won round

use super::DefaultWorker;
use crate::consensus::StateTree;
use crate::core::{Block, MessageReceipt, Proof, TipSet, Ticket};
use crate::mempool::order_messages_by_nonce;
use crate::{Error, Result};
use tracing::{debug, warn};

impl DefaultWorker {
    /// Assemble the block for a round won on `base` with `ticket`.
    ///
    /// `state` is the base state the win was checked against. Pending
    /// messages are applied in sender/nonce order on top of it. Only
    /// successfully applied messages go into the block; messages that can
    /// never apply are dropped from the pool.
    pub async fn generate(
        &self,
        base: &TipSet,
        state: &dyn StateTree,
        ticket: Ticket,
        proof: Proof,
        null_block_count: u64,
    ) -> Result<Block> {
        let parent_weight = self.deps.weigher.weight(base, Some(state)).await?;

        let height = base
            .height()?
            .checked_add(null_block_count)
            .and_then(|h| h.checked_add(1))
            .ok_or_else(|| Error::block_assembly("block height overflow"))?;

        let pending = order_messages_by_nonce(self.deps.message_pool.pending());
        debug!(pending = pending.len(), height, "Applying pending messages");

        let applied = self
            .deps
            .applier
            .apply_messages_and_pay_rewards(state, pending, &self.miner, height)
            .await?;

        if applied.results.len() != applied.successful_messages.len() {
            return Err(Error::block_assembly(format!(
                "applier returned {} results for {} successful messages",
                applied.results.len(),
                applied.successful_messages.len()
            )));
        }

        let message_receipts: Vec<MessageReceipt> = applied.results.into_iter().map(|r| r.receipt).collect();

        for failed in &applied.permanent_failures {
            let cid = failed.cid();
            if self.deps.message_pool.remove(&cid).is_some() {
                warn!(cid = %cid, "Removed permanently failing message from pool");
            }
        }
        if !applied.temporary_failures.is_empty() {
            debug!(count = applied.temporary_failures.len(), "Messages left in pool after temporary failure");
        }

        Ok(Block {
            miner: self.miner.clone(),
            ticket,
            parents: base.key(),
            parent_weight,
            height,
            nonce: 0,
            messages: applied.successful_messages,
            state_root: applied.state_root,
            message_receipts,
            proof,
        })
    }
}
