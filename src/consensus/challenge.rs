//! Per-round challenge derivation

use crate::core::{ChallengeSeed, TipSet};
use crate::crypto::Blake2sHasher;
use crate::Result;

const CHALLENGE_DOMAIN: &[u8] = b"spacetime-miner/challenge-seed/v1";

/// Derive the proof challenge for mining on `base` after `null_block_count`
/// empty rounds.
///
/// The seed depends only on the base key, its smallest ticket and the null
/// count. Fails on the empty tipset.
pub fn create_challenge_seed(base: &TipSet, null_block_count: u64) -> Result<ChallengeSeed> {
    let ticket = base.min_ticket()?;
    let key = base.key().to_bytes();

    let mut hasher = Blake2sHasher::new(CHALLENGE_DOMAIN);
    hasher
        .update(&(key.len() as u64).to_le_bytes())
        .update(&key)
        .update(&(ticket.as_bytes().len() as u64).to_le_bytes())
        .update(ticket.as_bytes())
        .update(&null_block_count.to_le_bytes());
    Ok(ChallengeSeed(hasher.finalize()))
}
