//! Leader election
//!
//! A ticket wins when its hash, read as a 256-bit big-endian integer, falls
//! below the miner's share of the hash space:
//!
//! `H(ticket) * total_power < 2^256 * miner_power * expected_leaders`
//!
//! Everything is exact integer arithmetic so every node agrees on the result.

use super::{Blockstore, PowerTableView, StateTree};
use crate::core::{Address, Ticket};
use crate::crypto::blake2s_256;
use crate::{Error, Result};
use num_bigint::BigUint;
use num_traits::One;
use serde::{Deserialize, Serialize};

/// Tunables of the election
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionParams {
    /// Expected number of winners per round
    pub expected_leaders_per_round: u64,
}

impl Default for ElectionParams {
    fn default() -> Self {
        Self {
            expected_leaders_per_round: 1,
        }
    }
}

/// Decide whether `ticket` elects `miner`, reading power through `power_table`
pub async fn is_winning_ticket(
    blockstore: &dyn Blockstore,
    power_table: &dyn PowerTableView,
    state: Option<&dyn StateTree>,
    ticket: &Ticket,
    miner: &Address,
    params: &ElectionParams,
) -> Result<bool> {
    let total_power = power_table.total(state, blockstore).await?;
    if total_power == 0 {
        return Err(Error::power_table("total power is zero"));
    }
    let miner_power = power_table.miner(state, blockstore, miner).await?;

    Ok(compare_ticket_power(
        ticket,
        miner_power,
        total_power,
        params.expected_leaders_per_round,
    ))
}

/// Pure threshold comparison behind [`is_winning_ticket`]
pub fn compare_ticket_power(
    ticket: &Ticket,
    miner_power: u64,
    total_power: u64,
    expected_leaders: u64,
) -> bool {
    let hash = BigUint::from_bytes_be(&blake2s_256(ticket.as_bytes()));
    let lhs = hash * BigUint::from(total_power);
    let rhs = (BigUint::one() << 256u32) * BigUint::from(miner_power) * BigUint::from(expected_leaders);
    lhs < rhs
}
