//! Expected-consensus chain weight
//!
//! Every block in a tipset adds a fixed value plus a bonus proportional to its
//! miner's share of total power:
//!
//! `w(ts) = w(parent) + Σ_blocks (ECV + ECPrM * miner_power / total_power)`
//!
//! The genesis tipset weighs zero.

use super::{Blockstore, ChainWeigher, PowerTableView, StateTree};
use crate::core::{Cid, TipSet, Weight};
use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Constants of the weight function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightParams {
    /// Fixed weight contributed by every block
    pub ecv: u64,
    /// Multiplier on the miner's power share
    pub ecprm: u64,
}

impl Default for WeightParams {
    fn default() -> Self {
        Self { ecv: 10, ecprm: 100 }
    }
}

/// Expected-consensus weigher
pub struct ExpectedConsensus {
    power_table: Arc<dyn PowerTableView>,
    blockstore: Arc<dyn Blockstore>,
    genesis: Cid,
    params: WeightParams,
}

impl ExpectedConsensus {
    /// Create a weigher for the chain rooted at `genesis`
    pub fn new(power_table: Arc<dyn PowerTableView>, blockstore: Arc<dyn Blockstore>, genesis: Cid) -> Self {
        Self {
            power_table,
            blockstore,
            genesis,
            params: WeightParams::default(),
        }
    }

    /// Override the weight constants
    pub fn with_params(mut self, params: WeightParams) -> Self {
        self.params = params;
        self
    }

    /// Genesis block cid
    pub fn genesis(&self) -> &Cid {
        &self.genesis
    }

    /// Weight constants in use
    pub fn params(&self) -> &WeightParams {
        &self.params
    }
}

#[async_trait]
impl ChainWeigher for ExpectedConsensus {
    async fn weight(&self, tipset: &TipSet, state: Option<&dyn StateTree>) -> Result<Weight> {
        if tipset.contains(&self.genesis) {
            return Ok(Weight::zero());
        }

        let mut weight = tipset.parent_weight()?;
        let total = self.power_table.total(state, self.blockstore.as_ref()).await?;
        if total == 0 {
            return Err(Error::weight("total power is zero"));
        }

        for block in tipset.blocks() {
            let power = self
                .power_table
                .miner(state, self.blockstore.as_ref(), &block.miner)
                .await?;
            let numerator = self.params.ecv as u128 * total as u128 + self.params.ecprm as u128 * power as u128;
            let increment = Weight::from_ratio(numerator, total as u128)?;
            weight = &weight + &increment;
        }

        debug!(tipset = %tipset, weight = %weight, "computed tipset weight");
        Ok(weight)
    }
}
