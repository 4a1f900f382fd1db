//! In-memory collaborators for a local development chain
//!
//! These back the `spacetime-miner` binary and the integration tests. None of
//! them persist anything and the applier performs no real execution.

use crate::consensus::{
    ApplicationResult, ApplyMessagesResponse, Blockstore, ChainWeigher, ElectionParams, ExpectedConsensus,
    MessageApplier, PowerTableView, StateAccessor, StateTree,
};
use crate::core::{Address, Block, Cid, MessageReceipt, SignedMessage, TipSet, Ticket};
use crate::crypto::{Blake2sHasher, KeyStoreSigner, MinerKey};
use crate::mempool::MessagePool;
use crate::worker::WorkerDeps;
use crate::{Error, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Blockstore backed by a concurrent map
#[derive(Debug, Default)]
pub struct MemBlockstore {
    blocks: DashMap<Cid, Vec<u8>>,
}

impl MemBlockstore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored values
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Check if nothing is stored
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

impl Blockstore for MemBlockstore {
    fn get(&self, cid: &Cid) -> Result<Option<Vec<u8>>> {
        Ok(self.blocks.get(cid).map(|entry| entry.value().clone()))
    }

    fn has(&self, cid: &Cid) -> Result<bool> {
        Ok(self.blocks.contains_key(cid))
    }

    fn put(&self, data: &[u8]) -> Result<Cid> {
        let cid = Cid::of(data);
        self.blocks.insert(cid, data.to_vec());
        Ok(cid)
    }
}

/// State tree identified only by its root
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemStateTree {
    root: Cid,
}

impl MemStateTree {
    pub fn new(root: Cid) -> Self {
        Self { root }
    }
}

impl StateTree for MemStateTree {
    fn root(&self) -> Cid {
        self.root
    }
}

/// Resolves a tipset's state as the state root of its canonical block
#[derive(Debug, Default, Clone, Copy)]
pub struct BlockStateAccessor;

#[async_trait]
impl StateAccessor for BlockStateAccessor {
    async fn state_tree(&self, tipset: &TipSet) -> Result<Arc<dyn StateTree>> {
        let block = tipset.canonical_block()?;
        Ok(Arc::new(MemStateTree::new(block.state_root)))
    }
}

/// Power table with fixed, explicitly configured values
#[derive(Debug, Clone, Default)]
pub struct FixedPowerTable {
    total: u64,
    miners: HashMap<Address, u64>,
}

impl FixedPowerTable {
    /// Create a table with `total` network power and no miners
    pub fn new(total: u64) -> Self {
        Self {
            total,
            miners: HashMap::new(),
        }
    }

    /// Assign `power` to `miner`
    pub fn with_miner(mut self, miner: Address, power: u64) -> Self {
        self.miners.insert(miner, power);
        self
    }
}

#[async_trait]
impl PowerTableView for FixedPowerTable {
    async fn total(&self, _state: Option<&dyn StateTree>, _blockstore: &dyn Blockstore) -> Result<u64> {
        Ok(self.total)
    }

    async fn miner(
        &self,
        _state: Option<&dyn StateTree>,
        _blockstore: &dyn Blockstore,
        miner: &Address,
    ) -> Result<u64> {
        Ok(self.miners.get(miner).copied().unwrap_or(0))
    }
}

/// Applier that accepts every message and derives the next root by hashing
#[derive(Debug, Default, Clone, Copy)]
pub struct DevApplier;

#[async_trait]
impl MessageApplier for DevApplier {
    async fn apply_messages_and_pay_rewards(
        &self,
        state: &dyn StateTree,
        messages: Vec<SignedMessage>,
        miner: &Address,
        height: u64,
    ) -> Result<ApplyMessagesResponse> {
        let mut hasher = Blake2sHasher::new(b"spacetime-miner/dev-state/v1");
        hasher.update(state.root().as_bytes());
        for msg in &messages {
            hasher.update(msg.cid().as_bytes());
        }
        hasher.update(&miner.to_bytes()).update(&height.to_le_bytes());

        let results = messages
            .iter()
            .map(|_| ApplicationResult {
                receipt: MessageReceipt::default(),
                execution_error: None,
            })
            .collect();

        Ok(ApplyMessagesResponse {
            results,
            successful_messages: messages,
            permanent_failures: Vec::new(),
            temporary_failures: Vec::new(),
            state_root: Cid::new(hasher.finalize()),
        })
    }
}

/// Genesis block over `state_root`
pub fn genesis_block(state_root: Cid) -> Block {
    let mut hasher = Blake2sHasher::new(b"spacetime-miner/genesis-ticket/v1");
    hasher.update(state_root.as_bytes());
    Block {
        ticket: Ticket(hasher.finalize().to_vec()),
        state_root,
        ..Block::default()
    }
}

/// Parameters of [`mk_fake_child`]
pub struct FakeChild<'a> {
    pub parent: &'a TipSet,
    pub weigher: &'a dyn ChainWeigher,
    pub miner: Address,
    pub nonce: u64,
    pub null_block_count: u64,
    /// Defaults to the canonical parent block's state root
    pub state_root: Option<Cid>,
}

/// Build a child block of `parent` without mining.
///
/// The ticket is derived from the parent key, miner and nonce so siblings
/// differ. Height and parent weight follow the same rules as mined blocks.
pub async fn mk_fake_child(params: FakeChild<'_>) -> Result<Block> {
    let parent_block = params.parent.canonical_block()?;
    let parent_weight = params.weigher.weight(params.parent, None).await?;
    let height = parent_block
        .height
        .checked_add(params.null_block_count)
        .and_then(|h| h.checked_add(1))
        .ok_or_else(|| Error::block_assembly("block height overflow"))?;

    let mut hasher = Blake2sHasher::new(b"spacetime-miner/fake-ticket/v1");
    hasher
        .update(&params.parent.key().to_bytes())
        .update(&params.miner.to_bytes())
        .update(&params.nonce.to_le_bytes());

    Ok(Block {
        miner: params.miner,
        ticket: Ticket(hasher.finalize().to_vec()),
        parents: params.parent.key(),
        parent_weight,
        height,
        nonce: params.nonce,
        state_root: params.state_root.unwrap_or(parent_block.state_root),
        ..Block::default()
    })
}

/// A single-miner development chain with all collaborators wired up
pub struct Devnet {
    pub genesis: TipSet,
    pub blockstore: Arc<MemBlockstore>,
    pub power_table: Arc<FixedPowerTable>,
    pub weigher: Arc<ExpectedConsensus>,
    pub message_pool: Arc<MessagePool>,
    pub signer: Arc<KeyStoreSigner>,
    pub miner: Address,
}

impl Devnet {
    /// Create a chain where `key` holds `miner_power` of `total_power`
    pub fn new(key: MinerKey, miner_power: u64, total_power: u64) -> Result<Self> {
        if total_power == 0 {
            return Err(Error::config("total power must be greater than 0"));
        }
        if miner_power > total_power {
            return Err(Error::config(format!(
                "miner power {} exceeds total power {}",
                miner_power, total_power
            )));
        }

        let blockstore = Arc::new(MemBlockstore::new());
        let genesis_root = blockstore.put(b"spacetime-miner/genesis-state")?;
        let genesis_block = genesis_block(genesis_root);
        blockstore.put(&genesis_block.encode())?;
        let genesis_cid = genesis_block.cid();
        let genesis = TipSet::new(vec![genesis_block])?;

        let signer = Arc::new(KeyStoreSigner::new());
        let miner = signer.insert(key);
        let power_table = Arc::new(FixedPowerTable::new(total_power).with_miner(miner.clone(), miner_power));
        let weigher = Arc::new(ExpectedConsensus::new(
            power_table.clone(),
            blockstore.clone(),
            genesis_cid,
        ));

        info!(miner = %miner, genesis = %genesis_cid, miner_power, total_power, "Created devnet");
        Ok(Self {
            genesis,
            blockstore,
            power_table,
            weigher,
            message_pool: Arc::new(MessagePool::new()),
            signer,
            miner,
        })
    }

    /// Collaborators for a worker mining on this chain
    pub fn worker_deps(&self, election: ElectionParams) -> WorkerDeps {
        WorkerDeps {
            state_accessor: Arc::new(BlockStateAccessor),
            power_table: self.power_table.clone(),
            blockstore: self.blockstore.clone(),
            weigher: self.weigher.clone(),
            applier: Arc::new(DevApplier),
            message_pool: self.message_pool.clone(),
            election,
        }
    }

    /// Record a block mined on this chain
    pub fn store_block(&self, block: &Block) -> Result<Cid> {
        let cid = self.blockstore.put(&block.encode())?;
        debug!(cid = %cid, height = block.height, "Stored block");
        Ok(cid)
    }
}
