//! End-to-end mining attempts against the in-memory devnet

use assert_matches::assert_matches;
use async_trait::async_trait;
use spacetime_miner::consensus::{
    create_challenge_seed, verify_round_ticket, verify_ticket, ApplicationResult, ApplyMessagesResponse,
    ChainWeigher, ElectionParams, MessageApplier, Signer, StateAccessor, StateTree,
};
use spacetime_miner::core::{Address, ChallengeSeed, Cid, Message, MessageReceipt, Proof, Signature, SignedMessage, TipSet};
use spacetime_miner::crypto::MinerKey;
use spacetime_miner::devnet::{mk_fake_child, BlockStateAccessor, DevApplier, Devnet, FakeChild, FixedPowerTable, MemStateTree};
use spacetime_miner::worker::{
    ConstantDelayProver, DefaultWorker, MiningState, Output, ProofGenerator, Worker, WorkerDeps,
};
use spacetime_miner::{Error, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Prover that answers immediately
struct InstantProver;

#[async_trait]
impl ProofGenerator for InstantProver {
    fn prover_type(&self) -> &'static str {
        "instant"
    }

    async fn create_proof(&self, seed: ChallengeSeed, cancel: CancellationToken) -> Result<Proof> {
        if cancel.is_cancelled() {
            return Err(Error::cancelled("instant proof"));
        }
        Ok(Proof::from_seed(&seed))
    }
}

struct FailingProver;

#[async_trait]
impl ProofGenerator for FailingProver {
    fn prover_type(&self) -> &'static str {
        "failing"
    }

    async fn create_proof(&self, _: ChallengeSeed, _: CancellationToken) -> Result<Proof> {
        Err(Error::proof_generation("disk unavailable"))
    }
}

struct BrokenSigner;

impl Signer for BrokenSigner {
    fn sign_bytes(&self, _: &[u8], address: &Address) -> Result<Signature> {
        Err(Error::signing(address, "key material corrupted"))
    }
}

struct FailingStateAccessor;

#[async_trait]
impl StateAccessor for FailingStateAccessor {
    async fn state_tree(&self, _: &TipSet) -> Result<Arc<dyn StateTree>> {
        Err(Error::state_tree("state root missing from store"))
    }
}

/// Accessor that counts lookups and drifts to a new root after the first
#[derive(Default)]
struct DriftingStateAccessor {
    calls: AtomicUsize,
}

#[async_trait]
impl StateAccessor for DriftingStateAccessor {
    async fn state_tree(&self, base: &TipSet) -> Result<Arc<dyn StateTree>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            return BlockStateAccessor.state_tree(base).await;
        }
        Ok(Arc::new(MemStateTree::new(Cid::of(b"drifted"))))
    }
}

/// Applier that rejects every message calling `bad` and accepts the rest
struct PickyApplier;

#[async_trait]
impl MessageApplier for PickyApplier {
    async fn apply_messages_and_pay_rewards(
        &self,
        state: &dyn StateTree,
        messages: Vec<SignedMessage>,
        miner: &Address,
        height: u64,
    ) -> Result<ApplyMessagesResponse> {
        let (bad, good): (Vec<_>, Vec<_>) = messages.into_iter().partition(|m| m.message.method == "bad");
        let mut response = DevApplier
            .apply_messages_and_pay_rewards(state, good, miner, height)
            .await?;
        response.permanent_failures = bad;
        Ok(response)
    }
}

fn test_key() -> MinerKey {
    MinerKey::from_bytes(&[0x42; 32]).unwrap()
}

fn test_worker(devnet: &Devnet) -> DefaultWorker {
    DefaultWorker::new(
        devnet.worker_deps(ElectionParams::default()),
        devnet.miner.clone(),
        devnet.signer.clone(),
        Duration::from_secs(30),
    )
    .with_prover(Arc::new(InstantProver))
}

async fn chain_of_height(devnet: &Devnet, height: u64) -> TipSet {
    let mut head = devnet.genesis.clone();
    for nonce in 0..height {
        let block = mk_fake_child(FakeChild {
            parent: &head,
            weigher: devnet.weigher.as_ref(),
            miner: devnet.miner.clone(),
            nonce,
            null_block_count: 0,
            state_root: None,
        })
        .await
        .unwrap();
        head = TipSet::new(vec![block]).unwrap();
    }
    head
}

fn drain(rx: &mut mpsc::Receiver<Output>) -> Vec<Output> {
    let mut outputs = Vec::new();
    while let Ok(output) = rx.try_recv() {
        outputs.push(output);
    }
    outputs
}

fn message(from: u64, nonce: u64, method: &str) -> SignedMessage {
    SignedMessage::new(
        Message {
            from: Address::new_id(from),
            to: Address::new_id(1000),
            nonce,
            value: 1,
            method: method.to_string(),
            params: vec![],
        },
        Signature(vec![from as u8, nonce as u8]),
    )
}

#[tokio::test]
async fn test_winner_mines_block_after_null_rounds() {
    let devnet = Devnet::new(test_key(), 100, 100).unwrap();
    let worker = test_worker(&devnet);
    let base = chain_of_height(&devnet, 5).await;
    let (tx, mut rx) = mpsc::channel(4);

    let won = worker.mine(CancellationToken::new(), &base, 2, &tx).await.unwrap();
    assert!(won);

    let outputs = drain(&mut rx);
    assert_eq!(outputs.len(), 1);
    let block = assert_matches!(&outputs[0], Output::NewBlock(block) => block);

    assert_eq!(block.height, 8);
    assert_eq!(block.miner, devnet.miner);
    assert_eq!(block.parents, base.key());
    assert_eq!(block.parent_weight, devnet.weigher.weight(&base, None).await.unwrap());

    let seed = create_challenge_seed(&base, 2).unwrap();
    assert_eq!(block.proof, Proof::from_seed(&seed));
    assert!(verify_ticket(&block.ticket, &block.proof, &devnet.miner).unwrap());
    assert!(verify_round_ticket(&base, 2, &block.ticket, &devnet.miner).unwrap());
    assert!(!verify_round_ticket(&base, 1, &block.ticket, &devnet.miner).unwrap());
}

#[tokio::test]
async fn test_empty_base_reports_one_error() {
    let devnet = Devnet::new(test_key(), 100, 100).unwrap();
    let worker = test_worker(&devnet);
    let (tx, mut rx) = mpsc::channel(4);

    let won = worker.mine(CancellationToken::new(), &TipSet::default(), 0, &tx).await.unwrap();
    assert!(!won);

    let outputs = drain(&mut rx);
    assert_eq!(outputs.len(), 1);
    assert_matches!(&outputs[0], Output::Failed(Error::EmptyTipSet { .. }));
}

#[tokio::test]
async fn test_pre_cancelled_attempt_is_silent() {
    let devnet = Devnet::new(test_key(), 100, 100).unwrap();
    let worker = test_worker(&devnet);
    let (tx, mut rx) = mpsc::channel(4);

    let cancel = CancellationToken::new();
    cancel.cancel();

    let won = worker.mine(cancel, &devnet.genesis, 0, &tx).await.unwrap();
    assert!(!won);
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_cancel_during_proof_is_silent() {
    let devnet = Devnet::new(test_key(), 100, 100).unwrap();
    let block_time = Duration::from_secs(10);
    let worker = test_worker(&devnet).with_prover(Arc::new(ConstantDelayProver::new(block_time)));
    let (tx, mut rx) = mpsc::channel(4);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let start = Instant::now();
    let won = worker.mine(cancel, &devnet.genesis, 0, &tx).await.unwrap();

    assert!(!won);
    assert!(start.elapsed() < block_time);
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_constant_delay_prover_mines_after_block_time() {
    let devnet = Devnet::new(test_key(), 100, 100).unwrap();
    let block_time = Duration::from_millis(30);
    let worker = DefaultWorker::new(
        devnet.worker_deps(ElectionParams::default()),
        devnet.miner.clone(),
        devnet.signer.clone(),
        block_time,
    );
    let (tx, mut rx) = mpsc::channel(4);

    let start = Instant::now();
    assert!(worker.mine(CancellationToken::new(), &devnet.genesis, 0, &tx).await.unwrap());
    assert!(start.elapsed() >= block_time);
    assert_matches!(drain(&mut rx).as_slice(), [Output::NewBlock(block)] if block.height == 1);
}

#[tokio::test]
async fn test_signer_failure_is_fault_without_output() {
    let devnet = Devnet::new(test_key(), 100, 100).unwrap();
    let worker = DefaultWorker::new(
        devnet.worker_deps(ElectionParams::default()),
        devnet.miner.clone(),
        Arc::new(BrokenSigner),
        Duration::from_secs(30),
    )
    .with_prover(Arc::new(InstantProver));
    let (tx, mut rx) = mpsc::channel(4);

    let fault = worker
        .mine(CancellationToken::new(), &devnet.genesis, 0, &tx)
        .await
        .unwrap_err();

    assert_eq!(fault.address, devnet.miner);
    assert_matches!(fault.source, Error::Signing { .. });
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_loser_is_silent() {
    let devnet = Devnet::new(test_key(), 0, 100).unwrap();
    let worker = test_worker(&devnet);
    let (tx, mut rx) = mpsc::channel(4);

    for nulls in 0..8 {
        let won = worker.mine(CancellationToken::new(), &devnet.genesis, nulls, &tx).await.unwrap();
        assert!(!won);
    }
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_state_failure_reports_error() {
    let devnet = Devnet::new(test_key(), 100, 100).unwrap();
    let mut deps = devnet.worker_deps(ElectionParams::default());
    deps.state_accessor = Arc::new(FailingStateAccessor);
    let worker = DefaultWorker::new(deps, devnet.miner.clone(), devnet.signer.clone(), Duration::from_secs(30))
        .with_prover(Arc::new(InstantProver));
    let (tx, mut rx) = mpsc::channel(4);

    let won = worker.mine(CancellationToken::new(), &devnet.genesis, 0, &tx).await.unwrap();
    assert!(!won);
    assert_matches!(drain(&mut rx).as_slice(), [Output::Failed(Error::StateTree { .. })]);
}

#[tokio::test]
async fn test_proof_failure_reports_error() {
    let devnet = Devnet::new(test_key(), 100, 100).unwrap();
    let worker = test_worker(&devnet).with_prover(Arc::new(FailingProver));
    let (tx, mut rx) = mpsc::channel(4);

    let won = worker.mine(CancellationToken::new(), &devnet.genesis, 0, &tx).await.unwrap();
    assert!(!won);
    assert_matches!(drain(&mut rx).as_slice(), [Output::Failed(Error::ProofGeneration { .. })]);
}

#[tokio::test]
async fn test_zero_total_power_reports_error() {
    let devnet = Devnet::new(test_key(), 100, 100).unwrap();
    let mut deps = devnet.worker_deps(ElectionParams::default());
    deps.power_table = Arc::new(FixedPowerTable::new(0));
    let worker = DefaultWorker::new(deps, devnet.miner.clone(), devnet.signer.clone(), Duration::from_secs(30))
        .with_prover(Arc::new(InstantProver));
    let (tx, mut rx) = mpsc::channel(4);

    let won = worker.mine(CancellationToken::new(), &devnet.genesis, 0, &tx).await.unwrap();
    assert!(!won);
    assert_matches!(drain(&mut rx).as_slice(), [Output::Failed(Error::PowerTable { .. })]);
}

#[tokio::test]
async fn test_block_includes_pending_messages_in_order() {
    let devnet = Devnet::new(test_key(), 100, 100).unwrap();
    for (from, nonce) in [(2, 1), (1, 1), (2, 0), (1, 0)] {
        devnet.message_pool.add(message(from, nonce, "transfer")).unwrap();
    }
    let worker = test_worker(&devnet);
    let (tx, mut rx) = mpsc::channel(4);

    assert!(worker.mine(CancellationToken::new(), &devnet.genesis, 0, &tx).await.unwrap());
    let block = drain(&mut rx).pop().unwrap().into_result().unwrap();

    let order: Vec<(u64, u64)> = block
        .messages
        .iter()
        .map(|m| (m.message.from.id().unwrap(), m.message.nonce))
        .collect();
    assert_eq!(order, vec![(1, 0), (1, 1), (2, 0), (2, 1)]);
    assert_eq!(block.message_receipts, vec![MessageReceipt::default(); 4]);
    assert_ne!(block.state_root, devnet.genesis.canonical_block().unwrap().state_root);
}

#[tokio::test]
async fn test_permanent_failures_leave_pool() {
    let devnet = Devnet::new(test_key(), 100, 100).unwrap();
    let good = message(1, 0, "transfer");
    let bad = message(1, 1, "bad");
    devnet.message_pool.add(good.clone()).unwrap();
    let bad_cid = devnet.message_pool.add(bad).unwrap();

    let mut deps = devnet.worker_deps(ElectionParams::default());
    deps.applier = Arc::new(PickyApplier);
    let worker = DefaultWorker::new(deps, devnet.miner.clone(), devnet.signer.clone(), Duration::from_secs(30))
        .with_prover(Arc::new(InstantProver));
    let (tx, mut rx) = mpsc::channel(4);

    assert!(worker.mine(CancellationToken::new(), &devnet.genesis, 0, &tx).await.unwrap());
    let block = drain(&mut rx).pop().unwrap().into_result().unwrap();

    assert_eq!(block.messages, vec![good.clone()]);
    assert_eq!(block.message_receipts.len(), 1);
    assert_eq!(devnet.message_pool.len(), 1);
    assert!(devnet.message_pool.remove(&bad_cid).is_none());
    assert!(devnet.message_pool.remove(&good.cid()).is_some());
}

/// Applier that reports more receipts than it includes messages
struct InconsistentApplier;

#[async_trait]
impl MessageApplier for InconsistentApplier {
    async fn apply_messages_and_pay_rewards(
        &self,
        state: &dyn StateTree,
        _: Vec<SignedMessage>,
        _: &Address,
        _: u64,
    ) -> Result<ApplyMessagesResponse> {
        Ok(ApplyMessagesResponse {
            results: vec![ApplicationResult {
                receipt: MessageReceipt::default(),
                execution_error: None,
            }],
            state_root: state.root(),
            ..ApplyMessagesResponse::default()
        })
    }
}

#[tokio::test]
async fn test_assembly_failure_still_counts_as_win() {
    let devnet = Devnet::new(test_key(), 100, 100).unwrap();
    let mut deps = devnet.worker_deps(ElectionParams::default());
    deps.applier = Arc::new(InconsistentApplier);
    let worker = DefaultWorker::new(deps, devnet.miner.clone(), devnet.signer.clone(), Duration::from_secs(30))
        .with_prover(Arc::new(InstantProver));
    let (tx, mut rx) = mpsc::channel(4);

    assert!(worker.mine(CancellationToken::new(), &devnet.genesis, 0, &tx).await.unwrap());
    assert_matches!(drain(&mut rx).as_slice(), [Output::Failed(Error::BlockAssembly { .. })]);
}

#[tokio::test]
async fn test_state_transitions_reported() {
    let devnet = Devnet::new(test_key(), 100, 100).unwrap();
    let (state_tx, mut state_rx) = mpsc::unbounded_channel();
    let worker = test_worker(&devnet).with_state_reporter(state_tx);
    let (tx, _rx) = mpsc::channel(4);

    assert!(worker.mine(CancellationToken::new(), &devnet.genesis, 0, &tx).await.unwrap());

    let mut states = Vec::new();
    while let Ok(state) = state_rx.try_recv() {
        states.push(state);
    }
    assert_eq!(
        states,
        vec![
            MiningState::Idle,
            MiningState::ComputingState,
            MiningState::AwaitingProof,
            MiningState::CheckingWin,
            MiningState::Assembling,
            MiningState::Done,
        ]
    );
}

#[tokio::test]
async fn test_dropped_receiver_does_not_fail_attempt() {
    let devnet = Devnet::new(test_key(), 100, 100).unwrap();
    let worker = test_worker(&devnet);
    let (tx, rx) = mpsc::channel(4);
    drop(rx);

    assert!(worker.mine(CancellationToken::new(), &devnet.genesis, 0, &tx).await.unwrap());
}

#[tokio::test]
async fn test_concurrent_attempts_each_report_once() {
    let devnet = Devnet::new(test_key(), 100, 100).unwrap();
    let worker = test_worker(&devnet);
    let base = chain_of_height(&devnet, 2).await;
    let (tx, mut rx) = mpsc::channel(8);

    let attempts = (0..4).map(|nulls| worker.mine(CancellationToken::new(), &base, nulls, &tx));
    let results = futures::future::join_all(attempts).await;
    assert!(results.into_iter().all(|r| matches!(r, Ok(true))));

    let mut heights: Vec<u64> = drain(&mut rx)
        .into_iter()
        .map(|o| o.into_result().unwrap().height)
        .collect();
    heights.sort();
    assert_eq!(heights, vec![3, 4, 5, 6]);
}

#[tokio::test]
async fn test_mined_chain_extends_through_deps() {
    let devnet = Devnet::new(test_key(), 100, 100).unwrap();
    let deps: WorkerDeps = devnet.worker_deps(ElectionParams::default());
    let worker = DefaultWorker::new(deps, devnet.miner.clone(), devnet.signer.clone(), Duration::from_secs(30))
        .with_prover(Arc::new(InstantProver));
    let (tx, mut rx) = mpsc::channel(4);

    let mut head = devnet.genesis.clone();
    let mut last_weight = devnet.weigher.weight(&head, None).await.unwrap();
    for expected_height in 1..=3 {
        assert!(worker.mine(CancellationToken::new(), &head, 0, &tx).await.unwrap());
        let block = drain(&mut rx).pop().unwrap().into_result().unwrap();
        assert_eq!(block.height, expected_height);
        assert_eq!(block.parent_weight, last_weight);

        head = TipSet::new(vec![block]).unwrap();
        let weight = devnet.weigher.weight(&head, None).await.unwrap();
        assert!(weight > last_weight);
        last_weight = weight;
    }
}

#[tokio::test]
async fn test_assembly_reuses_state_from_win_check() {
    let devnet = Devnet::new(test_key(), 100, 100).unwrap();
    let accessor = Arc::new(DriftingStateAccessor::default());
    let mut deps = devnet.worker_deps(ElectionParams::default());
    deps.state_accessor = accessor.clone();
    let worker = DefaultWorker::new(deps, devnet.miner.clone(), devnet.signer.clone(), Duration::from_secs(30))
        .with_prover(Arc::new(InstantProver));
    let (tx, mut rx) = mpsc::channel(4);

    assert!(worker.mine(CancellationToken::new(), &devnet.genesis, 0, &tx).await.unwrap());
    let block = drain(&mut rx).pop().unwrap().into_result().unwrap();

    assert_eq!(accessor.calls.load(Ordering::SeqCst), 1);

    let base_state = BlockStateAccessor.state_tree(&devnet.genesis).await.unwrap();
    let expected = DevApplier
        .apply_messages_and_pay_rewards(base_state.as_ref(), vec![], &devnet.miner, 1)
        .await
        .unwrap();
    assert_eq!(block.state_root, expected.state_root);
}
