//! Spacetime Miner - Main Application
//!
//! Drives a single-miner development chain: one mining attempt per round on
//! the current head, adopting won blocks through fork choice.

use anyhow::Context;
use spacetime_miner::{
    consensus::ChainWeigher,
    core::select_head,
    crypto::MinerKey,
    devnet::Devnet,
    utils::{format_duration, init_logging},
    Config, DefaultWorker, Output, TipSet, Weight, Worker, APP_NAME, APP_VERSION,
};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Outcome of the round loop
struct RunSummary {
    rounds: u64,
    blocks: u64,
    failures: u64,
    head: TipSet,
    head_weight: Weight,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().await.context("failed to load configuration")?;

    if config.generate_key {
        let key = MinerKey::generate()?;
        println!("secret:  {}", key.to_hex());
        println!("address: {}", key.address());
        return Ok(());
    }

    if config.print_config {
        println!("{}", serde_yaml::to_string(&config)?);
        return Ok(());
    }

    let _log_guard = init_logging(config.log_level, config.log_format, config.log_file.as_deref())?;
    info!("{} {} starting", APP_NAME, APP_VERSION);

    let block_time = config.block_time_duration()?;
    let devnet = Devnet::new(config.miner_key()?, config.miner_power, config.total_power)
        .context("failed to set up devnet")?;
    let worker = DefaultWorker::new(
        devnet.worker_deps(config.election_params()),
        devnet.miner.clone(),
        devnet.signer.clone(),
        block_time,
    );

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            signal_token.cancel();
        }
    });

    info!(
        miner = %devnet.miner,
        rounds = config.rounds,
        block_time = %format_duration(block_time),
        "Mining on devnet"
    );

    let started = Instant::now();
    let summary = run(&devnet, &worker, config.rounds, shutdown).await?;

    info!(
        rounds = summary.rounds,
        blocks = summary.blocks,
        failures = summary.failures,
        head = %summary.head,
        head_height = summary.head.height().unwrap_or_default(),
        head_weight = %summary.head_weight,
        elapsed = %format_duration(std::time::Duration::from_secs(started.elapsed().as_secs())),
        "Mining finished"
    );
    Ok(())
}

async fn run(
    devnet: &Devnet,
    worker: &DefaultWorker,
    rounds: u64,
    shutdown: CancellationToken,
) -> anyhow::Result<RunSummary> {
    let (out_tx, mut out_rx) = mpsc::channel(1);
    let mut head = devnet.genesis.clone();
    let mut head_weight = devnet.weigher.weight(&head, None).await?;
    let mut null_block_count = 0u64;
    let mut summary_blocks = 0u64;
    let mut failures = 0u64;
    let mut completed = 0u64;

    for round in 0..rounds {
        if shutdown.is_cancelled() {
            warn!(round, "Stopping before round: shutdown requested");
            break;
        }

        let won = match worker.mine(shutdown.child_token(), &head, null_block_count, &out_tx).await {
            Ok(won) => won,
            Err(fault) => {
                error!(round, "Halting: {}", fault);
                return Err(anyhow::Error::new(fault).context("mining halted on a signing fault"));
            }
        };
        completed += 1;

        match out_rx.try_recv() {
            Ok(Output::NewBlock(block)) => {
                devnet.store_block(&block)?;
                let json = serde_json::to_string(&block)?;
                debug!(round, block = %json, "New block");

                let candidate = TipSet::new(vec![block])?;
                let candidate_weight = devnet.weigher.weight(&candidate, None).await?;
                let candidates = [(head.clone(), head_weight.clone()), (candidate, candidate_weight)];
                if let Some((best, best_weight)) = select_head(&candidates) {
                    if best.key() != head.key() {
                        info!(round, head = %best, weight = %best_weight, "Adopted new head");
                        head = best.clone();
                        head_weight = best_weight.clone();
                        null_block_count = 0;
                        summary_blocks += 1;
                        continue;
                    }
                }
                null_block_count += 1;
            }
            Ok(Output::Failed(e)) => {
                failures += 1;
                warn!(round, category = e.category(), retryable = e.is_retryable(), "Round failed: {}", e);
                null_block_count += 1;
            }
            Err(_) => {
                debug!(round, won, "No block this round");
                null_block_count += 1;
            }
        }
    }

    Ok(RunSummary {
        rounds: completed,
        blocks: summary_blocks,
        failures,
        head,
        head_weight,
    })
}
