//! Spacetime Miner
//!
//! Block production and fork choice for a proof-of-spacetime chain:
//! - Tipset data model with exact rational chain weight
//! - Challenge seeds, election tickets and the power-proportional win check
//! - An async, cancellable mining worker that assembles blocks for won rounds
//! - In-memory collaborators for running a local development chain

pub mod config;
pub mod consensus;
pub mod core;
pub mod crypto;
pub mod devnet;
pub mod error;
pub mod mempool;
pub mod utils;
pub mod worker;

pub use config::Config;
pub use crate::core::{Address, Block, Cid, TipSet, TipSetKey, Weight};
pub use error::{Error, Result, SigningFault};
pub use worker::{DefaultWorker, MiningState, Output, Worker, WorkerDeps};

/// Application information
pub const APP_NAME: &str = "spacetime-miner";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
