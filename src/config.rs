//! Configuration management for the spacetime miner
//!
//! Supports configuration via command line arguments, environment variables,
//! and configuration files (YAML/JSON). Values given on the command line win
//! over values from the file.

use crate::consensus::ElectionParams;
use crate::crypto::MinerKey;
use crate::utils::{parse_duration, LogFormat, LogLevel};
use crate::{Error, Result};
use clap::parser::ValueSource;
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_BLOCK_TIME: &str = "30s";
const DEFAULT_ROUNDS: u64 = 10;
const DEFAULT_POWER: u64 = 100;

/// Complete configuration for the devnet miner
#[derive(Debug, Clone, Parser, Serialize, Deserialize)]
#[command(
    name = "spacetime-miner",
    version = env!("CARGO_PKG_VERSION"),
    about = "Proof-of-spacetime mining worker",
    long_about = "Runs a single-miner development chain: elects a leader every round, assembles blocks and extends the heaviest tipset"
)]
pub struct Config {
    /// Generate a new miner key and exit
    #[arg(long)]
    #[serde(skip)]
    pub generate_key: bool,

    /// Print the parsed configuration and exit
    #[arg(long)]
    #[serde(skip)]
    pub print_config: bool,

    /// Configuration file path (YAML or JSON)
    #[arg(long, value_name = "FILE")]
    #[serde(skip)]
    pub config_file: Option<PathBuf>,

    /// Hex-encoded secp256k1 secret key of the miner
    #[arg(short = 'k', long, env = "SPACETIME_MINER_KEY", hide_env_values = true)]
    #[serde(default, skip_serializing)]
    pub miner_key: Option<String>,

    /// Time the placeholder prover takes per round (e.g. `30s`, `500ms`)
    #[arg(short = 'b', long, default_value = DEFAULT_BLOCK_TIME)]
    #[serde(default = "default_block_time")]
    pub block_time: String,

    /// Number of rounds to mine before exiting
    #[arg(short = 'r', long, default_value_t = DEFAULT_ROUNDS)]
    #[serde(default = "default_rounds")]
    pub rounds: u64,

    /// Storage power of the miner
    #[arg(long, default_value_t = DEFAULT_POWER)]
    #[serde(default = "default_power")]
    pub miner_power: u64,

    /// Total storage power of the network
    #[arg(long, default_value_t = DEFAULT_POWER)]
    #[serde(default = "default_power")]
    pub total_power: u64,

    /// Expected number of election winners per round
    #[arg(long, default_value_t = 1)]
    #[serde(default = "default_expected_leaders")]
    pub expected_leaders: u64,

    /// Log level
    #[arg(short = 'l', long, default_value = "info")]
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,

    /// Log output format
    #[arg(long, default_value = "plain")]
    #[serde(default)]
    pub log_format: LogFormat,

    /// Write logs to this file instead of stderr
    #[arg(long, value_name = "FILE")]
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Config {
    /// Parse the command line, merge the config file and validate
    pub async fn load() -> Result<Self> {
        let matches = <Self as CommandFactory>::command().get_matches();
        Self::from_matches(matches).await
    }

    /// Same as [`Config::load`] with explicit arguments
    pub async fn load_from_args<I, T>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let matches = <Self as CommandFactory>::command()
            .try_get_matches_from(args)
            .map_err(|e| Error::config(e.to_string()))?;
        Self::from_matches(matches).await
    }

    async fn from_matches(matches: ArgMatches) -> Result<Self> {
        let mut config = Self::from_arg_matches(&matches).map_err(|e| Error::config(e.to_string()))?;

        if let Some(config_file) = config.config_file.clone() {
            let file_config = Self::load_from_file(&config_file).await?;
            config = config.merge_with_file(file_config, &matches);
        }

        if !config.generate_key {
            config.validate()?;
        }
        Ok(config)
    }

    /// Load configuration from file
    pub async fn load_from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;

        if path.extension().and_then(|s| s.to_str()) == Some("json") {
            serde_json::from_str(&content).map_err(Error::from)
        } else {
            serde_yaml::from_str(&content).map_err(Error::from)
        }
    }

    /// Take file values for every option not given explicitly on the command line
    fn merge_with_file(mut self, file: Self, matches: &ArgMatches) -> Self {
        let from_cli = |id: &str| {
            matches!(
                matches.value_source(id),
                Some(ValueSource::CommandLine) | Some(ValueSource::EnvVariable)
            )
        };

        if !from_cli("miner_key") && file.miner_key.is_some() {
            self.miner_key = file.miner_key;
        }
        if !from_cli("block_time") {
            self.block_time = file.block_time;
        }
        if !from_cli("rounds") {
            self.rounds = file.rounds;
        }
        if !from_cli("miner_power") {
            self.miner_power = file.miner_power;
        }
        if !from_cli("total_power") {
            self.total_power = file.total_power;
        }
        if !from_cli("expected_leaders") {
            self.expected_leaders = file.expected_leaders;
        }
        if !from_cli("log_level") {
            self.log_level = file.log_level;
        }
        if !from_cli("log_format") {
            self.log_format = file.log_format;
        }
        if !from_cli("log_file") && file.log_file.is_some() {
            self.log_file = file.log_file;
        }
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        match &self.miner_key {
            Some(key) => {
                MinerKey::from_hex(key)?;
            }
            None => return Err(Error::config("a miner key is required (--miner-key or SPACETIME_MINER_KEY)")),
        }

        parse_duration(&self.block_time)?;

        if self.total_power == 0 {
            return Err(Error::config("Total power must be greater than 0"));
        }
        if self.miner_power > self.total_power {
            return Err(Error::config(format!(
                "Miner power {} exceeds total power {}",
                self.miner_power, self.total_power
            )));
        }
        if self.expected_leaders == 0 {
            return Err(Error::config("Expected leaders per round must be greater than 0"));
        }

        Ok(())
    }

    /// Get the miner key
    pub fn miner_key(&self) -> Result<MinerKey> {
        let key = self
            .miner_key
            .as_deref()
            .ok_or_else(|| Error::config("no miner key configured"))?;
        MinerKey::from_hex(key)
    }

    /// Get the block time
    pub fn block_time_duration(&self) -> Result<Duration> {
        parse_duration(&self.block_time)
    }

    /// Get the election parameters
    pub fn election_params(&self) -> ElectionParams {
        ElectionParams {
            expected_leaders_per_round: self.expected_leaders,
        }
    }
}

// Default value functions for serde
fn default_block_time() -> String { DEFAULT_BLOCK_TIME.to_string() }
fn default_rounds() -> u64 { DEFAULT_ROUNDS }
fn default_power() -> u64 { DEFAULT_POWER }
fn default_expected_leaders() -> u64 { 1 }
fn default_log_level() -> LogLevel { LogLevel::Info }
