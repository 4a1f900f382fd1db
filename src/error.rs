//! Error handling for the spacetime miner
//!
//! Recoverable failures of a mining attempt are carried by [`Error`] and end up
//! in an `Output`. A broken signer is not recoverable and is reported through
//! the separate [`SigningFault`] type so callers can halt instead of retrying.

use crate::core::Address;
use thiserror::Error;

/// Result type alias for mining operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the spacetime miner
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML configuration parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Blocks that cannot form a tipset
    #[error("Invalid tipset: {message}")]
    InvalidTipSet { message: String },

    /// Operation needs at least one block in the tipset
    #[error("Tipset is empty: {operation}")]
    EmptyTipSet { operation: String },

    /// Chain weight arithmetic or input errors
    #[error("Weight error: {message}")]
    Weight { message: String },

    /// State tree lookup errors
    #[error("State tree error: {message}")]
    StateTree { message: String },

    /// Power table read errors
    #[error("Power table error: {message}")]
    PowerTable { message: String },

    /// Block store errors
    #[error("Blockstore error: {message}")]
    Blockstore { message: String },

    /// Signer capability errors
    #[error("Signing error for {address}: {message}")]
    Signing { address: String, message: String },

    /// Key and signature handling errors
    #[error("Cryptographic error: {message}")]
    Crypto { message: String },

    /// Address parsing and validation errors
    #[error("Invalid address: {message}")]
    Address { message: String },

    /// Proof generation errors
    #[error("Proof generation failed: {message}")]
    ProofGeneration { message: String },

    /// Block assembly errors
    #[error("Block assembly failed: {message}")]
    BlockAssembly { message: String },

    /// Message pool errors
    #[error("Message pool error: {message}")]
    MessagePool { message: String },

    /// Cancellation of async operations
    #[error("Operation was cancelled: {operation}")]
    Cancelled { operation: String },

    /// Invalid state errors
    #[error("Invalid state: {message}")]
    InvalidState { message: String },
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a tipset validation error
    pub fn invalid_tipset(message: impl Into<String>) -> Self {
        Self::InvalidTipSet {
            message: message.into(),
        }
    }

    /// Create an empty tipset error
    pub fn empty_tipset(operation: impl Into<String>) -> Self {
        Self::EmptyTipSet {
            operation: operation.into(),
        }
    }

    /// Create a weight error
    pub fn weight(message: impl Into<String>) -> Self {
        Self::Weight {
            message: message.into(),
        }
    }

    /// Create a state tree error
    pub fn state_tree(message: impl Into<String>) -> Self {
        Self::StateTree {
            message: message.into(),
        }
    }

    /// Create a power table error
    pub fn power_table(message: impl Into<String>) -> Self {
        Self::PowerTable {
            message: message.into(),
        }
    }

    /// Create a blockstore error
    pub fn blockstore(message: impl Into<String>) -> Self {
        Self::Blockstore {
            message: message.into(),
        }
    }

    /// Create a signing error
    pub fn signing(address: &Address, message: impl Into<String>) -> Self {
        Self::Signing {
            address: address.to_string(),
            message: message.into(),
        }
    }

    /// Create a crypto error
    pub fn crypto(message: impl Into<String>) -> Self {
        Self::Crypto {
            message: message.into(),
        }
    }

    /// Create an address error
    pub fn address(message: impl Into<String>) -> Self {
        Self::Address {
            message: message.into(),
        }
    }

    /// Create a proof generation error
    pub fn proof_generation(message: impl Into<String>) -> Self {
        Self::ProofGeneration {
            message: message.into(),
        }
    }

    /// Create a block assembly error
    pub fn block_assembly(message: impl Into<String>) -> Self {
        Self::BlockAssembly {
            message: message.into(),
        }
    }

    /// Create a message pool error
    pub fn message_pool(message: impl Into<String>) -> Self {
        Self::MessagePool {
            message: message.into(),
        }
    }

    /// Create a cancellation error
    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Check if a scheduler may retry the round after this error
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Io(_) => true,
            Error::StateTree { .. } => true,
            Error::PowerTable { .. } => true,
            Error::Blockstore { .. } => true,
            Error::ProofGeneration { .. } => true,
            Error::BlockAssembly { .. } => true,
            Error::MessagePool { .. } => true,
            _ => false,
        }
    }

    /// Check if this error only reports a cancelled operation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled { .. })
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Error::Io(_) => "io",
            Error::Json(_) => "json",
            Error::Yaml(_) => "yaml",
            Error::Config { .. } => "config",
            Error::InvalidTipSet { .. } => "invalid_tipset",
            Error::EmptyTipSet { .. } => "empty_tipset",
            Error::Weight { .. } => "weight",
            Error::StateTree { .. } => "state_tree",
            Error::PowerTable { .. } => "power_table",
            Error::Blockstore { .. } => "blockstore",
            Error::Signing { .. } => "signing",
            Error::Crypto { .. } => "crypto",
            Error::Address { .. } => "address",
            Error::ProofGeneration { .. } => "proof_generation",
            Error::BlockAssembly { .. } => "block_assembly",
            Error::MessagePool { .. } => "message_pool",
            Error::Cancelled { .. } => "cancelled",
            Error::InvalidState { .. } => "invalid_state",
        }
    }
}

/// Unrecoverable failure of the miner's signing identity.
///
/// A signer that cannot sign for the configured miner address points at a
/// corrupted key or address. Retrying the round cannot fix it, so the node
/// should stop mining.
#[derive(Error, Debug)]
#[error("unrecoverable signing fault for miner {address}: {source}")]
pub struct SigningFault {
    /// Address the signature was requested for
    pub address: Address,
    /// Error reported by the signer
    #[source]
    pub source: Error,
}

impl SigningFault {
    /// Wrap a signer error as a fault for `address`
    pub fn new(address: Address, source: Error) -> Self {
        Self { address, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config("missing miner key");
        assert_eq!(err.to_string(), "Configuration error: missing miner key");

        let err = Error::empty_tipset("height");
        assert_eq!(err.to_string(), "Tipset is empty: height");
    }

    #[test]
    fn test_error_conversions() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));

        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_retryable_and_category() {
        assert!(Error::state_tree("missing root").is_retryable());
        assert!(Error::power_table("lookup failed").is_retryable());
        assert!(!Error::invalid_tipset("height mismatch").is_retryable());
        assert!(!Error::weight("overflow").is_retryable());

        assert_eq!(Error::cancelled("proof").category(), "cancelled");
        assert!(Error::cancelled("proof").is_cancelled());
        assert_eq!(Error::block_assembly("boom").category(), "block_assembly");
    }

    #[test]
    fn test_signing_fault_display() {
        let fault = SigningFault::new(
            Address::new_id(7),
            Error::crypto("key not found"),
        );
        let text = fault.to_string();
        assert!(text.contains("t07"));
        assert!(text.contains("key not found"));
    }
}
