//! Core chain types
//!
//! Content identifiers, addresses, blocks, messages, tipsets and the exact
//! rational chain weight that fork choice runs on.

mod address;
mod block;
mod cid;
mod message;
mod tipset;
mod weight;

pub use address::{Address, Network, Protocol};
pub use block::{Block, ChallengeSeed, Proof, Signature, Ticket};
pub use cid::Cid;
pub use message::{Message, MessageReceipt, SignedMessage};
pub use tipset::{TipSet, TipSetKey};
pub use weight::{fork_choice_cmp, select_head, Weight};

/// Constants shared by the chain types
pub mod constants {
    /// Size of a content identifier in bytes (Blake2s-256)
    pub const CID_SIZE: usize = 32;

    /// Size of a proof-of-spacetime challenge seed in bytes
    pub const CHALLENGE_SEED_SIZE: usize = 32;

    /// Size of a proof-of-spacetime proof in bytes
    pub const PROOF_SIZE: usize = 192;

    /// Payload length of secp256k1 and actor addresses
    pub const HASH_PAYLOAD_SIZE: usize = 20;

    /// Payload length of BLS addresses
    pub const BLS_PAYLOAD_SIZE: usize = 48;

    /// Length of the address checksum in bytes
    pub const CHECKSUM_SIZE: usize = 4;
}
