//! Blocks and the leader-election artifacts they carry

use super::constants::{CHALLENGE_SEED_SIZE, PROOF_SIZE};
use super::{Address, Cid, MessageReceipt, SignedMessage, TipSetKey, Weight};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque signature bytes produced by a signer
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Signature(pub Vec<u8>);

impl Signature {
    /// Get the signature bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", hex::encode(&self.0))
    }
}

/// Leader-election ticket: the miner's signature over the proof bytes
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Ticket(pub Vec<u8>);

impl Ticket {
    /// Get the ticket bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Check whether the ticket carries no bytes (genesis)
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Signature> for Ticket {
    fn from(signature: Signature) -> Self {
        Self(signature.0)
    }
}

impl fmt::Debug for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ticket({})", hex::encode(&self.0))
    }
}

/// Per-round proof-of-spacetime challenge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChallengeSeed(pub [u8; CHALLENGE_SEED_SIZE]);

impl ChallengeSeed {
    /// Get the seed bytes
    pub fn as_bytes(&self) -> &[u8; CHALLENGE_SEED_SIZE] {
        &self.0
    }
}

impl fmt::Display for ChallengeSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Proof-of-spacetime artifact
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Proof(pub [u8; PROOF_SIZE]);

impl Proof {
    /// Placeholder proof: the seed in the leading bytes, zero elsewhere
    pub fn from_seed(seed: &ChallengeSeed) -> Self {
        let mut bytes = [0u8; PROOF_SIZE];
        bytes[..CHALLENGE_SEED_SIZE].copy_from_slice(seed.as_bytes());
        Self(bytes)
    }

    /// Copy a proof out of a byte slice
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let array: [u8; PROOF_SIZE] = bytes.try_into().map_err(|_| {
            Error::proof_generation(format!(
                "Invalid proof length: expected {} bytes, got {}",
                PROOF_SIZE,
                bytes.len()
            ))
        })?;
        Ok(Self(array))
    }

    /// Get the proof bytes
    pub fn as_bytes(&self) -> &[u8; PROOF_SIZE] {
        &self.0
    }
}

impl Default for Proof {
    fn default() -> Self {
        Self([0u8; PROOF_SIZE])
    }
}

impl fmt::Debug for Proof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Proof({}..)", hex::encode(&self.0[..8]))
    }
}

macro_rules! hex_serde {
    ($ty:ty, $parse:expr) => {
        impl Serialize for $ty {
            fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(&hex::encode(self.as_bytes()))
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
                $parse(bytes).map_err(serde::de::Error::custom)
            }
        }
    };
}

hex_serde!(Signature, |b: Vec<u8>| Ok::<_, Error>(Signature(b)));
hex_serde!(Ticket, |b: Vec<u8>| Ok::<_, Error>(Ticket(b)));
hex_serde!(Proof, |b: Vec<u8>| Proof::from_slice(&b));

/// A block as produced by the miner
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Block {
    /// Miner that won the election for this block
    pub miner: Address,
    /// Election ticket
    pub ticket: Ticket,
    /// Key of the parent tipset
    pub parents: TipSetKey,
    /// Weight of the parent tipset
    pub parent_weight: Weight,
    /// Parent height + null blocks + 1
    pub height: u64,
    /// Free nonce, used by tests and devnets to tell siblings apart
    pub nonce: u64,
    /// Messages included in the block
    pub messages: Vec<SignedMessage>,
    /// State root after applying the messages
    pub state_root: Cid,
    /// One receipt per included message
    pub message_receipts: Vec<MessageReceipt>,
    /// Proof-of-spacetime the ticket was derived from
    pub proof: Proof,
}

impl Block {
    /// Content identifier of the block
    pub fn cid(&self) -> Cid {
        Cid::of(&self.encode())
    }

    /// Canonical byte encoding used for content addressing
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(512);
        put_bytes(&mut buf, &self.miner.to_bytes());
        put_bytes(&mut buf, self.ticket.as_bytes());
        put_bytes(&mut buf, &self.parents.to_bytes());
        buf.extend_from_slice(&self.parent_weight.to_bytes());
        buf.extend_from_slice(&self.height.to_le_bytes());
        buf.extend_from_slice(&self.nonce.to_le_bytes());
        buf.extend_from_slice(&(self.messages.len() as u64).to_le_bytes());
        for msg in &self.messages {
            buf.extend_from_slice(msg.cid().as_bytes());
        }
        buf.extend_from_slice(self.state_root.as_bytes());
        buf.extend_from_slice(&(self.message_receipts.len() as u64).to_le_bytes());
        for receipt in &self.message_receipts {
            buf.push(receipt.exit_code);
            put_bytes(&mut buf, &receipt.return_value);
        }
        buf.extend_from_slice(self.proof.as_bytes());
        buf
    }
}

pub(crate) fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u64).to_le_bytes());
    buf.extend_from_slice(bytes);
}
