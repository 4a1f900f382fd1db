//! Actor addresses
//!
//! On chain an address is `protocol byte ‖ payload`. The text form adds a
//! network prefix and, for hash-based payloads, a 4-byte checksum.

use super::constants::{BLS_PAYLOAD_SIZE, CHECKSUM_SIZE, HASH_PAYLOAD_SIZE};
use crate::crypto::blake2s_256;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Network an address string belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    /// Main network, prefix `f`
    Mainnet,
    /// Test network, prefix `t`
    Testnet,
}

impl Network {
    /// Get the string prefix of the network
    pub fn prefix(&self) -> char {
        match self {
            Network::Mainnet => 'f',
            Network::Testnet => 't',
        }
    }

    fn from_prefix(c: char) -> Option<Self> {
        match c {
            'f' => Some(Network::Mainnet),
            't' => Some(Network::Testnet),
            _ => None,
        }
    }
}

/// Address protocol discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Protocol {
    /// Numeric actor id
    Id = 0,
    /// Hash of a secp256k1 public key
    Secp256k1 = 1,
    /// Hash of actor creation data
    Actor = 2,
    /// BLS public key
    Bls = 3,
}

impl Protocol {
    /// Parse a protocol byte
    pub fn from_byte(b: u8) -> Result<Self> {
        match b {
            0 => Ok(Protocol::Id),
            1 => Ok(Protocol::Secp256k1),
            2 => Ok(Protocol::Actor),
            3 => Ok(Protocol::Bls),
            other => Err(Error::address(format!("unknown protocol {}", other))),
        }
    }

    fn payload_len(&self) -> usize {
        match self {
            Protocol::Id => 8,
            Protocol::Secp256k1 | Protocol::Actor => HASH_PAYLOAD_SIZE,
            Protocol::Bls => BLS_PAYLOAD_SIZE,
        }
    }
}

/// Address of an actor, miner or key
///
/// `Address::default()` is the undefined address.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address {
    bytes: Vec<u8>,
}

impl Address {
    /// Create an ID address
    pub fn new_id(id: u64) -> Self {
        let mut bytes = Vec::with_capacity(9);
        bytes.push(Protocol::Id as u8);
        bytes.extend_from_slice(&id.to_be_bytes());
        Self { bytes }
    }

    /// Create a secp256k1 address from an uncompressed public key
    pub fn new_secp256k1(public_key: &[u8]) -> Self {
        Self::from_hashed(Protocol::Secp256k1, public_key)
    }

    /// Create an actor address from creation data
    pub fn new_actor(data: &[u8]) -> Self {
        Self::from_hashed(Protocol::Actor, data)
    }

    /// Create a BLS address from a 48-byte public key
    pub fn new_bls(public_key: &[u8]) -> Result<Self> {
        Self::from_payload(Protocol::Bls, public_key)
    }

    fn from_hashed(protocol: Protocol, data: &[u8]) -> Self {
        let digest = blake2s_256(data);
        let mut bytes = Vec::with_capacity(1 + HASH_PAYLOAD_SIZE);
        bytes.push(protocol as u8);
        bytes.extend_from_slice(&digest[..HASH_PAYLOAD_SIZE]);
        Self { bytes }
    }

    /// Create an address from protocol and payload, validating the length
    pub fn from_payload(protocol: Protocol, payload: &[u8]) -> Result<Self> {
        if payload.len() != protocol.payload_len() {
            return Err(Error::address(format!(
                "invalid payload length for {:?}: expected {}, got {}",
                protocol,
                protocol.payload_len(),
                payload.len()
            )));
        }
        let mut bytes = Vec::with_capacity(1 + payload.len());
        bytes.push(protocol as u8);
        bytes.extend_from_slice(payload);
        Ok(Self { bytes })
    }

    /// Decode the on-chain byte form
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (&first, payload) = bytes
            .split_first()
            .ok_or_else(|| Error::address("empty address bytes"))?;
        Self::from_payload(Protocol::from_byte(first)?, payload)
    }

    /// Get the on-chain byte form
    pub fn to_bytes(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    /// Check if this is the undefined address
    pub fn is_undefined(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Get the protocol, `None` for the undefined address
    pub fn protocol(&self) -> Option<Protocol> {
        self.bytes
            .first()
            .and_then(|b| Protocol::from_byte(*b).ok())
    }

    /// Get the payload bytes
    pub fn payload(&self) -> &[u8] {
        self.bytes.get(1..).unwrap_or(&[])
    }

    /// Get the numeric id of an ID address
    pub fn id(&self) -> Option<u64> {
        match self.protocol() {
            Some(Protocol::Id) => {
                let raw: [u8; 8] = self.payload().try_into().ok()?;
                Some(u64::from_be_bytes(raw))
            }
            _ => None,
        }
    }

    fn checksum(&self) -> [u8; CHECKSUM_SIZE] {
        let digest = blake2s_256(&self.bytes);
        let mut sum = [0u8; CHECKSUM_SIZE];
        sum.copy_from_slice(&digest[..CHECKSUM_SIZE]);
        sum
    }

    /// Encode as a string for `network`
    pub fn encode(&self, network: Network) -> String {
        match self.protocol() {
            None => "<undef>".to_string(),
            Some(Protocol::Id) => {
                format!("{}0{}", network.prefix(), self.id().unwrap_or_default())
            }
            Some(protocol) => {
                let mut body = self.payload().to_vec();
                body.extend_from_slice(&self.checksum());
                format!("{}{}{}", network.prefix(), protocol as u8, hex::encode(body))
            }
        }
    }

    /// Decode an address string, returning it together with its network
    pub fn decode(s: &str) -> Result<(Network, Self)> {
        let mut chars = s.chars();
        let network = chars
            .next()
            .and_then(Network::from_prefix)
            .ok_or_else(|| Error::address(format!("unknown network prefix in {:?}", s)))?;
        let protocol = chars
            .next()
            .and_then(|c| c.to_digit(10))
            .ok_or_else(|| Error::address(format!("missing protocol in {:?}", s)))
            .and_then(|d| Protocol::from_byte(d as u8))?;
        let body = &s[2..];

        if protocol == Protocol::Id {
            // Only the form `encode` produces: plain digits, no leading zeros
            let canonical = !body.is_empty()
                && body.bytes().all(|b| b.is_ascii_digit())
                && (body == "0" || !body.starts_with('0'));
            if !canonical {
                return Err(Error::address(format!("non-canonical id {:?}", body)));
            }
            let id: u64 = body
                .parse()
                .map_err(|e| Error::address(format!("invalid id {:?}: {}", body, e)))?;
            return Ok((network, Self::new_id(id)));
        }

        if body.bytes().any(|b| b.is_ascii_uppercase()) {
            return Err(Error::address(format!("non-canonical hex in {:?}", s)));
        }
        let raw = hex::decode(body)
            .map_err(|e| Error::address(format!("invalid hex in address: {}", e)))?;
        if raw.len() < CHECKSUM_SIZE {
            return Err(Error::address("address body shorter than checksum"));
        }
        let (payload, checksum) = raw.split_at(raw.len() - CHECKSUM_SIZE);
        let address = Self::from_payload(protocol, payload)?;
        if address.checksum() != checksum {
            return Err(Error::address("checksum mismatch"));
        }
        Ok((network, address))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode(Network::Testnet))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::decode(s).map(|(_, address)| address)
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        if self.is_undefined() {
            return serializer.serialize_str("");
        }
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if s.is_empty() {
            return Ok(Address::default());
        }
        Address::from_str(&s).map_err(serde::de::Error::custom)
    }
}
