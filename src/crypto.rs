//! Cryptographic utilities for mining
//!
//! Blake2s hashing for content ids, checksums and election randomness, and
//! recoverable secp256k1 signatures for miner keys.

use crate::consensus::Signer;
use crate::core::{Address, Signature};
use crate::{Error, Result};
use blake2::{Blake2s256, Digest};
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, SigningKey, VerifyingKey};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Length of a recoverable secp256k1 signature (`r ‖ s ‖ v`)
pub const SECP256K1_SIGNATURE_SIZE: usize = 65;

/// Incremental Blake2s hasher for domain-separated digests
pub struct Blake2sHasher {
    hasher: Blake2s256,
}

impl Blake2sHasher {
    /// Create a new hasher, optionally bound to a domain tag
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Blake2s256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Feed bytes into the digest
    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        self.hasher.update(data);
        self
    }

    /// Finish and return the 32-byte digest
    pub fn finalize(self) -> [u8; 32] {
        self.hasher.finalize().into()
    }
}

/// Blake2s-256 of `data`
pub fn blake2s_256(data: &[u8]) -> [u8; 32] {
    Blake2s256::digest(data).into()
}

/// secp256k1 miner key
#[derive(Clone)]
pub struct MinerKey {
    signing_key: SigningKey,
}

impl MinerKey {
    /// Load a key from its 32-byte secret
    pub fn from_bytes(secret: &[u8]) -> Result<Self> {
        let signing_key = SigningKey::from_slice(secret)
            .map_err(|e| Error::crypto(format!("invalid secp256k1 secret key: {}", e)))?;
        Ok(Self { signing_key })
    }

    /// Load a key from a hex-encoded secret
    pub fn from_hex(secret: &str) -> Result<Self> {
        let bytes = hex::decode(secret.trim())
            .map_err(|e| Error::crypto(format!("invalid hex in secret key: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    /// Generate a fresh random key
    pub fn generate() -> Result<Self> {
        let secret: [u8; 32] = rand::random();
        Self::from_bytes(&secret)
    }

    /// Hex-encoded secret
    pub fn to_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }

    /// Secp256k1 address of this key
    pub fn address(&self) -> Address {
        address_of(self.signing_key.verifying_key())
    }

    /// Recoverable, deterministic (RFC 6979) signature over `data`
    pub fn sign(&self, data: &[u8]) -> Result<Signature> {
        let (signature, recovery_id) = self
            .signing_key
            .sign_recoverable(data)
            .map_err(|e| Error::crypto(format!("secp256k1 signing failed: {}", e)))?;
        let mut bytes = signature.to_bytes().to_vec();
        bytes.push(recovery_id.to_byte());
        Ok(Signature(bytes))
    }
}

impl std::fmt::Debug for MinerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MinerKey({})", self.address())
    }
}

fn address_of(key: &VerifyingKey) -> Address {
    Address::new_secp256k1(key.to_encoded_point(false).as_bytes())
}

/// Recover the secp256k1 address that produced `signature` over `data`
pub fn recover_address(data: &[u8], signature: &Signature) -> Result<Address> {
    let bytes = signature.as_bytes();
    if bytes.len() != SECP256K1_SIGNATURE_SIZE {
        return Err(Error::crypto(format!(
            "invalid signature length: expected {} bytes, got {}",
            SECP256K1_SIGNATURE_SIZE,
            bytes.len()
        )));
    }
    let ecdsa = EcdsaSignature::from_slice(&bytes[..64])
        .map_err(|e| Error::crypto(format!("malformed signature: {}", e)))?;
    let recovery_id = RecoveryId::from_byte(bytes[64])
        .ok_or_else(|| Error::crypto(format!("invalid recovery id {}", bytes[64])))?;
    let key = VerifyingKey::recover_from_msg(data, &ecdsa, recovery_id)
        .map_err(|e| Error::crypto(format!("public key recovery failed: {}", e)))?;
    Ok(address_of(&key))
}

/// Check that `signature` over `data` was produced by `address`
pub fn verify_signature(data: &[u8], signature: &Signature, address: &Address) -> Result<bool> {
    if address.protocol() != Some(crate::core::Protocol::Secp256k1) {
        return Err(Error::crypto(format!(
            "cannot verify signatures for non-secp256k1 address {}",
            address
        )));
    }
    match recover_address(data, signature) {
        Ok(recovered) => Ok(&recovered == address),
        Err(Error::Crypto { .. }) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Signer backed by an in-memory set of miner keys
#[derive(Debug, Default)]
pub struct KeyStoreSigner {
    keys: RwLock<HashMap<Address, MinerKey>>,
}

impl KeyStoreSigner {
    /// Create an empty key store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a key store holding `keys`
    pub fn with_keys(keys: impl IntoIterator<Item = MinerKey>) -> Self {
        let store = Self::new();
        for key in keys {
            store.insert(key);
        }
        store
    }

    /// Add a key, returning its address
    pub fn insert(&self, key: MinerKey) -> Address {
        let address = key.address();
        self.keys.write().insert(address.clone(), key);
        address
    }

    /// Addresses this store can sign for
    pub fn addresses(&self) -> Vec<Address> {
        let mut addresses: Vec<Address> = self.keys.read().keys().cloned().collect();
        addresses.sort();
        addresses
    }
}

impl Signer for KeyStoreSigner {
    fn sign_bytes(&self, data: &[u8], address: &Address) -> Result<Signature> {
        let keys = self.keys.read();
        let key = keys
            .get(address)
            .ok_or_else(|| Error::signing(address, "no key for address"))?;
        key.sign(data)
    }
}
