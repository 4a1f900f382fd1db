//! Content identifiers

use super::constants::CID_SIZE;
use crate::crypto::blake2s_256;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Content identifier: Blake2s-256 of a value's canonical encoding
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Cid([u8; CID_SIZE]);

impl Cid {
    /// Create a CID from raw digest bytes
    pub fn new(bytes: [u8; CID_SIZE]) -> Self {
        Self(bytes)
    }

    /// Hash `data` into a CID
    pub fn of(data: &[u8]) -> Self {
        Self(blake2s_256(data))
    }

    /// Get the digest bytes
    pub fn as_bytes(&self) -> &[u8; CID_SIZE] {
        &self.0
    }

    /// Convert to hexadecimal string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Create from slice
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let array: [u8; CID_SIZE] = bytes.try_into().map_err(|_| {
            Error::blockstore(format!(
                "Invalid CID length: expected {} bytes, got {}",
                CID_SIZE,
                bytes.len()
            ))
        })?;
        Ok(Self(array))
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cid({})", &self.to_hex()[..16])
    }
}

impl FromStr for Cid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| Error::blockstore(format!("Invalid hex in CID: {}", e)))?;
        Self::from_slice(&bytes)
    }
}

impl Serialize for Cid {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Cid {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Cid::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cid_is_content_hash() {
        assert_eq!(Cid::of(b"block"), Cid::of(b"block"));
        assert_ne!(Cid::of(b"block"), Cid::of(b"other block"));
    }

    #[test]
    fn test_cid_hex_parse() {
        let cid = Cid::of(b"genesis");
        let parsed: Cid = cid.to_hex().parse().unwrap();
        assert_eq!(cid, parsed);

        assert!(Cid::from_str("abcd").is_err());
        assert!(Cid::from_str("zz").is_err());
    }

    #[test]
    fn test_cid_ordering_is_bytewise() {
        let low = Cid::new([0u8; CID_SIZE]);
        let mut high_bytes = [0u8; CID_SIZE];
        high_bytes[0] = 1;
        let high = Cid::new(high_bytes);
        assert!(low < high);
    }
}
