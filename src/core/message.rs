//! Messages a miner packs into blocks

use super::block::put_bytes;
use super::{Address, Cid, Signature};
use serde::{Deserialize, Serialize};

/// Unsigned state-transition request
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Message {
    /// Sender
    pub from: Address,
    /// Recipient
    pub to: Address,
    /// Sender nonce
    pub nonce: u64,
    /// Transferred value
    pub value: u64,
    /// Method invoked on the recipient
    pub method: String,
    /// Encoded method parameters
    pub params: Vec<u8>,
}

impl Message {
    /// Canonical byte encoding, also the payload that gets signed
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(96 + self.params.len());
        put_bytes(&mut buf, &self.from.to_bytes());
        put_bytes(&mut buf, &self.to.to_bytes());
        buf.extend_from_slice(&self.nonce.to_le_bytes());
        buf.extend_from_slice(&self.value.to_le_bytes());
        put_bytes(&mut buf, self.method.as_bytes());
        put_bytes(&mut buf, &self.params);
        buf
    }
}

/// Message with the sender's signature
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SignedMessage {
    /// The signed message
    pub message: Message,
    /// Sender signature over `message.encode()`
    pub signature: Signature,
}

impl SignedMessage {
    /// Create a signed message
    pub fn new(message: Message, signature: Signature) -> Self {
        Self { message, signature }
    }

    /// Content identifier of the signed message
    pub fn cid(&self) -> Cid {
        let mut buf = self.message.encode();
        put_bytes(&mut buf, self.signature.as_bytes());
        Cid::of(&buf)
    }
}

/// Result of applying one message
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MessageReceipt {
    /// Zero on success
    pub exit_code: u8,
    /// Encoded return value
    pub return_value: Vec<u8>,
}
