//! Pending message pool
//!
//! Messages waiting for inclusion, keyed by their cid. The pool is shared
//! between whoever feeds it and the worker, so it uses a concurrent map.

use crate::core::{Cid, SignedMessage};
use crate::{Error, Result};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

/// Concurrent pool of signed messages
#[derive(Debug, Default)]
pub struct MessagePool {
    pending: DashMap<Cid, SignedMessage>,
}

impl MessagePool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message, failing if it is already pending
    pub fn add(&self, message: SignedMessage) -> Result<Cid> {
        let cid = message.cid();
        match self.pending.entry(cid) {
            Entry::Occupied(_) => {
                return Err(Error::message_pool(format!("message {} already pending", cid)));
            }
            Entry::Vacant(slot) => {
                slot.insert(message);
            }
        }
        debug!(cid = %cid, size = self.pending.len(), "message added to pool");
        Ok(cid)
    }

    /// Drop a message, returning it if it was pending
    pub fn remove(&self, cid: &Cid) -> Option<SignedMessage> {
        self.pending.remove(cid).map(|(_, msg)| msg)
    }

    /// Snapshot of all pending messages, in no particular order
    pub fn pending(&self) -> Vec<SignedMessage> {
        self.pending.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Number of pending messages
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Check if nothing is pending
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Order messages for application: by sender, then by sender nonce
pub fn order_messages_by_nonce(mut messages: Vec<SignedMessage>) -> Vec<SignedMessage> {
    messages.sort_by(|a, b| {
        a.message
            .from
            .to_bytes()
            .cmp(&b.message.from.to_bytes())
            .then(a.message.nonce.cmp(&b.message.nonce))
    });
    messages
}
