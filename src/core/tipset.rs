//! Tipsets: same-height, same-parent block sets
//!
//! A tipset is the unit of fork choice. It is identified by the sorted set of
//! its member block CIDs and is never mutated after construction.

use super::{Block, Cid, Ticket, Weight};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Sorted, de-duplicated set of block CIDs identifying a tipset
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct TipSetKey(Vec<Cid>);

impl TipSetKey {
    /// Create a key from CIDs in any order
    pub fn new(mut cids: Vec<Cid>) -> Self {
        cids.sort();
        cids.dedup();
        Self(cids)
    }

    /// CIDs in ascending order
    pub fn cids(&self) -> &[Cid] {
        &self.0
    }

    /// Number of CIDs in the key
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the key is empty (parents of genesis)
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check if the key contains `cid`
    pub fn contains(&self, cid: &Cid) -> bool {
        self.0.binary_search(cid).is_ok()
    }

    /// Concatenated CID bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.iter().flat_map(|cid| cid.as_bytes().iter().copied()).collect()
    }
}

impl fmt::Display for TipSetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for cid in &self.0 {
            write!(f, " {}", cid)?;
        }
        write!(f, " }}")
    }
}

impl fmt::Debug for TipSetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

/// Immutable set of blocks sharing parents, height and parent weight
///
/// `TipSet::default()` is the empty tipset. It cannot be built through
/// [`TipSet::new`] and every accessor that needs a member fails on it.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct TipSet {
    blocks: BTreeMap<Cid, Block>,
}

impl TipSet {
    /// Group `blocks` into a tipset.
    ///
    /// Fails if `blocks` is empty or if members disagree on parents, height or
    /// parent weight. Repeated blocks collapse into one member.
    pub fn new(blocks: impl IntoIterator<Item = Block>) -> Result<Self> {
        let mut members = BTreeMap::new();
        let mut first: Option<Block> = None;

        for block in blocks {
            if let Some(reference) = &first {
                if block.parents != reference.parents {
                    return Err(Error::invalid_tipset(format!(
                        "parent mismatch: {} vs {}",
                        block.parents, reference.parents
                    )));
                }
                if block.height != reference.height {
                    return Err(Error::invalid_tipset(format!(
                        "height mismatch: {} vs {}",
                        block.height, reference.height
                    )));
                }
                if block.parent_weight != reference.parent_weight {
                    return Err(Error::invalid_tipset(format!(
                        "parent weight mismatch: {} vs {}",
                        block.parent_weight, reference.parent_weight
                    )));
                }
            } else {
                first = Some(block.clone());
            }
            members.insert(block.cid(), block);
        }

        if members.is_empty() {
            return Err(Error::invalid_tipset("no blocks"));
        }
        Ok(Self { blocks: members })
    }

    /// Number of member blocks
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Check if this is the empty tipset
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Identity of the tipset
    pub fn key(&self) -> TipSetKey {
        TipSetKey(self.blocks.keys().copied().collect())
    }

    /// Check membership by CID
    pub fn contains(&self, cid: &Cid) -> bool {
        self.blocks.contains_key(cid)
    }

    /// Member blocks in ascending CID order
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }

    /// Member with the smallest CID, the canonical representative
    pub fn canonical_block(&self) -> Result<&Block> {
        self.blocks
            .values()
            .next()
            .ok_or_else(|| Error::empty_tipset("canonical block"))
    }

    /// Shared height of the members
    pub fn height(&self) -> Result<u64> {
        Ok(self.canonical_block()?.height)
    }

    /// Shared parent key of the members
    pub fn parents(&self) -> Result<TipSetKey> {
        Ok(self.canonical_block()?.parents.clone())
    }

    /// Shared parent weight of the members
    pub fn parent_weight(&self) -> Result<Weight> {
        Ok(self.canonical_block()?.parent_weight.clone())
    }

    /// Smallest ticket among the members
    pub fn min_ticket(&self) -> Result<&Ticket> {
        self.blocks
            .values()
            .map(|b| &b.ticket)
            .min()
            .ok_or_else(|| Error::empty_tipset("min ticket"))
    }
}

impl fmt::Display for TipSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl fmt::Debug for TipSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TipSet({:?})", self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Address;

    fn block(height: u64, nonce: u64) -> Block {
        Block {
            miner: Address::new_id(nonce),
            height,
            nonce,
            parents: TipSetKey::new(vec![Cid::of(b"parent")]),
            parent_weight: Weight::from_integer(10),
            ..Block::default()
        }
    }

    #[test]
    fn test_new_tipset() {
        let a = block(5, 1);
        let b = block(5, 2);
        let ts = TipSet::new(vec![a.clone(), b.clone()]).unwrap();

        assert_eq!(ts.len(), 2);
        assert_eq!(ts.height().unwrap(), 5);
        assert_eq!(ts.parent_weight().unwrap(), Weight::from_integer(10));
        assert!(ts.contains(&a.cid()));
        assert!(ts.contains(&b.cid()));
    }

    #[test]
    fn test_empty_rejected() {
        let err = TipSet::new(Vec::new()).unwrap_err();
        assert!(matches!(err, Error::InvalidTipSet { .. }));
    }

    #[test]
    fn test_mismatched_members_rejected() {
        let a = block(5, 1);

        let mut other_height = block(6, 2);
        other_height.parents = a.parents.clone();
        assert!(TipSet::new(vec![a.clone(), other_height]).is_err());

        let mut other_parents = block(5, 3);
        other_parents.parents = TipSetKey::new(vec![Cid::of(b"elsewhere")]);
        assert!(TipSet::new(vec![a.clone(), other_parents]).is_err());

        let mut other_weight = block(5, 4);
        other_weight.parent_weight = Weight::from_integer(11);
        assert!(TipSet::new(vec![a, other_weight]).is_err());
    }

    #[test]
    fn test_key_and_order_independent_of_input_order() {
        let a = block(5, 1);
        let b = block(5, 2);
        let c = block(5, 3);
        let ts1 = TipSet::new(vec![a.clone(), b.clone(), c.clone()]).unwrap();
        let ts2 = TipSet::new(vec![c, a, b]).unwrap();

        assert_eq!(ts1.key(), ts2.key());
        assert_eq!(ts1.key().to_string(), ts2.key().to_string());
        assert_eq!(
            ts1.canonical_block().unwrap().cid(),
            ts1.key().cids()[0]
        );
        let order: Vec<Cid> = ts1.blocks().map(|b| b.cid()).collect();
        assert_eq!(order, ts1.key().cids());
    }

    #[test]
    fn test_duplicates_collapse() {
        let a = block(5, 1);
        let ts = TipSet::new(vec![a.clone(), a]).unwrap();
        assert_eq!(ts.len(), 1);
    }

    #[test]
    fn test_empty_tipset_accessors_fail() {
        let ts = TipSet::default();
        assert!(ts.is_empty());
        assert!(ts.height().is_err());
        assert!(ts.parents().is_err());
        assert!(ts.min_ticket().is_err());
        assert!(ts.key().is_empty());
    }

    #[test]
    fn test_min_ticket() {
        let mut a = block(5, 1);
        a.ticket = Ticket(vec![9, 9]);
        let mut b = block(5, 2);
        b.ticket = Ticket(vec![1, 2]);
        let ts = TipSet::new(vec![a, b]).unwrap();
        assert_eq!(ts.min_ticket().unwrap(), &Ticket(vec![1, 2]));
    }
}
