//! Election tickets
//!
//! A ticket is the miner's signature over the proof bytes of the round. It
//! binds the election result to both the miner key and the challenge.

use super::{create_challenge_seed, Signer};
use crate::core::{Address, Proof, Signature, TipSet, Ticket};
use crate::crypto::verify_signature;
use crate::{Result, SigningFault};

/// Sign `proof` as `miner`.
///
/// A signer that cannot sign for the miner is a [`SigningFault`], never an
/// ordinary error.
pub fn create_ticket(
    proof: &Proof,
    miner: &Address,
    signer: &dyn Signer,
) -> std::result::Result<Ticket, SigningFault> {
    signer
        .sign_bytes(proof.as_bytes(), miner)
        .map(Ticket::from)
        .map_err(|e| SigningFault::new(miner.clone(), e))
}

/// Check that `ticket` is `miner`'s signature over `proof`
pub fn verify_ticket(ticket: &Ticket, proof: &Proof, miner: &Address) -> Result<bool> {
    verify_signature(proof.as_bytes(), &Signature(ticket.as_bytes().to_vec()), miner)
}

/// Check that `ticket` was produced by `miner` for the round on `base` after
/// `null_block_count` empty rounds
pub fn verify_round_ticket(
    base: &TipSet,
    null_block_count: u64,
    ticket: &Ticket,
    miner: &Address,
) -> Result<bool> {
    let seed = create_challenge_seed(base, null_block_count)?;
    verify_ticket(ticket, &Proof::from_seed(&seed), miner)
}
