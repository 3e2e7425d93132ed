//! # zkms-crypto — Signer Membership Cryptography
//!
//! - [`merkle`]: the fixed-depth membership tree whose root the wallet
//!   contract enforces, inclusion paths for provers, and server-side
//!   verification of a prover's membership claim.
//! - [`derive`]: signer secrets, the commitments derived from them, and the
//!   per-transaction nullifiers that stop a signer voting twice.
//!
//! Both use Keccak-256 so that roots and nullifiers match what the contract
//! and the circuit compute.

pub mod derive;
pub mod merkle;

pub use derive::{commitment_from_secret, derive_nullifier, SignerSecret};
pub use merkle::{MembershipClaim, MembershipTree, MerkleError, MerklePath, TREE_DEPTH};
