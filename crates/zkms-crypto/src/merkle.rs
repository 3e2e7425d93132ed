//! # Signer Membership Tree
//!
//! A fixed-depth binary Merkle tree over a wallet's signer commitments.
//!
//! ## Layout
//!
//! - Depth [`TREE_DEPTH`] (4), so at most 16 leaves.
//! - Leaf `i` is the `i`-th signer commitment, as raw 32 bytes, in wallet
//!   order.
//! - Unused slots hold the zero value. Subtrees made entirely of zero
//!   leaves are replaced by precomputed zero-subtree hashes, so the root
//!   only depends on the live commitments and never on how padding is laid
//!   out in memory.
//! - Internal node: `keccak256(left || right)`.
//!
//! The root is the value the wallet contract checks membership proofs
//! against. The coordinator rebuilds it from the stored signer set to
//! reject votes proven against a stale signer set.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use thiserror::Error;

use zkms_core::hash::keccak256_concat;
use zkms_core::{Commitment, Hash32, MAX_SIGNERS, MEMBERSHIP_TREE_DEPTH};

/// Depth of every membership tree.
pub const TREE_DEPTH: usize = MEMBERSHIP_TREE_DEPTH;

/// Errors from building trees or checking membership.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MerkleError {
    /// A wallet always has at least one signer.
    #[error("cannot build a membership tree with no signers")]
    EmptyTree,

    #[error("{count} signers exceed tree capacity of {max}")]
    TooManyLeaves { count: usize, max: usize },

    /// The leaf index is not a live signer slot.
    #[error("leaf index {index} out of range for {leaf_count} signers")]
    LeafIndexOutOfRange { index: usize, leaf_count: usize },

    #[error("merkle path has {actual} siblings, expected {expected}")]
    PathLength { expected: usize, actual: usize },

    /// The claimed root is not the current signer-set root.
    #[error("membership root does not match the current signer set")]
    RootMismatch,
}

/// Hash of two sibling nodes.
pub fn hash_pair(left: &Hash32, right: &Hash32) -> Hash32 {
    Hash32::from_bytes(keccak256_concat(&[
        &left.as_bytes()[..],
        &right.as_bytes()[..],
    ]))
}

/// `zero_hashes()[h]` is the root of a subtree of height `h` whose leaves
/// are all zero.
pub fn zero_hashes() -> &'static [Hash32; TREE_DEPTH + 1] {
    static ZEROS: OnceLock<[Hash32; TREE_DEPTH + 1]> = OnceLock::new();
    ZEROS.get_or_init(|| {
        let mut zeros = [Hash32::ZERO; TREE_DEPTH + 1];
        for level in 1..=TREE_DEPTH {
            zeros[level] = hash_pair(&zeros[level - 1], &zeros[level - 1]);
        }
        zeros
    })
}

fn ct_eq(a: &Hash32, b: &Hash32) -> bool {
    bool::from(a.as_bytes()[..].ct_eq(&b.as_bytes()[..]))
}

// ── Inclusion paths ─────────────────────────────────────────────────

/// Inclusion path of one leaf: its sibling at every level, bottom-up.
///
/// The direction at level `i` is bit `i` of `leaf_index` (set means the
/// running node is the right child).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerklePath {
    pub leaf_index: usize,
    pub siblings: Vec<Hash32>,
}

impl MerklePath {
    /// `true` at level `i` when the node on the path is a right child.
    pub fn directions(&self) -> Vec<bool> {
        (0..self.siblings.len())
            .map(|level| (self.leaf_index >> level) & 1 == 1)
            .collect()
    }

    /// Fold `leaf` up the path to the root it implies.
    pub fn compute_root(&self, leaf: &Commitment) -> Result<Hash32, MerkleError> {
        if self.siblings.len() != TREE_DEPTH {
            return Err(MerkleError::PathLength {
                expected: TREE_DEPTH,
                actual: self.siblings.len(),
            });
        }
        if self.leaf_index >= MAX_SIGNERS {
            return Err(MerkleError::LeafIndexOutOfRange {
                index: self.leaf_index,
                leaf_count: MAX_SIGNERS,
            });
        }
        let mut node = Hash32::from_bytes(leaf.to_bytes());
        for (sibling, is_right) in self.siblings.iter().zip(self.directions()) {
            node = if is_right {
                hash_pair(sibling, &node)
            } else {
                hash_pair(&node, sibling)
            };
        }
        Ok(node)
    }

    /// Whether `leaf` at this path hashes up to `root`.
    pub fn verify(&self, root: &Hash32, leaf: &Commitment) -> bool {
        self.compute_root(leaf)
            .map(|computed| ct_eq(&computed, root))
            .unwrap_or(false)
    }
}

/// What a prover asserts about their membership when voting: the tree
/// root their proof was generated against and the slot they occupy.
///
/// The commitment itself stays hidden inside the proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipClaim {
    pub root: Hash32,
    pub leaf_index: usize,
}

// ── Tree ────────────────────────────────────────────────────────────

/// A built membership tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipTree {
    /// `layers[0]` holds the live leaves; each higher layer holds only the
    /// nodes with at least one live leaf beneath them.
    layers: Vec<Vec<Hash32>>,
    root: Hash32,
}

impl MembershipTree {
    /// Build the tree over `commitments` in the given order.
    pub fn build(commitments: &[Commitment]) -> Result<Self, MerkleError> {
        if commitments.is_empty() {
            return Err(MerkleError::EmptyTree);
        }
        if commitments.len() > MAX_SIGNERS {
            return Err(MerkleError::TooManyLeaves {
                count: commitments.len(),
                max: MAX_SIGNERS,
            });
        }

        let zeros = zero_hashes();
        let mut layers = Vec::with_capacity(TREE_DEPTH + 1);
        let mut current: Vec<Hash32> = commitments
            .iter()
            .map(|c| Hash32::from_bytes(c.to_bytes()))
            .collect();

        for zero in zeros.iter().take(TREE_DEPTH) {
            let next = current
                .chunks(2)
                .map(|pair| match pair {
                    [left, right] => hash_pair(left, right),
                    [left] => hash_pair(left, zero),
                    _ => *zero,
                })
                .collect();
            layers.push(std::mem::replace(&mut current, next));
        }

        let root = current.first().copied().unwrap_or(zeros[TREE_DEPTH]);
        layers.push(current);
        Ok(Self { layers, root })
    }

    pub fn root(&self) -> Hash32 {
        self.root
    }

    /// Number of live signers.
    pub fn leaf_count(&self) -> usize {
        self.layers.first().map_or(0, Vec::len)
    }

    /// Inclusion path for the signer at `leaf_index`.
    pub fn path(&self, leaf_index: usize) -> Result<MerklePath, MerkleError> {
        if leaf_index >= self.leaf_count() {
            return Err(MerkleError::LeafIndexOutOfRange {
                index: leaf_index,
                leaf_count: self.leaf_count(),
            });
        }
        let zeros = zero_hashes();
        let mut index = leaf_index;
        let mut siblings = Vec::with_capacity(TREE_DEPTH);
        for (layer, zero) in self.layers.iter().take(TREE_DEPTH).zip(zeros.iter()) {
            siblings.push(layer.get(index ^ 1).copied().unwrap_or(*zero));
            index >>= 1;
        }
        Ok(MerklePath {
            leaf_index,
            siblings,
        })
    }

    /// Accept a prover's claim only if it targets this tree's root and an
    /// occupied leaf slot.
    pub fn verify_claim(&self, claim: &MembershipClaim) -> Result<(), MerkleError> {
        if !ct_eq(&claim.root, &self.root) {
            return Err(MerkleError::RootMismatch);
        }
        if claim.leaf_index >= self.leaf_count() {
            return Err(MerkleError::LeafIndexOutOfRange {
                index: claim.leaf_index,
                leaf_count: self.leaf_count(),
            });
        }
        Ok(())
    }
}
