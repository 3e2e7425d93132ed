//! # Merkle Subcommand
//!
//! Inspect the membership tree of a signer set. Commitments are given in
//! wallet order, as hex or decimal.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use zkms_core::{Commitment, Hash32};
use zkms_crypto::{MembershipClaim, MembershipTree, TREE_DEPTH};

#[derive(Args, Debug)]
pub struct MerkleArgs {
    #[command(subcommand)]
    pub command: MerkleCommand,
}

#[derive(Subcommand, Debug)]
pub enum MerkleCommand {
    /// Print the root of the signer set.
    Root {
        #[arg(required = true)]
        commitments: Vec<Commitment>,
    },

    /// Print the inclusion path of one signer as JSON.
    Path {
        /// Slot of the signer in wallet order.
        #[arg(long)]
        index: usize,
        #[arg(required = true)]
        commitments: Vec<Commitment>,
    },

    /// Check a membership claim against the signer set.
    Verify {
        /// Root the proof was generated against.
        #[arg(long)]
        root: Hash32,
        #[arg(long)]
        index: usize,
        #[arg(required = true)]
        commitments: Vec<Commitment>,
    },
}

pub fn run_merkle(args: &MerkleArgs) -> Result<u8> {
    match &args.command {
        MerkleCommand::Root { commitments } => {
            let tree = build(commitments)?;
            println!("{}", tree.root());
            Ok(0)
        }
        MerkleCommand::Path { index, commitments } => {
            let tree = build(commitments)?;
            let path = tree.path(*index).context("computing inclusion path")?;
            let out = serde_json::json!({
                "root": tree.root(),
                "leaf": commitments[*index],
                "leaf_index": path.leaf_index,
                "depth": TREE_DEPTH,
                "siblings": path.siblings,
                "directions": path.directions(),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
            Ok(0)
        }
        MerkleCommand::Verify {
            root,
            index,
            commitments,
        } => {
            let tree = build(commitments)?;
            let claim = MembershipClaim {
                root: *root,
                leaf_index: *index,
            };
            match tree.verify_claim(&claim) {
                Ok(()) => {
                    println!("OK: slot {index} is a member under {root}");
                    Ok(0)
                }
                Err(e) => {
                    println!("FAIL: {e}");
                    Ok(1)
                }
            }
        }
    }
}

fn build(commitments: &[Commitment]) -> Result<MembershipTree> {
    MembershipTree::build(commitments).context("building membership tree")
}
