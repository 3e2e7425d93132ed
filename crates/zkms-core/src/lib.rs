//! # zkms-core — Foundational Types for the ZK Multisig Coordinator
//!
//! This crate is the leaf of the workspace DAG. It defines the type-system
//! primitives every other crate builds on and depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** `WalletId`, `TransactionId`,
//!    `VoteId`, `ProofJobId`, and `ExternalJobId` cannot be confused with
//!    one another.
//!
//! 2. **Opaque 32-byte field values.** Signer commitments, nullifiers and
//!    transaction hashes are large integers coming out of a circuit or a
//!    chain. They are stored big-endian and rendered as `0x` hex.
//!
//! 3. **Validated wallets.** A [`Wallet`] cannot be constructed with an
//!    empty signer set or a threshold above its signer count.
//!
//! 4. **One error taxonomy.** [`ErrorKind`] classifies every failure the
//!    coordinator can report so callers decide on retries uniformly.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `zkms-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod abi;
pub mod error;
pub mod field;
pub mod hash;
pub mod identity;
pub mod payload;
pub mod temporal;
pub mod wallet;

pub use error::{ErrorKind, ParseError};
pub use field::{Address, CallData, Commitment, Hash32, Nullifier, TxHash};
pub use hash::keccak256;
pub use identity::{ExternalJobId, ProofJobId, TransactionId, VoteId, WalletId};
pub use payload::{Call, OnChainCall, PayloadError, TransactionKind, TransactionPayload};
pub use temporal::Timestamp;
pub use wallet::{Wallet, WalletError, MAX_SIGNERS, MEMBERSHIP_TREE_DEPTH};
