//! # zkms-store — Durable Store for the Multisig Workflow
//!
//! The coordinator touches storage only through the traits in
//! [`traits`]. Every concurrency guarantee the workflow relies on comes
//! from the store itself, never from an in-process lock held across I/O:
//!
//! - **Nonce reservation** is a single atomic increment-and-return.
//! - **Votes and proof jobs** are inserted under unique constraints
//!   (nullifier, deny voter, external job id); the loser of a race gets
//!   [`StoreError::UniqueViolation`]. A vote on a terminal transaction is
//!   refused with [`StoreError::TransactionClosed`].
//! - **Status changes** are compare-and-set on the previous status.
//! - **Execution** is claimed once with a conditional update.
//!
//! Two backends implement the traits: [`MemoryStore`] for tests and
//! single-process tooling, and [`PgStore`] on PostgreSQL via SQLx.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod traits;

pub use error::{Result, StoreError, UniqueConstraint};
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use traits::{MultisigStore, ProofJobStore, TransactionStore, WalletStore};
