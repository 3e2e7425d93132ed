//! # zkms-coordinator — Multisig Transaction Coordination
//!
//! Ties the state machines in `zkms-state` to durable storage and the two
//! external systems: the proof aggregation service and the chain.
//!
//! ## Architecture
//!
//! - **Service** (`service.rs`): propose, approve, deny and execute. Every
//!   vote or aggregation triggers a full recount of the transaction.
//!
//! - **Nonces** (`nonce.rs`): atomic per-wallet nonce reservation.
//!
//! - **Tracker** (`tracker.rs`): proof-job bookkeeping with
//!   compare-and-set status updates.
//!
//! - **Execution** (`execution.rs`, `retry.rs`): builds the wallet call
//!   and drives submit and confirm under one bounded retry budget.
//!
//! - **Poller** (`poller.rs`): background worker that polls the proof
//!   service for pending jobs.
//!
//! ## Concurrency
//!
//! No lock is held across an await. Exclusivity comes from the store:
//! unique constraints for votes and nonces, conditional updates for status
//! changes and execution claims.

pub mod config;
pub mod error;
pub mod execution;
pub mod nonce;
pub mod poller;
pub mod retry;
pub mod service;
pub mod tracker;

pub use config::CoordinatorConfig;
pub use error::{CoordinatorError, Result};
pub use execution::{build_call, ExecutionCoordinator, ExecutionFailure, EXECUTE_TRANSACTION};
pub use nonce::NonceReservation;
pub use poller::{PollReport, ProofJobPoller};
pub use retry::{AttemptError, RetryBudget, RetryPolicy};
pub use service::{ProposalProof, TransactionDetails, TransactionService};
pub use tracker::ProofJobTracker;
