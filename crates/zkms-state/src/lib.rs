//! # zkms-state — Lifecycle State Machines
//!
//! Pure, I/O-free state for the multisig workflow. Persistence and
//! concurrency control live in `zkms-store`; orchestration lives in
//! `zkms-coordinator`. Everything here is deterministic and can be tested
//! without a runtime.
//!
//! ## State Machines
//!
//! - **Transaction** (`transaction.rs`):
//!   `Proposed → Voting → ThresholdReached → Executed | Failed`, with
//!   `Denied` reachable from `Proposed` and `Voting`.
//!
//! - **Proof job** (`proof_job.rs`): `Pending → Aggregated | Failed`.
//!
//! - **Tally** (`tally.rs`): folds a transaction's votes and their proof
//!   jobs into the next status the transaction should move to, and selects
//!   the proofs submitted on-chain at execution.
//!
//! Both state enums expose `valid_transitions()`, and every applied
//! transition is appended to the record's transition log.

pub mod proof_job;
pub mod tally;
pub mod transaction;
pub mod vote;

pub use proof_job::{AggregationArtifact, ExecutionProof, ProofJob, ProofJobError, ProofJobStatus};
pub use tally::{select_execution_proofs, VoteTally};
pub use transaction::{
    Transaction, TransactionError, TransactionStatus, TransitionRecord,
};
pub use vote::{Ballot, Vote, VoteKind};
