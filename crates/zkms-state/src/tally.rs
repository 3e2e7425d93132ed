//! # Vote Tally
//!
//! Votes and proof aggregation complete asynchronously and in any order, so
//! the transaction's next status is always recomputed from scratch: from
//! every recorded vote and the current status of every linked proof job.
//!
//! ## Rules
//!
//! - Only approvals whose proof job is `Aggregated` count toward the
//!   threshold snapshot. Pending approvals wait; failed ones never count.
//! - Once denials reach [`Transaction::deny_limit`] the remaining signers
//!   can no longer meet the threshold and the transaction is denied.
//! - The first recorded vote moves `Proposed` to `Voting`.

use std::collections::HashMap;

use zkms_core::ProofJobId;

use crate::proof_job::{ExecutionProof, ProofJob, ProofJobStatus};
use crate::transaction::{Transaction, TransactionStatus};
use crate::vote::{Ballot, Vote};

/// Counts of a transaction's votes by kind and proof status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VoteTally {
    pub approvals: u32,
    pub aggregated_approvals: u32,
    pub pending_approvals: u32,
    pub failed_approvals: u32,
    pub denials: u32,
}

impl VoteTally {
    /// Tally `votes`, resolving each approval's job in `jobs`. An approval
    /// whose job is missing counts as pending.
    pub fn count(votes: &[Vote], jobs: &[ProofJob]) -> Self {
        let status_by_job: HashMap<ProofJobId, ProofJobStatus> =
            jobs.iter().map(|j| (j.id, j.status)).collect();

        let mut tally = Self::default();
        for vote in votes {
            match &vote.ballot {
                Ballot::Approve { proof_job, .. } => {
                    tally.approvals += 1;
                    match status_by_job.get(proof_job) {
                        Some(ProofJobStatus::Aggregated) => tally.aggregated_approvals += 1,
                        Some(ProofJobStatus::Failed) => tally.failed_approvals += 1,
                        Some(ProofJobStatus::Pending) | None => tally.pending_approvals += 1,
                    }
                }
                Ballot::Deny { .. } => tally.denials += 1,
            }
        }
        tally
    }

    pub fn total_votes(&self) -> u32 {
        self.approvals + self.denials
    }

    /// The single next status `tx` should move to, if any. Apply it and ask
    /// again until this returns `None`.
    pub fn next_status(&self, tx: &Transaction) -> Option<TransactionStatus> {
        if !matches!(
            tx.status,
            TransactionStatus::Proposed | TransactionStatus::Voting
        ) {
            return None;
        }
        if self.denials >= tx.deny_limit() {
            return Some(TransactionStatus::Denied);
        }
        if tx.status == TransactionStatus::Proposed {
            return (self.total_votes() > 0).then_some(TransactionStatus::Voting);
        }
        (self.aggregated_approvals >= tx.threshold_snapshot)
            .then_some(TransactionStatus::ThresholdReached)
    }
}

/// The aggregated approvals to submit with the execution call: the
/// proposer's first, then in vote order, capped at `threshold`.
pub fn select_execution_proofs(
    votes: &[Vote],
    jobs: &[ProofJob],
    threshold: u32,
) -> Vec<ExecutionProof> {
    let job_by_id: HashMap<ProofJobId, &ProofJob> = jobs.iter().map(|j| (j.id, j)).collect();

    let mut approvals: Vec<&Vote> = votes
        .iter()
        .filter(|v| matches!(v.ballot, Ballot::Approve { .. }))
        .collect();
    approvals.sort_by_key(|v| (!v.is_proposer, v.created_at));

    approvals
        .into_iter()
        .filter_map(|v| v.proof_job())
        .filter_map(|id| job_by_id.get(&id))
        .filter_map(|job| job.execution_proof())
        .take(threshold as usize)
        .collect()
}
