//! Votes on a transaction.
//!
//! Approvals are anonymous: the vote only holds a nullifier and a reference
//! to the proof job that proves membership. Denials carry the voter's plain
//! commitment and no proof, so a denier is linkable. That asymmetry trades
//! privacy for cost and is intentional.

use serde::{Deserialize, Serialize};

use zkms_core::{Commitment, Nullifier, ProofJobId, Timestamp, TransactionId, VoteId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoteKind {
    Approve,
    Deny,
}

impl VoteKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Approve => "APPROVE",
            Self::Deny => "DENY",
        }
    }
}

impl std::fmt::Display for VoteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// What a vote says and how it is authenticated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Ballot {
    /// Proof-gated approval. Unique per `(transaction, nullifier)`.
    Approve {
        nullifier: Nullifier,
        proof_job: ProofJobId,
    },
    /// Plain denial. Unique per `(transaction, voter)`.
    Deny { voter: Commitment },
}

/// A recorded vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub id: VoteId,
    pub transaction_id: TransactionId,
    pub ballot: Ballot,
    /// Computed once at proposal time; never re-derived.
    pub is_proposer: bool,
    pub created_at: Timestamp,
}

impl Vote {
    pub fn approve(
        transaction_id: TransactionId,
        nullifier: Nullifier,
        proof_job: ProofJobId,
        is_proposer: bool,
    ) -> Self {
        Self {
            id: VoteId::new(),
            transaction_id,
            ballot: Ballot::Approve {
                nullifier,
                proof_job,
            },
            is_proposer,
            created_at: Timestamp::now(),
        }
    }

    pub fn deny(transaction_id: TransactionId, voter: Commitment) -> Self {
        Self {
            id: VoteId::new(),
            transaction_id,
            ballot: Ballot::Deny { voter },
            is_proposer: false,
            created_at: Timestamp::now(),
        }
    }

    pub fn kind(&self) -> VoteKind {
        match self.ballot {
            Ballot::Approve { .. } => VoteKind::Approve,
            Ballot::Deny { .. } => VoteKind::Deny,
        }
    }

    pub fn nullifier(&self) -> Option<Nullifier> {
        match self.ballot {
            Ballot::Approve { nullifier, .. } => Some(nullifier),
            Ballot::Deny { .. } => None,
        }
    }

    pub fn proof_job(&self) -> Option<ProofJobId> {
        match self.ballot {
            Ballot::Approve { proof_job, .. } => Some(proof_job),
            Ballot::Deny { .. } => None,
        }
    }

    pub fn voter(&self) -> Option<Commitment> {
        match self.ballot {
            Ballot::Deny { voter } => Some(voter),
            Ballot::Approve { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approve_exposes_only_nullifier_and_job() {
        let job = ProofJobId::new();
        let v = Vote::approve(TransactionId::new(), Nullifier::from_u64(5), job, true);
        assert_eq!(v.kind(), VoteKind::Approve);
        assert_eq!(v.nullifier(), Some(Nullifier::from_u64(5)));
        assert_eq!(v.proof_job(), Some(job));
        assert_eq!(v.voter(), None);
        assert!(v.is_proposer);
    }

    #[test]
    fn deny_exposes_voter() {
        let v = Vote::deny(TransactionId::new(), Commitment::from_u64(3));
        assert_eq!(v.kind(), VoteKind::Deny);
        assert_eq!(v.voter(), Some(Commitment::from_u64(3)));
        assert_eq!(v.nullifier(), None);
    }

    #[test]
    fn ballot_json_is_tagged() {
        let v = Vote::deny(TransactionId::new(), Commitment::from_u64(3));
        let json = serde_json::to_value(&v.ballot).unwrap();
        assert_eq!(json["kind"], "deny");
    }
}
