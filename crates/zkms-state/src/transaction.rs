//! # Transaction Lifecycle State Machine
//!
//! ## States
//!
//! ```text
//! Proposed ──▶ Voting ──▶ ThresholdReached ──▶ Executed (terminal)
//!    │           │                │
//!    │           │                └──▶ Failed (terminal)
//!    └───────────┴──▶ Denied (terminal)
//! ```
//!
//! Transitions are strictly forward. A transaction never returns to an
//! earlier state, and terminal states accept nothing.
//!
//! ## Snapshots
//!
//! The threshold, signer count and membership root are captured when the
//! transaction is proposed. Later changes to the wallet do not affect an
//! in-flight transaction's threshold.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use zkms_core::abi::{self, Token};
use zkms_core::payload::decimal_u128;
use zkms_core::{
    keccak256, Address, CallData, Hash32, ParseError, PayloadError, Timestamp, TransactionId,
    TransactionKind, TransactionPayload, TxHash, Wallet, WalletId,
};

// ─── Transaction Status ──────────────────────────────────────────────

/// Lifecycle status of a proposed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    /// Created; the proposer's own vote is being recorded.
    Proposed,
    /// At least one vote recorded, threshold not yet met by aggregated
    /// approvals.
    Voting,
    /// Enough aggregated approvals; waiting for execution.
    ThresholdReached,
    /// Executed on-chain (terminal).
    Executed,
    /// Rejected by enough signers that the threshold is unreachable
    /// (terminal).
    Denied,
    /// On-chain execution reverted or could not be confirmed (terminal).
    Failed,
}

impl TransactionStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [TransactionStatus; 6] = [
        Self::Proposed,
        Self::Voting,
        Self::ThresholdReached,
        Self::Executed,
        Self::Denied,
        Self::Failed,
    ];

    /// Canonical name, also the persisted form.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Proposed => "PROPOSED",
            Self::Voting => "VOTING",
            Self::ThresholdReached => "THRESHOLD_REACHED",
            Self::Executed => "EXECUTED",
            Self::Denied => "DENIED",
            Self::Failed => "FAILED",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, ParseError> {
        Self::ALL
            .into_iter()
            .find(|s| s.name() == name)
            .ok_or_else(|| ParseError::UnknownVariant {
                kind: "transaction status",
                value: name.to_string(),
            })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Executed | Self::Denied | Self::Failed)
    }

    /// Statuses reachable in one step.
    pub fn valid_transitions(&self) -> &'static [TransactionStatus] {
        match self {
            Self::Proposed => &[Self::Voting, Self::Denied],
            Self::Voting => &[Self::ThresholdReached, Self::Denied],
            Self::ThresholdReached => &[Self::Executed, Self::Failed],
            Self::Executed | Self::Denied | Self::Failed => &[],
        }
    }

    pub fn can_transition_to(&self, to: TransactionStatus) -> bool {
        self.valid_transitions().contains(&to)
    }

    /// Whether new votes may still be recorded.
    pub fn accepts_votes(&self) -> bool {
        !self.is_terminal()
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Errors from applying a transaction transition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    /// The transition is not an edge of the state machine.
    #[error("invalid transaction transition: {from} -> {to}")]
    InvalidTransition {
        from: TransactionStatus,
        to: TransactionStatus,
    },

    /// The transaction already reached a terminal status.
    #[error("transaction already resolved as {status}")]
    Resolved { status: TransactionStatus },
}

/// Record of one applied status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from_status: TransactionStatus,
    pub to_status: TransactionStatus,
    pub timestamp: Timestamp,
    pub reason: Option<String>,
}

// ─── Transaction ─────────────────────────────────────────────────────

/// A proposed multisig transaction with its lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub wallet_id: WalletId,
    /// Wallet contract that will execute the call.
    pub wallet_address: Address,
    /// Reserved wallet nonce. `(wallet_id, nonce)` is unique.
    pub nonce: u64,
    pub payload: TransactionPayload,
    /// Lowered call target.
    pub to: Address,
    #[serde(with = "decimal_u128")]
    pub value: u128,
    pub data: CallData,
    pub threshold_snapshot: u32,
    pub signer_count_snapshot: u32,
    pub signer_root_snapshot: Hash32,
    pub status: TransactionStatus,
    pub created_at: Timestamp,
    /// Set once an executor claims the transaction.
    pub execution_started_at: Option<Timestamp>,
    pub executed_at: Option<Timestamp>,
    pub tx_hash: Option<TxHash>,
    /// Last error when execution failed.
    pub failure_reason: Option<String>,
    pub transitions: Vec<TransitionRecord>,
}

impl Transaction {
    /// Validate `payload` against `wallet` and create the transaction in
    /// `Proposed` with the wallet's current threshold and signer set
    /// snapshotted.
    pub fn propose(
        wallet: &Wallet,
        nonce: u64,
        payload: TransactionPayload,
        signer_root: Hash32,
    ) -> Result<Self, PayloadError> {
        payload.validate(wallet)?;
        let call = payload.to_call(wallet)?;
        Ok(Self {
            id: TransactionId::new(),
            wallet_id: wallet.id(),
            wallet_address: wallet.address(),
            nonce,
            payload,
            to: call.to,
            value: call.value,
            data: call.data,
            threshold_snapshot: wallet.threshold(),
            signer_count_snapshot: wallet.signer_count() as u32,
            signer_root_snapshot: signer_root,
            status: TransactionStatus::Proposed,
            created_at: Timestamp::now(),
            execution_started_at: None,
            executed_at: None,
            tx_hash: None,
            failure_reason: None,
            transitions: Vec::new(),
        })
    }

    pub fn kind(&self) -> TransactionKind {
        self.payload.kind()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Digest signers prove over:
    /// `keccak256(abi.encode(wallet, to, value, keccak256(data), nonce))`.
    ///
    /// Nullifiers are derived from this value, so it must not change
    /// after proposal.
    pub fn signing_hash(&self) -> Hash32 {
        let encoded = abi::encode(&[
            Token::Address(self.wallet_address),
            Token::Address(self.to),
            Token::uint(self.value),
            Token::FixedBytes32(keccak256(self.data.as_bytes())),
            Token::uint(u128::from(self.nonce)),
        ]);
        Hash32::from_bytes(keccak256(encoded))
    }

    /// Number of deny votes that makes the threshold unreachable.
    pub fn deny_limit(&self) -> u32 {
        self.signer_count_snapshot
            .saturating_sub(self.threshold_snapshot)
            .saturating_add(1)
    }

    /// Apply a transition with runtime validation and log it.
    pub fn try_transition(
        &mut self,
        to: TransactionStatus,
        reason: Option<String>,
    ) -> Result<(), TransactionError> {
        if self.status.is_terminal() {
            return Err(TransactionError::Resolved {
                status: self.status,
            });
        }
        if !self.status.can_transition_to(to) {
            return Err(TransactionError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.transitions.push(TransitionRecord {
            from_status: self.status,
            to_status: to,
            timestamp: Timestamp::now(),
            reason,
        });
        self.status = to;
        Ok(())
    }

    /// PROPOSED → VOTING, once the first vote is recorded.
    pub fn begin_voting(&mut self) -> Result<(), TransactionError> {
        self.try_transition(TransactionStatus::Voting, None)
    }

    /// VOTING → THRESHOLD_REACHED.
    pub fn reach_threshold(&mut self) -> Result<(), TransactionError> {
        self.try_transition(TransactionStatus::ThresholdReached, None)
    }

    /// PROPOSED | VOTING → DENIED.
    pub fn deny(&mut self, reason: impl Into<String>) -> Result<(), TransactionError> {
        self.try_transition(TransactionStatus::Denied, Some(reason.into()))
    }

    /// THRESHOLD_REACHED → EXECUTED, recording the on-chain hash.
    pub fn mark_executed(&mut self, tx_hash: TxHash) -> Result<(), TransactionError> {
        self.try_transition(TransactionStatus::Executed, None)?;
        self.tx_hash = Some(tx_hash);
        self.executed_at = Some(Timestamp::now());
        Ok(())
    }

    /// THRESHOLD_REACHED → FAILED, keeping the last error. A hash is kept
    /// when submission succeeded but confirmation did not, so operators can
    /// reconcile the nonce.
    pub fn mark_failed(
        &mut self,
        reason: impl Into<String>,
        tx_hash: Option<TxHash>,
    ) -> Result<(), TransactionError> {
        let reason = reason.into();
        self.try_transition(TransactionStatus::Failed, Some(reason.clone()))?;
        self.failure_reason = Some(reason);
        self.tx_hash = tx_hash;
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
