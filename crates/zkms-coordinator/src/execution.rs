//! # Execution Coordinator
//!
//! Turns a `ThresholdReached` transaction and its aggregated approvals into
//! one `executeTransaction` call on the wallet contract, then waits for it
//! to be mined.
//!
//! Submission and confirmation are retried separately but draw on one
//! failure budget. Once the node has returned a hash the call is never
//! resubmitted; later failures only retry the receipt wait. A reverted
//! receipt or a rejected call is terminal.

use std::sync::Arc;
use std::time::Duration;

use zkms_client::{ChainError, ChainRpc};
use zkms_core::abi::{self, Token};
use zkms_core::{CallData, OnChainCall, TxHash};
use zkms_state::{ExecutionProof, Transaction};

use crate::retry::{AttemptError, RetryBudget, RetryPolicy};

/// `executeTransaction(to, value, data, nonce, proofs)` on the wallet.
pub const EXECUTE_TRANSACTION: &str = "executeTransaction(address,uint256,bytes,uint256,(uint256,uint256,uint256,bytes32[],uint256,uint256)[])";

/// Why an execution ended without a mined, successful transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionFailure {
    /// Last error observed.
    pub reason: String,
    /// Set when the node accepted the call, so the nonce may be consumed.
    pub tx_hash: Option<TxHash>,
    pub attempts: u32,
}

/// Encode the wallet call for `tx` carrying `proofs`.
pub fn build_call(tx: &Transaction, proofs: &[ExecutionProof]) -> OnChainCall {
    let proofs = proofs
        .iter()
        .map(|p| {
            Token::Tuple(vec![
                Token::Uint(p.nullifier.to_bytes()),
                Token::uint(u128::from(p.artifact.aggregation_id)),
                Token::uint(u128::from(p.artifact.domain_id)),
                Token::Array(
                    p.artifact
                        .merkle_proof
                        .iter()
                        .map(|h| Token::FixedBytes32(h.to_bytes()))
                        .collect(),
                ),
                Token::uint(u128::from(p.artifact.leaf_count)),
                Token::uint(u128::from(p.artifact.leaf_index)),
            ])
        })
        .collect();

    let data = abi::encode_call(
        EXECUTE_TRANSACTION,
        &[
            Token::Address(tx.to),
            Token::uint(tx.value),
            Token::Bytes(tx.data.as_bytes().to_vec()),
            Token::uint(u128::from(tx.nonce)),
            Token::Array(proofs),
        ],
    );
    OnChainCall {
        to: tx.wallet_address,
        value: 0,
        data: CallData::new(data),
    }
}

fn classify(err: ChainError) -> AttemptError {
    if err.is_transient() {
        AttemptError::Transient(err.to_string())
    } else {
        AttemptError::Terminal(err.to_string())
    }
}

pub struct ExecutionCoordinator {
    chain: Arc<dyn ChainRpc>,
    policy: RetryPolicy,
    attempt_timeout: Duration,
}

impl ExecutionCoordinator {
    pub fn new(chain: Arc<dyn ChainRpc>, policy: RetryPolicy, attempt_timeout: Duration) -> Self {
        Self {
            chain,
            policy,
            attempt_timeout,
        }
    }

    /// Submit and confirm. Returns the hash of the mined transaction.
    pub async fn execute(
        &self,
        tx: &Transaction,
        proofs: &[ExecutionProof],
    ) -> Result<TxHash, ExecutionFailure> {
        let call = build_call(tx, proofs);
        let chain = &self.chain;
        let call = &call;
        let mut budget = RetryBudget::new(self.policy);

        let submitted = budget
            .run("submit", self.attempt_timeout, || async move {
                chain.call(call).await.map_err(classify)
            })
            .await;
        let tx_hash = match submitted {
            Ok(hash) => hash,
            Err(e) => {
                return Err(ExecutionFailure {
                    reason: e.message().to_string(),
                    tx_hash: None,
                    attempts: budget.failures(),
                })
            }
        };
        tracing::info!(tx_id = %tx.id, tx_hash = %tx_hash, proofs = proofs.len(), "Execution submitted");

        let confirmed = budget
            .run("confirm", self.attempt_timeout, || async move {
                let receipt = chain
                    .wait_for_receipt(&tx_hash)
                    .await
                    .map_err(classify)?;
                if receipt.success {
                    Ok(receipt)
                } else {
                    Err(classify(ChainError::Reverted { tx_hash }))
                }
            })
            .await;
        match confirmed {
            Ok(receipt) => {
                tracing::info!(
                    tx_id = %tx.id,
                    tx_hash = %tx_hash,
                    block = receipt.block_number,
                    "Execution confirmed"
                );
                Ok(tx_hash)
            }
            Err(e) => Err(ExecutionFailure {
                reason: e.message().to_string(),
                tx_hash: Some(tx_hash),
                attempts: budget.failures(),
            }),
        }
    }
}
