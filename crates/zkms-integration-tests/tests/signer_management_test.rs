//! Executed signer-management transactions update the stored wallet;
//! transactions already in flight keep the snapshot they were proposed
//! under.

mod common;

use common::{transfer, world, Signer, World};
use zkms_coordinator::{CoordinatorError, ProposalProof};
use zkms_core::{ExternalJobId, Hash32, TransactionPayload};
use zkms_crypto::derive_nullifier;
use zkms_state::{Transaction, TransactionStatus};

async fn pass(w: &World, payload: TransactionPayload) -> Transaction {
    let tx = w.propose(0, payload).await.unwrap();
    let (_, job) = w.approve(1, &tx).await.unwrap();
    w.aggregate(&w.proposer_job(&tx).await).await;
    let tx = w.aggregate(&job).await;
    assert_eq!(tx.status, TransactionStatus::ThresholdReached);
    w.service.execute(tx.id).await.unwrap();
    w.reload(&tx).await
}

#[tokio::test]
async fn add_signer_updates_wallet_and_root() {
    let w = world(3, 2).await;
    let newcomer = Signer::new(40);
    let old_claim = w.claim(&w.signers[0].commitment).await;
    let in_flight = w.propose(2, transfer(3)).await.unwrap();

    let executed = pass(
        &w,
        TransactionPayload::AddSigner {
            commitment: newcomer.commitment,
            new_threshold: 3,
        },
    )
    .await;
    assert_eq!(executed.status, TransactionStatus::Executed);

    let wallet = w.wallet().await;
    assert_eq!(wallet.signer_count(), 4);
    assert_eq!(wallet.threshold(), 3);
    assert_eq!(wallet.signer_index(&newcomer.commitment), Some(3));

    // Proofs against the old root no longer pass.
    let err = w
        .service
        .propose(
            w.wallet_id,
            zkms_core::TransactionKind::Transfer,
            transfer(1),
            ProposalProof {
                claim: old_claim,
                nullifier: derive_nullifier(&w.signers[0].secret, &Hash32::from_u64(999)),
                external_job_id: ExternalJobId::new("stale-root").unwrap(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::InvalidProof(_)));

    // The earlier proposal still needs only its snapshot of 2.
    assert_eq!(in_flight.threshold_snapshot, 2);
    let (_, job) = w.approve(0, &in_flight).await.unwrap();
    w.aggregate(&w.proposer_job(&in_flight).await).await;
    let reached = w.aggregate(&job).await;
    assert_eq!(reached.status, TransactionStatus::ThresholdReached);

    // New proposals snapshot the new threshold.
    let fresh = w.propose(1, transfer(4)).await.unwrap();
    assert_eq!(fresh.threshold_snapshot, 3);
    assert_eq!(fresh.signer_count_snapshot, 4);
}

#[tokio::test]
async fn removed_signer_can_no_longer_deny() {
    let w = world(3, 2).await;
    pass(
        &w,
        TransactionPayload::RemoveSigner {
            commitment: w.signers[2].commitment,
            new_threshold: 2,
        },
    )
    .await;
    let wallet = w.wallet().await;
    assert_eq!(wallet.signer_count(), 2);
    assert!(!wallet.is_signer(&w.signers[2].commitment));

    let tx = w.propose(0, transfer(1)).await.unwrap();
    let err = w
        .service
        .deny(tx.id, w.signers[2].commitment)
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::NotASigner));

    // 2-of-2: a single denial makes the threshold unreachable.
    let denied = w.service.deny(tx.id, w.signers[1].commitment).await.unwrap();
    assert_eq!(denied.status, TransactionStatus::Denied);
}

#[tokio::test]
async fn set_threshold_applies_after_execution() {
    let w = world(3, 2).await;
    let executed = pass(&w, TransactionPayload::SetThreshold { threshold: 3 }).await;
    assert_eq!(executed.to, w.wallet().await.address());
    assert_eq!(w.wallet().await.threshold(), 3);
}

#[tokio::test]
async fn failed_signer_change_leaves_wallet_untouched() {
    let w = world(3, 2).await;
    let before = w.wallet().await;
    let tx = w
        .propose(0, TransactionPayload::SetThreshold { threshold: 1 })
        .await
        .unwrap();
    let (_, job) = w.approve(1, &tx).await.unwrap();
    w.aggregate(&w.proposer_job(&tx).await).await;
    w.aggregate(&job).await;
    w.chain.push_call(Err(zkms_client::ChainError::Rpc {
        method: "eth_sendTransaction",
        code: 3,
        message: "execution reverted".into(),
    }));

    assert!(w.service.execute(tx.id).await.is_err());
    assert_eq!(w.reload(&tx).await.status, TransactionStatus::Failed);
    assert_eq!(w.wallet().await, before);
}
