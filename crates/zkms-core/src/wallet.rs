//! # Multisig Wallet
//!
//! A wallet is an on-chain contract address plus an ordered set of signer
//! commitments and an approval threshold. The order matters: it is the leaf
//! order of the membership tree the contract enforces.
//!
//! Construction is validated, and the only way to change a wallet after
//! registration is [`Wallet::apply`] with an executed signer-management
//! payload, which re-validates the result.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::field::{Address, Commitment};
use crate::identity::WalletId;
use crate::payload::{PayloadError, TransactionPayload};

/// Depth of the signer membership tree.
pub const MEMBERSHIP_TREE_DEPTH: usize = 4;

/// Largest signer set a wallet may hold (`2^MEMBERSHIP_TREE_DEPTH`).
pub const MAX_SIGNERS: usize = 1 << MEMBERSHIP_TREE_DEPTH;

/// Reasons a wallet definition is rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error("signer set must not be empty")]
    EmptySignerSet,

    #[error("wallet has {count} signers, maximum is {max}")]
    TooManySigners { count: usize, max: usize },

    #[error("signer {0} appears more than once")]
    DuplicateSigner(Commitment),

    #[error("signer commitment must not be zero")]
    ZeroSigner,

    #[error("threshold {threshold} out of range for {signers} signers")]
    ThresholdOutOfRange { threshold: u32, signers: usize },

    #[error("wallet address must not be zero")]
    ZeroAddress,

    #[error(transparent)]
    Payload(#[from] PayloadError),
}

/// A registered multisig wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WalletRepr", into = "WalletRepr")]
pub struct Wallet {
    id: WalletId,
    address: Address,
    signers: Vec<Commitment>,
    threshold: u32,
}

impl Wallet {
    /// Build a wallet, enforcing every structural invariant.
    pub fn new(
        id: WalletId,
        address: Address,
        signers: Vec<Commitment>,
        threshold: u32,
    ) -> Result<Self, WalletError> {
        if address.is_zero() {
            return Err(WalletError::ZeroAddress);
        }
        validate_signers(&signers)?;
        validate_threshold(threshold, signers.len())?;
        Ok(Self {
            id,
            address,
            signers,
            threshold,
        })
    }

    pub fn id(&self) -> WalletId {
        self.id
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Signer commitments in tree-leaf order.
    pub fn signers(&self) -> &[Commitment] {
        &self.signers
    }

    pub fn signer_count(&self) -> usize {
        self.signers.len()
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Leaf index of `commitment`, if it is a current signer.
    pub fn signer_index(&self, commitment: &Commitment) -> Option<usize> {
        self.signers.iter().position(|c| c == commitment)
    }

    pub fn is_signer(&self, commitment: &Commitment) -> bool {
        self.signer_index(commitment).is_some()
    }

    /// The wallet as it looks after `payload` executes on-chain.
    ///
    /// Transfers leave it unchanged. Removing a signer preserves the
    /// relative order of the remaining signers; adding appends.
    pub fn apply(&self, payload: &TransactionPayload) -> Result<Wallet, WalletError> {
        payload.validate(self)?;
        let mut signers = self.signers.clone();
        let threshold = match payload {
            TransactionPayload::Transfer { .. } | TransactionPayload::BatchTransfer { .. } => {
                self.threshold
            }
            TransactionPayload::AddSigner {
                commitment,
                new_threshold,
            } => {
                signers.push(*commitment);
                *new_threshold
            }
            TransactionPayload::RemoveSigner {
                commitment,
                new_threshold,
            } => {
                signers.retain(|c| c != commitment);
                *new_threshold
            }
            TransactionPayload::SetThreshold { threshold } => *threshold,
        };
        Wallet::new(self.id, self.address, signers, threshold)
    }
}

fn validate_threshold(threshold: u32, signers: usize) -> Result<(), WalletError> {
    if threshold == 0 || threshold as usize > signers {
        return Err(WalletError::ThresholdOutOfRange { threshold, signers });
    }
    Ok(())
}

fn validate_signers(signers: &[Commitment]) -> Result<(), WalletError> {
    if signers.is_empty() {
        return Err(WalletError::EmptySignerSet);
    }
    if signers.len() > MAX_SIGNERS {
        return Err(WalletError::TooManySigners {
            count: signers.len(),
            max: MAX_SIGNERS,
        });
    }
    for (i, signer) in signers.iter().enumerate() {
        if signer.is_zero() {
            return Err(WalletError::ZeroSigner);
        }
        if signers[..i].contains(signer) {
            return Err(WalletError::DuplicateSigner(*signer));
        }
    }
    Ok(())
}

#[derive(Serialize, Deserialize)]
struct WalletRepr {
    id: WalletId,
    address: Address,
    signers: Vec<Commitment>,
    threshold: u32,
}

impl TryFrom<WalletRepr> for Wallet {
    type Error = WalletError;

    fn try_from(repr: WalletRepr) -> Result<Self, Self::Error> {
        Wallet::new(repr.id, repr.address, repr.signers, repr.threshold)
    }
}

impl From<Wallet> for WalletRepr {
    fn from(w: Wallet) -> Self {
        WalletRepr {
            id: w.id,
            address: w.address,
            signers: w.signers,
            threshold: w.threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> Address {
        Address::from_bytes([0x11; 20])
    }

    fn signers(n: u64) -> Vec<Commitment> {
        (1..=n).map(Commitment::from_u64).collect()
    }

    #[test]
    fn valid_wallet_constructs() {
        let w = Wallet::new(WalletId::new(), addr(), signers(3), 2).unwrap();
        assert_eq!(w.signer_count(), 3);
        assert_eq!(w.signer_index(&Commitment::from_u64(3)), Some(2));
        assert!(!w.is_signer(&Commitment::from_u64(9)));
    }

    #[test]
    fn rejects_structural_violations() {
        let id = WalletId::new();
        assert_eq!(
            Wallet::new(id, addr(), vec![], 1),
            Err(WalletError::EmptySignerSet)
        );
        assert!(matches!(
            Wallet::new(id, addr(), signers(3), 4),
            Err(WalletError::ThresholdOutOfRange { .. })
        ));
        assert!(matches!(
            Wallet::new(id, addr(), signers(3), 0),
            Err(WalletError::ThresholdOutOfRange { .. })
        ));
        assert!(matches!(
            Wallet::new(id, addr(), signers(17), 1),
            Err(WalletError::TooManySigners { count: 17, max: 16 })
        ));
        let dup = vec![Commitment::from_u64(1), Commitment::from_u64(1)];
        assert!(matches!(
            Wallet::new(id, addr(), dup, 1),
            Err(WalletError::DuplicateSigner(_))
        ));
        assert_eq!(
            Wallet::new(id, Address::ZERO, signers(1), 1),
            Err(WalletError::ZeroAddress)
        );
    }

    #[test]
    fn apply_add_and_remove_signer() {
        let w = Wallet::new(WalletId::new(), addr(), signers(3), 2).unwrap();
        let added = w
            .apply(&TransactionPayload::AddSigner {
                commitment: Commitment::from_u64(4),
                new_threshold: 3,
            })
            .unwrap();
        assert_eq!(added.signer_count(), 4);
        assert_eq!(added.threshold(), 3);

        let removed = added
            .apply(&TransactionPayload::RemoveSigner {
                commitment: Commitment::from_u64(2),
                new_threshold: 2,
            })
            .unwrap();
        assert_eq!(
            removed.signers(),
            &[
                Commitment::from_u64(1),
                Commitment::from_u64(3),
                Commitment::from_u64(4)
            ]
        );
        assert_eq!(removed.id(), w.id());
    }

    #[test]
    fn apply_rejects_invalid_payload() {
        let w = Wallet::new(WalletId::new(), addr(), signers(2), 2).unwrap();
        let err = w
            .apply(&TransactionPayload::SetThreshold { threshold: 3 })
            .unwrap_err();
        assert!(matches!(err, WalletError::Payload(_)));
    }

    #[test]
    fn deserialization_is_validated() {
        let w = Wallet::new(WalletId::new(), addr(), signers(2), 1).unwrap();
        let mut json = serde_json::to_value(&w).unwrap();
        assert_eq!(serde_json::from_value::<Wallet>(json.clone()).unwrap(), w);
        json["threshold"] = serde_json::json!(5);
        assert!(serde_json::from_value::<Wallet>(json).is_err());
    }
}
