//! # Transaction Payloads
//!
//! What a proposal asks the wallet to do. Each kind carries its own fields,
//! is validated against the wallet at proposal time, and lowers to the
//! `(to, value, calldata)` triple the contract finally executes.
//!
//! Signer-management and batch payloads are calls from the wallet to
//! itself; transfers go straight to their target.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::abi::{self, Token};
use crate::error::ParseError;
use crate::field::{Address, CallData, Commitment};
use crate::wallet::{Wallet, MAX_SIGNERS};

/// Calldata signatures of the wallet's self-administration entry points.
pub mod signatures {
    pub const ADD_SIGNER: &str = "addSigner(uint256,uint256)";
    pub const REMOVE_SIGNER: &str = "removeSigner(uint256,uint256)";
    pub const SET_THRESHOLD: &str = "setThreshold(uint256)";
    pub const EXECUTE_BATCH: &str = "executeBatch((address,uint256,bytes)[])";
}

/// Why a payload cannot be proposed against a wallet.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    #[error("transfer target must not be the zero address")]
    MissingTarget,

    #[error("batch must contain at least one call")]
    EmptyBatch,

    #[error("batch call {index} has no target")]
    BatchCallMissingTarget { index: usize },

    #[error("total batch value overflows")]
    ValueOverflow,

    #[error("signer commitment must not be zero")]
    ZeroCommitment,

    #[error("{0} is already a signer")]
    SignerAlreadyPresent(Commitment),

    #[error("{0} is not a signer")]
    UnknownSigner(Commitment),

    #[error("wallet already holds the maximum of {max} signers")]
    SignerLimit { max: usize },

    #[error("cannot remove the last signer")]
    LastSigner,

    #[error("threshold {threshold} out of range for {signers} signers")]
    ThresholdOutOfRange { threshold: u32, signers: usize },
}

/// Discriminant of [`TransactionPayload`], persisted alongside each
/// transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Transfer,
    BatchTransfer,
    AddSigner,
    RemoveSigner,
    SetThreshold,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transfer => "transfer",
            Self::BatchTransfer => "batch_transfer",
            Self::AddSigner => "add_signer",
            Self::RemoveSigner => "remove_signer",
            Self::SetThreshold => "set_threshold",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, ParseError> {
        match name {
            "transfer" => Ok(Self::Transfer),
            "batch_transfer" => Ok(Self::BatchTransfer),
            "add_signer" => Ok(Self::AddSigner),
            "remove_signer" => Ok(Self::RemoveSigner),
            "set_threshold" => Ok(Self::SetThreshold),
            other => Err(ParseError::UnknownVariant {
                kind: "transaction kind",
                value: other.to_string(),
            }),
        }
    }

    /// Whether executing this kind changes the wallet's signer set or
    /// threshold.
    pub fn mutates_wallet(&self) -> bool {
        matches!(
            self,
            Self::AddSigner | Self::RemoveSigner | Self::SetThreshold
        )
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One call inside a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Call {
    pub to: Address,
    #[serde(with = "decimal_u128")]
    pub value: u128,
    #[serde(default)]
    pub data: CallData,
}

/// Type-specific body of a proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransactionPayload {
    Transfer {
        to: Address,
        #[serde(with = "decimal_u128")]
        value: u128,
        #[serde(default)]
        data: CallData,
    },
    BatchTransfer {
        calls: Vec<Call>,
    },
    AddSigner {
        commitment: Commitment,
        new_threshold: u32,
    },
    RemoveSigner {
        commitment: Commitment,
        new_threshold: u32,
    },
    SetThreshold {
        threshold: u32,
    },
}

/// The call the wallet contract performs once a transaction executes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnChainCall {
    pub to: Address,
    #[serde(with = "decimal_u128")]
    pub value: u128,
    pub data: CallData,
}

impl TransactionPayload {
    pub fn kind(&self) -> TransactionKind {
        match self {
            Self::Transfer { .. } => TransactionKind::Transfer,
            Self::BatchTransfer { .. } => TransactionKind::BatchTransfer,
            Self::AddSigner { .. } => TransactionKind::AddSigner,
            Self::RemoveSigner { .. } => TransactionKind::RemoveSigner,
            Self::SetThreshold { .. } => TransactionKind::SetThreshold,
        }
    }

    /// Check the payload against the wallet's current signers and
    /// threshold.
    pub fn validate(&self, wallet: &Wallet) -> Result<(), PayloadError> {
        let signers = wallet.signer_count();
        match self {
            Self::Transfer { to, .. } => {
                if to.is_zero() {
                    return Err(PayloadError::MissingTarget);
                }
            }
            Self::BatchTransfer { calls } => {
                if calls.is_empty() {
                    return Err(PayloadError::EmptyBatch);
                }
                if let Some(index) = calls.iter().position(|c| c.to.is_zero()) {
                    return Err(PayloadError::BatchCallMissingTarget { index });
                }
                total_value(calls)?;
            }
            Self::AddSigner {
                commitment,
                new_threshold,
            } => {
                if commitment.is_zero() {
                    return Err(PayloadError::ZeroCommitment);
                }
                if wallet.is_signer(commitment) {
                    return Err(PayloadError::SignerAlreadyPresent(*commitment));
                }
                if signers >= MAX_SIGNERS {
                    return Err(PayloadError::SignerLimit { max: MAX_SIGNERS });
                }
                check_threshold(*new_threshold, signers + 1)?;
            }
            Self::RemoveSigner {
                commitment,
                new_threshold,
            } => {
                if !wallet.is_signer(commitment) {
                    return Err(PayloadError::UnknownSigner(*commitment));
                }
                if signers == 1 {
                    return Err(PayloadError::LastSigner);
                }
                check_threshold(*new_threshold, signers - 1)?;
            }
            Self::SetThreshold { threshold } => check_threshold(*threshold, signers)?,
        }
        Ok(())
    }

    /// Lower the payload to the call the wallet contract executes.
    pub fn to_call(&self, wallet: &Wallet) -> Result<OnChainCall, PayloadError> {
        let self_call = |data: Vec<u8>| OnChainCall {
            to: wallet.address(),
            value: 0,
            data: CallData::new(data),
        };
        let call = match self {
            Self::Transfer { to, value, data } => OnChainCall {
                to: *to,
                value: *value,
                data: data.clone(),
            },
            Self::BatchTransfer { calls } => {
                let value = total_value(calls)?;
                let items = calls
                    .iter()
                    .map(|c| {
                        Token::Tuple(vec![
                            Token::Address(c.to),
                            Token::uint(c.value),
                            Token::Bytes(c.data.as_bytes().to_vec()),
                        ])
                    })
                    .collect();
                OnChainCall {
                    to: wallet.address(),
                    value,
                    data: CallData::new(abi::encode_call(
                        signatures::EXECUTE_BATCH,
                        &[Token::Array(items)],
                    )),
                }
            }
            Self::AddSigner {
                commitment,
                new_threshold,
            } => self_call(abi::encode_call(
                signatures::ADD_SIGNER,
                &[
                    Token::Uint(commitment.to_bytes()),
                    Token::uint(u128::from(*new_threshold)),
                ],
            )),
            Self::RemoveSigner {
                commitment,
                new_threshold,
            } => self_call(abi::encode_call(
                signatures::REMOVE_SIGNER,
                &[
                    Token::Uint(commitment.to_bytes()),
                    Token::uint(u128::from(*new_threshold)),
                ],
            )),
            Self::SetThreshold { threshold } => self_call(abi::encode_call(
                signatures::SET_THRESHOLD,
                &[Token::uint(u128::from(*threshold))],
            )),
        };
        Ok(call)
    }
}

fn total_value(calls: &[Call]) -> Result<u128, PayloadError> {
    calls
        .iter()
        .try_fold(0u128, |acc, c| acc.checked_add(c.value))
        .ok_or(PayloadError::ValueOverflow)
}

fn check_threshold(threshold: u32, signers: usize) -> Result<(), PayloadError> {
    if threshold == 0 || threshold as usize > signers {
        return Err(PayloadError::ThresholdOutOfRange { threshold, signers });
    }
    Ok(())
}

/// Serialize `u128` amounts as decimal strings; wei values routinely exceed
/// what JSON consumers can hold in a double.
pub mod decimal_u128 {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::WalletId;

    fn wallet(n: u64, threshold: u32) -> Wallet {
        let signers = (1..=n).map(Commitment::from_u64).collect();
        Wallet::new(WalletId::new(), Address::from_bytes([0xaa; 20]), signers, threshold).unwrap()
    }

    fn target() -> Address {
        Address::from_bytes([0x22; 20])
    }

    #[test]
    fn kind_names_round_trip() {
        for kind in [
            TransactionKind::Transfer,
            TransactionKind::BatchTransfer,
            TransactionKind::AddSigner,
            TransactionKind::RemoveSigner,
            TransactionKind::SetThreshold,
        ] {
            assert_eq!(TransactionKind::from_name(kind.as_str()).unwrap(), kind);
        }
        assert!(TransactionKind::from_name("mint").is_err());
    }

    #[test]
    fn transfer_requires_target() {
        let w = wallet(3, 2);
        let p = TransactionPayload::Transfer {
            to: Address::ZERO,
            value: 1,
            data: CallData::default(),
        };
        assert_eq!(p.validate(&w), Err(PayloadError::MissingTarget));
    }

    #[test]
    fn transfer_lowers_to_direct_call() {
        let w = wallet(3, 2);
        let p = TransactionPayload::Transfer {
            to: target(),
            value: 5,
            data: CallData::new(vec![1, 2]),
        };
        let call = p.to_call(&w).unwrap();
        assert_eq!(call.to, target());
        assert_eq!(call.value, 5);
        assert_eq!(call.data.as_bytes(), &[1, 2]);
    }

    #[test]
    fn batch_validation() {
        let w = wallet(3, 2);
        assert_eq!(
            TransactionPayload::BatchTransfer { calls: vec![] }.validate(&w),
            Err(PayloadError::EmptyBatch)
        );
        let calls = vec![
            Call { to: target(), value: 1, data: CallData::default() },
            Call { to: Address::ZERO, value: 1, data: CallData::default() },
        ];
        assert_eq!(
            TransactionPayload::BatchTransfer { calls }.validate(&w),
            Err(PayloadError::BatchCallMissingTarget { index: 1 })
        );
        let overflow = vec![
            Call { to: target(), value: u128::MAX, data: CallData::default() },
            Call { to: target(), value: 1, data: CallData::default() },
        ];
        assert_eq!(
            TransactionPayload::BatchTransfer { calls: overflow }.validate(&w),
            Err(PayloadError::ValueOverflow)
        );
    }

    #[test]
    fn batch_targets_wallet_with_summed_value() {
        let w = wallet(3, 2);
        let calls = vec![
            Call { to: target(), value: 3, data: CallData::default() },
            Call { to: target(), value: 4, data: CallData::new(vec![9]) },
        ];
        let call = TransactionPayload::BatchTransfer { calls }.to_call(&w).unwrap();
        assert_eq!(call.to, w.address());
        assert_eq!(call.value, 7);
        assert_eq!(
            &call.data.as_bytes()[..4],
            &abi::selector(signatures::EXECUTE_BATCH)
        );
    }

    #[test]
    fn signer_management_validation() {
        let w = wallet(3, 2);
        assert_eq!(
            TransactionPayload::AddSigner {
                commitment: Commitment::from_u64(2),
                new_threshold: 2
            }
            .validate(&w),
            Err(PayloadError::SignerAlreadyPresent(Commitment::from_u64(2)))
        );
        assert_eq!(
            TransactionPayload::RemoveSigner {
                commitment: Commitment::from_u64(9),
                new_threshold: 1
            }
            .validate(&w),
            Err(PayloadError::UnknownSigner(Commitment::from_u64(9)))
        );
        assert!(matches!(
            TransactionPayload::RemoveSigner {
                commitment: Commitment::from_u64(1),
                new_threshold: 3
            }
            .validate(&w),
            Err(PayloadError::ThresholdOutOfRange { threshold: 3, signers: 2 })
        ));
        assert_eq!(
            TransactionPayload::RemoveSigner {
                commitment: Commitment::from_u64(1),
                new_threshold: 1
            }
            .validate(&wallet(1, 1)),
            Err(PayloadError::LastSigner)
        );
        assert_eq!(
            TransactionPayload::AddSigner {
                commitment: Commitment::from_u64(99),
                new_threshold: 1
            }
            .validate(&wallet(16, 1)),
            Err(PayloadError::SignerLimit { max: 16 })
        );
    }

    #[test]
    fn set_threshold_calls_wallet() {
        let w = wallet(3, 2);
        let call = TransactionPayload::SetThreshold { threshold: 3 }
            .to_call(&w)
            .unwrap();
        assert_eq!(call.to, w.address());
        assert_eq!(call.value, 0);
        assert_eq!(call.data.len(), 4 + 32);
        assert_eq!(call.data.as_bytes()[35], 3);
    }

    #[test]
    fn payload_json_uses_type_tag_and_decimal_value() {
        let p = TransactionPayload::Transfer {
            to: target(),
            value: 10u128.pow(30),
            data: CallData::default(),
        };
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["type"], "transfer");
        assert_eq!(json["value"], "1000000000000000000000000000000");
        let back: TransactionPayload = serde_json::from_value(json).unwrap();
        assert_eq!(back, p);
    }
}
