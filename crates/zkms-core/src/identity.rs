//! # Domain Identity Newtypes
//!
//! Newtype wrappers for every identifier the coordinator hands out or
//! receives. You cannot pass a `VoteId` where a `TransactionId` is
//! expected, and the proof service's job handle is kept apart from our
//! own job record id.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ParseError;

/// Unique identifier for a multisig wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WalletId(pub Uuid);

/// Unique identifier for a proposed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId(pub Uuid);

/// Unique identifier for a recorded vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VoteId(pub Uuid);

/// Unique identifier for a proof job record held by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProofJobId(pub Uuid);

macro_rules! uuid_id {
    ($name:ident, $prefix:literal, $what:literal) => {
        impl $name {
            #[doc = concat!("Generate a new random ", $what, " identifier.")]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Access the inner UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }
    };
}

uuid_id!(WalletId, "wallet", "wallet");
uuid_id!(TransactionId, "tx", "transaction");
uuid_id!(VoteId, "vote", "vote");
uuid_id!(ProofJobId, "job", "proof job");

/// Handle the external proof service assigned to a submitted proof.
///
/// Opaque to us; only required to be non-empty and reasonably short so
/// it fits the store column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExternalJobId(String);

impl ExternalJobId {
    /// Longest accepted handle.
    pub const MAX_LEN: usize = 128;

    /// Validate and wrap a handle.
    pub fn new(id: impl Into<String>) -> Result<Self, ParseError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ParseError::Empty("external job id"));
        }
        if id.len() > Self::MAX_LEN {
            return Err(ParseError::TooLong {
                field: "external job id",
                max: Self::MAX_LEN,
            });
        }
        Ok(Self(id))
    }

    /// Borrow the handle.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ExternalJobId {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ExternalJobId> for String {
    fn from(id: ExternalJobId) -> Self {
        id.0
    }
}

impl std::fmt::Display for ExternalJobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
