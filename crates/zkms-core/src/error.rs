//! # Error Taxonomy
//!
//! Every failure surfaced by the coordinator maps onto one [`ErrorKind`].
//! The kind, not the concrete variant, decides what a caller may do next:
//!
//! - `Validation`: malformed input, rejected before any state mutation.
//! - `Conflict`: a uniqueness constraint fired (nonce, nullifier, job id).
//!   Safe to retry with fresh inputs.
//! - `NotFound`: unknown wallet, transaction, or proof job.
//! - `State`: the operation is not valid for the current status.
//! - `ExternalService`: proof service or chain RPC failed; `transient`
//!   distinguishes a network blip from a definitive answer.
//! - `Execution`: on-chain revert. Always terminal.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of coordinator failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed payload or proof shape.
    Validation,
    /// Duplicate nonce, nullifier, or job id.
    Conflict,
    /// Unknown entity.
    NotFound,
    /// Operation invalid for the current lifecycle status.
    State,
    /// External collaborator failure.
    ExternalService {
        /// Whether retrying the same call may succeed.
        transient: bool,
    },
    /// On-chain execution reverted.
    Execution,
}

impl ErrorKind {
    /// Whether the caller may retry the same request unchanged.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ExternalService { transient: true })
    }

    /// Short machine-readable label, used as a structured log field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Conflict => "conflict",
            Self::NotFound => "not_found",
            Self::State => "state",
            Self::ExternalService { transient: true } => "external_transient",
            Self::ExternalService { transient: false } => "external_terminal",
            Self::Execution => "execution",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error parsing a textual representation of a core value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Input contained non-hex characters.
    #[error("invalid hex: {0}")]
    Hex(String),

    /// Input had the wrong byte length.
    #[error("expected {expected} bytes, got {actual}")]
    Length {
        /// Required length in bytes.
        expected: usize,
        /// Observed length in bytes.
        actual: usize,
    },

    /// Decimal input contained a non-digit.
    #[error("invalid decimal integer: {0}")]
    Decimal(String),

    /// Decimal input does not fit in 256 bits.
    #[error("integer does not fit in 256 bits")]
    Overflow,

    /// Required text was empty.
    #[error("{0} must not be empty")]
    Empty(&'static str),

    /// Identifier exceeded its length limit.
    #[error("{field} exceeds {max} characters")]
    TooLong {
        /// Which field.
        field: &'static str,
        /// Maximum length.
        max: usize,
    },

    /// Timestamp was not RFC 3339 UTC.
    #[error("invalid timestamp: {0}")]
    Timestamp(String),

    /// Unknown enum label.
    #[error("unknown {kind}: {value}")]
    UnknownVariant {
        /// Name of the enum.
        kind: &'static str,
        /// The rejected label.
        value: String,
    },
}
