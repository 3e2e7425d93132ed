//! External service errors.
//!
//! Both error types classify themselves as transient or terminal. Transport
//! failures, timeouts, rate limits and 5xx responses are transient. Anything
//! the remote side deliberately rejected is terminal.

use zkms_core::TxHash;

use crate::config::ConfigError;

fn transient_status(status: u16) -> bool {
    status == 429 || status >= 500
}

/// Errors from the proof aggregation service.
#[derive(Debug, thiserror::Error)]
pub enum ProofServiceError {
    /// HTTP transport error.
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },
    /// The service returned a non-2xx status.
    #[error("proof service {endpoint} returned {status}: {body}")]
    Api {
        endpoint: String,
        status: u16,
        body: String,
    },
    /// Response deserialization failed.
    #[error("failed to deserialize response from {endpoint}: {source}")]
    Deserialization {
        endpoint: String,
        source: reqwest::Error,
    },
    /// The response parsed but is missing data its status requires.
    #[error("malformed response from {endpoint}: {reason}")]
    Malformed { endpoint: String, reason: String },
    /// The service could not be reached.
    #[error("proof service unavailable: {0}")]
    Unavailable(String),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ProofServiceError {
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { .. } | Self::Unavailable(_) => true,
            Self::Api { status, .. } => transient_status(*status),
            Self::Deserialization { .. } | Self::Malformed { .. } | Self::Config(_) => false,
        }
    }
}

/// Errors from the chain RPC endpoint.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("HTTP error calling {method}: {source}")]
    Http {
        method: &'static str,
        source: reqwest::Error,
    },
    #[error("RPC endpoint returned {status} for {method}: {body}")]
    Status {
        method: &'static str,
        status: u16,
        body: String,
    },
    /// JSON-RPC error object, e.g. a nonce or revert rejection.
    #[error("{method} failed with RPC error {code}: {message}")]
    Rpc {
        method: &'static str,
        code: i64,
        message: String,
    },
    #[error("failed to decode {method} response: {reason}")]
    Decode { method: &'static str, reason: String },
    /// Connection reset, refused, or otherwise dropped.
    #[error("chain endpoint unavailable: {0}")]
    Unavailable(String),
    /// The transaction was mined and reverted.
    #[error("transaction {tx_hash} reverted")]
    Reverted { tx_hash: TxHash },
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ChainError {
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { .. } | Self::Unavailable(_) => true,
            Self::Status { status, .. } => transient_status(*status),
            // -32005: request limit exceeded.
            Self::Rpc { code, .. } => *code == -32005,
            Self::Decode { .. } | Self::Reverted { .. } | Self::Config(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_transient() {
        let err = ProofServiceError::Api {
            endpoint: "GET /job-status".into(),
            status: 503,
            body: String::new(),
        };
        assert!(err.is_transient());
        let err = ProofServiceError::Api {
            endpoint: "POST /submit-proof".into(),
            status: 400,
            body: "bad proof".into(),
        };
        assert!(!err.is_transient());
    }

    #[test]
    fn rejections_are_terminal() {
        let revert = ChainError::Rpc {
            method: "eth_sendTransaction",
            code: 3,
            message: "execution reverted".into(),
        };
        assert!(!revert.is_transient());
        assert!(!ChainError::Reverted {
            tx_hash: TxHash::from_u64(1)
        }
        .is_transient());
        assert!(ChainError::Unavailable("connection reset by peer".into()).is_transient());
        assert!(ChainError::Status {
            method: "eth_getTransactionReceipt",
            status: 429,
            body: String::new(),
        }
        .is_transient());
    }
}
