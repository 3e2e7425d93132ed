//! Client configuration.
//!
//! Both clients load from environment variables with defaults for the
//! non-secret settings. Tests construct the structs directly.

use url::Url;
use zeroize::Zeroizing;

use zkms_core::Address;

/// Connection settings for the proof aggregation service.
///
/// Custom `Debug` implementation redacts the `api_key` field.
#[derive(Clone)]
pub struct ProofServiceConfig {
    /// Base URL of the relayer API.
    pub base_url: Url,
    /// Sent as the `x-api-key` header.
    pub api_key: Zeroizing<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl std::fmt::Debug for ProofServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProofServiceConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ProofServiceConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `ZKMS_PROOF_SERVICE_URL` (default: `https://relayer-api.horizenlabs.io/api/v1`)
    /// - `ZKMS_PROOF_SERVICE_API_KEY` (required)
    /// - `ZKMS_PROOF_SERVICE_TIMEOUT_SECS` (default: 30)
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("ZKMS_PROOF_SERVICE_API_KEY")
            .map_err(|_| ConfigError::Missing("ZKMS_PROOF_SERVICE_API_KEY"))?;
        Ok(Self {
            base_url: env_url(
                "ZKMS_PROOF_SERVICE_URL",
                Some("https://relayer-api.horizenlabs.io/api/v1"),
            )?,
            api_key: Zeroizing::new(api_key),
            timeout_secs: env_parse("ZKMS_PROOF_SERVICE_TIMEOUT_SECS", 30)?,
        })
    }
}

/// Connection settings for the chain JSON-RPC endpoint.
#[derive(Debug, Clone)]
pub struct ChainRpcConfig {
    pub rpc_url: Url,
    /// Account that signs and pays for execution transactions. The node
    /// holds its key.
    pub relayer: Address,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Delay between `eth_getTransactionReceipt` polls.
    pub receipt_poll_interval_ms: u64,
}

impl ChainRpcConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `ZKMS_RPC_URL` (required)
    /// - `ZKMS_RELAYER_ADDRESS` (required)
    /// - `ZKMS_RPC_TIMEOUT_SECS` (default: 30)
    /// - `ZKMS_RECEIPT_POLL_INTERVAL_MS` (default: 1000)
    pub fn from_env() -> Result<Self, ConfigError> {
        let relayer_raw = std::env::var("ZKMS_RELAYER_ADDRESS")
            .map_err(|_| ConfigError::Missing("ZKMS_RELAYER_ADDRESS"))?;
        let relayer = relayer_raw.parse().map_err(|_| ConfigError::InvalidValue {
            var: "ZKMS_RELAYER_ADDRESS",
            value: relayer_raw,
        })?;
        Ok(Self {
            rpc_url: env_url("ZKMS_RPC_URL", None)?,
            relayer,
            timeout_secs: env_parse("ZKMS_RPC_TIMEOUT_SECS", 30)?,
            receipt_poll_interval_ms: env_parse("ZKMS_RECEIPT_POLL_INTERVAL_MS", 1000)?,
        })
    }
}

fn env_url(var: &'static str, default: Option<&str>) -> Result<Url, ConfigError> {
    let raw = match (std::env::var(var), default) {
        (Ok(v), _) => v,
        (Err(_), Some(d)) => d.to_string(),
        (Err(_), None) => return Err(ConfigError::Missing(var)),
    };
    Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl(var.to_string(), e.to_string()))
}

/// Read a numeric variable. A present but unparseable value is an error.
pub fn env_parse<T: std::str::FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { var, value: raw }),
        Err(_) => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    #[error("invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_api_key() {
        let cfg = ProofServiceConfig {
            base_url: "http://127.0.0.1:9000".parse().unwrap(),
            api_key: Zeroizing::new("super-secret".into()),
            timeout_secs: 5,
        };
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn env_url_uses_default_when_var_absent() {
        let url = env_url("ZKMS_NONEXISTENT_VAR_12345", Some("https://example.com")).unwrap();
        assert_eq!(url.as_str(), "https://example.com/");
        assert!(matches!(
            env_url("ZKMS_NONEXISTENT_VAR_12345", None),
            Err(ConfigError::Missing(_))
        ));
    }

    #[test]
    fn env_url_rejects_invalid_url() {
        std::env::set_var("ZKMS_TEST_BAD_URL", "not a url");
        let result = env_url("ZKMS_TEST_BAD_URL", Some("https://example.com"));
        std::env::remove_var("ZKMS_TEST_BAD_URL");
        assert!(result.is_err());
    }

    #[test]
    fn unparseable_number_is_not_defaulted() {
        std::env::set_var("ZKMS_TEST_BAD_NUMBER", "ten");
        let result = env_parse::<u64>("ZKMS_TEST_BAD_NUMBER", 10);
        std::env::remove_var("ZKMS_TEST_BAD_NUMBER");
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
        assert_eq!(env_parse::<u64>("ZKMS_NONEXISTENT_NUMBER", 10).unwrap(), 10);
    }
}
