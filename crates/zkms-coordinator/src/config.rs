//! Coordinator configuration.

use std::time::Duration;

use zkms_client::config::env_parse;
use zkms_client::ConfigError;

use crate::retry::RetryPolicy;

/// Execution retry and poller settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Failed chain calls tolerated per execution before giving up.
    pub exec_max_attempts: u32,
    /// First backoff delay; doubles after every failure.
    pub exec_base_delay_ms: u64,
    /// Upper bound on a single submission or receipt wait.
    pub exec_attempt_timeout_secs: u64,
    pub poll_interval_secs: u64,
    /// Pending jobs checked per poller tick.
    pub poll_batch_size: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            exec_max_attempts: 4,
            exec_base_delay_ms: 200,
            exec_attempt_timeout_secs: 60,
            poll_interval_secs: 10,
            poll_batch_size: 100,
        }
    }
}

impl CoordinatorConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `ZKMS_EXEC_MAX_ATTEMPTS` (default: 4)
    /// - `ZKMS_EXEC_BASE_DELAY_MS` (default: 200)
    /// - `ZKMS_EXEC_ATTEMPT_TIMEOUT_SECS` (default: 60)
    /// - `ZKMS_POLL_INTERVAL_SECS` (default: 10)
    /// - `ZKMS_POLL_BATCH_SIZE` (default: 100)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            exec_max_attempts: env_parse("ZKMS_EXEC_MAX_ATTEMPTS", defaults.exec_max_attempts)?,
            exec_base_delay_ms: env_parse("ZKMS_EXEC_BASE_DELAY_MS", defaults.exec_base_delay_ms)?,
            exec_attempt_timeout_secs: env_parse(
                "ZKMS_EXEC_ATTEMPT_TIMEOUT_SECS",
                defaults.exec_attempt_timeout_secs,
            )?,
            poll_interval_secs: env_parse("ZKMS_POLL_INTERVAL_SECS", defaults.poll_interval_secs)?,
            poll_batch_size: env_parse("ZKMS_POLL_BATCH_SIZE", defaults.poll_batch_size)?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("ZKMS_EXEC_MAX_ATTEMPTS", u64::from(self.exec_max_attempts)),
            ("ZKMS_EXEC_ATTEMPT_TIMEOUT_SECS", self.exec_attempt_timeout_secs),
            ("ZKMS_POLL_INTERVAL_SECS", self.poll_interval_secs),
            ("ZKMS_POLL_BATCH_SIZE", self.poll_batch_size as u64),
        ];
        for (var, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    var,
                    value: value.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.exec_max_attempts,
            base_delay: Duration::from_millis(self.exec_base_delay_ms),
        }
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.exec_attempt_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = CoordinatorConfig::default();
        assert_eq!(cfg.retry_policy().max_attempts, 4);
        assert_eq!(cfg.retry_policy().base_delay, Duration::from_millis(200));
        assert_eq!(cfg.attempt_timeout(), Duration::from_secs(60));
        assert_eq!(cfg.poll_batch_size, 100);
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let cfg = CoordinatorConfig {
            exec_max_attempts: 0,
            ..CoordinatorConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidValue {
                var: "ZKMS_EXEC_MAX_ATTEMPTS",
                ..
            })
        ));
    }
}
