//! Configuration management for nl2sql-guard.
//!
//! Configuration is loaded from environment variables following the 12-factor app pattern.

use crate::constants::{
    DEFAULT_MAX_CORRECTION_ATTEMPTS, DEFAULT_MAX_INPUT_LENGTH, DEFAULT_MAX_OUTPUT_LENGTH,
    DEFAULT_MAX_TOKENS, DEFAULT_ORACLE_BASE_URL, DEFAULT_ORACLE_MODEL, DEFAULT_REQUEST_TIMEOUT,
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_TEMPERATURE,
};
use crate::error::GuardError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Input/output guard configuration
    pub security: SecurityConfig,

    /// SQL verification configuration
    pub verification: VerificationConfig,

    /// Oracle connection configuration
    pub oracle: OracleConfig,
}

/// Input/output guard configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Maximum sanitized question length (characters)
    pub max_input_length: usize,

    /// Maximum surfaced response length (characters)
    pub max_output_length: usize,

    /// Record rejected inputs in the security event log
    pub security_logging: bool,
}

/// SQL verification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// Ceiling on repair rounds per verification
    pub max_correction_attempts: u32,
}

/// Oracle connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// OpenAI-compatible base URL
    pub base_url: String,

    /// API key (never serialized)
    #[serde(skip_serializing, default)]
    pub api_key: String,

    /// Model name
    pub model: String,

    /// Generation budget in tokens
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,

    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// ## Required
    /// - `NL2SQL_API_KEY`: Oracle API key
    ///
    /// ## Optional
    /// - `NL2SQL_BASE_URL`: OpenAI-compatible endpoint (default: OpenAI)
    /// - `NL2SQL_MODEL`: Model name
    /// - `NL2SQL_MAX_TOKENS`: Generation budget (default: 4096)
    /// - `NL2SQL_TEMPERATURE`: Sampling temperature (default: 0.1)
    /// - `NL2SQL_REQUEST_TIMEOUT`: Oracle timeout in seconds (default: 60)
    /// - `NL2SQL_MAX_INPUT_LENGTH`: Question length limit (default: 10000)
    /// - `NL2SQL_MAX_OUTPUT_LENGTH`: Response length limit (default: 5000)
    /// - `NL2SQL_SECURITY_LOGGING`: Record rejected inputs (default: true)
    /// - `NL2SQL_MAX_CORRECTION_ATTEMPTS`: Repair ceiling (default: 3)
    pub fn from_env() -> Result<Self, GuardError> {
        // Required: API key
        let api_key = std::env::var("NL2SQL_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| GuardError::config("NL2SQL_API_KEY environment variable is required"))?;

        let base_url = std::env::var("NL2SQL_BASE_URL")
            .ok()
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_ORACLE_BASE_URL.to_string());

        let model =
            std::env::var("NL2SQL_MODEL").unwrap_or_else(|_| DEFAULT_ORACLE_MODEL.to_string());

        let max_tokens = std::env::var("NL2SQL_MAX_TOKENS")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_MAX_TOKENS);

        let temperature = std::env::var("NL2SQL_TEMPERATURE")
            .ok()
            .and_then(|p| p.parse::<f32>().ok())
            .map(|t| t.clamp(0.0, 2.0))
            .unwrap_or(DEFAULT_TEMPERATURE);

        let request_timeout_secs = std::env::var("NL2SQL_REQUEST_TIMEOUT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);

        // Optional: Guard settings
        let max_input_length = std::env::var("NL2SQL_MAX_INPUT_LENGTH")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_MAX_INPUT_LENGTH);

        let max_output_length = std::env::var("NL2SQL_MAX_OUTPUT_LENGTH")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_MAX_OUTPUT_LENGTH);

        let security_logging = std::env::var("NL2SQL_SECURITY_LOGGING")
            .map(|v| v.to_lowercase() != "false" && v != "0")
            .unwrap_or(true);

        // Optional: Verification settings
        let max_correction_attempts = std::env::var("NL2SQL_MAX_CORRECTION_ATTEMPTS")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_MAX_CORRECTION_ATTEMPTS);

        Ok(Config {
            security: SecurityConfig {
                max_input_length,
                max_output_length,
                security_logging,
            },
            verification: VerificationConfig {
                max_correction_attempts,
            },
            oracle: OracleConfig {
                base_url,
                api_key,
                model,
                max_tokens,
                temperature,
                request_timeout: Duration::from_secs(request_timeout_secs),
            },
        })
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_input_length: DEFAULT_MAX_INPUT_LENGTH,
            max_output_length: DEFAULT_MAX_OUTPUT_LENGTH,
            security_logging: true,
        }
    }
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            max_correction_attempts: DEFAULT_MAX_CORRECTION_ATTEMPTS,
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ORACLE_BASE_URL.to_string(),
            api_key: String::new(),
            model: DEFAULT_ORACLE_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "NL2SQL_API_KEY",
        "NL2SQL_BASE_URL",
        "NL2SQL_MODEL",
        "NL2SQL_MAX_TOKENS",
        "NL2SQL_TEMPERATURE",
        "NL2SQL_REQUEST_TIMEOUT",
        "NL2SQL_MAX_INPUT_LENGTH",
        "NL2SQL_MAX_OUTPUT_LENGTH",
        "NL2SQL_SECURITY_LOGGING",
        "NL2SQL_MAX_CORRECTION_ATTEMPTS",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_guard_defaults() {
        let config = SecurityConfig::default();
        assert_eq!(config.max_input_length, 10_000);
        assert_eq!(config.max_output_length, 5_000);
        assert!(config.security_logging);
        assert_eq!(VerificationConfig::default().max_correction_attempts, 3);
    }

    #[test]
    #[serial]
    fn test_api_key_required() {
        clear_env();
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, GuardError::Config(_)));
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear_env();
        std::env::set_var("NL2SQL_API_KEY", "test-key");
        std::env::set_var("NL2SQL_BASE_URL", "http://localhost:8080/v1/");
        std::env::set_var("NL2SQL_MAX_CORRECTION_ATTEMPTS", "5");
        std::env::set_var("NL2SQL_SECURITY_LOGGING", "false");
        std::env::set_var("NL2SQL_TEMPERATURE", "not-a-number");

        let config = Config::from_env().unwrap();
        assert_eq!(config.oracle.base_url, "http://localhost:8080/v1");
        assert_eq!(config.verification.max_correction_attempts, 5);
        assert!(!config.security.security_logging);
        assert_eq!(config.oracle.temperature, DEFAULT_TEMPERATURE);
        assert_eq!(config.oracle.request_timeout, DEFAULT_REQUEST_TIMEOUT);

        clear_env();
    }

    #[test]
    fn test_api_key_not_serialized() {
        let config = OracleConfig {
            api_key: "sk-secret".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("sk-secret"));
    }
}
