//! Error types for nl2sql-guard.
//!
//! Validation failures and oracle failures are kept apart so callers can pick
//! different remediation: ask the user to rephrase vs. retry later.

use serde::Serialize;
use thiserror::Error;

/// Which caller-supplied input was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InputTarget {
    /// The natural language question
    Question,
    /// The CREATE TABLE text supplied with it
    Schema,
}

impl std::fmt::Display for InputTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputTarget::Question => write!(f, "question"),
            InputTarget::Schema => write!(f, "schema"),
        }
    }
}

/// Failures reported by the text-generation oracle.
///
/// Messages are fixed strings; raw upstream error bodies never land here.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OracleError {
    /// Credentials were rejected by the oracle.
    #[error("Oracle authentication failed")]
    Authentication,

    /// The oracle is throttling requests.
    #[error("Oracle rate limit exceeded")]
    RateLimited,

    /// The configured model does not exist.
    #[error("Oracle model not found: {model}")]
    ModelNotFound { model: String },

    /// Timeouts, connection failures and unexpected upstream statuses.
    #[error("Oracle request failed: {0}")]
    Transient(String),
}

impl OracleError {
    /// Create a transient error.
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    /// Check if this error may succeed when the caller retries later.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Transient(_))
    }
}

/// Domain errors for the validation and correction core.
#[derive(Debug, Error)]
pub enum GuardError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input (empty question, empty schema, bad rule pattern)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Question or schema judged adversarial
    #[error("Input rejected ({target}): {reason}")]
    InputRejected { target: InputTarget, reason: String },

    /// Oracle failure, fatal to the current request
    #[error(transparent)]
    Oracle(#[from] OracleError),

    /// The caller abandoned the request
    #[error("Request cancelled")]
    Cancelled,
}

impl GuardError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create an input rejection.
    pub fn rejected(target: InputTarget, reason: impl Into<String>) -> Self {
        Self::InputRejected {
            target,
            reason: reason.into(),
        }
    }

    /// Check if this error is transient and may succeed on a later retry.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Oracle(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Check if the user has to change their input to proceed.
    pub fn is_input_rejection(&self) -> bool {
        matches!(self, Self::InputRejected { .. } | Self::InvalidInput(_))
    }

    /// Message that is safe to show to an end user.
    ///
    /// Oracle failures collapse to fixed wording so configuration details
    /// (endpoints, model names, keys) are not echoed back.
    pub fn user_message(&self) -> String {
        match self {
            Self::InputRejected { reason, .. } => reason.clone(),
            Self::InvalidInput(msg) => msg.clone(),
            Self::Oracle(OracleError::Authentication) => {
                "The language model service rejected the configured credentials.".to_string()
            }
            Self::Oracle(OracleError::RateLimited) => {
                "Rate limit exceeded. Please wait a moment and try again.".to_string()
            }
            Self::Oracle(OracleError::ModelNotFound { .. }) => {
                "The configured language model is not available.".to_string()
            }
            Self::Oracle(OracleError::Transient(_)) => {
                "The language model service is temporarily unavailable.".to_string()
            }
            Self::Cancelled => "The request was cancelled.".to_string(),
            Self::Config(_) => "An internal error occurred.".to_string(),
        }
    }

    /// Get a user-friendly suggestion for how to fix this error.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::Config(_) => Some("Check your environment variables and configuration"),
            Self::InvalidInput(_) => Some("Provide both a question and a database schema"),
            Self::InputRejected {
                target: InputTarget::Question,
                ..
            } => Some("Rephrase your question as a plain database query"),
            Self::InputRejected {
                target: InputTarget::Schema,
                ..
            } => Some("Provide the schema as plain CREATE TABLE statements"),
            Self::Oracle(OracleError::Authentication) => Some("Verify NL2SQL_API_KEY is correct"),
            Self::Oracle(OracleError::ModelNotFound { .. }) => {
                Some("Check the model name in NL2SQL_MODEL")
            }
            Self::Oracle(OracleError::RateLimited) | Self::Oracle(OracleError::Transient(_)) => {
                Some("Wait and retry the request")
            }
            _ => None,
        }
    }
}
