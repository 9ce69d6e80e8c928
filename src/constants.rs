//! Centralized constants for nl2sql-guard.
//!
//! This module contains all magic numbers and default values used throughout
//! the codebase, making them easy to find, understand, and modify.

use std::time::Duration;

// =============================================================================
// Input / Output Guard Constants
// =============================================================================

/// Default maximum length (characters) of a sanitized question.
pub const DEFAULT_MAX_INPUT_LENGTH: usize = 10_000;

/// Default maximum length (characters) of a response surfaced to the caller.
pub const DEFAULT_MAX_OUTPUT_LENGTH: usize = 5_000;

/// Minimum run length of a repeated character that sanitization collapses.
pub const REPEAT_COLLAPSE_THRESHOLD: usize = 5;

/// Marker appended to responses cut at the output length limit.
pub const TRUNCATION_MARKER: &str = "... [truncated]";

/// Response substituted for any oracle output that fails the leakage check.
pub const REFUSAL_MESSAGE: &str = "I cannot provide that response for security reasons.";

/// Rejection message returned when the question looks adversarial.
pub const QUESTION_REJECTION_MESSAGE: &str = "Your question contains patterns that may be attempting to manipulate the system. Please rephrase your database query.";

/// Rejection message returned when the schema looks adversarial.
pub const SCHEMA_REJECTION_MESSAGE: &str =
    "The provided schema contains suspicious content. Please provide a valid database schema.";

// =============================================================================
// Detection Constants
// =============================================================================

/// Minimum word length considered by the scrambled-spelling pass.
pub const MIN_FUZZY_WORD_LENGTH: usize = 4;

/// Minimum run length of an encoded payload candidate.
pub const MIN_ENCODED_RUN_LENGTH: usize = 20;

// =============================================================================
// Security Event Constants
// =============================================================================

/// Characters of offending content kept in a security event preview.
pub const EVENT_PREVIEW_LENGTH: usize = 100;

// =============================================================================
// Verification Constants
// =============================================================================

/// Default ceiling on repair rounds per verification.
pub const DEFAULT_MAX_CORRECTION_ATTEMPTS: u32 = 3;

/// Statement keywords accepted as the start of a SQL statement.
pub const STATEMENT_KEYWORDS: [&str; 8] = [
    "SELECT", "INSERT", "UPDATE", "DELETE", "CREATE", "ALTER", "DROP", "WITH",
];

// =============================================================================
// Oracle Constants
// =============================================================================

/// Default OpenAI-compatible endpoint.
pub const DEFAULT_ORACLE_BASE_URL: &str = "https://api.openai.com/v1";

/// Default model name.
pub const DEFAULT_ORACLE_MODEL: &str = "gpt-4o-mini";

/// Default generation budget in tokens.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Low temperature keeps SQL generation close to deterministic.
pub const DEFAULT_TEMPERATURE: f32 = 0.1;

/// Default oracle request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Default oracle request timeout as Duration.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_durations() {
        assert_eq!(DEFAULT_REQUEST_TIMEOUT, Duration::from_secs(60));
    }

    #[test]
    fn test_marker_fits_output_budget() {
        assert!(TRUNCATION_MARKER.len() < DEFAULT_MAX_OUTPUT_LENGTH);
        assert!(REFUSAL_MESSAGE.len() < DEFAULT_MAX_OUTPUT_LENGTH);
    }

    #[test]
    fn test_rejection_messages_differ() {
        assert_ne!(QUESTION_REJECTION_MESSAGE, SCHEMA_REJECTION_MESSAGE);
    }
}
