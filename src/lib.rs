//! # nl2sql-guard
//!
//! Validation and correction core for natural-language-to-SQL generation.
//!
//! This crate provides:
//! - **Input guard**: prompt-injection detection (phrase rules, scrambled
//!   spellings, encoded payloads) and sanitization
//! - **Output guard**: leakage detection with full-response refusal
//! - **Orchestration**: input validation, generation and output validation
//!   around an injected oracle, with a security event log
//! - **Verification**: static SQL checks against a parsed schema and a
//!   bounded repair loop
//!
//! ## Architecture
//!
//! The text-generation service is a black box behind the [`Oracle`] trait.
//! Nothing here executes SQL; verification is structural only.

pub mod cancel;
pub mod config;
pub mod constants;
pub mod error;
pub mod oracle;
pub mod pipeline;
pub mod prompts;
pub mod schema;
pub mod security;
pub mod telemetry;
pub mod verify;

pub use cancel::{CancelController, CancelSignal};
pub use config::Config;
pub use error::{GuardError, InputTarget, OracleError};
pub use oracle::{GenerationParams, OpenAiOracle, Oracle, SharedOracle};
pub use pipeline::{Nl2SqlPipeline, PipelineResult, SQL_SAFETY_DISCLAIMER};
pub use schema::SchemaIndex;
pub use security::{
    is_safe_input, InjectionDetector, InputGuard, LeakageDetector, OutputGuard,
    SecurityOrchestrator, ValidationResult,
};
pub use verify::{CorrectionLoop, SqlVerifier, VerificationResult};
