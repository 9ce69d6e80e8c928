//! Bounded verify-and-repair loop.
//!
//! The loop alternates checks with repair calls to the oracle:
//! `Checking -> Accepted`, or `Checking -> Repairing -> Checking` until the
//! repair ceiling is hit, ending in `Exhausted`. Exhaustion is not an error;
//! it returns the last statement marked invalid.

use super::extract::extract_sql;
use super::syntax::{SqlCheckOutcome, SqlVerifier};
use crate::cancel::CancelSignal;
use crate::constants::DEFAULT_MAX_CORRECTION_ATTEMPTS;
use crate::error::GuardError;
use crate::oracle::{GenerationParams, SharedOracle};
use crate::prompts::correction_prompt;
use crate::schema::SchemaIndex;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Result of one loop run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
    /// Whether the final statement passed every check
    pub is_valid: bool,
    /// Best-known statement
    pub final_sql: String,
    /// Repair calls made
    pub corrections_made: u32,
    /// Per-attempt diagnostics followed by non-fatal warnings
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    Checking,
    Repairing,
    Accepted,
    Exhausted,
}

fn enter(state: &mut LoopState, next: LoopState) {
    debug!(from = ?state, to = ?next, "Correction loop transition");
    *state = next;
}

/// One failed check and the repair it triggered.
#[derive(Debug)]
struct CorrectionAttempt {
    attempt_index: u32,
    input_sql: String,
    outcome: SqlCheckOutcome,
    repaired_sql: Option<String>,
}

/// Verifies a statement and asks the oracle to repair it when it fails.
pub struct CorrectionLoop {
    oracle: SharedOracle,
    verifier: SqlVerifier,
    max_attempts: u32,
    params: GenerationParams,
}

impl CorrectionLoop {
    /// Create a loop with the default repair ceiling.
    pub fn new(oracle: SharedOracle) -> Self {
        Self {
            oracle,
            verifier: SqlVerifier::new(),
            max_attempts: DEFAULT_MAX_CORRECTION_ATTEMPTS,
            params: GenerationParams::default(),
        }
    }

    /// Set the repair ceiling. Zero means check once and never repair.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set generation parameters for repair calls.
    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    /// Repair ceiling.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Verify `sql`, repairing it up to the ceiling.
    ///
    /// Syntax is always checked first; a statement is only schema-checked
    /// once it is structurally valid. After the last permitted repair the
    /// statement is checked once more without further repair.
    ///
    /// # Errors
    ///
    /// Oracle failures end the run immediately. Cancellation returns
    /// [`GuardError::Cancelled`] and drops all attempt state.
    pub async fn run(
        &self,
        sql: &str,
        question: &str,
        schema_text: &str,
        index: &SchemaIndex,
        cancel: &CancelSignal,
    ) -> Result<VerificationResult, GuardError> {
        let mut state = LoopState::Checking;
        let mut working = sql.to_string();
        let mut notes = Vec::new();
        let mut attempts: Vec<CorrectionAttempt> = Vec::new();

        loop {
            let corrections = attempts.len() as u32;
            let outcome = self.verifier.check(&working, index);

            if outcome.is_valid() {
                enter(&mut state, LoopState::Accepted);
                notes.extend(outcome.warnings);
                info!(corrections, "SQL verified");
                return Ok(VerificationResult {
                    is_valid: true,
                    final_sql: working,
                    corrections_made: corrections,
                    notes,
                });
            }

            let diagnostic = outcome
                .diagnostic
                .clone()
                .unwrap_or_else(|| "Invalid SQL statement".to_string());

            if corrections >= self.max_attempts {
                enter(&mut state, LoopState::Exhausted);
                notes.push(format!(
                    "Unresolved after {} corrections: {}",
                    corrections, diagnostic
                ));
                warn!(corrections, diagnostic = %diagnostic, "SQL correction exhausted");
                return Ok(VerificationResult {
                    is_valid: false,
                    final_sql: working,
                    corrections_made: corrections,
                    notes,
                });
            }

            enter(&mut state, LoopState::Repairing);
            notes.push(format!("Attempt {}: {}", corrections + 1, diagnostic));

            let prompt = correction_prompt(schema_text, question, &working, &diagnostic);
            let response = self.repair(&prompt, cancel).await?;
            let repaired = extract_sql(&response);

            let input_sql = std::mem::replace(&mut working, repaired.clone());
            let attempt = CorrectionAttempt {
                attempt_index: corrections,
                input_sql,
                outcome,
                repaired_sql: Some(repaired),
            };
            debug!(
                attempt = attempt.attempt_index,
                structural = attempt.outcome.is_structurally_valid,
                input_len = attempt.input_sql.len(),
                repaired_len = attempt.repaired_sql.as_ref().map_or(0, String::len),
                "Repair applied"
            );
            attempts.push(attempt);
            enter(&mut state, LoopState::Checking);
        }
    }

    /// One repair call, abandoned as soon as the request is cancelled.
    async fn repair(&self, prompt: &str, cancel: &CancelSignal) -> Result<String, GuardError> {
        cancel
            .run(async {
                self.oracle.generate(prompt, &self.params).await.map_err(|e| {
                    warn!(transient = e.is_transient(), "Repair call failed");
                    GuardError::from(e)
                })
            })
            .await
    }
}
