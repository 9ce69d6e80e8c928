//! Security orchestration around oracle calls.
//!
//! Each request moves through
//! `ValidatingInput -> AwaitingGeneration -> ValidatingOutput -> Done`,
//! or stops at `Rejected` when the input guard refuses it. Every oracle
//! response passes through the output guard before it is handed back.

use super::events::{SecurityEvent, SecurityEventKind, SecurityEventLog};
use super::guard::{FilteredOutput, InputGuard, OutputGuard, ValidationResult};
use super::injection::InjectionDetector;
use super::leakage::LeakageDetector;
use crate::config::SecurityConfig;
use crate::error::{GuardError, InputTarget};
use crate::oracle::{GenerationParams, SharedOracle};
use crate::telemetry::{GuardMetrics, SharedMetrics};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Per-request orchestration state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Question and schema are being checked
    ValidatingInput,
    /// Waiting on the oracle
    AwaitingGeneration,
    /// Oracle output is passing the output guard
    ValidatingOutput,
    /// Output released to the caller
    Done,
    /// Input refused; the oracle was never called
    Rejected,
}

impl RequestState {
    /// Check if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestState::Done | RequestState::Rejected)
    }
}

impl std::fmt::Display for RequestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestState::ValidatingInput => write!(f, "validating_input"),
            RequestState::AwaitingGeneration => write!(f, "awaiting_generation"),
            RequestState::ValidatingOutput => write!(f, "validating_output"),
            RequestState::Done => write!(f, "done"),
            RequestState::Rejected => write!(f, "rejected"),
        }
    }
}

fn enter(state: &mut RequestState, next: RequestState) {
    debug!(from = %state, to = %next, "Request state transition");
    *state = next;
}

/// Oracle output after the output guard.
#[derive(Debug, Clone, Serialize)]
pub struct GuardedGeneration {
    /// Text safe to surface
    pub text: String,
    /// Whether the oracle output was replaced by the refusal
    pub suppressed: bool,
    /// Whether the oracle output was cut at the length limit
    pub truncated: bool,
}

impl From<FilteredOutput> for GuardedGeneration {
    fn from(output: FilteredOutput) -> Self {
        Self {
            text: output.text,
            suppressed: output.suppressed,
            truncated: output.truncated,
        }
    }
}

/// Composes the input and output guards around an injected oracle.
pub struct SecurityOrchestrator {
    input_guard: InputGuard,
    output_guard: OutputGuard,
    oracle: SharedOracle,
    events: SecurityEventLog,
    logging_enabled: bool,
    metrics: SharedMetrics,
}

impl SecurityOrchestrator {
    /// Create an orchestrator with default guards.
    pub fn new(oracle: SharedOracle) -> Self {
        Self::from_config(oracle, &SecurityConfig::default())
    }

    /// Create an orchestrator from configuration.
    pub fn from_config(oracle: SharedOracle, config: &SecurityConfig) -> Self {
        Self {
            input_guard: InputGuard::new(InjectionDetector::new(), config.max_input_length),
            output_guard: OutputGuard::new(LeakageDetector::new(), config.max_output_length),
            oracle,
            events: SecurityEventLog::new(),
            logging_enabled: config.security_logging,
            metrics: Arc::new(GuardMetrics::new()),
        }
    }

    /// Replace the guards.
    pub fn with_guards(mut self, input_guard: InputGuard, output_guard: OutputGuard) -> Self {
        self.input_guard = input_guard;
        self.output_guard = output_guard;
        self
    }

    /// Share an existing event log, e.g. one log for several orchestrators.
    pub fn with_event_log(mut self, events: SecurityEventLog) -> Self {
        self.events = events;
        self
    }

    /// Share an existing metrics handle.
    pub fn with_metrics(mut self, metrics: SharedMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Injected oracle.
    pub fn oracle(&self) -> &SharedOracle {
        &self.oracle
    }

    /// Metrics handle.
    pub fn metrics(&self) -> &SharedMetrics {
        &self.metrics
    }

    /// Underlying event log, for external rotation.
    pub fn event_log(&self) -> &SecurityEventLog {
        &self.events
    }

    /// Validate a question and schema, logging a security event on rejection.
    pub fn validate_input(&self, question: &str, schema: &str) -> ValidationResult {
        self.metrics.record_request();
        let result = self.input_guard.validate(question, schema);

        if let Some(target) = result.rejected_target {
            self.metrics.record_rejection();
            let categories: Vec<String> =
                result.indicators.iter().map(|i| i.to_string()).collect();
            warn!(target = %target, indicators = ?categories, "Blocked adversarial input");

            if self.logging_enabled {
                let (kind, content) = match target {
                    InputTarget::Question => (SecurityEventKind::BlockedQuestion, question),
                    InputTarget::Schema => (SecurityEventKind::BlockedSchema, schema),
                };
                self.events
                    .append(SecurityEvent::new(kind, content, result.indicators.clone()));
            }
        }

        result
    }

    /// Run oracle output through the output guard, reporting the outcome.
    pub fn filter_output(&self, text: &str) -> FilteredOutput {
        let output = self.output_guard.filter_with_outcome(text);
        if output.suppressed {
            self.metrics.record_suppression();
            warn!(indicators = output.indicators.len(), "Suppressed leaking oracle output");
        } else if output.truncated {
            self.metrics.record_truncation();
            debug!("Truncated oracle output");
        }
        output
    }

    /// Run oracle output through the output guard.
    pub fn validate_output(&self, text: &str) -> String {
        self.filter_output(text).text
    }

    /// Call the oracle and pass its response through the output guard.
    ///
    /// Oracle failures are terminal for the request and are not retried.
    pub async fn guarded_generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<GuardedGeneration, GuardError> {
        let raw = self.generate_unfiltered(prompt, params).await?;
        Ok(self.filter_output(&raw).into())
    }

    /// Call the oracle without the output guard.
    ///
    /// For intermediate output that is verified and guarded before it is
    /// surfaced, such as a SQL draft headed for the correction loop.
    pub async fn generate_unfiltered(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, GuardError> {
        self.oracle.generate(prompt, params).await.map_err(|e| {
            self.metrics.record_oracle_failure();
            warn!(transient = e.is_transient(), "Oracle call failed");
            GuardError::from(e)
        })
    }

    /// Run one guarded request end to end.
    ///
    /// `build_prompt` receives the sanitized question and returns the prompt
    /// sent to the oracle.
    pub async fn run<F>(
        &self,
        question: &str,
        schema: &str,
        build_prompt: F,
        params: &GenerationParams,
    ) -> Result<GuardedGeneration, GuardError>
    where
        F: FnOnce(&str) -> String,
    {
        let mut state = RequestState::ValidatingInput;

        let validation = self.validate_input(question, schema);
        if let (Some(target), Some(reason)) =
            (validation.rejected_target, validation.rejection_reason)
        {
            enter(&mut state, RequestState::Rejected);
            return Err(GuardError::rejected(target, reason));
        }

        enter(&mut state, RequestState::AwaitingGeneration);
        let prompt = build_prompt(&validation.sanitized_text);
        let raw = self.generate_unfiltered(&prompt, params).await?;

        enter(&mut state, RequestState::ValidatingOutput);
        let output = self.filter_output(&raw);

        enter(&mut state, RequestState::Done);
        Ok(output.into())
    }

    /// Copy of every logged security event, oldest first.
    pub fn security_events(&self) -> Vec<SecurityEvent> {
        self.events.snapshot()
    }
}
