//! Text-generation oracle boundary.
//!
//! The core treats the oracle as a black box: a prompt and generation
//! parameters go in, a response string or a typed [`OracleError`] comes out.
//! Oracles are injected as `Arc<dyn Oracle>` so tests can script responses.

pub mod openai;

pub use openai::OpenAiOracle;

use crate::constants::{DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};
use crate::error::OracleError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Parameters for a single generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Generation budget in tokens
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
    /// Optional system message sent ahead of the prompt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            system_prompt: None,
        }
    }
}

impl GenerationParams {
    /// Set the generation budget.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the system message.
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }
}

/// A text-generation service.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Generate a response for `prompt`.
    async fn generate(&self, prompt: &str, params: &GenerationParams)
        -> Result<String, OracleError>;
}

/// Shared handle to an oracle.
pub type SharedOracle = Arc<dyn Oracle>;

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl Oracle for Echo {
        async fn generate(
            &self,
            prompt: &str,
            params: &GenerationParams,
        ) -> Result<String, OracleError> {
            Ok(format!("{}:{}", params.max_tokens, prompt))
        }
    }

    #[test]
    fn test_default_params() {
        let params = GenerationParams::default();
        assert_eq!(params.max_tokens, 4096);
        assert!((params.temperature - 0.1).abs() < f32::EPSILON);
        assert!(params.system_prompt.is_none());
    }

    #[test]
    fn test_params_builders() {
        let params = GenerationParams::default()
            .with_max_tokens(512)
            .with_system_prompt("be brief");
        assert_eq!(params.max_tokens, 512);
        assert_eq!(params.system_prompt.as_deref(), Some("be brief"));
    }

    #[tokio::test]
    async fn test_shared_oracle_dispatch() {
        let oracle: SharedOracle = Arc::new(Echo);
        let params = GenerationParams::default().with_max_tokens(7);
        let out = oracle.generate("hi", &params).await.unwrap();
        assert_eq!(out, "7:hi");
    }
}
