//! OpenAI-compatible chat completions oracle.

use super::{GenerationParams, Oracle};
use crate::config::OracleConfig;
use crate::error::{GuardError, OracleError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, warn};

/// Oracle backed by an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiOracle {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiOracle {
    /// Create a client from configuration.
    pub fn new(config: &OracleConfig) -> Result<Self, GuardError> {
        if config.api_key.trim().is_empty() {
            return Err(GuardError::config("Oracle API key is empty"));
        }

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| GuardError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    /// Model name sent with each request.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body(&self, prompt: &str, params: &GenerationParams) -> Value {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &params.system_prompt {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.push(json!({"role": "user", "content": prompt}));

        json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": params.max_tokens,
            "temperature": params.temperature,
        })
    }

    fn map_status(&self, status: StatusCode) -> OracleError {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => OracleError::Authentication,
            StatusCode::TOO_MANY_REQUESTS => OracleError::RateLimited,
            StatusCode::NOT_FOUND => OracleError::ModelNotFound {
                model: self.model.clone(),
            },
            other => OracleError::transient(format!("unexpected status {}", other.as_u16())),
        }
    }
}

fn map_transport(err: &reqwest::Error) -> OracleError {
    if err.is_timeout() {
        OracleError::transient("request timed out")
    } else if err.is_connect() {
        OracleError::transient("connection failed")
    } else {
        OracleError::transient("request failed")
    }
}

/// Pull the first choice's message content out of a completion body.
fn extract_content(body: &Value) -> Option<String> {
    body["choices"]
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
        .map(str::to_string)
}

#[async_trait]
impl Oracle for OpenAiOracle {
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, OracleError> {
        let body = self.request_body(prompt, params);
        debug!(model = %self.model, max_tokens = params.max_tokens, "Sending completion request");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            // Upstream bodies can echo configuration; only the status is logged.
            warn!(status = status.as_u16(), "Oracle request failed");
            return Err(self.map_status(status));
        }

        let response_body: Value = response
            .json()
            .await
            .map_err(|_| OracleError::transient("malformed response body"))?;

        extract_content(&response_body)
            .ok_or_else(|| OracleError::transient("response contained no choices"))
    }
}
