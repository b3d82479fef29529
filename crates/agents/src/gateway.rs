//! Single entry point for every completion-service call.
//!
//! Agents never talk to an [`LlmProvider`] directly. The gateway builds the
//! request from role parameters, applies the JSON extraction contract, and
//! keeps running token totals for the session report.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use pipeline::{
    parse_structured, AgentError, CompletionError, CompletionRequest, LlmProvider, RoleParams,
    TokenCount, TokenUsage, Validate,
};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

pub struct LlmGateway {
    provider: Arc<dyn LlmProvider>,
    calls: AtomicU64,
    input_tokens: AtomicU64,
    output_tokens: AtomicU64,
}

impl LlmGateway {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            calls: AtomicU64::new(0),
            input_tokens: AtomicU64::new(0),
            output_tokens: AtomicU64::new(0),
        }
    }

    /// Sends one request and returns the raw response text.
    #[instrument(skip_all, fields(model = %params.model))]
    pub async fn request_text(
        &self,
        system: &str,
        prompt: String,
        params: &RoleParams,
    ) -> Result<String, CompletionError> {
        let request = CompletionRequest {
            system: system.to_string(),
            prompt,
            params: params.clone(),
        };
        self.calls.fetch_add(1, Ordering::Relaxed);
        let completion = self
            .provider
            .complete(&request)
            .await
            .inspect_err(|e| warn!(error = %e, "completion call failed"))?;
        self.input_tokens
            .fetch_add(completion.input_tokens.as_u64(), Ordering::Relaxed);
        self.output_tokens
            .fetch_add(completion.output_tokens.as_u64(), Ordering::Relaxed);
        debug!(chars = completion.text.len(), "completion text received");
        Ok(completion.text)
    }

    /// Sends one request and parses the first JSON object in the response
    /// into `T`, rejecting missing or invalid fields.
    pub async fn request_json<T>(
        &self,
        system: &str,
        prompt: String,
        params: &RoleParams,
    ) -> Result<T, AgentError>
    where
        T: DeserializeOwned + Validate,
    {
        let text = self.request_text(system, prompt, params).await?;
        Ok(parse_structured(&text)?)
    }

    /// Totals since the gateway was created.
    pub fn usage(&self) -> TokenUsage {
        TokenUsage {
            calls: self.calls.load(Ordering::Relaxed),
            input_tokens: TokenCount::new(self.input_tokens.load(Ordering::Relaxed)),
            output_tokens: TokenCount::new(self.output_tokens.load(Ordering::Relaxed)),
        }
    }
}
