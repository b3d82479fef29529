//! Anthropic Messages API client.

use async_trait::async_trait;
use pipeline::{
    Completion, CompletionError, CompletionRequest, ConfigError, LlmProvider, TokenCount,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

pub const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Request body for `POST /v1/messages`.
#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

/// [`LlmProvider`] backed by the Anthropic Messages API.
pub struct AnthropicProvider {
    api_key: String,
    endpoint: String,
    http: reqwest::Client,
}

impl AnthropicProvider {
    /// Creates a provider for the public endpoint.
    pub fn new(api_key: impl Into<String>) -> Result<Self, ConfigError> {
        Self::with_endpoint(api_key, ANTHROPIC_API_URL)
    }

    /// Creates a provider for a custom endpoint (proxy, gateway).
    pub fn with_endpoint(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ConfigError::MissingSecret {
                name: "ANTHROPIC_API_KEY".to_string(),
            });
        }
        Ok(Self {
            api_key,
            endpoint: endpoint.into(),
            http: reqwest::Client::new(),
        })
    }
}

fn request_body(request: &CompletionRequest) -> MessagesRequest<'_> {
    MessagesRequest {
        model: request.params.model.as_str(),
        max_tokens: request.params.max_tokens,
        temperature: request.params.temperature,
        system: &request.system,
        messages: vec![Message {
            role: "user",
            content: &request.prompt,
        }],
    }
}

fn into_completion(response: MessagesResponse) -> Result<Completion, CompletionError> {
    if response.stop_reason.as_deref() == Some("max_tokens") {
        warn!("completion stopped at the token budget; response may be truncated");
    }
    let text: String = response
        .content
        .into_iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(text),
            ContentBlock::Other => None,
        })
        .collect();
    if text.trim().is_empty() {
        return Err(CompletionError::EmptyResponse);
    }
    let (input, output) = response
        .usage
        .map_or((0, 0), |u| (u.input_tokens, u.output_tokens));
    Ok(Completion {
        text,
        input_tokens: TokenCount::new(input),
        output_tokens: TokenCount::new(output),
    })
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    #[instrument(skip_all, fields(model = %request.params.model, max_tokens = request.params.max_tokens))]
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, CompletionError> {
        let response = self
            .http
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request_body(request))
            .send()
            .await
            .map_err(|e| CompletionError::Transport {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: MessagesResponse =
            response.json().await.map_err(|e| CompletionError::Transport {
                message: format!("undecodable response body: {e}"),
            })?;
        let completion = into_completion(parsed)?;
        debug!(
            input_tokens = %completion.input_tokens,
            output_tokens = %completion.output_tokens,
            "completion received"
        );
        Ok(completion)
    }
}
