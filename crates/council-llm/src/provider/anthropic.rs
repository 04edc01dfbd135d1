//! Anthropic Messages API provider implementation

use async_trait::async_trait;
use council_config::LlmProviderConfig;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use super::{Provider, ProviderCapabilities, ResponseStream, read_json, send, with_binding_defaults};
use crate::convert::anthropic::{AnthropicDecoder, to_anthropic_request};
use crate::error::LlmError;
use crate::protocol::anthropic::AnthropicResponse;
use crate::sse::decode_sse;
use crate::types::{Aggregate, GenerateRequest};

/// Default Anthropic API origin
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Anthropic API version header value
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Messages API provider
pub struct AnthropicProvider {
    name: String,
    model: String,
    client: Client,
    messages_url: String,
    api_key: Option<SecretString>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl AnthropicProvider {
    /// Create from a binding
    pub fn new(name: String, config: &LlmProviderConfig) -> Self {
        Self {
            name,
            model: config.model.clone(),
            client: Client::new(),
            messages_url: messages_url(config.base_url.as_ref()),
            api_key: config.api_key.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    fn post(&self, request: &GenerateRequest, stream: bool) -> reqwest::RequestBuilder {
        let request = with_binding_defaults(request, self.temperature, self.max_tokens);
        let mut wire = to_anthropic_request(&request, &self.model);
        if stream {
            wire.stream = Some(true);
        }

        let mut builder = self
            .client
            .post(&self.messages_url)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&wire);

        if let Some(key) = &self.api_key {
            builder = builder.header("x-api-key", key.expose_secret());
        }
        builder
    }
}

/// Messages endpoint for a configured base URL
///
/// Accepts the origin with or without a trailing `/v1`.
pub fn messages_url(base_url: Option<&Url>) -> String {
    let base = base_url.map_or(DEFAULT_BASE_URL, Url::as_str).trim_end_matches('/');
    let base = base.strip_suffix("/v1").unwrap_or(base);
    format!("{base}/v1/messages")
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            streaming: true,
            tool_calling: true,
            system_role: true,
        }
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<Aggregate, LlmError> {
        let response = send(&self.name, self.post(request, false)).await?;
        let wire: AnthropicResponse = read_json(response).await?;
        Ok(wire.into())
    }

    async fn generate_stream(&self, request: &GenerateRequest) -> Result<ResponseStream, LlmError> {
        let response = send(&self.name, self.post(request, true)).await?;
        Ok(decode_sse(response, AnthropicDecoder::new()))
    }
}
