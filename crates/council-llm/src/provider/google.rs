//! Google Gemini provider implementation

use async_trait::async_trait;
use council_config::LlmProviderConfig;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use super::{Provider, ProviderCapabilities, ResponseStream, read_json, send, with_binding_defaults};
use crate::convert::google::GoogleDecoder;
use crate::error::LlmError;
use crate::protocol::google::{GoogleRequest, GoogleResponse};
use crate::sse::decode_sse;
use crate::types::{Aggregate, GenerateRequest};

/// Default Google Generative Language API base URL
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini provider
pub struct GoogleProvider {
    name: String,
    model: String,
    client: Client,
    base_url: String,
    api_key: Option<SecretString>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl GoogleProvider {
    /// Create from a binding
    pub fn new(name: String, config: &LlmProviderConfig) -> Self {
        let base_url = config
            .base_url
            .as_ref()
            .map_or(DEFAULT_BASE_URL, Url::as_str)
            .trim_end_matches('/')
            .to_owned();

        Self {
            name,
            model: config.model.clone(),
            client: Client::new(),
            base_url,
            api_key: config.api_key.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    /// Build the `generateContent` endpoint URL
    fn generate_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    /// Build the `streamGenerateContent` endpoint URL
    fn stream_url(&self) -> String {
        format!("{}/models/{}:streamGenerateContent?alt=sse", self.base_url, self.model)
    }

    fn post(&self, url: String, request: &GenerateRequest) -> reqwest::RequestBuilder {
        let request = with_binding_defaults(request, self.temperature, self.max_tokens);
        let wire = GoogleRequest::from(request.as_ref());
        let mut builder = self.client.post(url).json(&wire);
        if let Some(key) = &self.api_key {
            builder = builder.query(&[("key", key.expose_secret())]);
        }
        builder
    }
}

#[async_trait]
impl Provider for GoogleProvider {
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
        let response = send(&self.name, self.post(self.generate_url(), request)).await?;
        let wire: GoogleResponse = read_json(response).await?;
        Aggregate::try_from(wire)
    }

    async fn generate_stream(&self, request: &GenerateRequest) -> Result<ResponseStream, LlmError> {
        let response = send(&self.name, self.post(self.stream_url(), request)).await?;
        Ok(decode_sse(response, GoogleDecoder::new()))
    }
}
