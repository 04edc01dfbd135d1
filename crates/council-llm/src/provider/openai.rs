//! `OpenAI`-compatible provider covering Chat Completions and Responses

use std::borrow::Cow;
use std::sync::Arc;

use async_trait::async_trait;
use council_config::LlmProviderConfig;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use super::{Provider, ProviderCapabilities, ResponseStream, read_json, send, with_binding_defaults};
use crate::convert::openai::{OpenAiDecoder, to_openai_request};
use crate::convert::responses::{ResponsesDecoder, to_responses_request};
use crate::convert::{openai, responses};
use crate::error::LlmError;
use crate::protocol::openai::OpenAiResponse;
use crate::protocol::responses::ResponsesResponse;
use crate::sse::decode_sse;
use crate::types::{Aggregate, GenerateRequest};
use crate::vendor::{VendorParsers, VendorToolCallParser};

/// Default `OpenAI` API base URL
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Which `OpenAI` endpoint family a binding talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    ChatCompletions,
    Responses,
}

/// `OpenAI`-compatible provider
pub struct OpenAiProvider {
    name: String,
    model: String,
    client: Client,
    base_url: String,
    api_key: Option<SecretString>,
    endpoint: Endpoint,
    no_system_role: bool,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    vendor: Arc<dyn VendorToolCallParser>,
}

impl OpenAiProvider {
    /// Create from a binding
    ///
    /// `no_system_role` folds the system instruction into the first user
    /// turn for backends that reject the system role.
    pub fn new(name: String, config: &LlmProviderConfig, no_system_role: bool) -> Self {
        Self {
            name,
            model: config.model.clone(),
            client: Client::new(),
            base_url: api_base(config.base_url.as_ref()),
            api_key: config.api_key.clone(),
            endpoint: if config.use_responses {
                Endpoint::Responses
            } else {
                Endpoint::ChatCompletions
            },
            no_system_role,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            vendor: Arc::new(VendorParsers::default()),
        }
    }

    /// Replace the inline tool-call parser
    #[must_use]
    pub fn with_vendor_parser(mut self, vendor: Arc<dyn VendorToolCallParser>) -> Self {
        self.vendor = vendor;
        self
    }

    fn prepare<'a>(&self, request: &'a GenerateRequest) -> Cow<'a, GenerateRequest> {
        let request = with_binding_defaults(request, self.temperature, self.max_tokens);
        if self.no_system_role && request.system_instruction.is_some() {
            return Cow::Owned(request.with_system_folded());
        }
        request
    }

    fn post(&self, request: &GenerateRequest, stream: bool) -> reqwest::RequestBuilder {
        let request = self.prepare(request);
        let mut builder = match self.endpoint {
            Endpoint::ChatCompletions => self
                .client
                .post(format!("{}/chat/completions", self.base_url))
                .json(&to_openai_request(&request, &self.model, stream)),
            Endpoint::Responses => self
                .client
                .post(format!("{}/responses", self.base_url))
                .json(&to_responses_request(&request, &self.model, stream)),
        };

        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }
        if stream {
            builder = builder.header(reqwest::header::ACCEPT, "text/event-stream");
        }
        builder
    }
}

/// API base for a configured base URL, always ending in `/v1`
pub fn api_base(base_url: Option<&Url>) -> String {
    let Some(url) = base_url else {
        return DEFAULT_BASE_URL.to_owned();
    };
    let base = url.as_str().trim_end_matches('/');
    if base.ends_with("/v1") {
        base.to_owned()
    } else {
        format!("{base}/v1")
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
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
            system_role: !self.no_system_role,
        }
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<Aggregate, LlmError> {
        let response = send(&self.name, self.post(request, false)).await?;
        match self.endpoint {
            Endpoint::ChatCompletions => {
                let wire: OpenAiResponse = read_json(response).await?;
                Ok(openai::aggregate_from_response(wire, self.vendor.as_ref()))
            }
            Endpoint::Responses => {
                let wire: ResponsesResponse = read_json(response).await?;
                Ok(responses::aggregate_from_response(wire, self.vendor.as_ref()))
            }
        }
    }

    async fn generate_stream(&self, request: &GenerateRequest) -> Result<ResponseStream, LlmError> {
        let response = send(&self.name, self.post(request, true)).await?;
        Ok(match self.endpoint {
            Endpoint::ChatCompletions => decode_sse(response, OpenAiDecoder::new(Arc::clone(&self.vendor))),
            Endpoint::Responses => decode_sse(response, ResponsesDecoder::new(Arc::clone(&self.vendor))),
        })
    }
}
