//! Provider trait and implementations for model backends

pub mod anthropic;
pub mod google;
pub mod openai;

use std::borrow::Cow;
use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use reqwest::{RequestBuilder, Response};

use crate::error::LlmError;
use crate::types::{Aggregate, GenerateRequest, GenerateResponse};

/// Stream of increments ending in one terminal aggregate
pub type ResponseStream = Pin<Box<dyn Stream<Item = Result<GenerateResponse, LlmError>> + Send>>;

/// Capabilities advertised by a provider
#[derive(Debug, Clone, Copy)]
pub struct ProviderCapabilities {
    /// Whether the provider supports streaming responses
    pub streaming: bool,
    /// Whether the provider supports native tool calling
    pub tool_calling: bool,
    /// Whether the system instruction travels on its own channel
    pub system_role: bool,
}

/// Trait implemented by each model backend
#[async_trait]
pub trait Provider: Send + Sync {
    /// Binding name
    fn name(&self) -> &str;

    /// Model sent to the backend
    fn model(&self) -> &str;

    /// Advertised capabilities
    fn capabilities(&self) -> ProviderCapabilities;

    /// Send a request and wait for the complete response
    async fn generate(&self, request: &GenerateRequest) -> Result<Aggregate, LlmError>;

    /// Send a request and stream the response
    async fn generate_stream(&self, request: &GenerateRequest) -> Result<ResponseStream, LlmError>;

    /// Unified entry point: a stream in both modes
    ///
    /// Non-streaming mode yields exactly one `Final`.
    async fn generate_content(&self, request: &GenerateRequest, stream: bool) -> Result<ResponseStream, LlmError> {
        if stream && self.capabilities().streaming {
            return self.generate_stream(request).await;
        }
        let aggregate = self.generate(request).await?;
        Ok(Box::pin(futures_util::stream::once(async move {
            Ok(GenerateResponse::Final(aggregate))
        })))
    }
}

/// Send a prepared request, turning transport failures and non-success
/// statuses into typed errors
pub(crate) async fn send(provider: &str, builder: RequestBuilder) -> Result<Response, LlmError> {
    let response = builder.send().await.map_err(|e| {
        tracing::error!(provider = %provider, error = %e, "upstream request failed");
        LlmError::Transport(e.to_string())
    })?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(
            provider = %provider,
            status = %status,
            "upstream returned error"
        );
        return Err(LlmError::Status {
            status: status.as_u16(),
            body,
        });
    }

    Ok(response)
}

/// Decode a complete JSON response body
pub(crate) async fn read_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, LlmError> {
    response
        .json()
        .await
        .map_err(|e| LlmError::Protocol(format!("failed to parse response: {e}")))
}

/// Fill unset sampling parameters from the binding's defaults
pub(crate) fn with_binding_defaults(
    request: &GenerateRequest,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
) -> Cow<'_, GenerateRequest> {
    let fill_temperature = request.params.temperature.is_none() && temperature.is_some();
    let fill_max_tokens = request.params.max_output_tokens.is_none() && max_tokens.is_some();
    if !fill_temperature && !fill_max_tokens {
        return Cow::Borrowed(request);
    }

    let mut owned = request.clone();
    if fill_temperature {
        owned.params.temperature = temperature;
    }
    if fill_max_tokens {
        owned.params.max_output_tokens = max_tokens;
    }
    Cow::Owned(owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GenerationParams, Turn};

    #[test]
    fn binding_defaults_fill_only_unset_params() {
        let request = GenerateRequest {
            turns: vec![Turn::user_text("hi")],
            params: GenerationParams {
                temperature: Some(0.2),
                ..GenerationParams::default()
            },
            ..GenerateRequest::default()
        };

        let filled = with_binding_defaults(&request, Some(0.9), Some(512));
        assert_eq!(filled.params.temperature, Some(0.2));
        assert_eq!(filled.params.max_output_tokens, Some(512));

        let untouched = with_binding_defaults(&request, None, None);
        assert!(matches!(untouched, Cow::Borrowed(_)));
    }
}
