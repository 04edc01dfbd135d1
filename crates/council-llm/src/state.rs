//! Binding resolution and connectivity checks

use std::sync::Arc;
use std::time::Duration;

use council_config::{LlmConfig, LlmProviderConfig, LlmProviderType};
use indexmap::IndexMap;

use crate::error::LlmError;
use crate::probe;
use crate::provider::Provider;
use crate::provider::anthropic::AnthropicProvider;
use crate::provider::google::GoogleProvider;
use crate::provider::openai::OpenAiProvider;
use crate::types::{GenerateRequest, GenerationParams, Turn};

const CONNECTION_TIMEOUT: Duration = Duration::from_secs(15);

/// Constructed providers keyed by binding id
#[derive(Clone)]
pub struct LlmState {
    inner: Arc<LlmStateInner>,
}

struct LlmStateInner {
    providers: IndexMap<String, Arc<dyn Provider>>,
    default_provider: Option<String>,
}

impl LlmState {
    /// Build every configured binding
    ///
    /// `OpenAI` bindings without an explicit `no_system_role` are probed.
    pub async fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let mut providers = IndexMap::new();

        for (name, binding) in &config.providers {
            let no_system_role = match binding.no_system_role {
                Some(flag) => flag,
                None => probe::needs_system_downgrade(name, binding).await,
            };
            let provider = build_provider(name, binding, no_system_role);
            tracing::info!(
                provider = %name,
                kind = %binding.provider_type,
                model = %binding.model,
                no_system_role,
                "model binding ready"
            );
            providers.insert(name.clone(), provider);
        }

        Ok(Self::from_providers(config.default_provider.clone(), providers))
    }

    /// Wrap already constructed providers
    pub fn from_providers(
        default_provider: Option<String>,
        providers: IndexMap<String, Arc<dyn Provider>>,
    ) -> Self {
        Self {
            inner: Arc::new(LlmStateInner {
                providers,
                default_provider,
            }),
        }
    }

    /// Resolve a binding id, falling back to the default binding
    pub fn resolve(&self, id: Option<&str>) -> Option<Arc<dyn Provider>> {
        let id = id.or(self.inner.default_provider.as_deref())?;
        self.inner.providers.get(id).cloned()
    }

    /// Binding ids in configuration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.inner.providers.keys().map(String::as_str)
    }
}

/// Construct the provider for one binding
pub fn build_provider(name: &str, config: &LlmProviderConfig, no_system_role: bool) -> Arc<dyn Provider> {
    match config.provider_type {
        LlmProviderType::Openai => Arc::new(OpenAiProvider::new(name.to_owned(), config, no_system_role)),
        LlmProviderType::Anthropic => Arc::new(AnthropicProvider::new(name.to_owned(), config)),
        LlmProviderType::Google => Arc::new(GoogleProvider::new(name.to_owned(), config)),
    }
}

/// Send a minimal one-token request to verify key, endpoint and model
pub async fn test_connection(provider: &dyn Provider) -> Result<(), LlmError> {
    let request = GenerateRequest {
        turns: vec![Turn::user_text("hi")],
        params: GenerationParams {
            max_output_tokens: Some(1),
            ..GenerationParams::default()
        },
        ..GenerateRequest::default()
    };

    match tokio::time::timeout(CONNECTION_TIMEOUT, provider.generate(&request)).await {
        Ok(result) => result.map(|_| ()),
        Err(_) => Err(LlmError::Transport(format!(
            "no response within {}s",
            CONNECTION_TIMEOUT.as_secs()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use council_config::Config;

    #[test]
    fn resolve_falls_back_to_default() {
        let config = Config::parse(
            r#"
            [llm]
            default_provider = "main"

            [llm.providers.main]
            type = "anthropic"
            model = "claude-sonnet-4-5"

            [llm.providers.fast]
            type = "google"
            model = "gemini-2.5-flash"
            "#,
        )
        .unwrap();

        let providers = config
            .llm
            .providers
            .iter()
            .map(|(name, binding)| (name.clone(), build_provider(name, binding, false)))
            .collect();
        let state = LlmState::from_providers(config.llm.default_provider.clone(), providers);

        assert_eq!(state.resolve(None).unwrap().name(), "main");
        assert_eq!(state.resolve(Some("fast")).unwrap().model(), "gemini-2.5-flash");
        assert!(state.resolve(Some("missing")).is_none());
        assert_eq!(state.names().collect::<Vec<_>>(), ["main", "fast"]);
    }
}
