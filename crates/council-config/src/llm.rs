use indexmap::IndexMap;
use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Model binding configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmConfig {
    /// Binding used when an agent, the moderator or the summarizer names none
    #[serde(default)]
    pub default_provider: Option<String>,
    /// Model bindings keyed by id
    #[serde(default)]
    pub providers: IndexMap<String, LlmProviderConfig>,
}

impl LlmConfig {
    /// Resolve a binding id, falling back to the default binding
    pub fn resolve<'a>(&'a self, id: Option<&'a str>) -> Option<(&'a str, &'a LlmProviderConfig)> {
        let id = id.or(self.default_provider.as_deref())?;
        self.providers.get_key_value(id).map(|(k, v)| (k.as_str(), v))
    }
}

/// A single model binding: one backend, one model
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmProviderConfig {
    /// Wire protocol family
    #[serde(rename = "type")]
    pub provider_type: LlmProviderType,
    /// Model name sent to the backend
    pub model: String,
    /// API key
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Base URL override
    #[serde(default)]
    pub base_url: Option<Url>,
    /// Use the `OpenAI` Responses API instead of Chat Completions
    #[serde(default)]
    pub use_responses: bool,
    /// Fold the system instruction into the first user turn.
    /// Unset means probe the backend at startup.
    #[serde(default)]
    pub no_system_role: Option<bool>,
    /// Sampling temperature
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Output token limit
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

/// Supported backend protocol families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LlmProviderType {
    /// `OpenAI`-compatible Chat Completions or Responses API
    Openai,
    /// Anthropic Messages API
    Anthropic,
    /// Google Generative Language API
    Google,
}
