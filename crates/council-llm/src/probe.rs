//! Startup probe for backends that silently ignore the system role

use std::time::Duration;

use council_config::{LlmProviderConfig, LlmProviderType};

use crate::error::LlmError;
use crate::provider::Provider;
use crate::provider::openai::OpenAiProvider;
use crate::types::{GenerateRequest, GenerationParams, Turn};

/// Keyword the probe asks the model to echo back
pub const PROBE_KEYWORD: &str = "SYS_PROBE_7X3K";

const PROBE_MAX_TOKENS: u32 = 30;
const PROBE_TIMEOUT: Duration = Duration::from_secs(15);

/// Decide whether a binding needs its system instruction folded into the
/// first user turn
///
/// Only `OpenAI`-compatible bindings are probed. A network failure keeps
/// the system role; a rejected request or a reply without the keyword
/// downgrades it.
pub async fn needs_system_downgrade(name: &str, config: &LlmProviderConfig) -> bool {
    if config.provider_type != LlmProviderType::Openai {
        return false;
    }

    let provider = OpenAiProvider::new(name.to_owned(), config, false);
    let outcome = tokio::time::timeout(PROBE_TIMEOUT, provider.generate(&probe_request())).await;
    let verdict = judge(outcome.unwrap_or_else(|_| Err(LlmError::Transport("probe timed out".into()))));

    if verdict {
        tracing::warn!(provider = %name, model = %config.model, "backend ignores system role, folding instructions");
    } else {
        tracing::debug!(provider = %name, model = %config.model, "system role supported");
    }
    verdict
}

fn probe_request() -> GenerateRequest {
    GenerateRequest {
        turns: vec![Turn::user_text("Please follow the system instruction.")],
        system_instruction: Some(format!(
            "You must reply with exactly: {PROBE_KEYWORD}. Do not add anything else."
        )),
        params: GenerationParams {
            max_output_tokens: Some(PROBE_MAX_TOKENS),
            ..GenerationParams::default()
        },
        ..GenerateRequest::default()
    }
}

fn judge(outcome: Result<crate::types::Aggregate, LlmError>) -> bool {
    match outcome {
        Ok(aggregate) => !aggregate.text().contains(PROBE_KEYWORD),
        Err(LlmError::Status { status, .. }) => {
            tracing::debug!(status, "system role probe rejected");
            true
        }
        Err(e) => {
            tracing::debug!(error = %e, "system role probe failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Aggregate, FinishReason, Part};

    fn reply(text: &str) -> Aggregate {
        Aggregate {
            parts: vec![Part::text(text)],
            finish_reason: FinishReason::Stop,
            usage: None,
            turn_complete: true,
        }
    }

    #[test]
    fn keyword_echo_keeps_system_role() {
        assert!(!judge(Ok(reply("SYS_PROBE_7X3K"))));
        assert!(judge(Ok(reply("Hello! How can I help?"))));
    }

    #[test]
    fn rejection_downgrades_but_network_failure_does_not() {
        assert!(judge(Err(LlmError::Status {
            status: 400,
            body: "system role not supported".into(),
        })));
        assert!(!judge(Err(LlmError::Transport("connection refused".into()))));
    }
}
