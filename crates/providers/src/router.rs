//! Provider selection from configuration.

use crate::anthropic::AnthropicProvider;
use crate::openai_compat::OpenAiCompatProvider;
use botty_config::AppConfig;
use botty_core::{Provider, ProviderError};
use std::sync::Arc;

/// Build the configured default provider.
///
/// The API key comes from `[providers.<name>]` first, then the top-level
/// `api_key`. Ollama is the only provider that runs without one.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let name = config.default_provider.as_str();
    let provider_config = config.providers.get(name);

    let api_key = provider_config
        .and_then(|p| p.api_key.clone())
        .or_else(|| config.api_key.clone());

    let api_url = provider_config.and_then(|p| p.api_url.clone());

    let provider: Arc<dyn Provider> = match (name, api_key) {
        ("ollama", _) => Arc::new(OpenAiCompatProvider::ollama(api_url.as_deref())?),
        (_, None) => {
            return Err(ProviderError::NotConfigured(format!(
                "No API key for provider '{name}'. Set BOTTY_API_KEY or run `botty onboard`."
            )));
        }
        ("anthropic", Some(key)) => {
            let mut p = AnthropicProvider::new(key)?.with_prompt_caching(config.agent.prompt_caching);
            if let Some(url) = api_url {
                p = p.with_base_url(url);
            }
            Arc::new(p)
        }
        (_, Some(key)) => {
            let base_url = api_url
                .or_else(|| default_base_url(name).map(String::from))
                .ok_or_else(|| {
                    ProviderError::NotConfigured(format!(
                        "Unknown provider '{name}'. Set providers.{name}.api_url in config.toml."
                    ))
                })?;
            Arc::new(OpenAiCompatProvider::new(name, base_url, key)?)
        }
    };

    tracing::debug!(provider = name, model = %config.default_model, "Provider ready");
    Ok(provider)
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> Option<&'static str> {
    match provider_name {
        "openai" => Some("https://api.openai.com/v1"),
        "openrouter" => Some("https://openrouter.ai/api/v1"),
        "ollama" => Some("http://localhost:11434/v1"),
        "deepseek" => Some("https://api.deepseek.com/v1"),
        "groq" => Some("https://api.groq.com/openai/v1"),
        "together" => Some("https://api.together.xyz/v1"),
        "vllm" => Some("http://localhost:8000/v1"),
        _ => None,
    }
}
