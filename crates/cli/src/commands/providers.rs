//! `botty providers`: list supported LLM providers.

use botty_config::AppConfig;
use botty_core::{Provider, ProviderError};

pub async fn run(models: bool) -> Result<(), Box<dyn std::error::Error>> {
    println!("🤖 Supported LLM Providers");
    println!("==========================");
    println!();
    println!("  ┌──────────────┬──────────────────────────────┬──────────────┐");
    println!("  │ Provider     │ Base URL                     │ Auth         │");
    println!("  ├──────────────┼──────────────────────────────┼──────────────┤");
    println!("  │ anthropic    │ api.anthropic.com/v1         │ API key      │");
    println!("  │ openai       │ api.openai.com/v1            │ API key      │");
    println!("  │ openrouter   │ openrouter.ai/api/v1         │ API key      │");
    println!("  │ ollama       │ localhost:11434/v1           │ None (local) │");
    println!("  └──────────────┴──────────────────────────────┴──────────────┘");
    println!();
    println!("  Custom endpoints:");
    println!("    default_provider = \"openai\"");
    println!("    [providers.openai]");
    println!("    api_url = \"https://your-custom-endpoint.com/v1\"");
    println!("    api_key = \"your-key\"");
    println!();
    println!("  Environment variables:");
    println!("    BOTTY_API_KEY, ANTHROPIC_API_KEY, OPENAI_API_KEY, OPENROUTER_API_KEY");
    println!("    BOTTY_PROVIDER, BOTTY_MODEL, GOOGLE_MAPS_API_KEY");

    if models {
        let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
        let provider = botty_providers::build_from_config(&config)?;
        println!();
        print!("{}", model_listing(provider.as_ref()).await?);
    }

    Ok(())
}

/// Models served by `provider`, one per line.
async fn model_listing(provider: &dyn Provider) -> Result<String, ProviderError> {
    let models = provider.list_models().await?;
    let mut out = format!("  Models for {} ({}):\n", provider.name(), models.len());
    if models.is_empty() {
        out.push_str("    (the provider did not report any models)\n");
    }
    for model in models {
        out.push_str(&format!("    {model}\n"));
    }
    Ok(out)
}
