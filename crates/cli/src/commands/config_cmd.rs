//! `botty config`: configuration management commands.

use botty_config::AppConfig;

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let mut warnings = Vec::new();
            if !config.has_api_key() && config.default_provider != "ollama" {
                warnings.push("No API key set (set BOTTY_API_KEY or the selected provider's key variable)");
            }
            if config.tools.google_maps_api_key.is_none() {
                warnings.push("No Google Maps key set, places tools are disabled");
            }
            if let Err(e) = config.system_prompt() {
                println!("   ❌ {e}");
                return Err(e.into());
            }

            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Provider:    {}", config.default_provider);
            println!("   Model:       {}", config.default_model);
            println!("   Max rounds:  {}", config.agent.max_rounds);
            println!("   Memory:      {} entries", config.memory.max_entries);
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}
