//! `botty tools`: list the tools the model can call.

use botty_config::AppConfig;

pub async fn run(schema: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let registry = botty_tools::default_registry(&config)?;

    println!("🛠️  Available tools ({})", registry.len());
    println!("=====================");
    for spec in registry.specs() {
        println!();
        println!("  {}", spec.name);
        println!("    {}", spec.description);
        if schema {
            let pretty = serde_json::to_string_pretty(&spec.input_schema)?;
            for line in pretty.lines() {
                println!("    {line}");
            }
        }
    }

    if config.tools.google_maps_api_key.is_none() {
        println!();
        println!("  Set GOOGLE_MAPS_API_KEY to enable geocode, places_nearby and place_details.");
    }

    Ok(())
}
