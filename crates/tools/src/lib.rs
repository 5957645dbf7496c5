//! Built-in tool implementations for Botty.
//!
//! Tools give the agent the ability to remember things about the user,
//! do arithmetic, and look up places through the Google Maps web services.
//! Every tool returns a lazy stream of status updates ending with a result.

pub mod calculator;
pub mod geocode;
pub mod google_maps;
pub mod memory;
pub mod place_details;
pub mod places_nearby;

use std::sync::Arc;

use botty_config::AppConfig;
use botty_core::error::ToolError;
use botty_core::tool::ToolRegistry;
use serde::de::DeserializeOwned;

pub use google_maps::MapsClient;

/// Create the tool registry described by the configuration.
///
/// The Google Maps tools are only registered when an API key is available.
/// `tools.enabled`, when non-empty, restricts the registry to the named tools.
pub fn default_registry(config: &AppConfig) -> Result<ToolRegistry, ToolError> {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(memory::SaveMemoryTool));
    registry.register(Box::new(memory::DeleteMemoryTool));
    registry.register(Box::new(calculator::CalculatorTool));

    match &config.tools.google_maps_api_key {
        Some(key) => {
            let mut client = MapsClient::new(key)?;
            if let Some(url) = &config.tools.maps_base_url {
                client = client.with_base_url(url);
            }
            let client = Arc::new(client);
            registry.register(Box::new(places_nearby::PlacesNearbyTool::new(client.clone())));
            registry.register(Box::new(geocode::GeocodeTool::new(client.clone())));
            registry.register(Box::new(place_details::PlaceDetailsTool::new(client)));
        }
        None => {
            tracing::warn!("GOOGLE_MAPS_API_KEY not set, geocoding and places tools disabled");
        }
    }

    registry.retain_enabled(&config.tools.enabled);
    Ok(registry)
}

/// Deserialize validated tool input into its typed form.
pub(crate) fn parse_input<T: DeserializeOwned>(input: serde_json::Value) -> Result<T, ToolError> {
    serde_json::from_value(input).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}
