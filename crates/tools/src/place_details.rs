//! Place details lookup through the Google Places API.

use std::sync::Arc;

use async_stream::try_stream;
use botty_core::tool::{Tool, ToolContext, ToolStream, ToolUpdate};
use futures::StreamExt;
use serde::Deserialize;

use crate::google_maps::MapsClient;
use crate::parse_input;

pub struct PlaceDetailsTool {
    client: Arc<MapsClient>,
}

impl PlaceDetailsTool {
    pub fn new(client: Arc<MapsClient>) -> Self {
        Self { client }
    }
}

#[derive(Debug, Deserialize)]
struct PlaceDetailsInput {
    place_id: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    fields: Option<Vec<String>>,
}

fn build_query(input: &PlaceDetailsInput) -> Vec<(&'static str, String)> {
    let mut query = vec![("place_id", input.place_id.clone())];
    if let Some(language) = &input.language {
        query.push(("language", language.clone()));
    }
    // No fields means every field
    if let Some(fields) = input.fields.as_ref().filter(|f| !f.is_empty()) {
        query.push(("fields", fields.join(",")));
    }
    query
}

impl Tool for PlaceDetailsTool {
    fn name(&self) -> &str {
        "place_details"
    }

    fn description(&self) -> &str {
        "Get detailed information about a specific place using its place_id from Google Places API"
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "place_id": {
                    "type": "string",
                    "description": "The place_id of the location to get details for. This can be obtained from the results of places_nearby searches."
                },
                "language": {
                    "type": "string",
                    "description": "The language code for the results (e.g., 'en', 'pt')"
                },
                "fields": {
                    "type": "array",
                    "description": "List of specific fields to return. If empty, returns all available fields.",
                    "items": {
                        "type": "string",
                        "enum": [
                            "address_component", "adr_address", "business_status",
                            "formatted_address", "geometry", "icon", "name",
                            "photo", "place_id", "plus_code", "type",
                            "url", "utc_offset", "vicinity", "formatted_phone_number",
                            "international_phone_number", "opening_hours",
                            "website", "price_level", "rating", "review",
                            "user_ratings_total"
                        ]
                    }
                }
            },
            "required": ["place_id"]
        })
    }

    fn execute<'a>(&'a self, ctx: ToolContext<'a>, input: serde_json::Value) -> ToolStream<'a> {
        try_stream! {
            let input: PlaceDetailsInput = parse_input(input)?;
            yield ToolUpdate::current("⏳ Looking up details on location...");

            let mut body = self
                .client
                .get(ctx.session_id, "place_details", "place/details", &build_query(&input))
                .await?;
            let details = body
                .get_mut("result")
                .map(serde_json::Value::take)
                .unwrap_or_else(|| serde_json::json!({}));

            yield ToolUpdate::done("✅ Location details fetched.", details);
        }
        .boxed()
    }
}
