//! Nearby places search through the Google Places API.

use std::sync::Arc;

use async_stream::try_stream;
use botty_core::tool::{Tool, ToolContext, ToolStream, ToolUpdate};
use futures::StreamExt;
use serde::Deserialize;

use crate::google_maps::MapsClient;
use crate::parse_input;

/// Search radius used when neither `radius` nor `rank_by = distance` is given.
pub const DEFAULT_RADIUS_M: u32 = 1000;

/// Place types accepted by the Places API `type` filter.
const PLACE_TYPES: &[&str] = &[
    "accounting", "airport", "amusement_park", "aquarium", "art_gallery", "atm", "bakery",
    "bank", "bar", "beauty_salon", "bicycle_store", "book_store", "bowling_alley",
    "bus_station", "cafe", "campground", "car_dealer", "car_rental", "car_repair", "car_wash",
    "casino", "cemetery", "church", "city_hall", "clothing_store", "convenience_store",
    "courthouse", "dentist", "department_store", "doctor", "drugstore", "electrician",
    "electronics_store", "embassy", "fire_station", "florist", "funeral_home",
    "furniture_store", "gas_station", "gym", "hair_care", "hardware_store", "hindu_temple",
    "home_goods_store", "hospital", "insurance_agency", "jewelry_store", "laundry", "lawyer",
    "library", "light_rail_station", "liquor_store", "local_government_office", "locksmith",
    "lodging", "meal_delivery", "meal_takeaway", "mosque", "movie_rental", "movie_theater",
    "moving_company", "museum", "night_club", "painter", "park", "parking", "pet_store",
    "pharmacy", "physiotherapist", "plumber", "police", "post_office", "primary_school",
    "real_estate_agency", "restaurant", "roofing_contractor", "rv_park", "school",
    "secondary_school", "shoe_store", "shopping_mall", "spa", "stadium", "storage", "store",
    "subway_station", "supermarket", "synagogue", "taxi_stand", "tourist_attraction",
    "train_station", "transit_station", "travel_agency", "university", "veterinary_care",
    "zoo",
];

pub struct PlacesNearbyTool {
    client: Arc<MapsClient>,
}

impl PlacesNearbyTool {
    pub fn new(client: Arc<MapsClient>) -> Self {
        Self { client }
    }
}

#[derive(Debug, Deserialize)]
struct Location {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct PlacesNearbyInput {
    location: Location,
    #[serde(default, rename = "type")]
    place_type: Option<String>,
    #[serde(default)]
    radius: Option<u32>,
    #[serde(default)]
    keyword: Option<String>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    min_price: Option<u8>,
    #[serde(default)]
    max_price: Option<u8>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    open_now: Option<bool>,
    #[serde(default)]
    rank_by: Option<String>,
    #[serde(default)]
    page_token: Option<String>,
}

/// Build the Nearby Search query string parameters.
fn build_query(input: &PlacesNearbyInput) -> Vec<(&'static str, String)> {
    let mut query = vec![(
        "location",
        format!("{},{}", input.location.latitude, input.location.longitude),
    )];

    // The API rejects `radius` together with rankby=distance
    let by_distance = input.rank_by.as_deref() == Some("distance");
    match input.radius {
        Some(radius) => query.push(("radius", radius.to_string())),
        None if !by_distance => query.push(("radius", DEFAULT_RADIUS_M.to_string())),
        None => {}
    }

    let optional = [
        ("type", input.place_type.clone()),
        ("keyword", input.keyword.clone()),
        ("language", input.language.clone()),
        ("minprice", input.min_price.map(|p| p.to_string())),
        ("maxprice", input.max_price.map(|p| p.to_string())),
        ("name", input.name.clone()),
        ("rankby", input.rank_by.clone()),
        ("pagetoken", input.page_token.clone()),
    ];
    query.extend(optional.into_iter().filter_map(|(k, v)| v.map(|v| (k, v))));

    if input.open_now.unwrap_or(false) {
        query.push(("opennow", "true".into()));
    }

    query
}

impl Tool for PlacesNearbyTool {
    fn name(&self) -> &str {
        "places_nearby"
    }

    fn description(&self) -> &str {
        "Search for places using Google Places API with various filtering options"
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "type": {
                    "type": "string",
                    "description": "Type of place to search for",
                    "enum": PLACE_TYPES
                },
                "location": {
                    "type": "object",
                    "properties": {
                        "latitude": {"type": "number", "minimum": -90, "maximum": 90},
                        "longitude": {"type": "number", "minimum": -180, "maximum": 180}
                    },
                    "required": ["latitude", "longitude"],
                    "description": "Geographic coordinates of the search center point"
                },
                "radius": {
                    "type": "integer",
                    "description": "Search radius in meters",
                    "minimum": 1,
                    "maximum": 50000
                },
                "keyword": {
                    "type": "string",
                    "description": "Term to match against all content indexed for this place"
                },
                "language": {
                    "type": "string",
                    "description": "The language code for the results (e.g., 'en', 'pt')"
                },
                "min_price": {
                    "type": "integer",
                    "minimum": 0,
                    "maximum": 4,
                    "description": "Minimum price level (0=most affordable, 4=most expensive)"
                },
                "max_price": {
                    "type": "integer",
                    "minimum": 0,
                    "maximum": 4,
                    "description": "Maximum price level (0=most affordable, 4=most expensive)"
                },
                "name": {
                    "type": "string",
                    "description": "Terms to match against place names"
                },
                "open_now": {
                    "type": "boolean",
                    "description": "Return only places that are currently open"
                },
                "rank_by": {
                    "type": "string",
                    "enum": ["prominence", "distance"],
                    "description": "Order in which to rank results"
                },
                "page_token": {
                    "type": "string",
                    "description": "Token for retrieving the next page of results"
                }
            },
            "required": ["location"]
        })
    }

    fn execute<'a>(&'a self, ctx: ToolContext<'a>, input: serde_json::Value) -> ToolStream<'a> {
        try_stream! {
            let input: PlacesNearbyInput = parse_input(input)?;
            yield ToolUpdate::current("⏳ Searching for locations...");

            let body = self
                .client
                .get(ctx.session_id, "places_nearby", "place/nearbysearch", &build_query(&input))
                .await?;
            let places = match body.get("results") {
                Some(serde_json::Value::Array(results)) => results.clone(),
                _ => Vec::new(),
            };

            yield ToolUpdate::done(
                format!("✅ Found `{}` locations.", places.len()),
                serde_json::Value::Array(places),
            );
        }
        .boxed()
    }
}
