//! Geocoding tool: turns an address into a search area.
//!
//! The area is the center of the result's bounding box plus the
//! great-circle distance from that center to the north-east corner, which
//! is a good default `radius` for a follow-up `places_nearby` search.

use std::sync::Arc;

use async_stream::try_stream;
use botty_core::error::ToolError;
use botty_core::tool::{Tool, ToolContext, ToolStream, ToolUpdate};
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use crate::google_maps::MapsClient;
use crate::parse_input;

/// Mean Earth radius in meters.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

pub struct GeocodeTool {
    client: Arc<MapsClient>,
}

impl GeocodeTool {
    pub fn new(client: Arc<MapsClient>) -> Self {
        Self { client }
    }
}

#[derive(Debug, Deserialize)]
struct GeocodeInput {
    address: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Bounds {
    pub northeast: LatLng,
    pub southwest: LatLng,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    #[serde(default)]
    bounds: Option<Bounds>,
    viewport: Bounds,
}

/// Great-circle distance between two points, in meters.
pub fn haversine_m(a: LatLng, b: LatLng) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let dlat = lat2 - lat1;
    let dlng = (b.lng - a.lng).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().atan2((1.0 - h).sqrt())
}

impl Bounds {
    pub fn center(&self) -> LatLng {
        LatLng {
            lat: (self.northeast.lat + self.southwest.lat) / 2.0,
            lng: (self.northeast.lng + self.southwest.lng) / 2.0,
        }
    }

    /// Distance from the center to the north-east corner, in meters.
    pub fn radius_m(&self) -> f64 {
        haversine_m(self.center(), self.northeast)
    }
}

impl Tool for GeocodeTool {
    fn name(&self) -> &str {
        "geocode"
    }

    fn description(&self) -> &str {
        "Convert addresses into latitude and longitude coordinates using Google Geocoding API"
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "address": {
                    "type": "string",
                    "description": "Address to convert to coordinates (e.g. 'Porto, Portugal' or 'Avenida dos Aliados, Porto')"
                }
            },
            "required": ["address"]
        })
    }

    fn execute<'a>(&'a self, ctx: ToolContext<'a>, input: serde_json::Value) -> ToolStream<'a> {
        try_stream! {
            let GeocodeInput { address } = parse_input(input)?;
            yield ToolUpdate::current(format!("⏳ Geocoding '{address}'..."));

            let body = self
                .client
                .get(ctx.session_id, "geocode", "geocode", &[("address", address.clone())])
                .await?;
            let response: GeocodeResponse = serde_json::from_value(body).map_err(|e| {
                ToolError::Upstream {
                    tool_name: "geocode".into(),
                    reason: format!("Unexpected geocode response: {e}"),
                }
            })?;

            let geometry = response
                .results
                .into_iter()
                .next()
                .map(|r| r.geometry)
                .ok_or_else(|| ToolError::ExecutionFailed {
                    tool_name: "geocode".into(),
                    reason: format!("No results for address '{address}'"),
                })?;

            // Precise addresses only carry a viewport
            let bounds = geometry.bounds.unwrap_or(geometry.viewport);
            let center = bounds.center();
            let radius = bounds.radius_m().round();

            yield ToolUpdate::done(
                format!(
                    "✅ Geocoded `{address}` to center=`({},{}), radius={radius}m`.",
                    center.lat, center.lng
                ),
                serde_json::json!({"center": center, "radius": radius}),
            );
        }
        .boxed()
    }
}
