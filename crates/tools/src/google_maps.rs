//! Minimal client for the Google Maps web services.
//!
//! One client (and one connection pool) is shared by the geocoding and
//! places tools. Responses carry a `status` field; anything other than
//! `OK` or `ZERO_RESULTS` is reported as an upstream failure.

use botty_core::SessionId;
use botty_core::error::ToolError;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/maps/api";

pub struct MapsClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl MapsClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ToolError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ToolError::Upstream {
                tool_name: "google_maps".into(),
                reason: format!("Failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.into(),
        })
    }

    /// Point the client at another host (e.g., a proxy or a test server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// `GET {base_url}/{path}/json` and check the service status.
    ///
    /// `tool` names the calling tool in errors. `session_id` tags the log line.
    pub async fn get(
        &self,
        session_id: &SessionId,
        tool: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<serde_json::Value, ToolError> {
        let url = format!("{}/{path}/json", self.base_url);
        let upstream = |reason: String| ToolError::Upstream {
            tool_name: tool.to_string(),
            reason,
        };

        debug!(%session_id, tool, path, params = query.len(), "Calling Google Maps");

        let response = self
            .http
            .get(&url)
            .query(query)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| upstream(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(upstream(format!("HTTP {}", status.as_u16())));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| upstream(format!("Unreadable response: {e}")))?;

        let envelope: Envelope = serde_json::from_value(body.clone())
            .map_err(|e| upstream(format!("Unexpected response shape: {e}")))?;

        match envelope.status.as_str() {
            "OK" | "ZERO_RESULTS" => Ok(body),
            other => Err(upstream(match envelope.error_message {
                Some(message) => format!("{other}: {message}"),
                None => other.to_string(),
            })),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
}
