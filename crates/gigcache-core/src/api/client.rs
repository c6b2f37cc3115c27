//! API client for the shows endpoint.

use std::time::Duration;

use anyhow::Result;
use reqwest::{header, Client, Url};
use serde_json::Value;
use tracing::debug;

use super::ApiError;
use crate::endpoint::append_query;
use crate::models::{Event, Location, SearchPrefs};

/// HTTP request timeout in seconds.
/// 30s allows for slow upstream aggregation while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Client for the shows endpoint.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
}

impl ApiClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client })
    }

    /// Full request URL for a discovery query.
    pub fn events_url(endpoint: &str, location: &Location, prefs: &SearchPrefs) -> String {
        let prefs = prefs.clamped();
        append_query(
            endpoint,
            &[
                ("lat", location.latitude.to_string()),
                ("lon", location.longitude.to_string()),
                ("radius", prefs.radius.to_string()),
                ("days", prefs.days.to_string()),
            ],
        )
    }

    /// Fetch events around `location` within the `prefs` window.
    ///
    /// A body without an `events` array is an empty result; entries that are
    /// not objects are skipped. Non-2xx responses are errors and are never
    /// retried here.
    pub async fn fetch_events(
        &self,
        endpoint: &str,
        location: &Location,
        prefs: &SearchPrefs,
        token: Option<&str>,
    ) -> Result<Vec<Event>, ApiError> {
        let url = Self::events_url(endpoint, location, prefs);
        let url = Url::parse(&url).map_err(|e| ApiError::InvalidEndpoint(format!("{}: {}", url, e)))?;

        let mut request = self
            .client
            .get(url.clone())
            .header(header::ACCEPT, "application/json");
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let response = Self::check_response(response).await?;
        let body = response.text().await?;

        let data: Value = serde_json::from_str(&body)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse shows response: {}", e)))?;
        let events = match data.get("events") {
            Some(Value::Array(items)) => Event::list_from_values(items.clone()),
            _ => Vec::new(),
        };

        debug!(url = %url, count = events.len(), "Shows fetched");
        Ok(events)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }
}
