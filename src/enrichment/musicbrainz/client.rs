//! MusicBrainz HTTP client
//!
//! Handles communication with the MusicBrainz web service.
//! See: https://musicbrainz.org/doc/MusicBrainz_API
//!
//! IMPORTANT: MusicBrainz requires a User-Agent header and rate limits to 1 req/sec.

use super::{adapter, dto};
use crate::enrichment::domain::{EnrichmentError, RecordingQuery};

/// MusicBrainz API client
pub struct MusicBrainzClient {
    http_client: reqwest::Client,
    base_url: String,
}

/// User agent string - MusicBrainz requires this
const USER_AGENT: &str = concat!(
    "MediaMinder/",
    env!("CARGO_PKG_VERSION"),
    " (https://github.com/media-minder)"
);

const DEFAULT_BASE_URL: &str = "https://musicbrainz.org/ws/2";

impl MusicBrainzClient {
    /// Create a new client
    pub fn new() -> Result<Self, EnrichmentError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a client against another server (mirror or test stub)
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, EnrichmentError> {
        let http_client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;

        Ok(Self {
            http_client,
            base_url: base_url.into(),
        })
    }

    /// Search for a recording and return the ID of the best hit.
    ///
    /// An empty result is `Ok(None)`, not an error.
    pub async fn search_recording(
        &self,
        query: &RecordingQuery,
    ) -> Result<Option<String>, EnrichmentError> {
        let response = self.send_search_request(query).await?;
        Ok(adapter::first_recording_id(&response))
    }

    fn search_url(&self, query: &RecordingQuery) -> String {
        format!(
            "{}/recording?query={}&fmt=json",
            self.base_url,
            urlencoding::encode(&adapter::build_query(query))
        )
    }

    /// Send the HTTP request and parse the response
    async fn send_search_request(
        &self,
        query: &RecordingQuery,
    ) -> Result<dto::RecordingSearchResponse, EnrichmentError> {
        let url = self.search_url(query);
        tracing::debug!(target: "scrobble", %url, "MusicBrainz recording search");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| EnrichmentError::Network(e.to_string()))?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS
            || status == reqwest::StatusCode::SERVICE_UNAVAILABLE
        {
            return Err(EnrichmentError::RateLimited);
        }

        if !status.is_success() {
            // Try to parse error response
            if let Ok(error) = response.json::<dto::ApiError>().await {
                return Err(EnrichmentError::ApiError(error.error));
            }
            return Err(EnrichmentError::Network(format!(
                "HTTP {}: {}",
                status,
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        response
            .json::<dto::RecordingSearchResponse>()
            .await
            .map_err(|e| EnrichmentError::Parse(e.to_string()))
    }
}
