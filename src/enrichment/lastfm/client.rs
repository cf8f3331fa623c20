//! Last.fm HTTP client
//!
//! Every call is a form-encoded POST to the 2.0 endpoint, signed with the
//! account's API secret.
//! See: https://www.last.fm/api/mobileauth and https://www.last.fm/api/show/track.scrobble

use serde::de::DeserializeOwned;

use super::dto;
use super::signature::{Params, sign};
use crate::config::LastFmCredentials;
use crate::enrichment::domain::{EnrichmentError, ScrobbleAck, ScrobbleRequest};

const DEFAULT_BASE_URL: &str = "https://ws.audioscrobbler.com/2.0/";

/// Last.fm error code for "Rate Limit Exceeded"
const RATE_LIMIT_EXCEEDED: u32 = 29;

/// Last.fm API client
pub struct LastFmClient {
    http_client: reqwest::Client,
    base_url: String,
    credentials: LastFmCredentials,
}

impl LastFmClient {
    /// Create a new client
    pub fn new(credentials: LastFmCredentials) -> Result<Self, EnrichmentError> {
        Self::with_base_url(credentials, DEFAULT_BASE_URL)
    }

    /// Create a client against another endpoint (e.g. a Libre.fm-compatible server)
    pub fn with_base_url(
        credentials: LastFmCredentials,
        base_url: impl Into<String>,
    ) -> Result<Self, EnrichmentError> {
        Ok(Self {
            http_client: reqwest::Client::builder().build()?,
            base_url: base_url.into(),
            credentials,
        })
    }

    /// Exchange username and password for a session key.
    pub async fn authenticate(&self) -> Result<String, EnrichmentError> {
        check_credentials(&self.credentials)?;

        let body = self.post(self.auth_params()).await?;
        let response: dto::SessionResponse = parse(&body)?;

        if response.session.key.is_empty() {
            return Err(EnrichmentError::InvalidResponse(
                "empty session key".to_string(),
            ));
        }
        Ok(response.session.key)
    }

    /// Submit one scrobble with a session key from [`Self::authenticate`].
    pub async fn scrobble(
        &self,
        request: &ScrobbleRequest,
        session_key: &str,
    ) -> Result<ScrobbleAck, EnrichmentError> {
        check_credentials(&self.credentials)?;

        let body = self.post(self.scrobble_params(request, session_key)).await?;
        let response: dto::ScrobbleResponse = parse(&body)?;

        Ok(ScrobbleAck {
            accepted: response.scrobbles.attr.accepted,
            ignored: response.scrobbles.attr.ignored,
        })
    }

    fn auth_params(&self) -> Params {
        let params = Params::from([
            ("method", "auth.getMobileSession".to_string()),
            ("username", self.credentials.username.clone()),
            ("password", self.credentials.password.clone()),
            ("api_key", self.credentials.api_key.clone()),
        ]);
        sign(params, &self.credentials.api_secret)
    }

    fn scrobble_params(&self, request: &ScrobbleRequest, session_key: &str) -> Params {
        let mut params = Params::from([
            ("method", "track.scrobble".to_string()),
            ("artist", request.artist.clone()),
            ("track", request.track.clone()),
            ("timestamp", request.timestamp.to_string()),
            ("duration", request.duration.to_string()),
            ("api_key", self.credentials.api_key.clone()),
            ("sk", session_key.to_string()),
        ]);
        if let Some(album) = request.album.as_ref().filter(|a| !a.is_empty()) {
            params.insert("album", album.clone());
        }
        if let Some(mbid) = request.mbid.as_ref().filter(|m| !m.is_empty()) {
            params.insert("mbid", mbid.clone());
        }
        sign(params, &self.credentials.api_secret)
    }

    /// POST the signed parameters and return the body.
    ///
    /// Last.fm reports most failures as an error payload, so the body is
    /// returned whatever the status and checked by [`parse`].
    async fn post(&self, params: Params) -> Result<String, EnrichmentError> {
        let response = self
            .http_client
            .post(&self.base_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| EnrichmentError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| EnrichmentError::Network(e.to_string()))?;

        tracing::debug!(
            target: "scrobble",
            method = params.get("method").map(String::as_str).unwrap_or_default(),
            %status,
            "Last.fm response"
        );

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(EnrichmentError::RateLimited);
        }
        if !status.is_success() && serde_json::from_str::<dto::ErrorResponse>(&body).is_err() {
            return Err(EnrichmentError::Network(format!(
                "HTTP {}: {}",
                status,
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }
        Ok(body)
    }
}

fn check_credentials(credentials: &LastFmCredentials) -> Result<(), EnrichmentError> {
    let missing = [
        ("username", &credentials.username),
        ("password", &credentials.password),
        ("api_key", &credentials.api_key),
        ("api_secret", &credentials.api_secret),
    ]
    .into_iter()
    .find(|(_, value)| value.is_empty());

    match missing {
        Some((name, _)) => Err(EnrichmentError::MissingCredentials(name)),
        None => Ok(()),
    }
}

/// Parse a response body, mapping Last.fm error payloads to errors.
fn parse<T: DeserializeOwned>(body: &str) -> Result<T, EnrichmentError> {
    if let Ok(error) = serde_json::from_str::<dto::ErrorResponse>(body) {
        if error.error == RATE_LIMIT_EXCEEDED {
            return Err(EnrichmentError::RateLimited);
        }
        return Err(EnrichmentError::ApiError(format!(
            "{}: {}",
            error.error, error.message
        )));
    }

    serde_json::from_str(body).map_err(|e| EnrichmentError::Parse(e.to_string()))
}
