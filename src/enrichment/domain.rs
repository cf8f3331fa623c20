//! Internal domain models for recording lookup and scrobbling.
//!
//! These types are OUR types - they don't change when external APIs change.
//! All external API responses get converted into these types via adapters.

/// What we know about a track when searching for its recording.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecordingQuery {
    pub title: String,
    /// Primary artist
    pub artist: Option<String>,
    /// Album (release) title
    pub album: Option<String>,
}

/// One listen to submit to the scrobbling service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrobbleRequest {
    pub artist: String,
    pub track: String,
    /// Unix time the track started playing
    pub timestamp: i64,
    pub album: Option<String>,
    /// MusicBrainz recording ID
    pub mbid: Option<String>,
    /// Seconds actually listened
    pub duration: u64,
}

/// Scrobble submission outcome as reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScrobbleAck {
    pub accepted: u32,
    pub ignored: u32,
}

/// Errors that can occur while talking to external services
#[derive(Debug, Clone, thiserror::Error)]
pub enum EnrichmentError {
    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("No matches found")]
    NoMatches,

    #[error("Rate limited - try again later")]
    RateLimited,

    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    #[error("Missing credentials: {0}")]
    MissingCredentials(&'static str),
}

impl From<reqwest::Error> for EnrichmentError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }
}
