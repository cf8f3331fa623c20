//! MusicBrainz API Data Transfer Objects
//!
//! These types match EXACTLY what the MusicBrainz API returns.
//! DO NOT add fields that aren't in the API response.
//! DO NOT use these types outside the musicbrainz module - convert to domain types.
//!
//! API Reference: https://musicbrainz.org/doc/MusicBrainz_API/Search
//!
//! We only use the /recording search endpoint, which ranks hits by score.

use serde::{Deserialize, Serialize};

/// Recording search response
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecordingSearchResponse {
    /// Total number of hits
    #[serde(default)]
    pub count: u64,
    /// Offset of the first returned hit
    #[serde(default)]
    pub offset: u64,
    /// Hits, best first
    #[serde(default)]
    pub recordings: Vec<RecordingHit>,
}

/// A single search hit
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RecordingHit {
    /// MusicBrainz recording ID
    pub id: String,
    /// Search score (0-100)
    pub score: Option<u32>,
    pub title: Option<String>,
    /// Duration in milliseconds
    pub length: Option<u64>,
    #[serde(default)]
    pub artist_credit: Vec<ArtistCredit>,
    #[serde(default)]
    pub releases: Vec<Release>,
}

/// Artist credit (can be multiple for collaborations)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArtistCredit {
    /// How this artist is credited
    pub name: Option<String>,
    pub artist: Artist,
}

/// Artist info
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Artist {
    /// MusicBrainz artist ID
    pub id: String,
    pub name: String,
}

/// Release (album/single/EP) the recording appears on
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Release {
    /// MusicBrainz release ID
    pub id: String,
    pub title: Option<String>,
}

/// MusicBrainz error response
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiError {
    pub error: String,
}
