//! Trait definitions for external API clients.
//!
//! These traits enable dependency injection and mocking for tests.
//! Production code uses the real client implementations, while tests
//! can substitute mock implementations.
//!
//! # Example
//!
//! ```ignore
//! use media_minder::enrichment::traits::RecordingLookup;
//!
//! async fn mbid(lookup: &dyn RecordingLookup, query: &RecordingQuery) -> Option<String> {
//!     lookup.search_recording(query).await.ok().flatten()
//! }
//! ```

use async_trait::async_trait;

use super::domain::{EnrichmentError, RecordingQuery, ScrobbleAck, ScrobbleRequest};

/// Trait for resolving a track to a MusicBrainz recording ID.
#[async_trait]
pub trait RecordingLookup: Send + Sync {
    /// Best matching recording ID, `None` when nothing matched.
    async fn search_recording(
        &self,
        query: &RecordingQuery,
    ) -> Result<Option<String>, EnrichmentError>;
}

/// Trait for a scrobbling service.
#[async_trait]
pub trait Scrobbler: Send + Sync {
    /// Obtain a session key.
    async fn authenticate(&self) -> Result<String, EnrichmentError>;

    /// Submit one listen.
    async fn scrobble(
        &self,
        request: &ScrobbleRequest,
        session_key: &str,
    ) -> Result<ScrobbleAck, EnrichmentError>;
}

// Implement traits for real clients

#[async_trait]
impl RecordingLookup for super::musicbrainz::MusicBrainzClient {
    async fn search_recording(
        &self,
        query: &RecordingQuery,
    ) -> Result<Option<String>, EnrichmentError> {
        self.search_recording(query).await
    }
}

#[async_trait]
impl Scrobbler for super::lastfm::LastFmClient {
    async fn authenticate(&self) -> Result<String, EnrichmentError> {
        self.authenticate().await
    }

    async fn scrobble(
        &self,
        request: &ScrobbleRequest,
        session_key: &str,
    ) -> Result<ScrobbleAck, EnrichmentError> {
        self.scrobble(request, session_key).await
    }
}
