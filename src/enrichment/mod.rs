//! External music services - recording lookup and scrobbling.
//!
//! # Architecture
//!
//! This module follows a clean separation between:
//! - **Domain models** (`domain.rs`) - Internal types that represent our business logic
//! - **API DTOs** (`musicbrainz/dto.rs`, `lastfm/dto.rs`) - Exact API response shapes
//! - **Adapters** - Convert DTOs to domain models
//! - **Clients** - HTTP clients for external APIs
//! - **Traits** (`traits.rs`) - Seams the scrobble pipeline is written against
//!
//! This decoupling means:
//! 1. API changes don't ripple through our codebase
//! 2. We can test API contracts independently
//! 3. We can swap providers without changing business logic

pub mod domain;
pub mod lastfm;
pub mod musicbrainz;
pub mod traits;

pub use domain::{EnrichmentError, RecordingQuery, ScrobbleAck, ScrobbleRequest};
pub use lastfm::LastFmClient;
pub use musicbrainz::MusicBrainzClient;
pub use traits::{RecordingLookup, Scrobbler};
