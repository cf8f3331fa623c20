//! MusicBrainz API integration
//!
//! Resolves a played track to its MusicBrainz recording ID through the
//! recording search, so scrobbles carry an `mbid`.
//!
//! API docs: https://musicbrainz.org/doc/MusicBrainz_API

pub mod dto;
mod adapter;
mod client;

pub use adapter::build_query;
pub use client::MusicBrainzClient;
