//! Adapter layer: Convert MusicBrainz DTOs to domain values
//!
//! This is the ONLY place where DTO types are converted to domain types.
//! This isolates API changes - if MusicBrainz changes their response format,
//! only this file and dto.rs need to change.

use super::dto;
use crate::enrichment::domain::RecordingQuery;

/// The recording ID of the best hit, if any.
///
/// MusicBrainz returns hits ordered by score, so the first one wins.
pub fn first_recording_id(response: &dto::RecordingSearchResponse) -> Option<String> {
    response
        .recordings
        .first()
        .map(|hit| hit.id.clone())
        .filter(|id| !id.is_empty())
}

/// Build the Lucene query for a recording search.
///
/// Only known fields are included. Quotes and backslashes inside values are
/// escaped so each value stays a single phrase.
pub fn build_query(query: &RecordingQuery) -> String {
    let mut clauses = vec![format!("recording:\"{}\"", escape_phrase(&query.title))];

    if let Some(artist) = query.artist.as_deref().filter(|a| !a.is_empty()) {
        clauses.push(format!("artist:\"{}\"", escape_phrase(artist)));
    }
    if let Some(album) = query.album.as_deref().filter(|a| !a.is_empty()) {
        clauses.push(format!("release:\"{}\"", escape_phrase(album)));
    }

    clauses.join(" AND ")
}

fn escape_phrase(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
