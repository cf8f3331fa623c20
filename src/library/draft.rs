//! In-memory records built by ingestion workers before any database id exists.
//!
//! Workers create drafts with `id: None`. The commit stage assigns ids to
//! artists first and then rewrites every album and track artist reference to
//! the identified record (see [`super::ingest`]).

use std::path::PathBuf;

/// An artist discovered in a file's tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtistDraft {
    /// Assigned once the artist has been upserted
    pub id: Option<i64>,
    pub name: String,
    pub bio: Option<String>,
    pub image_uri: Option<String>,
}

impl ArtistDraft {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            bio: None,
            image_uri: None,
        }
    }
}

/// An album discovered in a file's tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumDraft {
    pub id: Option<i64>,
    pub name: String,
    /// `YYYY-01-01` when the tag carries a year
    pub release_date: Option<String>,
    pub image_uri: Option<String>,
    pub artists: Vec<ArtistDraft>,
}

/// A track built from one audio file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackDraft {
    pub title: String,
    /// Duration in seconds
    pub duration: i64,
    pub lyrics: Option<String>,
    pub is_explicit: bool,
    pub path: PathBuf,
    pub digest: String,
    /// Name of the album this track belongs to
    pub album: String,
    pub artists: Vec<ArtistDraft>,
    /// Genre tag names
    pub tags: Vec<String>,
}

/// Everything one worker produced for one file.
#[derive(Debug, Clone)]
pub struct Discovered {
    pub track: TrackDraft,
    /// Track artist and, when different, the album artist
    pub artists: Vec<ArtistDraft>,
    pub album: AlbumDraft,
}
