//! Audio file metadata reading.
//!
//! Uses the lofty crate for format-independent metadata access.
//! Supports MP3, FLAC, OGG, M4A/M4B/M4P/ALAC and DSF files.
//!
//! Ingestion reads tags through the [`TagReader`] trait so the pipeline can
//! run against synthetic files in tests; [`LoftyTagReader`] is the real one.

use anyhow::{Context, Result};
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey, Tag};
use std::path::Path;

pub const UNKNOWN_TITLE: &str = "Unknown Title";
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
pub const UNKNOWN_ALBUM: &str = "Unknown Album";

/// Track metadata - uses String for SQLx compatibility.
/// The metadata is read once and stored, so allocation overhead is minimal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackMetadata {
    pub title: String,
    pub artist: String,
    /// Falls back to `artist` when the file has no album artist
    pub album_artist: String,
    pub album: String,
    pub year: Option<u32>,
    /// Duration in seconds
    pub duration: u64,
    pub lyrics: Option<String>,
    pub explicit: bool,
    pub genres: Vec<String>,
}

/// Source of track metadata for the ingestor.
pub trait TagReader: Send + Sync {
    fn read(&self, path: &Path) -> Result<TrackMetadata>;
}

/// Reads embedded tags with lofty.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoftyTagReader;

impl TagReader for LoftyTagReader {
    fn read(&self, path: &Path) -> Result<TrackMetadata> {
        read(path)
    }
}

pub fn read(path: &Path) -> Result<TrackMetadata> {
    // Probe the file to determine format and read tags
    let tagged_file = Probe::open(path)
        .context("Failed to open file for probing")?
        .read()
        .context("Failed to read file metadata")?;

    // Get the primary tag, or fall back to the first available tag
    let tag = tagged_file
        .primary_tag()
        .or_else(|| tagged_file.first_tag());

    let title = tag
        .and_then(|t| t.title().map(|s| s.to_string()))
        .unwrap_or_else(|| UNKNOWN_TITLE.to_string());

    let artist = tag
        .and_then(|t| t.artist().map(|s| s.to_string()))
        .unwrap_or_else(|| UNKNOWN_ARTIST.to_string());

    let album_artist = tag
        .and_then(|t| non_empty(t, &ItemKey::AlbumArtist))
        .unwrap_or_else(|| artist.clone());

    let album = tag
        .and_then(|t| t.album().map(|s| s.to_string()))
        .unwrap_or_else(|| UNKNOWN_ALBUM.to_string());

    let year = tag.and_then(|t| t.year());
    let lyrics = tag.and_then(|t| non_empty(t, &ItemKey::Lyrics));
    let explicit = tag
        .and_then(|t| t.get_string(&ItemKey::ParentalAdvisory))
        .map(is_explicit_advisory)
        .unwrap_or(false);

    let genres = tag
        .map(|t| {
            let mut genres: Vec<String> = t
                .get_strings(&ItemKey::Genre)
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .map(str::to_string)
                .collect();
            genres.dedup();
            genres
        })
        .unwrap_or_default();

    // Get duration from properties
    let properties = tagged_file.properties();
    let duration = properties.duration().as_secs();

    Ok(TrackMetadata {
        title,
        artist,
        album_artist,
        album,
        year,
        duration,
        lyrics,
        explicit,
        genres,
    })
}

fn non_empty(tag: &Tag, key: &ItemKey) -> Option<String> {
    tag.get_string(key)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// iTunes advisory: `1` (or `4`) explicit, `2` clean, `0` none. Vorbis
/// comments sometimes carry a word instead.
fn is_explicit_advisory(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "4" | "explicit" | "true" | "yes"
    )
}
