//! Core data models for the music library and listening history.
//!
//! Defines the persisted entities: [`Track`], [`Artist`], [`Album`],
//! [`Tag`] and [`Listen`]. These derive SQLx's `FromRow` for database
//! mapping.
//!
//! # Database Schema
//!
//! The models map to the following tables:
//! - `artists` - Artist records with unique names
//! - `albums` - Albums with unique names, linked to artists via `album_artists`
//! - `tracks` - Individual audio files, unique by content digest
//! - `tags` - Genre tags, linked via `track_tags`
//! - `listens` - Append-only listening history

use sqlx::FromRow;

/// An artist in the music library.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Artist {
    /// Database ID (auto-generated)
    pub id: i64,
    /// Artist name (unique)
    pub name: String,
    pub bio: Option<String>,
    pub image_uri: Option<String>,
}

/// An album in the music library.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Album {
    /// Database ID (auto-generated)
    pub id: i64,
    /// Album name (unique)
    pub name: String,
    /// Release date as `YYYY-MM-DD`
    pub release_date: Option<String>,
    pub image_uri: Option<String>,
}

/// A track (audio file) in the music library.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Track {
    /// Database ID (auto-generated)
    pub id: i64,
    /// Foreign key to albums table
    pub album_id: Option<i64>,
    /// Track title
    pub name: String,
    /// Duration in seconds
    pub duration: i64,
    pub lyrics: Option<String>,
    pub is_explicit: bool,
    /// Path the file was last seen at
    pub file_path: String,
    /// SHA-256 of the file contents (unique identifier)
    pub content_digest: String,
}

/// A genre tag.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

/// One recorded listen of a track.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Listen {
    pub id: i64,
    pub user_id: i64,
    pub track_id: i64,
    /// Whole seconds actually spent playing
    pub listen_seconds: i64,
    /// RFC 3339 timestamp of when the listen was recorded
    pub timestamp: String,
}

/// A listen joined with its track title, for display.
#[derive(Debug, Clone, FromRow)]
pub struct ListenWithTrack {
    pub id: i64,
    pub track_id: i64,
    pub track_name: String,
    pub listen_seconds: i64,
    pub timestamp: String,
}

/// A track with how often it was listened to.
#[derive(Debug, Clone, FromRow)]
pub struct TrackPlays {
    pub id: i64,
    pub name: String,
    pub file_path: String,
    pub listen_count: i64,
}
