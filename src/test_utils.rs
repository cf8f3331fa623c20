//! Test utilities and fixtures for media-minder tests.
//!
//! This module provides common test helpers, fake tag files, and
//! database utilities to reduce boilerplate in tests.
//!
//! # Example
//!
//! ```ignore
//! use media_minder::test_utils::{temp_db, write_fixture};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let (pool, _dir) = temp_db().await;
//!     write_fixture(music.path(), "a.mp3", &[("title", "A")]);
//!     // ... test logic
//! }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use chrono::{TimeZone, Utc};
use sqlx::sqlite::SqlitePool;
use tempfile::TempDir;

use crate::db::NewTrack;
use crate::metadata::{TagReader, TrackMetadata, UNKNOWN_ALBUM, UNKNOWN_ARTIST};
use crate::monitor::SessionSnapshot;

/// Creates a temporary database for testing.
///
/// The database is created in a temporary directory that is automatically
/// cleaned up when the returned `TempDir` is dropped. Migrations are run
/// automatically.
///
/// # Returns
///
/// A tuple of (connection pool, temp directory handle).
/// Keep the TempDir alive for the duration of your test.
pub async fn temp_db() -> (SqlitePool, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let db_path = dir.path().join("test.db");
    let db_url = format!("sqlite:{}", db_path.display());

    let pool = crate::db::init_db(&db_url)
        .await
        .expect("Failed to initialize test database");

    (pool, dir)
}

/// Creates a NewTrack with no album, artists or tags.
///
/// Customize using struct update syntax:
///
/// ```ignore
/// let track = NewTrack {
///     duration: 300,
///     ..new_track("Song", "/music/song.mp3", "digest")
/// };
/// ```
pub fn new_track(name: &str, path: &str, digest: &str) -> NewTrack {
    NewTrack {
        album_id: None,
        name: name.to_string(),
        duration: 180,
        lyrics: None,
        is_explicit: false,
        file_path: path.to_string(),
        content_digest: digest.to_string(),
        artist_ids: Vec::new(),
        tags: Vec::new(),
    }
}

/// Inserts a track and returns its ID.
pub async fn insert_mock_track(pool: &SqlitePool, name: &str, duration: i64) -> i64 {
    let track = NewTrack {
        duration,
        ..new_track(name, &format!("/test/{name}.mp3"), &format!("digest-{name}"))
    };
    crate::db::insert_tracks(pool, &[track])
        .await
        .expect("Failed to insert track");

    crate::db::find_tracks_by_name(pool, name)
        .await
        .expect("Failed to find track")
        .last()
        .map(|t| t.id)
        .expect("Track was not inserted")
}

/// Writes a fake audio file holding `key=value` lines, creating parent
/// directories. Read it back with [`StubTagReader`].
///
/// Files with equal fields have equal bytes, and therefore equal digests.
pub fn write_fixture(root: &Path, relative: &str, fields: &[(&str, &str)]) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create fixture directory");
    }
    let body: String = fields.iter().map(|(k, v)| format!("{k}={v}\n")).collect();
    std::fs::write(&path, body).expect("Failed to write fixture");
    path
}

/// Tag reader for files written by [`write_fixture`].
///
/// A file without a `title` line is treated as unreadable.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubTagReader;

impl TagReader for StubTagReader {
    fn read(&self, path: &Path) -> anyhow::Result<TrackMetadata> {
        let contents = std::fs::read_to_string(path).context("Failed to read fixture")?;
        let field = |key: &str| {
            contents.lines().find_map(|line| {
                line.split_once('=')
                    .filter(|(k, _)| *k == key)
                    .map(|(_, v)| v.to_string())
            })
        };

        let Some(title) = field("title") else {
            bail!("No title in {}", path.display());
        };
        let artist = field("artist").unwrap_or_else(|| UNKNOWN_ARTIST.to_string());

        Ok(TrackMetadata {
            title,
            album_artist: field("album_artist").unwrap_or_else(|| artist.clone()),
            artist,
            album: field("album").unwrap_or_else(|| UNKNOWN_ALBUM.to_string()),
            year: field("year").and_then(|y| y.parse().ok()),
            duration: field("duration").and_then(|d| d.parse().ok()).unwrap_or(180),
            lyrics: field("lyrics"),
            explicit: field("explicit").is_some_and(|e| e == "1"),
            genres: field("genre")
                .map(|g| g.split(',').map(str::to_string).collect())
                .unwrap_or_default(),
        })
    }
}

/// An ended session of `title` by "Test Artist" on "Test Album".
pub fn mock_snapshot(title: &str, length_secs: u64, listened: Duration) -> SessionSnapshot {
    let started_at = Utc
        .with_ymd_and_hms(2024, 6, 1, 20, 0, 0)
        .single()
        .expect("valid timestamp");
    let ended_at = started_at
        + chrono::Duration::from_std(listened).expect("listened time fits chrono");

    SessionSnapshot {
        player: "org.mpris.MediaPlayer2.test".to_string(),
        title: title.to_string(),
        artists: vec!["Test Artist".to_string()],
        album: "Test Album".to_string(),
        art_url: None,
        length: Duration::from_secs(length_secs),
        listened,
        started_at,
        ended_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_temp_db_creates_working_database() {
        let (pool, _dir) = temp_db().await;

        // Should be able to query
        let tracks = crate::db::get_all_tracks(&pool).await.unwrap();
        assert!(tracks.is_empty());
    }

    #[tokio::test]
    async fn test_insert_mock_track() {
        let (pool, _dir) = temp_db().await;

        let id = insert_mock_track(&pool, "Song", 120).await;
        assert!(id > 0);

        let tracks = crate::db::get_all_tracks(&pool).await.unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].duration, 120);
    }

    #[test]
    fn test_stub_reader_parses_fixture() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(
            dir.path(),
            "x/y.mp3",
            &[("title", "T"), ("artist", "A"), ("year", "1987"), ("genre", "Rock,Pop")],
        );

        let meta = StubTagReader.read(&path).unwrap();
        assert_eq!(meta.title, "T");
        assert_eq!(meta.album_artist, "A");
        assert_eq!(meta.album, UNKNOWN_ALBUM);
        assert_eq!(meta.year, Some(1987));
        assert_eq!(meta.genres, vec!["Rock".to_string(), "Pop".to_string()]);
    }

    #[test]
    fn test_stub_reader_rejects_untitled_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path(), "z.mp3", &[("artist", "A")]);
        assert!(StubTagReader.read(&path).is_err());
    }
}
