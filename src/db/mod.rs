//! Database module for library and listening-history persistence.
//!
//! Uses SQLx with SQLite for lightweight, embedded database storage.
//! Provides async operations for:
//! - Batched artist/album/track commits from the ingestor ([`library`])
//! - Column patches for the update ingestion modes
//! - Listen records and listening statistics ([`listens`])
//!
//! # Example
//!
//! ```ignore
//! use media_minder::db::{init_db, find_tracks_by_name};
//!
//! let pool = init_db("sqlite:data.db").await?;
//! let tracks = find_tracks_by_name(&pool, "Song A").await?;
//! ```

pub mod library;
pub mod listens;

use std::path::Path;

use sqlx::migrate::MigrateDatabase;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

pub use library::{
    NewTrack, TrackKey, TrackUpdates, album_artists, count_tracks, existing_digests, find_tracks_by_name,
    get_all_artists, get_all_tracks, insert_tracks, recent_tracks, search_tracks, top_tracks,
    track_artists, track_tags, update_tracks, upsert_albums, upsert_artists,
};
pub use listens::{NewListen, insert_listen, listens_for_track, recent_listens};

/// Default database filename.
pub const DEFAULT_DB_NAME: &str = "data.db";

/// Build a SQLite database URL from an optional path.
///
/// If no path is provided, uses [`DEFAULT_DB_NAME`] in the current directory.
pub fn db_url(path: Option<&Path>) -> String {
    match path {
        Some(p) => format!("sqlite:{}", p.display()),
        None => format!("sqlite:{}", DEFAULT_DB_NAME),
    }
}

/// Initialize the database connection pool and run migrations.
///
/// Creates the database file if it doesn't exist, establishes a connection
/// pool with up to 5 connections, and runs all pending migrations.
///
/// # Errors
///
/// Returns an error if:
/// - Database creation fails
/// - Connection cannot be established
/// - Migration fails
pub async fn init_db(db_url: &str) -> crate::error::Result<SqlitePool> {
    if !sqlx::Sqlite::database_exists(db_url).await.unwrap_or(false) {
        sqlx::Sqlite::create_database(db_url).await?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// Open (and create if needed) the database file at `path`.
///
/// The parent directory is created first so a fresh data directory works.
pub async fn open(path: &Path) -> crate::error::Result<SqlitePool> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        std::fs::create_dir_all(dir)?;
    }
    init_db(&db_url(Some(path))).await
}
