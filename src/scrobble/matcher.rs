//! Match a playing track against the library.

use sqlx::SqlitePool;

use crate::db;
use crate::error::Result;
use crate::model::Track;

/// Find the library track titled exactly `title`.
///
/// Titles are not unique; the lowest id wins.
pub async fn match_track(pool: &SqlitePool, title: &str) -> Result<Option<Track>> {
    let mut tracks = db::find_tracks_by_name(pool, title).await?;
    if tracks.is_empty() {
        return Ok(None);
    }
    Ok(Some(tracks.swap_remove(0)))
}
