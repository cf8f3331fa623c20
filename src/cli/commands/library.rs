//! Library and listening-history queries.

use std::path::Path;

use tokio::runtime::Runtime;

use super::open_db;
use crate::db;

/// List library tracks, optionally filtered by title or lyrics
pub fn cmd_tracks(rt: &Runtime, db_path: &Path, search: Option<&str>) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = open_db(db_path).await?;
        let tracks = match search {
            Some(query) => db::search_tracks(&pool, query).await?,
            None => db::get_all_tracks(&pool).await?,
        };

        for track in &tracks {
            let artists = db::track_artists(&pool, track.id).await?;
            let names: Vec<&str> = artists.iter().map(|a| a.name.as_str()).collect();
            println!(
                "{:>5}  {} - {} ({})",
                track.id,
                names.join(", "),
                track.name,
                format_duration(track.duration)
            );
        }
        println!("{} tracks", tracks.len());
        Ok(())
    })
}

/// Show a user's most recent listens
pub fn cmd_listens(rt: &Runtime, db_path: &Path, user_id: i64, limit: i64) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = open_db(db_path).await?;
        let listens = db::recent_listens(&pool, user_id, limit).await?;

        if listens.is_empty() {
            println!("No listens recorded yet.");
        }
        for listen in listens {
            println!(
                "{}  {} ({})",
                listen.timestamp,
                listen.track_name,
                format_duration(listen.listen_seconds)
            );
        }
        Ok(())
    })
}

/// Show the tracks with the most listens
pub fn cmd_top(rt: &Runtime, db_path: &Path, limit: i64) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = open_db(db_path).await?;
        for (rank, track) in db::top_tracks(&pool, limit).await?.iter().enumerate() {
            println!("{:>3}. {} ({} plays)", rank + 1, track.name, track.listen_count);
        }
        Ok(())
    })
}

/// `m:ss`
fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
