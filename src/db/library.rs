//! Artist, album, track and tag persistence.
//!
//! Each batch operation runs in its own transaction: either the whole batch
//! is committed or nothing is (the transaction rolls back on drop).

use std::collections::HashSet;

use sqlx::sqlite::SqlitePool;
use sqlx::{Sqlite, Transaction};

use crate::library::{AlbumDraft, ArtistDraft};
use crate::model::{Artist, Tag, Track, TrackPlays};

const TRACK_COLUMNS: &str =
    "id, album_id, name, duration, lyrics, is_explicit, file_path, content_digest";

/// A fully resolved track ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTrack {
    pub album_id: Option<i64>,
    pub name: String,
    pub duration: i64,
    pub lyrics: Option<String>,
    pub is_explicit: bool,
    pub file_path: String,
    pub content_digest: String,
    pub artist_ids: Vec<i64>,
    pub tags: Vec<String>,
}

/// Column used to find the existing row in the update ingestion modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKey {
    Name,
    FilePath,
    ContentDigest,
}

impl TrackKey {
    fn column(self) -> &'static str {
        match self {
            TrackKey::Name => "name",
            TrackKey::FilePath => "file_path",
            TrackKey::ContentDigest => "content_digest",
        }
    }

    fn value(self, track: &NewTrack) -> &str {
        match self {
            TrackKey::Name => &track.name,
            TrackKey::FilePath => &track.file_path,
            TrackKey::ContentDigest => &track.content_digest,
        }
    }
}

/// Load every content digest already in the library.
pub async fn existing_digests(pool: &SqlitePool) -> sqlx::Result<HashSet<String>> {
    let rows: Vec<(String,)> = sqlx::query_as("SELECT content_digest FROM tracks")
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(|(d,)| d).collect())
}

/// Upsert artists by name in a single transaction and assign their ids.
///
/// An artist that already exists keeps its row; missing bio/image fields are
/// filled from the draft.
pub async fn upsert_artists(pool: &SqlitePool, artists: &mut [ArtistDraft]) -> sqlx::Result<()> {
    let mut tx = pool.begin().await?;

    for artist in artists.iter_mut() {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO artists (name, bio, image_uri)
            VALUES (?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                bio = COALESCE(artists.bio, excluded.bio),
                image_uri = COALESCE(artists.image_uri, excluded.image_uri)
            RETURNING id
            "#,
        )
        .bind(&artist.name)
        .bind(&artist.bio)
        .bind(&artist.image_uri)
        .fetch_one(&mut *tx)
        .await?;
        artist.id = Some(id);
    }

    tx.commit().await
}

/// Upsert albums by name in a single transaction, assign their ids and link
/// their (already identified) artists.
pub async fn upsert_albums(pool: &SqlitePool, albums: &mut [AlbumDraft]) -> sqlx::Result<()> {
    let mut tx = pool.begin().await?;

    for album in albums.iter_mut() {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO albums (name, release_date, image_uri)
            VALUES (?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                release_date = COALESCE(albums.release_date, excluded.release_date),
                image_uri = COALESCE(albums.image_uri, excluded.image_uri)
            RETURNING id
            "#,
        )
        .bind(&album.name)
        .bind(&album.release_date)
        .bind(&album.image_uri)
        .fetch_one(&mut *tx)
        .await?;
        album.id = Some(id);

        for artist_id in album.artists.iter().filter_map(|a| a.id) {
            sqlx::query("INSERT OR IGNORE INTO album_artists (album_id, artist_id) VALUES (?, ?)")
                .bind(id)
                .bind(artist_id)
                .execute(&mut *tx)
                .await?;
        }
    }

    tx.commit().await
}

/// Insert new tracks with their artist and tag links in a single transaction.
///
/// A track whose digest is already stored is left untouched. Returns the
/// number of rows actually inserted.
pub async fn insert_tracks(pool: &SqlitePool, tracks: &[NewTrack]) -> sqlx::Result<usize> {
    let mut tx = pool.begin().await?;
    let mut inserted = 0;

    for track in tracks {
        let row: Option<(i64,)> = sqlx::query_as(
            r#"
            INSERT INTO tracks (album_id, name, duration, lyrics, is_explicit, file_path, content_digest)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(content_digest) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(track.album_id)
        .bind(&track.name)
        .bind(track.duration)
        .bind(&track.lyrics)
        .bind(track.is_explicit)
        .bind(&track.file_path)
        .bind(&track.content_digest)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((track_id,)) = row else {
            continue;
        };
        inserted += 1;

        for artist_id in &track.artist_ids {
            sqlx::query("INSERT OR IGNORE INTO track_artists (track_id, artist_id) VALUES (?, ?)")
                .bind(track_id)
                .bind(artist_id)
                .execute(&mut *tx)
                .await?;
        }

        for tag in &track.tags {
            let tag_id = upsert_tag(&mut tx, tag).await?;
            sqlx::query("INSERT OR IGNORE INTO track_tags (track_id, tag_id) VALUES (?, ?)")
                .bind(track_id)
                .bind(tag_id)
                .execute(&mut *tx)
                .await?;
        }
    }

    tx.commit().await?;
    Ok(inserted)
}

async fn upsert_tag(tx: &mut Transaction<'_, Sqlite>, name: &str) -> sqlx::Result<i64> {
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO tags (name) VALUES (?) ON CONFLICT(name) DO UPDATE SET name = excluded.name RETURNING id",
    )
    .bind(name)
    .fetch_one(&mut **tx)
    .await?;
    Ok(id)
}

/// Outcome of [`update_tracks`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackUpdates {
    /// Drafts that patched a row
    pub updated: usize,
    /// Drafts that matched no row
    pub unmatched: usize,
    /// Drafts skipped because their digest already belongs to another row
    pub conflicting: usize,
}

/// Patch existing rows matched by `key` in a single transaction.
///
/// Each draft patches at most one row. When several rows match (titles are
/// not unique), the row at the draft's file path is preferred, then the
/// lowest id.
pub async fn update_tracks(
    pool: &SqlitePool,
    key: TrackKey,
    tracks: &[NewTrack],
) -> sqlx::Result<TrackUpdates> {
    let find_sql = format!(
        r#"
        SELECT id FROM tracks
        WHERE {} = ?
        ORDER BY CASE WHEN file_path = ? THEN 0 ELSE 1 END, id
        LIMIT 1
        "#,
        key.column()
    );

    let mut tx = pool.begin().await?;
    let mut summary = TrackUpdates::default();

    for track in tracks {
        let target: Option<(i64,)> = sqlx::query_as(&find_sql)
            .bind(key.value(track))
            .bind(&track.file_path)
            .fetch_optional(&mut *tx)
            .await?;

        let Some((id,)) = target else {
            tracing::debug!(
                target: "library::ingest",
                key = key.column(),
                value = key.value(track),
                "No existing track to update"
            );
            summary.unmatched += 1;
            continue;
        };

        let taken: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM tracks WHERE content_digest = ? AND id <> ?")
                .bind(&track.content_digest)
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        if let Some((other,)) = taken {
            tracing::debug!(
                target: "library::ingest",
                track_id = id,
                other_id = other,
                path = %track.file_path,
                "Digest already belongs to another track, not updating"
            );
            summary.conflicting += 1;
            continue;
        }

        sqlx::query(
            r#"
            UPDATE tracks SET
                name = ?, duration = ?, lyrics = ?, is_explicit = ?,
                file_path = ?, content_digest = ?, album_id = ?
            WHERE id = ?
            "#,
        )
        .bind(&track.name)
        .bind(track.duration)
        .bind(&track.lyrics)
        .bind(track.is_explicit)
        .bind(&track.file_path)
        .bind(&track.content_digest)
        .bind(track.album_id)
        .bind(id)
        .execute(&mut *tx)
        .await?;
        summary.updated += 1;
    }

    tx.commit().await?;
    Ok(summary)
}

/// Tracks with exactly this title, oldest first.
pub async fn find_tracks_by_name(pool: &SqlitePool, name: &str) -> sqlx::Result<Vec<Track>> {
    sqlx::query_as::<_, Track>(&format!(
        "SELECT {TRACK_COLUMNS} FROM tracks WHERE name = ? ORDER BY id"
    ))
    .bind(name)
    .fetch_all(pool)
    .await
}

/// Get all tracks from the database.
pub async fn get_all_tracks(pool: &SqlitePool) -> sqlx::Result<Vec<Track>> {
    sqlx::query_as::<_, Track>(&format!("SELECT {TRACK_COLUMNS} FROM tracks ORDER BY id"))
        .fetch_all(pool)
        .await
}

pub async fn count_tracks(pool: &SqlitePool) -> sqlx::Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tracks")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Search titles and lyrics for a substring.
pub async fn search_tracks(pool: &SqlitePool, query: &str) -> sqlx::Result<Vec<Track>> {
    let pattern = format!("%{}%", query);
    sqlx::query_as::<_, Track>(&format!(
        "SELECT {TRACK_COLUMNS} FROM tracks WHERE name LIKE ? OR lyrics LIKE ? ORDER BY name"
    ))
    .bind(&pattern)
    .bind(&pattern)
    .fetch_all(pool)
    .await
}

/// The most recently added tracks.
pub async fn recent_tracks(pool: &SqlitePool, limit: i64) -> sqlx::Result<Vec<Track>> {
    sqlx::query_as::<_, Track>(&format!(
        "SELECT {TRACK_COLUMNS} FROM tracks ORDER BY id DESC LIMIT ?"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// The most listened tracks.
pub async fn top_tracks(pool: &SqlitePool, limit: i64) -> sqlx::Result<Vec<TrackPlays>> {
    sqlx::query_as::<_, TrackPlays>(
        r#"
        SELECT t.id, t.name, t.file_path, COUNT(*) AS listen_count
        FROM tracks t
        JOIN listens l ON t.id = l.track_id
        GROUP BY t.id
        ORDER BY listen_count DESC, t.id
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn get_all_artists(pool: &SqlitePool) -> sqlx::Result<Vec<Artist>> {
    sqlx::query_as::<_, Artist>("SELECT id, name, bio, image_uri FROM artists ORDER BY id")
        .fetch_all(pool)
        .await
}

/// Artists credited on a track.
pub async fn track_artists(pool: &SqlitePool, track_id: i64) -> sqlx::Result<Vec<Artist>> {
    sqlx::query_as::<_, Artist>(
        r#"
        SELECT a.id, a.name, a.bio, a.image_uri
        FROM artists a
        JOIN track_artists ta ON a.id = ta.artist_id
        WHERE ta.track_id = ?
        ORDER BY a.id
        "#,
    )
    .bind(track_id)
    .fetch_all(pool)
    .await
}

/// Artists credited on an album.
pub async fn album_artists(pool: &SqlitePool, album_id: i64) -> sqlx::Result<Vec<Artist>> {
    sqlx::query_as::<_, Artist>(
        r#"
        SELECT a.id, a.name, a.bio, a.image_uri
        FROM artists a
        JOIN album_artists aa ON a.id = aa.artist_id
        WHERE aa.album_id = ?
        ORDER BY a.id
        "#,
    )
    .bind(album_id)
    .fetch_all(pool)
    .await
}

pub async fn track_tags(pool: &SqlitePool, track_id: i64) -> sqlx::Result<Vec<Tag>> {
    sqlx::query_as::<_, Tag>(
        r#"
        SELECT t.id, t.name
        FROM tags t
        JOIN track_tags tt ON t.id = tt.tag_id
        WHERE tt.track_id = ?
        ORDER BY t.name
        "#,
    )
    .bind(track_id)
    .fetch_all(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{new_track, temp_db};

    #[tokio::test]
    async fn test_upsert_artists_reuses_existing_rows() {
        let (pool, _dir) = temp_db().await;

        let mut first = vec![ArtistDraft::named("Test Artist")];
        upsert_artists(&pool, &mut first).await.unwrap();
        let id1 = first[0].id.unwrap();

        let mut second = vec![
            ArtistDraft::named("Test Artist"),
            ArtistDraft::named("Another Artist"),
        ];
        upsert_artists(&pool, &mut second).await.unwrap();

        assert_eq!(second[0].id, Some(id1));
        assert_ne!(second[1].id, Some(id1));
        assert_eq!(get_all_artists(&pool).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_upsert_albums_links_artists() {
        let (pool, _dir) = temp_db().await;

        let mut artists = vec![ArtistDraft::named("Band")];
        upsert_artists(&pool, &mut artists).await.unwrap();

        let mut albums = vec![AlbumDraft {
            id: None,
            name: "Record".to_string(),
            release_date: Some("1999-01-01".to_string()),
            image_uri: None,
            artists: artists.clone(),
        }];
        upsert_albums(&pool, &mut albums).await.unwrap();

        let album_id = albums[0].id.unwrap();
        let linked = album_artists(&pool, album_id).await.unwrap();
        assert_eq!(linked.len(), 1);
        assert_eq!(linked[0].name, "Band");
    }

    #[tokio::test]
    async fn test_insert_tracks_skips_known_digest() {
        let (pool, _dir) = temp_db().await;

        let track = new_track("Song", "/music/song.mp3", "digest-1");
        assert_eq!(insert_tracks(&pool, &[track.clone()]).await.unwrap(), 1);
        assert_eq!(insert_tracks(&pool, &[track]).await.unwrap(), 0);
        assert_eq!(count_tracks(&pool).await.unwrap(), 1);

        let digests = existing_digests(&pool).await.unwrap();
        assert!(digests.contains("digest-1"));
    }

    #[tokio::test]
    async fn test_insert_tracks_writes_links() {
        let (pool, _dir) = temp_db().await;

        let mut artists = vec![ArtistDraft::named("Singer")];
        upsert_artists(&pool, &mut artists).await.unwrap();

        let track = NewTrack {
            artist_ids: vec![artists[0].id.unwrap()],
            tags: vec!["Jazz".to_string(), "Live".to_string()],
            ..new_track("Tune", "/music/tune.flac", "digest-2")
        };
        insert_tracks(&pool, &[track]).await.unwrap();

        let stored = find_tracks_by_name(&pool, "Tune").await.unwrap();
        assert_eq!(stored.len(), 1);
        let id = stored[0].id;

        let credited = track_artists(&pool, id).await.unwrap();
        assert_eq!(credited[0].name, "Singer");

        let tags: Vec<String> = track_tags(&pool, id)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(tags, vec!["Jazz".to_string(), "Live".to_string()]);
    }

    #[tokio::test]
    async fn test_update_tracks_by_path_counts_unmatched() {
        let (pool, _dir) = temp_db().await;

        insert_tracks(&pool, &[new_track("Old Title", "/music/a.mp3", "digest-a")])
            .await
            .unwrap();

        let patched = NewTrack {
            duration: 321,
            ..new_track("New Title", "/music/a.mp3", "digest-a")
        };
        let stray = new_track("Stray", "/music/missing.mp3", "digest-z");

        let summary = update_tracks(&pool, TrackKey::FilePath, &[patched, stray])
            .await
            .unwrap();
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.unmatched, 1);

        let tracks = get_all_tracks(&pool).await.unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].name, "New Title");
        assert_eq!(tracks[0].duration, 321);
    }

    #[tokio::test]
    async fn test_update_tracks_by_digest_moves_path() {
        let (pool, _dir) = temp_db().await;

        insert_tracks(&pool, &[new_track("Song", "/old/song.mp3", "digest-m")])
            .await
            .unwrap();

        let moved = new_track("Song", "/new/song.mp3", "digest-m");
        update_tracks(&pool, TrackKey::ContentDigest, &[moved])
            .await
            .unwrap();

        let tracks = get_all_tracks(&pool).await.unwrap();
        assert_eq!(tracks[0].file_path, "/new/song.mp3");
    }

    #[tokio::test]
    async fn test_update_by_name_patches_one_row_per_draft() {
        let (pool, _dir) = temp_db().await;

        insert_tracks(
            &pool,
            &[
                new_track("Intro", "/music/a/intro.mp3", "digest-a"),
                new_track("Intro", "/music/b/intro.mp3", "digest-b"),
            ],
        )
        .await
        .unwrap();

        let retagged = NewTrack {
            lyrics: Some("la la".to_string()),
            ..new_track("Intro", "/music/b/intro.mp3", "digest-b2")
        };
        let summary = update_tracks(&pool, TrackKey::Name, &[retagged])
            .await
            .unwrap();
        assert_eq!(summary.updated, 1);

        let tracks = get_all_tracks(&pool).await.unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].content_digest, "digest-a");
        assert_eq!(tracks[0].lyrics, None);
        assert_eq!(tracks[1].content_digest, "digest-b2");
        assert_eq!(tracks[1].lyrics.as_deref(), Some("la la"));
    }

    #[tokio::test]
    async fn test_update_by_name_falls_back_to_lowest_id() {
        let (pool, _dir) = temp_db().await;

        insert_tracks(
            &pool,
            &[
                new_track("Intro", "/music/a/intro.mp3", "digest-a"),
                new_track("Intro", "/music/b/intro.mp3", "digest-b"),
            ],
        )
        .await
        .unwrap();

        let elsewhere = new_track("Intro", "/music/c/intro.mp3", "digest-c");
        let summary = update_tracks(&pool, TrackKey::Name, &[elsewhere])
            .await
            .unwrap();
        assert_eq!(summary.updated, 1);

        let tracks = get_all_tracks(&pool).await.unwrap();
        assert_eq!(tracks[0].content_digest, "digest-c");
        assert_eq!(tracks[1].content_digest, "digest-b");
    }

    #[tokio::test]
    async fn test_update_skips_digest_owned_by_another_row() {
        let (pool, _dir) = temp_db().await;

        insert_tracks(
            &pool,
            &[
                new_track("Intro", "/music/a/intro.mp3", "digest-a"),
                new_track("Outro", "/music/b/outro.mp3", "digest-b"),
            ],
        )
        .await
        .unwrap();

        let clash = new_track("Intro", "/music/a/intro.mp3", "digest-b");
        let fine = NewTrack {
            duration: 99,
            ..new_track("Outro", "/music/b/outro.mp3", "digest-b")
        };
        let summary = update_tracks(&pool, TrackKey::Name, &[clash, fine])
            .await
            .unwrap();

        assert_eq!(
            summary,
            TrackUpdates {
                updated: 1,
                unmatched: 0,
                conflicting: 1
            }
        );
        let tracks = get_all_tracks(&pool).await.unwrap();
        assert_eq!(tracks[0].content_digest, "digest-a");
        assert_eq!(tracks[1].duration, 99);
    }

    #[tokio::test]
    async fn test_search_and_recent_tracks() {
        let (pool, _dir) = temp_db().await;

        let with_lyrics = NewTrack {
            lyrics: Some("la la moonlight".to_string()),
            ..new_track("First", "/m/1.mp3", "d1")
        };
        insert_tracks(&pool, &[with_lyrics, new_track("Moonlight", "/m/2.mp3", "d2")])
            .await
            .unwrap();

        let found = search_tracks(&pool, "moonlight").await.unwrap();
        assert_eq!(found.len(), 2);

        let recent = recent_tracks(&pool, 1).await.unwrap();
        assert_eq!(recent[0].name, "Moonlight");
    }
}
