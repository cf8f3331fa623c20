//! Listening history.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqlitePool;

use crate::model::{Listen, ListenWithTrack};

/// A listen about to be recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewListen {
    pub user_id: i64,
    pub track_id: i64,
    pub listen_seconds: i64,
    pub timestamp: DateTime<Utc>,
}

/// Append a listen in its own transaction and return the new row id.
pub async fn insert_listen(pool: &SqlitePool, listen: &NewListen) -> sqlx::Result<i64> {
    let mut tx = pool.begin().await?;

    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO listens (user_id, track_id, listen_seconds, timestamp)
        VALUES (?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(listen.user_id)
    .bind(listen.track_id)
    .bind(listen.listen_seconds)
    .bind(listen.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true))
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(id)
}

/// A user's most recent listens, newest first.
pub async fn recent_listens(
    pool: &SqlitePool,
    user_id: i64,
    limit: i64,
) -> sqlx::Result<Vec<ListenWithTrack>> {
    sqlx::query_as::<_, ListenWithTrack>(
        r#"
        SELECT l.id, l.track_id, t.name AS track_name, l.listen_seconds, l.timestamp
        FROM listens l
        JOIN tracks t ON t.id = l.track_id
        WHERE l.user_id = ?
        ORDER BY l.timestamp DESC, l.id DESC
        LIMIT ?
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn listens_for_track(pool: &SqlitePool, track_id: i64) -> sqlx::Result<Vec<Listen>> {
    sqlx::query_as::<_, Listen>(
        "SELECT id, user_id, track_id, listen_seconds, timestamp FROM listens WHERE track_id = ? ORDER BY id",
    )
    .bind(track_id)
    .fetch_all(pool)
    .await
}
