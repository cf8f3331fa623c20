//! Track-end evaluation: persist the listen, then decide on a scrobble.
//!
//! Each step isolates its failure. A Listen is written for every matched
//! track; recording lookup, authentication and submission only run for
//! listens past the threshold, and a failing step skips the ones after it
//! without touching the Listen row.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use super::matcher::match_track;
use crate::db::{self, NewListen};
use crate::enrichment::{RecordingLookup, RecordingQuery, ScrobbleAck, ScrobbleRequest, Scrobbler};
use crate::monitor::{SessionSnapshot, TrackEndHandler};

/// Share of the track that must have been heard, in percent (exclusive).
pub const SCROBBLE_THRESHOLD_PERCENT: f64 = 50.0;

/// How far a track-end evaluation got.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackEndOutcome {
    /// The title is not in the library
    NotInLibrary,
    /// The library query failed
    MatchFailed,
    /// Writing the Listen failed
    ListenFailed,
    /// Listen written, not enough heard to scrobble
    BelowThreshold,
    /// Listen written, no recording found
    LookupMissed,
    /// Listen written, recording lookup failed
    LookupFailed,
    /// Listen written, could not obtain a session key
    AuthFailed,
    /// Listen written, submission failed
    SubmitFailed,
    /// Listen written and scrobbled
    Scrobbled(ScrobbleAck),
}

/// Whether `listened` out of `length` is strictly more than half the track.
///
/// Unknown (zero) lengths are never eligible.
pub fn is_scrobble_eligible(listened: Duration, length: Duration) -> bool {
    if length.is_zero() {
        return false;
    }
    let percentage = listened.as_secs_f64() / length.as_secs_f64() * 100.0;
    percentage > SCROBBLE_THRESHOLD_PERCENT
}

/// Runs on every track change reported by the monitor.
pub struct ScrobblePipeline {
    pool: SqlitePool,
    user_id: i64,
    lookup: Arc<dyn RecordingLookup>,
    scrobbler: Arc<dyn Scrobbler>,
}

impl ScrobblePipeline {
    pub fn new(
        pool: SqlitePool,
        user_id: i64,
        lookup: Arc<dyn RecordingLookup>,
        scrobbler: Arc<dyn Scrobbler>,
    ) -> Self {
        Self {
            pool,
            user_id,
            lookup,
            scrobbler,
        }
    }

    /// Evaluate one ended session.
    pub async fn process(&self, snapshot: &SessionSnapshot) -> TrackEndOutcome {
        let track = match match_track(&self.pool, &snapshot.title).await {
            Ok(Some(track)) => track,
            Ok(None) => {
                debug!(target: "scrobble", title = %snapshot.title, "Track not in library");
                return TrackEndOutcome::NotInLibrary;
            }
            Err(e) => {
                warn!(target: "scrobble", title = %snapshot.title, error = %e, "Track lookup failed");
                return TrackEndOutcome::MatchFailed;
            }
        };

        let listen = NewListen {
            user_id: self.user_id,
            track_id: track.id,
            listen_seconds: i64::try_from(snapshot.listened.as_secs()).unwrap_or(i64::MAX),
            timestamp: snapshot.ended_at,
        };
        match db::insert_listen(&self.pool, &listen).await {
            Ok(id) => info!(
                target: "scrobble",
                listen_id = id,
                track = %track.name,
                seconds = listen.listen_seconds,
                "Listen recorded"
            ),
            Err(e) => {
                warn!(target: "scrobble", track = %track.name, error = %e, "Failed to record listen");
                return TrackEndOutcome::ListenFailed;
            }
        }

        if !is_scrobble_eligible(snapshot.listened, snapshot.length) {
            debug!(
                target: "scrobble",
                track = %track.name,
                listened = snapshot.listened.as_secs(),
                length = snapshot.length.as_secs(),
                "Below scrobble threshold"
            );
            return TrackEndOutcome::BelowThreshold;
        }

        self.scrobble(snapshot).await
    }

    async fn scrobble(&self, snapshot: &SessionSnapshot) -> TrackEndOutcome {
        let query = RecordingQuery {
            title: snapshot.title.clone(),
            artist: snapshot.primary_artist().map(str::to_string),
            album: Some(snapshot.album.clone()).filter(|a| !a.is_empty()),
        };
        let mbid = match self.lookup.search_recording(&query).await {
            Ok(Some(mbid)) => mbid,
            Ok(None) => {
                info!(target: "scrobble", title = %snapshot.title, "No recording found, not scrobbling");
                return TrackEndOutcome::LookupMissed;
            }
            Err(e) => {
                warn!(target: "scrobble", title = %snapshot.title, error = %e, "Recording lookup failed");
                return TrackEndOutcome::LookupFailed;
            }
        };

        let session_key = match self.scrobbler.authenticate().await {
            Ok(key) => key,
            Err(e) => {
                warn!(target: "scrobble", error = %e, "Scrobbler authentication failed");
                return TrackEndOutcome::AuthFailed;
            }
        };

        let request = scrobble_request(snapshot, mbid);
        match self.scrobbler.scrobble(&request, &session_key).await {
            Ok(ack) => {
                info!(
                    target: "scrobble",
                    artist = %request.artist,
                    track = %request.track,
                    accepted = ack.accepted,
                    ignored = ack.ignored,
                    "Scrobbled"
                );
                TrackEndOutcome::Scrobbled(ack)
            }
            Err(e) => {
                warn!(target: "scrobble", track = %request.track, error = %e, "Scrobble submission failed");
                TrackEndOutcome::SubmitFailed
            }
        }
    }
}

fn scrobble_request(snapshot: &SessionSnapshot, mbid: String) -> ScrobbleRequest {
    ScrobbleRequest {
        artist: snapshot.primary_artist().unwrap_or_default().to_string(),
        track: snapshot.title.clone(),
        timestamp: snapshot.started_at.timestamp(),
        album: Some(snapshot.album.clone()).filter(|a| !a.is_empty()),
        mbid: Some(mbid),
        duration: snapshot.listened.as_secs(),
    }
}

#[async_trait]
impl TrackEndHandler for ScrobblePipeline {
    async fn on_track_end(&self, snapshot: SessionSnapshot) {
        let outcome = self.process(&snapshot).await;
        debug!(target: "scrobble", player = %snapshot.player, ?outcome, "Track end evaluated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::EnrichmentError;
    use crate::enrichment::traits::mocks::{CallLog, MockLookup, MockScrobbler};
    use crate::library::{IngestMode, Ingestor};
    use crate::monitor::{BusEvent, Monitor, PlaybackStatus, PropertyChanges, TrackInfo};
    use crate::test_utils::{
        StubTagReader, insert_mock_track, mock_snapshot, temp_db, write_fixture,
    };
    use chrono::Utc;
    use std::time::Instant;
    use tempfile::TempDir;

    const PLAYER: &str = "org.mpris.MediaPlayer2.vlc";

    fn pipeline(
        pool: &SqlitePool,
        lookup: MockLookup,
        scrobbler: Arc<MockScrobbler>,
    ) -> ScrobblePipeline {
        ScrobblePipeline::new(pool.clone(), 1, Arc::new(lookup), scrobbler)
    }

    fn now_playing(title: &str, length: u64) -> BusEvent {
        BusEvent::PropertiesChanged {
            player: PLAYER.to_string(),
            changes: PropertyChanges {
                track: Some(TrackInfo {
                    title: title.to_string(),
                    artists: vec!["Band".to_string()],
                    album: "Record".to_string(),
                    art_url: None,
                    length: Duration::from_secs(length),
                }),
                ..Default::default()
            },
        }
    }

    fn playing() -> BusEvent {
        BusEvent::PropertiesChanged {
            player: PLAYER.to_string(),
            changes: PropertyChanges {
                status: Some(PlaybackStatus::Playing),
                ..Default::default()
            },
        }
    }

    /// A database holding "Song A" ingested from a tagged file.
    async fn ingested_library() -> (SqlitePool, TempDir, TempDir, i64) {
        let (pool, db_dir) = temp_db().await;
        let music = tempfile::tempdir().unwrap();
        write_fixture(
            music.path(),
            "band/record/a.mp3",
            &[
                ("title", "Song A"),
                ("artist", "Band"),
                ("album", "Record"),
                ("duration", "120"),
            ],
        );

        let report = Ingestor::with_reader(pool.clone(), Arc::new(StubTagReader))
            .ingest(music.path(), IngestMode::AddNew)
            .await
            .unwrap();
        assert_eq!(report.tracks_inserted, 1);

        let track_id = db::find_tracks_by_name(&pool, "Song A").await.unwrap()[0].id;
        (pool, db_dir, music, track_id)
    }

    /// Play "Song A" for 72 of its 120 seconds, then switch to another track.
    async fn play_song_a(pipeline: ScrobblePipeline) {
        let mut monitor = Monitor::new(Arc::new(pipeline));
        let t0 = Instant::now();
        let wall = Utc::now();

        assert!(monitor.handle_event_at(now_playing("Song A", 120), t0, wall).is_none());
        assert!(monitor.handle_event_at(playing(), t0, wall).is_none());
        let handle = monitor
            .handle_event_at(now_playing("Other", 200), t0 + Duration::from_secs(72), wall)
            .expect("track change spawns a task");
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_monitor_to_scrobble_for_ingested_track() {
        let (pool, _db_dir, _music, track_id) = ingested_library().await;
        let calls = CallLog::default();
        let scrobbler = Arc::new(MockScrobbler::new(calls.clone()));

        play_song_a(pipeline(&pool, MockLookup::found("mbid-a", calls.clone()), scrobbler.clone())).await;

        let listens = db::listens_for_track(&pool, track_id).await.unwrap();
        assert_eq!(listens.len(), 1);
        assert_eq!(listens[0].listen_seconds, 72);
        assert_eq!(
            *calls.lock(),
            vec![
                "lookup:Song A".to_string(),
                "authenticate".to_string(),
                "scrobble:Song A:mock-session-key".to_string(),
            ]
        );

        let submitted = scrobbler.submitted.lock();
        assert_eq!(submitted[0].artist, "Band");
        assert_eq!(submitted[0].album.as_deref(), Some("Record"));
        assert_eq!(submitted[0].mbid.as_deref(), Some("mbid-a"));
        assert_eq!(submitted[0].duration, 72);
    }

    #[tokio::test]
    async fn test_monitor_records_listen_when_lookup_misses() {
        let (pool, _db_dir, _music, track_id) = ingested_library().await;
        let calls = CallLog::default();

        play_song_a(pipeline(
            &pool,
            MockLookup::no_matches(calls.clone()),
            Arc::new(MockScrobbler::new(calls.clone())),
        ))
        .await;

        let listens = db::listens_for_track(&pool, track_id).await.unwrap();
        assert_eq!(listens.len(), 1);
        assert_eq!(listens[0].listen_seconds, 72);
        assert_eq!(*calls.lock(), vec!["lookup:Song A".to_string()]);
    }

    #[test]
    fn test_threshold_boundary() {
        let length = Duration::from_secs(100);
        assert!(!is_scrobble_eligible(Duration::from_secs(50), length));
        assert!(is_scrobble_eligible(Duration::from_millis(50_010), length));
        assert!(is_scrobble_eligible(length, length));
        assert!(!is_scrobble_eligible(Duration::ZERO, length));
    }

    #[test]
    fn test_zero_length_never_eligible() {
        assert!(!is_scrobble_eligible(Duration::from_secs(600), Duration::ZERO));
    }

    #[tokio::test]
    async fn test_end_to_end_scrobble() {
        let (pool, _dir) = temp_db().await;
        let track_id = insert_mock_track(&pool, "Song", 120).await;
        let calls = CallLog::default();
        let scrobbler = Arc::new(MockScrobbler::new(calls.clone()));
        let pipeline = pipeline(&pool, MockLookup::found("mbid-1", calls.clone()), scrobbler.clone());

        let snapshot = mock_snapshot("Song", 120, Duration::from_secs(72));
        let outcome = pipeline.process(&snapshot).await;

        assert_eq!(
            outcome,
            TrackEndOutcome::Scrobbled(ScrobbleAck {
                accepted: 1,
                ignored: 0
            })
        );

        let listens = db::listens_for_track(&pool, track_id).await.unwrap();
        assert_eq!(listens.len(), 1);
        assert_eq!(listens[0].listen_seconds, 72);
        assert_eq!(listens[0].user_id, 1);
        assert_eq!(listens[0].timestamp, "2024-06-01T20:01:12Z");

        assert_eq!(
            *calls.lock(),
            vec![
                "lookup:Song".to_string(),
                "authenticate".to_string(),
                "scrobble:Song:mock-session-key".to_string(),
            ]
        );

        let submitted = scrobbler.submitted.lock();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].artist, "Test Artist");
        assert_eq!(submitted[0].album.as_deref(), Some("Test Album"));
        assert_eq!(submitted[0].mbid.as_deref(), Some("mbid-1"));
        assert_eq!(submitted[0].timestamp, snapshot.started_at.timestamp());
        assert_eq!(submitted[0].duration, 72);
    }

    #[tokio::test]
    async fn test_lookup_miss_skips_submission() {
        let (pool, _dir) = temp_db().await;
        let track_id = insert_mock_track(&pool, "Song", 120).await;
        let calls = CallLog::default();
        let scrobbler = Arc::new(MockScrobbler::new(calls.clone()));
        let pipeline = pipeline(&pool, MockLookup::no_matches(calls.clone()), scrobbler.clone());

        let outcome = pipeline
            .process(&mock_snapshot("Song", 120, Duration::from_secs(72)))
            .await;

        assert_eq!(outcome, TrackEndOutcome::LookupMissed);
        assert_eq!(*calls.lock(), vec!["lookup:Song".to_string()]);
        assert!(scrobbler.submitted.lock().is_empty());
        assert_eq!(db::listens_for_track(&pool, track_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_lookup_error_skips_submission() {
        let (pool, _dir) = temp_db().await;
        insert_mock_track(&pool, "Song", 120).await;
        let calls = CallLog::default();
        let lookup = MockLookup::with_error(EnrichmentError::RateLimited, calls.clone());
        let pipeline = pipeline(&pool, lookup, Arc::new(MockScrobbler::new(calls.clone())));

        let outcome = pipeline
            .process(&mock_snapshot("Song", 120, Duration::from_secs(100)))
            .await;

        assert_eq!(outcome, TrackEndOutcome::LookupFailed);
        assert_eq!(calls.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_auth_failure_keeps_listen() {
        let (pool, _dir) = temp_db().await;
        let track_id = insert_mock_track(&pool, "Song", 120).await;
        let calls = CallLog::default();
        let scrobbler = Arc::new(MockScrobbler::failing_auth(
            EnrichmentError::ApiError("4: Authentication Failed".to_string()),
            calls.clone(),
        ));
        let pipeline = pipeline(&pool, MockLookup::found("mbid-1", calls.clone()), scrobbler.clone());

        let outcome = pipeline
            .process(&mock_snapshot("Song", 120, Duration::from_secs(90)))
            .await;

        assert_eq!(outcome, TrackEndOutcome::AuthFailed);
        assert_eq!(
            *calls.lock(),
            vec!["lookup:Song".to_string(), "authenticate".to_string()]
        );
        assert_eq!(db::listens_for_track(&pool, track_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_short_listen_is_recorded_but_not_scrobbled() {
        let (pool, _dir) = temp_db().await;
        let track_id = insert_mock_track(&pool, "Song", 100).await;
        let calls = CallLog::default();
        let pipeline = pipeline(
            &pool,
            MockLookup::found("mbid-1", calls.clone()),
            Arc::new(MockScrobbler::new(calls.clone())),
        );

        let outcome = pipeline
            .process(&mock_snapshot("Song", 100, Duration::from_secs(50)))
            .await;

        assert_eq!(outcome, TrackEndOutcome::BelowThreshold);
        assert!(calls.lock().is_empty());
        let listens = db::listens_for_track(&pool, track_id).await.unwrap();
        assert_eq!(listens.len(), 1);
        assert_eq!(listens[0].listen_seconds, 50);
    }

    #[tokio::test]
    async fn test_unknown_track_does_nothing() {
        let (pool, _dir) = temp_db().await;
        let track_id = insert_mock_track(&pool, "Song", 120).await;
        let calls = CallLog::default();
        let pipeline = pipeline(
            &pool,
            MockLookup::found("mbid-1", calls.clone()),
            Arc::new(MockScrobbler::new(calls.clone())),
        );

        let outcome = pipeline
            .process(&mock_snapshot("Not In Library", 120, Duration::from_secs(120)))
            .await;

        assert_eq!(outcome, TrackEndOutcome::NotInLibrary);
        assert!(calls.lock().is_empty());
        assert!(db::listens_for_track(&pool, track_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_handler_records_listen() {
        let (pool, _dir) = temp_db().await;
        let track_id = insert_mock_track(&pool, "Song", 120).await;
        let calls = CallLog::default();
        let pipeline = pipeline(
            &pool,
            MockLookup::no_matches(calls.clone()),
            Arc::new(MockScrobbler::new(calls.clone())),
        );

        pipeline
            .on_track_end(mock_snapshot("Song", 120, Duration::from_secs(30)))
            .await;

        assert_eq!(db::listens_for_track(&pool, track_id).await.unwrap().len(), 1);
    }
}
