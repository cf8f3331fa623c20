//! Per-player playback session and listening-time accounting.
//!
//! Time is passed in explicitly (`now: Instant`) so the state machine can be
//! driven deterministically in tests. [`PlayerSession::total_play_time`] is
//! the single source of truth for how long the current track has played.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use super::props::{PlaybackStatus, TrackInfo};

/// Playback state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

impl From<PlaybackStatus> for PlaybackState {
    fn from(status: PlaybackStatus) -> Self {
        match status {
            PlaybackStatus::Playing => Self::Playing,
            PlaybackStatus::Paused => Self::Paused,
            PlaybackStatus::Stopped => Self::Stopped,
        }
    }
}

/// Immutable copy of a session taken when its track ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub player: String,
    pub title: String,
    pub artists: Vec<String>,
    pub album: String,
    pub art_url: Option<String>,
    pub length: Duration,
    /// Time actually spent playing, frozen at the track change
    pub listened: Duration,
    /// When the track started
    pub started_at: DateTime<Utc>,
    /// When the track ended
    pub ended_at: DateTime<Utc>,
}

impl SessionSnapshot {
    pub fn primary_artist(&self) -> Option<&str> {
        self.artists.first().map(String::as_str)
    }
}

/// Live state for one player.
#[derive(Debug, Clone)]
pub struct PlayerSession {
    player: String,
    track: TrackInfo,
    state: PlaybackState,
    last_resume: Instant,
    accumulated: Duration,
    started_at: DateTime<Utc>,
}

impl PlayerSession {
    pub fn new(player: impl Into<String>, now: Instant, wall: DateTime<Utc>) -> Self {
        Self {
            player: player.into(),
            track: TrackInfo::default(),
            state: PlaybackState::Stopped,
            last_resume: now,
            accumulated: Duration::ZERO,
            started_at: wall,
        }
    }

    pub fn player(&self) -> &str {
        &self.player
    }

    pub fn track(&self) -> &TrackInfo {
        &self.track
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Apply a reported playback status.
    ///
    /// Re-entering the current state changes nothing.
    pub fn set_status(&mut self, status: PlaybackStatus, now: Instant) {
        let next = PlaybackState::from(status);
        if next == self.state {
            return;
        }

        match (self.state, next) {
            (PlaybackState::Playing, _) => {
                self.accumulated += now.saturating_duration_since(self.last_resume);
            }
            (_, PlaybackState::Playing) => {
                self.last_resume = now;
            }
            _ => {}
        }
        self.state = next;
    }

    pub fn play_at(&mut self, now: Instant) {
        self.set_status(PlaybackStatus::Playing, now);
    }

    pub fn pause_at(&mut self, now: Instant) {
        self.set_status(PlaybackStatus::Paused, now);
    }

    /// Time the current track has spent playing as of `now`.
    pub fn total_play_time(&self, now: Instant) -> Duration {
        match self.state {
            PlaybackState::Playing => {
                self.accumulated + now.saturating_duration_since(self.last_resume)
            }
            _ => self.accumulated,
        }
    }

    /// Copy the session with its listened time frozen at `now`.
    pub fn snapshot(&self, now: Instant, wall: DateTime<Utc>) -> SessionSnapshot {
        SessionSnapshot {
            player: self.player.clone(),
            title: self.track.title.clone(),
            artists: self.track.artists.clone(),
            album: self.track.album.clone(),
            art_url: self.track.art_url.clone(),
            length: self.track.length,
            listened: self.total_play_time(now),
            started_at: self.started_at,
            ended_at: wall,
        }
    }

    /// Switch to a new track.
    ///
    /// Returns the snapshot of the track that ended, or `None` when no track
    /// was loaded yet. The play clock restarts at `now` and the playback
    /// state carries over.
    ///
    /// Metadata repeating the current track only refreshes its fields.
    pub fn change_track(
        &mut self,
        track: TrackInfo,
        now: Instant,
        wall: DateTime<Utc>,
    ) -> Option<SessionSnapshot> {
        if !self.track.title.is_empty() && self.track.same_track(&track) {
            self.track = track;
            return None;
        }

        let ended = (!self.track.title.is_empty()).then(|| self.snapshot(now, wall));

        self.accumulated = Duration::ZERO;
        self.last_resume = now;
        self.started_at = wall;
        self.track = track;

        ended
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    fn track(title: &str, length: u64) -> TrackInfo {
        TrackInfo {
            title: title.to_string(),
            artists: vec!["Artist".to_string()],
            album: "Album".to_string(),
            art_url: None,
            length: secs(length),
        }
    }

    #[test]
    fn test_pause_resume_accumulates() {
        let t0 = Instant::now();
        let mut session = PlayerSession::new("vlc", t0, Utc::now());

        session.play_at(t0);
        session.pause_at(t0 + secs(10));
        session.play_at(t0 + secs(20));
        // Repeated Play does not reset the resume point
        session.play_at(t0 + secs(22));

        assert_eq!(session.total_play_time(t0 + secs(25)), secs(15));
    }

    #[test]
    fn test_repeated_metadata_is_not_a_track_change() {
        let t0 = Instant::now();
        let wall = Utc::now();
        let mut session = PlayerSession::new("vlc", t0, wall);

        assert!(session.change_track(track("Song", 120), t0, wall).is_none());
        session.play_at(t0);

        let with_art = TrackInfo {
            art_url: Some("file:///tmp/cover.jpg".to_string()),
            ..track("Song", 120)
        };
        assert!(session.change_track(with_art, t0 + secs(30), wall).is_none());
        assert_eq!(session.total_play_time(t0 + secs(40)), secs(40));
        assert_eq!(session.track().art_url.as_deref(), Some("file:///tmp/cover.jpg"));

        // Same title on another album is a different track
        let other_album = TrackInfo {
            album: "Live".to_string(),
            ..track("Song", 120)
        };
        let ended = session
            .change_track(other_album, t0 + secs(50), wall)
            .expect("album change ends the track");
        assert_eq!(ended.listened, secs(50));
        assert_eq!(ended.album, "Album");
    }

    #[test]
    fn test_stopped_also_stops_clock() {
        let t0 = Instant::now();
        let mut session = PlayerSession::new("vlc", t0, Utc::now());

        session.play_at(t0);
        session.set_status(PlaybackStatus::Stopped, t0 + secs(4));
        assert_eq!(session.state(), PlaybackState::Stopped);
        assert_eq!(session.total_play_time(t0 + secs(60)), secs(4));
    }

    #[test]
    fn test_repeated_pause_does_not_double_count() {
        let t0 = Instant::now();
        let mut session = PlayerSession::new("vlc", t0, Utc::now());

        session.play_at(t0);
        session.pause_at(t0 + secs(5));
        session.pause_at(t0 + secs(9));
        assert_eq!(session.total_play_time(t0 + secs(9)), secs(5));
    }

    #[test]
    fn test_first_track_has_no_snapshot() {
        let t0 = Instant::now();
        let mut session = PlayerSession::new("vlc", t0, Utc::now());
        assert!(session.change_track(track("First", 100), t0, Utc::now()).is_none());
        assert_eq!(session.track().title, "First");
    }

    #[test]
    fn test_track_change_freezes_and_resets() {
        let t0 = Instant::now();
        let start = Utc::now();
        let mut session = PlayerSession::new("spotify", t0, start);
        session.change_track(track("First", 100), t0, start);
        session.play_at(t0);

        let end = start + chrono::Duration::seconds(30);
        let snapshot = session
            .change_track(track("Second", 200), t0 + secs(30), end)
            .unwrap();

        assert_eq!(snapshot.title, "First");
        assert_eq!(snapshot.listened, secs(30));
        assert_eq!(snapshot.length, secs(100));
        assert_eq!(snapshot.started_at, start);
        assert_eq!(snapshot.ended_at, end);
        assert_eq!(snapshot.primary_artist(), Some("Artist"));

        // Still playing, new clock
        assert_eq!(session.state(), PlaybackState::Playing);
        assert_eq!(session.started_at(), end);
        assert_eq!(session.total_play_time(t0 + secs(35)), secs(5));
        assert_eq!(session.track().title, "Second");
    }

    #[test]
    fn test_snapshot_is_detached_from_session() {
        let t0 = Instant::now();
        let mut session = PlayerSession::new("vlc", t0, Utc::now());
        session.change_track(track("A", 100), t0, Utc::now());
        session.play_at(t0);

        let snapshot = session.snapshot(t0 + secs(10), Utc::now());
        session.pause_at(t0 + secs(50));
        assert_eq!(snapshot.listened, secs(10));
    }
}
