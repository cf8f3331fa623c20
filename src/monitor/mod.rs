//! Playback monitoring for MPRIS media players.
//!
//! - [`bus`]: session bus subscription and sender resolution
//! - [`props`]: typed decoding of property changes
//! - [`session`]: per-player play-time state machine
//! - [`registry`]: sessions, name cache and allow-list
//!
//! The [`Monitor`] consumes [`BusEvent`]s one at a time. When a player moves
//! to a new track, the ended session is handed to a [`TrackEndHandler`] on a
//! detached task so slow network calls never hold up the event loop.

pub mod bus;
pub mod props;
pub mod registry;
pub mod session;

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub use bus::SignalListener;
pub use props::{PlaybackStatus, PropertyChanges, TrackInfo};
pub use registry::{PlayerFilter, SessionRegistry};
pub use session::{PlaybackState, PlayerSession, SessionSnapshot};

/// A normalized notification from the bus listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    /// An allowed player changed track metadata and/or playback status
    PropertiesChanged {
        player: String,
        changes: PropertyChanges,
    },
    /// An allowed player left the bus
    PlayerVanished { player: String },
}

/// Receives every session whose track has ended.
#[async_trait]
pub trait TrackEndHandler: Send + Sync + 'static {
    async fn on_track_end(&self, snapshot: SessionSnapshot);
}

/// Drives player sessions from bus events.
pub struct Monitor {
    registry: SessionRegistry,
    handler: Arc<dyn TrackEndHandler>,
}

impl Monitor {
    pub fn new(handler: Arc<dyn TrackEndHandler>) -> Self {
        Self {
            registry: SessionRegistry::new(),
            handler,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Consume events until the listener closes the channel.
    pub async fn run(mut self, mut events: mpsc::Receiver<BusEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event);
        }
        tracing::info!(target: "monitor", "Event stream closed");
    }

    pub fn handle_event(&mut self, event: BusEvent) -> Option<JoinHandle<()>> {
        self.handle_event_at(event, Instant::now(), Utc::now())
    }

    /// Apply one event as of `now`.
    ///
    /// Track metadata is applied before the playback status of the same
    /// signal. Returns the handle of the spawned track-end task, if any.
    pub fn handle_event_at(
        &mut self,
        event: BusEvent,
        now: Instant,
        wall: DateTime<Utc>,
    ) -> Option<JoinHandle<()>> {
        match event {
            BusEvent::PropertiesChanged { player, changes } => {
                let session = self.registry.session_mut(&player, now, wall);

                let ended = changes.track.and_then(|track| {
                    if session.track().same_track(&track) {
                        tracing::debug!(target: "monitor", %player, title = %track.title, "Metadata refreshed");
                    } else {
                        tracing::info!(
                            target: "monitor",
                            %player,
                            title = %track.title,
                            artists = ?track.artists,
                            "Now playing"
                        );
                    }
                    session.change_track(track, now, wall)
                });

                if let Some(status) = changes.status {
                    session.set_status(status, now);
                    tracing::info!(
                        target: "monitor",
                        %player,
                        ?status,
                        title = %session.track().title,
                        "Playback status changed"
                    );
                }

                ended.map(|snapshot| self.spawn_track_end(snapshot))
            }
            BusEvent::PlayerVanished { player } => {
                if let Some(session) = self.registry.remove(&player) {
                    tracing::info!(
                        target: "monitor",
                        %player,
                        played = ?session.total_play_time(now),
                        "Dropped session"
                    );
                }
                None
            }
        }
    }

    fn spawn_track_end(&self, snapshot: SessionSnapshot) -> JoinHandle<()> {
        tracing::info!(
            target: "monitor",
            player = %snapshot.player,
            title = %snapshot.title,
            listened = ?snapshot.listened,
            "Track ended"
        );
        let handler = Arc::clone(&self.handler);
        tokio::spawn(async move { handler.on_track_end(snapshot).await })
    }
}
