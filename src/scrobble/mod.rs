//! Scrobble pipeline.
//!
//! When a player changes track, the ended session is matched against the
//! library, a Listen is recorded, and listens past the threshold are
//! submitted to Last.fm with their MusicBrainz recording ID.

mod engine;
mod matcher;

pub use engine::{ScrobblePipeline, TrackEndOutcome, is_scrobble_eligible};
pub use matcher::match_track;
