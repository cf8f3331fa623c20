//! Player bookkeeping: sessions, bus name resolution and the allow-list.

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::session::PlayerSession;
use crate::error::Result;

/// Well-known name prefix shared by every MPRIS player.
pub const MPRIS_PREFIX: &str = "org.mpris.MediaPlayer2.";

/// Short player name (`spotify`) from a well-known bus name.
pub fn short_name(bus_name: &str) -> &str {
    bus_name.strip_prefix(MPRIS_PREFIX).unwrap_or(bus_name)
}

/// Owns the session of every player seen on the bus.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<String, PlayerSession>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The session for `player`, created on first use.
    pub fn session_mut(&mut self, player: &str, now: Instant, wall: DateTime<Utc>) -> &mut PlayerSession {
        self.sessions
            .entry(player.to_string())
            .or_insert_with(|| PlayerSession::new(player, now, wall))
    }

    pub fn get(&self, player: &str) -> Option<&PlayerSession> {
        self.sessions.get(player)
    }

    pub fn remove(&mut self, player: &str) -> Option<PlayerSession> {
        self.sessions.remove(player)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Configured allow-list of players.
///
/// Entries may be short (`vlc`) or full (`org.mpris.MediaPlayer2.vlc`)
/// names. A short entry also covers instance names such as
/// `org.mpris.MediaPlayer2.vlc.instance1234`. An empty list allows nothing.
#[derive(Debug, Clone, Default)]
pub struct PlayerFilter {
    allowed: Vec<String>,
}

impl PlayerFilter {
    pub fn new(players: &[String]) -> Self {
        Self {
            allowed: players.iter().map(|p| short_name(p).to_string()).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }

    pub fn allows(&self, bus_name: &str) -> bool {
        let name = short_name(bus_name);
        self.allowed.iter().any(|allowed| {
            name == allowed
                || name
                    .strip_prefix(allowed.as_str())
                    .is_some_and(|rest| rest.starts_with('.'))
        })
    }
}

/// The bus queries needed to map a sender to its well-known name.
#[async_trait]
pub trait BusNames: Send + Sync {
    /// Every name currently on the bus.
    async fn list_names(&self) -> Result<Vec<String>>;
    /// Unique name owning `name`.
    async fn name_owner(&self, name: &str) -> Result<String>;
}

/// Caches unique sender name → well-known player name.
#[derive(Debug, Default)]
pub struct NameResolver {
    by_owner: HashMap<String, String>,
}

impl NameResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `sender` (e.g. `:1.42`), asking the bus on a cache miss.
    ///
    /// Returns `Ok(None)` when no MPRIS player is owned by `sender`.
    pub async fn resolve(&mut self, sender: &str, bus: &dyn BusNames) -> Result<Option<String>> {
        if let Some(name) = self.by_owner.get(sender) {
            return Ok(Some(name.clone()));
        }

        self.refresh(bus).await?;
        Ok(self.by_owner.get(sender).cloned())
    }

    /// Re-read the owners of all MPRIS names.
    pub async fn refresh(&mut self, bus: &dyn BusNames) -> Result<()> {
        for name in bus.list_names().await? {
            if !name.starts_with(MPRIS_PREFIX) {
                continue;
            }
            match bus.name_owner(&name).await {
                Ok(owner) => self.remember(owner, name),
                // The player may have quit between the two calls
                Err(e) => tracing::debug!(target: "monitor::bus", %name, error = %e, "No owner"),
            }
        }
        Ok(())
    }

    pub fn remember(&mut self, owner: String, name: String) {
        if !self.by_owner.contains_key(&owner) {
            tracing::debug!(target: "monitor::bus", %owner, %name, "Discovered player");
        }
        self.by_owner.insert(owner, name);
    }

    /// Drop every mapping to the well-known `name`.
    pub fn forget(&mut self, name: &str) {
        self.by_owner.retain(|_, v| v != name);
    }
}
