//! Session bus listener.
//!
//! Subscribes to MPRIS `PropertiesChanged` signals and to `NameOwnerChanged`,
//! maps each sender to its well-known player name, applies the allow-list
//! and forwards decoded [`BusEvent`]s to the monitor.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;
use zbus::fdo::DBusProxy;
use zbus::message::Type as MessageType;
use zbus::names::BusName;
use zbus::{Connection, MatchRule, Message, MessageStream};
use zvariant::OwnedValue;

use super::BusEvent;
use super::props::{self, FieldError};
use super::registry::{BusNames, MPRIS_PREFIX, NameResolver, PlayerFilter};
use crate::error::Result;

pub const MPRIS_PATH: &str = "/org/mpris/MediaPlayer2";
pub const PLAYER_INTERFACE: &str = "org.mpris.MediaPlayer2.Player";
const PROPERTIES_INTERFACE: &str = "org.freedesktop.DBus.Properties";
const DBUS_NAME: &str = "org.freedesktop.DBus";

/// [`BusNames`] backed by the bus daemon.
pub struct DbusNames {
    proxy: DBusProxy<'static>,
}

impl DbusNames {
    pub async fn new(conn: &Connection) -> Result<Self> {
        Ok(Self {
            proxy: DBusProxy::new(conn).await?,
        })
    }
}

#[async_trait]
impl BusNames for DbusNames {
    async fn list_names(&self) -> Result<Vec<String>> {
        let names = self
            .proxy
            .list_names()
            .await
            .map_err(zbus::Error::from)?;
        Ok(names.into_iter().map(|n| n.to_string()).collect())
    }

    async fn name_owner(&self, name: &str) -> Result<String> {
        let name = BusName::try_from(name).map_err(zbus::Error::from)?;
        let owner = self
            .proxy
            .get_name_owner(name)
            .await
            .map_err(zbus::Error::from)?;
        Ok(owner.to_string())
    }
}

/// Turns bus signals into [`BusEvent`]s.
pub struct SignalListener {
    conn: Connection,
    names: DbusNames,
    resolver: NameResolver,
    filter: PlayerFilter,
}

impl SignalListener {
    /// Connect to the session bus.
    ///
    /// # Errors
    ///
    /// Fails when no session bus is reachable.
    pub async fn connect(filter: PlayerFilter) -> Result<Self> {
        let conn = Connection::session().await?;
        let names = DbusNames::new(&conn).await?;
        Ok(Self {
            conn,
            names,
            resolver: NameResolver::new(),
            filter,
        })
    }

    /// Forward events until the bus stream ends or the monitor hangs up.
    pub async fn run(mut self, tx: mpsc::Sender<BusEvent>) -> Result<()> {
        let properties_rule = MatchRule::builder()
            .msg_type(MessageType::Signal)
            .interface(PROPERTIES_INTERFACE)?
            .member("PropertiesChanged")?
            .path(MPRIS_PATH)?
            .build();
        let owner_rule = MatchRule::builder()
            .msg_type(MessageType::Signal)
            .sender(DBUS_NAME)?
            .interface(DBUS_NAME)?
            .member("NameOwnerChanged")?
            .build();

        let properties = MessageStream::for_match_rule(properties_rule, &self.conn, None).await?;
        let owners = MessageStream::for_match_rule(owner_rule, &self.conn, None).await?;
        let mut stream = futures::stream::select(properties, owners);

        if let Err(e) = self.resolver.refresh(&self.names).await {
            tracing::warn!(target: "monitor::bus", error = %e, "Initial player discovery failed");
        }
        tracing::info!(target: "monitor::bus", "Monitoring for track changes");

        while let Some(msg) = stream.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::warn!(target: "monitor::bus", error = %e, "Bad message");
                    continue;
                }
            };

            if let Some(event) = self.handle_message(&msg).await
                && tx.send(event).await.is_err()
            {
                tracing::debug!(target: "monitor::bus", "Monitor gone, stopping listener");
                break;
            }
        }

        Ok(())
    }

    async fn handle_message(&mut self, msg: &Message) -> Option<BusEvent> {
        let (member, sender) = {
            let header = msg.header();
            (
                header.member().map(|m| m.as_str().to_string()),
                header.sender().map(|s| s.as_str().to_string()),
            )
        };

        match member.as_deref() {
            Some("NameOwnerChanged") => {
                let (name, _old, new) = msg.body().deserialize::<(String, String, String)>().ok()?;
                self.on_owner_changed(name, new)
            }
            Some("PropertiesChanged") => {
                let body = msg
                    .body()
                    .deserialize::<(String, HashMap<String, OwnedValue>, Vec<String>)>();
                let (interface, changed, _invalidated) = match body {
                    Ok(body) => body,
                    Err(e) => {
                        tracing::debug!(target: "monitor::bus", error = %e, "Undecodable PropertiesChanged");
                        return None;
                    }
                };
                if interface != PLAYER_INTERFACE {
                    return None;
                }
                let player = self.player_for(sender.as_deref()?).await?;
                properties_event(player, &changed)
            }
            _ => None,
        }
    }

    /// Track name owners; a vanished allowed player becomes an event.
    fn on_owner_changed(&mut self, name: String, new_owner: String) -> Option<BusEvent> {
        if !name.starts_with(MPRIS_PREFIX) {
            return None;
        }

        if new_owner.is_empty() {
            self.resolver.forget(&name);
            tracing::info!(target: "monitor::bus", player = %name, "Player left the bus");
            return self
                .filter
                .allows(&name)
                .then_some(BusEvent::PlayerVanished { player: name });
        }

        self.resolver.remember(new_owner, name);
        None
    }

    async fn player_for(&mut self, sender: &str) -> Option<String> {
        let player = match self.resolver.resolve(sender, &self.names).await {
            Ok(Some(player)) => player,
            Ok(None) => {
                tracing::debug!(target: "monitor::bus", %sender, "Sender is not an MPRIS player");
                return None;
            }
            Err(e) => {
                tracing::warn!(target: "monitor::bus", %sender, error = %e, "Failed to resolve player name");
                return None;
            }
        };

        if !self.filter.allows(&player) {
            tracing::debug!(target: "monitor::bus", %player, "Ignored player");
            return None;
        }
        Some(player)
    }
}

/// Decode a player's changed properties, logging malformed fields.
fn properties_event(player: String, changed: &HashMap<String, OwnedValue>) -> Option<BusEvent> {
    let changes = props::decode_changes(changed);

    for error in &changes.errors {
        match error {
            FieldError::UnknownStatus(_) => {
                tracing::debug!(target: "monitor::bus", %player, %error, "Ignored property")
            }
            _ => tracing::warn!(target: "monitor::bus", %player, %error, "Malformed property"),
        }
    }

    (!changes.is_empty()).then_some(BusEvent::PropertiesChanged { player, changes })
}
