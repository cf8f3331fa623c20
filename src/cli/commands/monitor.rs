//! Player monitoring command.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::open_db;
use crate::config::Config;
use crate::enrichment::{LastFmClient, MusicBrainzClient};
use crate::library::{self, IngestMode};
use crate::monitor::{Monitor, PlayerFilter, SignalListener};
use crate::scrobble::ScrobblePipeline;

/// Bus events buffered between the listener and the monitor
const EVENT_BUFFER: usize = 64;

/// Ingest the configured library, then monitor players until Ctrl-C.
pub fn cmd_monitor(rt: &Runtime, config: &Config, db_path: &Path, scan: bool) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = open_db(db_path).await?;

        if scan {
            for path in &config.library.paths {
                match library::ingest_directory(&pool, path, IngestMode::AddNew).await {
                    Ok(report) => info!(
                        target: "library::ingest",
                        path = %path.display(),
                        added = report.tracks_inserted,
                        known = report.skipped_known,
                        "Library path ingested"
                    ),
                    Err(e) => warn!(
                        target: "library::ingest",
                        path = %path.display(),
                        error = %e,
                        "Library path ingestion failed"
                    ),
                }
            }
        }

        let filter = PlayerFilter::new(&config.monitor.players);
        if filter.is_empty() {
            warn!(
                target: "monitor",
                "No players allow-listed, add names to [monitor] players in the config"
            );
        }
        if !config.lastfm.is_complete() {
            warn!(
                target: "monitor",
                "Last.fm credentials incomplete, listens are recorded but not scrobbled"
            );
        }

        let listener = SignalListener::connect(filter)
            .await
            .context("Failed to connect to the session bus")?;

        let pipeline = ScrobblePipeline::new(
            pool,
            config.monitor.user_id,
            Arc::new(MusicBrainzClient::new()?),
            Arc::new(LastFmClient::new(config.lastfm.clone())?),
        );
        let monitor = Monitor::new(Arc::new(pipeline));

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let listener_task = tokio::spawn(listener.run(tx));
        info!(target: "monitor", "Monitoring players, press Ctrl-C to stop");

        tokio::select! {
            _ = monitor.run(rx) => {
                // The channel only closes when the listener stops.
                listener_task
                    .await
                    .context("Bus listener task failed")?
                    .context("Bus listener stopped")?;
            }
            result = tokio::signal::ctrl_c() => {
                result?;
                info!(target: "monitor", "Shutting down");
                listener_task.abort();
            }
        }

        Ok(())
    })
}
