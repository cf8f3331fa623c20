//! Library ingestion command.

use std::path::Path;

use tokio::runtime::Runtime;
use tracing::info;

use super::open_db;
use crate::library::{self, IngestMode, IngestReport};

/// Ingest a directory into the library
pub fn cmd_scan(rt: &Runtime, db_path: &Path, path: &Path, mode: IngestMode) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = open_db(db_path).await?;
        println!("Scanning directory: {}", path.display());
        info!(target: "library::ingest", path = %path.display(), ?mode, "Scan requested");

        let report = library::ingest_directory(&pool, path, mode).await?;
        print_report(&report, mode);
        Ok(())
    })
}

fn print_report(report: &IngestReport, mode: IngestMode) {
    println!("Scan complete.");
    println!("  Audio files found:   {}", report.files_seen);
    println!("  Already in library:  {}", report.skipped_known);
    println!("  Unreadable:          {}", report.unreadable);
    println!("  Artists:             {}", report.artists);
    println!("  Albums:              {}", report.albums);
    if mode == IngestMode::AddNew {
        println!("  Tracks added:        {}", report.tracks_inserted);
    } else {
        println!("  Tracks updated:      {}", report.tracks_updated);
        println!("  No matching track:   {}", report.unmatched);
        println!("  Digest conflicts:    {}", report.conflicting);
    }
}
