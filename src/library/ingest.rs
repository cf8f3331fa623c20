//! Concurrent library ingestion.
//!
//! A run walks a directory tree and hands every supported file to the rayon
//! pool. Workers hash the file, skip digests already in the library, read the
//! tags and merge the resulting drafts into shared maps. Nothing touches the
//! database until the walk and every worker are done; the commit then runs in
//! stages (artists, reference fix-up, albums, tracks), one transaction each.
//!
//! Two workers that discover the same artist, album or digest resolve to one
//! draft. The draft read from the lexicographically smallest path wins, so a
//! run over the same tree always commits the same rows.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use sqlx::SqlitePool;

use super::draft::{AlbumDraft, ArtistDraft, Discovered, TrackDraft};
use super::hash;
use crate::db::{self, NewTrack, TrackKey};
use crate::error::{Result, ResultExt};
use crate::metadata::{LoftyTagReader, TagReader, TrackMetadata};
use crate::scanner;

/// How discovered tracks are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IngestMode {
    /// Insert tracks whose digest is not in the library yet
    #[default]
    AddNew,
    /// Patch existing rows with the same title
    UpdateByTitle,
    /// Patch existing rows with the same file path
    UpdateByPath,
    /// Patch existing rows with the same content digest
    UpdateByDigest,
}

impl IngestMode {
    fn update_key(self) -> Option<TrackKey> {
        match self {
            IngestMode::AddNew => None,
            IngestMode::UpdateByTitle => Some(TrackKey::Name),
            IngestMode::UpdateByPath => Some(TrackKey::FilePath),
            IngestMode::UpdateByDigest => Some(TrackKey::ContentDigest),
        }
    }
}

/// Summary of one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Supported audio files found by the walk
    pub files_seen: usize,
    /// Files whose digest was already in the library
    pub skipped_known: usize,
    /// Files that could not be hashed or whose tags could not be read
    pub unreadable: usize,
    pub artists: usize,
    pub albums: usize,
    pub tracks_inserted: usize,
    pub tracks_updated: usize,
    /// Update-mode drafts that matched no existing row
    pub unmatched: usize,
    /// Update-mode drafts whose digest already belongs to another row
    pub conflicting: usize,
}

/// Ingests directory trees into the library database.
#[derive(Clone)]
pub struct Ingestor {
    pool: SqlitePool,
    reader: Arc<dyn TagReader>,
}

impl Ingestor {
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_reader(pool, Arc::new(LoftyTagReader))
    }

    pub fn with_reader(pool: SqlitePool, reader: Arc<dyn TagReader>) -> Self {
        Self { pool, reader }
    }

    /// Ingest everything under `root`.
    ///
    /// # Errors
    ///
    /// A walk error aborts before any write. A failing commit stage rolls
    /// back its own transaction and stops the run; earlier stages stay
    /// committed.
    pub async fn ingest(&self, root: &Path, mode: IngestMode) -> Result<IngestReport> {
        tracing::info!(target: "library::ingest", root = %root.display(), ?mode, "Ingesting");

        let known = match mode {
            IngestMode::AddNew => db::existing_digests(&self.pool)
                .await
                .with_context("loading known digests")?,
            _ => HashSet::new(),
        };

        let reader = Arc::clone(&self.reader);
        let walk_root = root.to_path_buf();
        let discovery =
            tokio::task::spawn_blocking(move || discover(&walk_root, &known, reader.as_ref()))
                .await??;

        let report = self.commit(discovery, mode).await?;
        tracing::info!(
            target: "library::ingest",
            root = %root.display(),
            files = report.files_seen,
            known = report.skipped_known,
            unreadable = report.unreadable,
            inserted = report.tracks_inserted,
            updated = report.tracks_updated,
            unmatched = report.unmatched,
            conflicting = report.conflicting,
            "Ingestion finished"
        );
        Ok(report)
    }

    async fn commit(&self, discovery: Discovery, mode: IngestMode) -> Result<IngestReport> {
        let mut report = IngestReport {
            files_seen: discovery.files_seen,
            skipped_known: discovery.skipped_known,
            unreadable: discovery.unreadable,
            ..Default::default()
        };

        let mut artists = into_sorted(discovery.artists);
        db::upsert_artists(&self.pool, &mut artists)
            .await
            .with_context("committing artists")?;
        report.artists = artists.len();

        let identified: HashMap<String, ArtistDraft> = artists
            .into_iter()
            .map(|a| (a.name.clone(), a))
            .collect();

        let mut albums = into_sorted(discovery.albums);
        for album in &mut albums {
            identify_artists(&mut album.artists, &identified);
        }
        let mut tracks: Vec<TrackDraft> = discovery.tracks.into_values().collect();
        tracks.sort_by(|a, b| a.path.cmp(&b.path));
        for track in &mut tracks {
            identify_artists(&mut track.artists, &identified);
        }

        db::upsert_albums(&self.pool, &mut albums)
            .await
            .with_context("committing albums")?;
        report.albums = albums.len();

        let album_ids: HashMap<&str, i64> = albums
            .iter()
            .filter_map(|a| a.id.map(|id| (a.name.as_str(), id)))
            .collect();
        let rows: Vec<NewTrack> = tracks
            .into_iter()
            .map(|t| to_new_track(t, &album_ids))
            .collect();

        match mode.update_key() {
            None => {
                report.tracks_inserted = db::insert_tracks(&self.pool, &rows)
                    .await
                    .with_context("committing tracks")?;
            }
            Some(key) => {
                let summary = db::update_tracks(&self.pool, key, &rows)
                    .await
                    .with_context("updating tracks")?;
                report.tracks_updated = summary.updated;
                report.unmatched = summary.unmatched;
                report.conflicting = summary.conflicting;
            }
        }

        Ok(report)
    }
}

/// Ingest `root` with the lofty tag reader.
pub async fn ingest_directory(
    pool: &SqlitePool,
    root: &Path,
    mode: IngestMode,
) -> Result<IngestReport> {
    Ingestor::new(pool.clone()).ingest(root, mode).await
}

/// A draft together with the file it was read from.
#[derive(Debug)]
struct Sourced<T> {
    path: PathBuf,
    draft: T,
}

/// Shared worker output.
#[derive(Debug, Default)]
struct Discovery {
    artists: HashMap<String, Sourced<ArtistDraft>>,
    albums: HashMap<String, Sourced<AlbumDraft>>,
    tracks: HashMap<String, TrackDraft>,
    files_seen: usize,
    skipped_known: usize,
    unreadable: usize,
}

impl Discovery {
    fn merge(&mut self, found: Discovered) {
        let path = found.track.path.clone();

        for artist in found.artists {
            keep_smallest(&mut self.artists, artist.name.clone(), &path, artist);
        }
        keep_smallest(&mut self.albums, found.album.name.clone(), &path, found.album);

        match self.tracks.entry(found.track.digest.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(found.track);
            }
            Entry::Occupied(mut slot) => {
                if found.track.path < slot.get().path {
                    slot.insert(found.track);
                }
            }
        }
    }
}

fn keep_smallest<T>(map: &mut HashMap<String, Sourced<T>>, key: String, path: &Path, draft: T) {
    match map.entry(key) {
        Entry::Vacant(slot) => {
            slot.insert(Sourced {
                path: path.to_path_buf(),
                draft,
            });
        }
        Entry::Occupied(mut slot) => {
            if path < slot.get().path.as_path() {
                slot.insert(Sourced {
                    path: path.to_path_buf(),
                    draft,
                });
            }
        }
    }
}

fn into_sorted<T>(map: HashMap<String, Sourced<T>>) -> Vec<T> {
    let mut entries: Vec<(String, Sourced<T>)> = map.into_iter().collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    entries.into_iter().map(|(_, s)| s.draft).collect()
}

/// Replace every artist reference with the committed artist of the same name.
fn identify_artists(refs: &mut [ArtistDraft], identified: &HashMap<String, ArtistDraft>) {
    for artist in refs.iter_mut() {
        if let Some(found) = identified.get(&artist.name) {
            *artist = found.clone();
        }
    }
}

fn to_new_track(track: TrackDraft, album_ids: &HashMap<&str, i64>) -> NewTrack {
    NewTrack {
        album_id: album_ids.get(track.album.as_str()).copied(),
        name: track.title,
        duration: track.duration,
        lyrics: track.lyrics,
        is_explicit: track.is_explicit,
        file_path: track.path.to_string_lossy().into_owned(),
        content_digest: track.digest,
        artist_ids: track.artists.iter().filter_map(|a| a.id).collect(),
        tags: track.tags,
    }
}

/// Walk `root` and process every file on the rayon pool.
///
/// Blocking; returns once all workers have finished.
fn discover(root: &Path, known: &HashSet<String>, reader: &dyn TagReader) -> Result<Discovery> {
    let state = Mutex::new(Discovery::default());

    let walked = {
        let state = &state;
        rayon::scope(|s| {
            scanner::walk_audio_files(root, |path| {
                s.spawn(move |_| process_file(path, known, reader, state));
            })
        })
    };

    let mut discovery = state.into_inner();
    discovery.files_seen = walked?;
    Ok(discovery)
}

fn process_file(
    path: PathBuf,
    known: &HashSet<String>,
    reader: &dyn TagReader,
    state: &Mutex<Discovery>,
) {
    let digest = match hash::content_digest(&path) {
        Ok(d) => d,
        Err(e) => {
            tracing::debug!(target: "library::ingest", path = %path.display(), error = %e, "Failed to hash file");
            state.lock().unreadable += 1;
            return;
        }
    };

    if known.contains(&digest) {
        state.lock().skipped_known += 1;
        return;
    }

    let meta = match reader.read(&path) {
        Ok(m) => m,
        Err(e) => {
            tracing::debug!(target: "library::ingest", path = %path.display(), error = %e, "Failed to read tags");
            state.lock().unreadable += 1;
            return;
        }
    };

    let found = build_drafts(path, digest, meta);
    state.lock().merge(found);
}

fn build_drafts(path: PathBuf, digest: String, meta: TrackMetadata) -> Discovered {
    let artist = ArtistDraft::named(meta.artist);
    let album_artist = ArtistDraft::named(meta.album_artist);

    let album = AlbumDraft {
        id: None,
        name: meta.album.clone(),
        release_date: meta.year.map(|y| format!("{y:04}-01-01")),
        image_uri: None,
        artists: vec![album_artist.clone()],
    };

    let mut artists = vec![artist.clone()];
    if album_artist.name != artist.name {
        artists.push(album_artist);
    }

    let track = TrackDraft {
        title: meta.title,
        duration: i64::try_from(meta.duration).unwrap_or(i64::MAX),
        lyrics: meta.lyrics,
        is_explicit: meta.explicit,
        path,
        digest,
        album: meta.album,
        artists: vec![artist],
        tags: meta.genres,
    };

    Discovered {
        track,
        artists,
        album,
    }
}
