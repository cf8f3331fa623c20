//! Music library ingestion.
//!
//! - [`hash`]: content digests identifying tracks
//! - [`draft`]: records built by workers before ids exist
//! - [`ingest`]: the concurrent walk/merge/commit pipeline

pub mod draft;
pub mod hash;
pub mod ingest;

pub use draft::{AlbumDraft, ArtistDraft, Discovered, TrackDraft};
pub use ingest::{IngestMode, IngestReport, Ingestor, ingest_directory};
