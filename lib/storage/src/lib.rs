//! # StyleVec Storage
//!
//! Durable home for style vectors.
//!
//! - [`StyleStore`] - one [`stylevec_core::SimilarityIndex`] per shape plus the
//!   per-source audit records
//! - [`WriteAheadLog`] - JSON-lines log of every mutation since the last dump
//! - [`DumpPersistence`] - atomic bincode dump of the whole store
//! - [`SnapshotManager`] - gzip snapshots with SHA-256 checksums
//! - [`IngestPipeline`] - bounded, failure-isolated batch ingestion
//!
//! On open the dump is loaded first, then the WAL is replayed on top of it.

pub mod config;
pub mod ingest;
pub mod manager;
pub mod persistence;
pub mod record;
pub mod snapshot;
pub mod wal;

pub use config::{ClassifierConfig, PipelineConfig};
pub use ingest::{BatchReport, IngestError, IngestFailure, IngestOutcome, IngestPipeline};
pub use manager::StyleStore;
pub use persistence::DumpPersistence;
pub use record::SourceRecord;
pub use snapshot::{SnapshotDescription, SnapshotManager};
pub use wal::WriteAheadLog;
