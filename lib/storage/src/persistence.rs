use crate::record::SourceRecord;
use anyhow::{anyhow, Result};
use atomicwrites::{AtomicFile, OverwriteBehavior};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use stylevec_core::Distance;
use tracing::info;

/// Bumped whenever the dump layout changes
pub const DUMP_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct DumpData {
    pub format_version: u32,
    pub created_at: DateTime<Utc>,
    pub distance: Distance,
    /// Records in write order
    pub records: Vec<SourceRecord>,
}

/// Whole-store dump written atomically (temp file, fsync, rename)
pub struct DumpPersistence {
    dump_path: PathBuf,
    last_save: AtomicI64,
}

impl DumpPersistence {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            dump_path: data_dir.as_ref().join("dump.bin"),
            last_save: AtomicI64::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.dump_path
    }

    /// Unix seconds of the last successful save, 0 if none this session
    pub fn last_save_time(&self) -> i64 {
        self.last_save.load(Ordering::Acquire)
    }

    pub fn save(&self, dump: &DumpData) -> Result<()> {
        let data = bincode::serialize(dump).map_err(|e| anyhow!("Serialization error: {}", e))?;

        AtomicFile::new(&self.dump_path, OverwriteBehavior::AllowOverwrite)
            .write(|f| f.write_all(&data))
            .map_err(|e| anyhow!("Writing {}: {}", self.dump_path.display(), e))?;

        self.last_save.store(Utc::now().timestamp(), Ordering::Release);
        info!(path = %self.dump_path.display(), records = dump.records.len(), bytes = data.len(), "dump saved");
        Ok(())
    }

    pub fn load(&self) -> Result<Option<DumpData>> {
        if !self.dump_path.exists() {
            return Ok(None);
        }

        let data = std::fs::read(&self.dump_path)?;
        let dump: DumpData = bincode::deserialize(&data).map_err(|e| anyhow!("Deserialization error: {}", e))?;
        if dump.format_version != DUMP_FORMAT_VERSION {
            return Err(anyhow!(
                "Unsupported dump format {} (expected {})",
                dump.format_version,
                DUMP_FORMAT_VERSION
            ));
        }
        Ok(Some(dump))
    }
}
