use crate::record::SourceRecord;
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use stylevec_core::Distance;

/// Snapshot listing entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotDescription {
    pub name: String,
    pub creation_time: Option<String>,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

/// Portable copy of the whole store
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshotData {
    pub created_at: DateTime<Utc>,
    pub distance: Distance,
    pub records: Vec<SourceRecord>,
}

/// Gzip JSON snapshots, each with a `.sha256` sidecar
pub struct SnapshotManager {
    snapshot_dir: PathBuf,
}

impl SnapshotManager {
    pub fn new<P: AsRef<Path>>(snapshot_dir: P) -> Result<Self> {
        let snapshot_dir = snapshot_dir.as_ref().to_path_buf();
        fs::create_dir_all(&snapshot_dir)?;
        Ok(Self { snapshot_dir })
    }

    fn generate_snapshot_name() -> String {
        let now: DateTime<Utc> = Utc::now();
        format!("stylevec-{}.snapshot", now.format("%Y-%m-%d-%H-%M-%S-%3f"))
    }

    fn checksum_path(path: &Path) -> PathBuf {
        path.with_extension("snapshot.sha256")
    }

    fn describe(path: &Path) -> Result<SnapshotDescription> {
        let metadata = fs::metadata(path)?;
        let checksum = fs::read_to_string(Self::checksum_path(path))
            .ok()
            .map(|s| s.trim().to_string());
        let creation_time = metadata
            .modified()
            .ok()
            .map(|t| DateTime::<Utc>::from(t).format("%Y-%m-%dT%H:%M:%SZ").to_string());

        Ok(SnapshotDescription {
            name: path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string(),
            creation_time,
            size: metadata.len(),
            checksum,
        })
    }

    pub fn create(&self, data: &StoreSnapshotData) -> Result<SnapshotDescription> {
        let snapshot_name = Self::generate_snapshot_name();
        let snapshot_path = self.snapshot_dir.join(&snapshot_name);

        let json_data = serde_json::to_vec(data)?;

        let file = File::create(&snapshot_path)?;
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        encoder.write_all(&json_data)?;
        encoder.finish()?.flush()?;

        let file_data = fs::read(&snapshot_path)?;
        let checksum = format!("{:x}", Sha256::digest(&file_data));
        fs::write(Self::checksum_path(&snapshot_path), &checksum)?;

        Self::describe(&snapshot_path)
    }

    /// Newest first
    pub fn list(&self) -> Result<Vec<SnapshotDescription>> {
        let mut snapshots = Vec::new();
        for entry in fs::read_dir(&self.snapshot_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) == Some("snapshot") {
                snapshots.push(Self::describe(&path)?);
            }
        }
        snapshots.sort_by(|a, b| b.name.cmp(&a.name));
        Ok(snapshots)
    }

    /// Path inside the snapshot directory; names are bare file names
    fn resolve(&self, snapshot_name: &str) -> Result<PathBuf> {
        if snapshot_name.is_empty()
            || snapshot_name.contains(['/', '\\'])
            || snapshot_name.contains("..")
        {
            return Err(anyhow!("Invalid snapshot name '{}'", snapshot_name));
        }
        Ok(self.snapshot_dir.join(snapshot_name))
    }

    pub fn get_snapshot_path(&self, snapshot_name: &str) -> Option<PathBuf> {
        let path = self.resolve(snapshot_name).ok()?;
        path.exists().then_some(path)
    }

    /// Load a snapshot, verifying its checksum when a sidecar exists
    pub fn load(&self, snapshot_name: &str) -> Result<StoreSnapshotData> {
        let path = self.resolve(snapshot_name)?;
        if !path.exists() {
            return Err(anyhow!("Snapshot '{}' not found", snapshot_name));
        }
        self.load_from_path(&path)
    }

    pub fn load_from_path(&self, path: &Path) -> Result<StoreSnapshotData> {
        let file_data = fs::read(path)?;
        if let Ok(expected) = fs::read_to_string(Self::checksum_path(path)) {
            let actual = format!("{:x}", Sha256::digest(&file_data));
            if actual != expected.trim() {
                return Err(anyhow!("Checksum mismatch for {}", path.display()));
            }
        }

        let mut decoder = GzDecoder::new(BufReader::new(&file_data[..]));
        let mut json_data = Vec::new();
        decoder.read_to_end(&mut json_data)?;

        Ok(serde_json::from_slice(&json_data)?)
    }

    pub fn delete(&self, snapshot_name: &str) -> Result<bool> {
        let path = self.resolve(snapshot_name)?;
        if path.exists() {
            fs::remove_file(&path)?;
            let _ = fs::remove_file(Self::checksum_path(&path));
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn data() -> StoreSnapshotData {
        StoreSnapshotData {
            created_at: Utc::now(),
            distance: Distance::Euclidean,
            records: Vec::new(),
        }
    }

    #[test]
    fn test_create_list_load_delete() {
        let dir = TempDir::new().unwrap();
        let manager = SnapshotManager::new(dir.path()).unwrap();

        let desc = manager.create(&data()).unwrap();
        assert!(desc.name.ends_with(".snapshot"));
        assert_eq!(desc.checksum.as_ref().map(String::len), Some(64));

        let listed = manager.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, desc.name);

        let loaded = manager.load(&desc.name).unwrap();
        assert_eq!(loaded.distance, Distance::Euclidean);

        assert!(manager.delete(&desc.name).unwrap());
        assert!(manager.list().unwrap().is_empty());
        assert!(!manager.delete(&desc.name).unwrap());
    }

    #[test]
    fn test_checksum_mismatch_detected() {
        let dir = TempDir::new().unwrap();
        let manager = SnapshotManager::new(dir.path()).unwrap();
        let desc = manager.create(&data()).unwrap();

        let path = manager.get_snapshot_path(&desc.name).unwrap();
        fs::write(SnapshotManager::checksum_path(&path), "0".repeat(64)).unwrap();
        assert!(manager.load(&desc.name).is_err());
    }

    #[test]
    fn test_missing_snapshot() {
        let dir = TempDir::new().unwrap();
        let manager = SnapshotManager::new(dir.path()).unwrap();
        assert!(manager.load("nope.snapshot").is_err());
    }

    #[test]
    fn test_names_outside_snapshot_dir_rejected() {
        let dir = TempDir::new().unwrap();
        let snapshots = dir.path().join("snapshots");
        let manager = SnapshotManager::new(&snapshots).unwrap();

        let outside = dir.path().join("dump.bin");
        fs::write(&outside, b"keep").unwrap();

        assert!(manager.load("../dump.bin").is_err());
        assert!(manager.delete("../dump.bin").is_err());
        assert!(manager.delete("nested/x.snapshot").is_err());
        assert!(manager.delete("..\\dump.bin").is_err());
        assert!(manager.get_snapshot_path("../dump.bin").is_none());
        assert_eq!(fs::read(&outside).unwrap(), b"keep");
    }
}
