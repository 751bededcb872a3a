use crate::persistence::{DumpData, DumpPersistence, DUMP_FORMAT_VERSION};
use crate::record::{SourceRecord, StoreOp};
use crate::snapshot::{SnapshotDescription, SnapshotManager, StoreSnapshotData};
use crate::wal::WriteAheadLog;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stylevec_core::{Distance, Error, IndexConfig, Neighbor, Result, ShapeKey, SimilarityIndex, SourceId};
use tracing::{debug, info};

struct Durability {
    data_dir: PathBuf,
    wal: WriteAheadLog,
    snapshots: SnapshotManager,
    persistence: DumpPersistence,
}

impl Durability {
    /// Append one op and fsync it; the caller applies the op only afterwards
    fn append(&self, line: &[u8]) -> Result<()> {
        self.wal
            .append(line)
            .and_then(|()| self.wal.sync())
            .map_err(|e| Error::Storage(e.to_string()))
    }
}

#[derive(Default)]
struct Records {
    by_source: HashMap<SourceId, SourceRecord>,
    next_revision: u64,
}

/// Per-shape similarity indices plus the audit record of every source.
///
/// A source's vectors and record are replaced together under one write
/// lock; a put either lands in full or not at all.
pub struct StyleStore {
    indices: RwLock<HashMap<ShapeKey, Arc<SimilarityIndex>>>,
    records: RwLock<Records>,
    distance: Distance,
    durability: Option<Durability>,
}

impl StyleStore {
    /// Volatile store, nothing is written to disk
    pub fn in_memory(distance: Distance) -> Self {
        Self {
            indices: RwLock::new(HashMap::new()),
            records: RwLock::new(Records::default()),
            distance,
            durability: None,
        }
    }

    /// Open (or create) a durable store under `data_dir`, loading the dump
    /// and replaying the WAL.
    pub fn open<P: AsRef<Path>>(data_dir: P, distance: Distance) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir)?;

        let wal = WriteAheadLog::new(data_dir.join("wal.log")).map_err(|e| Error::Storage(e.to_string()))?;
        let snapshots =
            SnapshotManager::new(data_dir.join("snapshots")).map_err(|e| Error::Storage(e.to_string()))?;
        let persistence = DumpPersistence::new(&data_dir);

        let mut store = Self::in_memory(distance);

        if let Some(dump) = persistence.load().map_err(|e| Error::Persistence(e.to_string()))? {
            info!(records = dump.records.len(), "loading dump");
            let mut records = store.records.write();
            for record in dump.records {
                store.check_record(&record)?;
                store.apply_put(&mut records, record)?;
            }
        }

        let ops = wal
            .replay(|line| Ok(serde_json::from_str::<StoreOp>(line)?))
            .map_err(|e| Error::Persistence(e.to_string()))?;
        if !ops.is_empty() {
            info!(entries = ops.len(), "replaying WAL");
        }
        {
            let mut records = store.records.write();
            for op in ops {
                match op {
                    StoreOp::Put { record } => {
                        store.check_record(&record)?;
                        store.apply_put(&mut records, record)?;
                    }
                    StoreOp::Remove { source_id } => {
                        store.apply_remove(&mut records, &source_id);
                    }
                }
            }
        }

        store.durability = Some(Durability {
            data_dir,
            wal,
            snapshots,
            persistence,
        });
        Ok(store)
    }

    #[inline]
    #[must_use]
    pub fn distance(&self) -> Distance {
        self.distance
    }

    pub fn data_dir(&self) -> Option<&Path> {
        self.durability.as_ref().map(|d| d.data_dir.as_path())
    }

    pub fn len(&self) -> usize {
        self.records.read().by_source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shapes with an index, sorted, with their record counts
    pub fn shapes(&self) -> Vec<(ShapeKey, usize)> {
        let mut shapes: Vec<(ShapeKey, usize)> = self
            .indices
            .read()
            .iter()
            .map(|(k, idx)| (k.clone(), idx.len()))
            .collect();
        shapes.sort();
        shapes
    }

    #[inline]
    pub fn index(&self, shape: &ShapeKey) -> Option<Arc<SimilarityIndex>> {
        self.indices.read().get(shape).cloned()
    }

    /// Index for the given shape name; with several versions, the newest one
    pub fn index_named(&self, shape_name: &str) -> Option<Arc<SimilarityIndex>> {
        self.indices
            .read()
            .iter()
            .filter(|(k, _)| k.name == shape_name)
            .max_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(_, idx)| idx.clone())
    }

    pub fn get(&self, source_id: &SourceId) -> Option<SourceRecord> {
        self.records.read().by_source.get(source_id).cloned()
    }

    /// All records in write order
    pub fn records(&self) -> Vec<SourceRecord> {
        let mut records: Vec<SourceRecord> = self.records.read().by_source.values().cloned().collect();
        records.sort_by_key(|r| r.revision);
        records
    }

    /// Insert or replace everything stored for `record.source_id`
    ///
    /// The record is validated, logged, then applied while holding the
    /// records lock, so the WAL order always matches the applied order.
    pub fn put(&self, record: SourceRecord) -> Result<()> {
        let mut records = self.records.write();
        self.check_record(&record)?;
        if let Some(d) = &self.durability {
            let line = serde_json::to_vec(&StoreOp::Put { record: record.clone() })
                .map_err(|e| Error::Serialization(e.to_string()))?;
            d.append(&line)?;
        }
        debug!(source = %record.source_id, shapes = record.vectors.len(), "put");
        self.apply_put(&mut records, record)
    }

    pub fn remove(&self, source_id: &SourceId) -> Result<bool> {
        let mut records = self.records.write();
        if !records.by_source.contains_key(source_id) {
            return Ok(false);
        }
        if let Some(d) = &self.durability {
            let line = serde_json::to_vec(&StoreOp::Remove {
                source_id: source_id.clone(),
            })
            .map_err(|e| Error::Serialization(e.to_string()))?;
            d.append(&line)?;
        }
        Ok(self.apply_remove(&mut records, source_id))
    }

    /// `k` nearest stored sources for `vector` under `shape`
    pub fn query(&self, shape: &ShapeKey, vector: &stylevec_core::Vector, k: usize) -> Result<Vec<Neighbor>> {
        let index = self
            .index(shape)
            .ok_or_else(|| Error::IndexNotFound(shape.to_string()))?;
        index.query(vector, k)
    }

    /// `k` nearest neighbors of a stored source, excluding the source itself
    pub fn query_similar(&self, source_id: &SourceId, shape_name: &str, k: usize) -> Result<Vec<Neighbor>> {
        let record = self
            .get(source_id)
            .ok_or_else(|| Error::RecordNotFound(source_id.to_string()))?;
        let vector = record
            .vector_named(shape_name)
            .ok_or_else(|| Error::IndexNotFound(format!("{} has no '{}' vector", source_id, shape_name)))?;

        let mut hits = self.query(&vector.shape, &vector.unit_vector(), k.saturating_add(1))?;
        hits.retain(|n| &n.source_id != source_id);
        hits.truncate(k);
        Ok(hits)
    }

    /// Check every vector against its index before anything is written.
    /// Once this passes, `apply_put` cannot fail halfway.
    fn check_record(&self, record: &SourceRecord) -> Result<()> {
        let indices = self.indices.read();
        let mut seen = HashSet::with_capacity(record.vectors.len());
        for vector in &record.vectors {
            if !seen.insert(&vector.shape) {
                return Err(Error::DuplicateShape {
                    source_id: record.source_id.to_string(),
                    shape: vector.shape.to_string(),
                });
            }
            if vector.names.len() != vector.interpretable.len() {
                return Err(Error::InvalidDimension {
                    expected: vector.names.len(),
                    actual: vector.interpretable.len(),
                });
            }
            if let Some(index) = indices.get(&vector.shape) {
                if index.dimension() != vector.len() {
                    return Err(Error::InvalidDimension {
                        expected: index.dimension(),
                        actual: vector.len(),
                    });
                }
            }
            if vector.interpretable.iter().any(|v| !v.is_finite()) {
                return Err(Error::NonFiniteVector(record.source_id.to_string()));
            }
        }
        Ok(())
    }

    fn index_for(&self, shape: &ShapeKey, dimension: usize) -> Arc<SimilarityIndex> {
        if let Some(index) = self.indices.read().get(shape) {
            return index.clone();
        }
        self.indices
            .write()
            .entry(shape.clone())
            .or_insert_with(|| {
                info!(shape = %shape, dimension, "creating index");
                Arc::new(SimilarityIndex::new(IndexConfig {
                    shape: shape.clone(),
                    dimension,
                    distance: self.distance,
                }))
            })
            .clone()
    }

    /// Caller holds the records lock and has run `check_record`
    fn apply_put(&self, records: &mut Records, mut record: SourceRecord) -> Result<()> {
        // drop vectors for shapes the new record no longer has
        if let Some(previous) = records.by_source.get(&record.source_id) {
            for old in &previous.vectors {
                if record.vector(&old.shape).is_none() {
                    if let Some(index) = self.index(&old.shape) {
                        index.remove(&record.source_id);
                    }
                }
            }
        }

        let metadata = record.index_metadata();
        for vector in &record.vectors {
            self.index_for(&vector.shape, vector.len())
                .upsert(record.source_id.clone(), vector.unit_vector(), metadata.clone())?;
        }

        record.revision = records.next_revision;
        records.next_revision += 1;
        records.by_source.insert(record.source_id.clone(), record);
        Ok(())
    }

    fn apply_remove(&self, records: &mut Records, source_id: &SourceId) -> bool {
        let Some(previous) = records.by_source.remove(source_id) else {
            return false;
        };
        for vector in &previous.vectors {
            if let Some(index) = self.index(&vector.shape) {
                index.remove(source_id);
            }
        }
        true
    }

    fn durability(&self) -> Result<&Durability> {
        self.durability
            .as_ref()
            .ok_or_else(|| Error::Storage("store is in-memory".to_string()))
    }

    /// Write an atomic dump and truncate the WAL
    pub fn save(&self) -> Result<()> {
        let d = self.durability()?;
        // hold the read lock so no put lands between the dump and the truncate
        let guard = self.records.read();
        let mut records: Vec<SourceRecord> = guard.by_source.values().cloned().collect();
        records.sort_by_key(|r| r.revision);

        d.persistence
            .save(&DumpData {
                format_version: DUMP_FORMAT_VERSION,
                created_at: Utc::now(),
                distance: self.distance,
                records,
            })
            .map_err(|e| Error::Persistence(e.to_string()))?;
        d.wal.truncate().map_err(|e| Error::Storage(e.to_string()))?;
        Ok(())
    }

    pub fn last_save_time(&self) -> i64 {
        self.durability
            .as_ref()
            .map_or(0, |d| d.persistence.last_save_time())
    }

    pub fn create_snapshot(&self) -> Result<SnapshotDescription> {
        let d = self.durability()?;
        let data = StoreSnapshotData {
            created_at: Utc::now(),
            distance: self.distance,
            records: self.records(),
        };
        let desc = d.snapshots.create(&data).map_err(|e| Error::Storage(e.to_string()))?;
        info!(snapshot = %desc.name, records = data.records.len(), "snapshot created");
        Ok(desc)
    }

    pub fn list_snapshots(&self) -> Result<Vec<SnapshotDescription>> {
        self.durability()?
            .snapshots
            .list()
            .map_err(|e| Error::Storage(e.to_string()))
    }

    pub fn delete_snapshot(&self, snapshot_name: &str) -> Result<bool> {
        self.durability()?
            .snapshots
            .delete(snapshot_name)
            .map_err(|e| Error::Storage(e.to_string()))
    }

    /// Replace the whole store with a snapshot's contents and persist the
    /// result as a fresh dump.
    pub fn restore_snapshot(&self, snapshot_name: &str) -> Result<usize> {
        let d = self.durability()?;
        let data = d
            .snapshots
            .load(snapshot_name)
            .map_err(|e| Error::Storage(e.to_string()))?;

        let count = data.records.len();
        {
            let mut records = self.records.write();
            for record in &data.records {
                self.check_record(record)?;
            }
            let ids: Vec<SourceId> = records.by_source.keys().cloned().collect();
            for id in &ids {
                self.apply_remove(&mut records, id);
            }
            for record in data.records {
                self.apply_put(&mut records, record)?;
            }
        }
        self.save()?;
        info!(snapshot = snapshot_name, records = count, "snapshot restored");
        Ok(count)
    }
}
