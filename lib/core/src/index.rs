use crate::{Error, Neighbor, Result, ShapeKey, SourceId, StoredVector, Vector};
use ahash::AHashMap;
use chrono::Utc;
use ordered_float::OrderedFloat;
use parking_lot::RwLock;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Distance used to rank neighbors.
///
/// Stored vectors are unit length, so both metrics produce the same ordering:
/// `euclidean² = 2 · cosine_distance`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distance {
    #[default]
    Euclidean,
    /// `1 - cosine similarity`
    Cosine,
}

impl Distance {
    #[inline]
    pub fn between(&self, a: &Vector, b: &Vector) -> f32 {
        match self {
            Distance::Euclidean => a.l2_distance(b),
            Distance::Cosine => 1.0 - a.cosine_similarity(b),
        }
    }
}

/// Configuration for one similarity index
#[derive(Debug, Clone)]
pub struct IndexConfig {
    pub shape: ShapeKey,
    pub dimension: usize,
    pub distance: Distance,
}

#[derive(Default)]
struct IndexState {
    records: AHashMap<SourceId, StoredVector>,
    next_seq: u64,
}

/// Exact k-nearest-neighbor index over vectors of a single shape.
///
/// Every write takes the index's write lock for the full replacement of a
/// record, so a reader sees either the previous record or the new one.
pub struct SimilarityIndex {
    config: IndexConfig,
    state: RwLock<IndexState>,
}

impl SimilarityIndex {
    pub fn new(config: IndexConfig) -> Self {
        Self {
            config,
            state: RwLock::new(IndexState::default()),
        }
    }

    pub fn shape(&self) -> &ShapeKey {
        &self.config.shape
    }

    pub fn dimension(&self) -> usize {
        self.config.dimension
    }

    pub fn distance(&self) -> Distance {
        self.config.distance
    }

    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_vector(&self, source_id: &SourceId, vector: &Vector) -> Result<()> {
        if vector.dim() != self.config.dimension {
            return Err(Error::InvalidDimension {
                expected: self.config.dimension,
                actual: vector.dim(),
            });
        }
        if !vector.is_finite() {
            return Err(Error::NonFiniteVector(source_id.to_string()));
        }
        Ok(())
    }

    /// Insert or replace the record for `source_id`.
    ///
    /// Returns `true` when an existing record was replaced. The replacement
    /// takes a fresh insertion sequence.
    pub fn upsert(
        &self,
        source_id: SourceId,
        vector: Vector,
        metadata: serde_json::Value,
    ) -> Result<bool> {
        self.check_vector(&source_id, &vector)?;

        let vector = vector.normalized();
        let mut state = self.state.write();
        let seq = state.next_seq;
        state.next_seq += 1;

        let record = StoredVector {
            source_id: source_id.clone(),
            shape: self.config.shape.clone(),
            vector,
            metadata,
            inserted_at: Utc::now(),
            seq,
        };
        Ok(state.records.insert(source_id, record).is_some())
    }

    pub fn get(&self, source_id: &SourceId) -> Option<StoredVector> {
        self.state.read().records.get(source_id).cloned()
    }

    pub fn remove(&self, source_id: &SourceId) -> bool {
        self.state.write().records.remove(source_id).is_some()
    }

    /// All records in insertion order
    pub fn records(&self) -> Vec<StoredVector> {
        let state = self.state.read();
        let mut records: Vec<StoredVector> = state.records.values().cloned().collect();
        records.sort_by_key(|r| r.seq);
        records
    }

    /// Return the `k` nearest records, ascending by distance.
    /// Equal distances keep insertion order.
    pub fn query(&self, query: &Vector, k: usize) -> Result<Vec<Neighbor>> {
        if query.dim() != self.config.dimension {
            return Err(Error::InvalidDimension {
                expected: self.config.dimension,
                actual: query.dim(),
            });
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let query = query.normalized();
        let distance = self.config.distance;
        let state = self.state.read();
        let candidates: Vec<&StoredVector> = state.records.values().collect();

        let mut scored: Vec<(OrderedFloat<f32>, u64, &StoredVector)> = candidates
            .par_iter()
            .map(|record| {
                let d = distance.between(&query, &record.vector);
                (OrderedFloat(d), record.seq, *record)
            })
            .collect();

        scored.sort_by_key(|(d, seq, _)| (*d, *seq));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(d, _, record)| Neighbor {
                source_id: record.source_id.clone(),
                distance: d.into_inner(),
                metadata: record.metadata.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn index(dim: usize, distance: Distance) -> SimilarityIndex {
        SimilarityIndex::new(IndexConfig {
            shape: ShapeKey::new("test", 1, "norm-v1"),
            dimension: dim,
            distance,
        })
    }

    #[test]
    fn test_upsert_is_idempotent_per_source() {
        let idx = index(3, Distance::Euclidean);
        assert!(!idx.upsert("a".into(), Vector::new(vec![1.0, 0.0, 0.0]), json!({"v": 1})).unwrap());
        assert!(idx.upsert("a".into(), Vector::new(vec![0.0, 1.0, 0.0]), json!({"v": 2})).unwrap());

        assert_eq!(idx.len(), 1);
        let stored = idx.get(&"a".into()).unwrap();
        assert_eq!(stored.vector.as_slice(), &[0.0, 1.0, 0.0]);
        assert_eq!(stored.metadata["v"], 2);
    }

    #[test]
    fn test_query_returns_k_sorted() {
        let idx = index(2, Distance::Euclidean);
        let angles = [0.0f32, 0.3, 0.9, 1.2, 1.5];
        for (i, a) in angles.iter().enumerate() {
            idx.upsert(
                SourceId::new(format!("s{}", i)),
                Vector::new(vec![a.cos(), a.sin()]),
                json!(null),
            )
            .unwrap();
        }

        let results = idx.query(&Vector::new(vec![1.0, 0.0]), 3).unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.windows(2).all(|w| w[0].distance <= w[1].distance));
        assert_eq!(results[0].source_id.as_str(), "s0");
    }

    #[test]
    fn test_ties_broken_by_insertion_order() {
        let idx = index(2, Distance::Cosine);
        for name in ["first", "second", "third"] {
            idx.upsert(name.into(), Vector::new(vec![0.0, 1.0]), json!(null)).unwrap();
        }
        let results = idx.query(&Vector::new(vec![1.0, 0.0]), 3).unwrap();
        let order: Vec<&str> = results.iter().map(|n| n.source_id.as_str()).collect();
        assert_eq!(order, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_reupsert_moves_to_latest_insertion() {
        let idx = index(2, Distance::Cosine);
        idx.upsert("a".into(), Vector::new(vec![0.0, 1.0]), json!(null)).unwrap();
        idx.upsert("b".into(), Vector::new(vec![0.0, 1.0]), json!(null)).unwrap();
        idx.upsert("a".into(), Vector::new(vec![0.0, 1.0]), json!(null)).unwrap();

        let results = idx.query(&Vector::new(vec![0.0, 1.0]), 2).unwrap();
        assert_eq!(results[0].source_id.as_str(), "b");
        assert_eq!(results[1].source_id.as_str(), "a");
    }

    #[test]
    fn test_k_larger_than_index() {
        let idx = index(2, Distance::Euclidean);
        idx.upsert("a".into(), Vector::new(vec![1.0, 0.0]), json!(null)).unwrap();
        assert_eq!(idx.query(&Vector::new(vec![1.0, 0.0]), 10).unwrap().len(), 1);
        assert!(idx.query(&Vector::new(vec![1.0, 0.0]), 0).unwrap().is_empty());
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let idx = index(3, Distance::Euclidean);
        assert!(matches!(
            idx.upsert("a".into(), Vector::new(vec![1.0]), json!(null)),
            Err(Error::InvalidDimension { expected: 3, actual: 1 })
        ));
        assert!(idx.query(&Vector::new(vec![1.0, 0.0]), 1).is_err());
    }

    #[test]
    fn test_non_finite_vector_rejected() {
        let idx = index(2, Distance::Euclidean);
        assert!(matches!(
            idx.upsert("a".into(), Vector::new(vec![f32::NAN, 1.0]), json!(null)),
            Err(Error::NonFiniteVector(_))
        ));
        assert!(idx.is_empty());
    }

    #[test]
    fn test_euclidean_and_cosine_agree_on_order() {
        let euclid = index(3, Distance::Euclidean);
        let cosine = index(3, Distance::Cosine);
        let data = [
            ("a", vec![0.9, 0.1, 0.2]),
            ("b", vec![0.1, 0.8, 0.3]),
            ("c", vec![0.4, 0.4, 0.4]),
            ("d", vec![0.0, 0.1, 0.9]),
        ];
        for (id, v) in &data {
            euclid.upsert((*id).into(), Vector::new(v.clone()), json!(null)).unwrap();
            cosine.upsert((*id).into(), Vector::new(v.clone()), json!(null)).unwrap();
        }
        let q = Vector::new(vec![0.7, 0.2, 0.3]);
        let a: Vec<_> = euclid.query(&q, 4).unwrap().into_iter().map(|n| n.source_id).collect();
        let b: Vec<_> = cosine.query(&q, 4).unwrap().into_iter().map(|n| n.source_id).collect();
        assert_eq!(a, b);
    }
}
