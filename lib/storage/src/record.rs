use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stylevec_core::{ShapeKey, SourceId};
use stylevec_features::{BrandPersonality, FeatureVector, LabelSource, SanitizedTokenSet};

/// Everything persisted for one source.
///
/// The indices can always be rebuilt from these records: each carries the
/// interpretable vector of every shape it was assembled under, plus the
/// sanitized tokens it was assembled from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRecord {
    pub source_id: SourceId,
    pub vectors: Vec<FeatureVector>,
    pub personality: BrandPersonality,
    pub label_source: LabelSource,
    pub fallback_reason: Option<String>,
    /// Sanitized snapshot kept for audit, including recovered data issues
    pub tokens: SanitizedTokenSet,
    pub normalization_version: String,
    pub inserted_at: DateTime<Utc>,
    /// Store-wide write order, assigned on insert
    #[serde(default)]
    pub revision: u64,
}

impl SourceRecord {
    pub fn vector(&self, shape: &ShapeKey) -> Option<&FeatureVector> {
        self.vectors.iter().find(|v| &v.shape == shape)
    }

    pub fn vector_named(&self, shape_name: &str) -> Option<&FeatureVector> {
        self.vectors.iter().find(|v| v.shape.name == shape_name)
    }

    /// Metadata attached to each indexed vector and returned with query hits
    pub fn index_metadata(&self) -> serde_json::Value {
        serde_json::json!({
            "tone": self.personality.tone,
            "energy": self.personality.energy,
            "trustLevel": self.personality.trust_level,
            "confidence": self.personality.confidence,
            "labelSource": self.label_source,
            "issues": self.tokens.issues.len(),
        })
    }
}

/// One logged store mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StoreOp {
    Put { record: SourceRecord },
    Remove { source_id: SourceId },
}
