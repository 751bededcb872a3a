use crate::vector::Vector;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity of a captured source (usually the site's host or a capture run id)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SourceId {
    fn from(s: String) -> Self {
        SourceId(s)
    }
}

impl From<&str> for SourceId {
    fn from(s: &str) -> Self {
        SourceId(s.to_string())
    }
}

/// Identifies one kind of vector: its shape name, shape version and the
/// normalization table version it was built under.
///
/// Two vectors are only ever compared when their keys are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShapeKey {
    pub name: String,
    pub version: u32,
    pub normalization: String,
}

impl ShapeKey {
    pub fn new(name: impl Into<String>, version: u32, normalization: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version,
            normalization: normalization.into(),
        }
    }
}

impl std::fmt::Display for ShapeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@v{}/{}", self.name, self.version, self.normalization)
    }
}

/// A vector stored in a [`crate::SimilarityIndex`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredVector {
    pub source_id: SourceId,
    pub shape: ShapeKey,
    /// Unit-length vector (the zero vector is stored as-is)
    pub vector: Vector,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub inserted_at: DateTime<Utc>,
    /// Insertion sequence within the owning index, used to break distance ties
    #[serde(default)]
    pub seq: u64,
}

/// A query hit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Neighbor {
    pub source_id: SourceId,
    pub distance: f32,
    pub metadata: serde_json::Value,
}
