//! Error and data-issue types for feature extraction.
//!
//! Two families live here. [`FeatureError`] is fatal: it signals a
//! configuration bug (an unknown feature, a shape whose output length does not
//! match its declaration) and aborts assembly. [`DataIssue`] is recoverable:
//! noisy capture input that was replaced by a documented fallback and recorded
//! for audit.

use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, FeatureError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FeatureError {
    #[error("Feature '{0}' is not registered in the normalization table")]
    UnknownFeature(String),

    #[error("Shape '{shape}' declares {expected} dimensions but produced {actual}")]
    DimensionMismatch {
        shape: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid normalization spec for '{feature}': {reason}")]
    InvalidSpec { feature: String, reason: String },

    #[error("Invalid setting '{field}': {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Invalid personality rule #{index}: {reason}")]
    InvalidRule { index: usize, reason: String },

    #[error("Cannot compare '{left}' with '{right}'")]
    IncomparableShapes { left: String, right: String },
}

/// Kind of a recovered input problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Missing or malformed field, replaced by a fallback constant
    InputData,
    /// Values were present but every one was rejected by range or outlier checks
    OutlierRejectionExhaustion,
}

/// A recovered input problem, kept with the sanitized snapshot for audit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataIssue {
    pub kind: IssueKind,
    pub field: String,
    pub detail: String,
}

impl DataIssue {
    pub fn input(field: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind: IssueKind::InputData,
            field: field.into(),
            detail: detail.into(),
        }
    }

    pub fn exhausted(field: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind: IssueKind::OutlierRejectionExhaustion,
            field: field.into(),
            detail: detail.into(),
        }
    }
}
