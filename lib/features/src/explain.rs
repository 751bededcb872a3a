//! Human-readable comparison of style vectors.

use crate::assembler::FeatureVector;
use crate::error::{FeatureError, Result};
use serde::{Deserialize, Serialize};
use stylevec_core::ShapeKey;

/// How strongly one feature separates two sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Differentiation {
    Weak,
    Moderate,
    Strong,
}

impl Differentiation {
    pub fn grade(magnitude: f32) -> Self {
        if magnitude > 0.3 {
            Differentiation::Strong
        } else if magnitude > 0.1 {
            Differentiation::Moderate
        } else {
            Differentiation::Weak
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureDelta {
    pub feature: String,
    pub left: f32,
    pub right: f32,
    /// `right - left`
    pub delta: f32,
    pub grade: Differentiation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleComparison {
    pub shape: ShapeKey,
    /// Per-feature deltas in vector order
    pub deltas: Vec<FeatureDelta>,
    /// Most differentiating features, largest first
    pub insights: Vec<FeatureDelta>,
    /// Euclidean distance between the unit vectors
    pub distance: f32,
}

impl StyleComparison {
    pub fn count(&self, grade: Differentiation) -> usize {
        self.deltas.iter().filter(|d| d.grade == grade).count()
    }
}

pub const DEFAULT_INSIGHTS: usize = 5;

/// Compare two vectors of the same shape.
///
/// Reserved slots never appear among the insights.
pub fn compare(left: &FeatureVector, right: &FeatureVector, top_n: usize) -> Result<StyleComparison> {
    if left.shape != right.shape || left.names != right.names {
        return Err(FeatureError::IncomparableShapes {
            left: left.shape.to_string(),
            right: right.shape.to_string(),
        });
    }

    let deltas: Vec<FeatureDelta> = left
        .iter()
        .zip(right.interpretable.iter())
        .map(|((name, l), r)| {
            let delta = r - l;
            FeatureDelta {
                feature: name.to_string(),
                left: l,
                right: *r,
                delta,
                grade: Differentiation::grade(delta.abs()),
            }
        })
        .collect();

    let mut insights: Vec<FeatureDelta> = deltas
        .iter()
        .filter(|d| !d.feature.starts_with("reserved_") && d.delta != 0.0)
        .cloned()
        .collect();
    // stable: equal magnitudes keep vector order
    insights.sort_by(|a, b| b.delta.abs().total_cmp(&a.delta.abs()));
    insights.truncate(top_n);

    Ok(StyleComparison {
        shape: left.shape.clone(),
        deltas,
        insights,
        distance: left.unit_vector().l2_distance(&right.unit_vector()),
    })
}

/// Map layout features to short trait descriptions.
///
/// Features the vector does not carry are skipped.
pub fn describe_traits(vector: &FeatureVector) -> Vec<String> {
    let bands: &[(&str, f32, &str, f32, &str)] = &[
        ("spacing_whitespace_ratio", 0.7, "Generous whitespace", 0.4, "Tight spacing"),
        ("spacing_density_score", 0.8, "Dense content", 0.5, "Minimal content"),
        ("shape_shadow_depth", 0.3, "Elevated (shadows)", 0.1, "Flat design"),
        ("shape_border_heaviness", 0.3, "Heavy borders", 0.1, "Minimal borders"),
        ("brand_color_saturation_energy", 0.5, "Vibrant colors", 0.2, "Muted colors"),
        ("spacing_padding_consistency", 0.7, "Systematic spacing", 0.3, "Variable spacing"),
        ("spacing_image_text_balance", 0.5, "Image-heavy", 0.1, "Text-focused"),
    ];

    bands
        .iter()
        .filter_map(|(feature, high, high_label, low, low_label)| {
            let value = vector.get(feature)?;
            if value > *high {
                Some((*high_label).to_string())
            } else if value < *low {
                Some((*low_label).to_string())
            } else {
                None
            }
        })
        .collect()
}
