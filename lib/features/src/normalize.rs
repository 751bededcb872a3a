//! Central feature normalization registry.
//!
//! Every scalar that enters a style vector is scaled through exactly one
//! frozen [`NormalizationSpec`], looked up by feature name. Bounds are
//! constants chosen once per table version ([`NORMALIZATION_VERSION`]); they
//! are never derived from the corpus, so a vector depends only on its own
//! source.
//!
//! ```text
//!   raw value ──► spec(name) ──► strategy ──► [0, 1]
//!                    │
//!                    └─ unknown name ──► FeatureError::UnknownFeature
//! ```

use crate::error::{FeatureError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use stylevec_core::Vector;

/// Version tag of the shipped normalization table
pub const NORMALIZATION_VERSION: &str = "norm-v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Linear scale between empirical bounds, clamped
    MinMax,
    /// `ln(x + 1)` applied to value and bounds, then min-max
    LogMinMax,
    /// Linear scale between the theoretical domain bounds
    Absolute,
    /// Angle in `[min, max)`; vectors carry it as a (cos, sin) pair
    Circular,
    /// Already a ratio, clamped to `[0, 1]`
    Passthrough,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizationSpec {
    pub strategy: Strategy,
    pub min: f64,
    pub max: f64,
}

impl NormalizationSpec {
    pub const fn min_max(min: f64, max: f64) -> Self {
        Self {
            strategy: Strategy::MinMax,
            min,
            max,
        }
    }

    pub const fn log_min_max(min: f64, max: f64) -> Self {
        Self {
            strategy: Strategy::LogMinMax,
            min,
            max,
        }
    }

    pub const fn absolute(min: f64, max: f64) -> Self {
        Self {
            strategy: Strategy::Absolute,
            min,
            max,
        }
    }

    /// Degrees on the full circle
    pub const fn circular() -> Self {
        Self {
            strategy: Strategy::Circular,
            min: 0.0,
            max: 360.0,
        }
    }

    pub const fn passthrough() -> Self {
        Self {
            strategy: Strategy::Passthrough,
            min: 0.0,
            max: 1.0,
        }
    }

    pub fn validate(&self, feature: &str) -> Result<()> {
        let invalid = |reason: &str| FeatureError::InvalidSpec {
            feature: feature.to_string(),
            reason: reason.to_string(),
        };
        if !self.min.is_finite() || !self.max.is_finite() {
            return Err(invalid("bounds must be finite"));
        }
        if self.min > self.max {
            return Err(invalid("min must not exceed max"));
        }
        if self.strategy == Strategy::LogMinMax && self.min < 0.0 {
            return Err(invalid("log-minmax requires min >= 0"));
        }
        Ok(())
    }

    /// Scale `value` into `[0, 1]`.
    ///
    /// NaN maps to 0 and infinities clamp to the nearest bound, so the result
    /// is always finite. Degenerate bounds (`min == max`) map to 0.5.
    pub fn apply(&self, value: f64) -> f64 {
        if value.is_nan() {
            return 0.0;
        }
        if value.is_infinite() {
            return if value > 0.0 { 1.0 } else { 0.0 };
        }
        if self.strategy == Strategy::Passthrough {
            return value.clamp(0.0, 1.0);
        }
        if self.min == self.max {
            return 0.5;
        }

        let scaled = match self.strategy {
            Strategy::MinMax | Strategy::Absolute => (value - self.min) / (self.max - self.min),
            Strategy::LogMinMax => {
                let lo = self.min.ln_1p();
                let hi = self.max.ln_1p();
                (value.max(self.min).ln_1p() - lo) / (hi - lo)
            }
            Strategy::Circular => {
                let period = self.max - self.min;
                (value - self.min).rem_euclid(period) / period
            }
            Strategy::Passthrough => value,
        };

        if scaled.is_finite() {
            scaled.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Unit-circle encoding of an angle in degrees.
///
/// A non-finite angle encodes as 0°.
#[inline]
pub fn normalize_circular(degrees: f64) -> (f64, f64) {
    if !degrees.is_finite() {
        return (1.0, 0.0);
    }
    let radians = degrees.rem_euclid(360.0).to_radians();
    (radians.cos(), radians.sin())
}

/// Scale to unit Euclidean length; the zero vector is returned unchanged.
#[inline]
#[must_use]
pub fn l2_normalize(values: &[f32]) -> Vec<f32> {
    Vector::from_slice(values).normalized().into_inner()
}

/// Feature name → frozen normalization spec, with a table version tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureNormalizer {
    version: String,
    specs: BTreeMap<String, NormalizationSpec>,
}

impl Default for FeatureNormalizer {
    fn default() -> Self {
        Self::standard()
    }
}

impl FeatureNormalizer {
    /// Empty registry with the given version tag
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            specs: BTreeMap::new(),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Register a spec. Re-registering a name with a different spec is rejected;
    /// specs are frozen once published.
    pub fn register(&mut self, feature: impl Into<String>, spec: NormalizationSpec) -> Result<()> {
        let feature = feature.into();
        spec.validate(&feature)?;
        match self.specs.get(&feature) {
            Some(existing) if *existing != spec => Err(FeatureError::InvalidSpec {
                feature,
                reason: "already registered with different bounds".to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                self.specs.insert(feature, spec);
                Ok(())
            }
        }
    }

    /// Resolve a slot name. `<base>_cos` / `<base>_sin` resolve to a circular
    /// `<base>` entry.
    pub fn spec(&self, feature: &str) -> Result<&NormalizationSpec> {
        if let Some(spec) = self.specs.get(feature) {
            return Ok(spec);
        }
        feature
            .strip_suffix("_cos")
            .or_else(|| feature.strip_suffix("_sin"))
            .and_then(|base| self.specs.get(base))
            .filter(|spec| spec.strategy == Strategy::Circular)
            .ok_or_else(|| FeatureError::UnknownFeature(feature.to_string()))
    }

    pub fn contains(&self, feature: &str) -> bool {
        self.spec(feature).is_ok()
    }

    pub fn normalize(&self, value: f64, feature: &str) -> Result<f64> {
        Ok(self.spec(feature)?.apply(value))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &NormalizationSpec)> {
        self.specs.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The shipped `norm-v1` table covering every slot of the built-in shapes
    pub fn standard() -> Self {
        use NormalizationSpec as N;

        let table: &[(&str, NormalizationSpec)] = &[
            // color
            ("color_foundation_count", N::min_max(0.0, 8.0)),
            ("color_tinted_neutral_count", N::min_max(0.0, 6.0)),
            ("color_accent_count", N::min_max(0.0, 6.0)),
            ("color_brand_count", N::min_max(0.0, 4.0)),
            ("color_accent_chroma", N::absolute(0.0, 150.0)),
            ("color_brand_chroma", N::absolute(0.0, 150.0)),
            ("color_palette_size", N::log_min_max(0.0, 64.0)),
            ("color_dominant_hue", N::circular()),
            ("color_lightness_mean", N::absolute(0.0, 100.0)),
            ("color_lightness_range", N::absolute(0.0, 100.0)),
            ("brand_color_saturation_energy", N::min_max(0.0, 100.0)),
            ("brand_color_role_distinction", N::min_max(0.0, 80.0)),
            ("color_harmony", N::passthrough()),
            ("color_contrast_pass_rate", N::passthrough()),
            ("color_coherence", N::passthrough()),
            // typography
            ("typo_size_min", N::log_min_max(6.0, 200.0)),
            ("typo_size_median", N::log_min_max(6.0, 200.0)),
            ("typo_size_max", N::log_min_max(6.0, 200.0)),
            ("typo_scale_ratio", N::min_max(1.0, 6.0)),
            ("typo_hierarchy_depth", N::min_max(1.0, 10.0)),
            ("typo_weight_contrast", N::absolute(0.0, 800.0)),
            ("typo_weight_mean", N::absolute(100.0, 900.0)),
            ("typo_line_height_median", N::min_max(0.8, 2.5)),
            ("typo_family_count", N::min_max(1.0, 6.0)),
            ("typo_coherence", N::passthrough()),
            // spacing
            ("spacing_median", N::log_min_max(0.0, 512.0)),
            ("spacing_max", N::log_min_max(0.0, 512.0)),
            ("spacing_steps", N::min_max(1.0, 16.0)),
            ("spacing_base_unit", N::min_max(0.0, 16.0)),
            ("spacing_padding_consistency", N::passthrough()),
            ("spacing_density_score", N::passthrough()),
            ("spacing_whitespace_ratio", N::passthrough()),
            ("spacing_image_text_balance", N::passthrough()),
            ("spacing_coherence", N::passthrough()),
            // shape
            ("shape_radius_median", N::min_max(0.0, 32.0)),
            ("shape_radius_max", N::min_max(0.0, 64.0)),
            ("shape_radius_variety", N::min_max(1.0, 8.0)),
            ("shape_border_heaviness", N::min_max(0.0, 4.0)),
            ("shape_shadow_depth", N::min_max(0.0, 10.0)),
            ("shape_grouping_strength", N::passthrough()),
            ("shape_compositional_complexity", N::passthrough()),
            ("shape_coherence", N::passthrough()),
            // personality and summary scores
            ("personality_confidence", N::passthrough()),
            ("design_maturity", N::passthrough()),
            ("overall_coherence", N::passthrough()),
            // call to action
            ("cta_bg_lightness", N::absolute(0.0, 100.0)),
            ("cta_bg_chroma", N::absolute(0.0, 150.0)),
            ("cta_bg_hue", N::circular()),
            ("cta_text_contrast", N::absolute(1.0, 21.0)),
            ("cta_radius", N::min_max(0.0, 32.0)),
            ("cta_font_size", N::min_max(10.0, 32.0)),
            ("cta_font_weight", N::absolute(100.0, 900.0)),
            ("cta_padding_x", N::min_max(0.0, 64.0)),
            ("cta_padding_y", N::min_max(0.0, 32.0)),
            ("cta_shadow", N::passthrough()),
        ];

        let mut normalizer = Self::new(NORMALIZATION_VERSION);
        for (name, spec) in table {
            normalizer.specs.insert((*name).to_string(), *spec);
        }

        // one-hot blocks and reserved placeholders pass through untouched
        let one_hot = crate::personality::Tone::LABELS
            .iter()
            .map(|l| format!("personality_tone_{}", l))
            .chain(crate::personality::Energy::LABELS.iter().map(|l| format!("personality_energy_{}", l)))
            .chain(crate::personality::TrustLevel::LABELS.iter().map(|l| format!("personality_trust_{}", l)))
            .chain(crate::color::ColorTier::LABELS.iter().map(|l| format!("cta_tier_{}", l)));
        for name in one_hot {
            normalizer.specs.insert(name, N::passthrough());
        }
        for i in 0..crate::shape::GLOBAL_RESERVED_SLOTS {
            normalizer.specs.insert(format!("reserved_{}", i), N::passthrough());
        }
        normalizer.specs.insert("reserved_cta_0".to_string(), N::passthrough());

        normalizer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_max_scales_and_clamps() {
        let spec = NormalizationSpec::min_max(0.0, 10.0);
        assert_eq!(spec.apply(5.0), 0.5);
        assert_eq!(spec.apply(-3.0), 0.0);
        assert_eq!(spec.apply(42.0), 1.0);
    }

    #[test]
    fn test_degenerate_bounds_map_to_half() {
        assert_eq!(NormalizationSpec::min_max(4.0, 4.0).apply(4.0), 0.5);
        assert_eq!(NormalizationSpec::log_min_max(4.0, 4.0).apply(100.0), 0.5);
    }

    #[test]
    fn test_log_min_max() {
        let spec = NormalizationSpec::log_min_max(0.0, 512.0);
        assert_eq!(spec.apply(0.0), 0.0);
        assert!((spec.apply(512.0) - 1.0).abs() < 1e-12);
        let mid = spec.apply(22.0);
        assert!((mid - 23f64.ln() / 513f64.ln()).abs() < 1e-12);
        assert_eq!(spec.apply(-5.0), 0.0);
    }

    #[test]
    fn test_circular_wraps() {
        let spec = NormalizationSpec::circular();
        assert_eq!(spec.apply(90.0), 0.25);
        assert_eq!(spec.apply(450.0), 0.25);
        assert_eq!(spec.apply(-90.0), 0.75);
    }

    #[test]
    fn test_passthrough_clamps() {
        let spec = NormalizationSpec::passthrough();
        assert_eq!(spec.apply(0.3), 0.3);
        assert_eq!(spec.apply(1.7), 1.0);
    }

    #[test]
    fn test_non_finite_never_leaks() {
        for spec in [
            NormalizationSpec::min_max(0.0, 10.0),
            NormalizationSpec::log_min_max(0.0, 10.0),
            NormalizationSpec::absolute(1.0, 21.0),
            NormalizationSpec::circular(),
            NormalizationSpec::passthrough(),
        ] {
            assert_eq!(spec.apply(f64::NAN), 0.0);
            assert_eq!(spec.apply(f64::INFINITY), 1.0);
            assert_eq!(spec.apply(f64::NEG_INFINITY), 0.0);
        }
    }

    #[test]
    fn test_bounds_safety_sweep() {
        let normalizer = FeatureNormalizer::standard();
        let probes = [-1e300, -1e9, -1.0, 0.0, 1e-9, 0.5, 1.0, 7.0, 360.0, 1e6, 1e300, f64::MAX, f64::MIN];
        for (name, _) in normalizer.iter() {
            for v in probes {
                let out = normalizer.normalize(v, name).unwrap();
                assert!(out.is_finite() && (0.0..=1.0).contains(&out), "{} -> {} for {}", v, out, name);
            }
        }
    }

    #[test]
    fn test_unknown_feature() {
        let normalizer = FeatureNormalizer::standard();
        assert_eq!(
            normalizer.normalize(1.0, "nope"),
            Err(FeatureError::UnknownFeature("nope".to_string()))
        );
        // suffix lookup only applies to circular bases
        assert!(normalizer.spec("color_harmony_cos").is_err());
        assert!(normalizer.spec("color_dominant_hue_sin").is_ok());
    }

    #[test]
    fn test_register_validates() {
        let mut normalizer = FeatureNormalizer::new("test");
        assert!(normalizer.register("a", NormalizationSpec::min_max(2.0, 1.0)).is_err());
        assert!(normalizer.register("b", NormalizationSpec::log_min_max(-1.0, 1.0)).is_err());
        assert!(normalizer.register("c", NormalizationSpec::min_max(0.0, f64::INFINITY)).is_err());
        normalizer.register("d", NormalizationSpec::min_max(0.0, 1.0)).unwrap();
        normalizer.register("d", NormalizationSpec::min_max(0.0, 1.0)).unwrap();
        assert!(normalizer.register("d", NormalizationSpec::min_max(0.0, 2.0)).is_err());
        assert_eq!(normalizer.len(), 1);
    }

    #[test]
    fn test_standard_table_is_valid() {
        let normalizer = FeatureNormalizer::standard();
        assert_eq!(normalizer.version(), NORMALIZATION_VERSION);
        for (name, spec) in normalizer.iter() {
            spec.validate(name).unwrap();
        }
    }

    #[test]
    fn test_circular_pair() {
        let (c, s) = normalize_circular(90.0);
        assert!(c.abs() < 1e-12);
        assert!((s - 1.0).abs() < 1e-12);
        assert_eq!(normalize_circular(f64::NAN), (1.0, 0.0));
    }

    #[test]
    fn test_l2_normalize() {
        let unit = l2_normalize(&[3.0, 4.0]);
        let norm: f64 = unit.iter().map(|v| f64::from(*v).powi(2)).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
        assert_eq!(l2_normalize(&[0.0, 0.0, 0.0]), vec![0.0, 0.0, 0.0]);
    }
}
