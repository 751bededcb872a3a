//! Shared per-source inputs for shape extractors.

use crate::color::{contrast_ratio, ColorSample, ColorTier, ColorTierClassifier, ColorTiers};
use crate::personality::BrandPersonality;
use crate::sanitize::{median, ResolvedReport, SanitizedTokenSet};
use std::collections::BTreeSet;

/// Everything a shape may read while assembling one source.
///
/// Built once per source from an immutable sanitized snapshot, so every
/// shape sees the same tiers and personality.
#[derive(Debug, Clone)]
pub struct FeatureContext<'a> {
    pub tokens: &'a SanitizedTokenSet,
    pub tiers: ColorTiers,
    pub personality: BrandPersonality,
    /// Tier of the call-to-action background, when a CTA was captured
    pub cta_tier: Option<ColorTier>,
}

impl<'a> FeatureContext<'a> {
    pub fn new(tokens: &'a SanitizedTokenSet, classifier: &ColorTierClassifier, personality: BrandPersonality) -> Self {
        Self {
            tokens,
            tiers: classifier.classify(&tokens.colors),
            personality,
            cta_tier: tokens.cta.as_ref().map(|cta| classifier.tier_of(&cta.background)),
        }
    }

    pub fn report(&self) -> &ResolvedReport {
        &self.tokens.report
    }

    /// Hue of the most frequent chromatic color. Foundation colors have no
    /// meaningful hue, so a palette without chromatic colors has none.
    pub fn dominant_hue(&self) -> Option<f64> {
        let t = &self.tiers;
        most_frequent(t.brand.iter().chain(t.accent.iter()).chain(t.tinted_neutral.iter())).map(|c| c.hue)
    }

    /// Hue of the CTA background, `None` when it is a foundation color
    pub fn cta_hue(&self) -> Option<f64> {
        match (&self.tokens.cta, self.cta_tier) {
            (Some(cta), Some(tier)) if tier != ColorTier::Foundation => Some(cta.background.hue),
            _ => None,
        }
    }

    /// WCAG contrast between the CTA background and its label
    pub fn cta_contrast(&self) -> f64 {
        self.tokens
            .cta
            .as_ref()
            .map_or(1.0, |cta| contrast_ratio(&cta.background, &cta.text_color))
    }
}

/// First sample with the highest count
fn most_frequent<'s>(samples: impl Iterator<Item = &'s ColorSample>) -> Option<&'s ColorSample> {
    samples.fold(None, |best: Option<&ColorSample>, c| match best {
        Some(b) if b.count >= c.count => Some(b),
        _ => Some(c),
    })
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

pub(crate) fn median_or_zero(values: &[f64]) -> f64 {
    median(values).unwrap_or(0.0)
}

pub(crate) fn max_or_zero(values: &[f64]) -> f64 {
    values.iter().copied().fold(None, |m: Option<f64>, v| Some(m.map_or(v, |m| m.max(v)))).unwrap_or(0.0)
}

pub(crate) fn min_or_zero(values: &[f64]) -> f64 {
    values.iter().copied().fold(None, |m: Option<f64>, v| Some(m.map_or(v, |m| m.min(v)))).unwrap_or(0.0)
}

/// Number of distinct values at 0.01 resolution
pub(crate) fn distinct(values: &[f64]) -> usize {
    values
        .iter()
        .map(|v| (v * 100.0).round() as i64)
        .collect::<BTreeSet<_>>()
        .len()
}
