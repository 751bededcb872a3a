//! Versioned vector shapes.
//!
//! A shape is an ordered list of named extractors evaluated against a
//! [`FeatureContext`]. The declared dimension is part of the contract: the
//! assembler rejects a shape whose slots do not add up to it. New vector
//! kinds are new shapes; a shape is never edited in place without bumping
//! its version.
//!
//! ```text
//!   global_style v1 (64)           cta_role v1 (16)
//!   ├─ color        14 + hue pair  ├─ background L, C, hue pair
//!   ├─ typography   10             ├─ text contrast
//!   ├─ spacing       9             ├─ radius, font size, weight
//!   ├─ shape         8             ├─ padding x/y, shadow
//!   ├─ personality  12 + conf      ├─ background tier one-hot (4)
//!   ├─ maturity, coherence         └─ reserved_cta_0
//!   └─ reserved_0..5
//! ```

use crate::color::ColorTier;
use crate::context::{distinct, max_or_zero, mean, median_or_zero, min_or_zero, FeatureContext};
use crate::personality::{Energy, Tone, TrustLevel};
use stylevec_core::ShapeKey;

pub const GLOBAL_STYLE: &str = "global_style";
pub const CTA_ROLE: &str = "cta_role";

/// Number of `reserved_*` placeholders at the end of `global_style` v1
pub const GLOBAL_RESERVED_SLOTS: usize = 6;

pub type ScalarFn = fn(&FeatureContext<'_>) -> f64;
pub type SelectFn = fn(&FeatureContext<'_>) -> Option<usize>;
/// Hue in degrees, `None` for an achromatic color
pub type HueFn = fn(&FeatureContext<'_>) -> Option<f64>;

#[derive(Debug, Clone, Copy)]
pub enum Extractor {
    /// One slot, normalized through the feature's spec
    Scalar(ScalarFn),
    /// Angle in degrees; two slots `<name>_cos`, `<name>_sin`, both 0 when
    /// there is no hue
    Hue(HueFn),
    /// One slot per label named `<name>_<label>`; 1.0 on the selected label
    OneHot {
        labels: &'static [&'static str],
        select: SelectFn,
    },
    /// Placeholder slot. Always 0 and carries no meaning in this version.
    Reserved,
}

impl Extractor {
    pub fn width(&self) -> usize {
        match self {
            Extractor::Scalar(_) | Extractor::Reserved => 1,
            Extractor::Hue(_) => 2,
            Extractor::OneHot { labels, .. } => labels.len(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeatureDef {
    pub name: String,
    pub extractor: Extractor,
}

impl FeatureDef {
    pub fn scalar(name: impl Into<String>, f: ScalarFn) -> Self {
        Self {
            name: name.into(),
            extractor: Extractor::Scalar(f),
        }
    }

    pub fn hue(name: impl Into<String>, f: HueFn) -> Self {
        Self {
            name: name.into(),
            extractor: Extractor::Hue(f),
        }
    }

    pub fn one_hot(name: impl Into<String>, labels: &'static [&'static str], select: SelectFn) -> Self {
        Self {
            name: name.into(),
            extractor: Extractor::OneHot { labels, select },
        }
    }

    pub fn reserved(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extractor: Extractor::Reserved,
        }
    }

    /// Slot names this feature expands to, in vector order
    pub fn slot_names(&self) -> Vec<String> {
        match &self.extractor {
            Extractor::Scalar(_) | Extractor::Reserved => vec![self.name.clone()],
            Extractor::Hue(_) => vec![format!("{}_cos", self.name), format!("{}_sin", self.name)],
            Extractor::OneHot { labels, .. } => labels.iter().map(|l| format!("{}_{}", self.name, l)).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Shape {
    pub name: String,
    pub version: u32,
    pub dimension: usize,
    pub features: Vec<FeatureDef>,
    /// Only assembled for captures that include a call-to-action block
    pub requires_cta: bool,
}

impl Shape {
    pub fn key(&self, normalization_version: &str) -> ShapeKey {
        ShapeKey::new(self.name.clone(), self.version, normalization_version)
    }

    pub fn slot_names(&self) -> Vec<String> {
        self.features.iter().flat_map(FeatureDef::slot_names).collect()
    }

    pub fn slot_count(&self) -> usize {
        self.features.iter().map(|f| f.extractor.width()).sum()
    }

    pub fn applies_to(&self, ctx: &FeatureContext<'_>) -> bool {
        !self.requires_cta || ctx.tokens.cta.is_some()
    }

    /// Every built-in shape
    pub fn builtin() -> Vec<Shape> {
        vec![Self::global_style(), Self::cta_role()]
    }

    pub fn builtin_by_name(name: &str) -> Option<Shape> {
        Self::builtin().into_iter().find(|s| s.name == name)
    }

    /// Whole-site style fingerprint, 64 dimensions
    pub fn global_style() -> Shape {
        let s = FeatureDef::scalar;
        let mut features = vec![
            // color
            s("color_foundation_count", |c| c.tiers.foundation.len() as f64),
            s("color_tinted_neutral_count", |c| c.tiers.tinted_neutral.len() as f64),
            s("color_accent_count", |c| c.tiers.accent.len() as f64),
            s("color_brand_count", |c| c.tiers.brand.len() as f64),
            s("color_accent_chroma", |c| c.tiers.aggregate(ColorTier::Accent).mean_chroma),
            s("color_brand_chroma", |c| c.tiers.aggregate(ColorTier::Brand).mean_chroma),
            s("color_palette_size", |c| c.tokens.colors.len() as f64),
            FeatureDef::hue("color_dominant_hue", |c| c.dominant_hue()),
            s("color_lightness_mean", |c| {
                mean(&c.tokens.colors.iter().map(|s| s.lightness).collect::<Vec<_>>())
            }),
            s("color_lightness_range", |c| {
                let l: Vec<f64> = c.tokens.colors.iter().map(|s| s.lightness).collect();
                max_or_zero(&l) - min_or_zero(&l)
            }),
            s("brand_color_saturation_energy", saturation_energy),
            s("brand_color_role_distinction", |c| {
                let legacy = c.tiers.legacy();
                let chroma = |v: &[crate::color::ColorSample]| mean(&v.iter().map(|s| s.chroma).collect::<Vec<_>>());
                if legacy.primary.is_empty() {
                    0.0
                } else {
                    (chroma(&legacy.primary) - chroma(&legacy.neutral)).abs()
                }
            }),
            s("color_harmony", |c| c.report().harmony_score),
            s("color_contrast_pass_rate", |c| c.report().contrast_pass_rate),
            s("color_coherence", |c| c.report().coherence_color),
            // typography
            s("typo_size_min", |c| min_or_zero(&c.tokens.font_sizes)),
            s("typo_size_median", |c| median_or_zero(&c.tokens.font_sizes)),
            s("typo_size_max", |c| max_or_zero(&c.tokens.font_sizes)),
            s("typo_scale_ratio", |c| {
                let min = min_or_zero(&c.tokens.font_sizes);
                if min > 0.0 {
                    max_or_zero(&c.tokens.font_sizes) / min
                } else {
                    1.0
                }
            }),
            s("typo_hierarchy_depth", |c| distinct(&c.tokens.font_sizes) as f64),
            s("typo_weight_contrast", |c| {
                max_or_zero(&c.tokens.font_weights) - min_or_zero(&c.tokens.font_weights)
            }),
            s("typo_weight_mean", |c| mean(&c.tokens.font_weights)),
            s("typo_line_height_median", |c| median_or_zero(&c.tokens.line_heights)),
            s("typo_family_count", |c| c.tokens.font_families.len() as f64),
            s("typo_coherence", |c| c.report().coherence_typography),
            // spacing
            s("spacing_median", |c| median_or_zero(&c.tokens.spacing)),
            s("spacing_max", |c| max_or_zero(&c.tokens.spacing)),
            s("spacing_steps", |c| distinct(&c.tokens.spacing) as f64),
            s("spacing_base_unit", base_unit),
            s("spacing_padding_consistency", padding_consistency),
            s("spacing_density_score", |c| c.tokens.layout.density_score),
            s("spacing_whitespace_ratio", |c| c.tokens.layout.whitespace_ratio),
            s("spacing_image_text_balance", |c| c.tokens.layout.image_text_ratio),
            s("spacing_coherence", |c| c.report().coherence_spacing),
            // shape
            s("shape_radius_median", |c| median_or_zero(&c.tokens.border_radii)),
            s("shape_radius_max", |c| max_or_zero(&c.tokens.border_radii)),
            s("shape_radius_variety", |c| distinct(&c.tokens.border_radii) as f64),
            s("shape_border_heaviness", |c| median_or_zero(&c.tokens.border_widths)),
            s("shape_shadow_depth", |c| c.tokens.shadow_count as f64),
            s("shape_grouping_strength", |c| c.tokens.layout.grouping_strength),
            s("shape_compositional_complexity", |c| c.tokens.layout.compositional_complexity),
            s("shape_coherence", |c| c.report().coherence_shape),
            // personality
            FeatureDef::one_hot("personality_tone", &Tone::LABELS, |c| Some(c.personality.tone.index())),
            FeatureDef::one_hot("personality_energy", &Energy::LABELS, |c| Some(c.personality.energy.index())),
            FeatureDef::one_hot("personality_trust", &TrustLevel::LABELS, |c| {
                Some(c.personality.trust_level.index())
            }),
            s("personality_confidence", |c| c.personality.confidence),
            // summary
            s("design_maturity", |c| c.report().design_maturity),
            s("overall_coherence", |c| c.report().coherence_mean()),
        ];
        features.extend((0..GLOBAL_RESERVED_SLOTS).map(|i| FeatureDef::reserved(format!("reserved_{}", i))));

        Shape {
            name: GLOBAL_STYLE.to_string(),
            version: 1,
            dimension: 64,
            features,
            requires_cta: false,
        }
    }

    /// Primary call-to-action role vector, 16 dimensions
    pub fn cta_role() -> Shape {
        let s = FeatureDef::scalar;
        let features = vec![
            s("cta_bg_lightness", |c| c.tokens.cta.as_ref().map_or(0.0, |t| t.background.lightness)),
            s("cta_bg_chroma", |c| c.tokens.cta.as_ref().map_or(0.0, |t| t.background.chroma)),
            FeatureDef::hue("cta_bg_hue", |c| c.cta_hue()),
            s("cta_text_contrast", |c| c.cta_contrast()),
            s("cta_radius", |c| c.tokens.cta.as_ref().map_or(0.0, |t| t.border_radius)),
            s("cta_font_size", |c| c.tokens.cta.as_ref().map_or(0.0, |t| t.font_size)),
            s("cta_font_weight", |c| c.tokens.cta.as_ref().map_or(0.0, |t| t.font_weight)),
            s("cta_padding_x", |c| c.tokens.cta.as_ref().map_or(0.0, |t| t.padding_x)),
            s("cta_padding_y", |c| c.tokens.cta.as_ref().map_or(0.0, |t| t.padding_y)),
            s("cta_shadow", |c| c.tokens.cta.as_ref().map_or(0.0, |t| f64::from(u8::from(t.has_shadow)))),
            FeatureDef::one_hot("cta_tier", &ColorTier::LABELS, |c| c.cta_tier.map(ColorTier::index)),
            FeatureDef::reserved("reserved_cta_0"),
        ];

        Shape {
            name: CTA_ROLE.to_string(),
            version: 1,
            dimension: 16,
            features,
            requires_cta: true,
        }
    }
}

/// Mean chroma of accent and brand colors
fn saturation_energy(c: &FeatureContext<'_>) -> f64 {
    let chroma: Vec<f64> = c.tiers.accent.iter().chain(c.tiers.brand.iter()).map(|s| s.chroma).collect();
    mean(&chroma)
}

/// Smallest positive spacing value
fn base_unit(c: &FeatureContext<'_>) -> f64 {
    min_or_zero(&c.tokens.spacing.iter().copied().filter(|v| *v > 0.0).collect::<Vec<_>>())
}

/// Share of positive spacing values that are whole multiples of the base unit
fn padding_consistency(c: &FeatureContext<'_>) -> f64 {
    let unit = base_unit(c);
    if unit <= 0.0 {
        return 0.0;
    }
    let positive: Vec<f64> = c.tokens.spacing.iter().copied().filter(|v| *v > 0.0).collect();
    let aligned = positive
        .iter()
        .filter(|v| {
            let ratio = *v / unit;
            (ratio - ratio.round()).abs() < 0.01
        })
        .count();
    aligned as f64 / positive.len() as f64
}
