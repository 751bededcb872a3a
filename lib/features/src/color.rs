//! Perceptual color handling and tier classification.
//!
//! Colors are converted from sRGB hex to CIE LCh(ab) under a D65 white point
//! and bucketed into four tiers by lightness and chroma:
//!
//! ```text
//! chroma < 5 or L < 5 or L > 95  -> foundation
//! chroma > 50                    -> brand
//! chroma > 20                    -> accent
//! otherwise                      -> tinted neutral
//! ```

use crate::error::{FeatureError, Result};
use serde::{Deserialize, Serialize};

/// A color in LCh(ab) with its usage count on the page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorSample {
    /// Lowercase `#rrggbb`
    pub hex: String,
    /// 0..=100
    pub lightness: f64,
    /// 0..~150
    pub chroma: f64,
    /// Degrees in `[0, 360)`
    pub hue: f64,
    pub count: u32,
}

impl ColorSample {
    /// Parse a hex color (`#rgb`, `#rrggbb` or `#rrggbbaa`, leading `#` optional).
    /// Alpha is ignored.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let rgb = parse_hex(hex)?;
        let (lightness, chroma, hue) = rgb_to_lch(rgb);
        Some(Self {
            hex: format!("#{:02x}{:02x}{:02x}", rgb[0], rgb[1], rgb[2]),
            lightness,
            chroma,
            hue,
            count: 1,
        })
    }

    /// WCAG relative luminance
    pub fn luminance(&self) -> f64 {
        parse_hex(&self.hex).map(relative_luminance).unwrap_or(0.0)
    }
}

pub fn parse_hex(hex: &str) -> Option<[u8; 3]> {
    let digits = hex.trim().trim_start_matches('#');
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let expanded: String = match digits.len() {
        3 | 4 => digits.chars().take(3).flat_map(|c| [c, c]).collect(),
        6 | 8 => digits[..6].to_string(),
        _ => return None,
    };
    let channel = |i: usize| u8::from_str_radix(&expanded[i..i + 2], 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}

fn srgb_to_linear(channel: u8) -> f64 {
    let c = f64::from(channel) / 255.0;
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn relative_luminance(rgb: [u8; 3]) -> f64 {
    let [r, g, b] = rgb.map(srgb_to_linear);
    0.212_672_9 * r + 0.715_152_2 * g + 0.072_175 * b
}

/// WCAG contrast ratio between two colors, in `[1, 21]`
pub fn contrast_ratio(a: &ColorSample, b: &ColorSample) -> f64 {
    let la = a.luminance();
    let lb = b.luminance();
    let (hi, lo) = if la >= lb { (la, lb) } else { (lb, la) };
    (hi + 0.05) / (lo + 0.05)
}

/// Below this chroma a color is treated as exactly gray: the D65 constants
/// leave grays with a chroma around 1e-5 and an arbitrary hue.
const ACHROMATIC_CHROMA: f64 = 1e-3;

fn rgb_to_lch(rgb: [u8; 3]) -> (f64, f64, f64) {
    const XN: f64 = 0.950_47;
    const YN: f64 = 1.0;
    const ZN: f64 = 1.088_83;
    const EPSILON: f64 = 216.0 / 24_389.0;

    let [r, g, b] = rgb.map(srgb_to_linear);
    let x = 0.412_456_4 * r + 0.357_576_1 * g + 0.180_437_5 * b;
    let y = 0.212_672_9 * r + 0.715_152_2 * g + 0.072_175 * b;
    let z = 0.019_333_9 * r + 0.119_192 * g + 0.950_304_1 * b;

    let f = |t: f64| {
        if t > EPSILON {
            t.cbrt()
        } else {
            t / (3.0 * (6.0f64 / 29.0).powi(2)) + 4.0 / 29.0
        }
    };
    let (fx, fy, fz) = (f(x / XN), f(y / YN), f(z / ZN));

    let lightness = (116.0 * fy - 16.0).clamp(0.0, 100.0);
    let a = 500.0 * (fx - fy);
    let b = 200.0 * (fy - fz);
    let chroma = (a * a + b * b).sqrt();
    if chroma < ACHROMATIC_CHROMA {
        return (lightness, 0.0, 0.0);
    }
    let hue = b.atan2(a).to_degrees().rem_euclid(360.0);
    (lightness, chroma, hue)
}

/// Perceptual tier of a color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ColorTier {
    Foundation,
    TintedNeutral,
    Accent,
    Brand,
}

impl ColorTier {
    pub const ALL: [ColorTier; 4] = [
        ColorTier::Foundation,
        ColorTier::TintedNeutral,
        ColorTier::Accent,
        ColorTier::Brand,
    ];

    pub const LABELS: [&'static str; 4] = ["foundation", "tinted_neutral", "accent", "brand"];

    pub fn index(self) -> usize {
        match self {
            ColorTier::Foundation => 0,
            ColorTier::TintedNeutral => 1,
            ColorTier::Accent => 2,
            ColorTier::Brand => 3,
        }
    }
}

/// Maximum retained samples per tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierCaps {
    pub foundation: usize,
    pub tinted_neutral: usize,
    pub accent: usize,
    pub brand: usize,
}

impl Default for TierCaps {
    fn default() -> Self {
        Self {
            foundation: 8,
            tinted_neutral: 6,
            accent: 6,
            brand: 4,
        }
    }
}

impl TierCaps {
    pub fn for_tier(&self, tier: ColorTier) -> usize {
        match tier {
            ColorTier::Foundation => self.foundation,
            ColorTier::TintedNeutral => self.tinted_neutral,
            ColorTier::Accent => self.accent,
            ColorTier::Brand => self.brand,
        }
    }
}

/// Tier boundaries. Tuned by inspection; treat as replaceable defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierThresholds {
    pub foundation_max_chroma: f64,
    pub min_lightness: f64,
    pub max_lightness: f64,
    pub accent_min_chroma: f64,
    pub brand_min_chroma: f64,
    pub caps: TierCaps,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            foundation_max_chroma: 5.0,
            min_lightness: 5.0,
            max_lightness: 95.0,
            accent_min_chroma: 20.0,
            brand_min_chroma: 50.0,
            caps: TierCaps::default(),
        }
    }
}

impl TierThresholds {
    /// Finite, with `min_lightness <= max_lightness` and chroma cut points ascending
    pub fn validate(&self) -> Result<()> {
        let invalid = |field: &str, reason: String| {
            Err(FeatureError::InvalidConfig {
                field: format!("tierThresholds.{}", field),
                reason,
            })
        };
        let values = [
            ("foundation_max_chroma", self.foundation_max_chroma),
            ("min_lightness", self.min_lightness),
            ("max_lightness", self.max_lightness),
            ("accent_min_chroma", self.accent_min_chroma),
            ("brand_min_chroma", self.brand_min_chroma),
        ];
        if let Some((field, v)) = values.iter().find(|(_, v)| !v.is_finite() || *v < 0.0) {
            return invalid(field, format!("{} must be finite and non-negative", v));
        }
        if self.min_lightness > self.max_lightness {
            return invalid(
                "min_lightness",
                format!("{} exceeds max_lightness {}", self.min_lightness, self.max_lightness),
            );
        }
        if self.foundation_max_chroma > self.accent_min_chroma || self.accent_min_chroma > self.brand_min_chroma {
            return invalid(
                "accent_min_chroma",
                format!(
                    "chroma cut points must ascend: foundation {} <= accent {} <= brand {}",
                    self.foundation_max_chroma, self.accent_min_chroma, self.brand_min_chroma
                ),
            );
        }
        Ok(())
    }
}

/// Count and mean chroma of one tier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierAggregate {
    pub count: usize,
    pub mean_chroma: f64,
}

/// Two-group view kept for consumers of the older primary/neutral palette
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyPalette {
    /// accent ∪ brand
    pub primary: Vec<ColorSample>,
    /// foundation ∪ tinted neutral
    pub neutral: Vec<ColorSample>,
}

/// Tiered palette after capping
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorTiers {
    pub foundation: Vec<ColorSample>,
    pub tinted_neutral: Vec<ColorSample>,
    pub accent: Vec<ColorSample>,
    pub brand: Vec<ColorSample>,
    /// Samples dropped by the per-tier caps, indexed like [`ColorTier::ALL`]
    pub truncated: [usize; 4],
}

impl ColorTiers {
    pub fn tier(&self, tier: ColorTier) -> &[ColorSample] {
        match tier {
            ColorTier::Foundation => &self.foundation,
            ColorTier::TintedNeutral => &self.tinted_neutral,
            ColorTier::Accent => &self.accent,
            ColorTier::Brand => &self.brand,
        }
    }

    fn tier_mut(&mut self, tier: ColorTier) -> &mut Vec<ColorSample> {
        match tier {
            ColorTier::Foundation => &mut self.foundation,
            ColorTier::TintedNeutral => &mut self.tinted_neutral,
            ColorTier::Accent => &mut self.accent,
            ColorTier::Brand => &mut self.brand,
        }
    }

    pub fn aggregate(&self, tier: ColorTier) -> TierAggregate {
        let samples = self.tier(tier);
        let mean_chroma = if samples.is_empty() {
            0.0
        } else {
            samples.iter().map(|s| s.chroma).sum::<f64>() / samples.len() as f64
        };
        TierAggregate {
            count: samples.len(),
            mean_chroma,
        }
    }

    pub fn legacy(&self) -> LegacyPalette {
        LegacyPalette {
            primary: self.accent.iter().chain(self.brand.iter()).cloned().collect(),
            neutral: self
                .foundation
                .iter()
                .chain(self.tinted_neutral.iter())
                .cloned()
                .collect(),
        }
    }

    /// Every retained sample, tier by tier
    pub fn retained(&self) -> impl Iterator<Item = &ColorSample> {
        ColorTier::ALL.into_iter().flat_map(move |t| self.tier(t).iter())
    }

    pub fn retained_count(&self) -> usize {
        ColorTier::ALL.iter().map(|t| self.tier(*t).len()).sum()
    }
}

/// Assigns colors to tiers and caps each tier
#[derive(Debug, Clone, Default)]
pub struct ColorTierClassifier {
    thresholds: TierThresholds,
}

impl ColorTierClassifier {
    pub fn new(thresholds: TierThresholds) -> Result<Self> {
        thresholds.validate()?;
        Ok(Self { thresholds })
    }

    pub fn thresholds(&self) -> &TierThresholds {
        &self.thresholds
    }

    /// Tier of a single sample. Total: every input maps to exactly one tier.
    pub fn tier_of(&self, sample: &ColorSample) -> ColorTier {
        let t = &self.thresholds;
        if sample.chroma < t.foundation_max_chroma
            || sample.lightness < t.min_lightness
            || sample.lightness > t.max_lightness
        {
            ColorTier::Foundation
        } else if sample.chroma > t.brand_min_chroma {
            ColorTier::Brand
        } else if sample.chroma > t.accent_min_chroma {
            ColorTier::Accent
        } else {
            ColorTier::TintedNeutral
        }
    }

    /// Classify and cap. Within each tier, the most frequent samples come
    /// first; accent and brand break count ties by higher chroma. Remaining
    /// ties keep input order.
    pub fn classify(&self, samples: &[ColorSample]) -> ColorTiers {
        let mut tiers = ColorTiers::default();
        for sample in samples {
            let tier = self.tier_of(sample);
            tiers.tier_mut(tier).push(sample.clone());
        }

        for tier in ColorTier::ALL {
            let cap = self.thresholds.caps.for_tier(tier);
            let list = tiers.tier_mut(tier);
            let by_chroma = matches!(tier, ColorTier::Accent | ColorTier::Brand);
            list.sort_by(|a, b| {
                let order = b.count.cmp(&a.count);
                if by_chroma {
                    order.then_with(|| b.chroma.total_cmp(&a.chroma))
                } else {
                    order
                }
            });
            let dropped = list.len().saturating_sub(cap);
            list.truncate(cap);
            tiers.truncated[tier.index()] = dropped;
        }

        tiers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(lightness: f64, chroma: f64, hue: f64) -> ColorSample {
        ColorSample {
            hex: format!("#l{}c{}h{}", lightness, chroma, hue),
            lightness,
            chroma,
            hue,
            count: 1,
        }
    }

    #[test]
    fn test_parse_hex_forms() {
        assert_eq!(parse_hex("#fff"), Some([255, 255, 255]));
        assert_eq!(parse_hex("635BFF"), Some([0x63, 0x5b, 0xff]));
        assert_eq!(parse_hex("#0a254080"), Some([0x0a, 0x25, 0x40]));
        assert_eq!(parse_hex("#12345"), None);
        assert_eq!(parse_hex("#zzzzzz"), None);
        assert_eq!(parse_hex(""), None);
    }

    #[test]
    fn test_lch_reference_values() {
        let white = ColorSample::from_hex("#ffffff").unwrap();
        assert!((white.lightness - 100.0).abs() < 0.01);
        assert!(white.chroma < 0.01);

        let black = ColorSample::from_hex("#000").unwrap();
        assert!(black.lightness.abs() < 0.01);

        let red = ColorSample::from_hex("#ff0000").unwrap();
        assert!((red.lightness - 53.24).abs() < 0.1);
        assert!((red.chroma - 104.55).abs() < 0.2);
        assert!((red.hue - 40.0).abs() < 1.5);
    }

    #[test]
    fn test_grays_have_no_hue() {
        for hex in ["#ffffff", "#fefefe", "#808080", "#111111", "#000000"] {
            let gray = ColorSample::from_hex(hex).unwrap();
            assert_eq!(gray.chroma, 0.0, "{}", hex);
            assert_eq!(gray.hue, 0.0, "{}", hex);
        }
    }

    #[test]
    fn test_contrast_ratio_bounds() {
        let white = ColorSample::from_hex("#fff").unwrap();
        let black = ColorSample::from_hex("#000").unwrap();
        assert!((contrast_ratio(&white, &black) - 21.0).abs() < 0.01);
        assert!((contrast_ratio(&white, &white) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_near_white_is_foundation_regardless_of_hue() {
        let classifier = ColorTierClassifier::default();
        for hue in (0..360).step_by(15) {
            let s = sample(98.0, 2.0, f64::from(hue));
            assert_eq!(classifier.tier_of(&s), ColorTier::Foundation);
        }
    }

    #[test]
    fn test_inconsistent_thresholds_rejected() {
        assert!(ColorTierClassifier::new(TierThresholds::default()).is_ok());

        let inverted_lightness = TierThresholds {
            min_lightness: 95.0,
            max_lightness: 5.0,
            ..Default::default()
        };
        assert!(ColorTierClassifier::new(inverted_lightness).is_err());

        let brand_below_accent = TierThresholds {
            brand_min_chroma: 10.0,
            ..Default::default()
        };
        assert!(brand_below_accent.validate().is_err());

        let nan = TierThresholds {
            foundation_max_chroma: f64::NAN,
            ..Default::default()
        };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_tier_rules() {
        let classifier = ColorTierClassifier::default();
        assert_eq!(classifier.tier_of(&sample(50.0, 4.9, 0.0)), ColorTier::Foundation);
        assert_eq!(classifier.tier_of(&sample(3.0, 80.0, 0.0)), ColorTier::Foundation);
        assert_eq!(classifier.tier_of(&sample(96.0, 80.0, 0.0)), ColorTier::Foundation);
        assert_eq!(classifier.tier_of(&sample(50.0, 60.0, 0.0)), ColorTier::Brand);
        assert_eq!(classifier.tier_of(&sample(50.0, 30.0, 0.0)), ColorTier::Accent);
        assert_eq!(classifier.tier_of(&sample(50.0, 20.0, 0.0)), ColorTier::TintedNeutral);
        assert_eq!(classifier.tier_of(&sample(50.0, 5.0, 0.0)), ColorTier::TintedNeutral);
    }

    #[test]
    fn test_classification_partitions_input() {
        let classifier = ColorTierClassifier::default();
        let mut samples = Vec::new();
        for l in (0..=100).step_by(7) {
            for c in (0..=130).step_by(9) {
                samples.push(sample(f64::from(l), f64::from(c), f64::from(l * c % 360)));
            }
        }

        let tiers = classifier.classify(&samples);
        let truncated: usize = tiers.truncated.iter().sum();
        assert_eq!(tiers.retained_count() + truncated, samples.len());

        for tier in ColorTier::ALL {
            for s in tiers.tier(tier) {
                assert_eq!(classifier.tier_of(s), tier);
            }
        }
    }

    #[test]
    fn test_caps_keep_most_frequent() {
        let classifier = ColorTierClassifier::default();
        let samples: Vec<ColorSample> = (0..7)
            .map(|i| ColorSample {
                count: i + 1,
                ..sample(50.0, 60.0 + f64::from(i), 10.0)
            })
            .collect();

        let tiers = classifier.classify(&samples);
        assert_eq!(tiers.brand.len(), 4);
        assert_eq!(tiers.truncated[ColorTier::Brand.index()], 3);
        let counts: Vec<u32> = tiers.brand.iter().map(|s| s.count).collect();
        assert_eq!(counts, vec![7, 6, 5, 4]);
    }

    #[test]
    fn test_legacy_view_and_aggregates() {
        let classifier = ColorTierClassifier::default();
        let samples = vec![
            sample(99.0, 0.0, 0.0),
            sample(50.0, 10.0, 0.0),
            sample(50.0, 30.0, 0.0),
            sample(50.0, 70.0, 0.0),
        ];
        let tiers = classifier.classify(&samples);
        let legacy = tiers.legacy();
        assert_eq!(legacy.primary.len(), 2);
        assert_eq!(legacy.neutral.len(), 2);

        let accent = tiers.aggregate(ColorTier::Accent);
        assert_eq!(accent.count, 1);
        assert!((accent.mean_chroma - 30.0).abs() < 1e-9);
        assert_eq!(tiers.aggregate(ColorTier::Brand).count, 1);
    }
}
