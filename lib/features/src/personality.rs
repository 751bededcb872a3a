//! Rule-based brand personality scoring.
//!
//! Personality is three independent categorical axes (tone, energy, trust
//! level). Each axis keeps a zero-initialized score per label; an ordered,
//! declarative [`RuleTable`] adds weighted increments when a signal crosses a
//! threshold. The top label per axis wins and ties resolve to the axis
//! default. Weights are configuration, not derived constants.

use crate::error::{FeatureError, Result};
use crate::sanitize::{ResolvedReport, SanitizedTokenSet};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    #[default]
    Professional,
    Friendly,
    Playful,
    Elegant,
    Bold,
    Minimal,
}

impl Tone {
    pub const ALL: [Tone; 6] = [
        Tone::Professional,
        Tone::Friendly,
        Tone::Playful,
        Tone::Elegant,
        Tone::Bold,
        Tone::Minimal,
    ];
    pub const LABELS: [&'static str; 6] = ["professional", "friendly", "playful", "elegant", "bold", "minimal"];

    pub fn index(self) -> usize {
        Self::ALL.iter().position(|t| *t == self).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Energy {
    Calm,
    #[default]
    Balanced,
    Energetic,
}

impl Energy {
    pub const ALL: [Energy; 3] = [Energy::Calm, Energy::Balanced, Energy::Energetic];
    pub const LABELS: [&'static str; 3] = ["calm", "balanced", "energetic"];

    pub fn index(self) -> usize {
        Self::ALL.iter().position(|e| *e == self).unwrap_or(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustLevel {
    Conservative,
    #[default]
    Modern,
    Experimental,
}

impl TrustLevel {
    pub const ALL: [TrustLevel; 3] = [TrustLevel::Conservative, TrustLevel::Modern, TrustLevel::Experimental];
    pub const LABELS: [&'static str; 3] = ["conservative", "modern", "experimental"];

    pub fn index(self) -> usize {
        Self::ALL.iter().position(|t| *t == self).unwrap_or(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandPersonality {
    pub tone: Tone,
    pub energy: Energy,
    pub trust_level: TrustLevel,
    pub confidence: f64,
}

/// Measurable inputs a rule may test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// Mean LCh chroma over the palette
    MeanSaturation,
    /// Mean border radius in px
    MeanRadius,
    PaletteSize,
    FontFamilyCount,
    ColorCoherence,
    TypographyCoherence,
    SpacingCoherence,
    ShapeCoherence,
    MeanCoherence,
    ShadowCount,
    ContrastPassRate,
    DesignMaturity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Above,
    Below,
}

/// Axis and label a rule votes for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "axis", content = "label", rename_all = "snake_case")]
pub enum RuleTarget {
    Tone(Tone),
    Energy(Energy),
    TrustLevel(TrustLevel),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PersonalityRule {
    pub signal: Signal,
    pub when: Comparison,
    pub threshold: f64,
    pub target: RuleTarget,
    pub weight: f64,
}

impl PersonalityRule {
    pub const fn new(signal: Signal, when: Comparison, threshold: f64, target: RuleTarget, weight: f64) -> Self {
        Self {
            signal,
            when,
            threshold,
            target,
            weight,
        }
    }

    #[inline]
    pub fn fires(&self, value: f64) -> bool {
        match self.when {
            Comparison::Above => value > self.threshold,
            Comparison::Below => value < self.threshold,
        }
    }
}

/// Ordered rule table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleTable {
    pub rules: Vec<PersonalityRule>,
}

impl RuleTable {
    pub fn new(rules: Vec<PersonalityRule>) -> Self {
        Self { rules }
    }

    pub fn validate(&self) -> Result<()> {
        for (index, rule) in self.rules.iter().enumerate() {
            if !rule.threshold.is_finite() {
                return Err(FeatureError::InvalidRule {
                    index,
                    reason: "threshold must be finite".to_string(),
                });
            }
            if !rule.weight.is_finite() || rule.weight < 0.0 {
                return Err(FeatureError::InvalidRule {
                    index,
                    reason: format!("weight must be finite and non-negative, got {}", rule.weight),
                });
            }
        }
        Ok(())
    }
}

impl Default for RuleTable {
    fn default() -> Self {
        use Comparison::{Above, Below};
        use RuleTarget as T;
        use Signal::*;

        let r = PersonalityRule::new;
        Self::new(vec![
            // energy
            r(MeanSaturation, Above, 50.0, T::Energy(Energy::Energetic), 2.0),
            r(MeanSaturation, Above, 30.0, T::Energy(Energy::Energetic), 1.0),
            r(MeanSaturation, Below, 15.0, T::Energy(Energy::Calm), 1.5),
            r(MeanSaturation, Above, 15.0, T::Energy(Energy::Balanced), 1.0),
            r(PaletteSize, Above, 12.0, T::Energy(Energy::Energetic), 1.0),
            r(PaletteSize, Below, 5.0, T::Energy(Energy::Calm), 1.0),
            r(ShadowCount, Above, 6.0, T::Energy(Energy::Energetic), 0.5),
            r(MeanCoherence, Above, 0.6, T::Energy(Energy::Balanced), 0.5),
            // tone
            r(MeanRadius, Above, 12.0, T::Tone(Tone::Friendly), 1.5),
            r(MeanRadius, Above, 24.0, T::Tone(Tone::Playful), 1.0),
            r(MeanRadius, Below, 3.0, T::Tone(Tone::Professional), 1.0),
            r(MeanRadius, Below, 3.0, T::Tone(Tone::Minimal), 0.5),
            r(MeanSaturation, Above, 50.0, T::Tone(Tone::Bold), 1.5),
            r(MeanSaturation, Above, 40.0, T::Tone(Tone::Playful), 1.0),
            r(MeanSaturation, Below, 15.0, T::Tone(Tone::Minimal), 1.0),
            r(MeanSaturation, Below, 15.0, T::Tone(Tone::Elegant), 0.5),
            r(PaletteSize, Below, 5.0, T::Tone(Tone::Minimal), 1.0),
            r(FontFamilyCount, Above, 2.0, T::Tone(Tone::Playful), 0.5),
            r(FontFamilyCount, Below, 2.0, T::Tone(Tone::Professional), 0.5),
            r(TypographyCoherence, Above, 0.75, T::Tone(Tone::Elegant), 1.0),
            r(ShadowCount, Below, 1.0, T::Tone(Tone::Minimal), 0.5),
            r(ContrastPassRate, Above, 0.85, T::Tone(Tone::Professional), 0.5),
            // trust level
            r(ContrastPassRate, Above, 0.8, T::TrustLevel(TrustLevel::Conservative), 1.0),
            r(DesignMaturity, Above, 0.7, T::TrustLevel(TrustLevel::Conservative), 1.0),
            r(ColorCoherence, Above, 0.75, T::TrustLevel(TrustLevel::Conservative), 0.5),
            r(DesignMaturity, Above, 0.5, T::TrustLevel(TrustLevel::Modern), 1.0),
            r(MeanCoherence, Above, 0.7, T::TrustLevel(TrustLevel::Modern), 0.5),
            r(MeanRadius, Above, 8.0, T::TrustLevel(TrustLevel::Modern), 1.0),
            r(MeanSaturation, Above, 50.0, T::TrustLevel(TrustLevel::Experimental), 1.0),
            r(PaletteSize, Above, 14.0, T::TrustLevel(TrustLevel::Experimental), 1.0),
            r(DesignMaturity, Below, 0.4, T::TrustLevel(TrustLevel::Experimental), 0.5),
            r(FontFamilyCount, Above, 3.0, T::TrustLevel(TrustLevel::Experimental), 0.5),
        ])
    }
}

/// Signal values extracted from one sanitized capture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalValues {
    pub mean_saturation: f64,
    pub mean_radius: f64,
    pub palette_size: f64,
    pub font_family_count: f64,
    pub coherence: [f64; 4],
    pub shadow_count: f64,
    pub contrast_pass_rate: f64,
    pub design_maturity: f64,
}

impl SignalValues {
    pub fn extract(tokens: &SanitizedTokenSet, report: &ResolvedReport) -> Self {
        let mean = |values: &[f64]| {
            if values.is_empty() {
                0.0
            } else {
                values.iter().sum::<f64>() / values.len() as f64
            }
        };
        let chroma: Vec<f64> = tokens.colors.iter().map(|c| c.chroma).collect();

        Self {
            mean_saturation: mean(&chroma),
            mean_radius: mean(&tokens.border_radii),
            palette_size: tokens.colors.len() as f64,
            font_family_count: tokens.font_families.len() as f64,
            coherence: report.coherence_scores(),
            shadow_count: tokens.shadow_count as f64,
            contrast_pass_rate: report.contrast_pass_rate,
            design_maturity: report.design_maturity,
        }
    }

    pub fn get(&self, signal: Signal) -> f64 {
        match signal {
            Signal::MeanSaturation => self.mean_saturation,
            Signal::MeanRadius => self.mean_radius,
            Signal::PaletteSize => self.palette_size,
            Signal::FontFamilyCount => self.font_family_count,
            Signal::ColorCoherence => self.coherence[0],
            Signal::TypographyCoherence => self.coherence[1],
            Signal::SpacingCoherence => self.coherence[2],
            Signal::ShapeCoherence => self.coherence[3],
            Signal::MeanCoherence => self.coherence.iter().sum::<f64>() / 4.0,
            Signal::ShadowCount => self.shadow_count,
            Signal::ContrastPassRate => self.contrast_pass_rate,
            Signal::DesignMaturity => self.design_maturity,
        }
    }

    /// `0.6 × mean(coherence) + 0.4 × contrast pass rate`, clamped to `[0, 1]`
    pub fn confidence(&self) -> f64 {
        let value = 0.6 * self.get(Signal::MeanCoherence) + 0.4 * self.contrast_pass_rate;
        if value.is_finite() {
            value.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Per-label accumulators, indexed like each enum's `ALL`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonalityScores {
    pub tone: [f64; 6],
    pub energy: [f64; 3],
    pub trust_level: [f64; 3],
}

/// Highest-scoring label; any tie at the top resolves to `default`
fn pick<L: Copy>(all: &[L], scores: &[f64], default: L) -> L {
    let best = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut winners = all.iter().zip(scores).filter(|(_, s)| **s == best);
    match (winners.next(), winners.next()) {
        (Some((label, _)), None) => *label,
        _ => default,
    }
}

#[derive(Debug, Clone)]
pub struct BrandPersonalityScorer {
    rules: RuleTable,
}

impl Default for BrandPersonalityScorer {
    fn default() -> Self {
        Self {
            rules: RuleTable::default(),
        }
    }
}

impl BrandPersonalityScorer {
    pub fn new(rules: RuleTable) -> Result<Self> {
        rules.validate()?;
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// Run every rule in order against `signals`
    pub fn accumulate(&self, signals: &SignalValues) -> PersonalityScores {
        let mut scores = PersonalityScores::default();
        for rule in &self.rules.rules {
            if !rule.fires(signals.get(rule.signal)) {
                continue;
            }
            match rule.target {
                RuleTarget::Tone(t) => scores.tone[t.index()] += rule.weight,
                RuleTarget::Energy(e) => scores.energy[e.index()] += rule.weight,
                RuleTarget::TrustLevel(t) => scores.trust_level[t.index()] += rule.weight,
            }
        }
        scores
    }

    pub fn evaluate(&self, signals: &SignalValues) -> BrandPersonality {
        let scores = self.accumulate(signals);
        BrandPersonality {
            tone: pick(&Tone::ALL, &scores.tone, Tone::default()),
            energy: pick(&Energy::ALL, &scores.energy, Energy::default()),
            trust_level: pick(&TrustLevel::ALL, &scores.trust_level, TrustLevel::default()),
            confidence: signals.confidence(),
        }
    }

    pub fn score(&self, tokens: &SanitizedTokenSet, report: &ResolvedReport) -> BrandPersonality {
        self.evaluate(&SignalValues::extract(tokens, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signals() -> SignalValues {
        SignalValues {
            mean_saturation: 25.0,
            mean_radius: 6.0,
            palette_size: 8.0,
            font_family_count: 2.0,
            coherence: [0.5, 0.5, 0.5, 0.5],
            shadow_count: 2.0,
            contrast_pass_rate: 0.5,
            design_maturity: 0.45,
        }
    }

    #[test]
    fn test_empty_table_yields_defaults() {
        let scorer = BrandPersonalityScorer::new(RuleTable::new(Vec::new())).unwrap();
        let p = scorer.evaluate(&signals());
        assert_eq!(p.tone, Tone::Professional);
        assert_eq!(p.energy, Energy::Balanced);
        assert_eq!(p.trust_level, TrustLevel::Modern);
    }

    #[test]
    fn test_tie_falls_back_to_default() {
        let table = RuleTable::new(vec![
            PersonalityRule::new(Signal::MeanRadius, Comparison::Above, 1.0, RuleTarget::Tone(Tone::Bold), 1.0),
            PersonalityRule::new(Signal::MeanRadius, Comparison::Above, 1.0, RuleTarget::Tone(Tone::Playful), 1.0),
        ]);
        let scorer = BrandPersonalityScorer::new(table).unwrap();
        assert_eq!(scorer.evaluate(&signals()).tone, Tone::Professional);
    }

    #[test]
    fn test_vibrant_palette_is_energetic_and_bold() {
        let scorer = BrandPersonalityScorer::default();
        let p = scorer.evaluate(&SignalValues {
            mean_saturation: 70.0,
            palette_size: 14.0,
            ..signals()
        });
        assert_eq!(p.energy, Energy::Energetic);
        assert_eq!(p.tone, Tone::Bold);
    }

    #[test]
    fn test_muted_rounded_palette() {
        let scorer = BrandPersonalityScorer::default();
        let p = scorer.evaluate(&SignalValues {
            mean_saturation: 8.0,
            palette_size: 4.0,
            mean_radius: 16.0,
            ..signals()
        });
        assert_eq!(p.energy, Energy::Calm);
        assert_eq!(p.tone, Tone::Minimal);
        assert_eq!(p.trust_level, TrustLevel::Modern);
    }

    #[test]
    fn test_saturation_never_lowers_energetic_score() {
        let scorer = BrandPersonalityScorer::default();
        let mut previous = f64::NEG_INFINITY;
        for step in 0..=150 {
            let scores = scorer.accumulate(&SignalValues {
                mean_saturation: f64::from(step),
                ..signals()
            });
            let energetic = scores.energy[Energy::Energetic.index()];
            assert!(energetic >= previous, "energetic score dropped at saturation {}", step);
            previous = energetic;
        }
    }

    #[test]
    fn test_confidence_formula_and_clamp() {
        let s = SignalValues {
            coherence: [0.8, 0.6, 0.7, 0.9],
            contrast_pass_rate: 0.5,
            ..signals()
        };
        assert!((s.confidence() - (0.6 * 0.75 + 0.4 * 0.5)).abs() < 1e-12);

        let high = SignalValues {
            coherence: [3.0; 4],
            contrast_pass_rate: 2.0,
            ..signals()
        };
        assert_eq!(high.confidence(), 1.0);
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let scorer = BrandPersonalityScorer::default();
        let a = scorer.evaluate(&signals());
        let b = scorer.evaluate(&signals());
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_rules_rejected() {
        let negative = RuleTable::new(vec![PersonalityRule::new(
            Signal::PaletteSize,
            Comparison::Above,
            3.0,
            RuleTarget::Energy(Energy::Calm),
            -1.0,
        )]);
        assert!(matches!(
            BrandPersonalityScorer::new(negative),
            Err(FeatureError::InvalidRule { index: 0, .. })
        ));

        let nan = RuleTable::new(vec![PersonalityRule::new(
            Signal::PaletteSize,
            Comparison::Above,
            f64::NAN,
            RuleTarget::Energy(Energy::Calm),
            1.0,
        )]);
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_rule_table_serde() {
        let json = serde_json::to_value(RuleTable::default()).unwrap();
        assert_eq!(json[0]["target"]["axis"], "energy");
        assert_eq!(json[0]["target"]["label"], "energetic");
        let parsed: RuleTable = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, RuleTable::default());
    }
}
