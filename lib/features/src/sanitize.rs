//! Token sanitization.
//!
//! Extracted arrays are noisy: zero-width elements report `0px`, "pill"
//! buttons report radii of `9999px`, and some pages yield nothing at all.
//! Each numeric field is filtered against a frozen domain range, then
//! statistical outliers are rejected with a median-absolute-deviation test.
//! A field never comes out empty; when nothing survives, one documented
//! fallback value is substituted and a [`DataIssue`] is recorded.

use crate::color::ColorSample;
use crate::error::{DataIssue, FeatureError, IssueKind, Result};
use crate::tokens::{ColorTokens, CtaTokens, LayoutMetrics, MetricsReport, RawTokenSet};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Scale factor turning a MAD into a standard-deviation equivalent for
/// normally distributed data.
pub const MAD_SCALE: f64 = 1.4826;

/// Value substituted when a field has no surviving values
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fallback {
    /// The rule's domain minimum
    Minimum,
    /// Median of the finite raw input, clamped into the domain
    Median,
    /// A fixed constant, clamped into the domain
    Value(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SanitizeRule {
    pub min: f64,
    pub max: f64,
    pub outlier_threshold: f64,
    pub fallback: Fallback,
}

impl SanitizeRule {
    pub const fn new(min: f64, max: f64, outlier_threshold: f64, fallback: Fallback) -> Self {
        Self {
            min,
            max,
            outlier_threshold,
            fallback,
        }
    }

    /// Bounds must be finite with `min <= max`; the threshold finite and positive
    pub fn validate(&self, field: &str) -> Result<()> {
        let invalid = |reason: String| {
            Err(FeatureError::InvalidConfig {
                field: field.to_string(),
                reason,
            })
        };
        if !self.min.is_finite() || !self.max.is_finite() {
            return invalid(format!("bounds [{}, {}] must be finite", self.min, self.max));
        }
        if self.min > self.max {
            return invalid(format!("min {} exceeds max {}", self.min, self.max));
        }
        if !self.outlier_threshold.is_finite() || self.outlier_threshold <= 0.0 {
            return invalid(format!("outlier threshold {} must be positive", self.outlier_threshold));
        }
        if let Fallback::Value(v) = self.fallback {
            if !v.is_finite() {
                return invalid(format!("fallback {} must be finite", v));
            }
        }
        Ok(())
    }

    #[inline]
    pub fn in_range(&self, v: f64) -> bool {
        v.is_finite() && v >= self.min && v <= self.max
    }

    fn fallback_value(&self, raw: &[f64]) -> f64 {
        // max/min rather than f64::clamp, which panics on an unvalidated min > max
        let clamp = |v: f64| {
            if v.is_finite() {
                v.max(self.min).min(self.max)
            } else {
                self.min
            }
        };
        match self.fallback {
            Fallback::Minimum => self.min,
            Fallback::Value(v) => clamp(v),
            Fallback::Median => {
                let finite: Vec<f64> = raw.iter().copied().filter(|v| v.is_finite()).collect();
                median(&finite).map(clamp).unwrap_or(self.min)
            }
        }
    }
}

/// Why a fallback was substituted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    EmptyInput,
    AllRejected,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SanitizeOutcome {
    /// Never empty
    pub values: Vec<f64>,
    pub out_of_range: usize,
    pub outliers: usize,
    pub fallback: Option<FallbackReason>,
}

/// Median of `values`; `None` when empty
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Clean one numeric array against `rule`.
///
/// Range filtering runs first, so extreme values never inflate the
/// dispersion estimate. Input order of surviving values is preserved.
pub fn sanitize(values: &[f64], rule: &SanitizeRule) -> SanitizeOutcome {
    let in_range: Vec<f64> = values.iter().copied().filter(|v| rule.in_range(*v)).collect();
    let out_of_range = values.len() - in_range.len();

    let mut kept = in_range;
    let mut outliers = 0;
    if kept.len() >= 2 {
        // len >= 2 so the medians exist
        let center = median(&kept).unwrap_or_default();
        let deviations: Vec<f64> = kept.iter().map(|v| (v - center).abs()).collect();
        let mad = median(&deviations).unwrap_or_default();
        if mad > 0.0 {
            let scale = mad * MAD_SCALE;
            let before = kept.len();
            kept.retain(|v| (v - center).abs() / scale <= rule.outlier_threshold);
            outliers = before - kept.len();
        }
    }

    let fallback = if kept.is_empty() {
        let reason = if values.is_empty() {
            FallbackReason::EmptyInput
        } else {
            FallbackReason::AllRejected
        };
        kept.push(rule.fallback_value(values));
        Some(reason)
    } else {
        None
    };

    SanitizeOutcome {
        values: kept,
        out_of_range,
        outliers,
        fallback,
    }
}

/// Per-field sanitization rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TokenRules {
    pub font_sizes: SanitizeRule,
    pub font_weights: SanitizeRule,
    pub line_heights: SanitizeRule,
    pub spacing: SanitizeRule,
    pub border_radii: SanitizeRule,
    pub border_widths: SanitizeRule,
}

impl Default for TokenRules {
    fn default() -> Self {
        Self {
            font_sizes: SanitizeRule::new(6.0, 200.0, 3.5, Fallback::Value(16.0)),
            font_weights: SanitizeRule::new(100.0, 900.0, 3.5, Fallback::Value(400.0)),
            line_heights: SanitizeRule::new(0.5, 4.0, 3.5, Fallback::Value(1.5)),
            spacing: SanitizeRule::new(0.0, 512.0, 3.5, Fallback::Value(8.0)),
            border_radii: SanitizeRule::new(0.0, 200.0, 3.5, Fallback::Minimum),
            border_widths: SanitizeRule::new(0.0, 16.0, 3.5, Fallback::Minimum),
        }
    }
}

impl TokenRules {
    pub fn validate(&self) -> Result<()> {
        self.font_sizes.validate("fontSizes")?;
        self.font_weights.validate("fontWeights")?;
        self.line_heights.validate("lineHeights")?;
        self.spacing.validate("spacing")?;
        self.border_radii.validate("borderRadii")?;
        self.border_widths.validate("borderWidths")
    }
}

/// Layout ratios clamped into `[0, 1]`; image/text ratio kept non-negative
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SanitizedLayout {
    pub density_score: f64,
    pub whitespace_ratio: f64,
    pub image_text_ratio: f64,
    pub grouping_strength: f64,
    pub compositional_complexity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SanitizedCta {
    pub background: ColorSample,
    pub text_color: ColorSample,
    pub border_radius: f64,
    pub font_size: f64,
    pub font_weight: f64,
    pub padding_x: f64,
    pub padding_y: f64,
    pub has_shadow: bool,
}

/// Metrics report with every score present and inside `[0, 1]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedReport {
    pub contrast_pass_rate: f64,
    pub coherence_color: f64,
    pub coherence_typography: f64,
    pub coherence_spacing: f64,
    pub coherence_shape: f64,
    pub harmony_score: f64,
    pub design_maturity: f64,
}

impl ResolvedReport {
    pub fn coherence_scores(&self) -> [f64; 4] {
        [
            self.coherence_color,
            self.coherence_typography,
            self.coherence_spacing,
            self.coherence_shape,
        ]
    }

    pub fn coherence_mean(&self) -> f64 {
        self.coherence_scores().iter().sum::<f64>() / 4.0
    }
}

/// Documented fallback for any missing report score
pub const REPORT_SCORE_FALLBACK: f64 = 0.5;
/// Documented fallback for any missing layout ratio
pub const LAYOUT_RATIO_FALLBACK: f64 = 0.0;
pub const FALLBACK_COLOR: &str = "#ffffff";
pub const FALLBACK_FONT_FAMILY: &str = "system-ui";
pub const CTA_BACKGROUND_FALLBACK: &str = "#000000";
pub const CTA_TEXT_FALLBACK: &str = "#ffffff";

/// Sanitized snapshot of one capture. Every array holds at least one value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SanitizedTokenSet {
    pub colors: Vec<ColorSample>,
    pub font_sizes: Vec<f64>,
    pub font_weights: Vec<f64>,
    pub line_heights: Vec<f64>,
    pub font_families: Vec<String>,
    pub spacing: Vec<f64>,
    pub border_radii: Vec<f64>,
    pub border_widths: Vec<f64>,
    pub shadow_count: usize,
    pub layout: SanitizedLayout,
    pub cta: Option<SanitizedCta>,
    pub report: ResolvedReport,
    /// Recovered input problems, in the order they were found
    pub issues: Vec<DataIssue>,
}

fn record(issues: &mut Vec<DataIssue>, issue: DataIssue) {
    match issue.kind {
        IssueKind::InputData => {
            warn!(field = %issue.field, detail = %issue.detail, "input data error recovered")
        }
        IssueKind::OutlierRejectionExhaustion => {
            warn!(field = %issue.field, detail = %issue.detail, "all samples rejected, using domain default")
        }
    }
    issues.push(issue);
}

/// Applies [`TokenRules`] to a whole capture
#[derive(Debug, Clone, Default)]
pub struct TokenSanitizer {
    rules: TokenRules,
}

impl TokenSanitizer {
    pub fn new(rules: TokenRules) -> Result<Self> {
        rules.validate()?;
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &TokenRules {
        &self.rules
    }

    pub fn sanitize_tokens(&self, tokens: &RawTokenSet, report: &MetricsReport) -> SanitizedTokenSet {
        let mut issues = Vec::new();
        let rules = &self.rules;

        let font_sizes = Self::field("fontSizes", &tokens.typography.font_sizes, &rules.font_sizes, &mut issues);
        let font_weights = Self::field("fontWeights", &tokens.typography.font_weights, &rules.font_weights, &mut issues);
        let line_heights = Self::field("lineHeights", &tokens.typography.line_heights, &rules.line_heights, &mut issues);
        let spacing = Self::field("spacing", &tokens.spacing, &rules.spacing, &mut issues);
        let border_radii = Self::field("borderRadii", &tokens.shape.border_radii, &rules.border_radii, &mut issues);
        let border_widths = Self::field("borderWidths", &tokens.shape.border_widths, &rules.border_widths, &mut issues);

        let colors = collect_colors(&tokens.colors, &mut issues);
        let font_families = collect_families(&tokens.typography.font_families, &mut issues);
        let layout = resolve_layout(&tokens.layout, &mut issues);
        let cta = tokens
            .cta
            .as_ref()
            .map(|cta| self.resolve_cta(cta, &mut issues));
        let report = resolve_report(report, &mut issues);

        SanitizedTokenSet {
            colors,
            font_sizes,
            font_weights,
            line_heights,
            font_families,
            spacing,
            border_radii,
            border_widths,
            shadow_count: tokens.shape.shadows.iter().filter(|s| is_real_shadow(s)).count(),
            layout,
            cta,
            report,
            issues,
        }
    }

    fn field(name: &str, values: &[f64], rule: &SanitizeRule, issues: &mut Vec<DataIssue>) -> Vec<f64> {
        let outcome = sanitize(values, rule);
        match outcome.fallback {
            Some(FallbackReason::EmptyInput) => record(
                issues,
                DataIssue::input(name, format!("no values, substituted {}", outcome.values[0])),
            ),
            Some(FallbackReason::AllRejected) => record(
                issues,
                DataIssue::exhausted(
                    name,
                    format!(
                        "{} values rejected ({} out of range, {} outliers), substituted {}",
                        values.len(),
                        outcome.out_of_range,
                        outcome.outliers,
                        outcome.values[0]
                    ),
                ),
            ),
            None => {}
        }
        outcome.values
    }

    fn resolve_scalar(
        &self,
        name: &str,
        value: Option<f64>,
        rule: &SanitizeRule,
        issues: &mut Vec<DataIssue>,
    ) -> f64 {
        let raw: Vec<f64> = value.into_iter().collect();
        Self::field(name, &raw, rule, issues)[0]
    }

    fn resolve_cta(&self, cta: &CtaTokens, issues: &mut Vec<DataIssue>) -> SanitizedCta {
        let color = |field: &str, hex: &Option<String>, fallback: &str, issues: &mut Vec<DataIssue>| {
            match hex.as_deref().and_then(ColorSample::from_hex) {
                Some(sample) => sample,
                None => {
                    record(
                        issues,
                        DataIssue::input(field, format!("missing or invalid color {:?}, substituted {}", hex, fallback)),
                    );
                    ColorSample::from_hex(fallback).unwrap_or(ColorSample {
                        hex: fallback.to_string(),
                        lightness: 0.0,
                        chroma: 0.0,
                        hue: 0.0,
                        count: 1,
                    })
                }
            }
        };

        let background = color("cta.background", &cta.background, CTA_BACKGROUND_FALLBACK, issues);
        let text_color = color("cta.textColor", &cta.text_color, CTA_TEXT_FALLBACK, issues);
        // Pill buttons declare radii like 9999px; they saturate at the domain maximum
        let max_radius = self.rules.border_radii.max;
        let pill_radius = cta
            .border_radius
            .map(|r| if r.is_finite() && r > max_radius { max_radius } else { r });

        SanitizedCta {
            background,
            text_color,
            border_radius: self.resolve_scalar("cta.borderRadius", pill_radius, &self.rules.border_radii, issues),
            font_size: self.resolve_scalar("cta.fontSize", cta.font_size, &self.rules.font_sizes, issues),
            font_weight: self.resolve_scalar("cta.fontWeight", cta.font_weight, &self.rules.font_weights, issues),
            padding_x: self.resolve_scalar("cta.paddingX", cta.padding_x, &self.rules.spacing, issues),
            padding_y: self.resolve_scalar("cta.paddingY", cta.padding_y, &self.rules.spacing, issues),
            has_shadow: cta.has_shadow.unwrap_or(false),
        }
    }
}

fn is_real_shadow(shadow: &str) -> bool {
    let s = shadow.trim();
    !s.is_empty() && !s.eq_ignore_ascii_case("none")
}

/// Parse and merge colors. Duplicates accumulate into one sample's count,
/// first-seen order is kept.
fn collect_colors(colors: &ColorTokens, issues: &mut Vec<DataIssue>) -> Vec<ColorSample> {
    let mut samples: Vec<ColorSample> = Vec::new();

    let mut add = |hex: &str, count: u32, issues: &mut Vec<DataIssue>| match ColorSample::from_hex(hex) {
        Some(sample) => {
            if let Some(existing) = samples.iter_mut().find(|s| s.hex == sample.hex) {
                existing.count = existing.count.saturating_add(count);
            } else {
                samples.push(ColorSample { count, ..sample });
            }
        }
        None => record(issues, DataIssue::input("colors", format!("invalid hex {:?} dropped", hex))),
    };

    for hex in colors.all() {
        add(hex.as_str(), 1, issues);
    }
    for (hex, count) in &colors.usage {
        add(hex.as_str(), *count, issues);
    }

    if samples.is_empty() {
        record(issues, DataIssue::input("colors", format!("no valid colors, substituted {}", FALLBACK_COLOR)));
        samples.extend(ColorSample::from_hex(FALLBACK_COLOR));
    }
    samples
}

fn collect_families(families: &[String], issues: &mut Vec<DataIssue>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for family in families {
        let name = family.trim().trim_matches(|c| c == '"' || c == '\'').to_lowercase();
        if !name.is_empty() && !out.contains(&name) {
            out.push(name);
        }
    }
    if out.is_empty() {
        record(
            issues,
            DataIssue::input("fontFamilies", format!("no families, substituted {}", FALLBACK_FONT_FAMILY)),
        );
        out.push(FALLBACK_FONT_FAMILY.to_string());
    }
    out
}

fn resolve_ratio(field: &str, value: Option<f64>, fallback: f64, issues: &mut Vec<DataIssue>) -> f64 {
    match value {
        Some(v) if v.is_finite() && (0.0..=1.0).contains(&v) => v,
        Some(v) if v.is_finite() => {
            record(issues, DataIssue::input(field, format!("{} outside [0, 1], clamped", v)));
            v.clamp(0.0, 1.0)
        }
        other => {
            record(
                issues,
                DataIssue::input(field, format!("missing or non-finite ({:?}), substituted {}", other, fallback)),
            );
            fallback
        }
    }
}

fn resolve_layout(layout: &LayoutMetrics, issues: &mut Vec<DataIssue>) -> SanitizedLayout {
    let image_text_ratio = match layout.image_text_ratio {
        Some(v) if v.is_finite() && v >= 0.0 => v,
        other => {
            record(
                issues,
                DataIssue::input(
                    "layout.imageTextRatio",
                    format!("missing or invalid ({:?}), substituted {}", other, LAYOUT_RATIO_FALLBACK),
                ),
            );
            LAYOUT_RATIO_FALLBACK
        }
    };

    SanitizedLayout {
        density_score: resolve_ratio("layout.densityScore", layout.density_score, LAYOUT_RATIO_FALLBACK, issues),
        whitespace_ratio: resolve_ratio("layout.whitespaceRatio", layout.whitespace_ratio, LAYOUT_RATIO_FALLBACK, issues),
        image_text_ratio,
        grouping_strength: resolve_ratio("layout.groupingStrength", layout.grouping_strength, LAYOUT_RATIO_FALLBACK, issues),
        compositional_complexity: resolve_ratio(
            "layout.compositionalComplexity",
            layout.compositional_complexity,
            LAYOUT_RATIO_FALLBACK,
            issues,
        ),
    }
}

fn resolve_report(report: &MetricsReport, issues: &mut Vec<DataIssue>) -> ResolvedReport {
    let f = REPORT_SCORE_FALLBACK;
    ResolvedReport {
        contrast_pass_rate: resolve_ratio("report.contrastPassRate", report.contrast_pass_rate, f, issues),
        coherence_color: resolve_ratio("report.coherence.color", report.coherence.color, f, issues),
        coherence_typography: resolve_ratio("report.coherence.typography", report.coherence.typography, f, issues),
        coherence_spacing: resolve_ratio("report.coherence.spacing", report.coherence.spacing, f, issues),
        coherence_shape: resolve_ratio("report.coherence.shape", report.coherence.shape, f, issues),
        harmony_score: resolve_ratio("report.harmonyScore", report.harmony_score, f, issues),
        design_maturity: resolve_ratio("report.designMaturity", report.design_maturity, f, issues),
    }
}
