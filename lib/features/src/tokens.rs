//! Upstream capture model.
//!
//! These types mirror the nested JSON document delivered by the capture
//! layer. Every field is optional on the wire; absent arrays deserialize as
//! empty and absent scalars as `None`, leaving the sanitizer to decide on
//! fallbacks.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One captured source: identity, extracted tokens and the metrics report
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureDocument {
    pub source_id: String,
    #[serde(default)]
    pub tokens: RawTokenSet,
    #[serde(default)]
    pub report: MetricsReport,
}

/// Raw design tokens, exactly as extracted
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RawTokenSet {
    pub colors: ColorTokens,
    pub typography: TypographyTokens,
    pub spacing: Vec<f64>,
    pub shape: ShapeTokens,
    pub layout: LayoutMetrics,
    pub cta: Option<CtaTokens>,
}

/// Hex colors grouped by the role the extractor saw them in
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ColorTokens {
    pub primary: Vec<String>,
    pub neutral: Vec<String>,
    pub accent: Vec<String>,
    pub background: Vec<String>,
    pub text: Vec<String>,
    /// Optional usage counts keyed by hex; added on top of group occurrences
    pub usage: BTreeMap<String, u32>,
}

impl ColorTokens {
    /// All hex strings across groups, in group order
    pub fn all(&self) -> impl Iterator<Item = &String> {
        self.primary
            .iter()
            .chain(self.accent.iter())
            .chain(self.neutral.iter())
            .chain(self.background.iter())
            .chain(self.text.iter())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TypographyTokens {
    pub font_sizes: Vec<f64>,
    pub font_weights: Vec<f64>,
    pub line_heights: Vec<f64>,
    pub font_families: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ShapeTokens {
    pub border_radii: Vec<f64>,
    pub border_widths: Vec<f64>,
    pub shadows: Vec<String>,
}

/// Page-level layout measurements, each expected in `[0, 1]` except
/// `image_text_ratio` which is an unbounded area ratio
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutMetrics {
    pub density_score: Option<f64>,
    pub whitespace_ratio: Option<f64>,
    pub image_text_ratio: Option<f64>,
    pub grouping_strength: Option<f64>,
    pub compositional_complexity: Option<f64>,
}

/// Styles of the page's primary call-to-action element
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CtaTokens {
    pub background: Option<String>,
    pub text_color: Option<String>,
    pub border_radius: Option<f64>,
    pub font_size: Option<f64>,
    pub font_weight: Option<f64>,
    pub padding_x: Option<f64>,
    pub padding_y: Option<f64>,
    pub has_shadow: Option<bool>,
}

/// Quality metrics computed upstream, scores in `[0, 1]`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct MetricsReport {
    pub contrast_pass_rate: Option<f64>,
    pub coherence: CoherenceScores,
    pub harmony_score: Option<f64>,
    pub design_maturity: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CoherenceScores {
    pub color: Option<f64>,
    pub typography: Option<f64>,
    pub spacing: Option<f64>,
    pub shape: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_document() {
        let doc: CaptureDocument = serde_json::from_str(
            r##"{
                "sourceId": "stripe.com",
                "tokens": {
                    "colors": { "primary": ["#635bff"], "neutral": ["#ffffff", "#0a2540"] },
                    "typography": { "fontSizes": [14, 16, 48], "fontFamilies": ["Sohne"] },
                    "spacing": [4, 8, 16],
                    "shape": { "borderRadii": [4, 8], "shadows": ["0 2px 4px rgba(0,0,0,.1)"] },
                    "layout": { "whitespaceRatio": 0.62 }
                },
                "report": {
                    "contrastPassRate": 0.9,
                    "coherence": { "color": 0.8, "typography": 0.7 }
                }
            }"##,
        )
        .unwrap();

        assert_eq!(doc.source_id, "stripe.com");
        assert_eq!(doc.tokens.colors.all().count(), 3);
        assert_eq!(doc.tokens.typography.font_sizes, vec![14.0, 16.0, 48.0]);
        assert_eq!(doc.tokens.layout.whitespace_ratio, Some(0.62));
        assert!(doc.tokens.cta.is_none());
        assert_eq!(doc.report.coherence.spacing, None);
    }

    #[test]
    fn test_empty_document_defaults() {
        let doc: CaptureDocument = serde_json::from_str(r#"{"sourceId": "x"}"#).unwrap();
        assert!(doc.tokens.spacing.is_empty());
        assert_eq!(doc.report, MetricsReport::default());
    }
}
