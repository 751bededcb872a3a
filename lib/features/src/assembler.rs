//! Vector assembly.
//!
//! [`VectorAssembler`] evaluates a [`Shape`] against a [`FeatureContext`]
//! and produces a [`FeatureVector`]: the ordered, interpretable values plus
//! their names and the [`ShapeKey`] they were built under. Every slot goes
//! through the shared [`FeatureNormalizer`]. Misconfiguration (a slot the
//! normalizer does not know, a length that does not match the declared
//! dimension) is fatal; nothing is padded or truncated.
//!
//! [`StyleExtractor`] chains the whole per-source path:
//!
//! ```text
//!   CaptureDocument ─► TokenSanitizer ─► SignalValues ─► personality
//!                           │                                 │
//!                           └────────► FeatureContext ◄───────┘
//!                                           │
//!                              Shape ─► VectorAssembler ─► FeatureVector
//! ```

use crate::color::ColorTierClassifier;
use crate::context::FeatureContext;
use crate::error::{FeatureError, Result};
use crate::normalize::{normalize_circular, FeatureNormalizer};
use crate::personality::{BrandPersonality, BrandPersonalityScorer, SignalValues};
use crate::sanitize::{SanitizedTokenSet, TokenSanitizer};
use crate::shape::{Extractor, Shape};
use crate::tokens::CaptureDocument;
use serde::{Deserialize, Serialize};
use stylevec_core::{ShapeKey, Vector};
use tracing::debug;

/// Assembled style vector with its feature names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureVector {
    pub shape: ShapeKey,
    pub names: Vec<String>,
    /// Normalized values: `[0, 1]`, except circular pairs in `[-1, 1]`
    pub interpretable: Vec<f32>,
}

impl FeatureVector {
    pub fn len(&self) -> usize {
        self.interpretable.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interpretable.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<f32> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.interpretable[i])
    }

    /// Unit-length copy used for indexing
    pub fn unit_vector(&self) -> Vector {
        Vector::from_slice(&self.interpretable).normalized()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.names.iter().map(String::as_str).zip(self.interpretable.iter().copied())
    }
}

#[derive(Debug, Clone, Default)]
pub struct VectorAssembler {
    normalizer: FeatureNormalizer,
}

impl VectorAssembler {
    pub fn new(normalizer: FeatureNormalizer) -> Self {
        Self { normalizer }
    }

    pub fn normalizer(&self) -> &FeatureNormalizer {
        &self.normalizer
    }

    pub fn key(&self, shape: &Shape) -> ShapeKey {
        shape.key(self.normalizer.version())
    }

    /// Check a shape without evaluating it: every slot must be registered and
    /// the slot count must match the declared dimension.
    pub fn validate(&self, shape: &Shape) -> Result<()> {
        for name in shape.slot_names() {
            self.normalizer.spec(&name)?;
        }
        let actual = shape.slot_count();
        if actual != shape.dimension {
            return Err(FeatureError::DimensionMismatch {
                shape: shape.name.clone(),
                expected: shape.dimension,
                actual,
            });
        }
        Ok(())
    }

    pub fn assemble(&self, ctx: &FeatureContext<'_>, shape: &Shape) -> Result<FeatureVector> {
        let mut names = Vec::with_capacity(shape.dimension);
        let mut values: Vec<f32> = Vec::with_capacity(shape.dimension);

        for feature in &shape.features {
            match feature.extractor {
                Extractor::Scalar(f) => {
                    let v = self.normalizer.normalize(f(ctx), &feature.name)?;
                    names.push(feature.name.clone());
                    values.push(v as f32);
                }
                Extractor::Hue(f) => {
                    let slots = feature.slot_names();
                    for slot in &slots {
                        self.normalizer.spec(slot)?;
                    }
                    let (cos, sin) = f(ctx).map_or((0.0, 0.0), normalize_circular);
                    names.extend(slots);
                    values.push(cos as f32);
                    values.push(sin as f32);
                }
                Extractor::OneHot { select, .. } => {
                    let selected = select(ctx);
                    for (i, slot) in feature.slot_names().into_iter().enumerate() {
                        self.normalizer.spec(&slot)?;
                        names.push(slot);
                        values.push(if selected == Some(i) { 1.0 } else { 0.0 });
                    }
                }
                Extractor::Reserved => {
                    self.normalizer.spec(&feature.name)?;
                    names.push(feature.name.clone());
                    values.push(0.0);
                }
            }
        }

        if values.len() != shape.dimension {
            return Err(FeatureError::DimensionMismatch {
                shape: shape.name.clone(),
                expected: shape.dimension,
                actual: values.len(),
            });
        }

        Ok(FeatureVector {
            shape: self.key(shape),
            names,
            interpretable: values,
        })
    }
}

/// Per-source extraction result
#[derive(Debug, Clone)]
pub struct Extraction {
    pub tokens: SanitizedTokenSet,
    pub personality: BrandPersonality,
    pub vectors: Vec<FeatureVector>,
}

/// Sanitizer, tiering, personality scoring and assembly for one source.
///
/// Pure and synchronous; the personality may be supplied by a semantic
/// classifier instead of the built-in scorer via [`StyleExtractor::assemble_all`].
#[derive(Debug, Clone)]
pub struct StyleExtractor {
    sanitizer: TokenSanitizer,
    tiers: ColorTierClassifier,
    scorer: BrandPersonalityScorer,
    assembler: VectorAssembler,
    shapes: Vec<Shape>,
}

impl Default for StyleExtractor {
    fn default() -> Self {
        Self {
            sanitizer: TokenSanitizer::default(),
            tiers: ColorTierClassifier::default(),
            scorer: BrandPersonalityScorer::default(),
            assembler: VectorAssembler::default(),
            shapes: Shape::builtin(),
        }
    }
}

impl StyleExtractor {
    /// Build an extractor, validating every shape up front
    pub fn new(
        sanitizer: TokenSanitizer,
        tiers: ColorTierClassifier,
        scorer: BrandPersonalityScorer,
        assembler: VectorAssembler,
        shapes: Vec<Shape>,
    ) -> Result<Self> {
        for shape in &shapes {
            assembler.validate(shape)?;
        }
        Ok(Self {
            sanitizer,
            tiers,
            scorer,
            assembler,
            shapes,
        })
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn assembler(&self) -> &VectorAssembler {
        &self.assembler
    }

    pub fn scorer(&self) -> &BrandPersonalityScorer {
        &self.scorer
    }

    pub fn sanitize(&self, doc: &CaptureDocument) -> SanitizedTokenSet {
        self.sanitizer.sanitize_tokens(&doc.tokens, &doc.report)
    }

    pub fn signals(&self, tokens: &SanitizedTokenSet) -> SignalValues {
        SignalValues::extract(tokens, &tokens.report)
    }

    /// Assemble every applicable shape with the given personality
    pub fn assemble_all(&self, tokens: &SanitizedTokenSet, personality: BrandPersonality) -> Result<Vec<FeatureVector>> {
        let ctx = FeatureContext::new(tokens, &self.tiers, personality);
        self.shapes
            .iter()
            .filter(|shape| shape.applies_to(&ctx))
            .map(|shape| self.assembler.assemble(&ctx, shape))
            .collect()
    }

    /// Full heuristic path for one document
    pub fn extract(&self, doc: &CaptureDocument) -> Result<Extraction> {
        let tokens = self.sanitize(doc);
        let personality = self.scorer.score(&tokens, &tokens.report);
        let vectors = self.assemble_all(&tokens, personality)?;
        debug!(
            source = %doc.source_id,
            vectors = vectors.len(),
            issues = tokens.issues.len(),
            "extracted style vectors"
        );
        Ok(Extraction {
            tokens,
            personality,
            vectors,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::normalize::NormalizationSpec;
    use crate::shape::FeatureDef;
    use crate::tokens::{
        ColorTokens, CoherenceScores, CtaTokens, LayoutMetrics, MetricsReport, RawTokenSet, ShapeTokens,
        TypographyTokens,
    };

    pub(crate) fn sample_document(source_id: &str) -> CaptureDocument {
        CaptureDocument {
            source_id: source_id.to_string(),
            tokens: RawTokenSet {
                colors: ColorTokens {
                    primary: vec!["#635bff".into(), "#0a2540".into()],
                    neutral: vec!["#f6f9fc".into(), "#425466".into()],
                    accent: vec!["#00d4ff".into()],
                    background: vec!["#ffffff".into()],
                    text: vec!["#0a2540".into()],
                    ..Default::default()
                },
                typography: TypographyTokens {
                    font_sizes: vec![14.0, 16.0, 18.0, 24.0, 32.0, 48.0],
                    font_weights: vec![400.0, 500.0, 700.0],
                    line_heights: vec![1.4, 1.5, 1.2],
                    font_families: vec!["Inter".into(), "Sohne".into()],
                },
                spacing: vec![4.0, 8.0, 16.0, 24.0, 32.0, 64.0],
                shape: ShapeTokens {
                    border_radii: vec![4.0, 8.0, 9999.0],
                    border_widths: vec![1.0, 1.0, 2.0],
                    shadows: vec!["0 2px 4px rgba(0,0,0,0.1)".into(), "none".into()],
                },
                layout: LayoutMetrics {
                    density_score: Some(0.6),
                    whitespace_ratio: Some(0.72),
                    image_text_ratio: Some(0.3),
                    grouping_strength: Some(0.8),
                    compositional_complexity: Some(0.4),
                },
                cta: Some(CtaTokens {
                    background: Some("#635bff".into()),
                    text_color: Some("#ffffff".into()),
                    border_radius: Some(6.0),
                    font_size: Some(15.0),
                    font_weight: Some(600.0),
                    padding_x: Some(20.0),
                    padding_y: Some(10.0),
                    has_shadow: Some(false),
                }),
            },
            report: MetricsReport {
                contrast_pass_rate: Some(0.9),
                coherence: CoherenceScores {
                    color: Some(0.8),
                    typography: Some(0.75),
                    spacing: Some(0.7),
                    shape: Some(0.85),
                },
                harmony_score: Some(0.65),
                design_maturity: Some(0.8),
            },
        }
    }

    #[test]
    fn test_builtin_shapes_assemble_to_declared_dimension() {
        let extractor = StyleExtractor::default();
        let extraction = extractor.extract(&sample_document("stripe.com")).unwrap();
        assert_eq!(extraction.vectors.len(), 2);
        for vector in &extraction.vectors {
            let shape = Shape::builtin_by_name(&vector.shape.name).unwrap();
            assert_eq!(vector.len(), shape.dimension);
            assert_eq!(vector.names, shape.slot_names());
        }
    }

    #[test]
    fn test_values_bounded() {
        let extraction = StyleExtractor::default().extract(&sample_document("a")).unwrap();
        for vector in &extraction.vectors {
            for (name, v) in vector.iter() {
                assert!(v.is_finite(), "{} is not finite", name);
                if name.ends_with("_cos") || name.ends_with("_sin") {
                    assert!((-1.0..=1.0).contains(&v), "{} = {}", name, v);
                } else {
                    assert!((0.0..=1.0).contains(&v), "{} = {}", name, v);
                }
            }
        }
    }

    #[test]
    fn test_assembly_is_deterministic() {
        let extractor = StyleExtractor::default();
        let a = extractor.extract(&sample_document("a")).unwrap();
        let b = extractor.extract(&sample_document("a")).unwrap();
        assert_eq!(a.vectors, b.vectors);
        let bytes_a: Vec<u32> = a.vectors[0].interpretable.iter().map(|v| v.to_bits()).collect();
        let bytes_b: Vec<u32> = b.vectors[0].interpretable.iter().map(|v| v.to_bits()).collect();
        assert_eq!(bytes_a, bytes_b);
    }

    #[test]
    fn test_identical_tokens_have_cosine_one() {
        let extractor = StyleExtractor::default();
        let a = extractor.extract(&sample_document("a")).unwrap();
        let b = extractor.extract(&sample_document("b")).unwrap();
        let sim = a.vectors[0].unit_vector().cosine_similarity(&b.vectors[0].unit_vector());
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_monochrome_palettes_share_hue_slots() {
        let extractor = StyleExtractor::default();
        let hue_slots = |hex: &str| {
            let mut doc = sample_document(hex);
            doc.tokens.colors = ColorTokens {
                primary: vec![hex.into()],
                ..Default::default()
            };
            if let Some(cta) = doc.tokens.cta.as_mut() {
                cta.background = Some(hex.into());
            }
            let extraction = extractor.extract(&doc).unwrap();
            let global = &extraction.vectors[0];
            let cta = &extraction.vectors[1];
            [
                global.get("color_dominant_hue_cos").unwrap(),
                global.get("color_dominant_hue_sin").unwrap(),
                cta.get("cta_bg_hue_cos").unwrap(),
                cta.get("cta_bg_hue_sin").unwrap(),
            ]
        };

        assert_eq!(hue_slots("#ffffff"), [0.0; 4]);
        assert_eq!(hue_slots("#808080"), [0.0; 4]);
        assert_eq!(hue_slots("#000000"), [0.0; 4]);
        assert_ne!(hue_slots("#635bff"), [0.0; 4]);
    }

    #[test]
    fn test_cta_shape_skipped_without_cta() {
        let mut doc = sample_document("no-cta");
        doc.tokens.cta = None;
        let extraction = StyleExtractor::default().extract(&doc).unwrap();
        assert_eq!(extraction.vectors.len(), 1);
        assert_eq!(extraction.vectors[0].shape.name, crate::shape::GLOBAL_STYLE);
    }

    #[test]
    fn test_named_features() {
        let extraction = StyleExtractor::default().extract(&sample_document("a")).unwrap();
        let global = &extraction.vectors[0];
        assert!((global.get("spacing_whitespace_ratio").unwrap() - 0.72).abs() < 1e-6);
        assert_eq!(global.get("reserved_0"), Some(0.0));
        let tone_slots: f32 = global
            .iter()
            .filter(|(n, _)| n.starts_with("personality_tone_"))
            .map(|(_, v)| v)
            .sum();
        assert_eq!(tone_slots, 1.0);

        let cta = &extraction.vectors[1];
        let tier_slots: f32 = cta.iter().filter(|(n, _)| n.starts_with("cta_tier_")).map(|(_, v)| v).sum();
        assert_eq!(tier_slots, 1.0);
    }

    #[test]
    fn test_unknown_feature_is_fatal() {
        let mut shape = Shape::global_style();
        shape.features.push(FeatureDef::scalar("not_registered", |_| 1.0));
        shape.dimension += 1;

        let assembler = VectorAssembler::default();
        assert_eq!(
            assembler.validate(&shape),
            Err(FeatureError::UnknownFeature("not_registered".to_string()))
        );

        let doc = sample_document("a");
        let tokens = TokenSanitizer::default().sanitize_tokens(&doc.tokens, &doc.report);
        let ctx = FeatureContext::new(&tokens, &ColorTierClassifier::default(), BrandPersonality::default());
        assert!(matches!(
            assembler.assemble(&ctx, &shape),
            Err(FeatureError::UnknownFeature(_))
        ));
    }

    #[test]
    fn test_dimension_mismatch_is_fatal() {
        let mut shape = Shape::cta_role();
        shape.dimension = 17;

        let doc = sample_document("a");
        let tokens = TokenSanitizer::default().sanitize_tokens(&doc.tokens, &doc.report);
        let ctx = FeatureContext::new(&tokens, &ColorTierClassifier::default(), BrandPersonality::default());
        let err = VectorAssembler::default().assemble(&ctx, &shape).unwrap_err();
        assert_eq!(
            err,
            FeatureError::DimensionMismatch {
                shape: "cta_role".to_string(),
                expected: 17,
                actual: 16,
            }
        );

        assert!(StyleExtractor::new(
            TokenSanitizer::default(),
            ColorTierClassifier::default(),
            BrandPersonalityScorer::default(),
            VectorAssembler::default(),
            vec![shape],
        )
        .is_err());
    }

    #[test]
    fn test_custom_shape_with_custom_normalizer() {
        let mut normalizer = FeatureNormalizer::new("norm-test");
        normalizer
            .register("palette", NormalizationSpec::min_max(0.0, 10.0))
            .unwrap();
        let shape = Shape {
            name: "tiny".to_string(),
            version: 3,
            dimension: 1,
            features: vec![FeatureDef::scalar("palette", |c| c.tokens.colors.len() as f64)],
            requires_cta: false,
        };

        let doc = sample_document("a");
        let tokens = TokenSanitizer::default().sanitize_tokens(&doc.tokens, &doc.report);
        let ctx = FeatureContext::new(&tokens, &ColorTierClassifier::default(), BrandPersonality::default());
        let vector = VectorAssembler::new(normalizer).assemble(&ctx, &shape).unwrap();
        assert_eq!(vector.shape.to_string(), "tiny@v3/norm-test");
        assert!((vector.interpretable[0] - tokens.colors.len() as f32 / 10.0).abs() < 1e-6);
    }
}
