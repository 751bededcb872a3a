//! # StyleVec Features
//!
//! Turns a captured site's design tokens into fixed-shape style vectors.
//!
//! ```text
//!   RawTokenSet + MetricsReport
//!            │
//!            ▼
//!     TokenSanitizer ──► ColorTierClassifier
//!            │                  │
//!            ▼                  │
//!   BrandPersonalityScorer /    │
//!   SemanticClassifier          │
//!            │                  ▼
//!            └────────► VectorAssembler ◄── FeatureNormalizer
//!                               │
//!                               ▼
//!                         FeatureVector
//! ```
//!
//! ## Example
//!
//! ```rust
//! use stylevec_features::{CaptureDocument, StyleExtractor};
//!
//! let doc: CaptureDocument = serde_json::from_str(r##"{
//!     "sourceId": "example.com",
//!     "tokens": {
//!         "colors": { "primary": ["#635bff"], "neutral": ["#ffffff", "#0a2540"] },
//!         "typography": { "fontSizes": [14, 16, 32], "fontFamilies": ["Inter"] },
//!         "spacing": [8, 16, 24]
//!     }
//! }"##).unwrap();
//!
//! let extraction = StyleExtractor::default().extract(&doc).unwrap();
//! assert_eq!(extraction.vectors[0].len(), 64);
//! ```

pub mod assembler;
pub mod calibrate;
pub mod classifier;
pub mod color;
pub mod context;
pub mod error;
pub mod explain;
pub mod normalize;
pub mod personality;
pub mod sanitize;
pub mod shape;
pub mod tokens;

pub use assembler::{Extraction, FeatureVector, StyleExtractor, VectorAssembler};
pub use calibrate::{calibrate, CalibrationReport, LabeledCase};
pub use classifier::{
    ClassificationRequest, ClassifierError, HeuristicClassifier, HttpClassifier, LabelSource, PersonalityResolver,
    Resolution, SemanticClassifier,
};
pub use color::{ColorSample, ColorTier, ColorTierClassifier, ColorTiers, TierThresholds};
pub use context::FeatureContext;
pub use error::{DataIssue, FeatureError, IssueKind, Result};
pub use explain::{compare, describe_traits, Differentiation, StyleComparison, DEFAULT_INSIGHTS};
pub use normalize::{l2_normalize, normalize_circular, FeatureNormalizer, NormalizationSpec, NORMALIZATION_VERSION};
pub use personality::{BrandPersonality, BrandPersonalityScorer, Energy, RuleTable, SignalValues, Tone, TrustLevel};
pub use sanitize::{sanitize, SanitizeRule, SanitizedTokenSet, TokenRules, TokenSanitizer};
pub use shape::{Shape, CTA_ROLE, GLOBAL_STYLE};
pub use tokens::{CaptureDocument, MetricsReport, RawTokenSet};
