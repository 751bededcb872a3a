//! # StyleVec
//!
//! Deterministic style fingerprints for captured web sources.
//!
//! StyleVec turns the design tokens extracted from a page (colors, type
//! scale, spacing, radii, layout metrics and the primary call-to-action)
//! into fixed-length, L2-normalized vectors, one per versioned shape, and
//! answers "which sources look most like this one" with an exact k-NN scan.
//!
//! ## Quick Start
//!
//! ### As a CLI
//!
//! ```bash
//! stylevec --data-dir ./data ingest captures/*.json
//! stylevec --data-dir ./data query stripe.com --shape global_style -k 5
//! stylevec --data-dir ./data compare stripe.com linear.app
//! ```
//!
//! ### As a Library
//!
//! ```rust
//! use stylevec::prelude::*;
//!
//! let doc: CaptureDocument = serde_json::from_str(r##"{
//!     "sourceId": "stripe.com",
//!     "tokens": {
//!         "colors": { "primary": ["#635bff"], "neutral": ["#ffffff", "#0a2540"] },
//!         "typography": { "fontSizes": [14, 16, 48] },
//!         "spacing": [4, 8, 16]
//!     }
//! }"##).unwrap();
//!
//! let extraction = StyleExtractor::default().extract(&doc).unwrap();
//! let global = &extraction.vectors[0];
//! assert_eq!(global.len(), 64);
//!
//! let store = StyleStore::in_memory(Distance::Euclidean);
//! assert!(store.is_empty());
//! ```
//!
//! ## Crate Structure
//!
//! - `stylevec-core` - vectors, shape keys and the exact similarity index
//! - `stylevec-features` - sanitizer, color tiers, personality, normalizer, shapes
//! - `stylevec-storage` - style store, WAL, dumps, snapshots and batch ingestion

// Re-export core types
pub use stylevec_core::{Distance, Error, IndexConfig, Neighbor, Result, ShapeKey, SimilarityIndex, SourceId, Vector};

// Re-export feature engineering
pub use stylevec_features::{
    compare, describe_traits, BrandPersonality, BrandPersonalityScorer, CaptureDocument, ColorTierClassifier,
    FeatureError, FeatureNormalizer, FeatureVector, PersonalityResolver, SanitizedTokenSet, Shape, StyleComparison,
    StyleExtractor, TokenSanitizer, VectorAssembler,
};

// Re-export storage
pub use stylevec_storage::{BatchReport, IngestPipeline, PipelineConfig, SourceRecord, StyleStore};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        compare, BatchReport, BrandPersonality, CaptureDocument, Distance, Error, FeatureVector, IngestPipeline,
        Neighbor, PipelineConfig, Result, ShapeKey, SourceId, SourceRecord, StyleExtractor, StyleStore, Vector,
    };
}
