//! # StyleVec Core
//!
//! Core data structures for the StyleVec style-fingerprint store.
//!
//! - [`Vector`] - dense `f32` vector with L2 normalization and distances
//! - [`StoredVector`] - a vector keyed by source identity and shape
//! - [`SimilarityIndex`] - exact k-nearest-neighbor index for one shape
//!
//! ## Example
//!
//! ```rust
//! use stylevec_core::{Distance, IndexConfig, ShapeKey, SimilarityIndex, Vector};
//!
//! let index = SimilarityIndex::new(IndexConfig {
//!     shape: ShapeKey::new("global_style", 1, "norm-v1"),
//!     dimension: 3,
//!     distance: Distance::Euclidean,
//! });
//!
//! index.upsert("stripe.com".into(), Vector::new(vec![0.2, 0.9, 0.1]), serde_json::Value::Null).unwrap();
//! let hits = index.query(&Vector::new(vec![0.2, 0.8, 0.1]), 5).unwrap();
//! assert_eq!(hits.len(), 1);
//! ```

pub mod error;
pub mod index;
pub mod record;
pub mod vector;

pub use error::{Error, Result};
pub use index::{Distance, IndexConfig, SimilarityIndex};
pub use record::{Neighbor, ShapeKey, SourceId, StoredVector};
pub use vector::Vector;
