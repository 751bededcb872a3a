//! Batch ingestion.
//!
//! Each source is processed independently: sanitize, resolve personality
//! (model-backed with timeout, or heuristic), assemble every shape on a
//! blocking thread and write the record there. A semaphore bounds how many
//! sources are in flight. A failure, including a panic, is reported against
//! its source and never aborts the batch.
//!
//! ```text
//!   docs ─► JoinSet ─┬─ permit ─► sanitize ─► resolve ─► spawn_blocking(assemble, put)
//!                    ├─ permit ─► ...
//!                    └─ (waits for a permit)
//! ```

use crate::manager::StyleStore;
use crate::record::SourceRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use stylevec_features::{
    CaptureDocument, ClassificationRequest, FeatureError, LabelSource, PersonalityResolver, StyleExtractor,
    NORMALIZATION_VERSION,
};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error(transparent)]
    Feature(#[from] FeatureError),

    #[error(transparent)]
    Store(#[from] stylevec_core::Error),

    #[error("Ingestion task failed: {0}")]
    TaskFailed(String),
}

impl IngestError {
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::InvalidDocument(_) => "invalid_document",
            IngestError::Feature(FeatureError::UnknownFeature(_)) => "unknown_feature",
            IngestError::Feature(FeatureError::DimensionMismatch { .. }) => "dimension_mismatch",
            IngestError::Feature(_) => "feature",
            IngestError::Store(_) => "storage",
            IngestError::TaskFailed(_) => "task_failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestOutcome {
    pub source_id: String,
    pub shapes: Vec<String>,
    pub label_source: LabelSource,
    pub issues: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestFailure {
    pub source_id: String,
    pub kind: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// In input order
    pub succeeded: Vec<IngestOutcome>,
    /// In input order
    pub failed: Vec<IngestFailure>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

#[derive(Clone)]
pub struct IngestPipeline {
    store: Arc<StyleStore>,
    extractor: Arc<StyleExtractor>,
    resolver: Arc<PersonalityResolver>,
    pool_size: usize,
}

impl IngestPipeline {
    pub fn new(
        store: Arc<StyleStore>,
        extractor: StyleExtractor,
        resolver: PersonalityResolver,
        pool_size: usize,
    ) -> Self {
        Self {
            store,
            extractor: Arc::new(extractor),
            resolver: Arc::new(resolver),
            pool_size: pool_size.max(1),
        }
    }

    pub fn store(&self) -> &Arc<StyleStore> {
        &self.store
    }

    /// Process one document end to end
    pub async fn ingest_one(&self, doc: CaptureDocument) -> Result<IngestOutcome, IngestError> {
        if doc.source_id.trim().is_empty() {
            return Err(IngestError::InvalidDocument("missing sourceId".to_string()));
        }

        let extractor = self.extractor.clone();
        let tokens = extractor.sanitize(&doc);
        let request = ClassificationRequest {
            source_id: doc.source_id.clone(),
            signals: extractor.signals(&tokens),
        };
        let resolution = self.resolver.resolve(&request).await;

        let personality = resolution.personality;
        let store = self.store.clone();
        // assembly and the WAL append plus fsync stay off the async workers
        let outcome = tokio::task::spawn_blocking(move || -> Result<IngestOutcome, IngestError> {
            let vectors = extractor.assemble_all(&tokens, personality)?;
            let outcome = IngestOutcome {
                source_id: doc.source_id.clone(),
                shapes: vectors.iter().map(|v| v.shape.to_string()).collect(),
                label_source: resolution.label_source,
                issues: tokens.issues.len(),
            };
            store.put(SourceRecord {
                source_id: doc.source_id.into(),
                vectors,
                personality,
                label_source: resolution.label_source,
                fallback_reason: resolution.fallback_reason,
                tokens,
                normalization_version: NORMALIZATION_VERSION.to_string(),
                inserted_at: Utc::now(),
                revision: 0,
            })?;
            Ok(outcome)
        })
        .await
        .map_err(|e| IngestError::TaskFailed(e.to_string()))??;

        debug!(source = %outcome.source_id, shapes = outcome.shapes.len(), "ingested");
        Ok(outcome)
    }

    /// Process a batch with at most `pool_size` sources in flight
    pub async fn ingest_batch(&self, docs: Vec<CaptureDocument>) -> BatchReport {
        let batch_id = Uuid::new_v4();
        let started_at = Utc::now();
        let semaphore = Arc::new(Semaphore::new(self.pool_size));
        let total = docs.len();
        info!(%batch_id, sources = total, pool_size = self.pool_size, "batch started");

        let mut tasks = JoinSet::new();
        for (position, doc) in docs.into_iter().enumerate() {
            let pipeline = self.clone();
            let semaphore = semaphore.clone();
            let source_id = doc.source_id.clone();
            tasks.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => {
                        // inner task so a panic is caught here, next to its source id
                        tokio::spawn(async move { pipeline.ingest_one(doc).await })
                            .await
                            .unwrap_or_else(|e| Err(IngestError::TaskFailed(e.to_string())))
                    }
                    Err(e) => Err(IngestError::TaskFailed(e.to_string())),
                };
                (position, source_id, result)
            });
        }

        let mut results = Vec::with_capacity(total);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(entry) => results.push(entry),
                Err(e) => warn!(%batch_id, error = %e, "ingestion task lost"),
            }
        }
        results.sort_by_key(|(position, _, _)| *position);

        let mut report = BatchReport {
            batch_id,
            started_at,
            succeeded: Vec::new(),
            failed: Vec::new(),
        };
        for (_, source_id, result) in results {
            match result {
                Ok(outcome) => report.succeeded.push(outcome),
                Err(e) => {
                    warn!(%batch_id, source = %source_id, kind = e.kind(), error = %e, "source failed");
                    report.failed.push(IngestFailure {
                        source_id,
                        kind: e.kind().to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            %batch_id,
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "batch finished"
        );
        report
    }
}
