//! Semantic personality classification with heuristic fallback.
//!
//! A [`SemanticClassifier`] turns a [`ClassificationRequest`] into a
//! [`BrandPersonality`]. Two implementations ship: [`HeuristicClassifier`]
//! (the rule table, always available) and [`HttpClassifier`] (a remote,
//! model-backed service). [`PersonalityResolver`] prefers the model when one
//! is configured, bounds it with a timeout and falls back to the heuristic on
//! any failure. Every fallback is logged and recorded in the outcome so
//! downstream consumers can tell model labels from heuristic ones.

use crate::personality::{BrandPersonality, BrandPersonalityScorer, Energy, SignalValues, Tone, TrustLevel};
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default bound on one model-backed classification
pub const DEFAULT_CLASSIFIER_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassifierError {
    #[error("Classifier timed out after {0:?}")]
    Timeout(Duration),

    #[error("Classifier unavailable: {0}")]
    Unavailable(String),

    #[error("Classifier transport error: {0}")]
    Transport(String),

    #[error("Classifier returned an invalid response: {0}")]
    InvalidResponse(String),
}

/// Which strategy produced a personality label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelSource {
    Model,
    Heuristic,
}

/// Signal summary sent to a classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationRequest {
    pub source_id: String,
    pub signals: SignalValues,
}

pub trait SemanticClassifier: Send + Sync {
    fn name(&self) -> &str;

    fn classify<'a>(
        &'a self,
        request: &'a ClassificationRequest,
    ) -> BoxFuture<'a, Result<BrandPersonality, ClassifierError>>;
}

/// Rule-table classifier; never fails
#[derive(Debug, Clone, Default)]
pub struct HeuristicClassifier {
    scorer: BrandPersonalityScorer,
}

impl HeuristicClassifier {
    pub fn new(scorer: BrandPersonalityScorer) -> Self {
        Self { scorer }
    }

    pub fn classify_now(&self, request: &ClassificationRequest) -> BrandPersonality {
        self.scorer.evaluate(&request.signals)
    }
}

impl SemanticClassifier for HeuristicClassifier {
    fn name(&self) -> &str {
        "heuristic"
    }

    fn classify<'a>(
        &'a self,
        request: &'a ClassificationRequest,
    ) -> BoxFuture<'a, Result<BrandPersonality, ClassifierError>> {
        Box::pin(futures_util::future::ready(Ok(self.classify_now(request))))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelResponse {
    tone: Tone,
    energy: Energy,
    trust_level: TrustLevel,
    confidence: f64,
}

/// Model-backed classifier reached over HTTP.
///
/// POSTs the request as JSON and expects
/// `{"tone", "energy", "trustLevel", "confidence"}` back.
#[derive(Debug, Clone)]
pub struct HttpClassifier {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpClassifier {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ClassifierError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClassifierError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post(&self, request: &ClassificationRequest) -> Result<BrandPersonality, ClassifierError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    ClassifierError::Unavailable(e.to_string())
                } else if e.is_timeout() {
                    ClassifierError::Timeout(Duration::ZERO)
                } else {
                    ClassifierError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClassifierError::Unavailable(format!("HTTP {}", status)));
        }

        let body: ModelResponse = response
            .json()
            .await
            .map_err(|e| ClassifierError::InvalidResponse(e.to_string()))?;

        if !(0.0..=1.0).contains(&body.confidence) {
            return Err(ClassifierError::InvalidResponse(format!(
                "confidence {} outside [0, 1]",
                body.confidence
            )));
        }

        Ok(BrandPersonality {
            tone: body.tone,
            energy: body.energy,
            trust_level: body.trust_level,
            confidence: body.confidence,
        })
    }
}

impl SemanticClassifier for HttpClassifier {
    fn name(&self) -> &str {
        "http"
    }

    fn classify<'a>(
        &'a self,
        request: &'a ClassificationRequest,
    ) -> BoxFuture<'a, Result<BrandPersonality, ClassifierError>> {
        Box::pin(self.post(request))
    }
}

/// Outcome of resolving one source's personality
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub personality: BrandPersonality,
    pub label_source: LabelSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
}

impl Resolution {
    pub fn metadata(&self) -> serde_json::Value {
        serde_json::json!({
            "labelSource": self.label_source,
            "fallbackReason": self.fallback_reason,
        })
    }
}

/// Picks the model-backed classifier when configured, otherwise the heuristic
#[derive(Clone)]
pub struct PersonalityResolver {
    heuristic: HeuristicClassifier,
    model: Option<Arc<dyn SemanticClassifier>>,
    timeout: Duration,
}

impl std::fmt::Debug for PersonalityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersonalityResolver")
            .field("model", &self.model.as_ref().map(|m| m.name().to_string()))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl PersonalityResolver {
    pub fn heuristic_only(scorer: BrandPersonalityScorer) -> Self {
        Self {
            heuristic: HeuristicClassifier::new(scorer),
            model: None,
            timeout: DEFAULT_CLASSIFIER_TIMEOUT,
        }
    }

    pub fn with_model(scorer: BrandPersonalityScorer, model: Arc<dyn SemanticClassifier>, timeout: Duration) -> Self {
        Self {
            heuristic: HeuristicClassifier::new(scorer),
            model: Some(model),
            timeout,
        }
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    pub fn heuristic(&self, request: &ClassificationRequest) -> Resolution {
        Resolution {
            personality: self.heuristic.classify_now(request),
            label_source: LabelSource::Heuristic,
            fallback_reason: None,
        }
    }

    pub async fn resolve(&self, request: &ClassificationRequest) -> Resolution {
        let Some(model) = &self.model else {
            return self.heuristic(request);
        };

        let error = match tokio::time::timeout(self.timeout, model.classify(request)).await {
            Ok(Ok(personality)) => {
                debug!(source = %request.source_id, classifier = model.name(), "model classification");
                return Resolution {
                    personality,
                    label_source: LabelSource::Model,
                    fallback_reason: None,
                };
            }
            Ok(Err(e)) => e,
            Err(_) => ClassifierError::Timeout(self.timeout),
        };

        warn!(
            source = %request.source_id,
            classifier = model.name(),
            error = %error,
            "semantic classifier failed, falling back to heuristic"
        );
        Resolution {
            fallback_reason: Some(error.to_string()),
            ..self.heuristic(request)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ClassificationRequest {
        ClassificationRequest {
            source_id: "example.com".to_string(),
            signals: SignalValues {
                mean_saturation: 70.0,
                mean_radius: 4.0,
                palette_size: 14.0,
                font_family_count: 2.0,
                coherence: [0.6; 4],
                shadow_count: 2.0,
                contrast_pass_rate: 0.7,
                design_maturity: 0.6,
            },
        }
    }

    struct Fixed(BrandPersonality);

    impl SemanticClassifier for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn classify<'a>(
            &'a self,
            _request: &'a ClassificationRequest,
        ) -> BoxFuture<'a, Result<BrandPersonality, ClassifierError>> {
            Box::pin(futures_util::future::ready(Ok(self.0)))
        }
    }

    struct Slow;

    impl SemanticClassifier for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        fn classify<'a>(
            &'a self,
            _request: &'a ClassificationRequest,
        ) -> BoxFuture<'a, Result<BrandPersonality, ClassifierError>> {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(BrandPersonality::default())
            })
        }
    }

    struct Broken;

    impl SemanticClassifier for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn classify<'a>(
            &'a self,
            _request: &'a ClassificationRequest,
        ) -> BoxFuture<'a, Result<BrandPersonality, ClassifierError>> {
            Box::pin(futures_util::future::ready(Err(ClassifierError::InvalidResponse(
                "missing tone".to_string(),
            ))))
        }
    }

    #[tokio::test]
    async fn test_heuristic_only() {
        let resolver = PersonalityResolver::heuristic_only(BrandPersonalityScorer::default());
        let resolution = resolver.resolve(&request()).await;
        assert_eq!(resolution.label_source, LabelSource::Heuristic);
        assert!(resolution.fallback_reason.is_none());
        assert_eq!(resolution.personality.energy, Energy::Energetic);
    }

    #[tokio::test]
    async fn test_model_label_used_when_available() {
        let label = BrandPersonality {
            tone: Tone::Elegant,
            energy: Energy::Calm,
            trust_level: TrustLevel::Conservative,
            confidence: 0.9,
        };
        let resolver = PersonalityResolver::with_model(
            BrandPersonalityScorer::default(),
            Arc::new(Fixed(label)),
            Duration::from_secs(1),
        );
        let resolution = resolver.resolve(&request()).await;
        assert_eq!(resolution.label_source, LabelSource::Model);
        assert_eq!(resolution.personality, label);
        assert_eq!(resolution.metadata()["labelSource"], "model");
    }

    #[tokio::test]
    async fn test_timeout_falls_back() {
        let resolver = PersonalityResolver::with_model(
            BrandPersonalityScorer::default(),
            Arc::new(Slow),
            Duration::from_millis(20),
        );
        let resolution = resolver.resolve(&request()).await;
        assert_eq!(resolution.label_source, LabelSource::Heuristic);
        assert!(resolution.fallback_reason.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_error_falls_back_with_reason() {
        let resolver = PersonalityResolver::with_model(
            BrandPersonalityScorer::default(),
            Arc::new(Broken),
            Duration::from_secs(1),
        );
        let resolution = resolver.resolve(&request()).await;
        assert_eq!(resolution.label_source, LabelSource::Heuristic);
        assert_eq!(
            resolution.personality,
            HeuristicClassifier::default().classify_now(&request())
        );
        let meta = resolution.metadata();
        assert_eq!(meta["labelSource"], "heuristic");
        assert!(meta["fallbackReason"].as_str().unwrap().contains("missing tone"));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_falls_back() {
        let http = HttpClassifier::new("http://127.0.0.1:9/classify", Duration::from_millis(500)).unwrap();
        let resolver =
            PersonalityResolver::with_model(BrandPersonalityScorer::default(), Arc::new(http), Duration::from_secs(2));
        let resolution = resolver.resolve(&request()).await;
        assert_eq!(resolution.label_source, LabelSource::Heuristic);
        assert!(resolution.fallback_reason.is_some());
    }

    #[test]
    fn test_model_response_parsing() {
        let body: ModelResponse =
            serde_json::from_str(r#"{"tone":"playful","energy":"energetic","trustLevel":"experimental","confidence":0.4}"#)
                .unwrap();
        assert_eq!(body.tone, Tone::Playful);
        assert_eq!(body.trust_level, TrustLevel::Experimental);
    }
}
