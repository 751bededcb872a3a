use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use stylevec_core::Distance;
use stylevec_features::classifier::DEFAULT_CLASSIFIER_TIMEOUT;
use stylevec_features::{
    BrandPersonalityScorer, ColorTierClassifier, HttpClassifier, PersonalityResolver, RuleTable, Shape,
    StyleExtractor, TierThresholds, TokenRules, TokenSanitizer, VectorAssembler,
};

/// Model-backed classifier settings; no endpoint means heuristic only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClassifierConfig {
    pub endpoint: Option<String>,
    pub timeout_ms: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_ms: DEFAULT_CLASSIFIER_TIMEOUT.as_millis() as u64,
        }
    }
}

/// Pipeline configuration, loaded from JSON. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineConfig {
    pub token_rules: TokenRules,
    pub tier_thresholds: TierThresholds,
    pub personality_rules: RuleTable,
    /// Sources processed concurrently during batch ingestion
    pub pool_size: usize,
    pub classifier: ClassifierConfig,
    pub distance: Distance,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            token_rules: TokenRules::default(),
            tier_thresholds: TierThresholds::default(),
            personality_rules: RuleTable::default(),
            pool_size: 4,
            classifier: ClassifierConfig::default(),
            distance: Distance::default(),
        }
    }
}

impl PipelineConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            bail!("poolSize must be at least 1");
        }
        if self.classifier.timeout_ms == 0 {
            bail!("classifier.timeoutMs must be positive");
        }
        self.token_rules.validate()?;
        self.tier_thresholds.validate()?;
        self.personality_rules.validate()?;
        Ok(())
    }

    pub fn classifier_timeout(&self) -> Duration {
        Duration::from_millis(self.classifier.timeout_ms)
    }

    pub fn build_extractor(&self) -> Result<StyleExtractor> {
        Ok(StyleExtractor::new(
            TokenSanitizer::new(self.token_rules.clone())?,
            ColorTierClassifier::new(self.tier_thresholds.clone())?,
            BrandPersonalityScorer::new(self.personality_rules.clone())?,
            VectorAssembler::default(),
            Shape::builtin(),
        )?)
    }

    pub fn build_resolver(&self) -> Result<PersonalityResolver> {
        let scorer = BrandPersonalityScorer::new(self.personality_rules.clone())?;
        Ok(match &self.classifier.endpoint {
            Some(endpoint) => {
                let http = HttpClassifier::new(endpoint.clone(), self.classifier_timeout())?;
                PersonalityResolver::with_model(scorer, Arc::new(http), self.classifier_timeout())
            }
            None => PersonalityResolver::heuristic_only(scorer),
        })
    }
}
