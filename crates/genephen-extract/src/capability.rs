//! The two narrow contracts the dispatcher depends on.

use async_trait::async_trait;
use genephen_penetrance::EvidenceRecord;
use serde::{Deserialize, Serialize};

use crate::error::ExtractionError;

/// Stage-one answer: is the text worth a full extraction?
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelevanceVerdict {
    pub is_relevant: bool,
    /// Clamped to `[0, 1]`.
    pub confidence: f64,
    #[serde(default)]
    pub reason: String,
}

impl RelevanceVerdict {
    pub fn new(is_relevant: bool, confidence: f64, reason: impl Into<String>) -> Self {
        let confidence = if confidence.is_nan() { 0.0 } else { confidence.clamp(0.0, 1.0) };
        Self {
            is_relevant,
            confidence,
            reason: reason.into(),
        }
    }
}

#[async_trait]
pub trait RelevanceClassifier: Send + Sync {
    async fn classify(
        &self,
        text: &str,
        context: Option<&str>,
    ) -> Result<RelevanceVerdict, ExtractionError>;
}

#[async_trait]
pub trait EvidenceExtractor: Send + Sync {
    /// Full structured record for `text`, tagged with `source_id`.
    async fn extract(&self, text: &str, source_id: &str) -> Result<EvidenceRecord, ExtractionError>;
}
