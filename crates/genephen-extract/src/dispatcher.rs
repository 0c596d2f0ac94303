//! Two-stage extraction dispatcher.
//!
//! Every item ends either `Extracted` or `FilteredOut`. Filtered items still
//! produce a record carrying the rejection reason and confidence. A failing
//! classifier fails open with confidence 0.5, which the default 0.7
//! threshold still filters; lower the threshold to let such items through.

use genephen_common::{DispatcherConfig, Result as CommonResult};
use genephen_penetrance::EvidenceRecord;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::capability::{EvidenceExtractor, RelevanceClassifier, RelevanceVerdict};
use crate::error::ExtractionError;

const FAIL_OPEN_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherStats {
    pub extracted: u64,
    pub skipped: u64,
    pub classifier_failures: u64,
}

/// One document awaiting dispatch.
#[derive(Debug, Clone)]
pub struct DispatchItem {
    pub source_id: String,
    pub text: String,
}

pub struct EvidenceExtractionDispatcher {
    classifier: Arc<dyn RelevanceClassifier>,
    extractor: Arc<dyn EvidenceExtractor>,
    config: DispatcherConfig,
    extracted: AtomicU64,
    skipped: AtomicU64,
    classifier_failures: AtomicU64,
}

impl EvidenceExtractionDispatcher {
    pub fn new(
        classifier: Arc<dyn RelevanceClassifier>,
        extractor: Arc<dyn EvidenceExtractor>,
        config: DispatcherConfig,
    ) -> CommonResult<Self> {
        config.validate()?;
        info!(min_confidence = config.min_confidence, "Evidence dispatcher ready");
        Ok(Self {
            classifier,
            extractor,
            config,
            extracted: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            classifier_failures: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Counters since construction. They only ever grow.
    pub fn stats(&self) -> DispatcherStats {
        DispatcherStats {
            extracted: self.extracted.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            classifier_failures: self.classifier_failures.load(Ordering::Relaxed),
        }
    }

    async fn relevance(&self, source_id: &str, text: &str) -> RelevanceVerdict {
        match self
            .classifier
            .classify(text, self.config.query_context.as_deref())
            .await
        {
            Ok(verdict) => verdict,
            Err(e) => {
                self.classifier_failures.fetch_add(1, Ordering::Relaxed);
                warn!(source = source_id, error = %e, "Relevance classifier failed; assuming relevant");
                RelevanceVerdict::new(true, FAIL_OPEN_CONFIDENCE, format!("classifier error: {e}"))
            }
        }
    }

    /// Classify, gate, and extract one document. Errors come only from the
    /// extraction stage; a filtered item is `Ok`.
    #[instrument(skip(self, text), fields(chars = text.len()))]
    pub async fn dispatch(&self, source_id: &str, text: &str) -> Result<EvidenceRecord, ExtractionError> {
        let verdict = self.relevance(source_id, text).await;

        if !verdict.is_relevant || verdict.confidence < self.config.min_confidence {
            self.skipped.fetch_add(1, Ordering::Relaxed);
            info!(
                source = source_id,
                relevant = verdict.is_relevant,
                confidence = verdict.confidence,
                threshold = self.config.min_confidence,
                reason = %verdict.reason,
                "Filtered out before extraction"
            );
            return Ok(EvidenceRecord::filtered_out(source_id, verdict.reason, verdict.confidence));
        }

        self.extracted.fetch_add(1, Ordering::Relaxed);
        info!(source = source_id, confidence = verdict.confidence, "Running full extraction");
        let mut record = self.extractor.extract(text, source_id).await?;
        record.source_id = source_id.to_string();
        Ok(record.with_confidence(verdict.confidence))
    }

    /// Sequential; one item's failure never stops the rest. Results are in
    /// input order.
    pub async fn dispatch_batch(
        &self,
        items: &[DispatchItem],
    ) -> Vec<Result<EvidenceRecord, ExtractionError>> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let result = self.dispatch(&item.source_id, &item.text).await;
            if let Err(e) = &result {
                warn!(source = %item.source_id, error = %e, "Extraction failed");
            }
            out.push(result);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use genephen_penetrance::Disposition;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use tracing_test::traced_test;

    /// Verdict by source id, keyed through the text (the tests pass the id as text).
    struct ScriptedClassifier(HashMap<&'static str, Option<(bool, f64)>>);

    #[async_trait]
    impl RelevanceClassifier for ScriptedClassifier {
        async fn classify(&self, text: &str, _: Option<&str>) -> Result<RelevanceVerdict, ExtractionError> {
            match self.0.get(text).copied().flatten() {
                Some((relevant, confidence)) => Ok(RelevanceVerdict::new(relevant, confidence, "scripted")),
                None => Err(ExtractionError::ApiError { status: 503, message: "overloaded".into() }),
            }
        }
    }

    #[derive(Default)]
    struct CountingExtractor {
        calls: AtomicUsize,
        fail_on: Option<&'static str>,
    }

    #[async_trait]
    impl EvidenceExtractor for CountingExtractor {
        async fn extract(&self, text: &str, source_id: &str) -> Result<EvidenceRecord, ExtractionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on == Some(text) {
                return Err(ExtractionError::Payload("not JSON".into()));
            }
            let mut record = EvidenceRecord::new(source_id);
            record.variant = Some("KCNH2 p.Ser906Leu".into());
            Ok(record)
        }
    }

    fn dispatcher(
        verdicts: &[(&'static str, Option<(bool, f64)>)],
        extractor: Arc<CountingExtractor>,
    ) -> EvidenceExtractionDispatcher {
        let classifier = ScriptedClassifier(verdicts.iter().copied().collect());
        EvidenceExtractionDispatcher::new(Arc::new(classifier), extractor, DispatcherConfig::default()).unwrap()
    }

    fn item(id: &str) -> DispatchItem {
        DispatchItem { source_id: id.to_string(), text: id.to_string() }
    }

    #[tokio::test]
    async fn test_gate_routes_by_confidence() {
        let extractor = Arc::new(CountingExtractor::default());
        let d = dispatcher(&[("low", Some((true, 0.5))), ("high", Some((true, 0.8)))], extractor.clone());

        let results = d.dispatch_batch(&[item("low"), item("high")]).await;
        let low = results[0].as_ref().unwrap();
        let high = results[1].as_ref().unwrap();

        assert_eq!(
            low.disposition,
            Disposition::FilteredOut { reason: "scripted".into(), confidence: 0.5 }
        );
        assert!(low.has_no_evidence());
        assert_eq!(high.disposition, Disposition::Extracted { confidence: Some(0.8) });
        assert_eq!(high.variant.as_deref(), Some("KCNH2 p.Ser906Leu"));

        assert_eq!(d.stats(), DispatcherStats { extracted: 1, skipped: 1, classifier_failures: 0 });
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_threshold_is_inclusive_and_irrelevant_is_skipped() {
        let extractor = Arc::new(CountingExtractor::default());
        let d = dispatcher(&[("edge", Some((true, 0.7))), ("no", Some((false, 0.95)))], extractor.clone());

        assert!(!d.dispatch("edge", "edge").await.unwrap().is_filtered_out());
        assert!(d.dispatch("no", "no").await.unwrap().is_filtered_out());
        assert_eq!(d.stats(), DispatcherStats { extracted: 1, skipped: 1, classifier_failures: 0 });
    }

    #[tokio::test]
    #[traced_test]
    async fn test_classifier_failure_fails_open() {
        let extractor = Arc::new(CountingExtractor::default());
        let d = dispatcher(&[("broken", None)], extractor.clone());

        let record = d.dispatch("broken", "broken").await.unwrap();
        match &record.disposition {
            Disposition::FilteredOut { reason, confidence } => {
                assert_eq!(*confidence, 0.5);
                assert!(reason.contains("overloaded"));
            }
            other => panic!("expected filtered out, got {other:?}"),
        }
        assert!(logs_contain("assuming relevant"));
        assert_eq!(d.stats().classifier_failures, 1);

        let permissive = EvidenceExtractionDispatcher::new(
            Arc::new(ScriptedClassifier(HashMap::new())),
            extractor.clone(),
            DispatcherConfig { min_confidence: 0.5, ..Default::default() },
        )
        .unwrap();
        let record = permissive.dispatch("x", "x").await.unwrap();
        assert_eq!(record.disposition, Disposition::Extracted { confidence: Some(0.5) });
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_batch_isolates_extraction_failures() {
        let extractor = Arc::new(CountingExtractor { fail_on: Some("bad"), ..Default::default() });
        let d = dispatcher(&[("bad", Some((true, 0.9))), ("good", Some((true, 0.9)))], extractor.clone());

        let results = d.dispatch_batch(&[item("bad"), item("good")]).await;
        assert!(matches!(results[0], Err(ExtractionError::Payload(_))));
        assert_eq!(results[1].as_ref().unwrap().source_id, "good");
        assert_eq!(d.stats().extracted, 2);
    }

    #[test]
    fn test_rejects_invalid_threshold() {
        let result = EvidenceExtractionDispatcher::new(
            Arc::new(ScriptedClassifier(HashMap::new())),
            Arc::new(CountingExtractor::default()),
            DispatcherConfig { min_confidence: 2.0, ..Default::default() },
        );
        assert!(result.is_err());
    }
}
