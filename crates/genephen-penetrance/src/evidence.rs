//! The record produced for every processed document.

use chrono::{DateTime, Utc};
use genephen_common::{Genotype, PhenotypeObservation, Sex};
use serde::{Deserialize, Serialize};

use crate::cohort::CohortRecord;
use crate::family::FamilyStudy;

/// Outcome of the relevance gate for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Disposition {
    Extracted {
        #[serde(default)]
        confidence: Option<f64>,
    },
    FilteredOut {
        reason: String,
        confidence: f64,
    },
}

/// Structured evidence from one document.
///
/// A record carries the flat single-patient fields (`variant`, `genotype`,
/// `phenotypes`, ...), cohort counts, a family study, or any combination.
/// Filtered-out records keep only the rejection reason and confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub source_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub journal: Option<String>,
    #[serde(default)]
    pub publication_date: Option<String>,

    #[serde(default)]
    pub gene: Option<String>,
    #[serde(default)]
    pub variant: Option<String>,
    #[serde(default)]
    pub genotype: Genotype,
    #[serde(default)]
    pub phenotypes: Vec<PhenotypeObservation>,
    #[serde(default)]
    pub age: Option<f64>,
    #[serde(default)]
    pub sex: Option<Sex>,
    #[serde(default)]
    pub treatment: Option<String>,
    #[serde(default)]
    pub outcome: Option<String>,

    #[serde(default)]
    pub cohorts: Vec<CohortRecord>,
    #[serde(default)]
    pub family: Option<FamilyStudy>,

    pub disposition: Disposition,
    pub extracted_at: DateTime<Utc>,
}

impl EvidenceRecord {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            title: None,
            journal: None,
            publication_date: None,
            gene: None,
            variant: None,
            genotype: Genotype::Unknown,
            phenotypes: Vec::new(),
            age: None,
            sex: None,
            treatment: None,
            outcome: None,
            cohorts: Vec::new(),
            family: None,
            disposition: Disposition::Extracted { confidence: None },
            extracted_at: Utc::now(),
        }
    }

    /// Empty record that keeps the gate's reason for the audit trail.
    pub fn filtered_out(source_id: impl Into<String>, reason: impl Into<String>, confidence: f64) -> Self {
        Self {
            disposition: Disposition::FilteredOut {
                reason: reason.into(),
                confidence,
            },
            ..Self::new(source_id)
        }
    }

    pub fn is_filtered_out(&self) -> bool {
        matches!(self.disposition, Disposition::FilteredOut { .. })
    }

    pub fn filter_reason(&self) -> Option<&str> {
        match &self.disposition {
            Disposition::FilteredOut { reason, .. } => Some(reason),
            Disposition::Extracted { .. } => None,
        }
    }

    /// No variant, phenotype, cohort or family data.
    pub fn has_no_evidence(&self) -> bool {
        self.variant.as_deref().map_or(true, |v| v.trim().is_empty())
            && self.phenotypes.is_empty()
            && self.cohorts.is_empty()
            && self.family.is_none()
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        if let Disposition::Extracted { confidence: c } = &mut self.disposition {
            *c = Some(confidence);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_filtered_out_keeps_reason() {
        let r = EvidenceRecord::filtered_out("123", "review article", 0.4);
        assert!(r.is_filtered_out());
        assert!(r.has_no_evidence());
        assert_eq!(r.filter_reason(), Some("review article"));

        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["disposition"]["status"], "filtered_out");
        assert_eq!(json["disposition"]["confidence"], 0.4);
    }

    #[test]
    fn test_extracted_confidence() {
        let r = EvidenceRecord::new("1").with_confidence(0.9);
        assert_eq!(r.disposition, Disposition::Extracted { confidence: Some(0.9) });
        assert_eq!(r.filter_reason(), None);
        // No effect on a filtered record.
        let f = EvidenceRecord::filtered_out("1", "x", 0.1).with_confidence(0.9);
        assert!(f.is_filtered_out());
    }
}
