//! Genetics primitives shared by the extraction and aggregation layers.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{GenephenError, Result};

// ── Genotype ──────────────────────────────────────────────────────────────────

/// Zygosity of an individual (or a cohort) for the variant under study.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Genotype {
    Heterozygous,
    Homozygous,
    CompoundHeterozygous,
    WildType,
    #[default]
    Unknown,
}

impl Genotype {
    /// Heterozygous, homozygous and compound heterozygous individuals carry
    /// the variant. Wild type and unknown do not count as carriers.
    pub fn is_carrier(self) -> bool {
        matches!(
            self,
            Genotype::Heterozygous | Genotype::Homozygous | Genotype::CompoundHeterozygous
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Genotype::Heterozygous => "heterozygous",
            Genotype::Homozygous => "homozygous",
            Genotype::CompoundHeterozygous => "compound_heterozygous",
            Genotype::WildType => "wild_type",
            Genotype::Unknown => "unknown",
        }
    }

    /// Lenient parse of the labels extraction backends actually emit.
    /// Anything unrecognised becomes `Unknown`.
    pub fn parse_lenient(raw: &str) -> Self {
        let key: String = raw
            .trim()
            .to_ascii_lowercase()
            .chars()
            .map(|c| if c == '-' || c == ' ' { '_' } else { c })
            .collect();

        match key.as_str() {
            "heterozygous" | "het" | "heterozygote" | "carrier" => Genotype::Heterozygous,
            "homozygous" | "hom" | "homozygote" => Genotype::Homozygous,
            "compound_heterozygous" | "compound_het" | "compound_heterozygote" => {
                Genotype::CompoundHeterozygous
            }
            "wild_type" | "wildtype" | "wt" | "non_carrier" | "noncarrier" => Genotype::WildType,
            _ => Genotype::Unknown,
        }
    }
}

impl fmt::Display for Genotype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Affected status ───────────────────────────────────────────────────────────

/// Tri-state affected status. `Unknown` means "not reported" and is never
/// treated as unaffected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AffectedStatus {
    Affected,
    Unaffected,
    #[default]
    Unknown,
}

impl AffectedStatus {
    pub fn is_affected(self) -> bool {
        self == AffectedStatus::Affected
    }

    pub fn is_known(self) -> bool {
        self != AffectedStatus::Unknown
    }
}

impl From<Option<bool>> for AffectedStatus {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(true) => AffectedStatus::Affected,
            Some(false) => AffectedStatus::Unaffected,
            None => AffectedStatus::Unknown,
        }
    }
}

impl From<AffectedStatus> for Option<bool> {
    fn from(value: AffectedStatus) -> Self {
        match value {
            AffectedStatus::Affected => Some(true),
            AffectedStatus::Unaffected => Some(false),
            AffectedStatus::Unknown => None,
        }
    }
}

// ── Sex ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Male,
    Female,
    Other,
}

impl Sex {
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "m" | "male" | "man" | "boy" => Some(Sex::Male),
            "f" | "female" | "woman" | "girl" => Some(Sex::Female),
            "" | "unknown" | "n/a" | "na" | "not reported" => None,
            _ => Some(Sex::Other),
        }
    }
}

// ── Phenotype observation ─────────────────────────────────────────────────────

/// One clinical feature reported for an individual or a cohort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhenotypeObservation {
    pub name: String,

    /// Ontology code as reported (e.g. `HP:0001657`). Never looked up here.
    #[serde(default)]
    pub ontology_id: Option<String>,

    #[serde(default)]
    pub onset_age: Option<f64>,

    #[serde(default)]
    pub severity: Option<String>,

    #[serde(default)]
    pub notes: Option<String>,
}

impl PhenotypeObservation {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(GenephenError::Validation(
                "phenotype observation requires a non-empty name".to_string(),
            ));
        }
        Ok(Self {
            name: trimmed.to_string(),
            ontology_id: None,
            onset_age: None,
            severity: None,
            notes: None,
        })
    }

    pub fn with_onset_age(mut self, age: f64) -> Self {
        self.onset_age = Some(age);
        self
    }

    pub fn with_severity(mut self, severity: impl Into<String>) -> Self {
        self.severity = Some(severity.into());
        self
    }

    pub fn with_ontology_id(mut self, id: impl Into<String>) -> Self {
        self.ontology_id = Some(id.into());
        self
    }

    pub fn matches(&self, phenotype: &str) -> bool {
        phenotype_matches(&self.name, phenotype)
    }
}

/// Phenotype names compare trimmed and case-insensitively, by the same
/// rule as [`phenotype_key`].
pub fn phenotype_matches(a: &str, b: &str) -> bool {
    phenotype_key(a) == phenotype_key(b)
}

/// Canonical key for a phenotype name in tallies.
pub fn phenotype_key(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_carrier_classes() {
        assert!(Genotype::Heterozygous.is_carrier());
        assert!(Genotype::Homozygous.is_carrier());
        assert!(Genotype::CompoundHeterozygous.is_carrier());
        assert!(!Genotype::WildType.is_carrier());
        assert!(!Genotype::Unknown.is_carrier());
    }

    #[test]
    fn test_genotype_lenient_parse() {
        assert_eq!(Genotype::parse_lenient("Heterozygous"), Genotype::Heterozygous);
        assert_eq!(Genotype::parse_lenient("compound heterozygous"), Genotype::CompoundHeterozygous);
        assert_eq!(Genotype::parse_lenient("wild-type"), Genotype::WildType);
        assert_eq!(Genotype::parse_lenient("mosaic"), Genotype::Unknown);
    }

    #[test]
    fn test_genotype_serde_labels() {
        let json = serde_json::to_string(&Genotype::CompoundHeterozygous).unwrap();
        assert_eq!(json, "\"compound_heterozygous\"");
        let back: Genotype = serde_json::from_str("\"wild_type\"").unwrap();
        assert_eq!(back, Genotype::WildType);
    }

    #[test]
    fn test_affected_status_from_nullable() {
        assert_eq!(AffectedStatus::from(Some(true)), AffectedStatus::Affected);
        assert_eq!(AffectedStatus::from(Some(false)), AffectedStatus::Unaffected);
        assert_eq!(AffectedStatus::from(None), AffectedStatus::Unknown);
        assert!(!AffectedStatus::Unknown.is_affected());
        assert!(!AffectedStatus::Unknown.is_known());
    }

    #[test]
    fn test_phenotype_requires_name() {
        assert!(PhenotypeObservation::new("  ").is_err());
        let obs = PhenotypeObservation::new(" Long QT ").unwrap().with_onset_age(12.0);
        assert_eq!(obs.name, "Long QT");
        assert!(obs.matches("long qt"));
        assert_eq!(obs.onset_age, Some(12.0));
    }

    #[test]
    fn test_phenotype_match_agrees_with_key() {
        assert!(phenotype_matches("Ménière disease", "MÉNIÈRE DISEASE "));
        assert_eq!(phenotype_key("Ménière disease"), phenotype_key("MÉNIÈRE DISEASE "));
        assert!(!phenotype_matches("long QT", "short QT"));
    }

    #[test]
    fn test_sex_parse() {
        assert_eq!(Sex::parse_lenient("F"), Some(Sex::Female));
        assert_eq!(Sex::parse_lenient("not reported"), None);
    }
}
