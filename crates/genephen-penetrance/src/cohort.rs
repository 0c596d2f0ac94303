//! Cohort-level evidence: aggregate carrier counts reported by one paper.

use genephen_common::genetics::{phenotype_key, phenotype_matches};
use genephen_common::{normalize_variant, GenephenError, Genotype, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ── Records ───────────────────────────────────────────────────────────────────

/// Number of carriers in a cohort showing one phenotype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhenotypeCount {
    pub phenotype: String,
    pub affected_count: u32,
    #[serde(default)]
    pub notes: Option<String>,
}

impl PhenotypeCount {
    pub fn new(phenotype: impl Into<String>, affected_count: u32) -> Self {
        Self {
            phenotype: phenotype.into().trim().to_string(),
            affected_count,
            notes: None,
        }
    }
}

/// One paper's aggregate report. Unaffected counts are always derived from
/// `total_carriers`, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortRecord {
    pub source_id: String,
    pub gene: String,
    /// Absent when the cohort pools several variants.
    #[serde(default)]
    pub variant: Option<String>,
    pub genotype: Genotype,
    pub total_carriers: u32,
    #[serde(default)]
    pub phenotype_counts: Vec<PhenotypeCount>,
    #[serde(default)]
    pub population: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl CohortRecord {
    pub fn new(
        source_id: impl Into<String>,
        gene: impl Into<String>,
        genotype: Genotype,
        total_carriers: u32,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            gene: gene.into(),
            variant: None,
            genotype,
            total_carriers,
            phenotype_counts: Vec::new(),
            population: None,
            notes: None,
        }
    }

    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }

    pub fn with_phenotype(mut self, phenotype: impl Into<String>, affected_count: u32) -> Self {
        self.phenotype_counts.push(PhenotypeCount::new(phenotype, affected_count));
        self
    }

    /// Every affected count must fit inside the carrier total, and each
    /// phenotype may be reported once.
    pub fn validate(&self) -> Result<()> {
        if self.gene.trim().is_empty() {
            return Err(GenephenError::Validation(format!(
                "cohort from {} has no gene",
                self.source_id
            )));
        }
        for (i, pc) in self.phenotype_counts.iter().enumerate() {
            if pc.phenotype.trim().is_empty() {
                return Err(GenephenError::Validation(format!(
                    "cohort from {} has a blank phenotype name",
                    self.source_id
                )));
            }
            if pc.affected_count > self.total_carriers {
                return Err(GenephenError::Validation(format!(
                    "cohort from {}: {} affected with '{}' exceeds {} carriers",
                    self.source_id, pc.affected_count, pc.phenotype, self.total_carriers
                )));
            }
            if self.phenotype_counts[..i]
                .iter()
                .any(|prev| phenotype_matches(&prev.phenotype, &pc.phenotype))
            {
                return Err(GenephenError::Validation(format!(
                    "cohort from {} reports '{}' twice",
                    self.source_id, pc.phenotype
                )));
            }
        }
        Ok(())
    }

    /// Carriers with `phenotype` (0 when not reported), or the sum over all
    /// reported phenotypes when `None`. The sum may double count carriers
    /// with several phenotypes.
    pub fn affected_count(&self, phenotype: Option<&str>) -> u32 {
        match phenotype {
            Some(name) => self
                .phenotype_counts
                .iter()
                .find(|pc| phenotype_matches(&pc.phenotype, name))
                .map(|pc| pc.affected_count)
                .unwrap_or(0),
            None => self
                .phenotype_counts
                .iter()
                .fold(0, |sum, pc| sum.saturating_add(pc.affected_count)),
        }
    }

    pub fn unaffected_count(&self, phenotype: Option<&str>) -> u32 {
        self.total_carriers.saturating_sub(self.affected_count(phenotype))
    }

    pub fn reports(&self, phenotype: &str) -> bool {
        self.phenotype_counts
            .iter()
            .any(|pc| phenotype_matches(&pc.phenotype, phenotype))
    }

    /// `None` when the cohort has no carriers or does not report the phenotype.
    pub fn frequency(&self, phenotype: &str) -> Option<f64> {
        if self.total_carriers == 0 || !self.reports(phenotype) {
            return None;
        }
        Some(f64::from(self.affected_count(Some(phenotype))) / f64::from(self.total_carriers))
    }

    /// Case-insensitive substring match on the raw variant string.
    /// Identity of the report within the database: one cohort per source,
    /// variant and genotype.
    fn key(&self) -> (String, Option<String>, Genotype) {
        (
            self.source_id.trim().to_string(),
            self.variant.as_deref().map(normalize_variant),
            self.genotype,
        )
    }

    pub fn variant_contains(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.variant
            .as_deref()
            .is_some_and(|v| v.to_lowercase().contains(&needle))
    }
}

// ── Database ──────────────────────────────────────────────────────────────────

/// Per-phenotype aggregate in a [`CohortSummary`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhenotypeStats {
    pub affected_count: u32,
    pub total_carriers: u32,
    pub frequency: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortSummary {
    pub gene: String,
    pub genotype_filter: Option<Genotype>,
    pub total_cohorts: usize,
    pub total_carriers: u32,
    pub phenotype_statistics: BTreeMap<String, PhenotypeStats>,
}

/// Cohort records for a single gene.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CohortDatabase {
    gene: String,
    cohorts: Vec<CohortRecord>,
}

impl CohortDatabase {
    pub fn new(gene: impl Into<String>) -> Self {
        Self {
            gene: gene.into().trim().to_string(),
            cohorts: Vec::new(),
        }
    }

    pub fn gene(&self) -> &str {
        &self.gene
    }

    pub fn cohorts(&self) -> &[CohortRecord] {
        &self.cohorts
    }

    pub fn len(&self) -> usize {
        self.cohorts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cohorts.is_empty()
    }

    /// Checks that `record` could be added without changing anything.
    pub fn check(&self, record: &CohortRecord) -> Result<()> {
        if !record.gene.trim().eq_ignore_ascii_case(&self.gene) {
            return Err(GenephenError::Validation(format!(
                "cohort from {} is for gene {}, database holds {}",
                record.source_id, record.gene, self.gene
            )));
        }
        record.validate()
    }

    /// Returns `false` when a cohort with the same source, variant and
    /// genotype is already held; the first report is kept.
    pub fn add(&mut self, record: CohortRecord) -> Result<bool> {
        self.check(&record)?;
        let key = record.key();
        if self.cohorts.iter().any(|c| c.key() == key) {
            return Ok(false);
        }
        self.cohorts.push(record);
        Ok(true)
    }

    pub fn filter_by_genotype(&self, genotype: Genotype) -> Vec<&CohortRecord> {
        self.cohorts.iter().filter(|c| c.genotype == genotype).collect()
    }

    pub fn filter_by_variant(&self, variant: &str) -> Vec<&CohortRecord> {
        self.cohorts.iter().filter(|c| c.variant_contains(variant)).collect()
    }

    pub fn total_carriers(&self, genotype: Option<Genotype>) -> u32 {
        self.qualifying(genotype, None)
            .fold(0, |total, c| total.saturating_add(c.total_carriers))
    }

    fn qualifying<'a>(
        &'a self,
        genotype: Option<Genotype>,
        variant: Option<&'a str>,
    ) -> impl Iterator<Item = &'a CohortRecord> + 'a {
        self.cohorts.iter().filter(move |c| {
            genotype.map_or(true, |g| c.genotype == g)
                && variant.map_or(true, |v| c.variant_contains(v))
        })
    }

    /// `(affected, total carriers)` summed over every qualifying cohort.
    /// Cohorts that do not report the phenotype add carriers but no affected.
    pub fn aggregate_phenotype_counts(
        &self,
        phenotype: &str,
        genotype: Option<Genotype>,
        variant: Option<&str>,
    ) -> (u32, u32) {
        self.qualifying(genotype, variant)
            .fold((0, 0), |(affected, total), c| {
                (
                    affected.saturating_add(c.affected_count(Some(phenotype))),
                    total.saturating_add(c.total_carriers),
                )
            })
    }

    pub fn aggregate_frequency(
        &self,
        phenotype: &str,
        genotype: Option<Genotype>,
        variant: Option<&str>,
    ) -> Option<f64> {
        let (affected, total) = self.aggregate_phenotype_counts(phenotype, genotype, variant);
        (total > 0).then(|| f64::from(affected) / f64::from(total))
    }

    pub fn summary(&self, genotype: Option<Genotype>) -> CohortSummary {
        let cohorts: Vec<&CohortRecord> = self.qualifying(genotype, None).collect();

        let mut phenotype_statistics = BTreeMap::new();
        for pc in cohorts.iter().flat_map(|c| &c.phenotype_counts) {
            let key = phenotype_key(&pc.phenotype);
            if phenotype_statistics.contains_key(&key) {
                continue;
            }
            let (affected_count, total_carriers) =
                self.aggregate_phenotype_counts(&pc.phenotype, genotype, None);
            phenotype_statistics.insert(
                key,
                PhenotypeStats {
                    affected_count,
                    total_carriers,
                    frequency: (total_carriers > 0)
                        .then(|| f64::from(affected_count) / f64::from(total_carriers)),
                },
            );
        }

        CohortSummary {
            gene: self.gene.clone(),
            genotype_filter: genotype,
            total_cohorts: cohorts.len(),
            total_carriers: cohorts
                .iter()
                .fold(0, |total, c| total.saturating_add(c.total_carriers)),
            phenotype_statistics,
        }
    }
}
