//! Variant-level penetrance database keyed by `(normalised variant, genotype)`.
//!
//! Each key owns one [`VariantSummary`]; summaries are only reachable
//! through the map. A source paper contributes to a phenotype tally at most
//! once, so re-ingesting the same paper is a no-op.

use genephen_common::genetics::phenotype_key;
use genephen_common::{normalize_variant, GenephenError, Genotype, PhenotypeObservation, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::family::Penetrance;

// ── Keys and inputs ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VariantKey {
    pub variant: String,
    pub genotype: Genotype,
}

impl VariantKey {
    pub fn new(raw_variant: &str, genotype: Genotype) -> Self {
        Self {
            variant: normalize_variant(raw_variant),
            genotype,
        }
    }
}

/// One (variant, genotype, phenotype) observation from one paper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Association {
    pub variant: String,
    pub gene: String,
    pub genotype: Genotype,
    pub phenotype: PhenotypeObservation,
    pub source_id: String,
    #[serde(default)]
    pub n_carriers: Option<u32>,
    #[serde(default)]
    pub n_affected: Option<u32>,
    #[serde(default)]
    pub onset_ages: Vec<f64>,
    #[serde(default)]
    pub severities: Vec<String>,
}

impl Association {
    /// Onset age and severity of the observation seed the samples.
    pub fn new(
        variant: impl Into<String>,
        gene: impl Into<String>,
        genotype: Genotype,
        phenotype: PhenotypeObservation,
        source_id: impl Into<String>,
    ) -> Self {
        let onset_ages = phenotype.onset_age.into_iter().collect();
        let severities = phenotype.severity.iter().cloned().collect();
        Self {
            variant: variant.into(),
            gene: gene.into(),
            genotype,
            phenotype,
            source_id: source_id.into(),
            n_carriers: None,
            n_affected: None,
            onset_ages,
            severities,
        }
    }

    pub fn with_counts(mut self, carriers: u32, affected: u32) -> Self {
        self.n_carriers = Some(carriers);
        self.n_affected = Some(affected);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.variant.trim().is_empty() {
            return Err(GenephenError::Validation(format!(
                "association from {} has no variant",
                self.source_id
            )));
        }
        if self.phenotype.name.trim().is_empty() {
            return Err(GenephenError::Validation(format!(
                "association from {} has a blank phenotype",
                self.source_id
            )));
        }
        match (self.n_carriers, self.n_affected) {
            (Some(carriers), Some(affected)) if affected > carriers => {
                Err(GenephenError::Validation(format!(
                    "association from {}: {affected} affected exceeds {carriers} carriers",
                    self.source_id
                )))
            }
            (None, Some(_)) => Err(GenephenError::Validation(format!(
                "association from {} has affected count without carriers",
                self.source_id
            ))),
            _ => Ok(()),
        }
    }
}

// ── Summaries ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhenotypeSummary {
    pub name: String,
    /// Number of papers reporting the phenotype.
    pub paper_count: u32,
    pub total_carriers: u32,
    pub total_affected: u32,
    pub sources: BTreeSet<String>,
    pub severity_counts: BTreeMap<String, u32>,
    pub onset_ages: Vec<f64>,
}

impl PhenotypeSummary {
    fn new(name: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            paper_count: 0,
            total_carriers: 0,
            total_affected: 0,
            sources: BTreeSet::new(),
            severity_counts: BTreeMap::new(),
            onset_ages: Vec::new(),
        }
    }

    fn add(&mut self, assoc: &Association) {
        self.paper_count += 1;
        self.sources.insert(assoc.source_id.clone());
        self.total_carriers += assoc.n_carriers.unwrap_or(0);
        self.total_affected += assoc.n_affected.unwrap_or(0);
        for severity in &assoc.severities {
            *self
                .severity_counts
                .entry(severity.trim().to_lowercase())
                .or_insert(0) += 1;
        }
        self.onset_ages.extend(assoc.onset_ages.iter().copied());
    }

    pub fn penetrance(&self) -> Option<Penetrance> {
        Penetrance::from_counts(self.total_affected, self.total_carriers)
    }

    pub fn mean_onset_age(&self) -> Option<f64> {
        if self.onset_ages.is_empty() {
            return None;
        }
        Some(self.onset_ages.iter().sum::<f64>() / self.onset_ages.len() as f64)
    }
}

/// Carriers and affected individuals one paper reported for a key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceTally {
    pub carriers: u32,
    pub affected: u32,
}

impl SourceTally {
    fn merge(&mut self, carriers: u32, affected: u32) {
        self.carriers = self.carriers.max(carriers);
        self.affected = self.affected.max(affected);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantSummary {
    pub variant: String,
    pub gene: String,
    pub genotype: Genotype,
    /// Per-paper carrier tallies; several phenotypes from one paper describe
    /// the same carriers and are not summed.
    pub sources: BTreeMap<String, SourceTally>,
    pub phenotypes: BTreeMap<String, PhenotypeSummary>,
}

impl VariantSummary {
    fn new(key: &VariantKey, gene: &str) -> Self {
        Self {
            variant: key.variant.clone(),
            gene: gene.trim().to_string(),
            genotype: key.genotype,
            sources: BTreeMap::new(),
            phenotypes: BTreeMap::new(),
        }
    }

    pub fn n_papers(&self) -> usize {
        self.sources.len()
    }

    pub fn total_carriers(&self) -> u32 {
        self.sources.values().map(|t| t.carriers).sum()
    }

    pub fn total_affected(&self) -> u32 {
        self.sources.values().map(|t| t.affected).sum()
    }

    pub fn overall_penetrance(&self) -> Option<Penetrance> {
        Penetrance::from_counts(self.total_affected(), self.total_carriers())
    }

    pub fn phenotype(&self, name: &str) -> Option<&PhenotypeSummary> {
        self.phenotypes.get(&phenotype_key(name))
    }

    /// Most frequently reported phenotypes first; ties keep name order.
    pub fn top_phenotypes(&self, n: usize) -> Vec<&PhenotypeSummary> {
        let mut all: Vec<&PhenotypeSummary> = self.phenotypes.values().collect();
        all.sort_by(|a, b| b.paper_count.cmp(&a.paper_count));
        all.truncate(n);
        all
    }
}

// ── Database ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct PenetranceDatabase {
    variants: BTreeMap<VariantKey, VariantSummary>,
    n_associations: usize,
}

impl PenetranceDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// Associations that changed a tally.
    pub fn n_associations(&self) -> usize {
        self.n_associations
    }

    pub fn summaries(&self) -> impl Iterator<Item = &VariantSummary> {
        self.variants.values()
    }

    fn entry(&mut self, key: VariantKey, gene: &str) -> &mut VariantSummary {
        self.variants
            .entry(key)
            .or_insert_with_key(|k| VariantSummary::new(k, gene))
    }

    /// Adds one association. Returns `false` when this source already
    /// reported the phenotype for the key.
    pub fn add_association(&mut self, assoc: &Association) -> Result<bool> {
        assoc.validate()?;
        let key = VariantKey::new(&assoc.variant, assoc.genotype);
        let pheno = phenotype_key(&assoc.phenotype.name);

        let summary = self.entry(key, &assoc.gene);
        if summary
            .phenotypes
            .get(&pheno)
            .is_some_and(|p| p.sources.contains(&assoc.source_id))
        {
            debug!(
                source = %assoc.source_id,
                variant = %summary.variant,
                phenotype = %assoc.phenotype.name,
                "Association already recorded"
            );
            return Ok(false);
        }

        summary
            .sources
            .entry(assoc.source_id.clone())
            .or_default()
            .merge(assoc.n_carriers.unwrap_or(0), assoc.n_affected.unwrap_or(0));
        summary
            .phenotypes
            .entry(pheno)
            .or_insert_with(|| PhenotypeSummary::new(&assoc.phenotype.name))
            .add(assoc);
        self.n_associations += 1;
        Ok(true)
    }

    /// Records how many carriers a paper reported for a key, and how many of
    /// them were affected by anything. Needed for carriers that report no
    /// phenotype at all.
    pub fn record_source_totals(
        &mut self,
        variant: &str,
        gene: &str,
        genotype: Genotype,
        source_id: &str,
        carriers: u32,
        affected: u32,
    ) -> Result<()> {
        if affected > carriers {
            return Err(GenephenError::Validation(format!(
                "{source_id}: {affected} affected exceeds {carriers} carriers"
            )));
        }
        self.entry(VariantKey::new(variant, genotype), gene)
            .sources
            .entry(source_id.to_string())
            .or_default()
            .merge(carriers, affected);
        Ok(())
    }

    /// Lookup by raw variant. Without a genotype the first key in
    /// genotype order is returned.
    pub fn get(&self, variant: &str, genotype: Option<Genotype>) -> Option<&VariantSummary> {
        let normalized = normalize_variant(variant);
        match genotype {
            Some(genotype) => self.variants.get(&VariantKey {
                variant: normalized,
                genotype,
            }),
            None => self
                .variants
                .iter()
                .find(|(k, _)| k.variant == normalized)
                .map(|(_, v)| v),
        }
    }

    pub fn filter_by_gene(&self, gene: &str) -> Vec<&VariantSummary> {
        self.variants
            .values()
            .filter(|v| v.gene.eq_ignore_ascii_case(gene.trim()))
            .collect()
    }

    pub fn filter_by_genotype(&self, genotype: Genotype) -> Vec<&VariantSummary> {
        self.variants.values().filter(|v| v.genotype == genotype).collect()
    }

    /// Phenotype penetrance for a variant, `None` when no carrier counts
    /// were ever reported for it.
    pub fn phenotype_penetrance(
        &self,
        variant: &str,
        genotype: Genotype,
        phenotype: &str,
    ) -> Option<Penetrance> {
        self.get(variant, Some(genotype))?.phenotype(phenotype)?.penetrance()
    }
}
