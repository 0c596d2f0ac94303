//! Routes evidence records into the cohort, individual and variant databases.

use genephen_common::{parse_variant, Genotype, PhenotypeObservation, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

use crate::cohort::{CohortDatabase, CohortRecord, CohortSummary};
use crate::database::{Association, PenetranceDatabase, VariantKey, VariantSummary};
use crate::evidence::EvidenceRecord;
use crate::family::{FamilyStudy, Individual};
use crate::individual_db::{IndividualDatabase, IndividualSummary};

/// `affected` out of `total` carriers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    pub affected: u32,
    pub total: u32,
}

impl Counts {
    pub fn frequency(&self) -> Option<f64> {
        (self.total > 0).then(|| f64::from(self.affected) / f64::from(self.total))
    }
}

/// Cohort and individual evidence side by side, plus the pooled ratio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedFrequency {
    pub phenotype: String,
    pub cohort: Counts,
    pub individual: Counts,
    pub combined: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestOutcome {
    pub filtered_out: bool,
    pub cohorts: usize,
    pub family_studies: usize,
    /// Associations that changed a variant tally.
    pub associations: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateSummary {
    pub gene: String,
    pub cohorts: CohortSummary,
    pub individuals: IndividualSummary,
    pub variants: Vec<VariantSummary>,
}

/// Carrier totals one paper reported for a variant key.
struct SourceTotals {
    variant: String,
    gene: String,
    genotype: Genotype,
    source_id: String,
    carriers: u32,
    affected: u32,
}

/// Owns the running databases for one gene.
#[derive(Debug, Clone)]
pub struct EvidenceAggregator {
    gene: String,
    cohorts: CohortDatabase,
    individuals: IndividualDatabase,
    penetrance: PenetranceDatabase,
}

impl EvidenceAggregator {
    pub fn new(gene: impl Into<String>) -> Self {
        let gene = gene.into().trim().to_string();
        Self {
            cohorts: CohortDatabase::new(gene.clone()),
            individuals: IndividualDatabase::new(),
            penetrance: PenetranceDatabase::new(),
            gene,
        }
    }

    pub fn gene(&self) -> &str {
        &self.gene
    }

    pub fn cohorts(&self) -> &CohortDatabase {
        &self.cohorts
    }

    pub fn individuals(&self) -> &IndividualDatabase {
        &self.individuals
    }

    pub fn penetrance(&self) -> &PenetranceDatabase {
        &self.penetrance
    }

    /// Adds one record to every database it has data for. The whole record
    /// is validated first; on error nothing has been changed.
    #[instrument(skip(self, record), fields(source = %record.source_id))]
    pub fn ingest(&mut self, record: &EvidenceRecord) -> Result<IngestOutcome> {
        if record.is_filtered_out() {
            debug!(reason = ?record.filter_reason(), "Not aggregating filtered-out record");
            return Ok(IngestOutcome {
                filtered_out: true,
                ..Default::default()
            });
        }

        for cohort in &record.cohorts {
            self.cohorts.check(cohort)?;
        }
        if let Some(study) = &record.family {
            study.validate()?;
        }

        let mut associations = Vec::new();
        let mut totals = Vec::new();
        for cohort in &record.cohorts {
            associations.extend(cohort_associations(cohort));
        }
        if let Some(study) = &record.family {
            let (assocs, study_totals) = family_associations(study);
            associations.extend(assocs);
            totals.extend(study_totals);
        }
        associations.extend(self.flat_associations(record));
        for assoc in &associations {
            assoc.validate()?;
        }

        let mut outcome = IngestOutcome::default();
        for cohort in &record.cohorts {
            if self.cohorts.add(cohort.clone())? {
                outcome.cohorts += 1;
            } else {
                debug!("Cohort already held; not re-added");
            }
        }
        if let Some(study) = &record.family {
            if self.individuals.add_study(study.clone())? {
                outcome.family_studies += 1;
            } else {
                debug!("Family study already held; not re-added");
            }
        }
        for assoc in &associations {
            if self.penetrance.add_association(assoc)? {
                outcome.associations += 1;
            }
        }
        for t in totals {
            self.penetrance.record_source_totals(
                &t.variant,
                &t.gene,
                t.genotype,
                &t.source_id,
                t.carriers,
                t.affected,
            )?;
        }

        info!(
            cohorts = outcome.cohorts,
            family_studies = outcome.family_studies,
            associations = outcome.associations,
            "Evidence aggregated"
        );
        Ok(outcome)
    }

    /// One uncounted association per phenotype of a single-patient record.
    fn flat_associations(&self, record: &EvidenceRecord) -> Vec<Association> {
        let Some(variant) = record.variant.as_deref().filter(|v| !v.trim().is_empty()) else {
            if !record.phenotypes.is_empty() {
                debug!("Record has phenotypes but no variant; not keyed");
            }
            return Vec::new();
        };
        let gene = record
            .gene
            .clone()
            .or_else(|| parse_variant(variant).gene)
            .unwrap_or_else(|| self.gene.clone());

        record
            .phenotypes
            .iter()
            .map(|obs| {
                Association::new(variant, gene.clone(), record.genotype, obs.clone(), &record.source_id)
            })
            .collect()
    }

    /// Cohort and individual counts for one phenotype, and the pooled ratio
    /// `(cohort affected + individual affected) / (cohort total + individual total)`.
    ///
    /// The cohort side filters variants by substring on the raw string; the
    /// individual side compares normalised forms.
    pub fn combined_frequency(
        &self,
        phenotype: &str,
        genotype: Option<Genotype>,
        variant: Option<&str>,
    ) -> CombinedFrequency {
        let (affected, total) = self.cohorts.aggregate_phenotype_counts(phenotype, genotype, variant);
        let cohort = Counts { affected, total };

        let individual = self
            .individuals
            .calculate_penetrance(Some(phenotype), variant, genotype)
            .map(|p| Counts {
                affected: p.affected,
                total: p.carriers,
            })
            .unwrap_or_default();

        let pooled = Counts {
            affected: cohort.affected.saturating_add(individual.affected),
            total: cohort.total.saturating_add(individual.total),
        };
        CombinedFrequency {
            phenotype: phenotype.trim().to_string(),
            cohort,
            individual,
            combined: pooled.frequency(),
        }
    }

    pub fn summary(&self, genotype: Option<Genotype>) -> AggregateSummary {
        let variants = match genotype {
            Some(g) => self.penetrance.filter_by_genotype(g).into_iter().cloned().collect(),
            None => self.penetrance.summaries().cloned().collect(),
        };
        AggregateSummary {
            gene: self.gene.clone(),
            cohorts: self.cohorts.summary(genotype),
            individuals: self.individuals.summary(None, genotype),
            variants,
        }
    }
}

/// Counted associations for a cohort that names its variant. Pooled
/// multi-variant cohorts have no variant key and stay cohort-only.
fn cohort_associations(cohort: &CohortRecord) -> Vec<Association> {
    let Some(variant) = cohort.variant.as_deref().filter(|v| !v.trim().is_empty()) else {
        return Vec::new();
    };
    cohort
        .phenotype_counts
        .iter()
        .filter_map(|pc| {
            let obs = PhenotypeObservation::new(&pc.phenotype).ok()?;
            Some(
                Association::new(variant, &cohort.gene, cohort.genotype, obs, &cohort.source_id)
                    .with_counts(cohort.total_carriers, pc.affected_count),
            )
        })
        .collect()
}

/// Groups a study's carriers by `(normalised variant, genotype)` and emits
/// one counted association per phenotype plus the group's carrier totals.
fn family_associations(study: &FamilyStudy) -> (Vec<Association>, Vec<SourceTotals>) {
    let mut groups: BTreeMap<VariantKey, (String, String, Vec<&Individual>)> = BTreeMap::new();
    for ind in study.carriers(None) {
        let raw = study.variant_of(ind);
        let gene = ind.gene.clone().unwrap_or_else(|| study.gene.clone());
        groups
            .entry(VariantKey::new(raw, ind.genotype))
            .or_insert_with(|| (raw.to_string(), gene, Vec::new()))
            .2
            .push(ind);
    }

    let mut associations = Vec::new();
    let mut totals = Vec::new();
    for (key, (raw, gene, carriers)) in groups {
        let n = carriers.len() as u32;

        let mut seen: Vec<&PhenotypeObservation> = Vec::new();
        for obs in carriers.iter().flat_map(|c| &c.phenotypes) {
            if seen.iter().any(|s| s.matches(&obs.name)) {
                continue;
            }
            seen.push(obs);

            let affected: Vec<&&Individual> = carriers
                .iter()
                .filter(|c| c.counts_as_affected(Some(&obs.name)))
                .collect();
            let mut assoc = Association::new(&raw, &gene, key.genotype, obs.clone(), &study.source_id)
                .with_counts(n, affected.len() as u32);
            assoc.onset_ages = affected.iter().filter_map(|c| c.onset_age_for(&obs.name)).collect();
            assoc.severities = affected
                .iter()
                .filter_map(|c| c.phenotypes.iter().find(|p| p.matches(&obs.name)))
                .filter_map(|p| p.severity.clone())
                .collect();
            associations.push(assoc);
        }

        totals.push(SourceTotals {
            variant: raw,
            gene,
            genotype: key.genotype,
            source_id: study.source_id.clone(),
            carriers: n,
            affected: carriers.iter().filter(|c| c.counts_as_affected(None)).count() as u32,
        });
    }
    (associations, totals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::family::Penetrance;
    use genephen_common::{AffectedStatus, GenephenError};
    use pretty_assertions::assert_eq;

    const V: &str = "KCNH2 p.Ser906Leu";

    fn obs(name: &str) -> PhenotypeObservation {
        PhenotypeObservation::new(name).unwrap()
    }

    fn cohort_record(source: &str, total: u32, affected: u32) -> EvidenceRecord {
        let mut r = EvidenceRecord::new(source);
        r.cohorts.push(
            CohortRecord::new(source, "KCNH2", Genotype::Heterozygous, total)
                .with_variant(V)
                .with_phenotype("long QT", affected),
        );
        r
    }

    fn family_record() -> EvidenceRecord {
        let mut study = FamilyStudy::new("fam", "KCNH2 p.(Ser906Leu)", "KCNH2");
        let members = [
            ("proband", Genotype::Heterozygous, AffectedStatus::Affected, true),
            ("mother", Genotype::Heterozygous, AffectedStatus::Affected, true),
            ("sister", Genotype::Heterozygous, AffectedStatus::Unaffected, false),
            ("father", Genotype::WildType, AffectedStatus::Unaffected, false),
        ];
        for (id, genotype, affected, lqt) in members {
            let mut ind = Individual::new(id, genotype, affected);
            if lqt {
                ind = ind.with_phenotype(obs("long QT").with_onset_age(if id == "proband" { 14.0 } else { 30.0 }));
            }
            study.add_individual(ind).unwrap();
        }
        let mut r = EvidenceRecord::new("fam");
        r.family = Some(study);
        r
    }

    #[test]
    fn test_cohorts_reach_both_databases() {
        let mut agg = EvidenceAggregator::new("KCNH2");
        agg.ingest(&cohort_record("A", 50, 35)).unwrap();
        agg.ingest(&cohort_record("B", 20, 8)).unwrap();

        assert_eq!(
            agg.cohorts()
                .aggregate_phenotype_counts("long QT", Some(Genotype::Heterozygous), None),
            (43, 70)
        );
        let lqt = agg
            .penetrance()
            .phenotype_penetrance(V, Genotype::Heterozygous, "long QT")
            .unwrap();
        assert_eq!(lqt, Penetrance { affected: 43, carriers: 70 });
    }

    #[test]
    fn test_family_study_counts() {
        let mut agg = EvidenceAggregator::new("KCNH2");
        let outcome = agg.ingest(&family_record()).unwrap();
        assert_eq!(outcome.family_studies, 1);
        assert_eq!(outcome.associations, 1);

        let summary = agg.penetrance().get(V, Some(Genotype::Heterozygous)).unwrap();
        assert_eq!(summary.overall_penetrance(), Some(Penetrance { affected: 2, carriers: 3 }));
        let lqt = summary.phenotype("long QT").unwrap();
        assert_eq!(lqt.penetrance(), Some(Penetrance { affected: 2, carriers: 3 }));
        assert_eq!(lqt.mean_onset_age(), Some(22.0));
        assert!(agg.penetrance().get(V, Some(Genotype::WildType)).is_none());
    }

    #[test]
    fn test_combined_frequency() {
        let mut agg = EvidenceAggregator::new("KCNH2");
        agg.ingest(&cohort_record("A", 50, 35)).unwrap();
        agg.ingest(&family_record()).unwrap();

        let combined = agg.combined_frequency("long QT", Some(Genotype::Heterozygous), None);
        assert_eq!(combined.cohort, Counts { affected: 35, total: 50 });
        assert_eq!(combined.individual, Counts { affected: 2, total: 3 });
        assert_eq!(combined.combined, Some(37.0 / 53.0));
    }

    #[test]
    fn test_combined_frequency_no_data() {
        let agg = EvidenceAggregator::new("KCNH2");
        let combined = agg.combined_frequency("long QT", None, None);
        assert_eq!(combined.combined, None);
        assert_eq!(combined.cohort.frequency(), None);
    }

    #[test]
    fn test_invalid_record_changes_nothing() {
        let mut agg = EvidenceAggregator::new("KCNH2");
        let mut record = family_record();
        record.cohorts.push(CohortRecord::new("fam", "SCN5A", Genotype::Heterozygous, 3));

        let err = agg.ingest(&record).unwrap_err();
        assert!(matches!(err, GenephenError::Validation(_)));
        assert!(agg.cohorts().is_empty());
        assert!(agg.individuals().studies().is_empty());
        assert!(agg.penetrance().is_empty());
    }

    #[test]
    fn test_filtered_out_is_not_aggregated() {
        let mut agg = EvidenceAggregator::new("KCNH2");
        let outcome = agg
            .ingest(&EvidenceRecord::filtered_out("1", "not about a variant", 0.3))
            .unwrap();
        assert!(outcome.filtered_out);
        assert!(agg.penetrance().is_empty());
    }

    #[test]
    fn test_flat_record_adds_uncounted_associations() {
        let mut agg = EvidenceAggregator::new("KCNH2");
        let mut record = EvidenceRecord::new("9");
        record.variant = Some(V.to_string());
        record.genotype = Genotype::Heterozygous;
        record.phenotypes = vec![obs("long QT"), obs("syncope")];

        assert_eq!(agg.ingest(&record).unwrap().associations, 2);
        assert_eq!(agg.ingest(&record).unwrap().associations, 0);

        let summary = agg.penetrance().get(V, None).unwrap();
        assert_eq!(summary.gene, "KCNH2");
        assert_eq!(summary.phenotype("syncope").unwrap().paper_count, 1);
        assert_eq!(summary.overall_penetrance(), None);
    }
}
