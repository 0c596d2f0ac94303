//! Individual-level evidence: family members and case reports from one paper.
//!
//! Carrier, affected and unaffected subsets are derived on every query. An
//! individual whose affected status was not reported stays in the carrier
//! denominator and is never counted as unaffected.

use genephen_common::{AffectedStatus, GenephenError, Genotype, PhenotypeObservation, Result, Sex};
use serde::{Deserialize, Serialize};

// ── Penetrance ratio ──────────────────────────────────────────────────────────

/// A computed `affected / carriers` ratio. Only constructed for a non-empty
/// carrier set, so "no data" is always `None` at the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Penetrance {
    pub affected: u32,
    pub carriers: u32,
}

impl Penetrance {
    pub fn from_counts(affected: u32, carriers: u32) -> Option<Self> {
        (carriers > 0).then_some(Self { affected, carriers })
    }

    pub fn ratio(&self) -> f64 {
        f64::from(self.affected) / f64::from(self.carriers)
    }
}

// ── Individual ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Individual {
    /// Unique within its study (e.g. "proband", "II-3").
    pub id: String,
    #[serde(default)]
    pub genotype: Genotype,
    #[serde(default)]
    pub affected: AffectedStatus,
    #[serde(default)]
    pub phenotypes: Vec<PhenotypeObservation>,
    #[serde(default)]
    pub age: Option<f64>,
    #[serde(default)]
    pub sex: Option<Sex>,
    #[serde(default)]
    pub age_at_onset: Option<f64>,
    #[serde(default)]
    pub age_at_diagnosis: Option<f64>,
    #[serde(default)]
    pub relation: Option<String>,
    /// Overrides the study variant in multi-variant families.
    #[serde(default)]
    pub variant: Option<String>,
    #[serde(default)]
    pub gene: Option<String>,
    #[serde(default)]
    pub family_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Individual {
    pub fn new(id: impl Into<String>, genotype: Genotype, affected: AffectedStatus) -> Self {
        Self {
            id: id.into(),
            genotype,
            affected,
            phenotypes: Vec::new(),
            age: None,
            sex: None,
            age_at_onset: None,
            age_at_diagnosis: None,
            relation: None,
            variant: None,
            gene: None,
            family_id: None,
            notes: None,
        }
    }

    pub fn with_phenotype(mut self, observation: PhenotypeObservation) -> Self {
        self.phenotypes.push(observation);
        self
    }

    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }

    pub fn is_carrier(&self) -> bool {
        self.genotype.is_carrier()
    }

    pub fn is_affected_carrier(&self) -> bool {
        self.is_carrier() && self.affected == AffectedStatus::Affected
    }

    pub fn is_unaffected_carrier(&self) -> bool {
        self.is_carrier() && self.affected == AffectedStatus::Unaffected
    }

    pub fn has_phenotype(&self, phenotype: &str) -> bool {
        self.phenotypes.iter().any(|p| p.matches(phenotype))
    }

    /// Affected for `phenotype`, or affected at all when `None`.
    pub fn counts_as_affected(&self, phenotype: Option<&str>) -> bool {
        self.affected.is_affected() && phenotype.map_or(true, |name| self.has_phenotype(name))
    }

    /// Onset age recorded on the observation, falling back to the
    /// individual's age at onset.
    pub fn onset_age_for(&self, phenotype: &str) -> Option<f64> {
        self.phenotypes
            .iter()
            .find(|p| p.matches(phenotype))
            .and_then(|p| p.onset_age)
            .or(self.age_at_onset)
    }
}

// ── Family study ──────────────────────────────────────────────────────────────

/// One paper's individual-level report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyStudy {
    pub source_id: String,
    pub variant: String,
    pub gene: String,
    #[serde(default)]
    pub study_type: Option<String>,
    #[serde(default)]
    pub family_id: Option<String>,
    #[serde(default)]
    individuals: Vec<Individual>,
}

impl FamilyStudy {
    pub fn new(source_id: impl Into<String>, variant: impl Into<String>, gene: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            variant: variant.into(),
            gene: gene.into(),
            study_type: None,
            family_id: None,
            individuals: Vec::new(),
        }
    }

    pub fn individuals(&self) -> &[Individual] {
        &self.individuals
    }

    pub fn default_family_id(&self) -> String {
        self.family_id
            .clone()
            .unwrap_or_else(|| format!("{}_family1", self.source_id))
    }

    /// Adds an individual, filling in the study's variant, gene and family
    /// id where the individual does not override them.
    pub fn add_individual(&mut self, mut individual: Individual) -> Result<()> {
        let id = individual.id.trim().to_string();
        if id.is_empty() {
            return Err(GenephenError::Validation(format!(
                "individual in {} has no identifier",
                self.source_id
            )));
        }
        if self.individuals.iter().any(|i| i.id == id) {
            return Err(GenephenError::Validation(format!(
                "individual '{id}' appears twice in {}",
                self.source_id
            )));
        }

        individual.id = id;
        if individual.variant.as_deref().map_or(true, |v| v.trim().is_empty()) {
            individual.variant = Some(self.variant.clone());
        }
        if individual.gene.as_deref().map_or(true, |g| g.trim().is_empty()) {
            individual.gene = Some(self.gene.clone());
        }
        if individual.family_id.is_none() {
            individual.family_id = Some(self.default_family_id());
        }
        self.individuals.push(individual);
        Ok(())
    }

    /// Re-checks the invariants `add_individual` enforces; used on studies
    /// that were deserialised rather than built.
    pub fn validate(&self) -> Result<()> {
        for (i, ind) in self.individuals.iter().enumerate() {
            if ind.id.trim().is_empty() {
                return Err(GenephenError::Validation(format!(
                    "individual in {} has no identifier",
                    self.source_id
                )));
            }
            if self.individuals[..i].iter().any(|prev| prev.id == ind.id) {
                return Err(GenephenError::Validation(format!(
                    "individual '{}' appears twice in {}",
                    ind.id, self.source_id
                )));
            }
        }
        Ok(())
    }

    /// Variant an individual carries: its own override or the study's.
    pub fn variant_of<'a>(&'a self, individual: &'a Individual) -> &'a str {
        individual
            .variant
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(&self.variant)
    }

    pub fn carriers(&self, genotype: Option<Genotype>) -> Vec<&Individual> {
        self.individuals
            .iter()
            .filter(|i| i.is_carrier() && genotype.map_or(true, |g| i.genotype == g))
            .collect()
    }

    pub fn affected_carriers(&self, genotype: Option<Genotype>) -> Vec<&Individual> {
        self.carriers(genotype)
            .into_iter()
            .filter(|i| i.affected == AffectedStatus::Affected)
            .collect()
    }

    pub fn unaffected_carriers(&self, genotype: Option<Genotype>) -> Vec<&Individual> {
        self.carriers(genotype)
            .into_iter()
            .filter(|i| i.affected == AffectedStatus::Unaffected)
            .collect()
    }

    pub fn unknown_status_carriers(&self, genotype: Option<Genotype>) -> Vec<&Individual> {
        self.carriers(genotype)
            .into_iter()
            .filter(|i| !i.affected.is_known())
            .collect()
    }

    /// `None` when there are no qualifying carriers. Carriers with unknown
    /// status count in the denominator only.
    pub fn calculate_penetrance(
        &self,
        phenotype: Option<&str>,
        genotype: Option<Genotype>,
    ) -> Option<Penetrance> {
        let carriers = self.carriers(genotype);
        let affected = carriers.iter().filter(|c| c.counts_as_affected(phenotype)).count();
        Penetrance::from_counts(affected as u32, carriers.len() as u32)
    }

    /// Carriers reporting each phenotype, keyed by the first spelling seen.
    pub fn phenotype_counts(&self, genotype: Option<Genotype>) -> Vec<(String, u32)> {
        let mut counts: Vec<(String, u32)> = Vec::new();
        for carrier in self.carriers(genotype) {
            for obs in &carrier.phenotypes {
                match counts.iter_mut().find(|(name, _)| obs.matches(name)) {
                    Some((_, n)) => *n += 1,
                    None => counts.push((obs.name.clone(), 1)),
                }
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lqt() -> PhenotypeObservation {
        PhenotypeObservation::new("long QT").unwrap()
    }

    fn family() -> FamilyStudy {
        let mut study = FamilyStudy::new("12345", "KCNH2 p.Ser906Leu", "KCNH2");
        study
            .add_individual(
                Individual::new("proband", Genotype::Heterozygous, AffectedStatus::Affected)
                    .with_phenotype(lqt()),
            )
            .unwrap();
        study
            .add_individual(
                Individual::new("mother", Genotype::Heterozygous, AffectedStatus::Affected)
                    .with_phenotype(PhenotypeObservation::new("syncope").unwrap()),
            )
            .unwrap();
        study
            .add_individual(Individual::new("sister", Genotype::Heterozygous, AffectedStatus::Unaffected))
            .unwrap();
        study
            .add_individual(Individual::new("father", Genotype::WildType, AffectedStatus::Unaffected))
            .unwrap();
        study
    }

    #[test]
    fn test_wild_type_is_not_a_carrier() {
        let p = family()
            .calculate_penetrance(None, Some(Genotype::Heterozygous))
            .unwrap();
        assert_eq!(p, Penetrance { affected: 2, carriers: 3 });
        assert!((p.ratio() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_phenotype_specific_penetrance() {
        let p = family().calculate_penetrance(Some("Long QT"), None).unwrap();
        assert_eq!(p, Penetrance { affected: 1, carriers: 3 });
    }

    #[test]
    fn test_unknown_is_not_unaffected() {
        let mut study = FamilyStudy::new("1", "KCNH2 p.Ser906Leu", "KCNH2");
        study
            .add_individual(Individual::new("a", Genotype::Heterozygous, AffectedStatus::Unknown))
            .unwrap();
        study
            .add_individual(Individual::new("b", Genotype::Heterozygous, AffectedStatus::Unaffected))
            .unwrap();

        let p = study.calculate_penetrance(None, None).unwrap();
        assert_eq!(p, Penetrance { affected: 0, carriers: 2 });
        assert_eq!(p.ratio(), 0.0);
        assert_eq!(study.unaffected_carriers(None).len(), 1);
        assert_eq!(study.unknown_status_carriers(None).len(), 1);
    }

    #[test]
    fn test_no_carriers_is_no_data() {
        let mut study = FamilyStudy::new("1", "KCNH2 p.Ser906Leu", "KCNH2");
        assert_eq!(study.calculate_penetrance(None, None), None);
        study
            .add_individual(Individual::new("father", Genotype::WildType, AffectedStatus::Unaffected))
            .unwrap();
        assert_eq!(study.calculate_penetrance(None, None), None);
        assert_eq!(study.calculate_penetrance(None, Some(Genotype::Homozygous)), None);
    }

    #[test]
    fn test_inheritance_and_overrides() {
        let mut study = FamilyStudy::new("777", "KCNH2 p.Ser906Leu", "KCNH2");
        study
            .add_individual(Individual::new("p1", Genotype::Heterozygous, AffectedStatus::Affected))
            .unwrap();
        study
            .add_individual(
                Individual::new("p2", Genotype::CompoundHeterozygous, AffectedStatus::Affected)
                    .with_variant("KCNH2 p.Tyr54Asn"),
            )
            .unwrap();

        let [p1, p2] = study.individuals() else { panic!("two individuals") };
        assert_eq!(p1.variant.as_deref(), Some("KCNH2 p.Ser906Leu"));
        assert_eq!(p1.gene.as_deref(), Some("KCNH2"));
        assert_eq!(p1.family_id.as_deref(), Some("777_family1"));
        assert_eq!(study.variant_of(p2), "KCNH2 p.Tyr54Asn");
    }

    #[test]
    fn test_duplicate_individual_rejected() {
        let mut study = FamilyStudy::new("1", "V", "G");
        study
            .add_individual(Individual::new("proband", Genotype::Heterozygous, AffectedStatus::Affected))
            .unwrap();
        let err = study
            .add_individual(Individual::new(" proband ", Genotype::Heterozygous, AffectedStatus::Unknown))
            .unwrap_err();
        assert!(matches!(err, GenephenError::Validation(_)));
        assert_eq!(study.individuals().len(), 1);
    }

    #[test]
    fn test_phenotype_counts() {
        let mut study = family();
        study
            .add_individual(
                Individual::new("brother", Genotype::Heterozygous, AffectedStatus::Affected)
                    .with_phenotype(PhenotypeObservation::new("LONG QT").unwrap()),
            )
            .unwrap();
        assert_eq!(
            study.phenotype_counts(None),
            vec![("long QT".to_string(), 2), ("syncope".to_string(), 1)]
        );
    }

    #[test]
    fn test_onset_age_fallback() {
        let mut ind = Individual::new("p", Genotype::Heterozygous, AffectedStatus::Affected)
            .with_phenotype(lqt().with_onset_age(12.0))
            .with_phenotype(PhenotypeObservation::new("syncope").unwrap());
        ind.age_at_onset = Some(15.0);
        assert_eq!(ind.onset_age_for("long QT"), Some(12.0));
        assert_eq!(ind.onset_age_for("syncope"), Some(15.0));
    }
}
