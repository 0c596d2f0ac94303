//! Family studies pooled across papers.

use genephen_common::genetics::phenotype_key;
use genephen_common::{normalize_variant, Genotype, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::family::{FamilyStudy, Individual, Penetrance};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndividualSummary {
    pub variant: Option<String>,
    pub genotype: Option<Genotype>,
    pub n_studies: usize,
    pub n_carriers: u32,
    pub n_affected: u32,
    pub n_unaffected: u32,
    pub n_unknown_status: u32,
    pub overall: Option<Penetrance>,
    pub by_phenotype: BTreeMap<String, Penetrance>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndividualDatabase {
    studies: Vec<FamilyStudy>,
}

impl IndividualDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when a study for the same source and family is
    /// already held; the first report is kept.
    pub fn add_study(&mut self, study: FamilyStudy) -> Result<bool> {
        study.validate()?;
        let source = study.source_id.trim();
        let family = study.default_family_id();
        if self
            .studies
            .iter()
            .any(|s| s.source_id.trim() == source && s.default_family_id() == family)
        {
            return Ok(false);
        }
        self.studies.push(study);
        Ok(true)
    }

    pub fn studies(&self) -> &[FamilyStudy] {
        &self.studies
    }

    /// Carriers across all studies. The variant filter compares normalised
    /// forms, so notation differences between papers do not split a variant.
    pub fn carriers(&self, variant: Option<&str>, genotype: Option<Genotype>) -> Vec<&Individual> {
        let wanted = variant.map(normalize_variant);
        self.studies
            .iter()
            .flat_map(|study| {
                let wanted = wanted.clone();
                study.carriers(genotype).into_iter().filter(move |ind| {
                    wanted
                        .as_deref()
                        .map_or(true, |w| normalize_variant(study.variant_of(ind)) == w)
                })
            })
            .collect()
    }

    pub fn calculate_penetrance(
        &self,
        phenotype: Option<&str>,
        variant: Option<&str>,
        genotype: Option<Genotype>,
    ) -> Option<Penetrance> {
        let carriers = self.carriers(variant, genotype);
        let affected = carriers.iter().filter(|c| c.counts_as_affected(phenotype)).count();
        Penetrance::from_counts(affected as u32, carriers.len() as u32)
    }

    /// Penetrance for every phenotype any qualifying carrier reports, keyed
    /// by lowercased name.
    pub fn penetrance_by_phenotype(
        &self,
        variant: Option<&str>,
        genotype: Option<Genotype>,
    ) -> BTreeMap<String, Penetrance> {
        let carriers = self.carriers(variant, genotype);
        let total = carriers.len() as u32;

        let mut out = BTreeMap::new();
        for obs in carriers.iter().flat_map(|c| &c.phenotypes) {
            let key = phenotype_key(&obs.name);
            if out.contains_key(&key) {
                continue;
            }
            let affected = carriers
                .iter()
                .filter(|c| c.counts_as_affected(Some(&obs.name)))
                .count() as u32;
            if let Some(p) = Penetrance::from_counts(affected, total) {
                out.insert(key, p);
            }
        }
        out
    }

    pub fn summary(&self, variant: Option<&str>, genotype: Option<Genotype>) -> IndividualSummary {
        let carriers = self.carriers(variant, genotype);
        let count = |f: fn(&Individual) -> bool| carriers.iter().filter(|c| f(c)).count() as u32;

        IndividualSummary {
            variant: variant.map(normalize_variant),
            genotype,
            n_studies: self.studies.len(),
            n_carriers: carriers.len() as u32,
            n_affected: count(Individual::is_affected_carrier),
            n_unaffected: count(Individual::is_unaffected_carrier),
            n_unknown_status: count(|c| !c.affected.is_known()),
            overall: self.calculate_penetrance(None, variant, genotype),
            by_phenotype: self.penetrance_by_phenotype(variant, genotype),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genephen_common::{AffectedStatus, PhenotypeObservation};
    use pretty_assertions::assert_eq;

    fn study(source: &str, variant: &str, members: &[(&str, Genotype, AffectedStatus)]) -> FamilyStudy {
        let mut s = FamilyStudy::new(source, variant, "KCNH2");
        for (id, genotype, affected) in members {
            let mut ind = Individual::new(*id, *genotype, *affected);
            if affected.is_affected() {
                ind = ind.with_phenotype(PhenotypeObservation::new("long QT").unwrap());
            }
            s.add_individual(ind).unwrap();
        }
        s
    }

    fn db() -> IndividualDatabase {
        use AffectedStatus::*;
        use Genotype::*;
        let mut db = IndividualDatabase::new();
        db.add_study(study(
            "1",
            "KCNH2 p.Ser906Leu",
            &[("proband", Heterozygous, Affected), ("sister", Heterozygous, Unaffected)],
        ))
        .unwrap();
        db.add_study(study(
            "2",
            "KCNH2 p.(Ser906Leu)",
            &[("p", Heterozygous, Unknown), ("q", Homozygous, Affected), ("r", WildType, Unaffected)],
        ))
        .unwrap();
        db.add_study(study("3", "KCNH2 p.Tyr54Asn", &[("x", Heterozygous, Affected)]))
            .unwrap();
        db
    }

    #[test]
    fn test_variant_filter_uses_normalised_identity() {
        let db = db();
        let carriers = db.carriers(Some("KCNH2 p.Ser906Leu"), None);
        assert_eq!(carriers.len(), 4);
        let p = db
            .calculate_penetrance(None, Some("KCNH2 p.(Ser906Leu)"), Some(Genotype::Heterozygous))
            .unwrap();
        assert_eq!(p, Penetrance { affected: 1, carriers: 3 });
    }

    #[test]
    fn test_summary_counts() {
        let summary = db().summary(Some("KCNH2 p.Ser906Leu"), None);
        assert_eq!(summary.n_carriers, 4);
        assert_eq!(summary.n_affected, 2);
        assert_eq!(summary.n_unaffected, 1);
        assert_eq!(summary.n_unknown_status, 1);
        assert_eq!(summary.overall, Some(Penetrance { affected: 2, carriers: 4 }));
        assert_eq!(summary.by_phenotype["long qt"], Penetrance { affected: 2, carriers: 4 });
    }

    #[test]
    fn test_repeat_study_is_ignored() {
        use AffectedStatus::*;
        let mut db = IndividualDatabase::new();
        let members = [("a", Genotype::Heterozygous, Affected), ("b", Genotype::Heterozygous, Unaffected)];
        assert!(db.add_study(study("1", "KCNH2 p.Ser906Leu", &members)).unwrap());
        assert!(!db.add_study(study("1", "KCNH2 p.Ser906Leu", &members)).unwrap());

        let mut second_family = study("1", "KCNH2 p.Ser906Leu", &members);
        second_family.family_id = Some("F2".into());
        assert!(db.add_study(second_family).unwrap());

        assert_eq!(db.studies().len(), 2);
        assert_eq!(
            db.calculate_penetrance(None, None, None),
            Some(Penetrance { affected: 2, carriers: 4 })
        );
    }

    #[test]
    fn test_unknown_variant_is_no_data() {
        let db = db();
        assert_eq!(db.calculate_penetrance(None, Some("SCN5A p.Glu1784Lys"), None), None);
        assert!(db.penetrance_by_phenotype(Some("SCN5A p.Glu1784Lys"), None).is_empty());
    }
}
