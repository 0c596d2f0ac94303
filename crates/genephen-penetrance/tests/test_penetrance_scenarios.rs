//! Cross-paper scenarios through the public aggregation API.

use genephen_common::{AffectedStatus, Genotype, PhenotypeObservation};
use genephen_penetrance::{
    CohortRecord, EvidenceAggregator, EvidenceRecord, FamilyStudy, Individual, Penetrance,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn cohort(source: &str, variant: &str, total: u32, affected: u32) -> EvidenceRecord {
    let mut record = EvidenceRecord::new(source);
    record.cohorts.push(
        CohortRecord::new(source, "KCNH2", Genotype::Heterozygous, total)
            .with_variant(variant)
            .with_phenotype("long QT", affected),
    );
    record
}

#[test]
fn test_two_cohorts_sum_counts() {
    let mut agg = EvidenceAggregator::new("KCNH2");
    agg.ingest(&cohort("A", "KCNH2 p.Ser906Leu", 50, 35)).unwrap();
    agg.ingest(&cohort("B", "KCNH2 p.Ser906Leu", 20, 8)).unwrap();

    assert_eq!(
        agg.cohorts()
            .aggregate_phenotype_counts("long QT", Some(Genotype::Heterozygous), None),
        (43, 70)
    );
    let summary = agg.summary(Some(Genotype::Heterozygous));
    assert_eq!(summary.cohorts.total_carriers, 70);
    assert_eq!(summary.variants.len(), 1);
    assert_eq!(summary.variants[0].n_papers(), 2);
}

#[test]
fn test_notation_differences_merge_in_variant_database() {
    let mut agg = EvidenceAggregator::new("KCNH2");
    agg.ingest(&cohort("A", "KCNH2 c.2717C>T p.Ser906Leu", 10, 5)).unwrap();
    agg.ingest(&cohort("B", "KCNH2 c.2717C>T p.(Ser906Leu)", 10, 3)).unwrap();

    assert_eq!(agg.penetrance().len(), 1);
    let p = agg
        .penetrance()
        .phenotype_penetrance("KCNH2 c.2717C>T p.(Ser906Leu)", Genotype::Heterozygous, "long QT");
    assert_eq!(p, Some(Penetrance { affected: 8, carriers: 20 }));
}

#[test]
fn test_reingesting_a_paper_does_not_double_count() {
    let mut agg = EvidenceAggregator::new("KCNH2");
    let record = cohort("A", "KCNH2 p.Ser906Leu", 50, 35);
    agg.ingest(&record).unwrap();
    let second = agg.ingest(&record).unwrap();
    assert_eq!(second.associations, 0);

    assert_eq!((second.cohorts, second.family_studies), (0, 0));

    let summary = agg.penetrance().get("KCNH2 p.Ser906Leu", None).unwrap();
    assert_eq!(summary.total_carriers(), 50);
    assert_eq!(summary.phenotype("long QT").unwrap().total_affected, 35);

    assert_eq!(agg.cohorts().aggregate_phenotype_counts("long QT", None, None), (35, 50));
    let combined = agg.combined_frequency("long QT", None, None);
    assert_eq!((combined.cohort.affected, combined.cohort.total), (35, 50));
    assert_eq!(agg.summary(None).cohorts.total_cohorts, 1);
}

#[test]
fn test_reingesting_a_family_study_does_not_double_count() {
    let mut study = FamilyStudy::new("7", "KCNH2 p.Ser906Leu", "KCNH2");
    study
        .add_individual(
            Individual::new("proband", Genotype::Heterozygous, AffectedStatus::Affected)
                .with_phenotype(PhenotypeObservation::new("long QT").unwrap()),
        )
        .unwrap();
    study
        .add_individual(Individual::new("mother", Genotype::Heterozygous, AffectedStatus::Unaffected))
        .unwrap();
    let mut record = EvidenceRecord::new("7");
    record.family = Some(study);

    let mut agg = EvidenceAggregator::new("KCNH2");
    let first = agg.ingest(&record).unwrap();
    let second = agg.ingest(&record).unwrap();
    assert_eq!(first.family_studies, 1);
    assert_eq!((second.family_studies, second.associations), (0, 0));

    assert_eq!(
        agg.individuals().calculate_penetrance(None, None, None),
        Some(Penetrance { affected: 1, carriers: 2 })
    );
    assert_eq!(agg.summary(None).individuals.n_carriers, 2);
    let combined = agg.combined_frequency("long QT", None, None);
    assert_eq!((combined.individual.affected, combined.individual.total), (1, 2));
}

#[test]
fn test_unknown_status_stays_in_denominator() {
    let mut study = FamilyStudy::new("42", "KCNH2 p.Ser906Leu", "KCNH2");
    study
        .add_individual(Individual::new("a", Genotype::Heterozygous, AffectedStatus::Unknown))
        .unwrap();
    study
        .add_individual(Individual::new("b", Genotype::Heterozygous, AffectedStatus::Unaffected))
        .unwrap();
    let mut record = EvidenceRecord::new("42");
    record.family = Some(study);

    let mut agg = EvidenceAggregator::new("KCNH2");
    agg.ingest(&record).unwrap();

    assert_eq!(
        agg.individuals().calculate_penetrance(None, None, None),
        Some(Penetrance { affected: 0, carriers: 2 })
    );
    let summary = agg.penetrance().get("KCNH2 p.Ser906Leu", None).unwrap();
    assert_eq!(summary.overall_penetrance(), Some(Penetrance { affected: 0, carriers: 2 }));
}

#[test]
fn test_no_carriers_is_distinct_from_zero() {
    let agg = EvidenceAggregator::new("KCNH2");
    assert_eq!(agg.individuals().calculate_penetrance(None, None, None), None);

    let mut study = FamilyStudy::new("1", "KCNH2 p.Ser906Leu", "KCNH2");
    study
        .add_individual(Individual::new("x", Genotype::Heterozygous, AffectedStatus::Unaffected))
        .unwrap();
    assert_eq!(
        study.calculate_penetrance(None, None).map(|p| p.ratio()),
        Some(0.0)
    );
}

#[test]
fn test_multi_variant_family_splits_keys() {
    let mut study = FamilyStudy::new("7", "KCNH2 p.Ser906Leu", "KCNH2");
    study
        .add_individual(
            Individual::new("proband", Genotype::CompoundHeterozygous, AffectedStatus::Affected)
                .with_phenotype(PhenotypeObservation::new("long QT").unwrap()),
        )
        .unwrap();
    study
        .add_individual(
            Individual::new("mother", Genotype::Heterozygous, AffectedStatus::Unaffected)
                .with_variant("KCNH2 p.Tyr54Asn"),
        )
        .unwrap();
    let mut record = EvidenceRecord::new("7");
    record.family = Some(study);

    let mut agg = EvidenceAggregator::new("KCNH2");
    agg.ingest(&record).unwrap();

    let compound = agg
        .penetrance()
        .get("KCNH2 p.Ser906Leu", Some(Genotype::CompoundHeterozygous))
        .unwrap();
    assert_eq!(compound.overall_penetrance(), Some(Penetrance { affected: 1, carriers: 1 }));
    let other = agg
        .penetrance()
        .get("KCNH2 p.Tyr54Asn", Some(Genotype::Heterozygous))
        .unwrap();
    assert_eq!(other.overall_penetrance(), Some(Penetrance { affected: 0, carriers: 1 }));
    assert!(other.phenotypes.is_empty());
}

proptest! {
    #[test]
    fn prop_unaffected_is_derived(total in 0u32..500, frac in 0.0f64..=1.0) {
        let affected = (f64::from(total) * frac).floor() as u32;
        let record = CohortRecord::new("p", "KCNH2", Genotype::Heterozygous, total)
            .with_phenotype("long QT", affected);
        prop_assert!(record.validate().is_ok());
        prop_assert_eq!(
            record.unaffected_count(Some("long QT")) + record.affected_count(Some("long QT")),
            total
        );
    }

    #[test]
    fn prop_unknown_never_raises_numerator(statuses in proptest::collection::vec(0u8..3, 1..20)) {
        let mut study = FamilyStudy::new("p", "KCNH2 p.Ser906Leu", "KCNH2");
        for (i, s) in statuses.iter().enumerate() {
            let status = match s {
                0 => AffectedStatus::Affected,
                1 => AffectedStatus::Unaffected,
                _ => AffectedStatus::Unknown,
            };
            study.add_individual(Individual::new(format!("i{i}"), Genotype::Heterozygous, status)).unwrap();
        }
        let p = study.calculate_penetrance(None, None).unwrap();
        let affected = statuses.iter().filter(|s| **s == 0).count() as u32;
        prop_assert_eq!(p, Penetrance { affected, carriers: statuses.len() as u32 });
    }
}
