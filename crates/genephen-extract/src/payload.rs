//! Decoding of extraction-backend JSON into an [`EvidenceRecord`].
//!
//! Two shapes are accepted:
//!   flat:    `{"variant", "carrier_status", "phenotypes": [...], "age", "sex", ...}`
//!   unified: `{"extraction_type": "cohort" | "individual", "gene",
//!               "cohort_data": [...], "individual_data": [...]}`

use genephen_common::{parse_variant, AffectedStatus, Genotype, PhenotypeObservation, Sex};
use genephen_penetrance::{CohortRecord, EvidenceRecord, FamilyStudy, Individual, PhenotypeCount};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::ExtractionError;

// ── Wire shapes ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawPhenotype {
    #[serde(alias = "phenotype", default)]
    name: String,
    #[serde(default)]
    ontology_id: Option<String>,
    #[serde(default)]
    onset_age: Option<Value>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FlatPayload {
    #[serde(default)]
    gene: Option<String>,
    #[serde(default)]
    variant: Option<String>,
    #[serde(default)]
    carrier_status: Option<String>,
    #[serde(default)]
    phenotypes: Vec<RawPhenotype>,
    #[serde(default)]
    age: Option<Value>,
    #[serde(default)]
    sex: Option<String>,
    #[serde(default)]
    treatment: Option<String>,
    #[serde(default)]
    outcome: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPhenotypeCount {
    phenotype: String,
    affected_count: u32,
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCohort {
    #[serde(default)]
    variant: Option<String>,
    #[serde(default)]
    genotype: Option<String>,
    total_carriers: u32,
    #[serde(default)]
    phenotype_counts: Vec<RawPhenotypeCount>,
    #[serde(default)]
    population: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawIndividual {
    id: Value,
    #[serde(default)]
    variant: Option<String>,
    #[serde(default)]
    genotype: Option<String>,
    #[serde(default)]
    affected: Option<bool>,
    #[serde(default)]
    phenotypes: Vec<RawPhenotype>,
    #[serde(default)]
    age: Option<Value>,
    #[serde(default)]
    sex: Option<String>,
    #[serde(default)]
    age_at_onset: Option<Value>,
    #[serde(default)]
    age_at_diagnosis: Option<Value>,
    #[serde(default)]
    relation: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UnifiedPayload {
    extraction_type: String,
    #[serde(default)]
    gene: Option<String>,
    #[serde(default)]
    cohort_data: Vec<RawCohort>,
    #[serde(default)]
    individual_data: Vec<RawIndividual>,
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// The JSON object inside a model reply: a ```json fence, any fence, or the
/// outermost braces.
pub fn extract_json(content: &str) -> Option<&str> {
    let content = content.trim();
    let fenced = content
        .split_once("```json")
        .or_else(|| content.split_once("```"))
        .and_then(|(_, rest)| rest.split_once("```").map(|(inner, _)| inner.trim()))
        .or_else(|| content.split_once("```json").map(|(_, rest)| rest.trim()));
    let candidate = fenced.unwrap_or(content);

    let start = candidate.find('{')?;
    let end = candidate.rfind('}')?;
    (start < end).then(|| &candidate[start..=end])
}

/// Ages arrive as numbers or strings like "45", "12 years", "~30".
fn lenient_age(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let digits: String = s
                .trim_start_matches(|c: char| !c.is_ascii_digit())
                .chars()
                .take_while(|c| c.is_ascii_digit() || *c == '.')
                .collect();
            digits.parse().ok()
        }
        _ => None,
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn observations(raw: Vec<RawPhenotype>, source_id: &str) -> Vec<PhenotypeObservation> {
    raw.into_iter()
        .filter_map(|p| {
            let onset = lenient_age(p.onset_age.as_ref());
            let mut obs = match PhenotypeObservation::new(&p.name) {
                Ok(obs) => obs,
                Err(_) => {
                    debug!(source = source_id, "Dropping phenotype with blank name");
                    return None;
                }
            };
            obs.ontology_id = non_blank(p.ontology_id);
            obs.onset_age = onset;
            obs.severity = non_blank(p.severity);
            obs.notes = non_blank(p.notes);
            Some(obs)
        })
        .collect()
}

fn genotype_of(raw: Option<&str>) -> Genotype {
    raw.map(Genotype::parse_lenient).unwrap_or_default()
}

fn id_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

// ── Decoding ──────────────────────────────────────────────────────────────────

/// Decode a backend reply for `source_id`. `default_gene` fills in a gene
/// the payload omits.
pub fn parse_record(
    content: &str,
    source_id: &str,
    default_gene: Option<&str>,
) -> Result<EvidenceRecord, ExtractionError> {
    let json = extract_json(content)
        .ok_or_else(|| ExtractionError::Payload("no JSON object in reply".to_string()))?;
    let value: Value = serde_json::from_str(json)?;
    if !value.is_object() {
        return Err(ExtractionError::Payload("reply is not a JSON object".to_string()));
    }

    if value.get("extraction_type").is_some() {
        let payload: UnifiedPayload = serde_json::from_value(value)?;
        unified_record(payload, source_id, default_gene)
    } else {
        let payload: FlatPayload = serde_json::from_value(value)?;
        Ok(flat_record(payload, source_id, default_gene))
    }
}

fn flat_record(payload: FlatPayload, source_id: &str, default_gene: Option<&str>) -> EvidenceRecord {
    let variant = non_blank(payload.variant);
    let gene = non_blank(payload.gene)
        .or_else(|| variant.as_deref().and_then(|v| parse_variant(v).gene))
        .or_else(|| default_gene.map(str::to_string));

    let mut record = EvidenceRecord::new(source_id);
    record.gene = gene;
    record.variant = variant;
    record.genotype = genotype_of(payload.carrier_status.as_deref());
    record.phenotypes = observations(payload.phenotypes, source_id);
    record.age = lenient_age(payload.age.as_ref());
    record.sex = payload.sex.as_deref().and_then(Sex::parse_lenient);
    record.treatment = non_blank(payload.treatment);
    record.outcome = non_blank(payload.outcome);
    record
}

fn unified_record(
    payload: UnifiedPayload,
    source_id: &str,
    default_gene: Option<&str>,
) -> Result<EvidenceRecord, ExtractionError> {
    let kind = payload.extraction_type.trim().to_ascii_lowercase();
    if kind != "cohort" && kind != "individual" {
        return Err(ExtractionError::Payload(format!(
            "unknown extraction_type '{}'",
            payload.extraction_type
        )));
    }

    let gene = non_blank(payload.gene)
        .or_else(|| default_gene.map(str::to_string))
        .ok_or_else(|| ExtractionError::Payload("payload names no gene".to_string()))?;

    let mut record = EvidenceRecord::new(source_id);
    record.gene = Some(gene.clone());

    for raw in payload.cohort_data {
        let cohort = CohortRecord {
            source_id: source_id.to_string(),
            gene: gene.clone(),
            variant: non_blank(raw.variant),
            genotype: genotype_of(raw.genotype.as_deref()),
            total_carriers: raw.total_carriers,
            phenotype_counts: raw
                .phenotype_counts
                .into_iter()
                .map(|pc| PhenotypeCount {
                    notes: non_blank(pc.notes),
                    ..PhenotypeCount::new(pc.phenotype, pc.affected_count)
                })
                .collect(),
            population: non_blank(raw.population),
            notes: non_blank(raw.notes),
        };
        cohort.validate()?;
        record.cohorts.push(cohort);
    }

    if !payload.individual_data.is_empty() {
        let primary = payload
            .individual_data
            .iter()
            .find_map(|i| non_blank(i.variant.clone()))
            .unwrap_or_else(|| "unknown".to_string());
        let mut study = FamilyStudy::new(source_id, primary, gene.clone());
        study.study_type = Some(kind.clone());

        for raw in payload.individual_data {
            let mut ind = Individual::new(
                id_string(&raw.id),
                genotype_of(raw.genotype.as_deref()),
                AffectedStatus::from(raw.affected),
            );
            ind.variant = non_blank(raw.variant);
            ind.phenotypes = observations(raw.phenotypes, source_id);
            ind.age = lenient_age(raw.age.as_ref());
            ind.sex = raw.sex.as_deref().and_then(Sex::parse_lenient);
            ind.age_at_onset = lenient_age(raw.age_at_onset.as_ref());
            ind.age_at_diagnosis = lenient_age(raw.age_at_diagnosis.as_ref());
            ind.relation = non_blank(raw.relation);
            ind.notes = non_blank(raw.notes);
            study.add_individual(ind)?;
        }
        record.family = Some(study);
    }

    Ok(record)
}
