//! One mining run: discover papers, fetch their text, gate and extract, then
//! aggregate into penetrance estimates.

use chrono::{DateTime, Utc};
use genephen_common::{GenephenError, Result};
use genephen_extract::{DispatcherStats, EvidenceExtractionDispatcher};
use genephen_ingestion::{query, ArticleMetadata, LiteratureSource, Provenance};
use genephen_penetrance::{AggregateSummary, EvidenceAggregator, EvidenceRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::RunConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Synonyms,
    Metadata,
    Fetch,
    Extract,
    Aggregate,
}

/// A per-paper failure. Recorded, never fatal to the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunError {
    pub id: String,
    pub stage: Stage,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub job_id: Uuid,
    pub gene: String,
    /// Query that was searched; `None` when ids were given explicitly.
    pub query: Option<String>,
    pub ids: Vec<String>,
    pub provenance: HashMap<String, Provenance>,
    /// Every dispatched record, filtered-out ones included.
    pub records: Vec<EvidenceRecord>,
    pub errors: Vec<RunError>,
    pub stats: DispatcherStats,
    pub summary: AggregateSummary,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl RunResult {
    pub fn n_filtered_out(&self) -> usize {
        self.records.iter().filter(|r| r.is_filtered_out()).count()
    }
}

fn run_error(id: &str, stage: Stage, err: impl std::fmt::Display) -> RunError {
    RunError { id: id.to_string(), stage, message: err.to_string() }
}

fn enrich(record: &mut EvidenceRecord, meta: Option<&ArticleMetadata>) {
    let Some(meta) = meta else { return };
    if record.title.is_none() {
        record.title = meta.title.clone();
    }
    if record.journal.is_none() {
        record.journal = meta.journal.clone();
    }
    if record.publication_date.is_none() {
        record.publication_date = meta.publication_date.clone();
    }
}

/// Configured synonyms, plus registry aliases when expansion is on. A
/// failed lookup is recorded and the configured list used alone.
async fn synonyms(source: &dyn LiteratureSource, run: &RunConfig, errors: &mut Vec<RunError>) -> Vec<String> {
    let mut synonyms = run.synonyms.clone();
    if run.expand_synonyms {
        match source.gene_synonyms(run.gene.trim()).await {
            Ok(found) => {
                info!(found = found.len(), "Gene synonyms added to search");
                synonyms.extend(found);
            }
            Err(e) => {
                warn!(error = %e, "Synonym lookup failed; searching configured names only");
                errors.push(run_error(run.gene.trim(), Stage::Synonyms, &e));
            }
        }
    }
    synonyms
}

/// Ids to process: the explicit list when given, otherwise a search.
async fn discover(
    source: &dyn LiteratureSource,
    run: &RunConfig,
    errors: &mut Vec<RunError>,
) -> Result<(Option<String>, Vec<String>)> {
    if !run.pmids.is_empty() {
        let mut ids: Vec<String> = Vec::new();
        for id in run.pmids.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
            if !ids.iter().any(|seen| seen == id) {
                ids.push(id.to_string());
            }
        }
        return Ok((None, ids));
    }

    let q = match &run.query {
        Some(q) => q.clone(),
        None => {
            let synonyms = synonyms(source, run, errors).await;
            query::gene_query(&run.gene, &synonyms, run.date_range)
        }
    };
    let ids = source.search(&q, run.max_results).await?;
    info!(query = %q, found = ids.len(), "Search complete");
    Ok((Some(q), ids))
}

/// Only discovery failures abort the run; everything after is per paper.
#[instrument(skip(source, dispatcher, run), fields(gene = %run.gene))]
pub async fn run_pipeline(
    source: &dyn LiteratureSource,
    dispatcher: &EvidenceExtractionDispatcher,
    run: &RunConfig,
) -> Result<RunResult> {
    let job_id = Uuid::new_v4();
    let started_at = Utc::now();
    let clock = Instant::now();
    info!(%job_id, "Run started");

    let mut errors = Vec::new();
    let (query, ids) = discover(source, run, &mut errors).await?;

    let metadata = if ids.is_empty() {
        HashMap::new()
    } else {
        match source.fetch_metadata(&ids).await {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "Metadata fetch failed; continuing without citations");
                errors.push(run_error("*", Stage::Metadata, &e));
                HashMap::new()
            }
        }
    };

    let mut aggregator = EvidenceAggregator::new(run.gene.trim());
    let mut records = Vec::new();
    let mut provenance = HashMap::new();

    for id in &ids {
        let (text, prov) = match source.fetch_text(id, run.prefer_full_text).await {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!(id = %id, error = %e, "Text fetch failed");
                errors.push(run_error(id, Stage::Fetch, &e));
                continue;
            }
        };
        provenance.insert(id.clone(), prov);

        let mut record = match dispatcher.dispatch(id, &text).await {
            Ok(r) => r,
            Err(e) => {
                let e = GenephenError::from(e);
                warn!(id = %id, error = %e, "Extraction failed");
                errors.push(run_error(id, Stage::Extract, &e));
                continue;
            }
        };
        enrich(&mut record, metadata.get(id));

        match aggregator.ingest(&record) {
            Ok(outcome) => info!(
                id = %id,
                cohorts = outcome.cohorts,
                family_studies = outcome.family_studies,
                associations = outcome.associations,
                filtered_out = outcome.filtered_out,
                "Record aggregated"
            ),
            Err(e) => {
                warn!(id = %id, error = %e, "Record rejected by aggregation");
                errors.push(run_error(id, Stage::Aggregate, &e));
            }
        }
        records.push(record);
    }

    let result = RunResult {
        job_id,
        gene: run.gene.trim().to_string(),
        query,
        ids,
        provenance,
        records,
        errors,
        stats: dispatcher.stats(),
        summary: aggregator.summary(run.genotype_filter),
        started_at,
        duration_ms: u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX),
    };
    info!(
        %job_id,
        papers = result.ids.len(),
        extracted = result.stats.extracted,
        skipped = result.stats.skipped,
        errors = result.errors.len(),
        duration_ms = result.duration_ms,
        "Run complete"
    );
    Ok(result)
}
