//! genephen — penetrance literature mining for one gene.
//! Entry point for the pipeline binary.

mod config;
mod pipeline;

use genephen_extract::{EvidenceExtractionDispatcher, OpenAiCompatibleBackend};
use genephen_ingestion::PubMedClient;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("genephen=debug,info")),
        )
        .init();

    info!("genephen starting up...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = config::Config::load()?;
    info!(
        "Configuration loaded. Gene: {}, model: {}, classifier: {}, threshold: {}",
        config.run.gene,
        config.llm.model,
        config.llm.classifier_model(),
        config.dispatcher.min_confidence
    );

    if config.llm.api_key.is_none() {
        warn!("No LLM API key configured (set llm.api_key or GENEPHEN_LLM_API_KEY)");
    }
    if config.retriever.api_key.is_none() {
        info!("No NCBI API key; E-utilities allows 3 requests per second without one");
    }

    let gene = config.run.gene.trim().to_string();
    if config.dispatcher.query_context.is_none() {
        config.dispatcher.query_context = Some(format!("{gene} variants with phenotype data"));
    }

    let source = PubMedClient::new(config.retriever.clone())?;
    let backend = Arc::new(
        OpenAiCompatibleBackend::new(config.llm.clone(), config.dispatcher.classifier_max_chars)?
            .with_gene(gene),
    );
    let dispatcher = EvidenceExtractionDispatcher::new(
        backend.clone(),
        backend,
        config.dispatcher.clone(),
    )?;

    let result = pipeline::run_pipeline(&source, &dispatcher, &config.run).await?;

    info!(
        "Run {} finished: {} papers, {} extracted, {} filtered out, {} errors",
        result.job_id,
        result.ids.len(),
        result.stats.extracted,
        result.n_filtered_out(),
        result.errors.len()
    );
    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}
