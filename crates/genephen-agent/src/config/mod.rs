//! Configuration loading for the genephen binary.
//! Reads genephen.toml from the current directory or the path in GENEPHEN_CONFIG.

use genephen_common::{DispatcherConfig, Genotype, LlmConfig, RetrieverConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub retriever: RetrieverConfig,
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    pub run: RunConfig,
}

/// What one invocation mines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub gene: String,
    /// Explicit search query; the gene-centric query is built when absent.
    #[serde(default)]
    pub query: Option<String>,
    /// Extra names ORed with the gene in the built query.
    #[serde(default)]
    pub synonyms: Vec<String>,
    /// Also look up the gene's official symbol and aliases in NCBI Gene.
    #[serde(default)]
    pub expand_synonyms: bool,
    /// Explicit citation ids; skips the search entirely when non-empty.
    #[serde(default)]
    pub pmids: Vec<String>,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "bool_true")]
    pub prefer_full_text: bool,
    /// Restricts the printed summary to one genotype.
    #[serde(default)]
    pub genotype_filter: Option<Genotype>,
    /// Inclusive publication-year range, e.g. `[2000, 2024]`.
    #[serde(default)]
    pub date_range: Option<(i32, i32)>,
}

fn default_max_results() -> usize { 20 }
fn bool_true() -> bool { true }

impl RunConfig {
    pub fn new(gene: impl Into<String>) -> Self {
        Self {
            gene: gene.into(),
            query: None,
            synonyms: Vec::new(),
            expand_synonyms: false,
            pmids: Vec::new(),
            max_results: default_max_results(),
            prefer_full_text: true,
            genotype_filter: None,
            date_range: None,
        }
    }
}

mod tests;

impl Config {
    /// Load configuration from genephen.toml.
    /// Checks GENEPHEN_CONFIG env var first, then current directory. A `.env`
    /// file, if present, is read before secrets are resolved.
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let path = std::env::var("GENEPHEN_CONFIG")
            .unwrap_or_else(|_| "genephen.toml".to_string());

        if !Path::new(&path).exists() {
            anyhow::bail!(
                "Config file not found: {}\n\
                 Create genephen.toml with at least a [run] table naming the gene.",
                path
            );
        }

        let mut config = Self::from_file(&path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Fill empty credentials from `NCBI_API_KEY` and `GENEPHEN_LLM_API_KEY`.
    /// Values already present in the file win.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        fill_if_empty(&mut self.retriever.api_key, lookup("NCBI_API_KEY"));
        fill_if_empty(&mut self.llm.api_key, lookup("GENEPHEN_LLM_API_KEY"));
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.run.gene.trim().is_empty() {
            anyhow::bail!("run.gene must not be empty");
        }
        if self.run.max_results == 0 && self.run.pmids.is_empty() {
            anyhow::bail!("run.max_results must be at least 1");
        }
        if let Some((from, to)) = self.run.date_range {
            if from > to {
                anyhow::bail!("run.date_range is reversed: {from} > {to}");
            }
        }
        self.dispatcher.validate()?;
        Ok(())
    }
}

fn fill_if_empty(slot: &mut Option<String>, value: Option<String>) {
    let empty = slot.as_deref().map_or(true, |s| s.trim().is_empty());
    if empty {
        if let Some(v) = value.filter(|v| !v.trim().is_empty()) {
            *slot = Some(v);
        }
    }
}
