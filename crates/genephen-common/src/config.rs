//! Component configuration.
//!
//! Every core component takes one of these structs in its constructor; there
//! are no module-level defaults. Files are TOML/YAML/JSON with serde defaults
//! for any omitted field.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{GenephenError, Result};

// ── Retry ─────────────────────────────────────────────────────────────────────

/// Retry/backoff policy for network calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt; doubles on each further attempt.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Ceiling for any single delay.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 { 3 }
fn default_base_delay_ms() -> u64 { 1_000 }
fn default_max_delay_ms() -> u64 { 5_000 }

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryConfig {
    /// No waiting between attempts. Used by tests and offline tooling.
    pub fn immediate(max_attempts: u32) -> Self {
        Self { max_attempts, base_delay_ms: 0, max_delay_ms: 0 }
    }

    /// Delay to sleep after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(32);
        let ms = self.base_delay_ms.saturating_mul(1u64 << exp);
        Duration::from_millis(ms.min(self.max_delay_ms))
    }
}

// ── Retriever ─────────────────────────────────────────────────────────────────

/// Literature archive endpoints, credentials and network policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieverConfig {
    #[serde(default = "default_eutils_base")]
    pub eutils_base: String,

    /// Article landing host; supplementary references resolve against
    /// `<pmc_article_base>/<PMCID>/` first.
    #[serde(default = "default_pmc_article_base")]
    pub pmc_article_base: String,

    /// Further base URLs tried in order after the article host. `{pmcid}` is
    /// substituted with the article's PMC id.
    #[serde(default = "default_supplementary_mirrors")]
    pub supplementary_mirrors: Vec<String>,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default = "default_tool")]
    pub tool: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub retry: RetryConfig,

    /// Hosts the transport may contact. Subdomains of a listed host are allowed.
    #[serde(default = "default_allowed_domains")]
    pub allowed_domains: Vec<String>,
}

fn default_eutils_base() -> String { "https://eutils.ncbi.nlm.nih.gov/entrez/eutils".to_string() }
fn default_pmc_article_base() -> String { "https://pmc.ncbi.nlm.nih.gov/articles".to_string() }
fn default_supplementary_mirrors() -> Vec<String> {
    vec![
        "https://pmc.ncbi.nlm.nih.gov/".to_string(),
        "https://www.ncbi.nlm.nih.gov/pmc/articles/{pmcid}/".to_string(),
        "https://www.ncbi.nlm.nih.gov/pmc/articles/{pmcid}/pdf/".to_string(),
        "https://ftp.ncbi.nlm.nih.gov/pub/pmc/articles/{pmcid}/".to_string(),
    ]
}
fn default_tool() -> String { "genephen".to_string() }
fn default_user_agent() -> String {
    concat!("genephen/", env!("CARGO_PKG_VERSION"), " (penetrance literature mining)").to_string()
}
fn default_timeout_secs() -> u64 { 15 }
fn default_allowed_domains() -> Vec<String> {
    vec![
        "eutils.ncbi.nlm.nih.gov".to_string(),
        "pmc.ncbi.nlm.nih.gov".to_string(),
        "www.ncbi.nlm.nih.gov".to_string(),
        "ftp.ncbi.nlm.nih.gov".to_string(),
    ]
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            eutils_base: default_eutils_base(),
            pmc_article_base: default_pmc_article_base(),
            supplementary_mirrors: default_supplementary_mirrors(),
            api_key: None,
            email: None,
            tool: default_tool(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            retry: RetryConfig::default(),
            allowed_domains: default_allowed_domains(),
        }
    }
}

// ── Dispatcher ────────────────────────────────────────────────────────────────

/// Cost gate for the two-stage extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Minimum classifier confidence required to run the expensive stage.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,

    /// Characters of article text shown to the relevance classifier.
    #[serde(default = "default_classifier_max_chars")]
    pub classifier_max_chars: usize,

    /// Optional description of what the run is looking for.
    #[serde(default)]
    pub query_context: Option<String>,
}

fn default_min_confidence() -> f64 { 0.7 }
fn default_classifier_max_chars() -> usize { 2_000 }

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
            classifier_max_chars: default_classifier_max_chars(),
            query_context: None,
        }
    }
}

impl DispatcherConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(GenephenError::Config(format!(
                "min_confidence must be within [0, 1], got {}",
                self.min_confidence
            )));
        }
        Ok(())
    }
}

// ── LLM backend ───────────────────────────────────────────────────────────────

/// OpenAI-compatible chat-completion endpoint used for both extraction stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Model for the structured extraction stage.
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Cheaper model for the relevance gate; falls back to `model`.
    #[serde(default)]
    pub classifier_model: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,

    #[serde(default)]
    pub temperature: f32,

    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_llm_base_url() -> String { "https://api.openai.com/v1".to_string() }
fn default_llm_model() -> String { "gpt-4o-mini".to_string() }
fn default_llm_max_tokens() -> u32 { 4_096 }
fn default_llm_timeout_secs() -> u64 { 120 }

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            classifier_model: None,
            api_key: None,
            max_tokens: default_llm_max_tokens(),
            temperature: 0.0,
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

impl LlmConfig {
    pub fn classifier_model(&self) -> &str {
        self.classifier_model.as_deref().unwrap_or(&self.model)
    }
}

// ── Loading helpers ───────────────────────────────────────────────────────────

/// Load any config struct from a TOML, YAML or JSON file, chosen by extension.
pub fn load_file<T: serde::de::DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "toml" => toml::from_str(&content)
            .map_err(|e| GenephenError::Config(format!("{}: {e}", path.display()))),
        "yaml" | "yml" => serde_yaml::from_str(&content)
            .map_err(|e| GenephenError::Config(format!("{}: {e}", path.display()))),
        "json" => Ok(serde_json::from_str(&content)?),
        other => Err(GenephenError::Config(format!(
            "unsupported config extension '{other}' for {}",
            path.display()
        ))),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
