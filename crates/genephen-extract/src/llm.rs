//! OpenAI-compatible chat-completion backend (OpenAI, Groq, OpenRouter,
//! vLLM, LMStudio, Ollama's `/v1` endpoint, ...) implementing both
//! extraction capabilities.

use async_trait::async_trait;
use genephen_common::LlmConfig;
use genephen_penetrance::EvidenceRecord;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

use crate::capability::{EvidenceExtractor, RelevanceClassifier, RelevanceVerdict};
use crate::error::ExtractionError;
use crate::payload::{extract_json, parse_record};
use crate::prompts;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    fn system(content: &str) -> Self {
        Self { role: "system".to_string(), content: content.to_string() }
    }

    fn user(content: String) -> Self {
        Self { role: "user".to_string(), content }
    }
}

async fn check_response_status(resp: reqwest::Response) -> Result<serde_json::Value, ExtractionError> {
    let status = resp.status().as_u16();
    let text = resp.text().await?;
    if status >= 400 {
        let body: serde_json::Value = serde_json::from_str(&text).unwrap_or_default();
        let message = body["error"]["message"]
            .as_str()
            .or_else(|| body["message"].as_str())
            .map(str::to_string)
            .unwrap_or_else(|| text.chars().take(200).collect());
        return Err(ExtractionError::ApiError { status, message });
    }
    Ok(serde_json::from_str(&text)?)
}

#[derive(Debug, Deserialize)]
struct RawVerdict {
    #[serde(default)]
    relevant: bool,
    #[serde(default = "default_verdict_confidence")]
    confidence: f64,
    #[serde(default)]
    reason: String,
}

fn default_verdict_confidence() -> f64 { 0.5 }

/// Parse a relevance reply; a missing `confidence` reads as 0.5.
pub fn parse_verdict(content: &str) -> Result<RelevanceVerdict, ExtractionError> {
    let json = extract_json(content)
        .ok_or_else(|| ExtractionError::Payload("no JSON object in relevance reply".to_string()))?;
    let raw: RawVerdict = serde_json::from_str(json)?;
    Ok(RelevanceVerdict::new(raw.relevant, raw.confidence, raw.reason))
}

pub struct OpenAiCompatibleBackend {
    config: LlmConfig,
    classifier_max_chars: usize,
    gene: Option<String>,
    client: reqwest::Client,
}

impl OpenAiCompatibleBackend {
    pub fn new(config: LlmConfig, classifier_max_chars: usize) -> Result<Self, ExtractionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            config,
            classifier_max_chars,
            gene: None,
            client,
        })
    }

    /// Gene the extraction prompt focuses on; also the fallback gene for
    /// payloads that omit one.
    pub fn with_gene(mut self, gene: impl Into<String>) -> Self {
        self.gene = Some(gene.into());
        self
    }

    pub fn model_id(&self) -> &str {
        &self.config.model
    }

    fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) if !key.is_empty() => req.bearer_auth(key),
            _ => req,
        }
    }

    async fn complete(&self, model: &str, messages: Vec<Message>, max_tokens: u32) -> Result<String, ExtractionError> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model":           model,
            "messages":        messages,
            "max_tokens":      max_tokens,
            "temperature":     self.config.temperature,
            "response_format": {"type": "json_object"},
        });
        let resp = self.auth(self.client.post(&url)).json(&body).send().await?;
        let json = check_response_status(resp).await?;
        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| ExtractionError::Payload("completion has no message content".to_string()))?;
        debug!(
            model,
            prompt_tokens = json["usage"]["prompt_tokens"].as_u64().unwrap_or(0),
            completion_tokens = json["usage"]["completion_tokens"].as_u64().unwrap_or(0),
            "Completion received"
        );
        Ok(content.to_string())
    }
}

#[async_trait]
impl RelevanceClassifier for OpenAiCompatibleBackend {
    #[instrument(skip(self, text, context))]
    async fn classify(&self, text: &str, context: Option<&str>) -> Result<RelevanceVerdict, ExtractionError> {
        let prompt = prompts::relevance_prompt(text, context, self.classifier_max_chars);
        let messages = vec![Message::system(prompts::CLASSIFIER_SYSTEM), Message::user(prompt)];
        let content = self
            .complete(self.config.classifier_model(), messages, 256)
            .await?;
        parse_verdict(&content)
    }
}

#[async_trait]
impl EvidenceExtractor for OpenAiCompatibleBackend {
    #[instrument(skip(self, text))]
    async fn extract(&self, text: &str, source_id: &str) -> Result<EvidenceRecord, ExtractionError> {
        let prompt = prompts::extraction_prompt(text, self.gene.as_deref());
        let messages = vec![Message::system(prompts::EXTRACTOR_SYSTEM), Message::user(prompt)];
        let content = self
            .complete(&self.config.model, messages, self.config.max_tokens)
            .await?;
        parse_record(&content, source_id, self.gene.as_deref())
    }
}
