//! PubMed E-utilities client.
//!
//! Endpoints used:
//!   esearch: id search (JSON)
//!   efetch:  citation metadata (`db=pubmed`, XML) and PMC articles (`db=pmc`, XML)
//!   elink:   PMID → PMCID cross-reference (JSON)
//!   esummary: gene aliases (`db=gene`, JSON), see [`super::gene`]

use async_trait::async_trait;
use chrono::NaiveDate;
use genephen_common::{GenephenError, Result, RetrieverConfig};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::gene::{search_terms, SynonymFinder};
use super::pmc::parse_pmc_article;
use super::LiteratureSource;
use crate::models::{ArticleMetadata, ArticleText, Provenance};
use crate::retry::with_retry;
use crate::supplementary::{normalize_pmcid, SupplementaryResolver};
use crate::transport::{HttpResponse, HttpTransport, SandboxTransport};

pub struct PubMedClient {
    transport: Arc<dyn HttpTransport>,
    config: RetrieverConfig,
}

impl PubMedClient {
    /// Client over the sandboxed reqwest transport.
    pub fn new(config: RetrieverConfig) -> Result<Self> {
        let transport = SandboxTransport::new(&config)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    pub fn with_transport(config: RetrieverConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    /// NCBI Gene lookups over this client's transport and retry policy.
    pub fn synonym_finder(&self) -> SynonymFinder<'_> {
        SynonymFinder::new(self)
    }

    fn base_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("tool", self.config.tool.clone())];
        if let Some(key) = self.config.api_key.as_ref().filter(|k| !k.is_empty()) {
            params.push(("api_key", key.clone()));
        }
        if let Some(email) = self.config.email.as_ref().filter(|e| !e.is_empty()) {
            params.push(("email", email.clone()));
        }
        params
    }

    /// One E-utilities call with retry. Non-2xx statuses become errors.
    pub(crate) async fn request(&self, endpoint: &str, params: Vec<(&'static str, String)>) -> Result<HttpResponse> {
        let url = format!("{}/{}", self.config.eutils_base.trim_end_matches('/'), endpoint);
        let mut query = self.base_params();
        query.extend(params);

        let transport = self.transport.as_ref();
        let (url, query) = (&url, &query);
        with_retry(&self.config.retry, endpoint, move || async move {
            transport.get(url, query).await?.error_for_status()
        })
        .await
    }

    /// Abstract of a single citation via a one-id metadata fetch.
    #[instrument(skip(self))]
    pub async fn fetch_abstract(&self, id: &str) -> Result<Option<String>> {
        let mut meta = self.fetch_metadata(&[id.to_string()]).await?;
        let abstract_text = meta.remove(id).and_then(|m| m.abstract_text);
        if abstract_text.is_none() {
            info!(id, "No abstract found");
        }
        Ok(abstract_text)
    }

    /// Citation id → `PMC…` id, `None` when the article is not in PMC.
    #[instrument(skip(self))]
    pub async fn resolve_pmcid(&self, id: &str) -> Result<Option<String>> {
        let resp = self
            .request(
                "elink.fcgi",
                vec![
                    ("dbfrom", "pubmed".to_string()),
                    ("db", "pmc".to_string()),
                    ("id", id.to_string()),
                    ("retmode", "json".to_string()),
                ],
            )
            .await?;

        let pmcid = parse_elink(&resp.body)?;
        match &pmcid {
            Some(p) => debug!(id, pmcid = %p, "Resolved PMC cross-reference"),
            None => info!(id, "No PMC article found"),
        }
        Ok(pmcid)
    }

    /// Structured PMC article with supplementary material resolved.
    #[instrument(skip(self))]
    pub async fn fetch_article(&self, pmcid: &str) -> Result<ArticleText> {
        let pmcid = normalize_pmcid(pmcid);
        let resp = self
            .request(
                "efetch.fcgi",
                vec![
                    ("db", "pmc".to_string()),
                    ("id", pmcid.trim_start_matches("PMC").to_string()),
                    ("retmode", "xml".to_string()),
                ],
            )
            .await?;

        let doc = parse_pmc_article(&resp.text())?;
        if !doc.has_content() {
            return Err(GenephenError::NotFound(format!("no text content in PMC XML for {pmcid}")));
        }

        let resolver = SupplementaryResolver::new(self.transport.as_ref(), &self.config);
        let supplementary = resolver.resolve_all(&pmcid, &doc.supplementary).await;

        let article = ArticleText {
            id: pmcid.clone(),
            pmcid: Some(pmcid),
            title: doc.title,
            abstract_text: doc.abstract_text,
            body: (!doc.body.is_empty()).then_some(doc.body),
            supplementary: (!supplementary.is_empty()).then_some(supplementary),
            provenance: Provenance::FullText,
        };
        info!(
            pmcid = ?article.pmcid,
            sections = article.body.as_ref().map_or(0, Vec::len),
            supplementary = article.supplementary_count(),
            "Retrieved full text"
        );
        Ok(article)
    }
}

#[async_trait]
impl LiteratureSource for PubMedClient {
    #[instrument(skip(self))]
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        let resp = self
            .request(
                "esearch.fcgi",
                vec![
                    ("db", "pubmed".to_string()),
                    ("term", query.to_string()),
                    ("retmax", limit.to_string()),
                    ("retmode", "json".to_string()),
                ],
            )
            .await?;

        let mut ids = parse_esearch(&resp.body)?;
        ids.truncate(limit);
        debug!(count = ids.len(), "PubMed esearch returned PMIDs");
        Ok(ids)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    async fn fetch_metadata(&self, ids: &[String]) -> Result<HashMap<String, ArticleMetadata>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let resp = self
            .request(
                "efetch.fcgi",
                vec![
                    ("db", "pubmed".to_string()),
                    ("id", ids.join(",")),
                    ("retmode", "xml".to_string()),
                ],
            )
            .await?;

        let articles = parse_pubmed_xml(&resp.text())?;
        if articles.len() < ids.len() {
            debug!(requested = ids.len(), found = articles.len(), "Some ids unknown to PubMed");
        }
        Ok(articles)
    }

    #[instrument(skip(self))]
    async fn fetch_full_text(&self, id: &str) -> Result<Option<ArticleText>> {
        let Some(pmcid) = self.resolve_pmcid(id).await? else {
            return Ok(None);
        };

        match self.fetch_article(&pmcid).await {
            Ok(mut article) => {
                article.id = id.to_string();
                Ok(Some(article))
            }
            Err(GenephenError::NotFound(reason)) => {
                info!(id, %pmcid, %reason, "PMC record has no usable text");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self))]
    async fn fetch_document(&self, id: &str, prefer_full_text: bool) -> Result<ArticleText> {
        if prefer_full_text {
            match self.fetch_full_text(id).await {
                Ok(Some(article)) => return Ok(article),
                Ok(None) => info!(id, "Falling back to abstract"),
                Err(e) => warn!(id, error = %e, "Full text failed, falling back to abstract"),
            }
        }

        let meta = self.fetch_metadata(&[id.to_string()]).await?.remove(id);
        match meta {
            Some(ArticleMetadata { title, abstract_text: Some(abs), .. }) => {
                Ok(ArticleText::from_abstract(id, title, abs))
            }
            _ => Err(GenephenError::NotFound(format!("no text content available for {id}"))),
        }
    }

    async fn gene_synonyms(&self, gene: &str) -> Result<Vec<String>> {
        let found = self.synonym_finder().find_gene_synonyms(gene, false).await?;
        Ok(search_terms(gene, &found))
    }
}

// ── Response parsing ──────────────────────────────────────────────────────────

pub(crate) fn parse_json(body: &[u8], what: &str) -> Result<Value> {
    serde_json::from_slice(body).map_err(|e| GenephenError::Parse(format!("{what} JSON: {e}")))
}

/// `esearchresult.idlist`, in archive order.
pub fn parse_esearch(body: &[u8]) -> Result<Vec<String>> {
    let json = parse_json(body, "esearch")?;
    let list = json["esearchresult"]["idlist"]
        .as_array()
        .ok_or_else(|| GenephenError::Parse("esearch response has no idlist".to_string()))?;
    Ok(list
        .iter()
        .filter_map(|v| v.as_str().map(String::from))
        .collect())
}

/// First PMC link of the first linkset. The direct `pubmed_pmc` link wins
/// over other PMC link names; citation links (`*_refs`) never count.
pub fn parse_elink(body: &[u8]) -> Result<Option<String>> {
    let json = parse_json(body, "elink")?;
    let Some(dbs) = json["linksets"][0]["linksetdbs"].as_array() else {
        return Ok(None);
    };

    let pmc_dbs: Vec<&Value> = dbs
        .iter()
        .filter(|db| db["dbto"].as_str() == Some("pmc"))
        .filter(|db| !db["linkname"].as_str().unwrap_or_default().ends_with("_refs"))
        .collect();
    let chosen = pmc_dbs
        .iter()
        .find(|db| db["linkname"].as_str() == Some("pubmed_pmc"))
        .or_else(|| pmc_dbs.first());

    let link = chosen.and_then(|db| match &db["links"][0] {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    });
    Ok(link.map(|l| normalize_pmcid(&l)))
}

#[derive(Default)]
struct PubDateParts {
    year: Option<String>,
    month: Option<String>,
    day: Option<String>,
    medline: Option<String>,
}

/// Parse PubMed efetch XML into metadata keyed by PMID.
/// Handles the <PubmedArticleSet><PubmedArticle> structure.
pub fn parse_pubmed_xml(xml: &str) -> Result<HashMap<String, ArticleMetadata>> {
    let mut articles = HashMap::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    // State machine over the element path
    let mut current: Option<ArticleMetadata> = None;
    let mut path: Vec<String> = Vec::new();
    let mut title_parts: Vec<String> = Vec::new();
    let mut abstract_parts: Vec<String> = Vec::new();
    let mut current_abstract: Vec<String> = Vec::new();
    let mut date = PubDateParts::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                match name.as_str() {
                    "PubmedArticle" => {
                        current = Some(ArticleMetadata::default());
                        title_parts.clear();
                        abstract_parts.clear();
                        date = PubDateParts::default();
                    }
                    "AbstractText" => current_abstract.clear(),
                    _ => {}
                }
                path.push(name);
            }
            Ok(Event::Text(ref e)) => {
                let text = e
                    .unescape()
                    .map(|t| t.into_owned())
                    .unwrap_or_else(|_| String::from_utf8_lossy(e).into_owned());
                if let Some(meta) = current.as_mut() {
                    let leaf = path.last().map(String::as_str).unwrap_or_default();
                    let parent = path
                        .len()
                        .checked_sub(2)
                        .map(|i| path[i].as_str())
                        .unwrap_or_default();
                    let within = |name: &str| path.iter().any(|p| p == name);

                    if within("ArticleTitle") {
                        title_parts.push(text);
                    } else if within("AbstractText") {
                        current_abstract.push(text);
                    } else if leaf == "PMID" && parent == "MedlineCitation" {
                        meta.pmid = text;
                    } else if leaf == "Title" && parent == "Journal" {
                        meta.journal = Some(text);
                    } else if parent == "PubDate" && within("JournalIssue") {
                        match leaf {
                            "Year" => date.year = Some(text),
                            "Month" => date.month = Some(text),
                            "Day" => date.day = Some(text),
                            "MedlineDate" => date.medline = Some(text),
                            _ => {}
                        }
                    }
                }
            }
            Ok(Event::End(_)) => match path.pop().as_deref() {
                Some("AbstractText") => {
                    let part = current_abstract.join(" ");
                    if !part.is_empty() {
                        abstract_parts.push(part);
                    }
                }
                Some("PubmedArticle") => {
                    if let Some(mut meta) = current.take() {
                        let title = title_parts.join(" ");
                        meta.title = (!title.is_empty()).then_some(title);
                        meta.abstract_text =
                            (!abstract_parts.is_empty()).then(|| abstract_parts.join("\n"));
                        meta.publication_date = normalise_pub_date(std::mem::take(&mut date));
                        if meta.pmid.is_empty() {
                            warn!("Skipping PubmedArticle without PMID");
                        } else {
                            articles.insert(meta.pmid.clone(), meta);
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(GenephenError::Parse(format!("PubMed XML: {e}")));
            }
            _ => {}
        }
        buf.clear();
    }

    if !path.is_empty() {
        return Err(GenephenError::Parse("PubMed XML truncated".to_string()));
    }
    Ok(articles)
}

/// `YYYY-MM-DD`, with missing month/day as 1. A non-numeric year is kept
/// verbatim; without a year the `MedlineDate` text is used.
fn normalise_pub_date(parts: PubDateParts) -> Option<String> {
    let Some(year_text) = parts.year else {
        return parts.medline.map(|m| m.trim().to_string()).filter(|m| !m.is_empty());
    };
    let Ok(year) = year_text.trim().parse::<i32>() else {
        return Some(year_text);
    };

    let month = parts.month.as_deref().map(month_number).unwrap_or(1);
    let day = parts
        .day
        .as_deref()
        .and_then(|d| d.trim().parse::<u32>().ok())
        .unwrap_or(1);

    NaiveDate::from_ymd_opt(year, month, day)
        .or_else(|| NaiveDate::from_ymd_opt(year, month, 1))
        .map(|d| d.format("%Y-%m-%d").to_string())
        .or(Some(year_text))
}

/// Numeric months, full names and abbreviations. Unknown → 1.
fn month_number(month: &str) -> u32 {
    let m = month.trim().to_ascii_lowercase();
    if let Ok(n) = m.parse::<u32>() {
        return if (1..=12).contains(&n) { n } else { 1 };
    }
    const MONTHS: [&str; 12] = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ];
    let prefix: String = m.chars().take(3).collect();
    MONTHS
        .iter()
        .position(|abbr| *abbr == prefix)
        .map(|i| i as u32 + 1)
        .unwrap_or(1)
}
