//! Supplementary-material resolution.
//!
//! A reference in the article XML is usually a bare file name. It is joined
//! against the article host first, then each configured mirror, and the
//! first candidate that downloads wins. Failures are logged and the item is
//! skipped; they never abort the rest of the document.

use genephen_common::{RetrieverConfig, Result};
use tracing::{debug, info, instrument};
use url::Url;

use crate::decode::Decoder;
use crate::models::SupplementarySection;
use crate::retry::with_retry;
use crate::sources::pmc::SupplementaryRef;
use crate::transport::{HttpResponse, HttpTransport};

/// `PMC` prefix added when missing.
pub fn normalize_pmcid(pmcid: &str) -> String {
    let id = pmcid.trim();
    if id.to_ascii_uppercase().starts_with("PMC") {
        format!("PMC{}", &id[3..])
    } else {
        format!("PMC{id}")
    }
}

/// Candidate download URLs for one reference, in priority order,
/// deduplicated. Absolute `http(s)` references are used as-is.
pub fn candidate_urls(config: &RetrieverConfig, pmcid: &str, reference: &str) -> Vec<String> {
    let reference = reference.trim();
    if let Ok(url) = Url::parse(reference) {
        if matches!(url.scheme(), "http" | "https") {
            return vec![url.to_string()];
        }
    }

    let pmcid = normalize_pmcid(pmcid);
    let mut bases = vec![format!(
        "{}/{}/",
        config.pmc_article_base.trim_end_matches('/'),
        pmcid
    )];
    bases.extend(
        config
            .supplementary_mirrors
            .iter()
            .map(|m| m.replace("{pmcid}", &pmcid)),
    );

    let mut out: Vec<String> = Vec::new();
    for base in bases {
        let joined = Url::parse(&base).and_then(|b| b.join(reference));
        match joined {
            Ok(url) => {
                let url = url.to_string();
                if !out.contains(&url) {
                    out.push(url);
                }
            }
            Err(e) => debug!(%base, %reference, error = %e, "Skipping unusable mirror base"),
        }
    }
    out
}

/// Downloads and decodes supplementary files through the shared transport.
pub struct SupplementaryResolver<'a> {
    transport: &'a dyn HttpTransport,
    config: &'a RetrieverConfig,
}

impl<'a> SupplementaryResolver<'a> {
    pub fn new(transport: &'a dyn HttpTransport, config: &'a RetrieverConfig) -> Self {
        Self { transport, config }
    }

    /// Resolve every reference of an article. Items that produce no text
    /// are dropped.
    pub async fn resolve_all(&self, pmcid: &str, refs: &[SupplementaryRef]) -> Vec<SupplementarySection> {
        let mut sections = Vec::new();
        for item in refs {
            if let Some(section) = self.resolve(pmcid, item).await {
                sections.push(section);
            }
        }
        if !refs.is_empty() {
            info!(pmcid, found = refs.len(), resolved = sections.len(), "Supplementary material processed");
        }
        sections
    }

    /// Caption first, then the decoded file (or the element's inline text
    /// when it references no file).
    pub async fn resolve(&self, pmcid: &str, item: &SupplementaryRef) -> Option<SupplementarySection> {
        let mut parts: Vec<String> = item.caption.iter().cloned().collect();
        let mut source = None;

        if item.references.is_empty() {
            match &item.inline_text {
                Some(text) => parts.push(text.clone()),
                None => debug!(pmcid, label = %item.label, "Supplementary material has no file or text"),
            }
        } else {
            for reference in &item.references {
                if let Some((url, text)) = self.fetch_reference(pmcid, reference).await {
                    parts.push(text.trim().to_string());
                    source = Some(url);
                    break;
                }
            }
            if source.is_none() {
                info!(pmcid, label = %item.label, references = ?item.references, "Skipping supplementary material");
            }
        }

        if parts.is_empty() {
            return None;
        }
        Some(SupplementarySection {
            label: item.label.trim().to_string(),
            source,
            text: parts.join("\n\n"),
        })
    }

    /// First candidate that downloads is decoded; no fallback past it.
    #[instrument(skip(self))]
    async fn fetch_reference(&self, pmcid: &str, reference: &str) -> Option<(String, String)> {
        for url in candidate_urls(self.config, pmcid, reference) {
            let response = match self.download(&url).await {
                Ok(r) => r,
                Err(e) => {
                    debug!(%url, error = %e, "Supplementary candidate failed");
                    continue;
                }
            };

            let Some(decoder) = Decoder::select(reference, response.content_type.as_deref()) else {
                info!(%url, content_type = ?response.content_type, "No decoder for supplementary file");
                return None;
            };

            return match decoder.decode(&response.body) {
                Ok(Some(text)) => {
                    debug!(%url, ?decoder, chars = text.len(), "Decoded supplementary file");
                    Some((url, text))
                }
                Ok(None) => {
                    info!(%url, "Supplementary file decoded to no text");
                    None
                }
                Err(e) => {
                    info!(%url, error = %e, "Failed to decode supplementary file");
                    None
                }
            };
        }
        None
    }

    async fn download(&self, url: &str) -> Result<HttpResponse> {
        let transport = self.transport;
        with_retry(&self.config.retry, "supplementary download", move || async move {
            transport.get(url, &[]).await?.error_for_status()
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_pmcid_prefix() {
        assert_eq!(normalize_pmcid("123"), "PMC123");
        assert_eq!(normalize_pmcid("pmc123"), "PMC123");
        assert_eq!(normalize_pmcid(" PMC123 "), "PMC123");
    }

    #[test]
    fn test_candidate_order() {
        let config = RetrieverConfig::default();
        let urls = candidate_urls(&config, "PMC42", "mmc1.docx");
        assert_eq!(
            urls,
            vec![
                "https://pmc.ncbi.nlm.nih.gov/articles/PMC42/mmc1.docx",
                "https://pmc.ncbi.nlm.nih.gov/mmc1.docx",
                "https://www.ncbi.nlm.nih.gov/pmc/articles/PMC42/mmc1.docx",
                "https://www.ncbi.nlm.nih.gov/pmc/articles/PMC42/pdf/mmc1.docx",
                "https://ftp.ncbi.nlm.nih.gov/pub/pmc/articles/PMC42/mmc1.docx",
            ]
        );
    }

    #[test]
    fn test_root_relative_reference_dedupes() {
        let config = RetrieverConfig::default();
        let urls = candidate_urls(&config, "42", "/articles/PMC42/bin/s1.csv");
        assert_eq!(urls[0], "https://pmc.ncbi.nlm.nih.gov/articles/PMC42/bin/s1.csv");
        assert_eq!(urls.iter().filter(|u| u.starts_with("https://pmc.")).count(), 1);
    }

    #[test]
    fn test_absolute_reference_used_as_is() {
        let config = RetrieverConfig::default();
        let urls = candidate_urls(&config, "PMC42", "https://example.org/s1.csv");
        assert_eq!(urls, vec!["https://example.org/s1.csv"]);
    }
}
