//! HTTP seam for every archive call.
//!
//! The retriever talks to the network only through [`HttpTransport`]; the
//! production implementation is a reqwest client capped to an allowlist of
//! archive hosts. Tests swap in a scripted transport.

use async_trait::async_trait;
use genephen_common::{GenephenError, Result, RetrieverConfig};
use reqwest::{Client, ClientBuilder};
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// A fully-read HTTP response. Non-2xx statuses are returned, not raised;
/// callers decide via [`HttpResponse::error_for_status`].
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn ok(url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self { url: url.into(), status: 200, content_type: None, body: body.into() }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(GenephenError::HttpStatus { url: self.url, status: self.status })
        }
    }

    /// Body as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Issue one GET. Connection failures and timeouts map to
    /// `GenephenError::Transport`; a URL outside the sandbox maps to `Blocked`.
    async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<HttpResponse>;
}

/// reqwest client that only contacts approved archive hosts.
#[derive(Debug, Clone)]
pub struct SandboxTransport {
    client: Client,
    allowlist: HashSet<String>,
}

impl SandboxTransport {
    pub fn new(config: &RetrieverConfig) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| GenephenError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            allowlist: config.allowed_domains.iter().cloned().collect(),
        })
    }

    /// Appends an exact hostname to the allowlist.
    pub fn allow_domain(&mut self, domain: &str) {
        self.allowlist.insert(domain.to_string());
    }

    /// Exact host match or a subdomain of an allowed host.
    pub fn is_allowed(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        let Some(host) = parsed.host_str() else {
            return false;
        };
        self.allowlist
            .iter()
            .any(|allowed| host == allowed || host.ends_with(&format!(".{allowed}")))
    }
}

#[async_trait]
impl HttpTransport for SandboxTransport {
    async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<HttpResponse> {
        if !self.is_allowed(url) {
            return Err(GenephenError::Blocked(format!(
                "domain not in allowlist for URL {url}"
            )));
        }

        let resp = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| GenephenError::transport(url, e))?;

        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let final_url = resp.url().to_string();
        let body = resp
            .bytes()
            .await
            .map_err(|e| GenephenError::transport(url, e))?
            .to_vec();

        debug!(url = %final_url, status, bytes = body.len(), "HTTP GET complete");
        Ok(HttpResponse { url: final_url, status, content_type, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sandbox() -> SandboxTransport {
        SandboxTransport::new(&RetrieverConfig::default()).unwrap()
    }

    #[test]
    fn test_allowlist_exact_and_subdomain() {
        let mut t = sandbox();
        assert!(t.is_allowed("https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi"));
        assert!(t.is_allowed("https://pmc.ncbi.nlm.nih.gov/articles/PMC1/bin/s1.docx"));
        assert!(!t.is_allowed("https://evil.example.com/ncbi.nlm.nih.gov"));
        assert!(!t.is_allowed("not a url"));

        t.allow_domain("example.org");
        assert!(t.is_allowed("https://mirror.example.org/file.txt"));
    }

    #[tokio::test]
    async fn test_blocked_url_never_leaves_process() {
        let err = sandbox().get("https://evil.example.com/x", &[]).await.unwrap_err();
        assert!(matches!(err, GenephenError::Blocked(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_error_for_status() {
        let ok = HttpResponse::ok("u", "body");
        assert!(ok.error_for_status().is_ok());

        let err = HttpResponse::ok("u", "").with_status(503).error_for_status().unwrap_err();
        assert!(matches!(err, GenephenError::HttpStatus { status: 503, .. }));
    }
}
