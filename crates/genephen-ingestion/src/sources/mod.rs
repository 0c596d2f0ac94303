//! Literature source clients.

pub mod gene;
pub mod pmc;
pub mod pubmed;

use async_trait::async_trait;
use genephen_common::Result;
use std::collections::HashMap;

use crate::models::{ArticleMetadata, ArticleText, Provenance};

/// Common interface for literature archives.
#[async_trait]
pub trait LiteratureSource: Send + Sync {
    /// Identifiers matching a query, in the archive's relevance order,
    /// truncated to `limit`.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<String>>;

    /// One batched request. Unknown ids are absent from the map.
    async fn fetch_metadata(&self, ids: &[String]) -> Result<HashMap<String, ArticleMetadata>>;

    /// Full text with supplementary sections; `None` when the article has
    /// no full-text counterpart.
    async fn fetch_full_text(&self, id: &str) -> Result<Option<ArticleText>>;

    /// Best available document. Falls back to the abstract when full text is
    /// not preferred or not obtainable; `NotFound` when neither exists.
    async fn fetch_document(&self, id: &str, prefer_full_text: bool) -> Result<ArticleText>;

    /// Alternative names for `gene` to widen a search. Archives without a
    /// gene registry have none.
    async fn gene_synonyms(&self, _gene: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn fetch_text(&self, id: &str, prefer_full_text: bool) -> Result<(String, Provenance)> {
        let doc = self.fetch_document(id, prefer_full_text).await?;
        Ok((doc.text(), doc.provenance))
    }
}
