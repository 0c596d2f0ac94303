//! NCBI Gene lookups: official symbol, aliases and other designations of a
//! human gene, used to widen literature searches.

use genephen_common::{GenephenError, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use super::pubmed::{parse_esearch, parse_json, PubMedClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynonymKind {
    OfficialSymbol,
    Alias,
    /// Long-form protein names; verbose and rarely useful as search terms.
    OtherDesignation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneSynonym {
    pub term: String,
    pub kind: SynonymKind,
    pub gene_id: u64,
}

/// Gene registry client sharing a [`PubMedClient`]'s transport and retry.
pub struct SynonymFinder<'a> {
    client: &'a PubMedClient,
}

impl<'a> SynonymFinder<'a> {
    pub fn new(client: &'a PubMedClient) -> Self {
        Self { client }
    }

    /// Synonyms of the top human match for `gene`; empty when NCBI Gene has
    /// no such gene.
    #[instrument(skip(self))]
    pub async fn find_gene_synonyms(
        &self,
        gene: &str,
        include_other_designations: bool,
    ) -> Result<Vec<GeneSynonym>> {
        let Some(gene_id) = self.search_gene(gene).await? else {
            warn!(gene, "No NCBI Gene record found");
            return Ok(Vec::new());
        };

        let resp = self
            .client
            .request(
                "esummary.fcgi",
                vec![
                    ("db", "gene".to_string()),
                    ("id", gene_id.to_string()),
                    ("retmode", "json".to_string()),
                ],
            )
            .await?;
        let synonyms = parse_gene_summary(&resp.body, gene_id, include_other_designations)?;
        info!(gene, gene_id, found = synonyms.len(), "Gene synonyms resolved");
        Ok(synonyms)
    }

    async fn search_gene(&self, gene: &str) -> Result<Option<u64>> {
        let resp = self
            .client
            .request(
                "esearch.fcgi",
                vec![
                    ("db", "gene".to_string()),
                    ("term", format!("{}[Gene Name] AND human[Organism]", gene.trim())),
                    ("retmax", "1".to_string()),
                    ("retmode", "json".to_string()),
                ],
            )
            .await?;

        parse_esearch(&resp.body)?
            .first()
            .map(|id| {
                id.parse::<u64>()
                    .map_err(|_| GenephenError::Parse(format!("gene id '{id}' is not numeric")))
            })
            .transpose()
    }
}

/// `result.<id>`: `name`, comma-separated `otheraliases` and pipe-separated
/// `otherdesignations`.
pub fn parse_gene_summary(
    body: &[u8],
    gene_id: u64,
    include_other_designations: bool,
) -> Result<Vec<GeneSynonym>> {
    let json = parse_json(body, "esummary")?;
    let entry = &json["result"][gene_id.to_string()];
    if !entry.is_object() {
        return Err(GenephenError::Parse(format!("esummary has no record for gene {gene_id}")));
    }

    let make = |term: &str, kind| GeneSynonym { term: term.trim().to_string(), kind, gene_id };
    let mut out = Vec::new();
    if let Some(name) = entry["name"].as_str().filter(|n| !n.trim().is_empty()) {
        out.push(make(name, SynonymKind::OfficialSymbol));
    }
    let aliases = entry["otheraliases"].as_str().unwrap_or_default();
    out.extend(
        aliases
            .split(',')
            .filter(|a| !a.trim().is_empty())
            .map(|a| make(a, SynonymKind::Alias)),
    );
    if include_other_designations {
        let designations = entry["otherdesignations"].as_str().unwrap_or_default();
        out.extend(
            designations
                .split('|')
                .filter(|d| !d.trim().is_empty())
                .map(|d| make(d, SynonymKind::OtherDesignation)),
        );
    }
    Ok(out)
}

/// Official symbol and aliases worth adding to a search for `gene`: the
/// gene itself and repeats are dropped, case-insensitively.
pub fn search_terms(gene: &str, synonyms: &[GeneSynonym]) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for syn in synonyms.iter().filter(|s| s.kind != SynonymKind::OtherDesignation) {
        let term = syn.term.trim();
        if term.is_empty()
            || term.eq_ignore_ascii_case(gene.trim())
            || terms.iter().any(|t| t.eq_ignore_ascii_case(term))
        {
            continue;
        }
        terms.push(term.to_string());
    }
    terms
}
