//! Data models for literature retrieval.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Citation-level metadata from one batched efetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleMetadata {
    pub pmid: String,
    pub title: Option<String>,
    pub abstract_text: Option<String>,
    pub journal: Option<String>,
    /// `YYYY-MM-DD` when the archive gave a year, otherwise the raw
    /// `MedlineDate` text.
    pub publication_date: Option<String>,
}

impl ArticleMetadata {
    /// Publication date as a calendar date, when it was normalised.
    pub fn pub_date(&self) -> Option<NaiveDate> {
        self.publication_date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
    }
}

/// Which representation of the article the text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Abstract,
    FullText,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Abstract => "abstract",
            Provenance::FullText => "full_text",
        }
    }
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Section types inferred from body headings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SectionType {
    Introduction,
    Methods,
    Results,
    Discussion,
    Conclusion,
    CaseReport,
    Supplementary,
    Other,
}

impl SectionType {
    pub fn from_heading(heading: &str) -> Self {
        let h = heading.to_lowercase();
        if h.contains("introduction") || h.starts_with("background") { SectionType::Introduction }
        else if h.contains("method") || h.contains("material")      { SectionType::Methods }
        else if h.contains("result")                                { SectionType::Results }
        else if h.contains("discussion")                            { SectionType::Discussion }
        else if h.contains("conclusion")                            { SectionType::Conclusion }
        else if h.contains("case") || h.contains("pedigree")        { SectionType::CaseReport }
        else if h.contains("supplement")                            { SectionType::Supplementary }
        else                                                        { SectionType::Other }
    }
}

/// One body section in source order. Nested sections are flattened
/// depth-first; each carries only its own paragraphs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodySection {
    pub heading: Option<String>,
    pub section_type: SectionType,
    pub paragraphs: Vec<String>,
}

impl BodySection {
    pub fn new(heading: Option<String>, paragraphs: Vec<String>) -> Self {
        let section_type = heading
            .as_deref()
            .map(SectionType::from_heading)
            .unwrap_or(SectionType::Other);
        Self { heading, section_type, paragraphs }
    }

    pub fn is_empty(&self) -> bool {
        self.heading.is_none() && self.paragraphs.is_empty()
    }
}

/// Decoded supplementary file (or inline supplementary text).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplementarySection {
    pub label: String,
    /// URL the content was decoded from; `None` for inline material.
    pub source: Option<String>,
    pub text: String,
}

/// Best-available text for one article. Immutable once assembled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleText {
    /// Identifier the caller asked for (PMID, or PMCID for direct fetches).
    pub id: String,
    pub pmcid: Option<String>,
    pub title: Option<String>,
    pub abstract_text: Option<String>,
    pub body: Option<Vec<BodySection>>,
    pub supplementary: Option<Vec<SupplementarySection>>,
    pub provenance: Provenance,
}

impl ArticleText {
    pub fn from_abstract(id: impl Into<String>, title: Option<String>, abstract_text: String) -> Self {
        Self {
            id: id.into(),
            pmcid: None,
            title,
            abstract_text: Some(abstract_text),
            body: None,
            supplementary: None,
            provenance: Provenance::Abstract,
        }
    }

    /// Markdown-style assembly: title, abstract, body sections in order,
    /// supplementary sections last.
    pub fn render(&self) -> String {
        let mut parts: Vec<String> = Vec::new();

        if let Some(title) = &self.title {
            parts.push(format!("# {}", title.trim()));
        }
        if let Some(abs) = &self.abstract_text {
            parts.push(format!("## Abstract\n{}", abs.trim()));
        }
        for section in self.body.iter().flatten() {
            let mut block = Vec::new();
            if let Some(h) = &section.heading {
                block.push(format!("## {}", h.trim()));
            }
            block.extend(section.paragraphs.iter().cloned());
            if !block.is_empty() {
                parts.push(block.join("\n\n"));
            }
        }
        for supp in self.supplementary.iter().flatten() {
            parts.push(format!("## Supplementary: {}\n\n{}", supp.label.trim(), supp.text.trim()));
        }

        parts.join("\n\n")
    }

    /// Text handed to extraction: the bare abstract for abstract-only
    /// articles, the rendered document otherwise.
    pub fn text(&self) -> String {
        match self.provenance {
            Provenance::Abstract => self.abstract_text.clone().unwrap_or_default(),
            Provenance::FullText => self.render(),
        }
    }

    pub fn supplementary_count(&self) -> usize {
        self.supplementary.as_ref().map_or(0, Vec::len)
    }
}
