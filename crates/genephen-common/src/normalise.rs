//! Free-text variant notation normalisation.
//!
//! Parses strings like "KCNH2 c.2717C>T p.(Ser906Leu)" or "SCN5A p.R1193Q"
//! into a gene symbol, a coding change and a protein change, and renders a
//! canonical string used as the variant's identity key everywhere else.
//!
//! # Example
//! ```
//! use genephen_common::normalize_variant;
//! assert_eq!(
//!     normalize_variant("KCNH2 c.2717C>T p.(Ser906Leu)"),
//!     "KCNH2 c.2717C>T p.Ser906Leu",
//! );
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Structured form of one raw variant string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedVariant {
    /// Input text as supplied.
    pub raw: String,
    /// Leading gene symbol, e.g. "KCNH2".
    pub gene: Option<String>,
    /// Coding-sequence substitution, e.g. "c.2717C>T".
    pub cdna_change: Option<String>,
    /// Protein change with parentheses removed, e.g. "p.Ser906Leu".
    pub protein_change: Option<String>,
    /// Gene present and at least one change present.
    pub is_valid: bool,
    /// Canonical identity string.
    pub normalized: String,
}

impl std::fmt::Display for ParsedVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.normalized)
    }
}

pub struct VariantNormaliser {
    /// Regex: uppercase symbol at string start followed by whitespace.
    re_gene: Regex,
    /// Regex: c.2717C>T (case-insensitive bases)
    re_cdna: Regex,
    /// Protein forms in priority order: p.(Ser906Leu), p.Ser906Leu, p.(R534C), p.R534C
    re_protein: [Regex; 4],
}

impl VariantNormaliser {
    pub fn new() -> Self {
        Self {
            re_gene: Regex::new(r"^([A-Z][A-Z0-9]+)\s+").unwrap(),
            re_cdna: Regex::new(r"(?i)c\.(\d+[A-Z]>[A-Z])").unwrap(),
            re_protein: [
                Regex::new(r"p\.\(([A-Z][a-z]{2}\d+[A-Z][a-z]{2})\)").unwrap(),
                Regex::new(r"p\.([A-Z][a-z]{2}\d+[A-Z][a-z]{2})").unwrap(),
                Regex::new(r"p\.\(([A-Z]\d+[A-Z])\)").unwrap(),
                Regex::new(r"p\.([A-Z]\d+[A-Z])").unwrap(),
            ],
        }
    }

    pub fn parse(&self, raw: &str) -> ParsedVariant {
        let trimmed = raw.trim();

        let gene = self
            .re_gene
            .captures(trimmed)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());

        let cdna_change = self
            .re_cdna
            .captures(trimmed)
            .and_then(|c| c.get(1))
            .map(|m| format!("c.{}", m.as_str()));

        let protein_change = self.re_protein.iter().find_map(|re| {
            re.captures(trimmed)
                .and_then(|c| c.get(1))
                .map(|m| format!("p.{}", m.as_str()))
        });

        let is_valid = gene.is_some() && (cdna_change.is_some() || protein_change.is_some());

        let normalized = match &gene {
            Some(g) => {
                let mut parts = vec![g.as_str()];
                if let Some(c) = &cdna_change {
                    parts.push(c);
                }
                if let Some(p) = &protein_change {
                    parts.push(p);
                }
                parts.join(" ")
            }
            None => trimmed.to_string(),
        };

        ParsedVariant {
            raw: raw.to_string(),
            gene,
            cdna_change,
            protein_change,
            is_valid,
            normalized,
        }
    }

    pub fn normalize(&self, raw: &str) -> String {
        self.parse(raw).normalized
    }
}

impl Default for VariantNormaliser {
    fn default() -> Self { Self::new() }
}

fn shared() -> &'static VariantNormaliser {
    static NORMALISER: OnceLock<VariantNormaliser> = OnceLock::new();
    NORMALISER.get_or_init(VariantNormaliser::new)
}

/// Parse a raw variant string with the shared normaliser.
pub fn parse_variant(raw: &str) -> ParsedVariant {
    shared().parse(raw)
}

/// Canonical identity string: gene, coding change, protein change joined by
/// spaces, or the trimmed input when no gene symbol leads the string.
pub fn normalize_variant(raw: &str) -> String {
    shared().normalize(raw)
}

/// Two raw strings denote the same variant iff their canonical forms are equal.
pub fn same_variant(a: &str, b: &str) -> bool {
    normalize_variant(a) == normalize_variant(b)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
