//! PubMed query builders for gene-centric and variant-centric searches.

use genephen_common::ParsedVariant;

const CLINICAL_TERMS: &str =
    r#"("phenotype"[Title/Abstract] OR "clinical"[Title/Abstract] OR "patient"[Title/Abstract] OR "case"[Title/Abstract])"#;

/// Gene in Gene or Title/Abstract fields, each synonym in Title/Abstract,
/// variant terms, clinical terms, optional publication year range, reviews
/// excluded.
pub fn gene_query(gene: &str, synonyms: &[String], date_range: Option<(i32, i32)>) -> String {
    let gene = gene.trim();
    let mut names = vec![format!(r#""{gene}"[Gene]"#), format!(r#""{gene}"[Title/Abstract]"#)];
    let mut seen = vec![gene.to_lowercase()];
    for synonym in synonyms.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        if seen.contains(&synonym.to_lowercase()) {
            continue;
        }
        seen.push(synonym.to_lowercase());
        names.push(format!(r#""{synonym}"[Title/Abstract]"#));
    }

    let mut parts = vec![
        format!("({})", names.join(" OR ")),
        r#"AND ("variant"[Title/Abstract] OR "mutation"[Title/Abstract] OR "polymorphism"[Title/Abstract])"#
            .to_string(),
        format!("AND {CLINICAL_TERMS}"),
    ];

    if let Some((start, end)) = date_range {
        parts.push(format!(r#"AND "{start}"[PDAT]:"{end}"[PDAT]"#));
    }

    parts.push(r#"NOT "review"[Publication Type]"#.to_string());
    parts.push(r#"NOT ("in vitro"[Title/Abstract] AND NOT "patient"[Title/Abstract])"#.to_string());
    parts.join(" ")
}

/// Gene plus the protein change in parenthesised and bare form, and the
/// coding change when known. Returns `None` without a gene symbol.
pub fn variant_query(parsed: &ParsedVariant) -> Option<String> {
    let gene = parsed.gene.as_deref()?;

    let mut alternatives = Vec::new();
    if let Some(protein) = &parsed.protein_change {
        let bare = protein.trim_start_matches("p.");
        alternatives.push(format!(r#""{protein}"[Title/Abstract]"#));
        alternatives.push(format!(r#""p.({bare})"[Title/Abstract]"#));
        alternatives.push(format!(r#""{bare}"[Title/Abstract]"#));
    }
    if let Some(cdna) = &parsed.cdna_change {
        alternatives.push(format!(r#""{cdna}"[Title/Abstract]"#));
    }

    let mut query = format!(r#""{gene}"[Title/Abstract]"#);
    if !alternatives.is_empty() {
        query.push_str(&format!(" AND ({})", alternatives.join(" OR ")));
    }
    query.push_str(&format!(" AND {CLINICAL_TERMS}"));
    Some(query)
}
