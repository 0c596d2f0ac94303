//! Prompt text for the chat-completion backend.

pub const CLASSIFIER_SYSTEM: &str = "You are a medical literature filter. Determine if articles \
contain genetic variant and phenotype information.";

pub const EXTRACTOR_SYSTEM: &str = "You are a medical text extraction expert. You return only \
valid JSON objects, with no commentary.";

/// First `max_chars` characters, cut on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub fn relevance_prompt(text: &str, context: Option<&str>, max_chars: usize) -> String {
    let context = context
        .map(|c| format!("\nWe are specifically looking for: {c}\n"))
        .unwrap_or_default();
    let excerpt = truncate_chars(text, max_chars);
    let ellipsis = if excerpt.len() < text.len() { "..." } else { "" };

    format!(
        r#"Determine if this scientific article contains information about:
1. Specific genetic variants (gene names and mutations)
2. Associated phenotypes or clinical outcomes
3. Patient data or case reports
{context}
Article text:
{excerpt}{ellipsis}

Return JSON with:
{{
  "relevant": true/false,
  "confidence": 0.0-1.0,
  "reason": "brief explanation"
}}

Be strict: only mark as relevant if the article clearly discusses specific genetic variants with phenotype data."#
    )
}

pub fn extraction_prompt(text: &str, gene: Option<&str>) -> String {
    let focus = gene
        .map(|g| format!("Focus on variants in the {g} gene.\n"))
        .unwrap_or_default();

    format!(
        r#"Extract genotype-phenotype information from this text.
{focus}
Choose the extraction type by how the paper reports its data.

Use "cohort" when the paper reports AGGREGATE COUNTS, e.g. "50 heterozygous carriers, 35 had long QT syndrome".
- total_carriers is the number of carriers with that genotype
- affected_count per phenotype is how many carriers had it
- never report unaffected counts; they are derived

Use "individual" when the paper describes SPECIFIC PEOPLE, e.g. a proband and relatives.
- list EVERY person mentioned, affected and unaffected carriers, and wild-type relatives
- affected is true when the person has the phenotype, false when explicitly unaffected, null when not stated

Return ONLY a JSON object of this form:
{{
  "extraction_type": "cohort" | "individual",
  "gene": "KCNH2",
  "cohort_data": [
    {{"variant": "KCNH2 c.2717C>T p.(Ser906Leu)", "genotype": "heterozygous", "total_carriers": 50,
      "phenotype_counts": [{{"phenotype": "long QT syndrome", "affected_count": 35}}],
      "population": "optional", "notes": "optional"}}
  ],
  "individual_data": [
    {{"id": "proband", "variant": "KCNH2 p.Tyr54Asn", "genotype": "heterozygous", "affected": true,
      "phenotypes": [{{"phenotype": "long QT syndrome", "severity": "severe", "onset_age": 12}}],
      "age": 23, "sex": "male", "age_at_onset": 12, "relation": "proband"}}
  ]
}}

Text to analyze:
{text}"#
    )
}
