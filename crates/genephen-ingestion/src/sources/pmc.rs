//! PMC article XML (JATS) parsing.
//!
//! Extracts the pieces the retriever assembles: title, abstract, body
//! sections in source order, and every `supplementary-material` reference.
//! Downloading and decoding the supplementary files happens in
//! [`crate::supplementary`].

use genephen_common::{GenephenError, Result};

use crate::models::BodySection;
use crate::xml::{parse_document, XmlNode};

/// One `supplementary-material` element, unresolved.
#[derive(Debug, Clone, PartialEq)]
pub struct SupplementaryRef {
    pub label: String,
    pub caption: Option<String>,
    /// File references in priority order, deduplicated.
    pub references: Vec<String>,
    /// Text of the element itself, used when it references no file.
    pub inline_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PmcDocument {
    pub title: Option<String>,
    pub abstract_text: Option<String>,
    pub body: Vec<BodySection>,
    pub supplementary: Vec<SupplementaryRef>,
}

impl PmcDocument {
    pub fn has_content(&self) -> bool {
        self.title.is_some()
            || self.abstract_text.is_some()
            || !self.body.is_empty()
            || !self.supplementary.is_empty()
    }
}

/// Parse an efetch `db=pmc` response.
pub fn parse_pmc_article(xml: &str) -> Result<PmcDocument> {
    let root = parse_document(xml)?;
    let article = if root.name == "article" {
        &root
    } else {
        root.find("article")
            .ok_or_else(|| GenephenError::NotFound("no <article> in PMC response".to_string()))?
    };

    let meta = article.find("article-meta");
    let title = meta
        .and_then(|m| m.find("article-title"))
        .or_else(|| article.find("article-title"))
        .and_then(XmlNode::text_opt);

    let abstract_text = meta
        .and_then(|m| {
            let abstracts = m.find_all("abstract");
            abstracts
                .iter()
                .find(|a| a.attr("abstract-type").is_none())
                .or_else(|| abstracts.first())
                .copied()
        })
        .and_then(abstract_body);

    let mut body = Vec::new();
    if let Some(body_node) = article.child("body") {
        collect_body(body_node, &mut body);
    }

    let supplementary = article
        .find_all("supplementary-material")
        .into_iter()
        .enumerate()
        .map(|(i, node)| supplementary_ref(node, i + 1))
        .collect();

    Ok(PmcDocument { title, abstract_text, body, supplementary })
}

fn abstract_body(node: &XmlNode) -> Option<String> {
    let paragraphs: Vec<String> = node
        .find_all("p")
        .into_iter()
        .filter_map(XmlNode::text_opt)
        .collect();
    if paragraphs.is_empty() {
        node.text_opt()
    } else {
        Some(paragraphs.join("\n"))
    }
}

fn collect_body(body: &XmlNode, out: &mut Vec<BodySection>) {
    let mut paragraphs = Vec::new();
    let mut sections = Vec::new();
    split_section(body, &mut paragraphs, &mut sections);

    if !paragraphs.is_empty() {
        out.push(BodySection::new(None, paragraphs));
    }
    for sec in sections {
        collect_section(sec, out);
    }
}

/// Depth-first: the section's own heading and paragraphs, then its
/// subsections.
fn collect_section(sec: &XmlNode, out: &mut Vec<BodySection>) {
    let heading = sec.child("title").and_then(XmlNode::text_opt);
    let mut paragraphs = Vec::new();
    let mut subsections = Vec::new();
    split_section(sec, &mut paragraphs, &mut subsections);

    let section = BodySection::new(heading, paragraphs);
    if !section.is_empty() {
        out.push(section);
    }
    for sub in subsections {
        collect_section(sub, out);
    }
}

/// Paragraphs owned by `node` (stopping at nested sections, which are
/// returned separately).
fn split_section<'a>(node: &'a XmlNode, paragraphs: &mut Vec<String>, sections: &mut Vec<&'a XmlNode>) {
    for child in node.elements() {
        match child.name.as_str() {
            "sec" => sections.push(child),
            "p" => {
                if let Some(text) = child.text_opt() {
                    paragraphs.push(text);
                }
            }
            "title" | "label" | "supplementary-material" => {}
            _ => split_section(child, paragraphs, sections),
        }
    }
}

fn supplementary_ref(node: &XmlNode, index: usize) -> SupplementaryRef {
    let label = node
        .child("label")
        .and_then(XmlNode::text_opt)
        .or_else(|| non_empty(node.attr("id")))
        .or_else(|| non_empty(node.attr("title")))
        .unwrap_or_else(|| format!("Supplementary material {index}"));

    let caption = node.child("caption").and_then(XmlNode::text_opt);

    let mut references: Vec<String> = Vec::new();
    let mut push = |href: Option<&str>| {
        if let Some(href) = href.map(str::trim).filter(|h| !h.is_empty()) {
            if !references.iter().any(|r| r == href) {
                references.push(href.to_string());
            }
        }
    };
    push(node.attr("href"));
    for nested in node.descendants() {
        if nested.name == "media" || nested.name == "ext-link" {
            push(nested.attr("href"));
        }
    }

    let inline_text = {
        let parts: Vec<String> = node
            .elements()
            .filter(|c| c.name != "label" && c.name != "caption")
            .filter_map(XmlNode::text_opt)
            .collect();
        (!parts.is_empty()).then(|| parts.join("\n"))
    };

    SupplementaryRef { label, caption, references, inline_text }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ARTICLE: &str = r#"<?xml version="1.0"?>
<pmc-articleset>
<article xmlns:xlink="http://www.w3.org/1999/xlink">
  <front>
    <article-meta>
      <title-group><article-title>Penetrance of KCNH2 variants</article-title></title-group>
      <abstract abstract-type="graphical"><p>Graphical.</p></abstract>
      <abstract><sec><title>Background</title><p>LQT2 is common.</p></sec><p>We found 35 of 50.</p></abstract>
    </article-meta>
  </front>
  <body>
    <p>Preamble paragraph.</p>
    <sec>
      <title>Methods</title>
      <p>Families were recruited.</p>
      <sec><title>Genotyping</title><p>Sanger sequencing.</p></sec>
      <p>Statistics were descriptive.</p>
    </sec>
    <sec>
      <title>Results</title>
      <fig><caption><p>Pedigree of family 1.</p></caption></fig>
      <supplementary-material id="S2" xlink:href="mmc2.csv"><caption><p>Counts</p></caption></supplementary-material>
    </sec>
  </body>
  <back>
    <supplementary-material xlink:href="mmc1.docx">
      <label>Table S1</label>
      <caption><p>Clinical data</p></caption>
      <media xlink:href="mmc1.docx"/>
      <media xlink:href="https://example.org/mirror/mmc1.docx"/>
    </supplementary-material>
    <supplementary-material content-type="local-data">
      <p>Inline note on carriers.</p>
    </supplementary-material>
    <ref-list><ref><article-title>Cited work</article-title></ref></ref-list>
  </back>
</article>
</pmc-articleset>"#;

    #[test]
    fn test_title_and_abstract() {
        let doc = parse_pmc_article(ARTICLE).unwrap();
        assert_eq!(doc.title.as_deref(), Some("Penetrance of KCNH2 variants"));
        assert_eq!(doc.abstract_text.as_deref(), Some("LQT2 is common.\nWe found 35 of 50."));
    }

    #[test]
    fn test_body_sections_depth_first_without_duplication() {
        let doc = parse_pmc_article(ARTICLE).unwrap();
        let headings: Vec<Option<&str>> = doc.body.iter().map(|s| s.heading.as_deref()).collect();
        assert_eq!(headings, vec![None, Some("Methods"), Some("Genotyping"), Some("Results")]);

        assert_eq!(doc.body[0].paragraphs, vec!["Preamble paragraph."]);
        assert_eq!(
            doc.body[1].paragraphs,
            vec!["Families were recruited.", "Statistics were descriptive."]
        );
        assert_eq!(doc.body[2].paragraphs, vec!["Sanger sequencing."]);
        assert_eq!(doc.body[3].paragraphs, vec!["Pedigree of family 1."]);
    }

    #[test]
    fn test_supplementary_refs_everywhere() {
        let doc = parse_pmc_article(ARTICLE).unwrap();
        assert_eq!(doc.supplementary.len(), 3);

        let s2 = &doc.supplementary[0];
        assert_eq!(s2.label, "S2");
        assert_eq!(s2.references, vec!["mmc2.csv"]);

        let s1 = &doc.supplementary[1];
        assert_eq!(s1.label, "Table S1");
        assert_eq!(s1.caption.as_deref(), Some("Clinical data"));
        assert_eq!(
            s1.references,
            vec!["mmc1.docx", "https://example.org/mirror/mmc1.docx"]
        );

        let inline = &doc.supplementary[2];
        assert_eq!(inline.label, "Supplementary material 3");
        assert!(inline.references.is_empty());
        assert_eq!(inline.inline_text.as_deref(), Some("Inline note on carriers."));
    }

    #[test]
    fn test_missing_article_is_not_found() {
        let err = parse_pmc_article("<pmc-articleset><error>id not found</error></pmc-articleset>")
            .unwrap_err();
        assert!(matches!(err, GenephenError::NotFound(_)));
    }

    #[test]
    fn test_malformed_is_parse_error() {
        assert!(matches!(
            parse_pmc_article("<pmc-articleset><article>"),
            Err(GenephenError::Parse(_))
        ));
    }
}
