//! Supplementary file decoders.
//!
//! Only the formats the archive actually serves for supplementary material
//! are handled: plain text tables, Word documents, XML and HTML pages.

use genephen_common::{GenephenError, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use scraper::Html;
use std::io::{Cursor, Read};

use crate::xml::parse_document;

const DOCX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoder {
    PlainText,
    Docx,
    Xml,
    Html,
}

impl Decoder {
    /// Pick a decoder from the reference's extension, falling back to the
    /// declared content type.
    pub fn select(reference: &str, content_type: Option<&str>) -> Option<Self> {
        let path = reference
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        let ext = path.rsplit_once('.').map(|(_, e)| e).unwrap_or_default();

        match ext {
            "txt" | "csv" | "tsv" => return Some(Decoder::PlainText),
            "docx" => return Some(Decoder::Docx),
            "xml" => return Some(Decoder::Xml),
            "html" | "htm" => return Some(Decoder::Html),
            _ => {}
        }

        let ct = content_type?.to_ascii_lowercase();
        if ct.starts_with(DOCX_CONTENT_TYPE) {
            Some(Decoder::Docx)
        } else if ct.starts_with("text/html") || ct.starts_with("application/xhtml") {
            Some(Decoder::Html)
        } else if ct.contains("/xml") || ct.contains("+xml") {
            Some(Decoder::Xml)
        } else if ct.starts_with("text/plain")
            || ct.starts_with("text/csv")
            || ct.starts_with("text/tab-separated-values")
        {
            Some(Decoder::PlainText)
        } else {
            None
        }
    }

    /// Decode to text. `Ok(None)` when the file decoded but held no text.
    pub fn decode(self, data: &[u8]) -> Result<Option<String>> {
        let text = match self {
            Decoder::PlainText => Some(decode_plain_text(data)),
            Decoder::Docx => decode_docx(data)?,
            Decoder::Xml => decode_xml(data),
            Decoder::Html => decode_html(data),
        };
        Ok(text.filter(|t| !t.trim().is_empty()))
    }
}

/// UTF-8, with invalid sequences replaced.
pub fn decode_plain_text(data: &[u8]) -> String {
    String::from_utf8_lossy(data).into_owned()
}

/// Paragraph text of `word/document.xml`, runs concatenated, one paragraph
/// per line.
pub fn decode_docx(data: &[u8]) -> Result<Option<String>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(data))
        .map_err(|e| GenephenError::Parse(format!("not a DOCX archive: {e}")))?;
    let mut entry = archive
        .by_name("word/document.xml")
        .map_err(|e| GenephenError::Parse(format!("DOCX missing document.xml: {e}")))?;
    let mut document = String::new();
    entry.read_to_string(&mut document)?;

    let mut reader = Reader::from_str(&document);
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_run_text = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"p" => current.clear(),
                b"t" => in_run_text = true,
                _ => {}
            },
            Ok(Event::Text(ref e)) if in_run_text => {
                let text = e
                    .unescape()
                    .map(|t| t.into_owned())
                    .unwrap_or_else(|_| String::from_utf8_lossy(e).into_owned());
                current.push_str(&text);
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"t" => in_run_text = false,
                b"p" => {
                    let para = current.trim();
                    if !para.is_empty() {
                        paragraphs.push(para.to_string());
                    }
                    current.clear();
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(GenephenError::Parse(format!("DOCX XML error: {e}"))),
            _ => {}
        }
        buf.clear();
    }

    Ok((!paragraphs.is_empty()).then(|| paragraphs.join("\n")))
}

/// Visible text of an XML document; unparseable XML is returned raw.
pub fn decode_xml(data: &[u8]) -> Option<String> {
    let raw = decode_plain_text(data);
    let text = match parse_document(&raw) {
        Ok(root) => root.text_content(),
        Err(_) => raw.trim().to_string(),
    };
    (!text.is_empty()).then_some(text)
}

/// Visible text of an HTML page, skipping script and style content.
pub fn decode_html(data: &[u8]) -> Option<String> {
    let raw = decode_plain_text(data);
    let document = Html::parse_document(&raw);

    let mut parts: Vec<&str> = Vec::new();
    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|p| p.value().as_element().map(|e| e.name()))
            .is_some_and(|name| matches!(name, "script" | "style" | "noscript"));
        let text = text.trim();
        if !hidden && !text.is_empty() {
            parts.push(text);
        }
    }

    let text = parts.join(" ");
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn docx_bytes(document_xml: &str) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(document_xml.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_select_by_extension_then_content_type() {
        assert_eq!(Decoder::select("media-1.CSV?dl=1", None), Some(Decoder::PlainText));
        assert_eq!(Decoder::select("bin/mmc2.docx", None), Some(Decoder::Docx));
        assert_eq!(Decoder::select("table.xml", Some("text/plain")), Some(Decoder::Xml));
        assert_eq!(
            Decoder::select(
                "download?id=7",
                Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document")
            ),
            Some(Decoder::Docx)
        );
        assert_eq!(Decoder::select("page", Some("text/html; charset=utf-8")), Some(Decoder::Html));
        assert_eq!(Decoder::select("figure.pdf", Some("application/pdf")), None);
        assert_eq!(Decoder::select("figure.tif", None), None);
    }

    #[test]
    fn test_plain_text_lossy() {
        assert_eq!(decode_plain_text(b"a\tb\n1\t2"), "a\tb\n1\t2");
        assert_eq!(decode_plain_text(&[b'o', b'k', 0xff]), "ok\u{fffd}");
    }

    #[test]
    fn test_docx_paragraphs_in_order() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>Table S1.</w:t></w:r><w:r><w:t xml:space="preserve"> Carrier phenotypes</w:t></w:r></w:p>
    <w:p></w:p>
    <w:p><w:r><w:t>II-1 het affected</w:t></w:r></w:p>
  </w:body>
</w:document>"#;
        let text = Decoder::Docx.decode(&docx_bytes(xml)).unwrap();
        assert_eq!(text.as_deref(), Some("Table S1. Carrier phenotypes\nII-1 het affected"));
    }

    #[test]
    fn test_docx_garbage_is_parse_error() {
        assert!(matches!(Decoder::Docx.decode(b"not a zip"), Err(GenephenError::Parse(_))));
    }

    #[test]
    fn test_xml_falls_back_to_raw() {
        assert_eq!(decode_xml(b"<t><r>a</r><r>b</r></t>").as_deref(), Some("a b"));
        assert_eq!(decode_xml(b"<t><r>broken").as_deref(), Some("<t><r>broken"));
    }

    #[test]
    fn test_html_skips_scripts() {
        let html = b"<html><head><style>p{}</style><script>var x;</script></head>\
                     <body><h1>Table S2</h1><p>proband affected</p></body></html>";
        assert_eq!(decode_html(html).as_deref(), Some("Table S2 proband affected"));
    }

    #[test]
    fn test_empty_decode_is_none() {
        assert_eq!(Decoder::PlainText.decode(b"   ").unwrap(), None);
    }
}
