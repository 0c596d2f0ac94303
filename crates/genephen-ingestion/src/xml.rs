//! Minimal owned XML tree over quick-xml events.
//!
//! PubMed and PMC documents are small enough to hold in memory, and the
//! article assembly needs parent/child navigation that a flat event stream
//! makes awkward. Element and attribute names are stored by local name, so
//! `xlink:href` is looked up as `href`.

use genephen_common::{GenephenError, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

#[derive(Debug, Clone, PartialEq)]
pub enum XmlChild {
    Element(XmlNode),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct XmlNode {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<XmlChild>,
}

impl XmlNode {
    fn from_start(e: &BytesStart<'_>) -> Result<Self> {
        let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
        let mut attrs = Vec::new();
        for attr in e.attributes() {
            let attr = attr.map_err(|err| GenephenError::Parse(format!("bad attribute: {err}")))?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned());
            attrs.push((key, value));
        }
        Ok(Self { name, attrs, children: Vec::new() })
    }

    /// First attribute with this local name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Direct child elements.
    pub fn elements(&self) -> impl Iterator<Item = &XmlNode> {
        self.children.iter().filter_map(|c| match c {
            XmlChild::Element(e) => Some(e),
            XmlChild::Text(_) => None,
        })
    }

    /// First direct child element with this name.
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.elements().find(|e| e.name == name)
    }

    /// All descendant elements in document order (self excluded).
    pub fn descendants(&self) -> Vec<&XmlNode> {
        let mut out = Vec::new();
        fn walk<'a>(node: &'a XmlNode, out: &mut Vec<&'a XmlNode>) {
            for child in node.elements() {
                out.push(child);
                walk(child, out);
            }
        }
        walk(self, &mut out);
        out
    }

    /// First descendant element with this name, depth-first.
    pub fn find(&self, name: &str) -> Option<&XmlNode> {
        for child in self.elements() {
            if child.name == name {
                return Some(child);
            }
            if let Some(found) = child.find(name) {
                return Some(found);
            }
        }
        None
    }

    /// Every descendant element with this name, in document order.
    pub fn find_all(&self, name: &str) -> Vec<&XmlNode> {
        self.descendants().into_iter().filter(|e| e.name == name).collect()
    }

    /// Follow a `/`-separated path of direct child names.
    pub fn path(&self, path: &str) -> Option<&XmlNode> {
        path.split('/')
            .filter(|s| !s.is_empty())
            .try_fold(self, |node, step| node.child(step))
    }

    /// Visible text: every text fragment depth-first, trimmed, space-joined.
    pub fn text_content(&self) -> String {
        let mut parts = Vec::new();
        self.collect_text(&mut parts);
        parts.join(" ")
    }

    fn collect_text<'a>(&'a self, out: &mut Vec<&'a str>) {
        for child in &self.children {
            match child {
                XmlChild::Text(t) => {
                    let t = t.trim();
                    if !t.is_empty() {
                        out.push(t);
                    }
                }
                XmlChild::Element(e) => e.collect_text(out),
            }
        }
    }

    /// Trimmed text content, `None` when empty.
    pub fn text_opt(&self) -> Option<String> {
        let text = self.text_content();
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

/// Parse a whole document into its root element.
///
/// Malformed markup, mismatched tags and truncated documents are
/// `GenephenError::Parse`.
pub fn parse_document(xml: &str) -> Result<XmlNode> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    reader.config_mut().expand_empty_elements = true;

    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;
    let mut buf = Vec::new();

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|e| {
            GenephenError::Parse(format!(
                "XML error at position {}: {e}",
                reader.buffer_position()
            ))
        })?;

        match event {
            Event::Start(ref e) => stack.push(XmlNode::from_start(e)?),
            Event::Text(ref e) => {
                let text = e
                    .unescape()
                    .map(|t| t.into_owned())
                    .unwrap_or_else(|_| String::from_utf8_lossy(e).into_owned());
                if let Some(top) = stack.last_mut() {
                    top.children.push(XmlChild::Text(text));
                }
            }
            Event::CData(ref e) => {
                let text = String::from_utf8_lossy(e).into_owned();
                if let Some(top) = stack.last_mut() {
                    top.children.push(XmlChild::Text(text));
                }
            }
            Event::End(_) => {
                let Some(done) = stack.pop() else {
                    return Err(GenephenError::Parse("unbalanced end tag".to_string()));
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(XmlChild::Element(done)),
                    None if root.is_none() => root = Some(done),
                    None => {
                        return Err(GenephenError::Parse(
                            "multiple root elements".to_string(),
                        ))
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(GenephenError::Parse(format!(
            "document truncated inside <{}>",
            stack.last().map(|n| n.name.as_str()).unwrap_or_default()
        )));
    }

    root.ok_or_else(|| GenephenError::Parse("document has no root element".to_string()))
}
