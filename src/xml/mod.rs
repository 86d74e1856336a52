//! Minimal namespace-aware XML document model.
//!
//! The response grammar only needs a small slice of XML: elements with
//! attributes, text and CDATA content, and namespace resolution so nodes
//! can be looked up by `(namespace, local name)`. This module parses a
//! document into that tree and nothing more; prolog, doctype, comments and
//! processing instructions are skipped.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum XmlError {
    #[error("unexpected end of document")]
    UnexpectedEof,

    #[error("malformed markup near byte {0}")]
    Malformed(usize),

    #[error("mismatched closing tag '{found}', expected '{expected}'")]
    MismatchedTag { expected: String, found: String },

    #[error("document has no root element")]
    NoRoot,
}

/// A child of an element: either a nested element or a run of text.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// An element with its resolved namespace, attributes and children.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Local name, prefix stripped.
    pub name: String,
    /// Namespace URI in scope for this element, if any.
    pub namespace: Option<String>,
    attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    /// Value of the named attribute, if present.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Direct element children, in document order.
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
    }

    /// First direct child matching the namespace and local name.
    pub fn child(&self, namespace: Option<&str>, name: &str) -> Option<&Element> {
        self.child_elements()
            .find(|e| e.name == name && e.namespace.as_deref() == namespace)
    }

    /// Concatenated direct text content.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::Text(text) => Some(text.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }
}

/// A parsed document. Holds exactly one root element.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    root: Element,
}

impl Document {
    pub fn parse(source: &str) -> Result<Document, XmlError> {
        let source = source.trim_start_matches('\u{feff}');
        let mut parser = Parser { src: source, pos: 0 };
        parser.skip_misc()?;
        if parser.pos >= parser.src.len() {
            return Err(XmlError::NoRoot);
        }
        let mut scopes = Vec::new();
        let root = parser.parse_element(&mut scopes)?;
        parser.skip_misc()?;
        if parser.pos != parser.src.len() {
            return Err(XmlError::Malformed(parser.pos));
        }
        Ok(Document { root })
    }

    pub fn root(&self) -> &Element {
        &self.root
    }
}

/// Namespace declarations introduced by one element: prefix (empty for the
/// default namespace) to URI.
type Scope = Vec<(String, String)>;

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn byte(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn starts_with(&self, pattern: &str) -> bool {
        self.src[self.pos..].starts_with(pattern)
    }

    fn expect(&mut self, expected: u8) -> Result<(), XmlError> {
        match self.byte() {
            Some(b) if b == expected => {
                self.pos += 1;
                Ok(())
            }
            Some(_) => Err(XmlError::Malformed(self.pos)),
            None => Err(XmlError::UnexpectedEof),
        }
    }

    fn skip_ws(&mut self) {
        while let Some(b) = self.byte() {
            if !b.is_ascii_whitespace() {
                break;
            }
            self.pos += 1;
        }
    }

    /// Skips whitespace, the prolog, doctype, comments and processing
    /// instructions between markup of interest.
    fn skip_misc(&mut self) -> Result<(), XmlError> {
        loop {
            self.skip_ws();
            if self.starts_with("<?") {
                self.pos += 2;
                self.read_until("?>")?;
            } else if self.starts_with("<!--") {
                self.pos += 4;
                self.read_until("-->")?;
            } else if self.starts_with("<!") {
                self.pos += 2;
                self.read_until(">")?;
            } else {
                return Ok(());
            }
        }
    }

    /// Everything up to `pattern`, consuming the pattern as well.
    fn read_until(&mut self, pattern: &str) -> Result<&'a str, XmlError> {
        match self.src[self.pos..].find(pattern) {
            Some(idx) => {
                let content = &self.src[self.pos..self.pos + idx];
                self.pos += idx + pattern.len();
                Ok(content)
            }
            None => Err(XmlError::UnexpectedEof),
        }
    }

    fn read_name(&mut self) -> Result<String, XmlError> {
        let start = self.pos;
        while let Some(b) = self.byte() {
            if b.is_ascii_whitespace() || matches!(b, b'=' | b'>' | b'/' | b'<') {
                break;
            }
            self.pos += 1;
        }
        if self.pos == start {
            return Err(XmlError::Malformed(self.pos));
        }
        Ok(self.src[start..self.pos].to_string())
    }

    fn read_quoted(&mut self) -> Result<String, XmlError> {
        let quote = match self.byte() {
            Some(b @ (b'"' | b'\'')) => b,
            Some(_) => return Err(XmlError::Malformed(self.pos)),
            None => return Err(XmlError::UnexpectedEof),
        };
        self.pos += 1;
        let start = self.pos;
        match self.src[self.pos..].find(quote as char) {
            Some(idx) => {
                self.pos += idx + 1;
                decode_entities(&self.src[start..start + idx], start)
            }
            None => Err(XmlError::UnexpectedEof),
        }
    }

    fn parse_element(&mut self, scopes: &mut Vec<Scope>) -> Result<Element, XmlError> {
        self.expect(b'<')?;
        let qname = self.read_name()?;
        let mut attributes = Vec::new();
        let mut declarations = Scope::new();

        let empty = loop {
            self.skip_ws();
            match self.byte() {
                Some(b'/') => {
                    self.pos += 1;
                    self.expect(b'>')?;
                    break true;
                }
                Some(b'>') => {
                    self.pos += 1;
                    break false;
                }
                Some(_) => {
                    let name = self.read_name()?;
                    self.skip_ws();
                    self.expect(b'=')?;
                    self.skip_ws();
                    let value = self.read_quoted()?;
                    if name == "xmlns" {
                        declarations.push((String::new(), value));
                    } else if let Some(prefix) = name.strip_prefix("xmlns:") {
                        declarations.push((prefix.to_string(), value));
                    } else {
                        attributes.push((name, value));
                    }
                }
                None => return Err(XmlError::UnexpectedEof),
            }
        };

        scopes.push(declarations);
        let children = if empty {
            Vec::new()
        } else {
            self.parse_children(&qname, scopes)?
        };
        let element = resolve_element(qname, attributes, children, scopes);
        scopes.pop();
        Ok(element)
    }

    fn parse_children(
        &mut self,
        qname: &str,
        scopes: &mut Vec<Scope>,
    ) -> Result<Vec<Node>, XmlError> {
        let mut children = Vec::new();
        loop {
            if self.starts_with("</") {
                self.pos += 2;
                let closing = self.read_name()?;
                self.skip_ws();
                self.expect(b'>')?;
                if closing != qname {
                    return Err(XmlError::MismatchedTag {
                        expected: qname.to_string(),
                        found: closing,
                    });
                }
                return Ok(children);
            } else if self.starts_with("<![CDATA[") {
                self.pos += 9;
                let text = self.read_until("]]>")?;
                children.push(Node::Text(text.to_string()));
            } else if self.starts_with("<!--") {
                self.pos += 4;
                self.read_until("-->")?;
            } else if self.starts_with("<?") {
                self.pos += 2;
                self.read_until("?>")?;
            } else if self.starts_with("<") {
                children.push(Node::Element(self.parse_element(scopes)?));
            } else if self.pos >= self.src.len() {
                return Err(XmlError::UnexpectedEof);
            } else {
                let start = self.pos;
                while let Some(b) = self.byte() {
                    if b == b'<' {
                        break;
                    }
                    self.pos += 1;
                }
                children.push(Node::Text(decode_entities(
                    &self.src[start..self.pos],
                    start,
                )?));
            }
        }
    }
}

/// Splits the qualified name and resolves its prefix against the namespace
/// declarations in scope. An unbound prefix resolves to no namespace.
fn resolve_element(
    qname: String,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
    scopes: &[Scope],
) -> Element {
    let (prefix, local) = match qname.split_once(':') {
        Some((prefix, local)) => (prefix, local),
        None => ("", qname.as_str()),
    };
    let namespace = scopes
        .iter()
        .rev()
        .find_map(|scope| {
            scope
                .iter()
                .rev()
                .find(|(p, _)| p == prefix)
                .map(|(_, uri)| uri.clone())
        })
        .filter(|uri| !uri.is_empty());
    Element {
        name: local.to_string(),
        namespace,
        attributes,
        children,
    }
}

fn decode_entities(raw: &str, offset: usize) -> Result<String, XmlError> {
    if !raw.contains('&') {
        return Ok(raw.to_string());
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(idx) = rest.find('&') {
        out.push_str(&rest[..idx]);
        let tail = &rest[idx + 1..];
        let end = tail.find(';').ok_or(XmlError::Malformed(offset))?;
        match &tail[..end] {
            "amp" => out.push('&'),
            "lt" => out.push('<'),
            "gt" => out.push('>'),
            "quot" => out.push('"'),
            "apos" => out.push('\''),
            reference => {
                let code = if let Some(hex) = reference.strip_prefix("#x") {
                    u32::from_str_radix(hex, 16).ok()
                } else if let Some(dec) = reference.strip_prefix('#') {
                    dec.parse::<u32>().ok()
                } else {
                    None
                };
                match code.and_then(char::from_u32) {
                    Some(ch) => out.push(ch),
                    None => return Err(XmlError::Malformed(offset)),
                }
            }
        }
        rest = &tail[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_elements_and_attributes() {
        let doc = Document::parse(
            r#"<?xml version="1.0" encoding="UTF-8"?>
            <library kind="fiction">
                <book id="1"><title>Dune</title></book>
                <book id="2"/>
            </library>"#,
        )
        .unwrap();

        let root = doc.root();
        assert_eq!(root.name, "library");
        assert_eq!(root.attribute("kind"), Some("fiction"));
        let books: Vec<_> = root.child_elements().collect();
        assert_eq!(books.len(), 2);
        assert_eq!(books[0].attribute("id"), Some("1"));
        assert_eq!(books[1].children.len(), 0);
        assert_eq!(books[0].child(None, "title").unwrap().text(), "Dune");
    }

    #[test]
    fn resolves_default_and_prefixed_namespaces() {
        let doc = Document::parse(
            r#"<root xmlns="urn:default" xmlns:x="urn:other">
                <plain/>
                <x:qualified/>
            </root>"#,
        )
        .unwrap();

        let root = doc.root();
        assert_eq!(root.namespace.as_deref(), Some("urn:default"));
        assert!(root.child(Some("urn:default"), "plain").is_some());
        let qualified = root.child(Some("urn:other"), "qualified").unwrap();
        assert_eq!(qualified.name, "qualified");
        assert!(root.child(Some("urn:default"), "qualified").is_none());
    }

    #[test]
    fn decodes_entities_in_text_and_attributes() {
        let doc = Document::parse(r#"<a note="x &amp; y">1 &lt; 2 &#65;&#x42;</a>"#).unwrap();
        assert_eq!(doc.root().attribute("note"), Some("x & y"));
        assert_eq!(doc.root().text(), "1 < 2 AB");
    }

    #[test]
    fn keeps_cdata_verbatim() {
        let doc = Document::parse("<a><![CDATA[<not & markup>]]></a>").unwrap();
        assert_eq!(doc.root().text(), "<not & markup>");
    }

    #[test]
    fn skips_comments_and_doctype() {
        let doc = Document::parse(
            "<!DOCTYPE a>\n<!-- header --><a><!-- inner -->text</a><!-- trailer -->",
        )
        .unwrap();
        assert_eq!(doc.root().text(), "text");
    }

    #[test]
    fn rejects_mismatched_closing_tag() {
        let err = Document::parse("<a><b></a></b>").unwrap_err();
        assert_eq!(
            err,
            XmlError::MismatchedTag {
                expected: "b".to_string(),
                found: "a".to_string()
            }
        );
    }

    #[test]
    fn rejects_truncated_document() {
        assert_eq!(Document::parse("<a><b>text").unwrap_err(), XmlError::UnexpectedEof);
        assert_eq!(Document::parse("   ").unwrap_err(), XmlError::NoRoot);
    }

    #[test]
    fn rejects_bad_entity() {
        assert!(Document::parse("<a>&bogus;</a>").is_err());
        assert!(Document::parse("<a>&#xzz;</a>").is_err());
    }
}
