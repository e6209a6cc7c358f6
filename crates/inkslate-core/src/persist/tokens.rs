//! Namespace-resolved token stream over page markup.

use super::{PersistError, PersistResult};
use quick_xml::NsReader;
use quick_xml::events::Event;
use quick_xml::name::ResolveResult;
use std::io::Cursor;

/// One attribute with its resolved namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlAttribute {
    pub namespace: Option<String>,
    pub name: String,
    pub value: String,
}

/// Attributes of one start element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes(Vec<XmlAttribute>);

impl Attributes {
    pub fn new(attributes: Vec<XmlAttribute>) -> Self {
        Self(attributes)
    }

    /// Unprefixed attribute.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.find(|attr| attr.namespace.is_none() && attr.name == name)
    }

    pub fn get_ns(&self, namespace: &str, name: &str) -> Option<&str> {
        self.find(|attr| attr.namespace.as_deref() == Some(namespace) && attr.name == name)
    }

    /// Attribute in any of `namespaces`.
    pub fn get_any(&self, namespaces: &[&str], name: &str) -> Option<&str> {
        self.find(|attr| {
            attr.name == name && attr.namespace.as_deref().is_some_and(|ns| namespaces.contains(&ns))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &XmlAttribute> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn find(&self, predicate: impl Fn(&XmlAttribute) -> bool) -> Option<&str> {
        self.0.iter().find(|attr| predicate(attr)).map(|attr| attr.value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    StartElement {
        namespace: Option<String>,
        name: String,
        attributes: Attributes,
    },
    EndElement {
        namespace: Option<String>,
        name: String,
    },
    /// Text or CDATA content. Whitespace-only text is dropped.
    Characters(String),
    EndDocument,
}

/// Pulls [`Token`]s one at a time from a page buffer.
///
/// Empty elements are reported as a start followed by an end. Any
/// well-formedness error, including elements left open at the end of input,
/// is a [`PersistError::MalformedDocument`].
pub struct TokenStream {
    reader: NsReader<Cursor<Vec<u8>>>,
    buf: Vec<u8>,
    depth: usize,
    finished: bool,
}

impl TokenStream {
    pub fn new(bytes: Vec<u8>) -> Self {
        let mut reader = NsReader::from_reader(Cursor::new(bytes));
        let config = reader.config_mut();
        config.expand_empty_elements = true;
        config.check_end_names = true;
        Self {
            reader,
            buf: Vec::new(),
            depth: 0,
            finished: false,
        }
    }

    /// Current element nesting depth.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn next_token(&mut self) -> PersistResult<Token> {
        if self.finished {
            return Ok(Token::EndDocument);
        }

        loop {
            self.buf.clear();
            let event = match self.reader.read_event_into(&mut self.buf) {
                Ok(event) => event,
                Err(e) => {
                    return Err(PersistError::MalformedDocument(format!(
                        "{} at byte {}",
                        e,
                        self.reader.error_position()
                    )));
                }
            };

            match event {
                Event::Start(e) => {
                    let (resolved, local) = self.reader.resolve_element(e.name());
                    let namespace = namespace_of(resolved);
                    let name = String::from_utf8_lossy(local.as_ref()).into_owned();

                    let mut attributes = Vec::new();
                    for attr in e.attributes() {
                        let attr = attr.map_err(|e| PersistError::MalformedDocument(e.to_string()))?;
                        let key = attr.key.as_ref();
                        if key == b"xmlns" || key.starts_with(b"xmlns:") {
                            continue;
                        }
                        let (resolved, local) = self.reader.resolve_attribute(attr.key);
                        let value = attr
                            .unescape_value()
                            .map_err(|e| PersistError::MalformedDocument(e.to_string()))?
                            .into_owned();
                        attributes.push(XmlAttribute {
                            namespace: namespace_of(resolved),
                            name: String::from_utf8_lossy(local.as_ref()).into_owned(),
                            value,
                        });
                    }

                    self.depth += 1;
                    return Ok(Token::StartElement {
                        namespace,
                        name,
                        attributes: Attributes::new(attributes),
                    });
                }
                Event::End(e) => {
                    let (resolved, local) = self.reader.resolve_element(e.name());
                    self.depth = self.depth.saturating_sub(1);
                    return Ok(Token::EndElement {
                        namespace: namespace_of(resolved),
                        name: String::from_utf8_lossy(local.as_ref()).into_owned(),
                    });
                }
                Event::Text(text) => {
                    let text = text
                        .unescape()
                        .map_err(|e| PersistError::MalformedDocument(e.to_string()))?;
                    if !text.trim().is_empty() {
                        return Ok(Token::Characters(text.into_owned()));
                    }
                }
                Event::CData(data) => {
                    let text = std::str::from_utf8(&data)
                        .map_err(|e| PersistError::MalformedDocument(e.to_string()))?;
                    if !text.is_empty() {
                        return Ok(Token::Characters(text.to_string()));
                    }
                }
                Event::Eof => {
                    if self.depth > 0 {
                        return Err(PersistError::MalformedDocument(format!(
                            "unexpected end of document with {} unclosed element(s)",
                            self.depth
                        )));
                    }
                    self.finished = true;
                    return Ok(Token::EndDocument);
                }
                _ => {}
            }
        }
    }
}

fn namespace_of(resolved: ResolveResult) -> Option<String> {
    match resolved {
        ResolveResult::Bound(namespace) => Some(String::from_utf8_lossy(namespace.as_ref()).into_owned()),
        ResolveResult::Unbound | ResolveResult::Unknown(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::dialect::{SVG_NAMESPACE, UB_NAMESPACE};

    fn collect(markup: &str) -> PersistResult<Vec<Token>> {
        let mut stream = TokenStream::new(markup.as_bytes().to_vec());
        let mut tokens = Vec::new();
        loop {
            let token = stream.next_token()?;
            let done = token == Token::EndDocument;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    #[test]
    fn test_namespaces_resolved() {
        let tokens = collect(&format!(
            r#"<?xml version="1.0"?><svg xmlns="{}" xmlns:ub="{}" ub:uuid="x" width="3"><ub:ruler/></svg>"#,
            SVG_NAMESPACE, UB_NAMESPACE
        ))
        .unwrap();

        let Token::StartElement { namespace, name, attributes } = &tokens[0] else {
            panic!("expected start element");
        };
        assert_eq!(namespace.as_deref(), Some(SVG_NAMESPACE));
        assert_eq!(name, "svg");
        assert_eq!(attributes.get_ns(UB_NAMESPACE, "uuid"), Some("x"));
        assert_eq!(attributes.get("width"), Some("3"));
        assert_eq!(attributes.get("uuid"), None);
        assert_eq!(attributes.iter().count(), 2);

        assert!(matches!(&tokens[1], Token::StartElement { name, .. } if name == "ruler"));
        assert!(matches!(&tokens[2], Token::EndElement { name, .. } if name == "ruler"));
        assert!(matches!(&tokens[3], Token::EndElement { name, .. } if name == "svg"));
        assert_eq!(tokens[4], Token::EndDocument);
    }

    #[test]
    fn test_text_and_cdata() {
        let tokens = collect("<a>\n  <b>x &amp; y</b><c><![CDATA[<p>hi</p>]]></c>\n</a>").unwrap();
        let texts: Vec<&str> = tokens
            .iter()
            .filter_map(|t| match t {
                Token::Characters(text) => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["x & y", "<p>hi</p>"]);
    }

    #[test]
    fn test_unclosed_element_is_malformed() {
        assert!(matches!(collect("<svg><g>"), Err(PersistError::MalformedDocument(_))));
        assert!(matches!(collect("<svg><g></svg>"), Err(PersistError::MalformedDocument(_))));
    }
}
