//! Root element access without building the scene.

use super::dialect::{UB_NAMESPACE, UB_NAMESPACES};
use super::tokens::{Token, TokenStream};
use super::{PersistError, PersistResult};
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{QName, ResolveResult};
use quick_xml::{NsReader, Writer};
use uuid::Uuid;

const UUID_ATTRIBUTE: &str = "uuid";

/// Page uuid declared on the root element.
///
/// Only the root start tag is read. A malformed uuid yields `None`.
pub fn read_scene_uuid(bytes: Vec<u8>) -> PersistResult<Option<Uuid>> {
    let mut tokens = TokenStream::new(bytes);
    loop {
        match tokens.next_token()? {
            Token::StartElement { attributes, .. } => {
                let Some(text) = attributes.get_any(&UB_NAMESPACES, UUID_ATTRIBUTE) else {
                    return Ok(None);
                };
                return Ok(match Uuid::parse_str(text.trim()) {
                    Ok(uuid) => Some(uuid),
                    Err(e) => {
                        log::warn!("Ignoring malformed page uuid `{}`: {}", text, e);
                        None
                    }
                });
            }
            Token::EndDocument => return Ok(None),
            _ => {}
        }
    }
}

/// Copy of `bytes` whose root element declares `uuid`.
///
/// Every event besides the root start tag is copied unchanged.
pub fn rewrite_scene_uuid(bytes: &[u8], uuid: Uuid) -> PersistResult<Vec<u8>> {
    let mut reader = NsReader::from_reader(bytes);
    let mut writer = Writer::new(Vec::with_capacity(bytes.len() + 64));
    let mut buf = Vec::new();
    let mut root_done = false;

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| PersistError::MalformedDocument(e.to_string()))?;
        let event = match event {
            Event::Eof => break,
            Event::Start(start) if !root_done => {
                root_done = true;
                Event::Start(with_uuid(&reader, &start, uuid)?)
            }
            Event::Empty(start) if !root_done => {
                root_done = true;
                Event::Empty(with_uuid(&reader, &start, uuid)?)
            }
            other => other,
        };
        writer
            .write_event(event)
            .map_err(|e| PersistError::Write(e.to_string()))?;
        buf.clear();
    }

    if !root_done {
        return Err(PersistError::MalformedDocument("no root element".to_string()));
    }
    Ok(writer.into_inner())
}

fn with_uuid<R>(reader: &NsReader<R>, start: &BytesStart<'_>, uuid: Uuid) -> PersistResult<BytesStart<'static>> {
    let value = uuid.braced().to_string();
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut rebuilt = BytesStart::new(name);
    let mut replaced = false;
    // Prefixes declared on the root, and the one bound to a ub namespace.
    let mut declared = Vec::new();
    let mut ub_prefix = None;

    for attr in start.attributes() {
        let attr = attr.map_err(|e| PersistError::MalformedDocument(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let raw = String::from_utf8_lossy(&attr.value).into_owned();
        if let Some(prefix) = key.strip_prefix("xmlns:") {
            if UB_NAMESPACES.contains(&raw.as_str()) {
                ub_prefix.get_or_insert_with(|| prefix.to_string());
            }
            declared.push(prefix.to_string());
        }

        let (namespace, local) = reader.resolve_attribute(attr.key);
        let is_ub = matches!(namespace, ResolveResult::Bound(ns)
            if UB_NAMESPACES.iter().any(|ub| ub.as_bytes() == ns.as_ref()));
        if is_ub && local.as_ref() == UUID_ATTRIBUTE.as_bytes() {
            rebuilt.push_attribute((key.as_str(), value.as_str()));
            replaced = true;
        } else {
            // Raw value: it is already escaped.
            rebuilt.push_attribute(Attribute {
                key: QName(key.as_bytes()),
                value: raw.as_bytes().into(),
            });
        }
    }

    if !replaced {
        let prefix = match ub_prefix {
            Some(prefix) => prefix,
            None => {
                let prefix = free_prefix(&declared);
                rebuilt.push_attribute((format!("xmlns:{}", prefix).as_str(), UB_NAMESPACE));
                prefix
            }
        };
        rebuilt.push_attribute((format!("{}:{}", prefix, UUID_ATTRIBUTE).as_str(), value.as_str()));
    }
    Ok(rebuilt)
}

/// `ub`, or `ub1`, `ub2`... when the root already uses that prefix.
fn free_prefix(declared: &[String]) -> String {
    let mut prefix = "ub".to_string();
    let mut n = 0;
    while declared.contains(&prefix) {
        n += 1;
        prefix = format!("ub{}", n);
    }
    prefix
}
