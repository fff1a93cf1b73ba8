//! Estimate XML reader.
//!
//! Streams the document with `quick-xml` and emits the flat node sequence the
//! engine aggregates: one `Chapter` node per captioned chapter and one
//! `Position` node per captioned position, in document order.

use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use smeta_engine::{DocumentNode, PositionNode, PriceBlock};

use crate::error::ReadError;

const CHAPTER: &[u8] = b"Chapter";
const POSITION: &[u8] = b"Position";
const PRICE_BASE: &[u8] = b"PriceBase";
const QUANTITY: &[u8] = b"Quantity";

/// Read and parse an estimate file.
pub fn read_document(path: &Path) -> Result<Vec<DocumentNode>, ReadError> {
    let bytes = std::fs::read(path).map_err(|source| ReadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let text = decode(&bytes)?;
    parse_document(&text)
}

/// Decode raw file bytes to UTF-8, honouring the XML declaration.
///
/// Undeclared files that are not valid UTF-8 are read as Windows-1251, the
/// usual encoding of estimate exports.
pub fn decode(bytes: &[u8]) -> Result<String, ReadError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    match declared_encoding(bytes) {
        None => match String::from_utf8(bytes.to_vec()) {
            Ok(s) => Ok(s),
            Err(e) => {
                let bytes = e.into_bytes();
                let (decoded, _, _) = encoding_rs::WINDOWS_1251.decode(&bytes);
                Ok(decoded.into_owned())
            }
        },
        Some(label) => {
            let encoding = encoding_rs::Encoding::for_label(label.trim().as_bytes())
                .ok_or_else(|| ReadError::Encoding(format!("unknown encoding '{label}'")))?;
            let (decoded, _, had_errors) = encoding.decode(bytes);
            if had_errors {
                return Err(ReadError::Encoding(format!(
                    "document is not valid {}",
                    encoding.name()
                )));
            }
            Ok(decoded.into_owned())
        }
    }
}

/// `encoding="..."` from the XML declaration, if present.
fn declared_encoding(bytes: &[u8]) -> Option<String> {
    let head = &bytes[..bytes.len().min(256)];
    let head = String::from_utf8_lossy(head);
    let decl_end = head.find("?>")?;
    let decl = &head[..decl_end];
    if !decl.trim_start().starts_with("<?xml") {
        return None;
    }
    let start = decl.find("encoding")? + "encoding".len();
    let rest = decl[start..].trim_start().strip_prefix('=')?.trim_start();
    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let value = &rest[1..];
    let end = value.find(quote)?;
    Some(value[..end].to_string())
}

/// A position whose subtree is still being read.
struct OpenPosition {
    node: PositionNode,
    /// Elements opened inside the position and not yet closed.
    depth: usize,
}

/// Parse estimate XML already decoded to a string.
pub fn parse_document(xml: &str) -> Result<Vec<DocumentNode>, ReadError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut nodes = Vec::new();
    let mut open: Option<OpenPosition> = None;
    let mut depth: usize = 0;
    let mut seen_root = false;

    loop {
        let event = match reader.read_event_into(&mut buf) {
            Ok(event) => event,
            Err(e) => {
                return Err(ReadError::Xml {
                    offset: reader.buffer_position(),
                    message: e.to_string(),
                })
            }
        };

        match event {
            Event::Start(ref e) => {
                depth += 1;
                seen_root = true;
                if let Some(pos) = open.as_mut() {
                    pos.depth += 1;
                    read_position_child(e, &mut pos.node);
                } else if let Some(node) = start_node(e) {
                    match node {
                        DocumentNode::Position(node) => open = Some(OpenPosition { node, depth: 0 }),
                        chapter => nodes.push(chapter),
                    }
                }
            }
            Event::Empty(ref e) => {
                seen_root = true;
                if let Some(pos) = open.as_mut() {
                    read_position_child(e, &mut pos.node);
                } else if let Some(node) = start_node(e) {
                    nodes.push(node);
                }
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                let closes_position = matches!(open.as_ref(), Some(pos) if pos.depth == 0);
                if closes_position {
                    if let Some(done) = open.take() {
                        nodes.push(DocumentNode::Position(done.node));
                    }
                } else if let Some(pos) = open.as_mut() {
                    pos.depth -= 1;
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if depth != 0 || open.is_some() {
        return Err(ReadError::Xml {
            offset: reader.buffer_position(),
            message: "unexpected end of document (unclosed element)".into(),
        });
    }
    if !seen_root {
        return Err(ReadError::Xml {
            offset: 0,
            message: "document has no root element".into(),
        });
    }

    Ok(nodes)
}

/// Node for an element met outside any position, if it is one we emit.
fn start_node(e: &BytesStart<'_>) -> Option<DocumentNode> {
    match e.name().as_ref() {
        CHAPTER => {
            let caption = attr(e, b"Caption").filter(|c| !c.is_empty())?;
            Some(DocumentNode::Chapter { caption })
        }
        POSITION => {
            let caption = attr(e, b"Caption")?;
            Some(DocumentNode::Position(PositionNode {
                caption,
                code: attr(e, b"Code").unwrap_or_default(),
                units: attr(e, b"Units").unwrap_or_default(),
                price: None,
                quantity: None,
            }))
        }
        _ => None,
    }
}

/// The first `PriceBase` and `Quantity` below a position win.
fn read_position_child(e: &BytesStart<'_>, node: &mut PositionNode) {
    match e.name().as_ref() {
        PRICE_BASE if node.price.is_none() => {
            let mut block = PriceBlock::default();
            for attr in e.attributes().flatten() {
                let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
                block.set(&key, attr_text(&attr.value));
            }
            node.price = Some(block);
        }
        QUANTITY if node.quantity.is_none() => {
            node.quantity = attr(e, b"Result");
        }
        _ => {}
    }
}

fn attr(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name)
        .map(|a| attr_text(&a.value))
}

fn attr_text(raw: &[u8]) -> String {
    let raw = String::from_utf8_lossy(raw);
    match quick_xml::escape::unescape(&raw) {
        Ok(text) => text.into_owned(),
        Err(_) => raw.into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positions(nodes: &[DocumentNode]) -> Vec<&PositionNode> {
        nodes
            .iter()
            .filter_map(|n| match n {
                DocumentNode::Position(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn reads_chapters_and_positions_in_order() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<Document>
  <Chapters>
    <Chapter Caption="Земляные работы">
      <Position Caption="Разработка грунта" Code="ФЕР01-01-003-02" Units="1000 м3">
        <Quantity Result="0,25" Fx="0.25"/>
        <Prices>
          <PriceBase PZ="10,5" OZ="1" EM="2" ZM="0" MT="3"/>
          <PriceBase PZ="999"/>
        </Prices>
      </Position>
      <Position Caption="Песок" Code="ФССЦ-408-0122" Units="м3">
        <PriceBase PZ="512,3"/>
      </Position>
    </Chapter>
    <Chapter Caption="Кровля"/>
  </Chapters>
</Document>"#;
        let nodes = parse_document(xml).unwrap();
        assert_eq!(nodes.len(), 4);
        assert_eq!(nodes[0], DocumentNode::Chapter { caption: "Земляные работы".into() });
        let ps = positions(&nodes);
        assert_eq!(ps[0].code, "ФЕР01-01-003-02");
        assert_eq!(ps[0].units, "1000 м3");
        assert_eq!(ps[0].quantity.as_deref(), Some("0,25"));
        let price = ps[0].price.as_ref().unwrap();
        assert_eq!(price.pz.as_deref(), Some("10,5"));
        assert_eq!(price.mt.as_deref(), Some("3"));
        assert_eq!(ps[1].price.as_ref().unwrap().pz.as_deref(), Some("512,3"));
        assert_eq!(nodes[3], DocumentNode::Chapter { caption: "Кровля".into() });
    }

    #[test]
    fn uncaptioned_elements_are_transparent() {
        let xml = r#"<Root>
  <Chapter><Position Caption="a" Code="ФЕР1"/></Chapter>
  <Chapter Caption="">x</Chapter>
  <Position Code="ФЕР2"/>
</Root>"#;
        let nodes = parse_document(xml).unwrap();
        assert_eq!(nodes.len(), 1);
        assert!(matches!(&nodes[0], DocumentNode::Position(p) if p.code == "ФЕР1" && p.price.is_none()));
    }

    #[test]
    fn nested_positions_are_not_emitted_twice() {
        let xml = r#"<Root><Chapter Caption="A">
  <Position Caption="outer" Code="ФЕР1">
    <Position Caption="inner" Code="ФССЦ1"><PriceBase PZ="5"/></Position>
  </Position>
</Chapter></Root>"#;
        let nodes = parse_document(xml).unwrap();
        let ps = positions(&nodes);
        assert_eq!(ps.len(), 1);
        assert_eq!(ps[0].caption, "outer");
        // descendant search still finds the block
        assert_eq!(ps[0].price.as_ref().unwrap().pz.as_deref(), Some("5"));
    }

    #[test]
    fn attribute_entities_are_unescaped() {
        let xml = r#"<Root><Chapter Caption="Окна &amp; двери"/></Root>"#;
        let nodes = parse_document(xml).unwrap();
        assert_eq!(nodes[0], DocumentNode::Chapter { caption: "Окна & двери".into() });
    }

    #[test]
    fn malformed_documents_fail() {
        assert!(matches!(
            parse_document("<Root><Chapter Caption=\"A\"></Root>"),
            Err(ReadError::Xml { .. })
        ));
        assert!(matches!(
            parse_document("<Root><Chapter Caption=\"A\">"),
            Err(ReadError::Xml { .. })
        ));
        assert!(matches!(parse_document(""), Err(ReadError::Xml { .. })));
    }

    #[test]
    fn decodes_windows_1251() {
        let (bytes, _, _) = encoding_rs::WINDOWS_1251
            .encode("<?xml version=\"1.0\" encoding=\"windows-1251\"?><Root><Chapter Caption=\"Раздел\"/></Root>");
        let text = decode(&bytes).unwrap();
        let nodes = parse_document(&text).unwrap();
        assert_eq!(nodes[0], DocumentNode::Chapter { caption: "Раздел".into() });
    }

    #[test]
    fn undeclared_non_utf8_falls_back_to_cp1251() {
        let (bytes, _, _) = encoding_rs::WINDOWS_1251.encode("<Root><Chapter Caption=\"Смета\"/></Root>");
        assert!(decode(&bytes).unwrap().contains("Смета"));
    }

    #[test]
    fn unknown_declared_encoding_fails() {
        let xml = b"<?xml version=\"1.0\" encoding=\"x-klingon\"?><Root/>";
        assert!(matches!(decode(xml), Err(ReadError::Encoding(_))));
    }

    #[test]
    fn declaration_parsing() {
        assert_eq!(
            declared_encoding(b"<?xml version='1.0' encoding='cp1251'?><a/>").as_deref(),
            Some("cp1251")
        );
        assert_eq!(declared_encoding(b"<?xml version=\"1.0\"?><a/>"), None);
        assert_eq!(declared_encoding(b"<a/>"), None);
    }
}
