//! Extraction of build ids from Brew task results.
//!
//! A task result is an XML-RPC response; the interesting part looks like:
//!
//! ```text
//! <member>
//!   <name>koji_builds</name>
//!   <value><array><data>
//!     <value><string>55</string></value>
//!   </data></array></value>
//! </member>
//! ```
//!
//! The document is parsed into a small element tree first, so a truncated or
//! unbalanced payload is rejected instead of half-read. Texts are kept
//! verbatim: `<name>` must equal `koji_builds` exactly, and `<string>` values
//! are returned untrimmed.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

pub const KOJI_BUILDS: &str = "koji_builds";

#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    #[error("xml syntax error at byte {position}: {source}")]
    Syntax {
        position: usize,
        #[source]
        source: quick_xml::Error,
    },

    #[error("unclosed element <{0}>")]
    Unclosed(String),

    #[error("document has no root element")]
    NoRoot,

    #[error("document has more than one root element")]
    MultipleRoots,

    #[error("text outside the root element")]
    StrayText,
}

#[derive(Debug, Default)]
struct Element {
    name: String,
    text: String,
    children: Vec<usize>,
}

/// Elements in document order; index 0 is the root.
#[derive(Debug)]
struct Tree {
    elements: Vec<Element>,
}

fn open(
    elements: &mut Vec<Element>,
    stack: &[usize],
    roots: &mut usize,
    start: &BytesStart<'_>,
) -> Result<usize, XmlError> {
    let index = elements.len();
    elements.push(Element {
        name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
        ..Element::default()
    });
    match stack.last() {
        Some(parent) => elements[*parent].children.push(index),
        None => {
            *roots += 1;
            if *roots > 1 {
                return Err(XmlError::MultipleRoots);
            }
        }
    }
    Ok(index)
}

impl Tree {
    fn parse(xml: &str) -> Result<Self, XmlError> {
        let mut reader = Reader::from_str(xml);

        let mut elements: Vec<Element> = Vec::new();
        let mut stack: Vec<usize> = Vec::new();
        let mut roots = 0usize;

        loop {
            let event = reader.read_event().map_err(|source| XmlError::Syntax {
                position: reader.buffer_position(),
                source,
            })?;
            match event {
                Event::Start(start) => {
                    let index = open(&mut elements, &stack, &mut roots, &start)?;
                    stack.push(index);
                }
                Event::Empty(start) => {
                    open(&mut elements, &stack, &mut roots, &start)?;
                }
                Event::End(_) => {
                    stack.pop();
                }
                Event::Text(text) => {
                    let text = text.unescape().map_err(|source| XmlError::Syntax {
                        position: reader.buffer_position(),
                        source,
                    })?;
                    match stack.last() {
                        Some(current) => elements[*current].text.push_str(&text),
                        None if text.trim().is_empty() => {}
                        None => return Err(XmlError::StrayText),
                    }
                }
                Event::CData(data) => {
                    if let Some(current) = stack.last() {
                        elements[*current]
                            .text
                            .push_str(&String::from_utf8_lossy(&data.into_inner()));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(unclosed) = stack.last() {
            return Err(XmlError::Unclosed(elements[*unclosed].name.clone()));
        }
        if elements.is_empty() {
            return Err(XmlError::NoRoot);
        }
        Ok(Self { elements })
    }

    fn descendants(&self, index: usize, out: &mut Vec<usize>) {
        for child in &self.elements[index].children {
            out.push(*child);
            self.descendants(*child, out);
        }
    }

    /// First element in document order with a child `<name>` whose text is `key`.
    fn member(&self, key: &str) -> Option<usize> {
        (0..self.elements.len()).find(|index| {
            self.elements[*index].children.iter().any(|child| {
                let child = &self.elements[*child];
                child.name == "name" && child.text == key
            })
        })
    }
}

/// Text of every `<string>` under the `koji_builds` member, in document
/// order. Empty strings are kept; an absent member yields an empty list.
pub fn koji_builds(xml: &str) -> Result<Vec<String>, XmlError> {
    let tree = Tree::parse(xml)?;
    let Some(member) = tree.member(KOJI_BUILDS) else {
        return Ok(Vec::new());
    };
    let mut below = Vec::new();
    tree.descendants(member, &mut below);
    Ok(below
        .into_iter()
        .map(|index| &tree.elements[index])
        .filter(|element| element.name == "string")
        .map(|element| element.text.clone())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULT: &str = r#"<?xml version='1.0'?>
<methodResponse>
<params><param><value><struct>
  <member><name>repositories</name><value><array><data>
    <value><string>registry/pkg:1.0</string></value>
  </data></array></value></member>
  <member><name>koji_builds</name><value><array><data>
    <value><string>55</string></value>
  </data></array></value></member>
</struct></value></param></params>
</methodResponse>"#;

    #[test]
    fn test_finds_koji_builds_member() {
        assert_eq!(koji_builds(RESULT).unwrap(), vec!["55"]);
    }

    #[test]
    fn test_missing_member_is_empty() {
        let xml = "<methodResponse><params><param><value><struct>\
                   <member><name>repositories</name><value><string>x</string></value></member>\
                   </struct></value></param></params></methodResponse>";
        assert!(koji_builds(xml).unwrap().is_empty());
    }

    #[test]
    fn test_empty_list_and_empty_string() {
        let empty_list = "<struct><member><name>koji_builds</name>\
                          <value><array><data/></array></value></member></struct>";
        assert!(koji_builds(empty_list).unwrap().is_empty());

        let empty_string = "<struct><member><name>koji_builds</name>\
                            <value><array><data><value><string/></value></data></array></value>\
                            </member></struct>";
        assert_eq!(koji_builds(empty_string).unwrap(), vec![""]);
    }

    #[test]
    fn test_texts_are_matched_and_returned_verbatim() {
        let padded_value = "<struct><member><name>koji_builds</name><value><array><data>\
                            <value><string> 55 </string></value>\
                            </data></array></value></member></struct>";
        assert_eq!(koji_builds(padded_value).unwrap(), vec![" 55 "]);

        let padded_name = "<struct><member><name> koji_builds </name><value><array><data>\
                           <value><string>55</string></value>\
                           </data></array></value></member></struct>";
        assert!(koji_builds(padded_name).unwrap().is_empty());
    }

    #[test]
    fn test_multiple_builds_keep_document_order() {
        let xml = "<struct><member><name>koji_builds</name><value><array><data>\
                   <value><string>55</string></value><value><string>56</string></value>\
                   </data></array></value></member></struct>";
        assert_eq!(koji_builds(xml).unwrap(), vec!["55", "56"]);
    }

    #[test]
    fn test_malformed_documents_are_errors() {
        assert!(matches!(koji_builds(""), Err(XmlError::NoRoot)));
        assert!(matches!(koji_builds("<a><b></b>"), Err(XmlError::Unclosed(name)) if name == "a"));
        assert!(matches!(koji_builds("<a/><b/>"), Err(XmlError::MultipleRoots)));
        assert!(matches!(koji_builds("oops"), Err(XmlError::StrayText)));
        assert!(koji_builds("<a><b></a>").is_err());
    }
}
