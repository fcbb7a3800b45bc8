//! Code lists declared in an SDMX `.xsd` schema.
//!
//! Each classification is an `xs:simpleType` whose restriction enumerates the
//! codes, with the human readable label in the enumeration's
//! `xs:annotation/xs:documentation`.

use std::collections::HashMap;

use roxmltree::{Document, Node};

use crate::error::ImfError;

pub const XML_SCHEMA_NS: &str = "http://www.w3.org/2001/XMLSchema";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaIndex {
    classification: String,
    labels: HashMap<String, String>,
}

impl SchemaIndex {
    /// Parses `schema` and indexes the named classification.
    pub fn build(schema: &str, classification: &str) -> Result<Self, ImfError> {
        let document = parse_schema(schema)?;
        Ok(Self::from_document(&document, classification))
    }

    /// An unknown classification yields an empty index.
    pub fn from_document(document: &Document<'_>, classification: &str) -> Self {
        let mut labels = HashMap::new();
        let simple_types = document
            .root_element()
            .children()
            .filter(|node| is_schema_element(node, "simpleType"))
            .filter(|node| node.attribute("name") == Some(classification));

        for simple_type in simple_types {
            for facet in simple_type.children().filter(Node::is_element) {
                for enumeration in facet.children().filter(Node::is_element) {
                    let Some(code) = enumeration.attribute("value") else {
                        continue;
                    };
                    if let Some(label) = enumeration_label(&enumeration) {
                        labels.insert(code.to_string(), label);
                    }
                }
            }
        }

        Self {
            classification: classification.to_string(),
            labels,
        }
    }

    pub fn classification(&self) -> &str {
        &self.classification
    }

    pub fn label(&self, code: &str) -> Option<&str> {
        self.labels.get(code).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

pub fn parse_schema(schema: &str) -> Result<Document<'_>, ImfError> {
    Document::parse(schema)
        .map_err(|err| ImfError::MalformedArchive(format!("unreadable schema: {err}")))
}

fn is_schema_element(node: &Node<'_, '_>, name: &str) -> bool {
    node.is_element()
        && node.tag_name().name() == name
        && node.tag_name().namespace() == Some(XML_SCHEMA_NS)
}

// annotation -> documentation -> text
fn enumeration_label(enumeration: &Node<'_, '_>) -> Option<String> {
    let annotation = enumeration.children().find(Node::is_element)?;
    let documentation = annotation.children().find(Node::is_element)?;
    documentation.text().map(|text| text.trim().to_string())
}
