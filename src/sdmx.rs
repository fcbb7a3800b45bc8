//! Flattens an SDMX structure-specific data message into observation rows.
//!
//! The message is `<message:Header/>` followed by `<message:DataSet>`, which
//! holds `<Series>` elements whose attributes are shared by their nested
//! `<Obs>` elements.

use roxmltree::{Document, Node};
use tracing::debug;

use crate::error::ImfError;
use crate::table::Table;

const DATASET_ELEMENT: &str = "DataSet";

/// One observation merged with the attributes of its series. Fields keep
/// document order: series attributes first, then observation attributes,
/// with an observation attribute replacing a series attribute of the same
/// name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservationRow {
    fields: Vec<(String, String)>,
}

impl ObservationRow {
    fn merge(series: &[(String, String)], observation: Node<'_, '_>) -> Self {
        let mut fields = series.to_vec();
        for (name, value) in plain_attributes(observation) {
            match fields.iter_mut().find(|(existing, _)| existing == &name) {
                Some(field) => field.1 = value,
                None => fields.push((name, value)),
            }
        }
        Self { fields }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Walks every series of the data set, yielding one row per observation in
/// document order.
pub fn flatten(data: &str) -> Result<Vec<ObservationRow>, ImfError> {
    let document = Document::parse(data)
        .map_err(|err| ImfError::MalformedArchive(format!("unreadable data file: {err}")))?;

    let dataset = document
        .root_element()
        .children()
        .find(|node| node.is_element() && node.tag_name().name() == DATASET_ELEMENT)
        .ok_or_else(|| {
            ImfError::MalformedArchive("data file has no DataSet section".to_string())
        })?;

    let mut rows = Vec::new();
    for series in dataset.children().filter(Node::is_element) {
        let series_fields = plain_attributes(series);
        for observation in series.children().filter(Node::is_element) {
            rows.push(ObservationRow::merge(&series_fields, observation));
        }
    }

    debug!(rows = rows.len(), "XML parsed successfully");
    Ok(rows)
}

pub fn rows_to_table(rows: &[ObservationRow]) -> Table {
    Table::from_records(rows.iter().map(ObservationRow::fields))
}

// Namespaced attributes (xsi:type and friends) are message plumbing, not data.
fn plain_attributes(node: Node<'_, '_>) -> Vec<(String, String)> {
    node.attributes()
        .filter(|attribute| attribute.namespace().is_none())
        .map(|attribute| (attribute.name().to_string(), attribute.value().to_string()))
        .collect()
}
