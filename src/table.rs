//! A small columnar table: ordered, named, typed columns with missing values.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ImfError;

/// Placeholders the agency uses in numeric cells for "no value".
const MISSING_MARKERS: &[&str] = &["n/a", "--", "NULL", ""];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    String,
    Integer,
    Float,
    Date,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericKind {
    Integer,
    Float,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "values", rename_all = "lowercase")]
pub enum ColumnValues {
    String(Vec<Option<String>>),
    Integer(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
    Date(Vec<Option<NaiveDate>>),
}

impl ColumnValues {
    pub fn len(&self) -> usize {
        match self {
            ColumnValues::String(values) => values.len(),
            ColumnValues::Integer(values) => values.len(),
            ColumnValues::Float(values) => values.len(),
            ColumnValues::Date(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn scalar_type(&self) -> ScalarType {
        match self {
            ColumnValues::String(_) => ScalarType::String,
            ColumnValues::Integer(_) => ScalarType::Integer,
            ColumnValues::Float(_) => ScalarType::Float,
            ColumnValues::Date(_) => ScalarType::Date,
        }
    }

    pub fn get(&self, index: usize) -> Scalar<'_> {
        let value = match self {
            ColumnValues::String(values) => values
                .get(index)
                .and_then(|value| value.as_deref())
                .map(Scalar::String),
            ColumnValues::Integer(values) => {
                values.get(index).copied().flatten().map(Scalar::Integer)
            }
            ColumnValues::Float(values) => values.get(index).copied().flatten().map(Scalar::Float),
            ColumnValues::Date(values) => values.get(index).copied().flatten().map(Scalar::Date),
        };
        value.unwrap_or(Scalar::Missing)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar<'a> {
    String(&'a str),
    Integer(i64),
    Float(f64),
    Date(NaiveDate),
    Missing,
}

impl Scalar<'_> {
    pub fn is_missing(&self) -> bool {
        matches!(self, Scalar::Missing)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Float(value) => Some(*value),
            Scalar::Integer(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Scalar::Date(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::String(value) => write!(f, "{value}"),
            Scalar::Integer(value) => write!(f, "{value}"),
            Scalar::Float(value) => write!(f, "{value}"),
            Scalar::Date(value) => write!(f, "{}", value.format("%Y-%m-%d")),
            Scalar::Missing => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    name: String,
    values: ColumnValues,
}

impl Column {
    pub fn new(name: impl Into<String>, values: ColumnValues) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &ColumnValues {
        &self.values
    }

    pub fn scalar_type(&self) -> ScalarType {
        self.values.scalar_type()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Scalar<'_> {
        self.values.get(index)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_columns(columns: Vec<Column>) -> Result<Self, ImfError> {
        let mut table = Self::new();
        for column in columns {
            table.push_column(column)?;
        }
        Ok(table)
    }

    /// Builds string columns from ordered `(name, value)` records. Columns are
    /// the union of all names in first-seen order; absent names are missing.
    pub fn from_records<'a, I, R>(records: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut names: Vec<String> = Vec::new();
        let mut values: Vec<Vec<Option<String>>> = Vec::new();
        let mut n_rows = 0usize;

        for record in records {
            for (name, value) in record {
                let index = match names.iter().position(|existing| existing == name) {
                    Some(index) => index,
                    None => {
                        names.push(name.to_string());
                        values.push(vec![None; n_rows]);
                        names.len() - 1
                    }
                };
                let column = &mut values[index];
                column.resize(n_rows + 1, None);
                column[n_rows] = Some(value.to_string());
            }
            n_rows += 1;
            for column in &mut values {
                column.resize(n_rows, None);
            }
        }

        Self {
            columns: names
                .into_iter()
                .zip(values)
                .map(|(name, values)| Column::new(name, ColumnValues::String(values)))
                .collect(),
        }
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows() == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    fn column_mut(&mut self, name: &str) -> Result<&mut Column, ImfError> {
        self.columns
            .iter_mut()
            .find(|column| column.name == name)
            .ok_or_else(|| ImfError::MissingColumn(name.to_string()))
    }

    pub fn push_column(&mut self, column: Column) -> Result<(), ImfError> {
        if self.column(&column.name).is_some() {
            return Err(ImfError::TableShape(format!(
                "duplicate column {}",
                column.name
            )));
        }
        if !self.columns.is_empty() && column.len() != self.n_rows() {
            return Err(ImfError::TableShape(format!(
                "column {} has {} rows, table has {}",
                column.name,
                column.len(),
                self.n_rows()
            )));
        }
        self.columns.push(column);
        Ok(())
    }

    pub fn rename_column(&mut self, from: &str, to: &str) -> Result<(), ImfError> {
        if from != to && self.column(to).is_some() {
            return Err(ImfError::TableShape(format!("duplicate column {to}")));
        }
        self.column_mut(from)?.name = to.to_string();
        Ok(())
    }

    pub fn strings(&self, name: &str) -> Result<&[Option<String>], ImfError> {
        let column = self
            .column(name)
            .ok_or_else(|| ImfError::MissingColumn(name.to_string()))?;
        match &column.values {
            ColumnValues::String(values) => Ok(values),
            other => Err(ImfError::TableShape(format!(
                "column {name} holds {:?} values, expected strings",
                other.scalar_type()
            ))),
        }
    }

    /// Converts a column to a numeric type. Cells that do not parse become
    /// missing; this never fails on cell content.
    pub fn coerce_numeric(&mut self, name: &str, kind: NumericKind) -> Result<(), ImfError> {
        let column = self.column_mut(name)?;
        let values = match (&column.values, kind) {
            (ColumnValues::String(values), NumericKind::Integer) => ColumnValues::Integer(
                values
                    .iter()
                    .map(|value| value.as_deref().and_then(parse_integer))
                    .collect(),
            ),
            (ColumnValues::String(values), NumericKind::Float) => ColumnValues::Float(
                values
                    .iter()
                    .map(|value| value.as_deref().and_then(parse_float))
                    .collect(),
            ),
            (ColumnValues::Integer(values), NumericKind::Float) => ColumnValues::Float(
                values.iter().map(|value| value.map(|v| v as f64)).collect(),
            ),
            (ColumnValues::Float(values), NumericKind::Integer) => ColumnValues::Integer(
                values.iter().map(|value| value.and_then(float_to_integer)).collect(),
            ),
            (ColumnValues::Integer(_), NumericKind::Integer)
            | (ColumnValues::Float(_), NumericKind::Float) => return Ok(()),
            (ColumnValues::Date(_), _) => {
                return Err(ImfError::TableShape(format!(
                    "date column {name} cannot be made numeric"
                )));
            }
        };
        column.values = values;
        Ok(())
    }

    pub fn cell(&self, row: usize, column: &str) -> Scalar<'_> {
        self.column(column)
            .map(|column| column.get(row))
            .unwrap_or(Scalar::Missing)
    }

    pub fn row(&self, index: usize) -> Vec<Scalar<'_>> {
        self.columns.iter().map(|column| column.get(index)).collect()
    }
}

/// Parses a published number, tolerating thousands separators and the
/// agency's placeholders.
pub fn parse_float(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if MISSING_MARKERS.contains(&trimmed) {
        return None;
    }
    let cleaned = trimmed.replace(',', "");
    cleaned.parse::<f64>().ok().filter(|value| value.is_finite())
}

pub fn parse_integer(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if MISSING_MARKERS.contains(&trimmed) {
        return None;
    }
    let cleaned = trimmed.replace(',', "");
    cleaned
        .parse::<i64>()
        .ok()
        .or_else(|| parse_float(&cleaned).and_then(float_to_integer))
}

fn float_to_integer(value: f64) -> Option<i64> {
    if value.fract() == 0.0 && value >= i64::MIN as f64 && value <= i64::MAX as f64 {
        Some(value as i64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn strings(values: &[Option<&str>]) -> ColumnValues {
        ColumnValues::String(values.iter().map(|v| v.map(str::to_string)).collect())
    }

    #[test]
    fn records_union_columns_in_first_seen_order() {
        let first = vec![("UNIT", "B"), ("TIME_PERIOD", "1980")];
        let second = vec![("UNIT", "B"), ("NOTES", "estimate")];
        let table = Table::from_records(vec![first, second]);

        assert_eq!(table.column_names(), vec!["UNIT", "TIME_PERIOD", "NOTES"]);
        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.cell(0, "NOTES"), Scalar::Missing);
        assert_eq!(table.cell(1, "NOTES"), Scalar::String("estimate"));
        assert_eq!(table.cell(1, "TIME_PERIOD"), Scalar::Missing);
    }

    #[test]
    fn numeric_coercion_tolerates_placeholders() {
        let mut table = Table::from_columns(vec![
            Column::new(
                "OBS_VALUE",
                strings(&[Some("1,234"), Some("--"), Some("n/a"), Some("abc"), None, Some(" 2.5 ")]),
            ),
            Column::new(
                "TIME_PERIOD",
                strings(&[Some("1980"), Some("NULL"), Some(""), Some("1,981"), None, Some("1.5")]),
            ),
        ])
        .unwrap();

        table.coerce_numeric("OBS_VALUE", NumericKind::Float).unwrap();
        table.coerce_numeric("TIME_PERIOD", NumericKind::Integer).unwrap();

        let obs = table.column("OBS_VALUE").unwrap();
        assert_eq!(obs.scalar_type(), ScalarType::Float);
        assert_eq!(obs.get(0), Scalar::Float(1234.0));
        assert!(obs.get(1).is_missing());
        assert!(obs.get(2).is_missing());
        assert!(obs.get(3).is_missing());
        assert!(obs.get(4).is_missing());
        assert_eq!(obs.get(5), Scalar::Float(2.5));

        let period = table.column("TIME_PERIOD").unwrap();
        assert_eq!(period.get(0), Scalar::Integer(1980));
        assert!(period.get(1).is_missing());
        assert!(period.get(2).is_missing());
        assert_eq!(period.get(3), Scalar::Integer(1981));
        assert!(period.get(5).is_missing());
    }

    #[test]
    fn coercing_a_missing_column_is_an_error() {
        let mut table = Table::new();
        assert_matches!(
            table.coerce_numeric("OBS_VALUE", NumericKind::Float),
            Err(ImfError::MissingColumn(_))
        );
    }

    #[test]
    fn push_column_checks_length_and_names() {
        let mut table =
            Table::from_columns(vec![Column::new("A", strings(&[Some("1"), Some("2")]))]).unwrap();
        assert_matches!(
            table.push_column(Column::new("B", strings(&[Some("1")]))),
            Err(ImfError::TableShape(_))
        );
        assert_matches!(
            table.push_column(Column::new("A", strings(&[Some("1"), Some("2")]))),
            Err(ImfError::TableShape(_))
        );
        assert_matches!(table.rename_column("Z", "Y"), Err(ImfError::MissingColumn(_)));
    }

    #[test]
    fn table_serializes_with_typed_columns() {
        let table = Table::from_columns(vec![Column::new(
            "value",
            ColumnValues::Float(vec![Some(1.5), None]),
        )])
        .unwrap();
        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json["columns"][0]["values"]["type"], "float");
        let back: Table = serde_json::from_value(json).unwrap();
        assert_eq!(back, table);
    }
}
