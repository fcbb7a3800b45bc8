//! Weekly SDR interest rate history.

use tracing::debug;

use crate::error::ImfError;
use crate::sdr::{date_column, tsv_rows};
use crate::table::{Column, ColumnValues, Table, parse_float};

pub const EFFECTIVE_FROM_COLUMN: &str = "Effective from";
pub const EFFECTIVE_TO_COLUMN: &str = "Effective to";

const RATE_LABEL: &str = "SDR Interest Rate";
const SKIPPED_LABELS: &[&str] = &["Total", "Floor for SDR Interest Rate"];

/// Builds `interest_rate`, `effective_from`, `effective_to`. Each
/// "SDR Interest Rate" row is paired by position with the distinct period
/// rows of the export.
pub fn parse_interest_rates(tsv: &str) -> Result<Table, ImfError> {
    let rows = tsv_rows(tsv)?;
    let header = rows
        .iter()
        .position(|row| row.iter().any(|cell| cell == EFFECTIVE_FROM_COLUMN))
        .ok_or_else(|| ImfError::MissingColumn(EFFECTIVE_FROM_COLUMN.to_string()))?;
    let column_index = |name: &str| {
        rows[header]
            .iter()
            .position(|cell| cell == name)
            .ok_or_else(|| ImfError::MissingColumn(name.to_string()))
    };
    let from_cell = column_index(EFFECTIVE_FROM_COLUMN)?;
    let to_cell = column_index(EFFECTIVE_TO_COLUMN)?;

    let periods = rows[header + 1..]
        .iter()
        .filter_map(|row| Some((row.get(from_cell)?.as_str(), row.get(to_cell)?.as_str())))
        .filter(|(from, _)| !SKIPPED_LABELS.contains(from))
        .collect::<Vec<_>>();

    let mut rates = Vec::new();
    let mut dates: Vec<(&str, &str)> = Vec::new();
    for (from, to) in periods {
        if from == RATE_LABEL {
            rates.push(parse_float(to));
        } else if !dates.contains(&(from, to)) {
            dates.push((from, to));
        }
    }
    debug!(rates = rates.len(), periods = dates.len(), "parsed SDR interest rates");

    let (from, to): (Vec<_>, Vec<_>) = (0..rates.len())
        .map(|index| match dates.get(index) {
            Some((from, to)) => (Some(from.to_string()), Some(to.to_string())),
            None => (None, None),
        })
        .unzip();

    Table::from_columns(vec![
        Column::new("interest_rate", ColumnValues::Float(rates)),
        date_column("effective_from", &from),
        date_column("effective_to", &to),
    ])
}
