//! SDR valuation: the daily value of the SDR against the US dollar.

use tracing::debug;

use crate::error::ImfError;
use crate::sdr::{UnitBasis, date_column, tsv_rows};
use crate::table::{Column, ColumnValues, Table, parse_float};

pub const REPORT_DATE_COLUMN: &str = "Report date";

/// Currency rows carry at least this many cells; summary rows carry fewer.
const MIN_CURRENCY_ROW_CELLS: usize = 4;
const VALUE_CELL: usize = 1;
const DATE_CELL: usize = 0;

/// Builds `date`, `exchange_rate` from the valuation export. Dates come from
/// the currency rows and rates from the rows labelled for `basis`; the two are
/// paired by position.
pub fn parse_exchange_rates(tsv: &str, basis: UnitBasis) -> Result<Table, ImfError> {
    let rows = tsv_rows(tsv)?;
    let header = rows
        .iter()
        .position(|row| row.iter().any(|cell| cell == REPORT_DATE_COLUMN))
        .ok_or_else(|| ImfError::MissingColumn(REPORT_DATE_COLUMN.to_string()))?;
    let label_cell = rows[header]
        .iter()
        .position(|cell| cell == REPORT_DATE_COLUMN)
        .unwrap_or(DATE_CELL);
    let data = &rows[header + 1..];

    let mut rates = data
        .iter()
        .filter(|row| row.get(label_cell).map(String::as_str) == Some(basis.row_label()))
        .map(|row| row.get(VALUE_CELL).and_then(|cell| parse_float(cell)))
        .collect::<Vec<_>>();

    let mut dates: Vec<Option<String>> = Vec::new();
    for row in data.iter().filter(|row| row.len() >= MIN_CURRENCY_ROW_CELLS) {
        let date = row.get(DATE_CELL).cloned();
        if !dates.contains(&date) {
            dates.push(date);
        }
    }
    debug!(rates = rates.len(), dates = dates.len(), "parsed SDR valuation");

    let n_rows = rates.len().max(dates.len());
    dates.resize(n_rows, None);
    rates.resize(n_rows, None);

    Table::from_columns(vec![
        date_column("date", &dates),
        Column::new("exchange_rate", ColumnValues::Float(rates)),
    ])
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::NaiveDate;

    use super::*;
    use crate::table::Scalar;

    const TSV: &str = "SDR Valuations\n\
Report date\tCurrency\tCurrency amount\tExchange rate\tU.S. dollar equivalent\n\
31-Oct-2024\tChinese yuan\t1.0174\t7.1214\t0.142864\n\
31-Oct-2024\tEuro\t0.37379\t1.0852\t0.405637\n\
U.S.$1.00 = SDR\t0.752186\n\
SDR1 = US$\t1.329460\n\
30-Oct-2024\tChinese yuan\t1.0174\t7.1239\t0.142814\n\
U.S.$1.00 = SDR\t0.752570\n\
SDR1 = US$\t1.328780\n";

    #[test]
    fn pairs_dates_with_sdr_rates() {
        let table = parse_exchange_rates(TSV, UnitBasis::Sdr).unwrap();
        assert_eq!(table.column_names(), vec!["date", "exchange_rate"]);
        assert_eq!(table.n_rows(), 2);
        assert_eq!(
            table.cell(0, "date").as_date(),
            NaiveDate::from_ymd_opt(2024, 10, 31)
        );
        assert_eq!(table.cell(0, "exchange_rate"), Scalar::Float(1.32946));
        assert_eq!(table.cell(1, "exchange_rate"), Scalar::Float(1.32878));
    }

    #[test]
    fn usd_basis_reads_inverse_rows() {
        let table = parse_exchange_rates(TSV, UnitBasis::Usd).unwrap();
        assert_eq!(table.cell(1, "exchange_rate"), Scalar::Float(0.75257));
    }

    #[test]
    fn report_date_header_is_required() {
        assert_matches!(
            parse_exchange_rates("Date\tCurrency\n", UnitBasis::Sdr),
            Err(ImfError::MissingColumn(column)) if column == REPORT_DATE_COLUMN
        );
    }
}
