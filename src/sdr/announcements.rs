//! Monthly SDR holdings and allocations announcements.

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use scraper::{Html, Selector};

use crate::error::ImfError;
use crate::sdr::{date_column, tsv_rows};
use crate::table::{Column, ColumnValues, Table};

/// Title and header lines ahead of the member rows in the TSV export.
const PREAMBLE_LINES: usize = 4;

/// The latest announcement date sits in the first cell of the second row of
/// the fifth table on the announcements page.
const LATEST_DATE_TABLE: usize = 4;
const LATEST_DATE_ROW: usize = 1;
const LATEST_DATE_FORMAT: &str = "%B %d, %Y";

const HOLDINGS: &str = "holdings";
const ALLOCATIONS: &str = "allocations";

/// `year-month-lastday`, unpadded, as the announcements endpoint expects it.
pub fn format_date(year: i32, month: u32) -> Result<String, ImfError> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| ImfError::InvalidDate(format!("({year}, {month})")))?;
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let last_day = NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|next| next.pred_opt())
        .map(|last| last.day())
        .ok_or_else(|| ImfError::InvalidDate(format!("({year}, {month})")))?;
    Ok(format!("{}-{}-{}", first.year(), first.month(), last_day))
}

/// `(year, month)` of the most recent announcement on the landing page.
pub fn parse_latest_date(html: &str) -> Result<(i32, u32), ImfError> {
    let table_selector = selector("table")?;
    let row_selector = selector("tr")?;
    let cell_selector = selector("td")?;
    let document = Html::parse_document(html);

    let cell = document
        .select(&table_selector)
        .nth(LATEST_DATE_TABLE)
        .and_then(|table| table.select(&row_selector).nth(LATEST_DATE_ROW))
        .and_then(|row| row.select(&cell_selector).next())
        .ok_or_else(|| {
            ImfError::Html("announcements page has no latest date cell".to_string())
        })?;

    let text = cell.text().collect::<String>();
    let date = NaiveDate::parse_from_str(text.trim(), LATEST_DATE_FORMAT)
        .map_err(|err| ImfError::InvalidDate(format!("{:?}: {err}", text.trim())))?;
    Ok((date.year(), date.month()))
}

fn selector(css: &str) -> Result<Selector, ImfError> {
    Selector::parse(css).map_err(|err| ImfError::Html(err.to_string()))
}

/// Melts the member rows into `entity`, `indicator`, `value`: every holdings
/// row first, then every allocations row.
pub fn clean_holdings(tsv: &str) -> Result<Table, ImfError> {
    let non_numeric = Regex::new(r"[^\d.]").map_err(|err| ImfError::Html(err.to_string()))?;
    let rows = tsv_rows(tsv)?
        .into_iter()
        .skip(PREAMBLE_LINES)
        .collect::<Vec<_>>();
    if rows.is_empty() {
        return Err(ImfError::NoData(
            "SDR data not available for this date".to_string(),
        ));
    }

    let amount = |row: &Vec<String>, index: usize| -> Option<f64> {
        row.get(index)
            .map(|cell| non_numeric.replace_all(cell, ""))
            .and_then(|cleaned| cleaned.parse::<f64>().ok())
    };

    let mut entities = Vec::with_capacity(rows.len() * 2);
    let mut indicators = Vec::with_capacity(rows.len() * 2);
    let mut values = Vec::with_capacity(rows.len() * 2);
    for (indicator, index) in [(HOLDINGS, 1), (ALLOCATIONS, 2)] {
        for row in &rows {
            entities.push(row.first().cloned());
            indicators.push(Some(indicator.to_string()));
            values.push(amount(row, index));
        }
    }

    Table::from_columns(vec![
        Column::new("entity", ColumnValues::String(entities)),
        Column::new("indicator", ColumnValues::String(indicators)),
        Column::new("value", ColumnValues::Float(values)),
    ])
}

/// [`clean_holdings`] with the announcement `date` attached to every row.
pub fn holdings_table(tsv: &str, date: &str) -> Result<Table, ImfError> {
    let mut table = clean_holdings(tsv)?;
    let dates = vec![Some(date.to_string()); table.n_rows()];
    table.push_column(date_column("date", &dates))?;
    Ok(table)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::table::Scalar;

    const TSV: &str = "SDR Allocations and Holdings\nfor all members as of February 29, 2024\n(in SDRs)\nMembers\tSDR Holdings\tSDR Allocations\nAfghanistan\t1,234.5\t2,000\nAlbania\t--\t10.25\n";

    #[test]
    fn format_date_uses_last_day_unpadded() {
        assert_eq!(format_date(2024, 2).unwrap(), "2024-2-29");
        assert_eq!(format_date(2023, 2).unwrap(), "2023-2-28");
        assert_eq!(format_date(2024, 12).unwrap(), "2024-12-31");
        assert_matches!(format_date(2024, 13), Err(ImfError::InvalidDate(_)));
    }

    #[test]
    fn melts_holdings_then_allocations() {
        let table = clean_holdings(TSV).unwrap();
        assert_eq!(table.column_names(), vec!["entity", "indicator", "value"]);
        assert_eq!(table.n_rows(), 4);
        assert_eq!(table.cell(0, "entity"), Scalar::String("Afghanistan"));
        assert_eq!(table.cell(0, "indicator"), Scalar::String("holdings"));
        assert_eq!(table.cell(0, "value"), Scalar::Float(1234.5));
        assert!(table.cell(1, "value").is_missing());
        assert_eq!(table.cell(2, "indicator"), Scalar::String("allocations"));
        assert_eq!(table.cell(2, "value"), Scalar::Float(2000.0));
        assert_eq!(table.cell(3, "value"), Scalar::Float(10.25));
    }

    #[test]
    fn header_only_export_has_no_data() {
        let tsv = "SDR Allocations and Holdings\nfor all members\n(in SDRs)\nMembers\tSDR Holdings\tSDR Allocations\n";
        assert_matches!(clean_holdings(tsv), Err(ImfError::NoData(_)));
    }

    #[test]
    fn holdings_table_carries_date() {
        let table = holdings_table(TSV, "2024-2-29").unwrap();
        assert_eq!(
            table.cell(3, "date").as_date(),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
    }

    #[test]
    fn latest_date_from_fifth_table() {
        let page = r#"<html><body>
            <table><tr><td>a</td></tr></table>
            <table><tr><td>b</td></tr></table>
            <table><tr><td>c</td></tr></table>
            <table><tr><td>d</td></tr></table>
            <table>
              <tr><th>Date</th></tr>
              <tr><td>November 30, 2024</td></tr>
            </table>
        </body></html>"#;
        assert_eq!(parse_latest_date(page).unwrap(), (2024, 11));
        assert_matches!(
            parse_latest_date("<table></table>"),
            Err(ImfError::Html(_))
        );
    }
}
