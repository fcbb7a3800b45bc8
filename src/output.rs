use std::io::{self, Write};

use serde::Serialize;

use crate::domain::Version;
use crate::table::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
}

/// Row-oriented JSON view of a table: one object per row, keyed by column.
#[derive(Serialize)]
struct JsonTable<'a> {
    columns: Vec<&'a str>,
    rows: Vec<serde_json::Map<String, serde_json::Value>>,
}

pub struct TableOutput;

impl TableOutput {
    pub fn print(table: &Table, format: OutputFormat) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        Self::write(&mut stdout, table, format)
    }

    pub fn write<W: Write>(out: &mut W, table: &Table, format: OutputFormat) -> io::Result<()> {
        match format {
            OutputFormat::Json => Self::write_json(out, table),
            OutputFormat::Csv => Self::write_csv(out, table),
        }
    }

    pub fn print_versions(versions: &[Version]) -> io::Result<()> {
        let labels = versions.iter().map(ToString::to_string).collect::<Vec<_>>();
        Self::print_json(&labels)
    }

    pub fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }

    fn write_json<W: Write>(out: &mut W, table: &Table) -> io::Result<()> {
        let rows = (0..table.n_rows())
            .map(|index| {
                table
                    .columns()
                    .iter()
                    .map(|column| (column.name().to_string(), json_cell(column.get(index))))
                    .collect()
            })
            .collect();
        let view = JsonTable {
            columns: table.column_names(),
            rows,
        };
        let json = serde_json::to_string_pretty(&view).map_err(io::Error::other)?;
        out.write_all(json.as_bytes())?;
        out.write_all(b"\n")
    }

    fn write_csv<W: Write>(out: &mut W, table: &Table) -> io::Result<()> {
        let mut writer = csv::Writer::from_writer(out);
        writer.write_record(table.column_names())?;
        for index in 0..table.n_rows() {
            writer.write_record(table.row(index).iter().map(ToString::to_string))?;
        }
        writer.flush()
    }
}

fn json_cell(cell: crate::table::Scalar<'_>) -> serde_json::Value {
    use crate::table::Scalar;
    match cell {
        Scalar::String(value) => serde_json::Value::from(value),
        Scalar::Integer(value) => serde_json::Value::from(value),
        Scalar::Float(value) => serde_json::Value::from(value),
        Scalar::Date(value) => serde_json::Value::from(value.format("%Y-%m-%d").to_string()),
        Scalar::Missing => serde_json::Value::Null,
    }
}
