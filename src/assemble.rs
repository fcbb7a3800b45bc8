use tracing::debug;

use crate::archive::Archive;
use crate::error::ImfError;
use crate::schema::{SchemaIndex, parse_schema};
use crate::sdmx;
use crate::table::{Column, ColumnValues, NumericKind, Table};

pub const DATA_EXTENSION: &str = ".xml";
pub const SCHEMA_EXTENSION: &str = ".xsd";

/// Entry names of the data and schema files inside a checked archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveFiles {
    pub data: String,
    pub schema: String,
}

/// Requires exactly one data file and exactly one schema file.
pub fn check_archive<A: Archive + ?Sized>(archive: &A) -> Result<ArchiveFiles, ImfError> {
    let data = single_entry(archive, DATA_EXTENSION, "xml")?;
    let schema = single_entry(archive, SCHEMA_EXTENSION, "xsd")?;
    debug!("Zip folder check passed");
    Ok(ArchiveFiles { data, schema })
}

fn single_entry<A: Archive + ?Sized>(
    archive: &A,
    extension: &str,
    kind: &str,
) -> Result<String, ImfError> {
    let mut names = archive.entries_with_extension(extension);
    if names.len() != 1 {
        return Err(ImfError::UnexpectedFile(format!(
            "there should be exactly one {kind} file in the folder, found {}",
            names.len()
        )));
    }
    Ok(names.remove(0))
}

/// Turns an archive into a labelled, typed table.
///
/// `labels` pairs a code column with the schema classification that labels
/// it; each code column is renamed `{column}_CODE` in place and a
/// `{column}_LABEL` column is appended after all existing columns. Columns in
/// `numeric` are then coerced, with unparseable cells becoming missing.
pub fn assemble<A: Archive>(
    mut archive: A,
    labels: &[(&str, &str)],
    numeric: &[(&str, NumericKind)],
) -> Result<Table, ImfError> {
    let files = check_archive(&archive)?;
    let data = archive.read_entry_to_string(&files.data)?;
    let schema = archive.read_entry_to_string(&files.schema)?;

    let rows = sdmx::flatten(&data)?;
    let mut table = sdmx::rows_to_table(&rows);

    let schema = parse_schema(&schema)?;
    let mut label_columns = Vec::with_capacity(labels.len());
    for (column, classification) in labels {
        let index = SchemaIndex::from_document(&schema, classification);
        let codes = table.strings(column).map_err(missing_is_malformed)?;
        let values = codes
            .iter()
            .map(|code| {
                code.as_deref()
                    .and_then(|code| index.label(code))
                    .map(str::to_string)
            })
            .collect();
        label_columns.push(Column::new(
            format!("{column}_LABEL"),
            ColumnValues::String(values),
        ));
        table.rename_column(column, &format!("{column}_CODE"))?;
    }
    for column in label_columns {
        table.push_column(column)?;
    }
    debug!(".xsd schema parsed and columns added successfully");

    for (column, kind) in numeric {
        table
            .coerce_numeric(column, *kind)
            .map_err(missing_is_malformed)?;
    }

    debug!("Data successfully parsed");
    Ok(table)
}

fn missing_is_malformed(err: ImfError) -> ImfError {
    match err {
        ImfError::MissingColumn(column) => {
            ImfError::MalformedArchive(format!("data file has no {column} column"))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::archive::MemoryArchive;

    #[test]
    fn check_archive_counts_each_extension() {
        let cases: &[(&[&str], bool)] = &[
            (&["file1.xml", "file1.xsd"], true),
            (&["file1.xml", "file2.xml", "file1.xsd"], false),
            (&["file1.xsd"], false),
            (&["file1.xml", "file1.xsd", "file2.xsd"], false),
            (&["file1.xml"], false),
            (&[], false),
        ];
        for (names, ok) in cases {
            let archive = names
                .iter()
                .fold(MemoryArchive::new(), |archive, name| archive.with_entry(*name, ""));
            let result = check_archive(&archive);
            if *ok {
                assert_eq!(
                    result.unwrap(),
                    ArchiveFiles {
                        data: "file1.xml".to_string(),
                        schema: "file1.xsd".to_string()
                    }
                );
            } else {
                assert_matches!(result, Err(ImfError::UnexpectedFile(_)), "{names:?}");
            }
        }
    }

    #[test]
    fn other_files_are_ignored() {
        let archive = MemoryArchive::new()
            .with_entry("readme.txt", "")
            .with_entry("data.xml", "")
            .with_entry("data.xsd", "");
        assert!(check_archive(&archive).is_ok());
    }
}
