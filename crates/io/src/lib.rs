//! File ingestion: spreadsheet and CSV sources into engine tables.
//!
//! The engine imposes no file format of its own; this crate turns the
//! formats people actually have (CSV/TSV exports, Excel workbooks) into
//! typed tables, and prepares them for the store: drop configured
//! columns, inject a sequential identifier, append the check-off
//! attribute.

use std::fmt;
use std::path::Path;

use tallysheet_engine::table::Table;

pub mod csv;
pub mod xlsx;

#[derive(Debug, Clone, PartialEq)]
pub enum ImportError {
    Io(String),
    /// File extension is not one of the supported formats.
    UnknownFormat(String),
    /// Named worksheet does not exist in the workbook.
    SheetNotFound(String),
    /// No header row to build columns from.
    EmptySheet,
    /// The same header appears twice.
    DuplicateHeader(String),
    /// Import preparation would overwrite an existing column.
    ColumnExists(String),
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "IO error: {msg}"),
            Self::UnknownFormat(ext) => write!(f, "unsupported file format: '{ext}'"),
            Self::SheetNotFound(name) => write!(f, "worksheet '{name}' not found"),
            Self::EmptySheet => write!(f, "no rows to import"),
            Self::DuplicateHeader(name) => write!(f, "duplicate header '{name}'"),
            Self::ColumnExists(name) => write!(f, "column '{name}' already exists"),
        }
    }
}

impl std::error::Error for ImportError {}

/// Import a tabular file by extension: CSV/TSV or an Excel workbook.
pub fn import(path: &Path) -> Result<Table, ImportError> {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "csv" | "txt" => csv::import(path),
        "tsv" => csv::import_tsv(path),
        "xlsx" | "xls" | "xlsb" | "ods" => xlsx::import(path),
        other => Err(ImportError::UnknownFormat(other.to_string())),
    }
}

/// How to turn a raw imported table into a canonical one.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Columns to drop before anything else; unknown names are ignored.
    pub drop_columns: Vec<String>,
    /// Name of the sequential identifier column injected at position 0.
    pub id_column: String,
    /// Name of the boolean check-off column appended last, all false.
    pub attr_column: String,
}

/// Prepare an imported table for the store.
pub fn prepare(mut table: Table, options: &ImportOptions) -> Result<Table, ImportError> {
    table.drop_columns(&options.drop_columns);
    for name in [&options.id_column, &options.attr_column] {
        if table.column_index(name).is_some() {
            return Err(ImportError::ColumnExists(name.clone()));
        }
    }
    table.insert_identifier(&options.id_column);
    table.append_bool_column(&options.attr_column, false);
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tallysheet_engine::value::{ColumnKind, Value};

    fn raw() -> Table {
        Table::from_rows(
            vec!["name".into(), "district".into(), "precinct".into()],
            vec![
                vec![
                    Value::Text("amal".into()),
                    Value::Text("d1".into()),
                    Value::Text("p7".into()),
                ],
                vec![
                    Value::Text("rami".into()),
                    Value::Text("d2".into()),
                    Value::Text("p9".into()),
                ],
            ],
        )
    }

    #[test]
    fn prepare_drops_injects_and_appends() {
        let options = ImportOptions {
            drop_columns: vec!["precinct".into(), "absent".into()],
            id_column: "record_id".into(),
            attr_column: "checked".into(),
        };
        let table = prepare(raw(), &options).unwrap();
        let names: Vec<&str> = table.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["record_id", "name", "district", "checked"]);
        assert_eq!(table.value(1, "record_id"), Some(&Value::Number(1.0)));
        assert_eq!(table.value(1, "checked"), Some(&Value::Bool(false)));
        assert_eq!(table.kind_of("record_id"), Some(ColumnKind::Numeric));
    }

    #[test]
    fn prepare_refuses_to_overwrite_columns() {
        let options = ImportOptions {
            drop_columns: vec![],
            id_column: "name".into(),
            attr_column: "checked".into(),
        };
        assert_eq!(
            prepare(raw(), &options).unwrap_err(),
            ImportError::ColumnExists("name".into())
        );
    }

    #[test]
    fn import_rejects_unknown_extensions() {
        assert!(matches!(
            import(Path::new("records.parquet")),
            Err(ImportError::UnknownFormat(_))
        ));
    }
}
