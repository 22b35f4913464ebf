// Excel workbook import (xlsx, xls, xlsb, ods)
//
// One-way conversion into engine tables. Cell values come through as
// calamine extracts them; date/time cells arrive as serial numbers.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};

use tallysheet_engine::table::Table;
use tallysheet_engine::value::Value;

use crate::ImportError;

/// Import the first worksheet.
pub fn import(path: &Path) -> Result<Table, ImportError> {
    import_sheet(path, None)
}

/// Import a worksheet by name, or the first one if `sheet` is None.
pub fn import_sheet(path: &Path, sheet: Option<&str>) -> Result<Table, ImportError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| ImportError::Io(e.to_string()))?;

    let name = match sheet {
        Some(name) => name.to_string(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or(ImportError::EmptySheet)?,
    };

    let range = workbook.worksheet_range(&name).map_err(|e| {
        if sheet.is_some() {
            ImportError::SheetNotFound(name.clone())
        } else {
            ImportError::Io(e.to_string())
        }
    })?;

    let mut rows_iter = range.rows();
    let header_row = rows_iter.next().ok_or(ImportError::EmptySheet)?;

    let mut headers: Vec<String> = Vec::with_capacity(header_row.len());
    for (col_idx, cell) in header_row.iter().enumerate() {
        let label = header_label(cell);
        let label = if label.is_empty() {
            format!("column_{col_idx}")
        } else {
            label
        };
        if headers.contains(&label) {
            return Err(ImportError::DuplicateHeader(label));
        }
        headers.push(label);
    }

    let mut rows: Vec<Vec<Value>> = Vec::new();
    for record in rows_iter {
        let mut row: Vec<Value> = record.iter().map(cell_to_value).collect();
        row.resize(headers.len(), Value::Null);
        row.truncate(headers.len());
        if row.iter().all(Value::is_null) {
            continue;
        }
        rows.push(row);
    }

    Ok(Table::from_rows(headers, rows))
}

fn header_label(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Empty => String::new(),
        other => other.to_string().trim().to_string(),
    }
}

fn cell_to_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                Value::Null
            } else {
                Value::Text(s.to_string())
            }
        }
        Data::Float(f) => Value::Number(*f),
        Data::Int(i) => Value::Number(*i as f64),
        Data::Bool(b) => Value::Bool(*b),
        // Dates and times as Excel serials
        Data::DateTime(dt) => Value::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::Text(s.clone()),
        Data::Error(_) => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells_map_to_typed_values() {
        assert_eq!(cell_to_value(&Data::Empty), Value::Null);
        assert_eq!(cell_to_value(&Data::Float(2.5)), Value::Number(2.5));
        assert_eq!(cell_to_value(&Data::Int(7)), Value::Number(7.0));
        assert_eq!(cell_to_value(&Data::Bool(true)), Value::Bool(true));
        assert_eq!(
            cell_to_value(&Data::String("  tyre ".into())),
            Value::Text("tyre".into())
        );
        assert_eq!(cell_to_value(&Data::String("   ".into())), Value::Null);
    }

    #[test]
    fn header_labels_fall_back_to_display() {
        assert_eq!(header_label(&Data::String(" name ".into())), "name");
        assert_eq!(header_label(&Data::Empty), "");
        assert_eq!(header_label(&Data::Float(3.0)), "3");
    }
}
