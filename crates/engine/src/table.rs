//! Owned tabular data: ordered typed columns, ordered rows.
//!
//! A `Table` is the unit everything else operates on: the canonical
//! table loaded from the store, the materialized view handed out for
//! editing, and the edited view coming back. Row order is meaningful
//! and preserved by every operation here.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::IntegrityError;
use crate::value::{ColumnKind, Key, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Column {
        Column { name: name.into(), kind }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Table {
        Table { columns, rows: Vec::new() }
    }

    /// Build a table from header names and rows, inferring each column's
    /// kind from the values it actually holds.
    pub fn from_rows(names: Vec<String>, rows: Vec<Vec<Value>>) -> Table {
        let columns = names
            .into_iter()
            .enumerate()
            .map(|(idx, name)| {
                let kind = ColumnKind::infer(rows.iter().filter_map(|row| row.get(idx)));
                Column { name, kind }
            })
            .collect();
        Table { columns, rows }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn kind_of(&self, name: &str) -> Option<ColumnKind> {
        self.column_index(name).map(|idx| self.columns[idx].kind)
    }

    pub fn cell(&self, row: usize, col: usize) -> &Value {
        &self.rows[row][col]
    }

    /// Cell by column name. None if the column does not exist.
    pub fn value(&self, row: usize, name: &str) -> Option<&Value> {
        self.column_index(name).map(|idx| &self.rows[row][idx])
    }

    pub fn set_value(&mut self, row: usize, name: &str, value: Value) -> bool {
        match self.column_index(name) {
            Some(idx) => {
                self.rows[row][idx] = value;
                true
            }
            None => false,
        }
    }

    /// Append a row. The row must match the column count.
    pub fn push_row(&mut self, row: Vec<Value>) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }

    /// Copy the given rows (by index, in the given order) into a new
    /// standalone table with the same columns.
    pub fn subset(&self, indices: &[usize]) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }

    /// Distinct non-null values of a column with their occurrence
    /// counts, in first-seen order. None if the column does not exist.
    pub fn value_counts(&self, name: &str) -> Option<Vec<(String, usize)>> {
        let idx = self.column_index(name)?;
        let mut order: Vec<(String, usize)> = Vec::new();
        let mut seen: FxHashMap<String, usize> = FxHashMap::default();
        for row in &self.rows {
            let value = &row[idx];
            if value.is_null() {
                continue;
            }
            let display = value.to_string();
            match seen.get(&display) {
                Some(&slot) => order[slot].1 += 1,
                None => {
                    seen.insert(display.clone(), order.len());
                    order.push((display, 1));
                }
            }
        }
        Some(order)
    }

    /// Verify the identifier-column invariant: present, non-null, and
    /// unique across all rows.
    pub fn check_identifier(&self, id_column: &str) -> Result<(), IntegrityError> {
        let idx = self
            .column_index(id_column)
            .ok_or_else(|| IntegrityError::MissingColumn { column: id_column.to_string() })?;
        let kind = self.columns[idx].kind;
        let mut seen = FxHashMap::default();
        for (row, values) in self.rows.iter().enumerate() {
            let value = &values[idx];
            if value.is_null() {
                return Err(IntegrityError::NullIdentifier {
                    column: id_column.to_string(),
                    row,
                });
            }
            if seen.insert(Key::for_kind(value, kind), row).is_some() {
                return Err(IntegrityError::DuplicateIdentifier {
                    column: id_column.to_string(),
                    value: value.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Drop the named columns where present; unknown names are ignored.
    pub fn drop_columns(&mut self, names: &[String]) {
        let keep: Vec<usize> = (0..self.columns.len())
            .filter(|&i| !names.iter().any(|n| *n == self.columns[i].name))
            .collect();
        if keep.len() == self.columns.len() {
            return;
        }
        self.columns = keep.iter().map(|&i| self.columns[i].clone()).collect();
        for row in &mut self.rows {
            *row = keep.iter().map(|&i| row[i].clone()).collect();
        }
    }

    /// Insert a sequential numeric identifier column at position 0.
    /// The caller ensures the name is not already taken.
    pub fn insert_identifier(&mut self, name: &str) {
        self.columns.insert(0, Column::new(name, ColumnKind::Numeric));
        for (i, row) in self.rows.iter_mut().enumerate() {
            row.insert(0, Value::Number(i as f64));
        }
    }

    /// Append a boolean column with a uniform default.
    /// The caller ensures the name is not already taken.
    pub fn append_bool_column(&mut self, name: &str, default: bool) {
        self.columns.push(Column::new(name, ColumnKind::Boolean));
        for row in &mut self.rows {
            row.push(Value::Bool(default));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fruit_table() -> Table {
        Table::from_rows(
            vec!["fruit".into(), "qty".into()],
            vec![
                vec![Value::Text("apple".into()), Value::Number(3.0)],
                vec![Value::Text("pear".into()), Value::Number(1.0)],
                vec![Value::Text("apple".into()), Value::Number(2.0)],
                vec![Value::Null, Value::Number(5.0)],
            ],
        )
    }

    #[test]
    fn from_rows_infers_kinds() {
        let table = fruit_table();
        assert_eq!(table.kind_of("fruit"), Some(ColumnKind::Textual));
        assert_eq!(table.kind_of("qty"), Some(ColumnKind::Numeric));
    }

    #[test]
    fn value_counts_preserve_first_seen_order_and_skip_nulls() {
        let table = fruit_table();
        let counts = table.value_counts("fruit").unwrap();
        assert_eq!(counts, vec![("apple".to_string(), 2), ("pear".to_string(), 1)]);
        assert!(table.value_counts("missing").is_none());
    }

    #[test]
    fn subset_copies_rows_in_order() {
        let table = fruit_table();
        let sub = table.subset(&[2, 0]);
        assert_eq!(sub.row_count(), 2);
        assert_eq!(sub.value(0, "qty"), Some(&Value::Number(2.0)));
        assert_eq!(sub.value(1, "qty"), Some(&Value::Number(3.0)));
    }

    #[test]
    fn check_identifier_rejects_duplicates() {
        let table = Table::from_rows(
            vec!["id".into()],
            vec![
                vec![Value::Number(1.0)],
                vec![Value::Number(2.0)],
                vec![Value::Number(1.0)],
            ],
        );
        let err = table.check_identifier("id").unwrap_err();
        assert_eq!(
            err,
            IntegrityError::DuplicateIdentifier { column: "id".into(), value: "1".into() }
        );
    }

    #[test]
    fn check_identifier_rejects_nulls_and_missing_column() {
        let table = Table::from_rows(
            vec!["id".into()],
            vec![vec![Value::Number(1.0)], vec![Value::Null]],
        );
        assert_eq!(
            table.check_identifier("id").unwrap_err(),
            IntegrityError::NullIdentifier { column: "id".into(), row: 1 }
        );
        assert_eq!(
            table.check_identifier("nope").unwrap_err(),
            IntegrityError::MissingColumn { column: "nope".into() }
        );
    }

    #[test]
    fn check_identifier_normalizes_text_and_number() {
        // "2" as text collides with 2 as a number on a numeric column
        let table = Table::from_rows(
            vec!["id".into()],
            vec![vec![Value::Number(2.0)], vec![Value::Number(3.0)]],
        );
        assert!(table.check_identifier("id").is_ok());
    }

    #[test]
    fn import_mutators() {
        let mut table = fruit_table();
        table.drop_columns(&["qty".to_string(), "absent".to_string()]);
        assert_eq!(table.columns().len(), 1);

        table.insert_identifier("record_id");
        table.append_bool_column("checked", false);
        assert_eq!(table.columns()[0].name, "record_id");
        assert_eq!(table.value(2, "record_id"), Some(&Value::Number(2.0)));
        assert_eq!(table.value(0, "checked"), Some(&Value::Bool(false)));
        assert_eq!(table.kind_of("checked"), Some(ColumnKind::Boolean));
    }
}
