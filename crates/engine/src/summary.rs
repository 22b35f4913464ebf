//! Grouped counts over a table, and the check-off tally.

use rustc_hash::FxHashMap;

use crate::error::IntegrityError;
use crate::table::{Column, Table};
use crate::value::{ColumnKind, Value};

/// Group rows by one or more columns and count occurrences per group.
///
/// Output columns are the group columns followed by a numeric `count`;
/// groups are ordered by count descending, ties by first-seen order.
/// Grouping compares canonical string representations, so a column's
/// display spelling is its group label.
pub fn summarize(table: &Table, group_columns: &[String]) -> Result<Table, IntegrityError> {
    let mut indices = Vec::with_capacity(group_columns.len());
    for name in group_columns {
        let idx = table
            .column_index(name)
            .ok_or_else(|| IntegrityError::MissingColumn { column: name.clone() })?;
        indices.push(idx);
    }

    // First-seen group order, with a representative raw row per group
    let mut slots: FxHashMap<Vec<String>, usize> = FxHashMap::default();
    let mut groups: Vec<(Vec<Value>, usize)> = Vec::new();
    for row in table.rows() {
        let label: Vec<String> = indices.iter().map(|&i| row[i].to_string()).collect();
        match slots.get(&label) {
            Some(&slot) => groups[slot].1 += 1,
            None => {
                slots.insert(label, groups.len());
                groups.push((indices.iter().map(|&i| row[i].clone()).collect(), 1));
            }
        }
    }
    groups.sort_by(|a, b| b.1.cmp(&a.1));

    let mut columns: Vec<Column> = indices
        .iter()
        .map(|&i| table.columns()[i].clone())
        .collect();
    columns.push(Column::new("count", ColumnKind::Numeric));

    let mut out = Table::new(columns);
    for (mut values, count) in groups {
        values.push(Value::Number(count as f64));
        out.push_row(values);
    }
    Ok(out)
}

/// How many rows have a truthy attribute, out of how many rows total.
pub fn attribute_tally(table: &Table, attr_column: &str) -> Option<(usize, usize)> {
    let idx = table.column_index(attr_column)?;
    let set = table.rows().iter().filter(|row| row[idx].is_truthy()).count();
    Some((set, table.row_count()))
}
