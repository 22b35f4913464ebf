//! Edit reconciliation: attribute edits made against a (possibly
//! filtered) view back to rows of the canonical table.
//!
//! The join is keyed on the identifier column, never on row position.
//! Rows present on only one side are excluded by design; the mutable
//! surface is a single attribute, and structural edits are not this
//! module's problem. Duplicate identifiers are a data-integrity error,
//! reported rather than resolved by picking a match.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use tracing::debug;

use crate::error::IntegrityError;
use crate::table::Table;
use crate::value::{Key, Value};

/// One detected edit, keyed by the canonical identifier value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeRecord {
    pub identifier: Value,
    pub old_value: Value,
    pub new_value: Value,
}

/// Diff the edited view against its pre-edit baseline, restricted to
/// the one mutable attribute. Returns a change record per row whose
/// attribute differs, in baseline row order.
pub fn diff(
    baseline: &Table,
    edited: &Table,
    id_column: &str,
    attr_column: &str,
) -> Result<Vec<ChangeRecord>, IntegrityError> {
    let missing = |column: &str| IntegrityError::MissingColumn { column: column.to_string() };
    let b_id = baseline.column_index(id_column).ok_or_else(|| missing(id_column))?;
    let b_attr = baseline.column_index(attr_column).ok_or_else(|| missing(attr_column))?;
    let e_id = edited.column_index(id_column).ok_or_else(|| missing(id_column))?;
    let e_attr = edited.column_index(attr_column).ok_or_else(|| missing(attr_column))?;

    // Kinds come from the baseline: it was materialized from the
    // canonical table, while the edited side may have been re-typed on
    // its way through an external edit surface.
    let id_kind = baseline.columns()[b_id].kind;
    let attr_kind = baseline.columns()[b_attr].kind;

    let mut edited_rows: FxHashMap<Key, usize> = FxHashMap::default();
    for (row, values) in edited.rows().iter().enumerate() {
        let identifier = &values[e_id];
        if identifier.is_null() {
            return Err(IntegrityError::NullIdentifier { column: id_column.to_string(), row });
        }
        let key = Key::for_kind(identifier, id_kind);
        if edited_rows.insert(key, row).is_some() {
            return Err(IntegrityError::DuplicateIdentifier {
                column: id_column.to_string(),
                value: identifier.to_string(),
            });
        }
    }

    let mut seen: FxHashSet<Key> = FxHashSet::default();
    let mut changes = Vec::new();
    for (row, values) in baseline.rows().iter().enumerate() {
        let identifier = &values[b_id];
        if identifier.is_null() {
            return Err(IntegrityError::NullIdentifier { column: id_column.to_string(), row });
        }
        let key = Key::for_kind(identifier, id_kind);
        if !seen.insert(key.clone()) {
            return Err(IntegrityError::DuplicateIdentifier {
                column: id_column.to_string(),
                value: identifier.to_string(),
            });
        }

        // Inner join: rows added or removed by the edit surface carry
        // no attribute change to propagate.
        let Some(&edited_row) = edited_rows.get(&key) else {
            continue;
        };

        let old_value = &values[b_attr];
        let new_value = &edited.rows()[edited_row][e_attr];
        if Key::for_kind(old_value, attr_kind) != Key::for_kind(new_value, attr_kind) {
            changes.push(ChangeRecord {
                identifier: identifier.clone(),
                old_value: old_value.clone(),
                new_value: new_value.clone(),
            });
        }
    }

    debug!("reconcile: {} of {} baseline rows changed", changes.len(), baseline.row_count());
    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Table;

    fn two_rows(attrs: [bool; 2]) -> Table {
        Table::from_rows(
            vec!["id".into(), "checked".into()],
            vec![
                vec![Value::Number(1.0), Value::Bool(attrs[0])],
                vec![Value::Number(2.0), Value::Bool(attrs[1])],
            ],
        )
    }

    #[test]
    fn single_changed_row_produces_one_record() {
        let baseline = two_rows([false, false]);
        let edited = two_rows([true, false]);
        let changes = diff(&baseline, &edited, "id", "checked").unwrap();
        assert_eq!(
            changes,
            vec![ChangeRecord {
                identifier: Value::Number(1.0),
                old_value: Value::Bool(false),
                new_value: Value::Bool(true),
            }]
        );
    }

    #[test]
    fn unchanged_views_produce_no_records() {
        let baseline = two_rows([true, false]);
        let edited = two_rows([true, false]);
        assert!(diff(&baseline, &edited, "id", "checked").unwrap().is_empty());
    }

    #[test]
    fn rows_outside_the_join_are_ignored() {
        let baseline = two_rows([false, false]);
        let mut edited = Table::from_rows(
            vec!["id".into(), "checked".into()],
            vec![vec![Value::Number(2.0), Value::Bool(true)]],
        );
        // A row the edit surface invented is not joined either
        edited.push_row(vec![Value::Number(99.0), Value::Bool(true)]);
        let changes = diff(&baseline, &edited, "id", "checked").unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].identifier, Value::Number(2.0));
    }

    #[test]
    fn duplicate_identifier_is_fatal_and_yields_no_records() {
        let baseline = two_rows([false, false]);
        let edited = Table::from_rows(
            vec!["id".into(), "checked".into()],
            vec![
                vec![Value::Number(1.0), Value::Bool(true)],
                vec![Value::Number(1.0), Value::Bool(false)],
            ],
        );
        let err = diff(&baseline, &edited, "id", "checked").unwrap_err();
        assert_eq!(
            err,
            IntegrityError::DuplicateIdentifier { column: "id".into(), value: "1".into() }
        );
    }

    #[test]
    fn duplicate_in_baseline_is_fatal_too() {
        let baseline = Table::from_rows(
            vec!["id".into(), "checked".into()],
            vec![
                vec![Value::Number(1.0), Value::Bool(false)],
                vec![Value::Number(1.0), Value::Bool(false)],
            ],
        );
        let edited = two_rows([true, true]);
        assert!(matches!(
            diff(&baseline, &edited, "id", "checked"),
            Err(IntegrityError::DuplicateIdentifier { .. })
        ));
    }

    #[test]
    fn missing_columns_are_fatal() {
        let baseline = two_rows([false, false]);
        let edited = Table::from_rows(vec!["id".into()], vec![vec![Value::Number(1.0)]]);
        assert_eq!(
            diff(&baseline, &edited, "id", "checked").unwrap_err(),
            IntegrityError::MissingColumn { column: "checked".into() }
        );
        assert_eq!(
            diff(&baseline, &edited, "nope", "checked").unwrap_err(),
            IntegrityError::MissingColumn { column: "nope".into() }
        );
    }

    #[test]
    fn identifiers_join_across_text_and_number_spellings() {
        let baseline = two_rows([false, false]);
        // A CSV round trip may bring numeric identifiers back as text
        let edited = Table::from_rows(
            vec!["id".into(), "checked".into()],
            vec![
                vec![Value::Text("1".into()), Value::Bool(true)],
                vec![Value::Text("2".into()), Value::Bool(false)],
            ],
        );
        let changes = diff(&baseline, &edited, "id", "checked").unwrap();
        assert_eq!(changes.len(), 1);
        // The record carries the canonical identifier, not the edited
        // spelling
        assert_eq!(changes[0].identifier, Value::Number(1.0));
    }

    #[test]
    fn attribute_comparison_normalizes_spellings() {
        let baseline = two_rows([true, false]);
        let edited = Table::from_rows(
            vec!["id".into(), "checked".into()],
            vec![
                vec![Value::Number(1.0), Value::Text("true".into())],
                vec![Value::Number(2.0), Value::Text("false".into())],
            ],
        );
        // "true" spelled as text equals Bool(true) under the boolean kind
        assert!(diff(&baseline, &edited, "id", "checked").unwrap().is_empty());
    }
}
