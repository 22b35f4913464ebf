//! Test fixtures shared across engine test modules: a small roster
//! table and an in-memory `Store` with injectable per-row failures.

use crate::store::{Store, StoreError};
use crate::table::Table;
use crate::value::{Key, Value};

/// Five records, identifier column `record_id` (1..=5), a `region`
/// column with two `north` rows (records 3 and 4), and a `checked`
/// attribute that starts all-false.
pub fn region_roster() -> Table {
    let row = |id: f64, name: &str, region: &str| {
        vec![
            Value::Number(id),
            Value::Text(name.into()),
            Value::Text(region.into()),
            Value::Bool(false),
        ]
    };
    Table::from_rows(
        vec!["record_id".into(), "name".into(), "region".into(), "checked".into()],
        vec![
            row(1.0, "amal", "south"),
            row(2.0, "rami", "east"),
            row(3.0, "nadia", "north"),
            row(4.0, "ziad", "north"),
            row(5.0, "hind", "west"),
        ],
    )
}

/// In-memory store over an owned table. `fail_on` makes individual
/// identifiers refuse updates, for exercising per-row failure paths.
pub struct MemStore {
    table: Table,
    id_column: String,
    attr_column: String,
    fail_on: Vec<String>,
}

impl MemStore {
    pub fn new(table: Table, id_column: &str, attr_column: &str) -> MemStore {
        MemStore {
            table,
            id_column: id_column.to_string(),
            attr_column: attr_column.to_string(),
            fail_on: Vec::new(),
        }
    }

    pub fn fail_on(&mut self, identifier: &str) {
        self.fail_on.push(identifier.to_string());
    }
}

impl Store for MemStore {
    fn id_column(&self) -> &str {
        &self.id_column
    }

    fn attr_column(&self) -> &str {
        &self.attr_column
    }

    fn load(&self) -> Result<Table, StoreError> {
        Ok(self.table.clone())
    }

    fn update_attribute(
        &mut self,
        identifier: &Value,
        new_value: &Value,
    ) -> Result<(), StoreError> {
        if self.fail_on.iter().any(|f| *f == identifier.to_string()) {
            return Err(StoreError::Update {
                identifier: identifier.to_string(),
                message: "simulated write failure".into(),
            });
        }
        let id_idx = self.table.column_index(&self.id_column).ok_or_else(|| {
            StoreError::Update {
                identifier: identifier.to_string(),
                message: format!("no column '{}'", self.id_column),
            }
        })?;
        let kind = self.table.columns()[id_idx].kind;
        let wanted = Key::for_kind(identifier, kind);
        let row = (0..self.table.row_count())
            .find(|&r| Key::for_kind(self.table.cell(r, id_idx), kind) == wanted)
            .ok_or_else(|| StoreError::Update {
                identifier: identifier.to_string(),
                message: "identifier not found".into(),
            })?;
        let attr = self.attr_column.clone();
        self.table.set_value(row, &attr, new_value.clone());
        Ok(())
    }

    fn replace(&mut self, table: &Table) -> Result<(), StoreError> {
        self.table = table.clone();
        Ok(())
    }
}
