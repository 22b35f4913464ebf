// Canonical record store backed by SQLite.
//
// One real `records` table per store file, with quoted columns typed by
// the engine's column kinds, plus a `meta` key/value table recording the
// identifier column, attribute column, and the column-kind map so a load
// restores inferred kinds without re-inference.

use std::path::{Path, PathBuf};

use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection};

use tallysheet_engine::store::{Store, StoreError};
use tallysheet_engine::table::{Column, Table};
use tallysheet_engine::value::{coerce_number, ColumnKind, Value};

const META_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

pub struct SqliteStore {
    path: PathBuf,
    id_column: String,
    attr_column: String,
    columns: Vec<Column>,
}

impl SqliteStore {
    /// Create a fresh store file from a table. An existing file at
    /// `path` is overwritten; callers guard against clobbering.
    pub fn create(
        path: &Path,
        table: &Table,
        id_column: &str,
        attr_column: &str,
    ) -> Result<SqliteStore, StoreError> {
        if table.column_index(attr_column).is_none() {
            return Err(StoreError::Replace(format!(
                "attribute column '{attr_column}' not present in table"
            )));
        }
        table
            .check_identifier(id_column)
            .map_err(|e| StoreError::Replace(e.to_string()))?;

        if path.exists() {
            std::fs::remove_file(path).map_err(|e| StoreError::Replace(e.to_string()))?;
        }
        let conn = Connection::open(path).map_err(|e| StoreError::Replace(e.to_string()))?;
        write_all(&conn, table, id_column, attr_column)
            .map_err(|e| StoreError::Replace(e.to_string()))?;

        Ok(SqliteStore {
            path: path.to_path_buf(),
            id_column: id_column.to_string(),
            attr_column: attr_column.to_string(),
            columns: table.columns().to_vec(),
        })
    }

    /// Open an existing store file. A missing or unreadable file is a
    /// load error; there is nothing to operate on.
    pub fn open(path: &Path) -> Result<SqliteStore, StoreError> {
        if !path.exists() {
            return Err(StoreError::Load(format!(
                "store file not found: {}",
                path.display()
            )));
        }
        let conn = Connection::open(path).map_err(|e| StoreError::Load(e.to_string()))?;
        let id_column = read_meta(&conn, "id_column")?;
        let attr_column = read_meta(&conn, "attr_column")?;
        let columns: Vec<Column> = serde_json::from_str(&read_meta(&conn, "columns")?)
            .map_err(|e| StoreError::Load(format!("corrupt column map: {e}")))?;

        Ok(SqliteStore {
            path: path.to_path_buf(),
            id_column,
            attr_column,
            columns,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    fn connect(&self) -> Result<Connection, rusqlite::Error> {
        Connection::open(&self.path)
    }

    fn kind_of(&self, name: &str) -> Option<ColumnKind> {
        self.columns.iter().find(|c| c.name == name).map(|c| c.kind)
    }
}

impl Store for SqliteStore {
    fn id_column(&self) -> &str {
        &self.id_column
    }

    fn attr_column(&self) -> &str {
        &self.attr_column
    }

    fn load(&self) -> Result<Table, StoreError> {
        let conn = self.connect().map_err(|e| StoreError::Load(e.to_string()))?;
        let select = format!(
            "SELECT {} FROM records ORDER BY rowid",
            self.columns
                .iter()
                .map(|c| quote_ident(&c.name))
                .collect::<Vec<_>>()
                .join(", ")
        );
        let mut stmt = conn
            .prepare(&select)
            .map_err(|e| StoreError::Load(e.to_string()))?;

        let kinds: Vec<ColumnKind> = self.columns.iter().map(|c| c.kind).collect();
        let rows = stmt
            .query_map([], |row| {
                let mut values = Vec::with_capacity(kinds.len());
                for (i, &kind) in kinds.iter().enumerate() {
                    values.push(cell_from_ref(kind, row.get_ref(i)?));
                }
                Ok(values)
            })
            .map_err(|e| StoreError::Load(e.to_string()))?;

        let mut table = Table::new(self.columns.clone());
        for row in rows {
            table.push_row(row.map_err(|e| StoreError::Load(e.to_string()))?);
        }
        Ok(table)
    }

    fn update_attribute(
        &mut self,
        identifier: &Value,
        new_value: &Value,
    ) -> Result<(), StoreError> {
        let update_err = |message: String| StoreError::Update {
            identifier: identifier.to_string(),
            message,
        };
        let id_kind = self
            .kind_of(&self.id_column)
            .ok_or_else(|| update_err(format!("no column '{}'", self.id_column)))?;
        let attr_kind = self
            .kind_of(&self.attr_column)
            .ok_or_else(|| update_err(format!("no column '{}'", self.attr_column)))?;

        let conn = self.connect().map_err(|e| update_err(e.to_string()))?;
        let sql = format!(
            "UPDATE records SET {} = ?1 WHERE {} = ?2",
            quote_ident(&self.attr_column),
            quote_ident(&self.id_column)
        );
        let affected = conn
            .execute(
                &sql,
                rusqlite::params![bind_cell(attr_kind, new_value), bind_cell(id_kind, identifier)],
            )
            .map_err(|e| update_err(e.to_string()))?;
        if affected == 0 {
            return Err(update_err("identifier not found".into()));
        }
        Ok(())
    }

    fn replace(&mut self, table: &Table) -> Result<(), StoreError> {
        if table.column_index(&self.attr_column).is_none() {
            return Err(StoreError::Replace(format!(
                "attribute column '{}' not present in table",
                self.attr_column
            )));
        }
        table
            .check_identifier(&self.id_column)
            .map_err(|e| StoreError::Replace(e.to_string()))?;

        let conn = self.connect().map_err(|e| StoreError::Replace(e.to_string()))?;
        write_all(&conn, table, &self.id_column, &self.attr_column)
            .map_err(|e| StoreError::Replace(e.to_string()))?;
        self.columns = table.columns().to_vec();
        Ok(())
    }
}

fn read_meta(conn: &Connection, key: &str) -> Result<String, StoreError> {
    conn.query_row("SELECT value FROM meta WHERE key = ?1", [key], |row| row.get(0))
        .map_err(|e| StoreError::Load(format!("meta '{key}': {e}")))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn sql_type(kind: ColumnKind) -> &'static str {
    match kind {
        ColumnKind::Numeric => "REAL",
        ColumnKind::Boolean => "INTEGER",
        ColumnKind::Temporal | ColumnKind::Textual => "TEXT",
    }
}

fn bind_cell(kind: ColumnKind, value: &Value) -> SqlValue {
    if value.is_null() {
        return SqlValue::Null;
    }
    match kind {
        ColumnKind::Numeric => match coerce_number(value) {
            Some(n) => SqlValue::Real(n),
            None => SqlValue::Text(value.to_string()),
        },
        ColumnKind::Boolean => SqlValue::Integer(value.is_truthy() as i64),
        ColumnKind::Temporal | ColumnKind::Textual => SqlValue::Text(value.to_string()),
    }
}

fn cell_from_ref(kind: ColumnKind, value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => match kind {
            ColumnKind::Boolean => Value::Bool(i != 0),
            ColumnKind::Numeric => Value::Number(i as f64),
            _ => Value::Text(i.to_string()),
        },
        ValueRef::Real(f) => match kind {
            ColumnKind::Numeric => Value::Number(f),
            _ => Value::Text(Value::Number(f).to_string()),
        },
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(_) => Value::Null,
    }
}

/// Rewrite the whole store (schema + meta + rows) in one transaction.
fn write_all(
    conn: &Connection,
    table: &Table,
    id_column: &str,
    attr_column: &str,
) -> Result<(), rusqlite::Error> {
    let column_defs = table
        .columns()
        .iter()
        .map(|c| format!("{} {}", quote_ident(&c.name), sql_type(c.kind)))
        .collect::<Vec<_>>()
        .join(", ");
    let column_list = table
        .columns()
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=table.columns().len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");

    conn.execute("BEGIN TRANSACTION", [])?;
    conn.execute("DROP TABLE IF EXISTS records", [])?;
    conn.execute("DROP TABLE IF EXISTS meta", [])?;
    conn.execute_batch(META_SCHEMA)?;
    conn.execute(&format!("CREATE TABLE records ({column_defs})"), [])?;

    for (key, value) in [
        ("id_column", id_column.to_string()),
        ("attr_column", attr_column.to_string()),
        (
            "columns",
            serde_json::to_string(table.columns()).unwrap_or_default(),
        ),
    ] {
        conn.execute(
            "INSERT INTO meta (key, value) VALUES (?1, ?2)",
            rusqlite::params![key, value],
        )?;
    }

    {
        let mut stmt = conn.prepare(&format!(
            "INSERT INTO records ({column_list}) VALUES ({placeholders})"
        ))?;
        let kinds: Vec<ColumnKind> = table.columns().iter().map(|c| c.kind).collect();
        for row in table.rows() {
            stmt.execute(params_from_iter(
                row.iter().zip(&kinds).map(|(v, &k)| bind_cell(k, v)),
            ))?;
        }
    }

    conn.execute("COMMIT", [])?;
    Ok(())
}
