//! The canonical-store seam.
//!
//! The engine never mutates the persisted table directly; all
//! persistent mutation goes through identifier-keyed single-attribute
//! updates on this trait. The SQLite implementation lives in
//! `tallysheet-store`, keeping this crate free of I/O.

use std::fmt;

use crate::table::Table;
use crate::value::Value;

pub trait Store {
    /// Name of the identifier column in the canonical table.
    fn id_column(&self) -> &str;

    /// Name of the single mutable attribute column.
    fn attr_column(&self) -> &str;

    /// Load the full canonical table, identifier and attribute columns
    /// included.
    fn load(&self) -> Result<Table, StoreError>;

    /// Persist a single-row, single-attribute change. Idempotent:
    /// applying the same update twice yields the same persisted state.
    /// Failure must not corrupt other rows.
    fn update_attribute(&mut self, identifier: &Value, new_value: &Value)
        -> Result<(), StoreError>;

    /// Bulk-replace the canonical table (import/reset flows). Not part
    /// of the reconciliation hot path.
    fn replace(&mut self, table: &Table) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// The canonical table cannot be loaded; the session has nothing to
    /// operate on.
    Load(String),
    /// A single-row update failed. Other rows are unaffected.
    Update { identifier: String, message: String },
    /// A bulk replace failed.
    Replace(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load(msg) => write!(f, "store load error: {msg}"),
            Self::Update { identifier, message } => {
                write!(f, "update failed for identifier '{identifier}': {message}")
            }
            Self::Replace(msg) => write!(f, "store replace error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}
