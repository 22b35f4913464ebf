use std::fmt;

use serde::Serialize;

use crate::filter::PredicateId;
use crate::value::ColumnKind;

/// Non-fatal problem during a filter pass. The offending value or
/// predicate is skipped and the rest of the pass still applies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FilterWarning {
    /// An accepted filter value could not be coerced to the column's
    /// kind and was dropped from that predicate's effective set.
    Conversion {
        predicate: PredicateId,
        column: String,
        value: String,
        kind: ColumnKind,
    },
    /// A predicate names a column the table does not have; the predicate
    /// cannot be evaluated and matches everything.
    UnknownColumn {
        predicate: PredicateId,
        column: String,
    },
}

impl fmt::Display for FilterWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conversion { predicate, column, value, kind } => write!(
                f,
                "filter {predicate}: could not convert '{value}' for {kind} column '{column}'; value dropped"
            ),
            Self::UnknownColumn { predicate, column } => write!(
                f,
                "filter {predicate}: column '{column}' not found; filter skipped"
            ),
        }
    }
}

/// Data-integrity violation. Fatal to the reconciliation pass: the
/// engine reports rather than guessing which row an edit belongs to.
#[derive(Debug, Clone, PartialEq)]
pub enum IntegrityError {
    /// A required column is absent from a table.
    MissingColumn { column: String },
    /// The identifier column holds the same value on more than one row.
    DuplicateIdentifier { column: String, value: String },
    /// The identifier column holds a null.
    NullIdentifier { column: String, row: usize },
}

impl fmt::Display for IntegrityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingColumn { column } => write!(f, "missing column '{column}'"),
            Self::DuplicateIdentifier { column, value } => {
                write!(f, "duplicate identifier '{value}' in column '{column}'")
            }
            Self::NullIdentifier { column, row } => {
                write!(f, "null identifier in column '{column}' at row {row}")
            }
        }
    }
}

impl std::error::Error for IntegrityError {}
