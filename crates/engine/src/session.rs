//! One user's working set: base table, filter set, current view.
//!
//! Everything the original interactive surface kept in page-global
//! state lives here as an explicit value object. The engine holds no
//! hidden state; persistence lives only behind the `Store` seam.
//!
//! The commit cycle is strictly ordered: diff the edited view against
//! its baseline, persist the changes row by row, reload the canonical
//! table, then re-apply the filters. Re-applying before the reload
//! would compute the refreshed view from stale data.

use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{FilterWarning, IntegrityError};
use crate::filter::{FilterEngine, FilterSet, View};
use crate::reconcile::{self, ChangeRecord};
use crate::store::{Store, StoreError};
use crate::summary;
use crate::table::Table;

#[derive(Debug)]
pub struct Session {
    pub table: Table,
    pub filters: FilterSet,
    pub view: View,
    id_column: String,
    attr_column: String,
}

/// A persisted update that failed, reported per row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateFailure {
    pub identifier: String,
    pub message: String,
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Serialize)]
pub struct CommitReport {
    /// Detected edits, in baseline row order.
    pub changes: Vec<ChangeRecord>,
    /// How many of them were persisted.
    pub applied: usize,
    /// Per-row persistence failures; one failing row never blocks the
    /// rest.
    pub failures: Vec<UpdateFailure>,
    /// Warnings from re-applying the filters to the reloaded table.
    pub warnings: Vec<FilterWarning>,
}

#[derive(Debug)]
pub enum SessionError {
    Integrity(IntegrityError),
    Store(StoreError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integrity(e) => write!(f, "{e}"),
            Self::Store(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<IntegrityError> for SessionError {
    fn from(e: IntegrityError) -> Self {
        SessionError::Integrity(e)
    }
}

impl From<StoreError> for SessionError {
    fn from(e: StoreError) -> Self {
        SessionError::Store(e)
    }
}

impl Session {
    /// Load the canonical table and start with no filters and the
    /// identity view.
    pub fn open(store: &dyn Store) -> Result<Session, SessionError> {
        let table = Self::load_checked(store)?;
        let view = View::identity(&table);
        Ok(Session {
            table,
            filters: FilterSet::new(),
            view,
            id_column: store.id_column().to_string(),
            attr_column: store.attr_column().to_string(),
        })
    }

    fn load_checked(store: &dyn Store) -> Result<Table, SessionError> {
        let table = store.load()?;
        table.check_identifier(store.id_column())?;
        if table.column_index(store.attr_column()).is_none() {
            return Err(IntegrityError::MissingColumn {
                column: store.attr_column().to_string(),
            }
            .into());
        }
        Ok(table)
    }

    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    pub fn attr_column(&self) -> &str {
        &self.attr_column
    }

    /// Recompute the view from the current filters.
    pub fn apply_filters(&mut self) -> Vec<FilterWarning> {
        let applied = FilterEngine::apply_all(&self.table, &self.filters);
        self.view = applied.view;
        debug!(
            "applied {} active filter(s): {} of {} rows visible",
            self.filters.active_count(),
            self.view.len(),
            self.table.row_count()
        );
        applied.warnings
    }

    /// Drop all predicate definitions and show everything.
    pub fn reset_filters(&mut self) {
        self.filters.clear();
        self.view = FilterEngine::reset(&self.table);
    }

    /// The view as handed to an edit surface: a standalone copy.
    pub fn baseline(&self) -> Table {
        self.view.materialize(&self.table)
    }

    /// Checked/total tally over the current view.
    pub fn tally(&self) -> (usize, usize) {
        let Some(idx) = self.table.column_index(&self.attr_column) else {
            return (0, self.view.len());
        };
        let set = self
            .view
            .indices()
            .iter()
            .filter(|&&row| self.table.cell(row, idx).is_truthy())
            .count();
        (set, self.view.len())
    }

    /// Checked/total tally over the full base table.
    pub fn tally_all(&self) -> (usize, usize) {
        summary::attribute_tally(&self.table, &self.attr_column)
            .unwrap_or((0, self.table.row_count()))
    }

    /// Reconcile an edited copy of the current view and propagate the
    /// changes: diff, persist per row, reload, re-apply filters.
    ///
    /// Integrity errors abort before anything is persisted. Per-row
    /// persistence failures are collected; the pass continues with the
    /// remaining rows.
    pub fn commit(
        &mut self,
        edited: &Table,
        store: &mut dyn Store,
    ) -> Result<CommitReport, SessionError> {
        let baseline = self.baseline();
        let changes = reconcile::diff(&baseline, edited, &self.id_column, &self.attr_column)?;

        let mut applied = 0;
        let mut failures = Vec::new();
        for change in &changes {
            match store.update_attribute(&change.identifier, &change.new_value) {
                Ok(()) => applied += 1,
                Err(e) => {
                    warn!("{}", e);
                    failures.push(UpdateFailure {
                        identifier: change.identifier.to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        // Reload before re-applying, or the refreshed view is stale.
        self.table = Self::load_checked(store)?;
        let warnings = self.apply_filters();

        Ok(CommitReport { changes, applied, failures, warnings })
    }
}
