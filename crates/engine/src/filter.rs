//! Predicates, filter sets, and views.
//!
//! A `FilterSet` is an ordered collection of user-composed `Predicate`s
//! applied conjunctively to a table, producing a `View`, a row-index
//! subsequence of the base table.
//!
//! Key invariants:
//! - Predicate tokens are unique for the set's lifetime and survive the
//!   removal of siblings (per-predicate UI state is never misattributed)
//! - A view is a subsequence of the base table: no reordering, no
//!   duplication, no fabricated rows
//! - Zero active predicates yields the identity view, distinguishable
//!   from a filter pass that happened to keep every row
//! - Conversion problems never abort a pass; they are collected as
//!   warnings and the rest of the predicate still applies

use std::fmt;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::FilterWarning;
use crate::table::Table;
use crate::value::{parse_timestamp, ColumnKind, Key};

/// Stable opaque token identifying one predicate within a set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PredicateId(u64);

impl fmt::Display for PredicateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One column + accepted-value-set filter condition.
///
/// Created inert (no column, no values) and mutated in place as the
/// user picks a column and values. An inert predicate matches every row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    id: PredicateId,
    column: Option<String>,
    accepted: Vec<String>,
}

impl Predicate {
    pub fn id(&self) -> PredicateId {
        self.id
    }

    pub fn column(&self) -> Option<&str> {
        self.column.as_deref()
    }

    pub fn accepted(&self) -> &[String] {
        &self.accepted
    }

    pub fn is_inert(&self) -> bool {
        self.column.is_none() || self.accepted.is_empty()
    }

    pub fn is_active(&self) -> bool {
        !self.is_inert()
    }

    /// Does this predicate accept the given row of `table`?
    pub fn matches(&self, table: &Table, row: usize) -> bool {
        let mut warnings = Vec::new();
        self.compile(table, &mut warnings).matches(table, row)
    }

    /// Resolve the predicate against a concrete table: coerce the
    /// accepted values to the column's kind once, dropping (and
    /// reporting) the ones that do not convert.
    fn compile(&self, table: &Table, warnings: &mut Vec<FilterWarning>) -> Compiled {
        if self.is_inert() {
            return Compiled::All;
        }
        let column = self.column.as_deref().unwrap_or_default();
        let Some(col) = table.column_index(column) else {
            warn!("filter column '{}' not found; skipping this filter", column);
            warnings.push(FilterWarning::UnknownColumn {
                predicate: self.id,
                column: column.to_string(),
            });
            return Compiled::All;
        };
        let kind = table.columns()[col].kind;

        let mut keys = FxHashSet::default();
        for raw in &self.accepted {
            let key = match kind {
                ColumnKind::Numeric => raw
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|n| n.is_finite())
                    .map(|n| Key::Number(n.into())),
                ColumnKind::Temporal => parse_timestamp(raw).map(Key::Time),
                ColumnKind::Boolean | ColumnKind::Textual => Some(Key::Text(raw.clone())),
            };
            match key {
                Some(key) => {
                    keys.insert(key);
                }
                None => {
                    warn!("could not convert '{}' for {} column '{}'", raw, kind, column);
                    warnings.push(FilterWarning::Conversion {
                        predicate: self.id,
                        column: column.to_string(),
                        value: raw.clone(),
                        kind,
                    });
                }
            }
        }

        // An accepted set that coerced to nothing matches no rows; the
        // predicate stays active rather than silently vanishing.
        Compiled::Membership { col, kind, keys }
    }
}

enum Compiled {
    All,
    Membership {
        col: usize,
        kind: ColumnKind,
        keys: FxHashSet<Key>,
    },
}

impl Compiled {
    fn matches(&self, table: &Table, row: usize) -> bool {
        match self {
            Compiled::All => true,
            Compiled::Membership { col, kind, keys } => {
                keys.contains(&Key::for_kind(table.cell(row, *col), *kind))
            }
        }
    }
}

/// Ordered collection of predicates, conjoined on application.
/// Insertion order is preserved for deterministic application and
/// stable positioning; it does not affect the result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSet {
    predicates: Vec<Predicate>,
    next_id: u64,
}

impl FilterSet {
    pub fn new() -> FilterSet {
        FilterSet::default()
    }

    /// Append a new inert predicate and return its token. Tokens are
    /// never reused within the set's lifetime.
    pub fn add(&mut self) -> PredicateId {
        let id = PredicateId(self.next_id);
        self.next_id += 1;
        self.predicates.push(Predicate { id, column: None, accepted: Vec::new() });
        id
    }

    pub fn get(&self, id: PredicateId) -> Option<&Predicate> {
        self.predicates.iter().find(|p| p.id == id)
    }

    fn get_mut(&mut self, id: PredicateId) -> Option<&mut Predicate> {
        self.predicates.iter_mut().find(|p| p.id == id)
    }

    /// Point a predicate at a column. Changing the column clears the
    /// previously chosen values; they belonged to the old column's
    /// domain.
    pub fn set_column(&mut self, id: PredicateId, column: Option<&str>) -> bool {
        match self.get_mut(id) {
            Some(p) => {
                if p.column.as_deref() != column {
                    p.column = column.map(str::to_string);
                    p.accepted.clear();
                }
                true
            }
            None => false,
        }
    }

    pub fn set_values(&mut self, id: PredicateId, values: Vec<String>) -> bool {
        match self.get_mut(id) {
            Some(p) => {
                p.accepted = values;
                true
            }
            None => false,
        }
    }

    /// Remove a predicate. Relative order of the rest is preserved.
    pub fn remove(&mut self, id: PredicateId) -> bool {
        let before = self.predicates.len();
        self.predicates.retain(|p| p.id != id);
        self.predicates.len() != before
    }

    pub fn clear(&mut self) {
        self.predicates.clear();
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Predicate> {
        self.predicates.iter()
    }

    /// Predicates with a column and a non-empty accepted set.
    pub fn active_count(&self) -> usize {
        self.predicates.iter().filter(|p| p.is_active()).count()
    }

    /// Apply every predicate conjunctively. With no active predicate the
    /// result is the identity view of `table`.
    pub fn apply(&self, table: &Table) -> Applied {
        let active = self.active_count();
        let mut warnings = Vec::new();
        if active == 0 {
            return Applied { view: View::identity(table), warnings };
        }

        let compiled: Vec<Compiled> = self
            .predicates
            .iter()
            .filter(|p| p.is_active())
            .map(|p| p.compile(table, &mut warnings))
            .collect();

        let indices = (0..table.row_count())
            .filter(|&row| compiled.iter().all(|c| c.matches(table, row)))
            .collect();

        Applied { view: View { indices, active }, warnings }
    }

    /// Values a caller may offer when choosing a predicate's accepted
    /// set: distinct values of `column` in the **base** table, ordered
    /// by descending frequency, ties broken by first-seen order.
    pub fn candidate_values(table: &Table, column: &str) -> Option<Vec<String>> {
        let mut counts = table.value_counts(column)?;
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        Some(counts.into_iter().map(|(value, _)| value).collect())
    }
}

/// Result of one filter pass: the view plus any non-fatal warnings.
#[derive(Debug, Clone)]
pub struct Applied {
    pub view: View,
    pub warnings: Vec<FilterWarning>,
}

/// A row-index subsequence of a base table.
///
/// `active` records how many active predicates produced it; zero marks
/// the identity view ("no filtering"), which downstream code can tell
/// apart from a pass that filtered to everything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct View {
    indices: Vec<usize>,
    active: usize,
}

impl View {
    pub fn identity(table: &Table) -> View {
        View { indices: (0..table.row_count()).collect(), active: 0 }
    }

    pub fn is_identity(&self) -> bool {
        self.active == 0
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Copy the visible rows into a standalone table (the edit surface).
    pub fn materialize(&self, table: &Table) -> Table {
        table.subset(&self.indices)
    }
}

/// Thin re-apply workflow over a `FilterSet`: the piece that runs after
/// a store reload, plus the one-pass reset that keeps the caller's
/// predicate definitions intact.
pub struct FilterEngine;

impl FilterEngine {
    pub fn apply_all(table: &Table, filters: &FilterSet) -> Applied {
        filters.apply(table)
    }

    /// Identity view for one pass without touching `filters`.
    pub fn reset(table: &Table) -> View {
        View::identity(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::region_roster;
    use crate::value::Value;

    fn set_with(column: &str, values: &[&str]) -> FilterSet {
        let mut filters = FilterSet::new();
        let id = filters.add();
        filters.set_column(id, Some(column));
        filters.set_values(id, values.iter().map(|s| s.to_string()).collect());
        filters
    }

    #[test]
    fn predicate_matches_rows_by_accepted_values() {
        let table = region_roster();
        let mut filters = FilterSet::new();
        let id = filters.add();
        filters.set_column(id, Some("region"));
        filters.set_values(id, vec!["north".into()]);
        let predicate = filters.get(id).unwrap();
        assert!(predicate.matches(&table, 2));
        assert!(!predicate.matches(&table, 0));
    }

    #[test]
    fn empty_set_returns_identity_view() {
        let table = region_roster();
        let filters = FilterSet::new();
        let applied = filters.apply(&table);
        assert!(applied.view.is_identity());
        assert_eq!(applied.view.len(), table.row_count());
        assert!(applied.warnings.is_empty());
    }

    #[test]
    fn inert_predicates_return_identity_view() {
        let table = region_roster();
        let mut filters = FilterSet::new();
        filters.add(); // no column
        let with_col = filters.add();
        filters.set_column(with_col, Some("region")); // no values
        let applied = filters.apply(&table);
        assert!(applied.view.is_identity());
    }

    #[test]
    fn view_is_a_subsequence() {
        let table = region_roster();
        let filters = set_with("region", &["north"]);
        let applied = filters.apply(&table);
        assert!(!applied.view.is_identity());
        let indices = applied.view.indices();
        assert!(indices.windows(2).all(|w| w[0] < w[1]));
        for &i in indices {
            assert_eq!(table.value(i, "region"), Some(&Value::Text("north".into())));
        }
    }

    #[test]
    fn apply_is_idempotent() {
        let table = region_roster();
        let filters = set_with("region", &["north", "east"]);
        let first = filters.apply(&table);
        let second = filters.apply(&table);
        assert_eq!(first.view, second.view);
    }

    #[test]
    fn predicates_conjoin() {
        let table = region_roster();
        let mut filters = set_with("region", &["north"]);
        let id = filters.add();
        filters.set_column(id, Some("name"));
        filters.set_values(id, vec!["nadia".into()]);
        let applied = filters.apply(&table);
        assert_eq!(applied.view.len(), 1);
        let row = applied.view.indices()[0];
        assert_eq!(table.value(row, "name"), Some(&Value::Text("nadia".into())));
    }

    #[test]
    fn numeric_column_matches_text_supplied_value() {
        let table = region_roster();
        // record_id is numeric; the filter value arrives as text
        let filters = set_with("record_id", &["3"]);
        let applied = filters.apply(&table);
        assert_eq!(applied.view.len(), 1);
        assert_eq!(
            table.value(applied.view.indices()[0], "record_id"),
            Some(&Value::Number(3.0))
        );
    }

    #[test]
    fn non_coercible_numeric_value_is_dropped_with_warning() {
        let table = region_roster();
        let filters = set_with("record_id", &["abc"]);
        let applied = filters.apply(&table);
        assert!(applied.view.is_empty());
        assert!(!applied.view.is_identity());
        assert_eq!(applied.warnings.len(), 1);
        assert!(matches!(
            applied.warnings[0],
            FilterWarning::Conversion { ref value, .. } if value == "abc"
        ));
    }

    #[test]
    fn partially_coercible_set_still_applies() {
        let table = region_roster();
        let filters = set_with("record_id", &["abc", "2"]);
        let applied = filters.apply(&table);
        assert_eq!(applied.view.len(), 1);
        assert_eq!(applied.warnings.len(), 1);
    }

    #[test]
    fn unknown_column_warns_and_matches_everything() {
        let table = region_roster();
        let filters = set_with("no_such_column", &["x"]);
        let applied = filters.apply(&table);
        // Active but unevaluable: every row passes, and it is not the
        // identity view.
        assert_eq!(applied.view.len(), table.row_count());
        assert!(!applied.view.is_identity());
        assert!(matches!(applied.warnings[0], FilterWarning::UnknownColumn { .. }));
    }

    #[test]
    fn textual_comparison_is_lexical_even_for_digits() {
        let table = crate::table::Table::from_rows(
            vec!["code".into()],
            vec![
                vec![Value::Text("007".into())],
                vec![Value::Text("7".into())],
            ],
        );
        let filters = set_with("code", &["7"]);
        let applied = filters.apply(&table);
        // "007" is not "7" on a textual column
        assert_eq!(applied.view.len(), 1);
        assert_eq!(applied.view.indices(), &[1]);
    }

    #[test]
    fn temporal_column_matches_date_spellings() {
        let table = crate::table::Table::from_rows(
            vec!["joined".into()],
            vec![
                vec![Value::Text("2025-03-01".into())],
                vec![Value::Text("2025-03-02 00:00:00".into())],
            ],
        );
        assert_eq!(table.kind_of("joined"), Some(ColumnKind::Temporal));
        let filters = set_with("joined", &["2025-03-02"]);
        let applied = filters.apply(&table);
        assert_eq!(applied.view.indices(), &[1]);
    }

    #[test]
    fn set_column_clears_chosen_values() {
        let mut filters = FilterSet::new();
        let id = filters.add();
        filters.set_column(id, Some("region"));
        filters.set_values(id, vec!["north".into()]);
        filters.set_column(id, Some("name"));
        assert!(filters.get(id).unwrap().accepted().is_empty());

        // Re-setting the same column keeps the values
        filters.set_values(id, vec!["nadia".into()]);
        filters.set_column(id, Some("name"));
        assert_eq!(filters.get(id).unwrap().accepted(), ["nadia".to_string()]);
    }

    #[test]
    fn removal_leaves_siblings_untouched_and_tokens_fresh() {
        let mut filters = FilterSet::new();
        let a = filters.add();
        let b = filters.add();
        let c = filters.add();
        filters.set_column(b, Some("region"));
        filters.set_values(b, vec!["north".into()]);

        assert!(filters.remove(a));
        assert!(!filters.remove(a));
        assert_eq!(filters.len(), 2);
        assert_eq!(filters.get(b).unwrap().accepted(), ["north".to_string()]);
        assert_eq!(filters.iter().map(|p| p.id()).collect::<Vec<_>>(), vec![b, c]);

        let d = filters.add();
        assert!(d != a && d != b && d != c);
    }

    #[test]
    fn candidate_values_ordered_by_frequency_then_first_seen() {
        let table = crate::table::Table::from_rows(
            vec!["tag".into()],
            vec![
                vec![Value::Text("A".into())],
                vec![Value::Text("B".into())],
                vec![Value::Text("A".into())],
                vec![Value::Text("C".into())],
                vec![Value::Text("A".into())],
                vec![Value::Text("B".into())],
            ],
        );
        let candidates = FilterSet::candidate_values(&table, "tag").unwrap();
        assert_eq!(candidates, vec!["A".to_string(), "B".to_string(), "C".to_string()]);
        assert!(FilterSet::candidate_values(&table, "missing").is_none());
    }

    #[test]
    fn engine_reset_keeps_definitions() {
        let table = region_roster();
        let filters = set_with("region", &["north"]);
        let view = FilterEngine::reset(&table);
        assert!(view.is_identity());
        assert_eq!(filters.active_count(), 1);
    }
}
