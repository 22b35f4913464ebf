// Tallysheet CLI - headless record tracking
//
// Flow mirrors the interactive surface: import a spreadsheet into the
// store, narrow it with stacked column filters, export the narrowed
// view for editing, reconcile the edited file back by identifier.

mod exit_codes;
mod output;

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use tallysheet_config::{Profile, ProfileError};
use tallysheet_engine::error::IntegrityError;
use tallysheet_engine::filter::FilterSet;
use tallysheet_engine::session::{Session, SessionError};
use tallysheet_engine::store::{Store, StoreError};
use tallysheet_engine::summary;
use tallysheet_engine::value::{Key, Value};
use tallysheet_io::{ImportError, ImportOptions};
use tallysheet_store::SqliteStore;

use exit_codes::{EXIT_ERROR, EXIT_INTEGRITY, EXIT_PARTIAL, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Filter and check off spreadsheet records against a local store")]
#[command(version)]
struct Cli {
    /// Dataset profile (TOML); defaults to ./tallysheet.toml when present
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Store file (overrides the profile)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a spreadsheet/CSV into a fresh store
    #[command(after_help = "\
Examples:
  tally init data/roster.xlsx
  tally init roster.csv --drop district --drop precinct
  tally --config ward7.toml init --force")]
    Init {
        /// Source file (defaults to the profile's source)
        source: Option<PathBuf>,

        /// Identifier column name to inject
        #[arg(long)]
        id_column: Option<String>,

        /// Check-off attribute column name to append
        #[arg(long)]
        attr_column: Option<String>,

        /// Drop this column at import (repeatable)
        #[arg(long, value_name = "COLUMN")]
        drop: Vec<String>,

        /// Overwrite an existing store file
        #[arg(long)]
        force: bool,
    },

    /// Print the (optionally filtered) records
    #[command(after_help = "\
Examples:
  tally show
  tally show --where 'region=north'
  tally show --where 'region=north,east' --where 'age=34' --limit 20")]
    Show {
        /// Filter rows: 'Column=v1,v2'. Repeatable; filters conjoin.
        #[arg(long, value_name = "EXPR")]
        r#where: Vec<String>,

        /// Show at most this many rows
        #[arg(long)]
        limit: Option<usize>,
    },

    /// List a column's values by descending frequency
    Values {
        column: String,
    },

    /// Grouped counts over the (optionally filtered) records
    #[command(after_help = "\
Examples:
  tally summarize region
  tally summarize region,gender --where 'checked=true'")]
    Summarize {
        /// Column(s) to group by, comma separated
        #[arg(value_delimiter = ',')]
        columns: Vec<String>,

        /// Filter rows before grouping (repeatable)
        #[arg(long, value_name = "EXPR")]
        r#where: Vec<String>,
    },

    /// Write the (optionally filtered) view to a CSV edit surface
    Export {
        /// Output file
        #[arg(long, short = 'o')]
        output: PathBuf,

        /// Filter rows (repeatable)
        #[arg(long, value_name = "EXPR")]
        r#where: Vec<String>,
    },

    /// Diff an edited view against the store and persist the changes
    #[command(after_help = "\
Examples:
  tally export -o view.csv --where 'region=north'
  ... edit view.csv's checked column ...
  tally reconcile view.csv --where 'region=north'")]
    Reconcile {
        /// The edited CSV, as produced by export
        edited: PathBuf,

        /// The filters the view was exported with (repeatable)
        #[arg(long, value_name = "EXPR")]
        r#where: Vec<String>,

        /// Print the commit report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Flip one record's check-off attribute by identifier
    Mark {
        identifier: String,

        /// Clear instead of set
        #[arg(long)]
        clear: bool,
    },
}

#[derive(Debug)]
enum CliError {
    Usage(String),
    Profile(ProfileError),
    Import(ImportError),
    Store(StoreError),
    Session(SessionError),
    Integrity(IntegrityError),
    Other(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Usage(msg) | Self::Other(msg) => write!(f, "{msg}"),
            Self::Profile(e) => write!(f, "{e}"),
            Self::Import(e) => write!(f, "{e}"),
            Self::Store(e) => write!(f, "{e}"),
            Self::Session(e) => write!(f, "{e}"),
            Self::Integrity(e) => write!(f, "{e}"),
        }
    }
}

impl CliError {
    fn exit_code(&self) -> u8 {
        match self {
            Self::Usage(_) => EXIT_USAGE,
            Self::Integrity(_) => EXIT_INTEGRITY,
            Self::Session(SessionError::Integrity(_)) => EXIT_INTEGRITY,
            _ => EXIT_ERROR,
        }
    }
}

impl From<ProfileError> for CliError {
    fn from(e: ProfileError) -> Self {
        CliError::Profile(e)
    }
}

impl From<ImportError> for CliError {
    fn from(e: ImportError) -> Self {
        CliError::Import(e)
    }
}

impl From<StoreError> for CliError {
    fn from(e: StoreError) -> Self {
        CliError::Store(e)
    }
}

impl From<SessionError> for CliError {
    fn from(e: SessionError) -> Self {
        CliError::Session(e)
    }
}

impl From<IntegrityError> for CliError {
    fn from(e: IntegrityError) -> Self {
        CliError::Integrity(e)
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

fn run(cli: Cli) -> Result<u8, CliError> {
    let profile = resolve_profile(cli.config.as_deref())?;
    let db_path = cli.db.clone().unwrap_or_else(|| profile.database_path());
    tracing::debug!("using store at {}", db_path.display());

    match cli.command {
        Commands::Init { source, id_column, attr_column, drop, force } => {
            cmd_init(&profile, &db_path, source, id_column, attr_column, drop, force)
        }
        Commands::Show { r#where, limit } => cmd_show(&db_path, &r#where, limit),
        Commands::Values { column } => cmd_values(&db_path, &column),
        Commands::Summarize { columns, r#where } => cmd_summarize(&db_path, &columns, &r#where),
        Commands::Export { output, r#where } => cmd_export(&db_path, &output, &r#where),
        Commands::Reconcile { edited, r#where, json } => {
            cmd_reconcile(&db_path, &edited, &r#where, json)
        }
        Commands::Mark { identifier, clear } => cmd_mark(&db_path, &identifier, clear),
    }
}

fn resolve_profile(config: Option<&Path>) -> Result<Profile, CliError> {
    match config {
        Some(path) => Ok(Profile::load(path)?),
        None => {
            let default = Path::new("tallysheet.toml");
            if default.exists() {
                Ok(Profile::load(default)?)
            } else {
                Ok(Profile::default())
            }
        }
    }
}

/// Parse one --where expression: 'Column=v1,v2'.
fn parse_where(expr: &str) -> Result<(String, Vec<String>), CliError> {
    let (column, raw_values) = expr
        .split_once('=')
        .ok_or_else(|| CliError::Usage(format!("bad filter '{expr}': expected 'Column=v1,v2'")))?;
    let column = column.trim();
    if column.is_empty() {
        return Err(CliError::Usage(format!("bad filter '{expr}': empty column name")));
    }
    let values: Vec<String> = raw_values
        .split(',')
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();
    if values.is_empty() {
        return Err(CliError::Usage(format!("bad filter '{expr}': no values")));
    }
    Ok((column.to_string(), values))
}

fn build_filters(exprs: &[String]) -> Result<FilterSet, CliError> {
    let mut filters = FilterSet::new();
    for expr in exprs {
        let (column, values) = parse_where(expr)?;
        let id = filters.add();
        filters.set_column(id, Some(&column));
        filters.set_values(id, values);
    }
    Ok(filters)
}

fn open_session(db_path: &Path, exprs: &[String]) -> Result<(SqliteStore, Session), CliError> {
    let store = SqliteStore::open(db_path)?;
    let mut session = Session::open(&store)?;
    session.filters = build_filters(exprs)?;
    for warning in session.apply_filters() {
        eprintln!("warning: {warning}");
    }
    Ok((store, session))
}

fn cmd_init(
    profile: &Profile,
    db_path: &Path,
    source: Option<PathBuf>,
    id_column: Option<String>,
    attr_column: Option<String>,
    drop: Vec<String>,
    force: bool,
) -> Result<u8, CliError> {
    let source = source
        .or_else(|| profile.source.clone())
        .ok_or_else(|| CliError::Usage("no source file given and none in the profile".into()))?;

    if db_path.exists() && !force {
        return Err(CliError::Other(format!(
            "store already exists at {}; pass --force to overwrite",
            db_path.display()
        )));
    }
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| CliError::Other(e.to_string()))?;
        }
    }

    let options = ImportOptions {
        drop_columns: if drop.is_empty() { profile.drop_columns.clone() } else { drop },
        id_column: id_column.unwrap_or_else(|| profile.id_column.clone()),
        attr_column: attr_column.unwrap_or_else(|| profile.attr_column.clone()),
    };

    let table = tallysheet_io::import(&source)?;
    let prepared = tallysheet_io::prepare(table, &options)?;
    SqliteStore::create(db_path, &prepared, &options.id_column, &options.attr_column)?;

    println!(
        "Initialized {} with {} records ({} columns)",
        db_path.display(),
        prepared.row_count(),
        prepared.columns().len()
    );
    Ok(EXIT_SUCCESS)
}

fn cmd_show(db_path: &Path, exprs: &[String], limit: Option<usize>) -> Result<u8, CliError> {
    let (store, session) = open_session(db_path, exprs)?;
    let view = session.baseline();

    print!("{}", output::render(&view, limit));
    let shown = limit.unwrap_or(usize::MAX).min(view.row_count());
    if shown < view.row_count() {
        println!("({} of {} rows shown)", shown, view.row_count());
    }
    let (set, total) = session.tally();
    println!("{}: {} of {} in view", store.attr_column(), set, total);
    Ok(EXIT_SUCCESS)
}

fn cmd_values(db_path: &Path, column: &str) -> Result<u8, CliError> {
    let store = SqliteStore::open(db_path)?;
    let table = store.load()?;
    let values = FilterSet::candidate_values(&table, column)
        .ok_or_else(|| CliError::Usage(format!("no such column: '{column}'")))?;
    for value in values {
        println!("{value}");
    }
    Ok(EXIT_SUCCESS)
}

fn cmd_summarize(db_path: &Path, columns: &[String], exprs: &[String]) -> Result<u8, CliError> {
    if columns.is_empty() {
        return Err(CliError::Usage("pick at least one column to group by".into()));
    }
    let (_, session) = open_session(db_path, exprs)?;
    let view = session.baseline();
    let grouped = summary::summarize(&view, columns)?;
    print!("{}", output::render(&grouped, None));
    Ok(EXIT_SUCCESS)
}

fn cmd_export(db_path: &Path, output: &Path, exprs: &[String]) -> Result<u8, CliError> {
    let (_, session) = open_session(db_path, exprs)?;
    let view = session.baseline();
    tallysheet_io::csv::export(&view, output)?;
    println!("Exported {} rows to {}", view.row_count(), output.display());
    Ok(EXIT_SUCCESS)
}

fn cmd_reconcile(
    db_path: &Path,
    edited_path: &Path,
    exprs: &[String],
    json: bool,
) -> Result<u8, CliError> {
    let edited = tallysheet_io::import(edited_path)?;
    let (mut store, mut session) = open_session(db_path, exprs)?;

    let report = session.commit(&edited, &mut store)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).map_err(|e| CliError::Other(e.to_string()))?
        );
    } else {
        println!(
            "{} change(s) detected; {} applied, {} failed",
            report.changes.len(),
            report.applied,
            report.failures.len()
        );
        for failure in &report.failures {
            eprintln!("  {}: {}", failure.identifier, failure.message);
        }
        let (set, total) = session.tally();
        println!("{}: {} of {} in view", store.attr_column(), set, total);
    }

    if report.failures.is_empty() {
        Ok(EXIT_SUCCESS)
    } else {
        Ok(EXIT_PARTIAL)
    }
}

fn cmd_mark(db_path: &Path, identifier: &str, clear: bool) -> Result<u8, CliError> {
    let (mut store, mut session) = open_session(db_path, &[])?;

    let table = &session.table;
    let id_idx = table
        .column_index(store.id_column())
        .ok_or_else(|| CliError::Other(format!("no column '{}'", store.id_column())))?;
    let id_kind = table.columns()[id_idx].kind;
    let wanted = Key::for_kind(&Value::Text(identifier.to_string()), id_kind);
    let row = (0..table.row_count())
        .find(|&r| Key::for_kind(table.cell(r, id_idx), id_kind) == wanted)
        .ok_or_else(|| CliError::Other(format!("identifier '{identifier}' not found")))?;

    let mut edited = session.baseline();
    let attr = store.attr_column().to_string();
    edited.set_value(row, &attr, Value::Bool(!clear));

    let report = session.commit(&edited, &mut store)?;
    if report.changes.is_empty() {
        println!("{identifier}: already {}", if clear { "clear" } else { "set" });
    } else if report.failures.is_empty() {
        println!("{identifier}: {} {}", attr, if clear { "cleared" } else { "set" });
    } else {
        for failure in &report.failures {
            eprintln!("  {}: {}", failure.identifier, failure.message);
        }
        return Ok(EXIT_PARTIAL);
    }
    Ok(EXIT_SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_where_splits_column_and_values() {
        let (column, values) = parse_where("region=north,east").unwrap();
        assert_eq!(column, "region");
        assert_eq!(values, vec!["north".to_string(), "east".to_string()]);
    }

    #[test]
    fn parse_where_trims_and_drops_empties() {
        let (column, values) = parse_where(" region = north , ,east ").unwrap();
        assert_eq!(column, "region");
        assert_eq!(values, vec!["north".to_string(), "east".to_string()]);
    }

    #[test]
    fn parse_where_rejects_malformed_expressions() {
        assert!(parse_where("region").is_err());
        assert!(parse_where("=north").is_err());
        assert!(parse_where("region=").is_err());
    }

    #[test]
    fn build_filters_one_predicate_per_expression() {
        let filters = build_filters(&[
            "region=north".to_string(),
            "age=30,40".to_string(),
        ])
        .unwrap();
        assert_eq!(filters.len(), 2);
        assert_eq!(filters.active_count(), 2);
    }
}
