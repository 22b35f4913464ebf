// CSV/TSV import and export

use std::io::Read;
use std::path::Path;

use tallysheet_engine::table::Table;
use tallysheet_engine::value::Value;

use crate::ImportError;

pub fn import(path: &Path) -> Result<Table, ImportError> {
    let content = read_file_as_utf8(path)?;
    let delimiter = sniff_delimiter(&content);
    import_from_string(&content, delimiter)
}

pub fn import_tsv(path: &Path) -> Result<Table, ImportError> {
    let content = read_file_as_utf8(path)?;
    import_from_string(&content, b'\t')
}

pub fn import_with_delimiter(path: &Path, delimiter: u8) -> Result<Table, ImportError> {
    let content = read_file_as_utf8(path)?;
    import_from_string(&content, delimiter)
}

/// Detect the most likely field delimiter by checking consistency
/// across the first few lines. The candidate producing the most
/// consistent field count (>1 field) wins; more columns breaks ties.
fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample_lines: Vec<&str> = content.lines().take(10).collect();

    if sample_lines.is_empty() {
        return b',';
    }

    let mut best = b',';
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        if counts.first().copied().unwrap_or(0) <= 1 {
            continue;
        }

        let target = counts[0];
        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;

        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

/// Read a file and convert to UTF-8 if needed. Excel-exported CSVs are
/// commonly Windows-1252.
pub fn read_file_as_utf8(path: &Path) -> Result<String, ImportError> {
    let mut file = std::fs::File::open(path).map_err(|e| ImportError::Io(e.to_string()))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .map_err(|e| ImportError::Io(e.to_string()))?;

    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => {
            let bytes = e.into_bytes();
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}

fn import_from_string(content: &str, delimiter: u8) -> Result<Table, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut headers: Vec<String> = Vec::new();
    let mut rows: Vec<Vec<Value>> = Vec::new();

    for (row_idx, result) in reader.records().enumerate() {
        let record = result.map_err(|e| ImportError::Io(e.to_string()))?;
        if row_idx == 0 {
            for (col_idx, field) in record.iter().enumerate() {
                let name = field.trim();
                let name = if name.is_empty() {
                    format!("column_{col_idx}")
                } else {
                    name.to_string()
                };
                if headers.contains(&name) {
                    return Err(ImportError::DuplicateHeader(name));
                }
                headers.push(name);
            }
            continue;
        }
        let mut row: Vec<Value> = record.iter().map(parse_field).collect();
        // Short rows pad out with nulls; extra fields are dropped
        row.resize(headers.len(), Value::Null);
        rows.push(row);
    }

    if headers.is_empty() {
        return Err(ImportError::EmptySheet);
    }

    Ok(Table::from_rows(headers, rows))
}

/// Type a raw CSV field: empty is null, then boolean and numeric
/// readings, otherwise text as written.
fn parse_field(field: &str) -> Value {
    let s = field.trim();
    if s.is_empty() {
        return Value::Null;
    }
    if s.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if s.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if let Ok(n) = s.parse::<f64>() {
        if n.is_finite() {
            return Value::Number(n);
        }
    }
    Value::Text(s.to_string())
}

/// Write a table as comma-separated values, header row first, cells in
/// their canonical string representation.
pub fn export(table: &Table, path: &Path) -> Result<(), ImportError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| ImportError::Io(e.to_string()))?;
    write_records(&mut writer, table)
}

pub fn export_to_writer<W: std::io::Write>(
    writer: W,
    table: &Table,
) -> Result<(), ImportError> {
    let mut writer = csv::Writer::from_writer(writer);
    write_records(&mut writer, table)
}

fn write_records<W: std::io::Write>(
    writer: &mut csv::Writer<W>,
    table: &Table,
) -> Result<(), ImportError> {
    writer
        .write_record(table.columns().iter().map(|c| c.name.as_str()))
        .map_err(|e| ImportError::Io(e.to_string()))?;
    for row in table.rows() {
        writer
            .write_record(row.iter().map(|v| v.to_string()))
            .map_err(|e| ImportError::Io(e.to_string()))?;
    }
    writer.flush().map_err(|e| ImportError::Io(e.to_string()))?;
    Ok(())
}
