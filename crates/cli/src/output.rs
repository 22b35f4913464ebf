// Aligned text rendering for tables

use tallysheet_engine::table::Table;

const MAX_CELL_WIDTH: usize = 40;

fn clip(text: &str) -> String {
    if text.chars().count() <= MAX_CELL_WIDTH {
        return text.to_string();
    }
    let mut out: String = text.chars().take(MAX_CELL_WIDTH - 3).collect();
    out.push_str("...");
    out
}

/// Render up to `limit` rows as aligned columns, header first.
pub fn render(table: &Table, limit: Option<usize>) -> String {
    let shown = limit.unwrap_or(usize::MAX).min(table.row_count());

    let mut cells: Vec<Vec<String>> = Vec::with_capacity(shown + 1);
    cells.push(table.columns().iter().map(|c| clip(&c.name)).collect());
    for row in table.rows().iter().take(shown) {
        cells.push(row.iter().map(|v| clip(&v.to_string())).collect());
    }

    let ncols = table.columns().len();
    let mut widths = vec![0usize; ncols];
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let mut out = String::new();
    for row in &cells {
        let mut line = String::new();
        for (i, cell) in row.iter().enumerate() {
            line.push_str(cell);
            if i + 1 < ncols {
                let pad = widths[i].saturating_sub(cell.chars().count()) + 2;
                line.extend(std::iter::repeat(' ').take(pad));
            }
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tallysheet_engine::value::Value;

    #[test]
    fn renders_aligned_columns() {
        let table = Table::from_rows(
            vec!["name".into(), "n".into()],
            vec![
                vec![Value::Text("amal".into()), Value::Number(1.0)],
                vec![Value::Text("r".into()), Value::Number(22.0)],
            ],
        );
        let text = render(&table, None);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("name"));
        assert!(lines[1].starts_with("amal  1"));
    }

    #[test]
    fn respects_the_row_limit() {
        let table = Table::from_rows(
            vec!["n".into()],
            (0..10).map(|i| vec![Value::Number(i as f64)]).collect(),
        );
        let text = render(&table, Some(3));
        assert_eq!(text.lines().count(), 4);
    }

    #[test]
    fn clips_long_cells() {
        let long = "x".repeat(100);
        let table = Table::from_rows(
            vec!["t".into()],
            vec![vec![Value::Text(long)]],
        );
        let text = render(&table, None);
        assert!(text.lines().nth(1).unwrap().len() <= MAX_CELL_WIDTH);
        assert!(text.contains("..."));
    }
}
