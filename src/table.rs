//! The extracted purchase-order table and its on-screen rendering.

use serde::{Deserialize, Serialize};

/// One named column of a [`ParsedTable`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub cells: Vec<String>,
}

/// A table read from the model's answer.
///
/// Columns keep the order the model emitted them in and always have the same
/// number of cells. Rows are indexed contiguously from zero.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParsedTable {
    columns: Vec<Column>,
}

impl ParsedTable {
    /// Build a table from a header and row-major cells.
    ///
    /// Short rows are padded with empty cells and long rows truncated, so the
    /// equal-length invariant holds whatever the caller passes in.
    pub fn from_rows(header: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let mut columns: Vec<Column> = header
            .into_iter()
            .map(|name| Column {
                name,
                cells: Vec::with_capacity(rows.len()),
            })
            .collect();
        for row in rows {
            let mut cells = row.into_iter();
            for col in columns.iter_mut() {
                col.cells.push(cells.next().unwrap_or_default());
            }
        }
        Self { columns }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Look a column up by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, |c| c.cells.len())
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    /// Cells of row `index`, in column order.
    pub fn row(&self, index: usize) -> Option<Vec<&str>> {
        if index >= self.row_count() {
            return None;
        }
        Some(self.columns.iter().map(|c| c.cells[index].as_str()).collect())
    }

    /// Iterate rows in order.
    pub fn rows(&self) -> impl Iterator<Item = Vec<&str>> + '_ {
        (0..self.row_count()).filter_map(move |i| self.row(i))
    }

    /// Render the table as an aligned plain-text grid with a leading index
    /// column, the way a dataframe prints in a terminal.
    pub fn render(&self) -> String {
        if self.columns.is_empty() {
            return String::from("(empty table)\n");
        }

        let index_width = self.row_count().saturating_sub(1).to_string().len();
        let widths: Vec<usize> = self
            .columns
            .iter()
            .map(|c| {
                c.cells
                    .iter()
                    .map(|v| v.chars().count())
                    .chain(std::iter::once(c.name.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let mut out = String::new();
        out.push_str(&" ".repeat(index_width));
        for (col, w) in self.columns.iter().zip(&widths) {
            out.push_str("  ");
            out.push_str(&pad(&col.name, *w));
        }
        out.push('\n');

        for (i, row) in self.rows().enumerate() {
            out.push_str(&format!("{:>index_width$}", i));
            for (cell, w) in row.iter().zip(&widths) {
                out.push_str("  ");
                out.push_str(&pad(cell, *w));
            }
            out.push('\n');
        }

        out.lines()
            .map(str::trim_end)
            .collect::<Vec<_>>()
            .join("\n")
            + "\n"
    }
}

fn pad(s: &str, width: usize) -> String {
    let len = s.chars().count();
    format!("{s}{}", " ".repeat(width.saturating_sub(len)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ParsedTable {
        ParsedTable::from_rows(
            vec!["Vendor Name".into(), "Item Code".into()],
            vec![
                vec!["ACME".into(), "A-1".into()],
                vec!["ACME".into(), "B-22".into()],
            ],
        )
    }

    #[test]
    fn from_rows_pads_and_truncates() {
        let t = ParsedTable::from_rows(
            vec!["A".into(), "B".into()],
            vec![vec!["1".into()], vec!["2".into(), "3".into(), "4".into()]],
        );
        assert_eq!(t.row(0), Some(vec!["1", ""]));
        assert_eq!(t.row(1), Some(vec!["2", "3"]));
        assert_eq!(t.row_count(), 2);
    }

    #[test]
    fn row_out_of_range_is_none() {
        assert!(sample().row(2).is_none());
    }

    #[test]
    fn column_lookup() {
        let t = sample();
        assert_eq!(t.column("Item Code").unwrap().cells, vec!["A-1", "B-22"]);
        assert!(t.column("Missing").is_none());
    }

    #[test]
    fn render_aligns_columns() {
        let rendered = sample().render();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "   Vendor Name  Item Code");
        assert_eq!(lines[1], "0  ACME         A-1");
        assert_eq!(lines[2], "1  ACME         B-22");
    }

    #[test]
    fn render_empty_table() {
        assert_eq!(ParsedTable::default().render(), "(empty table)\n");
    }
}
