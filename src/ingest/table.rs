//! Untyped CSV table loading.
//!
//! The simulator writes headerless, comma-separated rows whose width can
//! vary (trailing commas are common), so cells stay as raw strings and
//! short rows simply have fewer cells.

use crate::error::IngestError;
use std::fs;
use std::path::Path;

/// Ordered rows of untyped cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    /// Read a CSV file from disk.
    pub fn load(path: &Path) -> Result<Self, IngestError> {
        let content = fs::read_to_string(path).map_err(|source| IngestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&content))
    }

    /// Parse CSV text. Blank lines are skipped; double-quoted fields may
    /// contain commas and `""` escapes.
    pub fn parse(content: &str) -> Self {
        let rows = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(split_record)
            .collect();
        Self::new(rows)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Width of the widest row.
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Cell text, or `None` when the row is shorter than `col`.
    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
    }

    /// Iterate over one column, top to bottom, yielding `None` for missing
    /// cells.
    pub fn column(&self, col: usize) -> impl Iterator<Item = Option<&str>> + '_ {
        self.rows
            .iter()
            .map(move |r| r.get(col).map(String::as_str))
    }
}

fn split_record(line: &str) -> Vec<String> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ragged_rows() {
        let table = RawTable::parse("a,b,c\n1,2\n\n3,4,5,6,\n");
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.column_count(), 5);
        assert_eq!(table.cell(1, 1), Some("2"));
        assert_eq!(table.cell(1, 2), None);
        assert_eq!(table.cell(2, 4), Some(""));
    }

    #[test]
    fn test_quoted_fields() {
        let table = RawTable::parse("\"x,y\",\"say \"\"hi\"\"\",3\r\n");
        assert_eq!(table.cell(0, 0), Some("x,y"));
        assert_eq!(table.cell(0, 1), Some("say \"hi\""));
        assert_eq!(table.cell(0, 2), Some("3"));
    }

    #[test]
    fn test_column_iterator() {
        let table = RawTable::parse("1,a\n2\n3,c\n");
        let col: Vec<_> = table.column(1).collect();
        assert_eq!(col, vec![Some("a"), None, Some("c")]);
    }

    #[test]
    fn test_load_missing_file() {
        let err = RawTable::load(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(matches!(err, IngestError::Io { .. }));
    }
}
