//! Agent schema inference.
//!
//! Output tables start with four fixed columns (run id, time, bid, ask)
//! followed by repeating four-column agent blocks:
//! `name, unused, unused, average balance`. The agent names are read from
//! the first row.

use crate::error::IngestError;
use crate::ingest::table::RawTable;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

/// Index of the first agent block.
pub const FIRST_AGENT_COLUMN: usize = 4;

/// Width of one agent block.
pub const BLOCK_WIDTH: usize = 4;

/// Offset of the average-balance column within a block.
const VALUE_OFFSET: usize = 3;

/// Non-fatal findings reported alongside a schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchemaWarning {
    /// Columns after the last complete block were ignored.
    TrailingColumns { extra: usize },
    /// A block's name cell was empty or blank.
    BlankAgentName { column: usize },
    /// A name seen in an earlier block; the first mapping is kept.
    DuplicateAgent {
        name: String,
        column: usize,
        first_column: usize,
    },
}

impl fmt::Display for SchemaWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaWarning::TrailingColumns { extra } => write!(
                f,
                "{} trailing column(s) do not form a complete agent block and were ignored",
                extra
            ),
            SchemaWarning::BlankAgentName { column } => write!(
                f,
                "agent name at column {} is empty, skipping this block",
                column
            ),
            SchemaWarning::DuplicateAgent {
                name,
                column,
                first_column,
            } => write!(
                f,
                "agent '{}' at column {} already mapped to column {}, keeping the first",
                name, column, first_column
            ),
        }
    }
}

/// Agent identifier to value-column mapping, with block order preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    columns: HashMap<String, usize>,
    order: Vec<String>,
}

impl Schema {
    /// Value-column index of `agent`.
    pub fn column_of(&self, agent: &str) -> Option<usize> {
        self.columns.get(agent).copied()
    }

    /// Agent identifiers in block order.
    pub fn agents(&self) -> &[String] {
        &self.order
    }

    /// `(agent, column)` pairs in block order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> + '_ {
        self.order
            .iter()
            .filter_map(move |name| self.column_of(name).map(|column| (name.as_str(), column)))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn insert(&mut self, name: String, column: usize) -> Result<(), usize> {
        if let Some(&existing) = self.columns.get(&name) {
            return Err(existing);
        }
        self.columns.insert(name.clone(), column);
        self.order.push(name);
        Ok(())
    }
}

/// Result of schema inference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InferredSchema {
    pub schema: Schema,
    pub warnings: Vec<SchemaWarning>,
}

/// Discover agent identifiers and their value columns.
pub fn infer_schema(table: &RawTable) -> Result<InferredSchema, IngestError> {
    if table.row_count() == 0 {
        return Err(IngestError::MalformedTable("table has no rows".to_string()));
    }

    let total = table.column_count();
    if total < FIRST_AGENT_COLUMN {
        return Err(IngestError::MalformedTable(format!(
            "expected at least {} columns, got {}",
            FIRST_AGENT_COLUMN, total
        )));
    }

    let remaining = total - FIRST_AGENT_COLUMN;
    let mut inferred = InferredSchema::default();

    if remaining % BLOCK_WIDTH != 0 {
        let warning = SchemaWarning::TrailingColumns {
            extra: remaining % BLOCK_WIDTH,
        };
        warn!("{}", warning);
        inferred.warnings.push(warning);
    }

    for block in 0..remaining / BLOCK_WIDTH {
        let name_column = FIRST_AGENT_COLUMN + block * BLOCK_WIDTH;
        let value_column = name_column + VALUE_OFFSET;

        let name = table.cell(0, name_column).map(str::trim).unwrap_or("");
        if name.is_empty() {
            let warning = SchemaWarning::BlankAgentName {
                column: name_column,
            };
            warn!("{}", warning);
            inferred.warnings.push(warning);
            continue;
        }

        if let Err(first_column) = inferred.schema.insert(name.to_string(), value_column) {
            let warning = SchemaWarning::DuplicateAgent {
                name: name.to_string(),
                column: value_column,
                first_column,
            };
            warn!("{}", warning);
            inferred.warnings.push(warning);
        }
    }

    debug!(
        "Identified {} agent(s): {:?}",
        inferred.schema.len(),
        inferred.schema.agents()
    );

    Ok(inferred)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_fixed_columns_only() {
        let table = RawTable::new(vec![row(&["r", "1", "100", "110"])]);
        let inferred = infer_schema(&table).unwrap();
        assert!(inferred.schema.is_empty());
        assert!(inferred.warnings.is_empty());
    }

    #[test]
    fn test_blank_block_is_skipped() {
        let table = RawTable::new(vec![row(&[
            "a", "b", "c", "d", "GVWY", "x", "y", "100", "", "x", "y", "50",
        ])]);
        let inferred = infer_schema(&table).unwrap();

        assert_eq!(inferred.schema.len(), 1);
        assert_eq!(inferred.schema.column_of("GVWY"), Some(7));
        assert_eq!(
            inferred.warnings,
            vec![SchemaWarning::BlankAgentName { column: 8 }]
        );
    }

    #[test]
    fn test_trailing_column_warning() {
        let table = RawTable::new(vec![row(&[
            "a", "b", "c", "d", "ZIC", "x", "y", "1", "ZIP", "x", "y", "2", "",
        ])]);
        let inferred = infer_schema(&table).unwrap();

        assert_eq!(
            inferred.warnings,
            vec![SchemaWarning::TrailingColumns { extra: 1 }]
        );
        assert_eq!(inferred.schema.agents(), &["ZIC", "ZIP"]);
        assert_eq!(inferred.schema.column_of("ZIP"), Some(11));
        assert_eq!(
            inferred.schema.iter().collect::<Vec<_>>(),
            vec![("ZIC", 7), ("ZIP", 11)]
        );
    }

    #[test]
    fn test_skipped_blocks_do_not_shift_indices() {
        let table = RawTable::new(vec![row(&[
            "a", "b", "c", "d", "  ", "x", "y", "1", " SHVR ", "x", "y", "2",
        ])]);
        let inferred = infer_schema(&table).unwrap();
        assert_eq!(inferred.schema.column_of("SHVR"), Some(11));
    }

    #[test]
    fn test_duplicate_agent_keeps_first() {
        let table = RawTable::new(vec![row(&[
            "a", "b", "c", "d", "ZIP", "x", "y", "1", "ZIP", "x", "y", "2",
        ])]);
        let inferred = infer_schema(&table).unwrap();

        assert_eq!(inferred.schema.agents(), &["ZIP"]);
        assert_eq!(inferred.schema.column_of("ZIP"), Some(7));
        assert_eq!(
            inferred.warnings,
            vec![SchemaWarning::DuplicateAgent {
                name: "ZIP".to_string(),
                column: 11,
                first_column: 7,
            }]
        );
    }

    #[test]
    fn test_block_order_preserved() {
        let table = RawTable::new(vec![row(&[
            "a", "b", "c", "d", "ZIP", "x", "y", "1", "GVWY", "x", "y", "2", "AA", "x", "y",
            "3",
        ])]);
        let inferred = infer_schema(&table).unwrap();
        let pairs: Vec<_> = inferred.schema.iter().collect();
        assert_eq!(pairs, vec![("ZIP", 7), ("GVWY", 11), ("AA", 15)]);
    }

    #[test]
    fn test_too_few_columns() {
        let table = RawTable::new(vec![row(&["a", "b", "c"])]);
        assert!(matches!(
            infer_schema(&table),
            Err(IngestError::MalformedTable(_))
        ));
    }

    #[test]
    fn test_empty_table() {
        assert!(matches!(
            infer_schema(&RawTable::default()),
            Err(IngestError::MalformedTable(_))
        ));
    }
}
